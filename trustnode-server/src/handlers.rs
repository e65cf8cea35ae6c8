//! Request routing for a trustnode
//!
//! Routes:
//! - `GET /` greeting page
//! - `GET /health`, `GET /metadata` node records
//! - `GET /.well-known/jwks.json` this node's key directory
//! - `GET /static/<file>` files under the static root
//! - `GET /secure` bearer-token protected claims echo
//! - `GET /call?target=<base-url>` authorized call to `<target>/secure`
//!
//! Any other method answers 501; any other path answers 404.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use trustnode_client::{HttpDirectorySource, NodeClient};
use trustnode_core::auth::{
    Authorizer, ExpiryPolicy, JwkSet, JwtPayload, KeyDirectorySource, KeyPair, WELL_KNOWN_JWKS_PATH,
};
use trustnode_core::{unix_now, HttpMethod, HttpStatus, NodeHealth, NodeMetadata};
use trustnode_net::{content_type_for, escape_html, Handler, ResponseBuilder};

pub const STATIC_PREFIX: &str = "/static/";
pub const SECURE_PATH: &str = "/secure";
pub const CALL_PATH: &str = "/call";

/// Key material and descriptive records shared by every worker
pub struct NodeIdentity {
    key: Arc<KeyPair>,
    jwks: JwkSet,
    jwks_json: String,
    public_url: String,
    metadata: NodeMetadata,
}

impl NodeIdentity {
    pub fn new(key: Arc<KeyPair>, public_url: impl Into<String>, metadata: NodeMetadata) -> trustnode_core::Result<Self> {
        let jwks = JwkSet::for_key(&key);
        let jwks_json = jwks.to_json()?;
        Ok(NodeIdentity {
            key,
            jwks,
            jwks_json,
            public_url: public_url.into(),
            metadata,
        })
    }

    pub fn key(&self) -> &Arc<KeyPair> {
        &self.key
    }

    pub fn jwks(&self) -> &JwkSet {
        &self.jwks
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    pub fn metadata(&self) -> &NodeMetadata {
        &self.metadata
    }
}

/// Metadata a node reports when only its name is configured
pub fn default_metadata(name: &str) -> NodeMetadata {
    NodeMetadata {
        name: name.to_string(),
        description: Some("Node authenticating peers with RS256 bearer tokens".to_string()),
        owner: None,
        services: Some(vec![
            WELL_KNOWN_JWKS_PATH.to_string(),
            SECURE_PATH.to_string(),
            CALL_PATH.to_string(),
        ]),
    }
}

/// Body of a successful `/secure` response
#[derive(Debug, Serialize)]
struct AuthorizedReply<'a> {
    authorized: bool,
    kid: &'a str,
    claims: &'a JwtPayload,
}

pub struct Router {
    identity: Arc<NodeIdentity>,
    static_root: PathBuf,
    authorizer: Authorizer<Arc<dyn KeyDirectorySource>>,
    client: NodeClient,
}

impl Router {
    pub fn new(identity: Arc<NodeIdentity>, static_root: impl Into<PathBuf>, expiry: ExpiryPolicy) -> Self {
        let source: Arc<dyn KeyDirectorySource> = Arc::new(HttpDirectorySource::new());
        let client = NodeClient::new(identity.public_url(), Arc::clone(identity.key()));
        Router {
            identity,
            static_root: static_root.into(),
            authorizer: Authorizer::new(source).with_expiry_policy(expiry),
            client,
        }
    }

    /// Replace where issuers' key directories are fetched from
    pub fn with_directory_source(mut self, source: Arc<dyn KeyDirectorySource>) -> Self {
        let expiry = self.authorizer.expiry_policy();
        self.authorizer = Authorizer::new(source).with_expiry_policy(expiry);
        self
    }

    fn greeting(&self) -> String {
        let name = escape_html(&self.identity.metadata().name);
        format!(
            "<html>\n  <head><title>{name}</title></head>\n  <body><h1>{name}</h1><p>Serving at {url}. Key directory: <a href=\"{jwks}\">{jwks}</a></p></body>\n</html>",
            name = name,
            url = escape_html(self.identity.public_url()),
            jwks = WELL_KNOWN_JWKS_PATH,
        )
    }

    fn secure(&self, response: &mut ResponseBuilder<'_>) -> io::Result<()> {
        let request = response.request();
        let result = self.authorizer.authorize(request.header("Authorization"), unix_now());

        match result.token.as_ref().filter(|_| result.is_authorized()) {
            Some(token) => {
                info!("Authorized request from {}", token.payload().iss);
                response.json_data(&AuthorizedReply {
                    authorized: true,
                    kid: &token.header().kid,
                    claims: token.payload(),
                })
            }
            None => response.error_page(&result.message, result.status),
        }
    }

    fn call(&self, response: &mut ResponseBuilder<'_>) -> io::Result<()> {
        let target = match response.request().query_param("target") {
            Some(target) if !target.is_empty() => target,
            _ => return response.error_page("missing target parameter", HttpStatus::BadRequest),
        };

        match self.client.get_authorized(target, SECURE_PATH) {
            Ok(reply) => match HttpStatus::from_code(reply.status) {
                Some(status) => {
                    let content_type = reply.content_type.as_deref().unwrap_or("application/octet-stream");
                    response.body(status, content_type, &reply.body)
                }
                None => response.error_page(
                    &format!("{} answered with status {}", target, reply.status),
                    HttpStatus::BadRequest,
                ),
            },
            Err(e) => {
                warn!("Call to {} failed: {}", target, e);
                response.error_page(&format!("unable to reach {}", target), HttpStatus::BadRequest)
            }
        }
    }

    fn static_file(&self, response: &mut ResponseBuilder<'_>, relative: &str) -> io::Result<()> {
        match resolve_static(&self.static_root, relative) {
            Some(path) => {
                let content_type = content_type_for(&path);
                response.static_file(&path, content_type)
            }
            None => {
                debug!("Refusing static path {:?}", relative);
                response.error_page("Requested file was not found on the server", HttpStatus::NotFound)
            }
        }
    }
}

impl Handler for Router {
    fn handle(&self, response: &mut ResponseBuilder<'_>) -> io::Result<()> {
        let request = response.request();
        if request.method != HttpMethod::GET {
            return response.error_page(request.method.as_str(), HttpStatus::NotImplemented);
        }

        match request.path() {
            "/" => {
                let page = self.greeting();
                response.html(&page)
            }
            "/health" => response.json_data(&NodeHealth::healthy()),
            "/metadata" => response.json_data(self.identity.metadata()),
            WELL_KNOWN_JWKS_PATH => response.json(&self.identity.jwks_json),
            SECURE_PATH => self.secure(response),
            CALL_PATH => self.call(response),
            path => match path.strip_prefix(STATIC_PREFIX) {
                Some(relative) => self.static_file(response, relative),
                None => response.error_page(&request.uri, HttpStatus::NotFound),
            },
        }
    }
}

/// Path under `root` for a `/static/` suffix, refusing anything that could escape it
fn resolve_static(root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.is_empty() {
        return None;
    }
    let mut path = root.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}
