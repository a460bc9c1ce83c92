//=====================================================
// File: modules/remote.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: HTTP-backed module resolution
// Objective: Fetch candidate module sources from a raw-content origin,
//            gate them through syntax validation, and fall back to the
//            local resolver first
//=====================================================

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::modules::local::LocalResolver;
use crate::modules::name::ModuleName;
use crate::modules::{ImportContext, ResolvedSource, ResolverId};
use crate::parser::validate_module;

/// Raw-content host used by [`RemoteResolver::from_github`].
pub const RAW_GITHUB_HOST: &str = "https://raw.githubusercontent.com";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

//=====================================================
// Section 1.0 - Transport
//=====================================================

/// Failure of a single fetch attempt. Never retried; always absorbed by
/// the resolver as a per-candidate miss.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("GET request [{status}] {reason}")]
    Status { status: u16, reason: String },
    #[error("GET request failed: {0}")]
    Network(String),
}

/// Body of a successful (2xx) fetch.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    pub body: String,
}

/// The one network capability the resolver consumes: a single blocking
/// GET. Tests substitute a recording stub; production uses
/// [`HttpTransport`].
pub trait Transport {
    fn fetch(&self, url: &str) -> Result<FetchedBody, TransportError>;
}

/// Blocking transport over a shared `ureq` agent.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new().timeout(FETCH_TIMEOUT).build();
        Self { agent }
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<FetchedBody, TransportError> {
        match self.agent.get(url).call() {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .into_string()
                    .map_err(|error| TransportError::Network(error.to_string()))?;
                Ok(FetchedBody { status, body })
            }
            Err(ureq::Error::Status(status, response)) => Err(TransportError::Status {
                status,
                reason: response.status_text().to_string(),
            }),
            Err(error) => Err(TransportError::Network(error.to_string())),
        }
    }
}

//=====================================================
// Section 2.0 - Remote Resolver
//=====================================================

/// Resolves logical names against a fixed base origin, trying the
/// embedded local resolver first so names satisfiable on disk never cost
/// a network fetch.
pub struct RemoteResolver {
    id: ResolverId,
    base_url: String,
    local: LocalResolver,
    transport: Box<dyn Transport>,
}

impl fmt::Debug for RemoteResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResolver")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RemoteResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_transport(base_url, Box::new(HttpTransport::new()))
    }

    /// Build against an explicit transport. Tests use this to observe and
    /// script fetch traffic without a live origin.
    pub fn with_transport(base_url: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("module base URL: {base_url}");
        Self {
            id: ResolverId::next(),
            base_url,
            local: LocalResolver::new(),
            transport,
        }
    }

    /// Convenience for the well-known raw-content URL pattern
    /// `https://raw.githubusercontent.com/<owner>/<repository>/<branch>`.
    pub fn from_github(owner: &str, repository: &str, branch: &str) -> Self {
        Self::new(format!("{RAW_GITHUB_HOST}/{owner}/{repository}/{branch}"))
    }

    /// Like [`RemoteResolver::from_github`] with a caller-supplied
    /// transport.
    pub fn from_github_with_transport(
        owner: &str,
        repository: &str,
        branch: &str,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self::with_transport(
            format!("{RAW_GITHUB_HOST}/{owner}/{repository}/{branch}"),
            transport,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn id(&self) -> ResolverId {
        self.id
    }

    /// Resolve against the registry short-circuit, the embedded local
    /// resolver, then the remote origin under both conventions.
    pub fn resolve(
        &self,
        ctx: &ImportContext,
        name: &ModuleName,
        extra_roots: &[std::path::PathBuf],
    ) -> Option<ResolvedSource> {
        // Names already bound in the registry are satisfied; signalling a
        // miss here keeps the fetch count at zero for them.
        if ctx.is_loaded(name) {
            warn!("module is already loaded: {name}");
            return None;
        }

        // Skip local delegation when a local resolver is active in the
        // chain; it already scanned these roots before the chain reached
        // us.
        if !ctx.has_local_resolver() {
            if let Some(unit) = self.local.resolve(name, extra_roots) {
                return Some(unit);
            }
        }

        info!("searching for remote module: {name}");

        if let Some(unit) = self.probe(name, false) {
            info!("found remote module (file): {name}");
            return Some(unit);
        }
        if let Some(unit) = self.probe(name, true) {
            info!("found remote module (package): {name}");
            return Some(unit);
        }

        warn!("remote module not found: {name}");
        None
    }

    fn probe(&self, name: &ModuleName, package: bool) -> Option<ResolvedSource> {
        let spec = if package { "package" } else { "file" };
        debug!("searching URL by {spec} specification: {name}");

        let url = format!("{}/{}", self.base_url, name.url_path(package));
        let body = match self.transport.fetch(&url) {
            Ok(fetched) => {
                info!("GET request [{}]: {url}", fetched.status);
                fetched.body
            }
            Err(error) => {
                warn!("{error}: {url}");
                return None;
            }
        };

        match validate_module(&body, &name.as_str()) {
            Ok(_) => Some(ResolvedSource::fetched(name.clone(), url, body, package)),
            Err(_) => {
                warn!("module found but it is not a valid tidescript module: {name}");
                None
            }
        }
    }
}
