use std::path::{Path, PathBuf};

use url::Url;

use crate::api::ApiConfig;
use crate::error::Error;

const SESSION_DIR: &str = ".take2";
const SESSION_FILE: &str = "session.json";
const FALLBACK_SESSION_FILE: &str = ".take2-session.json";

/// Portal client configuration.
///
/// Required field (backend origin) is a constructor parameter; use
/// [`from_env()`](PortalConfig::from_env) for convention-based setup.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub(crate) api: ApiConfig,
    pub(crate) session_file: PathBuf,
}

impl PortalConfig {
    /// Create config for a backend origin, with the session file in its
    /// default location.
    #[must_use]
    pub fn new(backend: Url) -> Self {
        Self {
            api: ApiConfig::new(backend),
            session_file: default_session_file(
                std::env::var_os("HOME").as_deref().map(Path::new),
            ),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `TAKE2_BACKEND_URL`: backend origin (`http` or `https`)
    ///
    /// # Optional env vars
    /// - `TAKE2_API_PREFIX`: path prefix of the REST API (default `/api`)
    /// - `TAKE2_SESSION_FILE`: where the session is persisted
    ///   (default `$HOME/.take2/session.json`)
    /// - `TAKE2_USER_AGENT`: `User-Agent` header value
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the backend URL is missing or invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the backend URL is missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let backend = lookup("TAKE2_BACKEND_URL")
            .ok_or_else(|| Error::Config("TAKE2_BACKEND_URL is required".into()))?;
        let backend = parse_backend_url(&backend).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("TAKE2_BACKEND_URL: {msg}")),
            other => Error::Config(format!("TAKE2_BACKEND_URL: {other}")),
        })?;

        let mut config = Self::new(backend);

        if let Some(prefix) = lookup("TAKE2_API_PREFIX") {
            config = config.with_api_prefix(prefix);
        }
        if let Some(file) = lookup("TAKE2_SESSION_FILE").filter(|f| !f.trim().is_empty()) {
            config = config.with_session_file(file);
        }
        if let Some(agent) = lookup("TAKE2_USER_AGENT").filter(|a| !a.trim().is_empty()) {
            config = config.with_user_agent(agent);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Url) -> Self {
        self.api.origin = backend;
        self
    }

    #[must_use]
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api = self.api.with_prefix(prefix);
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.api = self.api.with_user_agent(user_agent);
        self
    }

    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    #[must_use]
    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    #[must_use]
    pub fn session_file(&self) -> &Path {
        &self.session_file
    }
}

/// Parse a backend origin, accepting only `http` and `https`.
///
/// # Errors
///
/// Returns [`Error::Url`] for unparseable input or [`Error::Config`] for
/// another scheme.
pub fn parse_backend_url(s: &str) -> Result<Url, Error> {
    let url: Url = s.trim().parse()?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!("unsupported scheme {other:?}"))),
    }
}

fn default_session_file(home: Option<&Path>) -> PathBuf {
    match home {
        Some(home) if !home.as_os_str().is_empty() => home.join(SESSION_DIR).join(SESSION_FILE),
        _ => PathBuf::from(FALLBACK_SESSION_FILE),
    }
}
