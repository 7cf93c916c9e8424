use std::sync::{PoisonError, RwLock};

use reqwest::Method;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::types::{AccessToken, Role, UserProfile};

const SEED_PATH: &str = "/seed";
const REGISTER_PATH: &str = "/auth/register";

/// Backend API location.
///
/// The origin is the only required field; everything else has a default.
///
/// ```rust,ignore
/// use take2_portal::ApiConfig;
///
/// let config = ApiConfig::new("https://portal.take2studio.com".parse()?)
///     .with_prefix("/api/v2");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiConfig {
    pub(crate) origin: Url,
    pub(crate) prefix: String,
    pub(crate) user_agent: String,
}

impl ApiConfig {
    /// Create an API configuration for a backend origin.
    ///
    /// Endpoints are served under `/api` unless overridden.
    #[must_use]
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            prefix: "/api".into(),
            user_agent: concat!("take2-portal/", env!("CARGO_PKG_VERSION")).into(),
        }
    }

    /// Override the path prefix every endpoint lives under (default: `/api`).
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Override the `User-Agent` sent with every request.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Backend origin.
    #[must_use]
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// API path prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Absolute URL of an API path such as `/auth/me`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> Url {
        let segments: Vec<&str> = [self.origin.path(), self.prefix.as_str(), path]
            .into_iter()
            .map(|s| s.trim_matches('/'))
            .filter(|s| !s.is_empty())
            .collect();

        let mut url = self.origin.clone();
        url.set_path(&format!("/{}", segments.join("/")));
        url.set_query(None);
        url
    }
}

/// HTTP client for the portal backend.
///
/// Owns the bearer credential: once [`set_bearer`](Self::set_bearer) is called,
/// every request built by this client carries `Authorization: Bearer <token>`
/// until [`clear_bearer`](Self::clear_bearer).
pub struct ApiClient {
    config: ApiConfig,
    http: reqwest::Client,
    bearer: RwLock<Option<AccessToken>>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Response of the login endpoints.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: AccessToken,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl ApiClient {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            bearer: RwLock::new(None),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Attach `token` to every subsequent request.
    pub fn set_bearer(&self, token: AccessToken) {
        *self.bearer.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Stop sending a bearer credential.
    pub fn clear_bearer(&self) {
        *self.bearer.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn has_bearer(&self) -> bool {
        self.bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start a request to an API path with the user agent and, if set, the
    /// bearer credential attached.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http
            .request(method, self.config.endpoint(path))
            .header(USER_AGENT, &self.config.user_agent);

        match self
            .bearer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(token) => builder.bearer_auth(token.as_str()),
            None => builder,
        }
    }

    /// Exchange email and password for an access token on the role's login endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or an undecodable body, or
    /// [`Error::Api`] if the backend rejects the credentials.
    pub async fn login(
        &self,
        role: Role,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, Error> {
        let response = self
            .request(Method::POST, role.endpoints().login)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let response = Self::ensure_success(response, "login").await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    /// Fetch the profile behind the current bearer credential.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or an undecodable body, or
    /// [`Error::Api`] if the token is rejected.
    pub async fn profile(&self, role: Role) -> Result<UserProfile, Error> {
        self.get_json(role.endpoints().profile).await
    }

    /// Create a client account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the email is already registered.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, Error> {
        let response = self
            .request(Method::POST, REGISTER_PATH)
            .json(&RegisterRequest {
                name,
                email,
                password,
            })
            .send()
            .await?;

        let response = Self::ensure_success(response, "registration").await?;
        response.json::<UserProfile>().await.map_err(Into::into)
    }

    /// Ask the backend to populate its demo data.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; callers usually ignore it.
    pub async fn seed(&self) -> Result<(), Error> {
        let response = self.request(Method::POST, SEED_PATH).send().await?;
        Self::ensure_success(response, "demo seed").await?;
        Ok(())
    }

    /// GET an API path and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or an undecodable body, or
    /// [`Error::Api`] on a non-2xx status.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self.request(Method::GET, path).send().await?;
        let response = Self::ensure_success(response, "GET request").await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            operation,
            status,
            detail: body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(ApiConfig::new(server.uri().parse().unwrap()))
    }

    #[test]
    fn test_endpoint_joins_origin_prefix_and_path() {
        let config = ApiConfig::new("http://localhost:8001".parse().unwrap());
        assert_eq!(
            config.endpoint("/auth/me").as_str(),
            "http://localhost:8001/api/auth/me"
        );
    }

    #[test]
    fn test_endpoint_keeps_origin_path() {
        let config = ApiConfig::new("https://example.com/portal/".parse().unwrap())
            .with_prefix("v1/");
        assert_eq!(
            config.endpoint("/admin/auth/login").as_str(),
            "https://example.com/portal/v1/admin/auth/login"
        );
    }

    #[test]
    fn test_endpoint_with_empty_prefix() {
        let config = ApiConfig::new("http://localhost:8001".parse().unwrap()).with_prefix("");
        assert_eq!(config.endpoint("/seed").as_str(), "http://localhost:8001/seed");
    }

    #[test]
    fn test_bearer_slot() {
        let client = ApiClient::new(ApiConfig::new("http://localhost".parse().unwrap()));
        assert!(!client.has_bearer());
        client.set_bearer("t".into());
        assert!(client.has_bearer());
        client.clear_bearer();
        assert!(!client.has_bearer());
    }

    #[tokio::test]
    async fn test_login_posts_credentials_to_role_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/auth/login"))
            .and(body_json(serde_json::json!({
                "email": "admin@take2studio.com",
                "password": "admin123"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "jwt-admin",
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server)
            .login(Role::Admin, "admin@take2studio.com", "admin123")
            .await
            .unwrap();

        assert_eq!(token.access_token.as_str(), "jwt-admin");
        assert_eq!(token.token_type.as_deref(), Some("bearer"));
    }

    #[tokio::test]
    async fn test_rejected_login_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"detail": "Incorrect email or password"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .login(Role::Client, "demo@take2studio.com", "wrong")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("Incorrect email or password"));
    }

    #[tokio::test]
    async fn test_bearer_attached_to_profile_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/me"))
            .and(header("authorization", "Bearer jwt-client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "c1",
                "name": "Demo Client",
                "email": "demo@take2studio.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.set_bearer("jwt-client".into());
        let profile = client.profile(Role::Client).await.unwrap();

        assert_eq!(profile.name.as_deref(), Some("Demo Client"));
    }

    #[tokio::test]
    async fn test_cleared_bearer_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/seed"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.set_bearer("jwt".into());
        client.clear_bearer();
        client.seed().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_malformed_profile_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server).profile(Role::Admin).await;
        assert!(matches!(result, Err(Error::Http(_))));
    }

    #[tokio::test]
    async fn test_register_returns_created_profile() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .and(body_json(serde_json::json!({
                "name": "Ana",
                "email": "ana@example.com",
                "password": "pw"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "c2",
                "name": "Ana",
                "email": "ana@example.com",
                "created_at": "2025-03-01T12:00:00"
            })))
            .mount(&server)
            .await;

        let profile = client_for(&server)
            .register("Ana", "ana@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(profile.id.as_deref(), Some("c2"));
    }
}
