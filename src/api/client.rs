//! Backend REST API Client
//!
//! Single choke point for outbound calls. Attaches the bearer token,
//! turns non-2xx responses into typed errors and tears the session down
//! when the server rejects the token.

use super::error::{ApiError, ApiResult, ResponseMeta};
use crate::config::ApiConfig;
use crate::credentials::CredentialStore;
use crate::notify::{NoticeLevel, Notifier};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

const JSON_CONTENT_TYPE: &str = "application/json";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Called whenever the transport observes that the session is gone
///
/// The session manager installs its logout transition here so a 401 on
/// any call drives the same teardown as an explicit logout.
pub trait AuthFailureHandler: Send + Sync {
    fn on_auth_failure(&self);
}

impl<F> AuthFailureHandler for F
where
    F: Fn() + Send + Sync,
{
    fn on_auth_failure(&self) {
        self()
    }
}

/// Per-call request options
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Pre-encoded request body
    pub body: Option<String>,
    /// Extra headers; these override the default `Content-Type`
    pub headers: HeaderMap,
    /// Attach the stored token and fail fast without one
    pub requires_auth: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: HeaderMap::new(),
            requires_auth: true,
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Options for an endpoint that does not need a token
    pub fn public() -> Self {
        Self {
            requires_auth: false,
            ..Self::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn requires_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }
}

/// Authenticated client for the wellness backend
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    auth_failure: Option<Arc<dyn AuthFailureHandler>>,
}

impl ApiClient {
    /// Create a client with no auth-failure handler installed
    pub fn new(
        config: &ApiConfig,
        credentials: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.normalized_base_url().to_string(),
            credentials,
            notifier,
            auth_failure: None,
        })
    }

    /// Install the handler run on missing or rejected tokens
    pub fn with_auth_failure_handler(mut self, handler: Arc<dyn AuthFailureHandler>) -> Self {
        self.auth_failure = Some(handler);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn signal_auth_failure(&self) {
        if let Some(handler) = &self.auth_failure {
            handler.on_auth_failure();
        }
    }

    /// Issue a request and return the raw, unread response on 2xx
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Response> {
        let token = self.credentials.get().map(|c| c.token);

        if options.requires_auth && token.is_none() {
            tracing::debug!(endpoint, "Authenticated call attempted without a token");
            self.signal_auth_failure();
            self.notifier
                .notice(NoticeLevel::Error, "Please log in to continue");
            return Err(ApiError::Unauthenticated);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        if options.requires_auth {
            if let Some(token) = &token {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| ApiError::Encode(format!("invalid token header: {}", e)))?;
                headers.insert(AUTHORIZATION, value);
            }
        }

        let mut builder = self
            .client
            .request(options.method.clone(), self.url(endpoint))
            .headers(headers);
        if let Some(body) = options.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(endpoint, method = %options.method, error = %e, "Request failed");
            ApiError::Network(e)
        })?;

        let status = response.status();
        tracing::debug!(endpoint, method = %options.method, status = status.as_u16(), "Response received");

        if status == StatusCode::UNAUTHORIZED && options.requires_auth {
            if let Err(e) = self.credentials.clear() {
                tracing::error!(error = %e, "Failed to clear rejected credential");
            }
            self.notifier.notice(
                NoticeLevel::Error,
                "Your session has expired. Please log in again.",
            );
            self.signal_auth_failure();

            return Err(ApiError::SessionExpired {
                response: ResponseMeta::from_response(&response),
            });
        }

        if !status.is_success() {
            let meta = ResponseMeta::from_response(&response);
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Request failed".to_string());

            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
                response: meta,
            });
        }

        Ok(response)
    }

    pub async fn get(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Response> {
        self.request(endpoint, options.method(Method::GET)).await
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        data: Option<&T>,
        options: RequestOptions,
    ) -> ApiResult<Response> {
        let options = with_json_body(options.method(Method::POST), data)?;
        self.request(endpoint, options).await
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        data: Option<&T>,
        options: RequestOptions,
    ) -> ApiResult<Response> {
        let options = with_json_body(options.method(Method::PUT), data)?;
        self.request(endpoint, options).await
    }

    pub async fn delete(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Response> {
        self.request(endpoint, options.method(Method::DELETE)).await
    }

    /// POST `fields` as `application/x-www-form-urlencoded`
    pub async fn post_form(
        &self,
        endpoint: &str,
        fields: &[(&str, &str)],
        options: RequestOptions,
    ) -> ApiResult<Response> {
        let options = options
            .method(Method::POST)
            .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
            .body(encode_form(fields));
        self.request(endpoint, options).await
    }

    /// GET and decode a JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResult<T> {
        let response = self.get(endpoint, options).await?;
        read_json(response).await
    }
}

fn with_json_body<T: Serialize + ?Sized>(
    options: RequestOptions,
    data: Option<&T>,
) -> ApiResult<RequestOptions> {
    match data {
        Some(data) => {
            let body = serde_json::to_string(data).map_err(|e| ApiError::Encode(e.to_string()))?;
            Ok(options.body(body))
        }
        None => Ok(options),
    }
}

/// Encode key/value pairs as a URL form body
pub fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Read a whole response body as JSON
pub async fn read_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credential, MemoryCredentialStore};
    use crate::notify::testing::RecordingNotifier;
    use crate::test_support::{spawn_backend, Hits};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        client: ApiClient,
        store: Arc<MemoryCredentialStore>,
        notifier: Arc<RecordingNotifier>,
        logouts: Arc<AtomicUsize>,
    }

    fn fixture(base_url: &str, token: Option<&str>) -> Fixture {
        let store = Arc::new(match token {
            Some(t) => MemoryCredentialStore::with_credential(Credential::new(t)),
            None => MemoryCredentialStore::new(),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let logouts = Arc::new(AtomicUsize::new(0));

        let counter = logouts.clone();
        let config = ApiConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 5,
        };
        let client = ApiClient::new(&config, store.clone(), notifier.clone())
            .unwrap()
            .with_auth_failure_handler(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        Fixture {
            client,
            store,
            notifier,
            logouts,
        }
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_network() {
        let hits = Hits::default();
        let counter = hits.clone();
        let router = Router::new().route(
            "/users/me",
            get(move || {
                counter.hit();
                async { "{}" }
            }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base, None);

        let err = fx
            .client
            .get("/users/me", RequestOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Unauthenticated));
        assert_eq!(hits.count(), 0);
        assert_eq!(fx.logouts.load(Ordering::SeqCst), 1);
        assert_eq!(fx.notifier.messages(), vec!["Please log in to continue"]);
    }

    #[tokio::test]
    async fn test_bearer_header_attached() {
        let router = Router::new().route(
            "/users/me",
            get(|headers: AxumHeaders| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let content_type = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                format!("{}|{}", auth, content_type)
            }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base, Some("tok-123"));

        let response = fx
            .client
            .get("/users/me", RequestOptions::default())
            .await
            .unwrap();
        let body = response.text().await.unwrap();
        assert_eq!(body, "Bearer tok-123|application/json");
    }

    #[tokio::test]
    async fn test_public_call_skips_token() {
        let router = Router::new().route(
            "/public/about",
            get(|headers: AxumHeaders| async move {
                if headers.contains_key("authorization") {
                    "with-auth"
                } else {
                    "anonymous"
                }
            }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base, Some("tok-123"));

        let response = fx
            .client
            .get("/public/about", RequestOptions::public())
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), "anonymous");
    }

    #[tokio::test]
    async fn test_401_clears_credential_and_logs_out() {
        let router = Router::new().route(
            "/users/me",
            get(|| async { (AxumStatus::UNAUTHORIZED, r#"{"detail":"expired"}"#) }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base, Some("stale"));

        let err = fx
            .client
            .get("/users/me", RequestOptions::default())
            .await
            .unwrap_err();

        match err {
            ApiError::SessionExpired { response } => {
                assert_eq!(response.status, StatusCode::UNAUTHORIZED)
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(fx.store.get().is_none());
        assert_eq!(fx.logouts.load(Ordering::SeqCst), 1);
        assert_eq!(
            fx.notifier.messages(),
            vec!["Your session has expired. Please log in again."]
        );
    }

    #[tokio::test]
    async fn test_401_on_public_call_is_plain_http_error() {
        let router = Router::new().route(
            "/auth/login",
            post(|| async { (AxumStatus::UNAUTHORIZED, r#"{"detail":"Incorrect username or password"}"#) }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base, Some("keep-me"));

        let err = fx
            .client
            .post_form(
                "/auth/login",
                &[("username", "a@b.c"), ("password", "x")],
                RequestOptions::public(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(err.detail().as_deref(), Some("Incorrect username or password"));
        assert!(fx.store.get().is_some());
        assert_eq!(fx.logouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_2xx_carries_status_and_body() {
        let router = Router::new().route(
            "/users/live-sessions/missing",
            get(|| async { (AxumStatus::NOT_FOUND, "LiveSession not found") }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base, Some("tok"));

        let err = fx
            .client
            .get("/users/live-sessions/missing", RequestOptions::default())
            .await
            .unwrap_err();

        match err {
            ApiError::Http {
                status,
                message,
                response,
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "LiveSession not found");
                assert!(response.url.path().ends_with("/missing"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(fx.store.get().is_some());
    }

    #[tokio::test]
    async fn test_post_encodes_json_body() {
        let router = Router::new().route(
            "/device-controls/sound",
            post(|body: String| async move { body }),
        );
        let base = spawn_backend(router).await;
        let fx = fixture(&base, Some("tok"));

        let response = fx
            .client
            .post(
                "/device-controls/sound",
                Some(&serde_json::json!({ "sound": true })),
                RequestOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(response.text().await.unwrap(), r#"{"sound":true}"#);
    }

    #[tokio::test]
    async fn test_network_failure() {
        // Nothing listens on port 9 on the loopback interface
        let fx = fixture("http://127.0.0.1:9", Some("tok"));
        let err = fx
            .client
            .get("/users/me", RequestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert!(fx.store.get().is_some());
    }

    #[test]
    fn test_encode_form() {
        assert_eq!(
            encode_form(&[("username", "jane+x@example.com"), ("password", "a b&c")]),
            "username=jane%2Bx%40example.com&password=a%20b%26c"
        );
    }
}
