//! Session / Identity Manager
//!
//! Owns the `anonymous -> loading -> authenticated` state machine and the
//! login, signup and logout flows. The logout transition is installed on
//! the [`ApiClient`] as its auth-failure handler, so a 401 anywhere ends
//! the session the same way an explicit logout does.

use super::error::{SessionError, SessionResult};
use super::guard::{evaluate_admin, evaluate_auth, GuardOutcome};
use super::types::{AuthState, SignupData, TokenPair, User};
use crate::api::{is_token_expired, read_json, ApiClient, ApiError, AuthFailureHandler, RequestOptions};
use crate::config::ApiConfig;
use crate::credentials::{Credential, CredentialStore, SessionFlags};
use crate::notify::{NoticeLevel, Notifier, Route};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

const LOGIN_ENDPOINT: &str = "/auth/login";
const ADMIN_LOGIN_ENDPOINT: &str = "/auth/admin-login";
const SIGNUP_ENDPOINT: &str = "/auth/signup";
const REFRESH_ENDPOINT: &str = "/auth/refresh";
const CURRENT_USER_ENDPOINT: &str = "/users/me";

/// Which login endpoint, and where to land afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginKind {
    User,
    Admin,
}

impl LoginKind {
    fn endpoint(self) -> &'static str {
        match self {
            LoginKind::User => LOGIN_ENDPOINT,
            LoginKind::Admin => ADMIN_LOGIN_ENDPOINT,
        }
    }

    fn landing(self) -> Route {
        match self {
            LoginKind::User => Route::Dashboard,
            LoginKind::Admin => Route::AdminDashboard,
        }
    }

    fn success_message(self) -> &'static str {
        match self {
            LoginKind::User => "Login successful!",
            LoginKind::Admin => "Admin login successful!",
        }
    }
}

/// State shared with the API client's auth-failure hook
struct Identity {
    state: watch::Sender<AuthState>,
    credentials: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
}

impl Identity {
    fn set(&self, state: AuthState) {
        self.state.send_replace(state);
    }

    /// Drop the credential and the user without navigating anywhere
    fn reset(&self) {
        if let Err(e) = self.credentials.clear() {
            tracing::error!(error = %e, "Failed to clear credential");
        }
        self.set(AuthState::Anonymous);
    }

    fn logout(&self) {
        self.reset();
        self.notifier.navigate(Route::Login);
    }
}

impl AuthFailureHandler for Identity {
    fn on_auth_failure(&self) {
        tracing::info!("Session ended by the backend");
        self.logout();
    }
}

/// Current-user state and the flows that change it
pub struct SessionManager {
    api: ApiClient,
    identity: Arc<Identity>,
    flags: Arc<SessionFlags>,
    /// Set once a bootstrap or login has taken over the `Loading` state
    driven: AtomicBool,
}

impl SessionManager {
    /// Build the manager and its API client
    ///
    /// Starts in `Loading` when a credential is already stored, so guards
    /// wait for [`bootstrap`](Self::bootstrap) instead of redirecting.
    pub fn new(
        config: &ApiConfig,
        credentials: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        flags: Arc<SessionFlags>,
    ) -> SessionResult<Self> {
        let initial = if credentials.get().is_some() {
            AuthState::Loading
        } else {
            AuthState::Anonymous
        };
        let (state, _) = watch::channel(initial);

        let identity = Arc::new(Identity {
            state,
            credentials: credentials.clone(),
            notifier: notifier.clone(),
        });

        let api = ApiClient::new(config, credentials, notifier)?
            .with_auth_failure_handler(identity.clone());

        Ok(Self {
            api,
            identity,
            flags,
            driven: AtomicBool::new(false),
        })
    }

    /// The client carrying this manager's auth-failure handler
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn flags(&self) -> &Arc<SessionFlags> {
        &self.flags
    }

    pub fn state(&self) -> AuthState {
        self.identity.state.borrow().clone()
    }

    /// Watch identity transitions
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.identity.state.subscribe()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state(), AuthState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    /// Restore identity from a stored token
    pub async fn bootstrap(&self) -> Option<User> {
        self.driven.store(true, Ordering::SeqCst);

        let Some(credential) = self.identity.credentials.get() else {
            self.identity.set(AuthState::Anonymous);
            return None;
        };

        if is_token_expired(&credential.token) {
            tracing::info!("Stored token has expired, discarding");
            self.identity.reset();
            return None;
        }

        self.identity.set(AuthState::Loading);

        match self.fetch_current_user().await {
            Ok(user) => {
                tracing::info!(email = %user.email, admin = user.is_admin(), "Session restored");
                self.identity.set(AuthState::Authenticated(user.clone()));
                Some(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not restore session");
                self.identity.reset();
                None
            }
        }
    }

    async fn fetch_current_user(&self) -> Result<User, ApiError> {
        self.api
            .get_json(CURRENT_USER_ENDPOINT, RequestOptions::default())
            .await
    }

    /// Sign in and land on the dashboard
    pub async fn login(&self, email: &str, password: &str) -> SessionResult<User> {
        self.login_as(LoginKind::User, email, password, None).await
    }

    /// Sign in and land on `redirect`, e.g. the page a guard bounced from
    pub async fn login_with_redirect(
        &self,
        email: &str,
        password: &str,
        redirect: Route,
    ) -> SessionResult<User> {
        self.login_as(LoginKind::User, email, password, Some(redirect))
            .await
    }

    /// Sign in through the admin endpoint; non-admins are refused
    pub async fn admin_login(&self, email: &str, password: &str) -> SessionResult<User> {
        self.login_as(LoginKind::Admin, email, password, None).await
    }

    async fn login_as(
        &self,
        kind: LoginKind,
        email: &str,
        password: &str,
        redirect: Option<Route>,
    ) -> SessionResult<User> {
        self.driven.store(true, Ordering::SeqCst);
        self.identity.set(AuthState::Loading);

        match self.authenticate(kind, email, password).await {
            Ok(user) => {
                tracing::info!(email = %user.email, admin = user.is_admin(), "Logged in");
                self.flags.clear_pending();
                self.identity.set(AuthState::Authenticated(user.clone()));

                let notifier = &self.identity.notifier;
                notifier.notice(NoticeLevel::Success, kind.success_message());
                notifier.navigate(match kind {
                    LoginKind::User => redirect.unwrap_or_else(|| kind.landing()),
                    LoginKind::Admin => kind.landing(),
                });
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(email, error = %e, "Login failed");
                self.identity.reset();

                let notifier = &self.identity.notifier;
                notifier.notice(NoticeLevel::Error, &e.to_string());
                if matches!(e, SessionError::AccountPending) {
                    self.flags.mark_pending(email);
                    notifier.navigate(Route::PendingApproval);
                }
                Err(e)
            }
        }
    }

    async fn authenticate(&self, kind: LoginKind, email: &str, password: &str) -> SessionResult<User> {
        let response = self
            .api
            .post_form(
                kind.endpoint(),
                &[("username", email), ("password", password)],
                RequestOptions::public(),
            )
            .await
            .map_err(SessionError::from_login_failure)?;

        let tokens: TokenPair = read_json(response).await?;
        self.store_tokens(tokens)?;

        let user = self.fetch_current_user().await?;
        if kind == LoginKind::Admin && !user.is_admin() {
            return Err(SessionError::NotAdmin);
        }

        Ok(user)
    }

    fn store_tokens(&self, tokens: TokenPair) -> SessionResult<()> {
        let mut credential = Credential::new(tokens.access_token);
        if let Some(refresh_token) = tokens.refresh_token {
            credential = credential.with_refresh_token(refresh_token);
        }
        self.identity.credentials.set(credential)?;
        Ok(())
    }

    /// Register a new account; does not sign in
    pub async fn signup(&self, data: &SignupData) -> SessionResult<()> {
        let notifier = &self.identity.notifier;

        let result = self
            .api
            .post(SIGNUP_ENDPOINT, Some(data), RequestOptions::public())
            .await;

        match result {
            Ok(_) => {
                tracing::info!(email = %data.email, "Signed up");
                notifier.notice(NoticeLevel::Success, "Signup successful! Please log in.");
                notifier.navigate(Route::Login);
                Ok(())
            }
            Err(e) => {
                let err = match e.detail() {
                    Some(detail) if !detail.is_empty() => SessionError::Rejected(detail),
                    Some(_) => SessionError::Rejected("Signup failed".to_string()),
                    None => SessionError::Api(e),
                };
                tracing::warn!(email = %data.email, error = %err, "Signup failed");
                notifier.notice(NoticeLevel::Error, &err.to_string());
                Err(err)
            }
        }
    }

    /// Clear the credential and return to the login view. Idempotent.
    pub fn logout(&self) {
        tracing::info!("Logging out");
        self.identity.logout();
    }

    /// Exchange the stored refresh token for a new token pair
    pub async fn refresh(&self) -> SessionResult<()> {
        let refresh_token = self
            .identity
            .credentials
            .get()
            .and_then(|c| c.refresh_token)
            .ok_or(SessionError::NoRefreshToken)?;

        let endpoint = format!(
            "{}?refresh_token={}",
            REFRESH_ENDPOINT,
            urlencoding::encode(&refresh_token)
        );

        let response = self
            .api
            .post::<()>(&endpoint, None, RequestOptions::public())
            .await?;
        let tokens: TokenPair = read_json(response).await?;
        self.store_tokens(tokens)?;

        tracing::debug!("Token refreshed");
        Ok(())
    }

    /// Identity once it leaves `Loading`
    ///
    /// A stored credential nobody has started restoring is restored here,
    /// otherwise this would wait forever.
    async fn settled(&self) -> AuthState {
        if self.is_loading() && !self.driven.load(Ordering::SeqCst) {
            tracing::debug!("Guard restoring the stored session");
            self.bootstrap().await;
        }

        let mut rx = self.subscribe();
        let state = match rx.wait_for(|s| !s.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => AuthState::Anonymous,
        };
        state
    }

    fn enforce(&self, outcome: GuardOutcome) -> SessionResult<User> {
        match outcome {
            GuardOutcome::Allow(user) => Ok(user),
            GuardOutcome::Redirect { route, notice } => {
                let notifier = &self.identity.notifier;
                if let Some(message) = notice {
                    notifier.notice(NoticeLevel::Error, message);
                }
                notifier.navigate(route.clone());
                Err(SessionError::AccessDenied(route))
            }
            GuardOutcome::Pending => Err(SessionError::AccessDenied(Route::Login)),
        }
    }

    /// Wait for identity to settle, then require a signed-in user
    ///
    /// Runs [`bootstrap`](Self::bootstrap) first if a stored credential has
    /// not been restored yet.
    pub async fn require_auth(&self) -> SessionResult<User> {
        let state = self.settled().await;
        self.enforce(evaluate_auth(&state))
    }

    /// Wait for identity to settle, then require an admin
    ///
    /// Restores a stored credential the same way as
    /// [`require_auth`](Self::require_auth).
    pub async fn require_admin(&self) -> SessionResult<User> {
        let state = self.settled().await;
        self.enforce(evaluate_admin(&state))
    }
}
