//! Session lifecycle: who is signed in, and as which role.
//!
//! [`SessionManager`] is the single writer of the persisted credential pair
//! and the owner of the [`ApiClient`] whose bearer slot carries it. Every
//! state change replaces the whole [`Session`] snapshot in a `watch` channel,
//! so observers never see a token without its role.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

use crate::api::ApiClient;
use crate::error::Error;
use crate::store::{CredentialStore, ROLE_KEY, TOKEN_KEY};
use crate::types::{AccessToken, Role, UserProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup credentials are still being checked against the backend.
    Loading,
    Authenticated,
    Anonymous,
}

/// Token and role, which only ever exist together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: AccessToken,
    pub role: Role,
}

/// Snapshot of the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    credentials: Option<Credentials>,
    profile: Option<UserProfile>,
    status: SessionStatus,
}

impl Session {
    /// State at process start, before [`SessionManager::initialize`] finishes.
    #[must_use]
    pub fn loading() -> Self {
        Self {
            credentials: None,
            profile: None,
            status: SessionStatus::Loading,
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            credentials: None,
            profile: None,
            status: SessionStatus::Anonymous,
        }
    }

    #[must_use]
    pub fn authenticated(credentials: Credentials, profile: UserProfile) -> Self {
        Self {
            credentials: Some(credentials),
            profile: Some(profile),
            status: SessionStatus::Authenticated,
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&AccessToken> {
        self.credentials.as_ref().map(|c| &c.token)
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.credentials.as_ref().map(|c| c.role)
    }

    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }
}

/// Owns the session, its durable copy and the API client's bearer credential.
///
/// All methods take `&self`; share it behind an `Arc` if several tasks need it.
///
/// ```rust,ignore
/// let manager = SessionManager::new(ApiClient::new(config), FileStore::open(path)?);
/// manager.initialize().await;
///
/// if !manager.snapshot().is_authenticated() {
///     manager.login("demo@take2studio.com", "demo123", Role::Client).await;
/// }
/// ```
pub struct SessionManager<S> {
    api: ApiClient,
    store: S,
    state: watch::Sender<Session>,
    login_in_flight: AtomicBool,
}

impl<S: CredentialStore> SessionManager<S> {
    /// Create a manager in the [`Loading`](SessionStatus::Loading) state.
    /// Nothing is read until [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(api: ApiClient, store: S) -> Self {
        let (state, _) = watch::channel(Session::loading());
        Self {
            api,
            store,
            state,
            login_in_flight: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified on every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Restore the persisted session, if any, and validate it by fetching the
    /// profile. Ends `Authenticated` or `Anonymous`.
    pub async fn initialize(&self) {
        self.state.send_replace(Session::loading());

        let Some(credentials) = self.read_persisted() else {
            tracing::debug!("No persisted session");
            self.api.clear_bearer();
            self.state.send_replace(Session::anonymous());
            return;
        };

        let role = credentials.role;
        tracing::debug!(role = %role, "Restoring persisted session");
        self.api.set_bearer(credentials.token.clone());
        self.state.send_modify(|s| s.credentials = Some(credentials));

        self.fetch_profile(role).await;
    }

    /// Load the profile for the current token from the role's profile endpoint.
    ///
    /// Any failure signs the session out: persisted entries and the bearer
    /// credential are removed and the status becomes `Anonymous`. The same
    /// happens if this future is dropped before the backend answers, or if
    /// `role` is not the role the session's token was issued for.
    pub async fn fetch_profile(&self, role: Role) {
        let credentials = self.state.borrow().credentials().cloned();
        let Some(Credentials { token, role: active }) = credentials else {
            tracing::warn!(role = %role, "Profile requested without a session");
            self.reset();
            return;
        };
        if active != role {
            tracing::warn!(
                role = %role,
                active = %active,
                "Profile role does not match the session, signing out"
            );
            self.reset();
            return;
        }

        let pending = PendingProfile {
            manager: self,
            token: &token,
            armed: true,
        };
        let result = self.api.profile(role).await;
        pending.disarm();

        match result {
            Ok(profile) => {
                let user = profile.display_name().to_owned();
                let applied = self.state.send_if_modified(|s| {
                    if s.token() != Some(&token) {
                        return false;
                    }
                    s.profile = Some(profile);
                    s.status = SessionStatus::Authenticated;
                    true
                });
                if applied {
                    tracing::info!(role = %role, user = %user, "Session authenticated");
                } else {
                    tracing::debug!(role = %role, "Discarding profile for a replaced session");
                }
            }
            Err(e) => {
                if self.demote_if_current(&token) {
                    tracing::warn!(role = %role, error = %e, "Profile fetch failed, signed out");
                }
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// Returns `true` once the token is persisted, attached and the profile
    /// loaded. Every failure (bad credentials, network, undecodable response)
    /// is logged and returns `false`; a rejected login leaves storage and the
    /// session exactly as they were. A call made while another login is still
    /// pending returns `false` without touching the network.
    pub async fn login(&self, email: &str, password: &str, role: Role) -> bool {
        let Some(_in_flight) = InFlight::acquire(&self.login_in_flight) else {
            tracing::warn!(role = %role, "Login already in progress");
            return false;
        };

        let token = match self.api.login(role, email, password).await {
            Ok(response) => response.access_token,
            Err(e) => {
                tracing::warn!(role = %role, error = %e, "Login rejected");
                return false;
            }
        };

        if let Err(e) = self.persist(&token, role) {
            tracing::error!(role = %role, error = %e, "Could not persist session");
            self.reset();
            return false;
        }
        self.api.set_bearer(token.clone());
        self.state.send_modify(|s| {
            s.credentials = Some(Credentials { token, role });
            s.profile = None;
            s.status = SessionStatus::Loading;
        });

        self.fetch_profile(role).await;
        self.state.borrow().is_authenticated()
    }

    /// Forget the session locally. No request is sent to the backend.
    pub fn logout(&self) {
        tracing::info!("Signing out");
        self.reset();
    }

    /// Create a client account. The new account is not signed in.
    ///
    /// # Errors
    ///
    /// Returns the backend or transport error unchanged.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, Error> {
        self.api.register(name, email, password).await
    }

    /// Ask the backend to create its demo data. Failure is expected once the
    /// data exists and is ignored.
    pub async fn seed_demo_data(&self) {
        match self.api.seed().await {
            Ok(()) => tracing::debug!("Demo data seeded"),
            Err(e) => tracing::debug!(error = %e, "Demo seed skipped"),
        }
    }

    fn read_persisted(&self) -> Option<Credentials> {
        let token = self.read_entry(TOKEN_KEY);
        let role = self.read_entry(ROLE_KEY);

        match (token, role) {
            (None, None) => return None,
            (Some(token), Some(role)) => match role.parse::<Role>() {
                Ok(role) => {
                    return Some(Credentials {
                        token: token.into(),
                        role,
                    });
                }
                Err(e) => tracing::warn!(error = %e, "Discarding persisted session"),
            },
            _ => tracing::warn!("Discarding incomplete persisted session"),
        }

        self.clear_persisted();
        None
    }

    fn read_entry(&self, key: &str) -> Option<String> {
        self.store.get(key).unwrap_or_else(|e| {
            tracing::warn!(key, error = %e, "Could not read session storage");
            None
        })
    }

    fn persist(&self, token: &AccessToken, role: Role) -> Result<(), Error> {
        self.store.set(TOKEN_KEY, token.as_str())?;
        self.store.set(ROLE_KEY, role.as_str())
    }

    fn clear_persisted(&self) {
        for key in [TOKEN_KEY, ROLE_KEY] {
            if let Err(e) = self.store.remove(key) {
                tracing::warn!(key, error = %e, "Could not clear session storage");
            }
        }
    }

    fn reset(&self) {
        self.clear_persisted();
        self.api.clear_bearer();
        self.state.send_replace(Session::anonymous());
    }

    /// Sign out, but only if `token` is still the active one.
    fn demote_if_current(&self, token: &AccessToken) -> bool {
        let current = self.state.borrow().token() == Some(token);
        if current {
            self.reset();
        }
        current
    }
}

/// Signs the session out if a profile fetch is abandoned mid-flight.
struct PendingProfile<'a, S: CredentialStore> {
    manager: &'a SessionManager<S>,
    token: &'a AccessToken,
    armed: bool,
}

impl<S: CredentialStore> PendingProfile<'_, S> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<S: CredentialStore> Drop for PendingProfile<'_, S> {
    fn drop(&mut self) {
        if self.armed && self.manager.demote_if_current(self.token) {
            tracing::warn!("Profile fetch abandoned, signed out");
        }
    }
}

/// Held for the duration of a login; released on drop.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
