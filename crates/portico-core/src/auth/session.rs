use std::sync::{Arc, OnceLock};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use super::claims::UserIdentity;
use super::clock::Clock;
use super::credentials::CredentialStore;
use super::evaluator::{Evaluation, SessionEvaluator};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session accessed before the session provider was mounted")]
    NotMounted,
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Initializing,
    Authenticated(UserIdentity),
    Anonymous,
}

/// Snapshot published by the session context.
///
/// `is_logged_in` always equals `user.is_some()`; the fields are private so
/// that only the constructors below can build a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    user: Option<UserIdentity>,
    is_logged_in: bool,
    loading: bool,
}

impl SessionState {
    pub fn initializing() -> Self {
        Self {
            user: None,
            is_logged_in: false,
            loading: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user: None,
            is_logged_in: false,
            loading: false,
        }
    }

    pub fn authenticated(user: UserIdentity) -> Self {
        Self {
            user: Some(user),
            is_logged_in: true,
            loading: false,
        }
    }

    pub fn from_evaluation(evaluation: Evaluation) -> Self {
        match evaluation.into_identity() {
            Some(user) => Self::authenticated(user),
            None => Self::anonymous(),
        }
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> SessionPhase {
        match (&self.user, self.loading) {
            (_, true) => SessionPhase::Initializing,
            (Some(user), false) => SessionPhase::Authenticated(user.clone()),
            (None, false) => SessionPhase::Anonymous,
        }
    }
}

/// The application's view of who is signed in.
///
/// Created once per application run. Creation evaluates the stored token
/// synchronously and leaves the `Initializing` phase for good; afterwards the
/// state only changes through [`refresh_user`](Self::refresh_user) and
/// [`logout`](Self::logout).
///
/// There is no timer: a token that expires while the application runs keeps
/// the session authenticated until the next `refresh_user`. Callers about to
/// do something privileged should refresh first.
pub struct SessionContext {
    store: CredentialStore,
    evaluator: SessionEvaluator,
    state: watch::Sender<SessionState>,
}

impl SessionContext {
    pub fn mount(store: CredentialStore, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(SessionState::initializing());
        let context = Self {
            evaluator: SessionEvaluator::new(store.clone(), clock),
            store,
            state,
        };

        let initial = SessionState::from_evaluation(context.evaluator.evaluate());
        info!(logged_in = initial.is_logged_in(), "Session initialized");
        context.state.send_replace(initial);
        context
    }

    /// Current snapshot
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified whenever the published state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.state.borrow().user().cloned()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().is_logged_in()
    }

    /// Re-evaluate the stored token and publish the result
    pub fn refresh_user(&self) -> SessionState {
        let evaluation = self.evaluator.evaluate();
        match &evaluation {
            Evaluation::Valid { identity, .. } => debug!(user_id = %identity.id, "Session refreshed"),
            Evaluation::Missing => debug!("Session refreshed, no token stored"),
            Evaluation::Corrupt(_) => debug!("Session refreshed, stored token unreadable"),
            Evaluation::Expired { expires_at } => {
                debug!(expires_at = %expires_at, "Session refreshed, token expired")
            }
        }
        self.publish(SessionState::from_evaluation(evaluation))
    }

    /// Store a freshly issued token and refresh
    pub fn accept_token(&self, token: &str) -> SessionState {
        self.store.set(token);
        self.refresh_user()
    }

    /// Forget the stored token. Always ends anonymous.
    pub fn logout(&self) -> SessionState {
        self.store.clear();
        info!("Logged out");
        self.publish(SessionState::anonymous())
    }

    /// Minutes left on the current token, re-evaluated now
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.evaluator.minutes_until_expiry()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    fn publish(&self, next: SessionState) -> SessionState {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        next
    }
}

/// Owns the single [`SessionContext`] of an application run.
///
/// Surfaces that need the session receive a reference to the provider and
/// ask it for the context; asking before [`mount`](Self::mount) is a wiring
/// bug and returns [`SessionError::NotMounted`].
#[derive(Default)]
pub struct SessionProvider {
    context: OnceLock<SessionContext>,
}

impl SessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount the session. Only the first call creates a context; later calls
    /// return the existing one and ignore their arguments.
    pub fn mount(&self, store: CredentialStore, clock: Arc<dyn Clock>) -> &SessionContext {
        if let Some(existing) = self.context.get() {
            debug!("Session already mounted");
            return existing;
        }
        self.context
            .get_or_init(|| SessionContext::mount(store, clock))
    }

    pub fn session(&self) -> Result<&SessionContext, SessionError> {
        self.context.get().ok_or(SessionError::NotMounted)
    }

    pub fn is_mounted(&self) -> bool {
        self.context.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::FixedClock;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn mint(sub: &str, email: &str, exp: i64) -> String {
        encode(
            &Header::default(),
            &json!({"sub": sub, "email": email, "exp": exp}),
            &EncodingKey::from_secret(b"server-secret"),
        )
        .expect("Failed to encode test token")
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::at_epoch_seconds(NOW))
    }

    fn user(id: &str, email: &str) -> UserIdentity {
        UserIdentity {
            id: id.to_string(),
            email: email.to_string(),
            name: None,
            role: None,
        }
    }

    #[test]
    fn test_state_invariants() {
        let initializing = SessionState::initializing();
        assert!(initializing.loading());
        assert!(!initializing.is_logged_in());
        assert_eq!(initializing.phase(), SessionPhase::Initializing);

        let anonymous = SessionState::anonymous();
        assert!(!anonymous.loading());
        assert_eq!(anonymous.is_logged_in(), anonymous.user().is_some());
        assert_eq!(anonymous.phase(), SessionPhase::Anonymous);

        let authenticated = SessionState::authenticated(user("u1", "a@b.com"));
        assert!(!authenticated.loading());
        assert_eq!(authenticated.is_logged_in(), authenticated.user().is_some());
        assert_eq!(
            authenticated.phase(),
            SessionPhase::Authenticated(user("u1", "a@b.com"))
        );
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let json = serde_json::to_value(SessionState::authenticated(user("u1", "a@b.com")))
            .expect("serialize state");
        assert_eq!(
            json,
            json!({
                "user": {"id": "u1", "email": "a@b.com"},
                "isLoggedIn": true,
                "loading": false
            })
        );
        let json = serde_json::to_value(SessionState::anonymous()).expect("serialize state");
        assert_eq!(json, json!({"user": null, "isLoggedIn": false, "loading": false}));
    }

    #[test]
    fn test_scenario_no_token_at_startup() {
        let session = SessionContext::mount(CredentialStore::in_memory(), clock());
        let state = session.state();
        assert!(!state.loading());
        assert!(!state.is_logged_in());
        assert_eq!(state.user(), None);
    }

    #[test]
    fn test_mount_with_valid_token_is_authenticated() {
        let store = CredentialStore::in_memory();
        store.set(&mint("u1", "a@b.com", NOW + 3600));
        let session = SessionContext::mount(store, clock());
        assert_eq!(session.user(), Some(user("u1", "a@b.com")));
        assert!(!session.state().loading());
    }

    #[test]
    fn test_scenario_login_then_refresh() {
        let session = SessionContext::mount(CredentialStore::in_memory(), clock());
        session.credentials().set(&mint("u1", "a@b.com", NOW + 3600));

        let state = session.refresh_user();
        assert!(state.is_logged_in());
        assert_eq!(state.user(), Some(&user("u1", "a@b.com")));
        assert_eq!(session.state(), state);
    }

    #[test]
    fn test_scenario_expired_token() {
        let session = SessionContext::mount(CredentialStore::in_memory(), clock());
        session.credentials().set(&mint("u1", "a@b.com", NOW - 10));

        let state = session.refresh_user();
        assert!(!state.is_logged_in());
        assert_eq!(state.user(), None);
    }

    #[test]
    fn test_scenario_logout_after_login() {
        let session = SessionContext::mount(CredentialStore::in_memory(), clock());
        session.accept_token(&mint("u1", "a@b.com", NOW + 3600));
        assert!(session.is_logged_in());

        let state = session.logout();
        assert!(!state.is_logged_in());
        assert_eq!(state.user(), None);
        assert_eq!(session.credentials().get(), None);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let session = SessionContext::mount(CredentialStore::in_memory(), clock());
        session.credentials().set(&mint("u1", "a@b.com", NOW + 3600));
        let first = session.refresh_user();
        let second = session.refresh_user();
        assert_eq!(first, second);
    }

    #[test]
    fn test_logout_then_refresh_without_token() {
        let session = SessionContext::mount(CredentialStore::in_memory(), clock());
        session.logout();
        session.logout();
        assert_eq!(session.refresh_user(), SessionState::anonymous());
    }

    #[test]
    fn test_loading_never_returns() {
        let session = SessionContext::mount(CredentialStore::in_memory(), clock());
        assert!(!session.state().loading());
        session.accept_token(&mint("u1", "a@b.com", NOW + 3600));
        assert!(!session.state().loading());
        session.logout();
        assert!(!session.state().loading());
        session.refresh_user();
        assert!(!session.state().loading());
    }

    #[test]
    fn test_expiry_is_only_noticed_on_refresh() {
        let clock = clock();
        let store = CredentialStore::in_memory();
        store.set(&mint("u1", "a@b.com", NOW + 60));
        let session = SessionContext::mount(store, clock.clone());
        assert!(session.is_logged_in());

        clock.advance(Duration::seconds(120));
        // Published state is stale until someone refreshes
        assert!(session.is_logged_in());
        assert!(!session.refresh_user().is_logged_in());
    }

    #[test]
    fn test_subscribers_see_changes_only() {
        let session = SessionContext::mount(CredentialStore::in_memory(), clock());
        let mut rx = session.subscribe();
        assert!(!rx.has_changed().expect("sender alive"));

        session.refresh_user();
        assert!(!rx.has_changed().expect("sender alive"));

        session.accept_token(&mint("u1", "a@b.com", NOW + 3600));
        assert!(rx.has_changed().expect("sender alive"));
        assert!(rx.borrow_and_update().is_logged_in());

        session.logout();
        assert!(rx.has_changed().expect("sender alive"));
        assert!(!rx.borrow_and_update().is_logged_in());
    }

    #[test]
    fn test_unavailable_storage_is_anonymous() {
        let session = SessionContext::mount(CredentialStore::unavailable(), clock());
        assert!(!session.accept_token(&mint("u1", "a@b.com", NOW + 3600)).is_logged_in());
    }

    #[test]
    fn test_provider_requires_mount() {
        let provider = SessionProvider::new();
        assert!(!provider.is_mounted());
        assert_eq!(provider.session().err(), Some(SessionError::NotMounted));
    }

    #[test]
    fn test_provider_mounts_once() {
        let provider = SessionProvider::new();
        let store = CredentialStore::in_memory();
        store.set(&mint("u1", "a@b.com", NOW + 3600));
        provider.mount(store, clock());

        // A second mount with different storage keeps the original context
        provider.mount(CredentialStore::unavailable(), clock());
        let session = provider.session().expect("mounted");
        assert!(session.is_logged_in());
        assert!(session.credentials().is_available());
    }
}
