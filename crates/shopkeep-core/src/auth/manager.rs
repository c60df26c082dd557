//! Session lifecycle: acquire, persist, restore and expire.
//!
//! `SessionManager` owns the in-memory session and the single expiry timer.
//! The identity provider and the key-value store are collaborators it calls
//! but does not own. Callers must not overlap session-mutating calls; if a
//! `logout` lands while a signup or login is waiting on the provider, the
//! logout wins and the pending call fails with [`AuthError::Superseded`].
//!
//! Session lifetimes are capped at [`MAX_TIMER_DELAY`]. Expiries run on the
//! Tokio runtime that is current when a session is installed, or else the one
//! the manager was created under; a manager used entirely outside any runtime
//! still tracks expiry through the session's timestamp but cannot log out on
//! its own.
//!
//! Store calls are blocking and are made under the manager's lock, so
//! `signup`, `login`, `restore_session`, `logout` and expiry block the calling
//! thread for as long as the store takes. From async code on a
//! current-thread runtime, wrap the sync calls in `spawn_blocking` (the manager
//! is cheap to clone) when the store is slow, as the keychain can be.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::session::{PersistedSession, SessionData, SessionSnapshot, STORAGE_KEY};
use super::timer::{ExpiryTimer, MAX_TIMER_DELAY};
use crate::api::{AuthError, AuthMode, IdentityClient, IdentityProvider};
use crate::navigation::Route;
use crate::store::KeyValueStore;

struct Inner {
    session: Option<SessionData>,
    did_try_auto_login: bool,
    timer: ExpiryTimer,
    /// Bumped by every explicit logout; a signup/login that started in an
    /// older epoch is discarded. Expiry does not bump it.
    epoch: u64,
}

struct Shared<P, S> {
    provider: P,
    store: S,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<SessionSnapshot>,
}

/// Handle to the session lifecycle. Clone is cheap and shares state.
pub struct SessionManager<P = IdentityClient, S = Box<dyn KeyValueStore>> {
    shared: Arc<Shared<P, S>>,
}

impl<P, S> Clone for SessionManager<P, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: IdentityProvider, S: KeyValueStore> SessionManager<P, S> {
    pub fn new(provider: P, store: S) -> Self {
        let (state_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                provider,
                store,
                inner: Mutex::new(Inner {
                    session: None,
                    did_try_auto_login: false,
                    timer: ExpiryTimer::new(),
                    epoch: 0,
                }),
                state_tx,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, inner: &Inner) {
        self.shared.state_tx.send_replace(SessionSnapshot::new(
            inner.session.as_ref(),
            inner.did_try_auto_login,
        ));
    }

    // =========================================================================
    // Credential acquisition
    // =========================================================================

    /// Register a new account and start a session for it.
    pub async fn signup(&self, email: &str, password: &str) -> Result<SessionData, AuthError> {
        self.establish(AuthMode::SignUp, email, password).await
    }

    /// Sign in with an existing account.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionData, AuthError> {
        self.establish(AuthMode::SignIn, email, password).await
    }

    async fn establish(
        &self,
        mode: AuthMode,
        email: &str,
        password: &str,
    ) -> Result<SessionData, AuthError> {
        let epoch = self.lock().epoch;

        let result = match mode {
            AuthMode::SignUp => self.shared.provider.sign_up(email, password).await,
            AuthMode::SignIn => self.shared.provider.sign_in(email, password).await,
        };
        let grant = result.inspect_err(|e| {
            warn!(endpoint = mode.endpoint(), error = %e, "Authentication failed");
        })?;

        let ttl = grant.expires_in.min(MAX_TIMER_DELAY);
        let session = SessionData::new(grant.user_id, grant.token, ttl);
        let record = PersistedSession::from_session(&session)
            .to_json()
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            info!(endpoint = mode.endpoint(), "Discarding credentials, logged out during request");
            return Err(AuthError::Superseded);
        }

        self.shared
            .store
            .set(STORAGE_KEY, &record)
            .map_err(|e| AuthError::Storage(format!("{:#}", e)))?;

        self.install(&mut inner, session.clone(), ttl);
        self.publish(&inner);

        info!(
            user_id = %session.user_id,
            ttl_secs = ttl.as_secs(),
            "Authenticated"
        );
        Ok(session)
    }

    /// Make `user_id`/`token` the current session and expire it after `ttl`.
    ///
    /// Replaces any existing session and pending expiry. Touches neither the
    /// network nor the store. `ttl` is capped at [`MAX_TIMER_DELAY`].
    pub fn authenticate(
        &self,
        user_id: impl Into<String>,
        token: impl Into<String>,
        ttl: Duration,
    ) -> SessionData {
        let ttl = ttl.min(MAX_TIMER_DELAY);
        let session = SessionData::new(user_id, token, ttl);
        let mut inner = self.lock();
        self.install(&mut inner, session.clone(), ttl);
        self.publish(&inner);
        debug!(user_id = %session.user_id, ttl_secs = ttl.as_secs(), "Session installed");
        session
    }

    fn install(&self, inner: &mut Inner, session: SessionData, ttl: Duration) {
        let weak: Weak<Shared<P, S>> = Arc::downgrade(&self.shared);
        inner.timer.arm(ttl, move |generation| {
            if let Some(shared) = weak.upgrade() {
                SessionManager { shared }.expire(generation);
            }
        });

        inner.session = Some(session);
    }

    // =========================================================================
    // Restoration
    // =========================================================================

    /// Try to pick up a session persisted by a previous run.
    ///
    /// Never fails: unreadable, malformed, incomplete or expired data all mean
    /// "no session". Returns whether a session is active afterwards.
    pub fn restore_session(&self) -> bool {
        let mut inner = self.lock();
        if inner.did_try_auto_login {
            debug!("Session restore already attempted");
            return inner.session.is_some();
        }

        if inner.session.is_none() {
            if let Some((session, ttl)) = self.load_persisted() {
                info!(
                    user_id = %session.user_id,
                    ttl_secs = ttl.as_secs(),
                    "Restored persisted session"
                );
                self.install(&mut inner, session, ttl.min(MAX_TIMER_DELAY));
            }
        }

        inner.did_try_auto_login = true;
        self.publish(&inner);
        inner.session.is_some()
    }

    fn load_persisted(&self) -> Option<(SessionData, Duration)> {
        let raw = match self.shared.store.get(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No persisted session");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session");
                return None;
            }
        };

        let validated = PersistedSession::parse(&raw)
            .and_then(|record| record.into_session(Utc::now()))
            .map(|session| {
                let ttl = session.remaining_ttl();
                (session, ttl)
            });

        match validated {
            Ok((session, Some(ttl))) => Some((session, ttl)),
            Ok((_, None)) => {
                debug!("Persisted session expired while restoring");
                self.discard_persisted();
                None
            }
            Err(rejection) => {
                info!(reason = %rejection, "Discarding persisted session");
                self.discard_persisted();
                None
            }
        }
    }

    fn discard_persisted(&self) {
        if let Err(e) = self.shared.store.remove(STORAGE_KEY) {
            warn!(error = %e, "Failed to remove persisted session");
        }
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// End the session: cancel the expiry, forget the session, delete the
    /// persisted record. Safe to call when logged out.
    pub fn logout(&self) -> anyhow::Result<()> {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.timer.cancel();
        let had_session = inner.session.take().is_some();
        self.publish(&inner);

        if had_session {
            info!("Logged out");
        }

        self.shared.store.remove(STORAGE_KEY)
    }

    fn expire(&self, generation: u64) {
        let mut inner = self.lock();
        if !inner.timer.complete(generation) {
            debug!(generation, "Ignoring superseded expiry");
            return;
        }

        info!("Session expired");
        inner.session = None;
        self.publish(&inner);
        self.discard_persisted();
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.state_tx.borrow().clone()
    }

    /// Receive every state transition
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.state_tx.subscribe()
    }

    pub fn route(&self) -> Route {
        Route::from_snapshot(&self.snapshot())
    }

    pub fn did_try_auto_login(&self) -> bool {
        self.lock().did_try_auto_login
    }

    /// True while a session is held and its expiry has not passed
    pub fn is_authenticated(&self) -> bool {
        self.lock()
            .session
            .as_ref()
            .is_some_and(|s| !s.is_expired())
    }

    /// The bearer token, if the session is still valid
    pub fn token(&self) -> Option<String> {
        self.session().map(|s| s.token)
    }

    pub fn user_id(&self) -> Option<String> {
        self.session().map(|s| s.user_id)
    }

    /// The current session, if present and not yet expired
    pub fn session(&self) -> Option<SessionData> {
        self.lock()
            .session
            .as_ref()
            .filter(|s| !s.is_expired())
            .cloned()
    }

    /// Time until the pending expiry fires
    pub fn expires_in(&self) -> Option<Duration> {
        self.lock().timer.remaining()
    }

    pub fn has_pending_expiry(&self) -> bool {
        self.lock().timer.is_armed()
    }
}
