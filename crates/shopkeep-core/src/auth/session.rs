use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage key holding the persisted session record
pub const STORAGE_KEY: &str = "userData";

/// An authenticated identity. Replaced wholesale, never patched.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: String,
    pub token: String,
    pub expiry_date: DateTime<Utc>,
}

impl SessionData {
    /// Build a session that expires `ttl` from now
    pub fn new(user_id: impl Into<String>, token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            expiry_date: expiry_after(Utc::now(), ttl),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry_date
    }

    pub fn time_until_expiry(&self) -> chrono::Duration {
        self.expiry_date - Utc::now()
    }

    /// Remaining lifetime, or `None` once expired
    pub fn remaining_ttl(&self) -> Option<Duration> {
        self.time_until_expiry()
            .to_std()
            .ok()
            .filter(|d| !d.is_zero())
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

impl fmt::Debug for SessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionData")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .field("expiry_date", &self.expiry_date)
            .finish()
    }
}

fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Why a persisted record could not be turned back into a session.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RestoreRejection {
    #[error("Persisted session is malformed: {0}")]
    Malformed(String),

    #[error("Persisted session has no token or user id")]
    MissingCredentials,

    #[error("Persisted session expired at {0}")]
    Expired(DateTime<Utc>),
}

/// The record written to the key-value store.
///
/// `expiryDate` is an ISO-8601 timestamp with millisecond precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub user_id: String,
    pub expiry_date: String,
}

impl PersistedSession {
    pub fn from_session(session: &SessionData) -> Self {
        Self {
            token: session.token.clone(),
            user_id: session.user_id.clone(),
            expiry_date: session
                .expiry_date
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn parse(raw: &str) -> Result<Self, RestoreRejection> {
        serde_json::from_str(raw).map_err(|e| RestoreRejection::Malformed(e.to_string()))
    }

    /// Validate the record against `now`. The expiry must be strictly in the future.
    pub fn into_session(self, now: DateTime<Utc>) -> Result<SessionData, RestoreRejection> {
        if self.token.is_empty() || self.user_id.is_empty() {
            return Err(RestoreRejection::MissingCredentials);
        }

        let expiry_date = DateTime::parse_from_rfc3339(&self.expiry_date)
            .map_err(|e| RestoreRejection::Malformed(format!("expiryDate: {}", e)))?
            .with_timezone(&Utc);

        if expiry_date <= now {
            return Err(RestoreRejection::Expired(expiry_date));
        }

        Ok(SessionData {
            user_id: self.user_id,
            token: self.token,
            expiry_date,
        })
    }
}

/// Where the session lifecycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Restoration has not run yet
    #[default]
    Unknown,
    Unauthenticated,
    Authenticated,
}

/// Everything a consumer may observe about the session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: AuthState,
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub did_try_auto_login: bool,
}

impl SessionSnapshot {
    pub(crate) fn new(session: Option<&SessionData>, did_try_auto_login: bool) -> Self {
        match session {
            Some(s) => Self {
                state: AuthState::Authenticated,
                user_id: Some(s.user_id.clone()),
                token: Some(s.token.clone()),
                expiry_date: Some(s.expiry_date),
                did_try_auto_login,
            },
            None => Self {
                state: if did_try_auto_login {
                    AuthState::Unauthenticated
                } else {
                    AuthState::Unknown
                },
                user_id: None,
                token: None,
                expiry_date: None,
                did_try_auto_login,
            },
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// True while a token is held and its expiry has not passed
    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
            && self.has_token()
            && self.expiry_date.is_some_and(|expiry| expiry > Utc::now())
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("state", &self.state)
            .field("user_id", &self.user_id)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("expiry_date", &self.expiry_date)
            .field("did_try_auto_login", &self.did_try_auto_login)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_expiry() {
        let session = SessionData::new("u", "t", Duration::from_secs(3600));
        assert!(!session.is_expired());
        assert!(session.minutes_until_expiry() >= 59);
        assert!(session.remaining_ttl().is_some());

        let mut old = session.clone();
        old.expiry_date = Utc::now() - chrono::Duration::seconds(1);
        assert!(old.is_expired());
        assert_eq!(old.remaining_ttl(), None);
        assert_eq!(old.minutes_until_expiry(), 0);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let session = SessionData::new("u", "t", Duration::from_secs(u64::MAX));
        assert_eq!(session.expiry_date, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_persisted_record_format() {
        let session = SessionData {
            user_id: "uid".into(),
            token: "tok".into(),
            expiry_date: Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap(),
        };
        let json = PersistedSession::from_session(&session).to_json().unwrap();
        assert_eq!(
            json,
            r#"{"token":"tok","userId":"uid","expiryDate":"2030-01-02T03:04:05.000Z"}"#
        );
    }

    #[test]
    fn test_restore_valid_record() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let raw = r#"{"token":"tok","userId":"uid","expiryDate":"2030-01-01T01:00:00.000Z"}"#;
        let session = PersistedSession::parse(raw).unwrap().into_session(now).unwrap();
        assert_eq!(session.user_id, "uid");
        assert_eq!(session.token, "tok");
        assert_eq!(session.expiry_date - now, chrono::Duration::hours(1));
    }

    #[test]
    fn test_restore_rejects_expired_and_exact_expiry() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let past = r#"{"token":"t","userId":"u","expiryDate":"2029-12-31T23:00:00.000Z"}"#;
        assert!(matches!(
            PersistedSession::parse(past).unwrap().into_session(now),
            Err(RestoreRejection::Expired(_))
        ));

        let exact = r#"{"token":"t","userId":"u","expiryDate":"2030-01-01T00:00:00.000Z"}"#;
        assert!(matches!(
            PersistedSession::parse(exact).unwrap().into_session(now),
            Err(RestoreRejection::Expired(_))
        ));
    }

    #[test]
    fn test_restore_rejects_missing_credentials() {
        let now = Utc::now();
        let raw = r#"{"userId":"u","expiryDate":"2999-01-01T00:00:00.000Z"}"#;
        assert_eq!(
            PersistedSession::parse(raw).unwrap().into_session(now),
            Err(RestoreRejection::MissingCredentials)
        );
    }

    #[test]
    fn test_restore_rejects_malformed() {
        assert!(matches!(
            PersistedSession::parse("not json"),
            Err(RestoreRejection::Malformed(_))
        ));
        assert!(matches!(
            PersistedSession::parse(r#"{"token":"t","userId":"u"}"#),
            Err(RestoreRejection::Malformed(_))
        ));
        let bad_date = r#"{"token":"t","userId":"u","expiryDate":"tomorrow"}"#;
        assert!(matches!(
            PersistedSession::parse(bad_date).unwrap().into_session(Utc::now()),
            Err(RestoreRejection::Malformed(_))
        ));
    }

    #[test]
    fn test_snapshot_states() {
        let unknown = SessionSnapshot::new(None, false);
        assert_eq!(unknown.state, AuthState::Unknown);
        assert!(!unknown.is_authenticated());

        let logged_out = SessionSnapshot::new(None, true);
        assert_eq!(logged_out.state, AuthState::Unauthenticated);

        let session = SessionData::new("u", "t", Duration::from_secs(60));
        let active = SessionSnapshot::new(Some(&session), false);
        assert_eq!(active.state, AuthState::Authenticated);
        assert!(active.is_authenticated());
        assert!(!format!("{:?}", active).contains("\"t\""));
    }

    #[test]
    fn test_snapshot_past_expiry_is_not_authenticated() {
        let mut session = SessionData::new("u", "t", Duration::from_secs(60));
        session.expiry_date = Utc::now() - chrono::Duration::seconds(5);
        let snapshot = SessionSnapshot::new(Some(&session), true);
        assert_eq!(snapshot.state, AuthState::Authenticated);
        assert!(snapshot.has_token());
        assert!(!snapshot.is_authenticated());
    }
}
