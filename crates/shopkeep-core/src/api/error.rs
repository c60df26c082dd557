use thiserror::Error;

/// Which identity endpoint produced a response.
///
/// Error codes are classified per endpoint: sign-up only distinguishes an
/// already registered email, sign-in distinguishes unknown email and bad password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignUp,
    SignIn,
}

impl AuthMode {
    pub fn endpoint(self) -> &'static str {
        match self {
            AuthMode::SignUp => "accounts:signUp",
            AuthMode::SignIn => "accounts:signInWithPassword",
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email is already registered")]
    EmailExists,

    #[error("Email not found")]
    EmailNotFound,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Identity provider rejected the request: {0}")]
    Unknown(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to persist session: {0}")]
    Storage(String),

    #[error("Session was logged out while the request was in flight")]
    Superseded,

    #[error("No identity API key configured")]
    MissingApiKey,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Map a provider error code to an error for the given endpoint.
    ///
    /// Codes may carry a trailing detail (`TOO_MANY_ATTEMPTS_TRY_LATER : ...`);
    /// only the leading code is matched.
    pub fn from_provider_code(mode: AuthMode, message: &str) -> Self {
        let code = message.split(" : ").next().unwrap_or(message).trim();
        match (mode, code) {
            (AuthMode::SignUp, "EMAIL_EXISTS") => AuthError::EmailExists,
            (AuthMode::SignIn, "EMAIL_NOT_FOUND") => AuthError::EmailNotFound,
            (AuthMode::SignIn, "INVALID_PASSWORD") => AuthError::InvalidPassword,
            _ => AuthError::Unknown(code.to_string()),
        }
    }

    /// Message suitable for showing to the user in an alert.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::EmailExists => "This email already exists!",
            AuthError::EmailNotFound => "This email could not be found!",
            AuthError::InvalidPassword => "This password is not valid!",
            _ => "Something went wrong!",
        }
    }

    /// True for errors reported by the identity provider itself, as opposed to
    /// transport, decoding or local failures.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            AuthError::EmailExists
                | AuthError::EmailNotFound
                | AuthError::InvalidPassword
                | AuthError::Unknown(_)
        )
    }
}
