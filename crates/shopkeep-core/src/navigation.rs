//! Which top-level flow to present for a given session state.

use crate::auth::SessionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Auto-login has not been attempted yet; show a spinner
    Startup,
    /// Signup / login forms
    Auth,
    /// Product listing, orders, user products
    Shop,
}

impl Route {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        if snapshot.is_authenticated() {
            Route::Shop
        } else if snapshot.did_try_auto_login {
            Route::Auth
        } else {
            Route::Startup
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Route::Startup => "startup",
            Route::Auth => "auth",
            Route::Shop => "shop",
        }
    }
}
