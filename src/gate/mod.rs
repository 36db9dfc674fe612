//! Access gate: decides what a protected page may show.
//!
//! Evaluation is a pure function of the session and the requested path, with
//! the first matching rule winning:
//!
//! 1. no session: redirect to login
//! 2. email not verified: verification screen
//! 3. verified but not approved: reduced settings frame on `/settings`,
//!    pending-approval screen everywhere else
//! 4. verified and approved: the full frame, unless the path belongs to a
//!    different role's area, in which case the user is sent to their own home

use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::client::ClientError;
use crate::models::{Role, Session};
use crate::routes::{self, NavItem, Section};
use crate::session::SessionStore;

/// The full application frame: navigation plus the resolved page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub role: Role,
    pub section: Section,
    pub title: &'static str,
    pub nav: Vec<NavItem>,
}

/// What to show for a `(session, path)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    RedirectToLogin,
    /// Blocking "verify your email" screen; offers a resend to `email`.
    VerifyEmail { email: String },
    /// Blocking "pending approval" screen; offers settings or logout.
    PendingApproval,
    /// Settings page in a reduced frame without navigation.
    SettingsOnly,
    RedirectToHome { path: String },
    App(Frame),
}

impl Screen {
    /// Whether the requested page content is rendered at all.
    pub fn renders_content(&self) -> bool {
        matches!(self, Screen::SettingsOnly | Screen::App(_))
    }
}

pub fn evaluate(session: Option<&Session>, path: &str) -> Screen {
    let Some(session) = session else {
        return Screen::RedirectToLogin;
    };
    let user = &session.user;

    if !user.is_verified {
        return Screen::VerifyEmail {
            email: user.email.clone(),
        };
    }

    if !user.is_approved {
        return if routes::is_settings_path(path) {
            Screen::SettingsOnly
        } else {
            Screen::PendingApproval
        };
    }

    let role = user.role();
    if let Some(owner) = routes::role_of_path(path) {
        if owner != role && !routes::is_settings_path(path) {
            return Screen::RedirectToHome {
                path: role.home_path(),
            };
        }
    }

    let resolution = routes::resolve(path, role);
    Screen::App(Frame {
        role,
        section: resolution.section,
        title: resolution.label,
        nav: routes::nav_items(role),
    })
}

/// Evaluate against the persisted session. When the gate sends the user to
/// login, any half-written state left in storage is cleared.
pub fn evaluate_store(store: &SessionStore, path: &str) -> Screen {
    let session = store.load_or_clear();
    let screen = evaluate(session.as_ref(), path);
    debug!(path, screen = ?screen, "Gate evaluated");
    screen
}

/// How a page should react to a failed backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureAction {
    /// The session was cleared; go to the login page.
    RedirectToLogin,
    /// Show this message inline and stay on the page.
    Inline(String),
}

/// Apply the failure policy: a 401 clears the session the request was sent
/// under and redirects to login, a 403 never touches the session, anything
/// else is surfaced as a message. A 401 that arrives after a newer login
/// leaves that login alone.
pub fn on_failure(err: &ClientError, store: &SessionStore) -> FailureAction {
    match err.status() {
        Some(StatusCode::UNAUTHORIZED) => {
            let cleared = match err.session_generation() {
                Some(generation) => store.clear_at(generation),
                None => store.clear().map(|()| true),
            };
            match cleared {
                Ok(true) => FailureAction::RedirectToLogin,
                Ok(false) if store.load().is_none() => FailureAction::RedirectToLogin,
                // A newer login replaced the credentials this request used.
                Ok(false) => FailureAction::Inline(
                    "Your session changed while the request was running. Please try again."
                        .to_string(),
                ),
                Err(e) => {
                    warn!(error = %e, "Failed to clear session after 401");
                    FailureAction::RedirectToLogin
                }
            }
        }
        Some(StatusCode::FORBIDDEN) => FailureAction::Inline(
            err.server_message()
                .unwrap_or_else(|| "You do not have access to this page".to_string()),
        ),
        Some(status) => FailureAction::Inline(
            err.server_message()
                .unwrap_or_else(|| format!("Request failed: {}", status)),
        ),
        None => match err {
            ClientError::Decode { .. } => {
                FailureAction::Inline("Failed to load: unexpected response from server".to_string())
            }
            _ => FailureAction::Inline("Failed to reach the server".to_string()),
        },
    }
}
