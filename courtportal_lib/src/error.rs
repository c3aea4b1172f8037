//! Error taxonomy for a case lookup session.
//!
//! Transport failures are recoverable at the fetch layer and propagate as
//! [`SessionError::Transport`]. Structural failures (an element cascade
//! exhausted) and exhausted retry budgets halt the run; the failing page
//! has already been handed to the diagnostics sink by the time one of
//! these is returned.

use std::fmt;

/// Which CAPTCHA stage a retry budget belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaStage {
    Login,
    Search,
}

impl fmt::Display for CaptchaStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login => write!(f, "login"),
            Self::Search => write!(f, "search"),
        }
    }
}

/// Errors that halt a lookup. A run yields exactly one record or exactly
/// one of these; partial records are never emitted.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    /// A page fetch or form submission failed in transport.
    #[error("transport error: {0}")]
    Transport(#[from] courtportal_api::Error),
    /// Login submission did not produce an authenticated session and the
    /// page is not offering another CAPTCHA attempt.
    #[error("login failed: {reason}")]
    LoginFailed { reason: String },
    /// A required element cascade was exhausted.
    #[error("{reason}")]
    Structural { reason: String },
    /// A CAPTCHA stage used up its retry budget.
    #[error("{stage} CAPTCHA failed too many times ({attempts} attempts)")]
    RetriesExhausted { stage: CaptchaStage, attempts: u32 },
}
