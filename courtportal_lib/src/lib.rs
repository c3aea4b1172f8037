//! Core of the court-portal case scraper: CAPTCHA solvers, fallback
//! extraction, text normalization, and the session state machine.
//!
//! Builds on `courtportal_api` for transport and document queries. One
//! [`CaseLookup::run`] call performs a complete lookup: log in past the
//! image CAPTCHA, search past the arithmetic CAPTCHA, follow the result
//! link, and extract and clean the case record.

pub mod arithmetic;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod locate;
pub mod normalize;
pub mod ocr;
pub mod prompt;
pub mod record;
pub mod session;

pub use courtportal_api;

pub use config::{Credentials, PortalConfig};
pub use error::{CaptchaStage, SessionError};
pub use record::{CaseRecord, PartyRecord};
pub use session::{AuthState, CaseLookup, CaptchaChallenge, ImageChallenge, SearchRequest, Session};
