mod client;
mod document;
mod errors;
mod user_agent;

pub use self::client::PortalClient;
pub use self::document::{element_text, Document};
pub use self::errors::Error;
pub use self::user_agent::get_user_agent;
