mod error;
mod handlers;
mod router;
mod types;

pub use error::bad_request;
pub use router::handle_request;
pub use types::{AppState, Request};
