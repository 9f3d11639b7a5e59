//! HTTP/REST API adapter.
//!
//! Inbound adapter exposing the intent pipeline over REST. Delegates to the
//! command service and the order watcher.

mod controller;
mod request;
mod response;

pub use controller::{AppState, create_router};
pub use request::*;
pub use response::*;
