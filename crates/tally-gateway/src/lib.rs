//! tally-gateway
//!
//! The session persistence boundary.
//!
//! - [`SessionGateway`]: the remote contract every entry session talks to.
//! - [`HttpSessionGateway`]: the contract over HTTP/JSON.
//! - [`InMemoryGateway`]: the reference store; all mutations are serialized
//!   behind one lock, so concurrent claims yield exactly one winner.
//! - [`EntryClient`]: drives one [`tally_entry::EntrySession`] against a
//!   gateway and commits a transition only after the remote call succeeded.

mod api;
mod client;
mod error;
mod http;
mod memory;
mod retry;

pub use api::*;
pub use client::{ClientError, EntryClient};
pub use error::{ErrorResponse, GatewayError};
pub use http::HttpSessionGateway;
pub use memory::{InMemoryGateway, StatusChange};
pub use retry::RetryPolicy;
