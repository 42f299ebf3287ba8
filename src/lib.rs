//! connect-auth: bearer-token injection for remote session clients.
//!
//! The `middleware` module holds the credential injector and the interceptor
//! hooks it plugs into; `client` wires those hooks into a tonic channel and a
//! minimal remote session.

pub mod client;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;

pub use errors::ClientError;
