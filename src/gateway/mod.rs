//! Recording proxy gateway
//!
//! Listens locally and forwards every request to the upstream API with the
//! transport policy applied.

mod rewrite;
mod server;

pub use server::{Gateway, GatewayError, GatewayHandle, ListenerState};
