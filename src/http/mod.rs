//! HTTP transport
//!
//! Client plumbing plus the header/transport policy every outbound call obeys.

mod client;
mod policy;

pub use client::{HttpClient, HttpError, HttpRequest};
pub use policy::{DumpSink, HeaderSet, TransportPolicy};
