//! HTTP transport shared by the platform clients

mod client;
mod failure;

pub use client::{HttpTransport, HttpTransportBuilder, PlatformResponse};
pub use failure::PlatformFailure;
