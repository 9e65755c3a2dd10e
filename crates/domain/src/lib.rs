//! # Custops Domain
//!
//! Data exchanged with the customer-operations platforms.
//!
//! This crate contains:
//! - Ticketing, messaging, analytics and email payload types
//! - `DomainError` for input validation performed before any network call
//! - Field limits shared by the platform clients
//!
//! ## Architecture
//! - No dependencies on other custops crates
//! - Only external dependencies allowed
//! - Pure data structures; no I/O

pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use errors::*;
pub use types::*;
