//! Shared leaf types for the connector workspace.
//!
//! This crate contains the small value types every other crate needs:
//! error source locations and HTTP status classification. It has no
//! business logic and no I/O.
//!
//! ## Architecture
//!
//! - **common** (this crate): shared value types
//! - **connector-core**: the RPC/session protocol operating on them

pub mod error;
pub mod http_status;

pub use error::ErrorLocation;
pub use http_status::HttpStatusCode;
