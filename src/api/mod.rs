//! Access to the advisory platform's REST API.

pub mod client;
pub mod error;
pub mod wire;

pub use client::{ApiClient, ApiClientConfig};
pub use error::{ApiError, ApiResult};
