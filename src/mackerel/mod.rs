// Mackerel REST API client
//
// One authenticated HTTP request per operation against
// https://api.mackerelio.com/api/v0. Responses are returned as raw JSON.

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::MackerelClient;
pub use error::{MackerelError, Result};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
pub use types::{HostStatus, TimeRange};
