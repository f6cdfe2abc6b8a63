//! Concrete collaborator clients

pub mod echo;
pub mod mcp;
pub mod retry;

pub use echo::EchoCompletion;
pub use mcp::HttpToolClient;
pub use retry::{with_retry, RetryConfig};
