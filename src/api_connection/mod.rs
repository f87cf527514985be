pub mod connection;
pub mod endpoints;

use std::future::Future;

pub use connection::{ModelConfig, ModelError, OllamaClient};

/// Anything that can turn a prompt into the model's raw text reply.
pub trait ModelClient: Send + Sync {
    /// Returns the reply verbatim; no retries are attempted.
    fn generate(&self, prompt: String) -> impl Future<Output = Result<String, ModelError>> + Send;
}
