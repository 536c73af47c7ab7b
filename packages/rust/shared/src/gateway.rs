//! Contract for the external extraction service.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::types::{ApiKey, ExtractionPayload};

/// Turns raw user text into an [`ExtractionPayload`] by asking a language model.
///
/// Implementations perform exactly one request and never retry. Any failure is
/// fatal to the invocation; implementations must not fill in default field
/// values to paper over a failed call. Dropping the returned future cancels the
/// in-flight request.
#[async_trait]
pub trait ExtractionGateway: Send + Sync {
    /// Send the instruction and the user text, returning the decoded payload.
    async fn fetch_extraction(
        &self,
        credential: &ApiKey,
        instruction: &str,
        user_text: &str,
    ) -> Result<ExtractionPayload, GatewayError>;

    /// Human-readable gateway name for tracing.
    fn name(&self) -> &str;
}
