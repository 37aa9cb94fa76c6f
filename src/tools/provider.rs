//! The provider seam: external data and action providers implement this.

use super::{ToolFailure, ToolName};
use async_trait::async_trait;
use serde_json::Value;

/// An external provider answering tool invocations.
///
/// Implementations may suspend on I/O. They never see timeouts or retries: the
/// [`super::ToolRegistry`] wraps every call.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Invokes a tool with structured arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolFailure`] when the provider cannot answer.
    async fn invoke(&self, tool: ToolName, args: Value) -> Result<Value, ToolFailure>;
}
