//! Tool catalog, provider seam and per-capability bindings.
//!
//! Tools are the only operations that may suspend. The core knows them by
//! contract ([`ToolSpec`]); providers implement [`ToolProvider`]; capabilities
//! call them through a [`ToolBinding`] that enforces the declared tool set, the
//! timeout and the retry policy.

mod contract;
mod fixture;
mod provider;
mod registry;
pub mod types;

pub use contract::{ToolFailure, ToolFailureKind, ToolName, ToolSpec, catalog, spec};
pub use fixture::{Fixture, FixtureToolProvider, SentMessage};
pub use provider::ToolProvider;
pub use registry::{ToolBinding, ToolOutcome, ToolPolicy, ToolRegistry};
