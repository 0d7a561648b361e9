//! Concrete `ModelAdapter` implementations: an Anthropic Messages API
//! adapter for production use, and a scriptable mock for tests and the
//! demonstration binary's offline mode.

pub mod anthropic;
pub(crate) mod sse;
pub mod util;

pub use anthropic::{AnthropicAdapter, MockModelAdapter};
