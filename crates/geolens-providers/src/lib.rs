//! Provider adapters for the AI models geolens queries.
//!
//! Each [`ProviderAdapter`] hides one vendor's HTTP API behind the same
//! text-in/text-out call, with retries, a concurrency cap, usage counters
//! and an optional structured (JSON) mode with a single repair attempt.

pub mod adapter;
pub mod error;
pub mod json;
pub mod registry;
pub(crate) mod retry;
pub mod types;
pub(crate) mod wire;

pub use adapter::{AdapterLimits, ProviderAdapter};
pub use error::ProviderError;
pub use json::{json_blocks, locate_json_block, parse_json_block};
pub use registry::ProviderRegistry;
pub use types::{
    CallOptions, Capabilities, OutputSchema, ProviderKind, RawResponse, Structured, UsageSnapshot,
};
