//! # codekit-core
//!
//! Tool catalog, provider-agnostic LLM abstraction and the AI gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Gateway                              │
//! │  ┌─────────────┐  ┌──────────────┐  ┌─────────────────────┐  │
//! │  │   Prompt    │  │ TierResolver │  │    LlmProvider      │  │
//! │  │  Registry   │──│ + UsageMeter │──│    (Strategy)       │  │
//! │  └─────────────┘  └──────────────┘  └─────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait keeps the gateway independent of the completion
//! vendor; `TierResolver` keeps it independent of the billing backend.

pub mod access;
pub mod error;
pub mod gateway;
pub mod message;
pub mod prompt;
pub mod provider;

pub use access::{Caller, Tier, TierResolver, UsageMeter};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayConfig, ToolRequest, ToolResponse, UnknownToolPolicy};
pub use message::{Message, Role};
pub use prompt::{ToolId, ToolInfo};
pub use provider::{Completion, GenerationOptions, LlmProvider};
