//! # codekit-runtime
//!
//! Completion providers for the codekit gateway.
//!
//! ## Providers
//!
//! - **OpenAI** (default): chat-completions API, or any server that speaks
//!   the same wire format via `OPENAI_BASE_URL`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use codekit_runtime::OpenAiProvider;
//!
//! let provider = OpenAiProvider::from_env()?;
//! let gateway = Gateway::new(Some(Arc::new(provider)), tiers, usage, config);
//! ```

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAiConfig, OpenAiProvider};

// Re-export core types for convenience
pub use codekit_core::{GatewayError, GenerationOptions, LlmProvider, Message, Result, Role};
