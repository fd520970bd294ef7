//! AI Gateway
//!
//! Validates a tool request, checks the caller's entitlement, builds the
//! two-message prompt and relays it to the configured [`LlmProvider`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::access::{Caller, Tier, TierResolver, UsageMeter};
use crate::error::{GatewayError, Result};
use crate::message::Message;
use crate::prompt::ToolId;
use crate::provider::{GenerationOptions, LlmProvider};

const EMPTY_COMPLETION: &str = "No response generated";

/// Inbound tool invocation
///
/// Fields default to empty so that missing values surface as validation
/// errors instead of deserialization failures.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl ToolRequest {
    pub fn new(code: impl Into<String>, tool: ToolId) -> Self {
        Self {
            code: code.into(),
            tool: tool.as_str().into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Successful tool output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResponse {
    pub result: String,
}

/// What to do with a tool name that is not in the catalog
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownToolPolicy {
    /// Reject with a validation error
    #[default]
    Reject,
    /// Serve the `explain` tool instead
    FallbackToExplain,
}

impl UnknownToolPolicy {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "explain" | "fallback" => Self::FallbackToExplain,
            _ => Self::Reject,
        }
    }
}

/// Gateway settings
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub generation: GenerationOptions,
    pub timeout: Duration,
    pub unknown_tools: UnknownToolPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            generation: GenerationOptions::default(),
            timeout: Duration::from_secs(60),
            unknown_tools: UnknownToolPolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Read `OPENAI_MODEL`, `AI_TIMEOUT_SECS` and `UNKNOWN_TOOL_POLICY`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.generation = GenerationOptions::with_model(model);
        }
        if let Some(secs) = std::env::var("AI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        if let Ok(policy) = std::env::var("UNKNOWN_TOOL_POLICY") {
            config.unknown_tools = UnknownToolPolicy::parse(&policy);
        }

        config
    }
}

/// Build the system + user messages for a tool invocation
pub fn build_messages(tool: ToolId, code: &str, language: Option<&str>) -> Vec<Message> {
    let target = language.map(str::trim).filter(|l| !l.is_empty());

    let user = match (tool, target) {
        (ToolId::Translate, Some(language)) => {
            format!("Translate this code to {language}:\n\n```\n{code}\n```")
        }
        _ => format!("Here is the code to analyze:\n\n```\n{code}\n```"),
    };

    vec![Message::system(tool.system_prompt()), Message::user(user)]
}

/// The AI tool gateway
pub struct Gateway {
    provider: Option<Arc<dyn LlmProvider>>,
    tiers: Arc<dyn TierResolver>,
    usage: Arc<UsageMeter>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        tiers: Arc<dyn TierResolver>,
        usage: Arc<UsageMeter>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            provider,
            tiers,
            usage,
            config,
        }
    }

    /// Whether an upstream provider is configured
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    pub fn usage(&self) -> &UsageMeter {
        &self.usage
    }

    /// Resolve the tool named in a request according to the unknown-tool policy
    pub fn resolve_tool(&self, name: &str) -> Result<ToolId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GatewayError::Validation("Code and tool are required".into()));
        }

        match name.parse::<ToolId>() {
            Ok(tool) => Ok(tool),
            Err(_) if self.config.unknown_tools == UnknownToolPolicy::FallbackToExplain => {
                tracing::warn!(tool = %name, "Unknown tool, serving explain");
                Ok(ToolId::Explain)
            }
            Err(e) => Err(e),
        }
    }

    /// Run one tool invocation for `caller`
    pub async fn generate(&self, request: &ToolRequest, caller: &Caller) -> Result<ToolResponse> {
        if request.code.trim().is_empty() {
            return Err(GatewayError::Validation("Code and tool are required".into()));
        }
        let tool = self.resolve_tool(&request.tool)?;

        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| GatewayError::Config("OpenAI API key not configured".into()))?;

        let tier = self.tiers.tier_for(caller).await?;
        if !tier.allows(tool) {
            return Err(GatewayError::Forbidden(format!(
                "{tool} is not available on the {tier} plan"
            )));
        }

        let metered = match (tier, tool.free_daily_limit(), caller.usage_key()) {
            (Tier::Free, Some(limit), Some(key)) => {
                self.usage.check_and_increment(&key, tool, limit)?;
                Some(key)
            }
            _ => None,
        };

        let messages = build_messages(tool, &request.code, request.language.as_deref());

        tracing::info!(
            %tool,
            %tier,
            provider = provider.name(),
            code_len = request.code.len(),
            "Dispatching tool request"
        );

        let outcome = tokio::time::timeout(
            self.config.timeout,
            provider.complete(&messages, &self.config.generation),
        )
        .await
        .map_err(|_| GatewayError::Timeout(self.config.timeout.as_secs()))
        .and_then(|r| r);

        match outcome {
            Ok(completion) => {
                let result = if completion.content.trim().is_empty() {
                    EMPTY_COMPLETION.to_string()
                } else {
                    completion.content
                };
                Ok(ToolResponse { result })
            }
            Err(e) => {
                tracing::error!(%tool, error = %e, "Tool request failed");
                if let Some(key) = metered {
                    self.usage.refund(&key, tool)?;
                }
                Err(e)
            }
        }
    }
}
