//! Prompt Registry
//!
//! Fixed catalog of code tools and the system prompt each one sends upstream.
//! Everything here is static data, immutable for the life of the process.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::GatewayError;

/// Known tool identifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolId {
    Explain,
    Debug,
    Refactor,
    Document,
    Readme,
    Translate,
    Security,
    Performance,
}

impl ToolId {
    /// Every tool, in catalog order
    pub const ALL: [Self; 8] = [
        Self::Explain,
        Self::Debug,
        Self::Refactor,
        Self::Document,
        Self::Readme,
        Self::Translate,
        Self::Security,
        Self::Performance,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explain => "explain",
            Self::Debug => "debug",
            Self::Refactor => "refactor",
            Self::Document => "document",
            Self::Readme => "readme",
            Self::Translate => "translate",
            Self::Security => "security",
            Self::Performance => "performance",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Explain => "Explain",
            Self::Debug => "Debug",
            Self::Refactor => "Refactor",
            Self::Document => "Document",
            Self::Readme => "README",
            Self::Translate => "Translate",
            Self::Security => "Security",
            Self::Performance => "Performance",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Explain => "Get clear explanations",
            Self::Debug => "Find and fix bugs",
            Self::Refactor => "Improve code quality",
            Self::Document => "Generate docs",
            Self::Readme => "Create READMEs",
            Self::Translate => "Convert languages",
            Self::Security => "Find vulnerabilities",
            Self::Performance => "Optimize speed",
        }
    }

    /// Whether the tool is only available on the Pro tier
    pub const fn is_pro(self) -> bool {
        matches!(self, Self::Translate | Self::Security | Self::Performance)
    }

    /// Requests per UTC day on the free tier (`None` = not offered on free)
    pub const fn free_daily_limit(self) -> Option<u32> {
        match self {
            Self::Explain => Some(10),
            Self::Debug | Self::Refactor | Self::Document | Self::Readme => Some(5),
            Self::Translate | Self::Security | Self::Performance => None,
        }
    }

    /// System prompt describing the required output structure
    pub const fn system_prompt(self) -> &'static str {
        match self {
            Self::Explain => EXPLAIN_PROMPT,
            Self::Debug => DEBUG_PROMPT,
            Self::Refactor => REFACTOR_PROMPT,
            Self::Document => DOCUMENT_PROMPT,
            Self::Readme => README_PROMPT,
            Self::Translate => TRANSLATE_PROMPT,
            Self::Security => SECURITY_PROMPT,
            Self::Performance => PERFORMANCE_PROMPT,
        }
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| GatewayError::Validation(format!("Unknown tool: {s}")))
    }
}

/// Template for a raw tool name, falling back to `explain` for unknown names
pub fn prompt_for(name: &str) -> &'static str {
    name.parse::<ToolId>()
        .unwrap_or(ToolId::Explain)
        .system_prompt()
}

/// Catalog entry exposed to clients
#[derive(Clone, Debug, Serialize)]
pub struct ToolInfo {
    pub id: ToolId,
    pub name: &'static str,
    pub description: &'static str,
    pub pro: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free_daily_limit: Option<u32>,
}

impl From<ToolId> for ToolInfo {
    fn from(id: ToolId) -> Self {
        Self {
            id,
            name: id.display_name(),
            description: id.description(),
            pro: id.is_pro(),
            free_daily_limit: id.free_daily_limit(),
        }
    }
}

/// The full tool catalog
pub fn catalog() -> Vec<ToolInfo> {
    ToolId::ALL.into_iter().map(ToolInfo::from).collect()
}

const EXPLAIN_PROMPT: &str = r"You are an expert code educator. Explain the provided code in a clear, educational way.

Format your response as:
## 🔍 Code Explanation

### What This Code Does
[High-level summary]

### How It Works
[Step-by-step breakdown]

### Key Concepts
[Important programming concepts used]

### Example Use Case
[When you would use this code]

Use markdown formatting with code blocks where appropriate.";

const DEBUG_PROMPT: &str = r"You are an expert debugger. Analyze the provided code for bugs, issues, and potential problems.

Format your response as:
## 🐛 Debug Analysis

### ❌ Issues Found
[List each issue with line numbers if possible]

### ✅ Fixed Code
```[language]
[The corrected code]
```

### 📋 What Was Fixed
| Issue | Fix Applied |
|-------|-------------|
[Table of fixes]

### 💡 Prevention Tips
[How to avoid these issues in the future]";

const REFACTOR_PROMPT: &str = r"You are an expert code refactorer. Improve the provided code for better readability, performance, and maintainability.

Format your response as:
## ✨ Refactored Code

### Improvements Made
[List of improvements]

### Refactored Code
```[language]
[The improved code]
```

### Why These Changes
[Explanation of each improvement]

### Performance Impact
[Any performance benefits]";

const DOCUMENT_PROMPT: &str = r"You are an expert technical writer. Generate comprehensive documentation for the provided code.

Format your response as:
## 📚 Documentation

### Overview
[Brief description]

### Function/Class Reference
[Document each function/class with parameters, return values, and descriptions]

### Usage Examples
```[language]
[Example usage code]
```

### Notes
[Any important notes or warnings]";

const README_PROMPT: &str = r"You are an expert at writing README files. Generate a professional README.md for a project containing this code.

Format your response as a complete README with:
- Project title and badges
- Description
- Installation instructions
- Usage examples with code blocks
- API reference (if applicable)
- Contributing guidelines
- License section

Use proper markdown formatting.";

const TRANSLATE_PROMPT: &str = r"You are an expert polyglot programmer. Translate the provided code to the target language specified.

Format your response as:
## 🔄 Translated Code

### [Target Language] Version
```[language]
[Translated code]
```

### Key Differences
[Important differences between the source and target language implementations]

### Notes
[Any language-specific considerations]";

const SECURITY_PROMPT: &str = r"You are a cybersecurity expert specializing in code security analysis.

Format your response as:
## 🛡️ Security Analysis

### ⚠️ Vulnerabilities Found
[List each vulnerability with severity: Critical/High/Medium/Low]

### Risk Assessment
| Issue | Severity | Impact |
|-------|----------|--------|
[Table of issues]

### ✅ Secure Code
```[language]
[Code with security fixes applied]
```

### Recommendations
[Best practices to follow]";

const PERFORMANCE_PROMPT: &str = r"You are a performance optimization expert.

Format your response as:
## ⚡ Performance Analysis

### 📊 Current Metrics
- Time Complexity: [Big O]
- Space Complexity: [Big O]
- Potential Bottlenecks: [List]

### 🔍 Issues Identified
[List performance issues]

### ✅ Optimized Code
```[language]
[Optimized version]
```

### 📈 Improvement Summary
| Metric | Before | After |
|--------|--------|-------|
[Comparison table]

### 💡 Additional Recommendations
[Other optimization suggestions]";
