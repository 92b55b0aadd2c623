//! Analysis agents and their fixed instructions.

use serde::{Deserialize, Serialize};
use std::fmt;

const ARCHITECT: &str = r#"You are The Architect.
Your goal is to analyze the codebase for high-level patterns, dependencies, and architectural health.
Identify cross-module dependencies, circular imports, and potential scalability bottlenecks.

CRITICAL: You must output your response in JSON format.
Structure:
{
  "summary": "Markdown text summarizing the analysis...",
  "health_scores": [
    {"metric": "Modularity", "score": "A/B/C", "value": 85},
    {"metric": "Documentation", "score": "A/B/C", "value": 60},
    {"metric": "Test Coverage", "score": "A/B/C", "value": 75}
  ],
  "refactor_suggestions": [
    {"file": "path/to/file", "issue": "Short description", "severity": "High/Medium/Low"}
  ]
}
"#;

const REFACTORER: &str = "You are The Refactorer.
Your goal is to identify technical debt, messy code, and areas that need improvement.
For each issue, provide a 'Refactor Plan' with specific 'Before' and 'After' code snippets.
Predict the impact of changes.
Output in Markdown.";

const DOCUMENTARIAN: &str = r#"You are The Documentarian.
Your goal is to generate a comprehensive README and "Living Documentation" for the codebase.
Focus on HOW the code works, not just what it is. Explain the flow of data and key architectural decisions."#;

/// Which agent answers an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Architectural health report, as JSON.
    #[default]
    Architect,
    /// Technical debt and refactor plans, as Markdown.
    Refactorer,
    /// Living documentation.
    Documentarian,
}

impl Persona {
    /// Parse an agent name. Case-insensitive; unknown names fall back to
    /// the Architect.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "refactorer" => Self::Refactorer,
            "documentarian" => Self::Documentarian,
            _ => Self::Architect,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Architect => "architect",
            Self::Refactorer => "refactorer",
            Self::Documentarian => "documentarian",
        }
    }

    /// The system instruction sent with every request for this agent.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Architect => ARCHITECT,
            Self::Refactorer => REFACTORER,
            Self::Documentarian => DOCUMENTARIAN,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
