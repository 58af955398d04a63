//! Personas: named operating profiles for guarded execution.

use serde::{Deserialize, Serialize};

use crate::guardrail::Guardrail;

/// A named profile bundling the tools a professional may invoke and the
/// guardrails that constrain them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// Stable identifier, matched against the professional's registered
    /// persona names.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Tools this persona may invoke.
    pub tools: Vec<String>,
    /// Guardrails applied while this persona is in effect.
    pub guardrails: Vec<Guardrail>,
}

impl Persona {
    /// Create a persona with no tools or guardrails.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tools: Vec::new(),
            guardrails: Vec::new(),
        }
    }

    /// Add a permitted tool.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }

    /// Add a guardrail.
    pub fn with_guardrail(mut self, rail: Guardrail) -> Self {
        self.guardrails.push(rail);
        self
    }

    /// Whether the persona permits a tool.
    pub fn allows_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }
}
