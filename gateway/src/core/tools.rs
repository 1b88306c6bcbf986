//! Tools the model can call during a session.
//!
//! Tools are registered by name in a [`ToolRegistry`]; their definitions are
//! advertised to the upstream when a session opens, and function calls coming
//! back are dispatched through [`ToolRegistry::invoke`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::core::realtime::ToolDefinition;

/// Name of the phone directory lookup tool.
pub const PHONE_LOOKUP_TOOL: &str = "get_phone_number";

/// Returned when a name is not in the directory.
pub const UNKNOWN_PHONE_NUMBER: &str = "Unknown";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}

/// A callable tool.
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    fn invoke(&self, arguments: serde_json::Value) -> Result<String, ToolError>;
}

/// Name-indexed tool collection.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tools.
    pub fn with_defaults(phone_entries: &HashMap<String, String>) -> Self {
        let mut registry = Self::new();
        registry.register(PhoneDirectory::with_entries(phone_entries));
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.definition().function.name;
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Definitions of all registered tools, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Invoke `name` with the raw JSON argument string from the model.
    pub fn invoke(&self, name: &str, arguments: &str) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let arguments = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments).map_err(|e| ToolError::InvalidArguments {
                tool: name.to_string(),
                reason: e.to_string(),
            })?
        };

        tool.invoke(arguments)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Looks up phone numbers by name.
#[derive(Debug, Clone)]
pub struct PhoneDirectory {
    entries: HashMap<String, String>,
}

#[derive(Deserialize)]
struct PhoneLookupArgs {
    name: String,
}

impl PhoneDirectory {
    /// Directory holding the built-in entries.
    pub fn new() -> Self {
        let entries = [("Jerry", "1234567890"), ("Logan", "0987654321")]
            .into_iter()
            .map(|(name, number)| (name.to_string(), number.to_string()))
            .collect();
        Self { entries }
    }

    /// Built-in entries plus `extra`; `extra` wins on conflicts.
    pub fn with_entries(extra: &HashMap<String, String>) -> Self {
        let mut directory = Self::new();
        directory
            .entries
            .extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        directory
    }

    /// Exact-match lookup, `"Unknown"` when absent.
    pub fn lookup(&self, name: &str) -> &str {
        self.entries
            .get(name)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_PHONE_NUMBER)
    }
}

impl Default for PhoneDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for PhoneDirectory {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            PHONE_LOOKUP_TOOL,
            "Get my phone number.",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" }
                },
                "required": ["name"]
            }),
        )
    }

    fn invoke(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let args: PhoneLookupArgs =
            serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
                tool: PHONE_LOOKUP_TOOL.to_string(),
                reason: e.to_string(),
            })?;
        Ok(self.lookup(&args.name).to_string())
    }
}
