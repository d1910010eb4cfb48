//! Capability trait — the abstraction over external tool functions.
//!
//! Concrete capabilities (apartment search, scheduling, SMS, live-agent
//! transfer) live outside this workspace. The orchestrator only sees them
//! through [`Capability`] and the [`CapabilityRegistry`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// An externally provided function the model can ask to run.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The function name the model uses (e.g., "scheduleTour").
    fn name(&self) -> &str;

    /// A description of what this capability does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing the parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Run the capability. Arguments are usually an object, but may be a raw
    /// string when the model produced arguments that were not valid JSON.
    async fn invoke(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Convert this capability into a manifest entry.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Mapping from function name to capability, plus the manifest the provider
/// sees. Manifest order follows registration order.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
    order: Vec<String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. Replaces any existing one with the same name.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        if self.capabilities.insert(name.clone(), capability).is_none() {
            self.order.push(name);
        }
    }

    /// Look up a capability by function name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// The tool manifest sent alongside streaming requests.
    pub fn manifest(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.capabilities.get(name))
            .map(|c| c.to_definition())
            .collect()
    }

    /// Resolve and invoke a capability by name.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let capability = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        capability.invoke(arguments).await
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.order)
            .finish()
    }
}
