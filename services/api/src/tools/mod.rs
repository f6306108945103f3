//! Local tools answered on behalf of the live model.

pub mod search;
pub mod weather;

use async_trait::async_trait;
use gemini_live::{FunctionCall, FunctionDeclaration, FunctionResult, Tool};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A locally executed function the live model may invoke mid-conversation.
///
/// Handlers return the response map directly. Failures are expressed as a
/// map carrying an `"error"` entry, which is exactly how they travel back
/// to the model, so there is no separate error channel to translate.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn declaration(&self) -> FunctionDeclaration;
    async fn call(&self, args: &Map<String, Value>) -> Map<String, Value>;
}

/// All registered tools, keyed by function name. Built once at startup and
/// shared read-only across sessions.
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The registry shipped with the service: the mock weather lookup plus
    /// the Zero Trust knowledge base search.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(weather::WeatherTool));
        registry.register(Arc::new(search::SearchTool::new()));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        let name = handler.declaration().name;
        self.handlers.insert(name, handler);
    }

    /// Declarations for the session `setup`, as a single toolset entry with
    /// a stable name ordering.
    pub fn declarations(&self) -> Vec<Tool> {
        if self.handlers.is_empty() {
            return Vec::new();
        }
        let mut function_declarations: Vec<FunctionDeclaration> =
            self.handlers.values().map(|h| h.declaration()).collect();
        function_declarations.sort_by(|a, b| a.name.cmp(&b.name));
        vec![Tool {
            function_declarations,
        }]
    }

    /// Executes one call and always produces a result for it, echoing the
    /// call id. Unknown names come back as error results so the session
    /// keeps flowing.
    pub async fn dispatch(&self, call: &FunctionCall) -> FunctionResult {
        let response = match self.handlers.get(&call.name) {
            Some(handler) => {
                info!(name = %call.name, id = %call.id, "executing tool call");
                handler.call(&call.args).await
            }
            None => {
                warn!(name = %call.name, id = %call.id, "tool call for unknown function");
                error_response("Unknown function")
            }
        };
        FunctionResult {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shapes a failure the way the model expects it: a response map with the
/// message under `"error"`.
pub(crate) fn error_response(message: &str) -> Map<String, Value> {
    let mut response = Map::new();
    response.insert("error".to_string(), Value::String(message.to_string()));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_dispatch_unknown_function_yields_error_result() {
        let registry = ToolRegistry::builtin();
        let call = FunctionCall {
            id: "fc-1".to_string(),
            name: "no_such_tool".to_string(),
            args: Map::new(),
        };

        let result = registry.dispatch(&call).await;

        assert_eq!(result.id, "fc-1");
        assert_eq!(result.name, "no_such_tool");
        assert_eq!(result.response["error"], json!("Unknown function"));
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_registered_handler() {
        let registry = ToolRegistry::builtin();
        let mut args = Map::new();
        args.insert("location".to_string(), json!("Tokyo"));
        let call = FunctionCall {
            id: "fc-2".to_string(),
            name: "get_current_weather".to_string(),
            args,
        };

        let result = registry.dispatch(&call).await;

        assert_eq!(result.name, "get_current_weather");
        assert_eq!(result.response["location"], json!("Tokyo"));
        assert!(!result.response.contains_key("error"));
    }

    #[test]
    fn test_declarations_cover_all_registered_tools() {
        let registry = ToolRegistry::builtin();
        let tools = registry.declarations();

        assert_eq!(tools.len(), 1);
        let names: Vec<&str> = tools[0]
            .function_declarations
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, ["get_current_weather", "search_zero_trust_docs"]);
    }

    #[test]
    fn test_empty_registry_declares_no_tools() {
        let registry = ToolRegistry::new();
        assert!(registry.declarations().is_empty());
    }
}
