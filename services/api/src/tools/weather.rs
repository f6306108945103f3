//! Mock weather lookup, the minimal end-to-end tool calling demonstration.

use super::{ToolHandler, error_response};
use async_trait::async_trait;
use gemini_live::FunctionDeclaration;
use serde_json::{Map, Value, json};
use tracing::info;

pub struct WeatherTool;

#[async_trait]
impl ToolHandler for WeatherTool {
    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: "get_current_weather".to_string(),
            description: "Get the current weather in a given location".to_string(),
            parameters: json!({
                "type": "OBJECT",
                "properties": {
                    "location": {
                        "type": "STRING",
                        "description": "The city and state, e.g. San Francisco, CA"
                    }
                },
                "required": ["location"]
            }),
        }
    }

    async fn call(&self, args: &Map<String, Value>) -> Map<String, Value> {
        let Some(location) = args.get("location").and_then(Value::as_str) else {
            return error_response("location argument is required and must be a string");
        };

        info!(%location, "executing get_current_weather");

        // Mock data, in a real deployment this would call a weather API.
        let mut response = Map::new();
        response.insert("weather".to_string(), json!("Sunny"));
        response.insert("temperature".to_string(), json!(25));
        response.insert("location".to_string(), json!(location));
        response.insert(
            "note".to_string(),
            json!("This is mock data from the backend tool"),
        );
        response
    }
}
