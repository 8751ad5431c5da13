//! In-conversation tools.
//!
//! The model can call out to the gateway mid-conversation; the closed set of
//! built-in tools lives here. Each invocation takes the tool name and its
//! JSON argument payload and returns a JSON-serializable result that is
//! pushed back upstream as a TOOL content block.
//!
//! # Built-in Tools
//!
//! - `getDateAndTimeTool` - current date and time in `America/Los_Angeles`.
//! - `getWeatherTool` - current weather for a coordinate pair, via the
//!   open-meteo API.

mod datetime;
mod weather;

pub use weather::OPEN_METEO_BASE_URL;

use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::core::engine::events::ToolSpec;

/// Tool names are matched case-insensitively.
const DATE_AND_TIME_TOOL: &str = "getdateandtimetool";
const WEATHER_TOOL: &str = "getweathertool";

/// HTTP timeout for outbound tool calls.
const TOOL_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Errors
// =============================================================================

/// Errors raised by tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The requested tool is not in the built-in set.
    #[error("Unsupported tool: {0}")]
    UnsupportedTool(String),

    /// The argument payload could not be interpreted.
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// The outbound HTTP call failed.
    #[error("Tool HTTP request failed: {0}")]
    Http(String),
}

/// Result type for tool invocation.
pub type ToolResult<T> = Result<T, ToolError>;

// =============================================================================
// Registry
// =============================================================================

/// The closed set of built-in tools.
///
/// Cheap to clone; the HTTP client is shared.
#[derive(Clone)]
pub struct ToolRegistry {
    http: reqwest::Client,
    weather_base_url: String,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(TOOL_HTTP_TIMEOUT)
            .build()
            .expect("Failed to build tool HTTP client");
        Self {
            http,
            weather_base_url: OPEN_METEO_BASE_URL.to_string(),
        }
    }

    /// Override the weather API base URL.
    pub fn with_weather_base_url(mut self, base_url: &str) -> Self {
        self.weather_base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Tool definitions advertised to the model on `promptStart`.
    pub fn specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "getDateAndTimeTool".to_string(),
                description: "Get information about the current date and time.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": [],
                }),
            },
            ToolSpec {
                name: "getWeatherTool".to_string(),
                description: "Get the current weather for a given location, based on its WGS84 coordinates.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "latitude": {
                            "type": "string",
                            "description": "Geographical WGS84 latitude of the location.",
                        },
                        "longitude": {
                            "type": "string",
                            "description": "Geographical WGS84 longitude of the location.",
                        },
                    },
                    "required": ["latitude", "longitude"],
                }),
            },
        ]
    }

    /// Invoke a tool by name with a JSON argument payload.
    pub async fn invoke(&self, tool_name: &str, args_json: &str) -> ToolResult<Value> {
        debug!(tool = tool_name, "Invoking tool");
        match tool_name.to_lowercase().as_str() {
            DATE_AND_TIME_TOOL => Ok(datetime::current_date_and_time()),
            WEATHER_TOOL => {
                let (latitude, longitude) = weather::parse_coordinates(args_json)?;
                weather::fetch_current(&self.http, &self.weather_base_url, &latitude, &longitude)
                    .await
            }
            _ => Err(ToolError::UnsupportedTool(tool_name.to_string())),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specs_cover_builtin_set() {
        let registry = ToolRegistry::new();
        let specs = registry.specs();
        assert_eq!(specs.len(), 2);

        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"getDateAndTimeTool"));
        assert!(names.contains(&"getWeatherTool"));

        let weather = specs.iter().find(|s| s.name == "getWeatherTool").unwrap();
        assert_eq!(
            weather.input_schema["required"],
            serde_json::json!(["latitude", "longitude"])
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_is_rejected() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("openPodBayDoorsTool", "{}").await.unwrap_err();
        match err {
            ToolError::UnsupportedTool(name) => assert_eq!(name, "openPodBayDoorsTool"),
            other => panic!("Expected UnsupportedTool, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_tool_names_match_case_insensitively() {
        let registry = ToolRegistry::new();
        assert!(registry.invoke("GETDATEANDTIMETOOL", "{}").await.is_ok());
        assert!(registry.invoke("getDateAndTimeTool", "{}").await.is_ok());
    }
}
