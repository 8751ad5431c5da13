//! Current weather tool, backed by the open-meteo API.

use serde_json::{Value, json};
use tracing::debug;

use super::{ToolError, ToolResult};

/// Production base URL; tests point the registry at a local mock.
pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com";

/// Extract `latitude` and `longitude` from the tool argument payload.
///
/// The model sends coordinates as strings, but numeric values are accepted
/// as well since argument typing is only advisory upstream.
pub fn parse_coordinates(args_json: &str) -> ToolResult<(String, String)> {
    let args: Value = serde_json::from_str(args_json)
        .map_err(|e| ToolError::InvalidArguments(format!("arguments are not JSON: {e}")))?;
    Ok((coordinate(&args, "latitude")?, coordinate(&args, "longitude")?))
}

fn coordinate(args: &Value, key: &str) -> ToolResult<String> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ToolError::InvalidArguments(format!("missing '{key}'"))),
    }
}

/// Fetch the current weather for a coordinate pair.
///
/// The decoded response is returned under a `weather_data` field.
pub async fn fetch_current(
    http: &reqwest::Client,
    base_url: &str,
    latitude: &str,
    longitude: &str,
) -> ToolResult<Value> {
    let url = format!(
        "{base_url}/v1/forecast?latitude={latitude}&longitude={longitude}&current_weather=true"
    );
    debug!(%url, "Fetching current weather");

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| ToolError::Http(e.to_string()))?
        .error_for_status()
        .map_err(|e| ToolError::Http(e.to_string()))?;

    let data: Value = response
        .json()
        .await
        .map_err(|e| ToolError::Http(format!("invalid weather response: {e}")))?;

    Ok(json!({ "weather_data": data }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_string_coordinates() {
        let (lat, lon) =
            parse_coordinates(r#"{"latitude": "47.61", "longitude": "-122.33"}"#).unwrap();
        assert_eq!(lat, "47.61");
        assert_eq!(lon, "-122.33");
    }

    #[test]
    fn test_parse_numeric_coordinates() {
        let (lat, lon) = parse_coordinates(r#"{"latitude": 47.61, "longitude": -122.33}"#).unwrap();
        assert_eq!(lat, "47.61");
        assert_eq!(lon, "-122.33");
    }

    #[test]
    fn test_parse_rejects_missing_coordinate() {
        let err = parse_coordinates(r#"{"latitude": "47.61"}"#).unwrap_err();
        assert!(err.to_string().contains("longitude"));

        assert!(parse_coordinates("not json").is_err());
    }

    #[tokio::test]
    async fn test_fetch_wraps_response_under_weather_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "47.61"))
            .and(query_param("longitude", "-122.33"))
            .and(query_param("current_weather", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current_weather": { "temperature": 12.3, "windspeed": 7.0 }
            })))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let result = fetch_current(&http, &server.uri(), "47.61", "-122.33")
            .await
            .unwrap();
        assert_eq!(
            result["weather_data"]["current_weather"]["temperature"],
            12.3
        );
    }

    #[tokio::test]
    async fn test_fetch_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let http = reqwest::Client::new();
        let err = fetch_current(&http, &server.uri(), "0", "0")
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Http(_)));
    }
}
