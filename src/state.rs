//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::engine::{BedrockConnector, SessionManager, UpstreamConnector};

/// Shared application state: the configuration and the session manager.
pub struct AppState {
    pub config: ServerConfig,
    pub manager: SessionManager,
}

impl AppState {
    /// Build the state with the production Bedrock connector.
    pub async fn new(config: ServerConfig) -> Arc<Self> {
        let connector: Arc<dyn UpstreamConnector> =
            Arc::new(BedrockConnector::new(&config.aws_region, &config.model_id).await);
        Self::with_connector(config, connector)
    }

    /// Build the state with an arbitrary upstream connector. Used by tests
    /// to run the whole gateway against an in-process mock.
    pub fn with_connector(config: ServerConfig, connector: Arc<dyn UpstreamConnector>) -> Arc<Self> {
        let manager = SessionManager::new(config.engine(), connector);
        Arc::new(Self { config, manager })
    }
}
