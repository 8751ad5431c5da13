//! Production upstream connector over the Bedrock runtime SDK.
//!
//! Opens one `InvokeModelWithBidirectionalStream` per session. The request
//! body is the lazy frame stream produced from the session's outbound
//! queue, wrapped into the SDK's event-stream sender; the response body is
//! unwrapped back into raw JSON frames for the driver.
//!
//! Stalled-stream protection is disabled on the shared AWS config: the
//! bidirectional stream is long-lived and legitimately quiet between user
//! utterances, which the default protection would treat as a stall.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::stalled_stream_protection::StalledStreamProtectionConfig;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::types::{
    BidirectionalInputPayloadPart, InvokeModelWithBidirectionalStreamInput,
    InvokeModelWithBidirectionalStreamOutput,
};
use aws_smithy_types::Blob;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::driver::{ResponseFrameStream, UpstreamConnector};
use super::error::{DriverError, DriverResult};
use super::outbound::RequestFrameStream;

/// Connector backed by the Bedrock runtime bidirectional stream API.
pub struct BedrockConnector {
    client: BedrockClient,
    model_id: String,
}

impl BedrockConnector {
    /// Build a connector from the default AWS credential chain.
    pub async fn new(region: &str, model_id: &str) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .load()
            .await;

        info!(region, model_id, "Bedrock connector ready");
        Self {
            client: BedrockClient::new(&aws_config),
            model_id: model_id.to_string(),
        }
    }
}

/// Classify an SDK-surfaced failure into the driver error taxonomy.
///
/// The service raises its exceptions as event-stream error frames; the SDK
/// folds them into the receive error, so classification goes by message.
fn classify_stream_error(message: String) -> DriverError {
    if message.contains("ModelStreamError") {
        DriverError::ModelStream(message)
    } else if message.contains("InternalServer") {
        DriverError::InternalServer(message)
    } else if message.contains("ValidationException") {
        DriverError::ModelStream(message)
    } else {
        DriverError::Transport(message)
    }
}

#[async_trait]
impl UpstreamConnector for BedrockConnector {
    async fn open(
        &self,
        session_id: &str,
        mut request: RequestFrameStream,
    ) -> DriverResult<ResponseFrameStream> {
        let input_stream = async_stream::stream! {
            while let Some(frame) = request.next().await {
                let part = BidirectionalInputPayloadPart::builder()
                    .bytes(Blob::new(frame.to_vec()))
                    .build();
                yield Ok(InvokeModelWithBidirectionalStreamInput::Chunk(part));
            }
        };

        let output = self
            .client
            .invoke_model_with_bidirectional_stream()
            .model_id(&self.model_id)
            .body(input_stream.into())
            .send()
            .await
            .map_err(|e| DriverError::OpenFailed(format!("{e}")))?;

        debug!(%session_id, "Bidirectional stream established");

        let session_id = session_id.to_string();
        let mut receiver = output.body;
        let response = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(Some(InvokeModelWithBidirectionalStreamOutput::Chunk(part))) => {
                        if let Some(blob) = part.bytes() {
                            yield Ok(Bytes::from(blob.clone().into_inner()));
                        }
                    }
                    Ok(Some(_)) => {
                        debug!(%session_id, "Ignoring unknown output event variant");
                    }
                    Ok(None) => {
                        debug!(%session_id, "Bidirectional stream ended");
                        break;
                    }
                    Err(e) => {
                        warn!(%session_id, "Bidirectional stream error: {e}");
                        yield Err(classify_stream_error(format!("{e}")));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_classification() {
        assert!(matches!(
            classify_stream_error("ModelStreamErrorException: bad event order".to_string()),
            DriverError::ModelStream(_)
        ));
        assert!(matches!(
            classify_stream_error("InternalServerException".to_string()),
            DriverError::InternalServer(_)
        ));
        assert!(matches!(
            classify_stream_error("ValidationException: no content data received".to_string()),
            DriverError::ModelStream(_)
        ));
        assert!(matches!(
            classify_stream_error("connection reset by peer".to_string()),
            DriverError::Transport(_)
        ));
    }
}
