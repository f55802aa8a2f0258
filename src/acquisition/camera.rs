use super::{ImageSource, SourceKind};
use crate::error::ShellError;
use crate::frame;
use crate::permission::Capability;
use crate::prompt::{PromptBroker, PromptKind, PromptReply};
use futures::future::BoxFuture;
use futures::FutureExt;
use image::DynamicImage;

/// Capture a still frame through the camera prompt
pub struct CameraSource {
    broker: PromptBroker,
}

impl CameraSource {
    pub fn new(broker: PromptBroker) -> Self {
        Self { broker }
    }
}

impl ImageSource for CameraSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn required_capabilities(&self) -> &'static [Capability] {
        &[Capability::Camera]
    }

    fn acquire(&self) -> BoxFuture<'_, Result<Option<DynamicImage>, ShellError>> {
        let capture = self.broker.launch(PromptKind::Camera);
        tracing::info!("Camera capture {} launched", capture.id());

        async move {
            match capture.await {
                Some(PromptReply::Frame(bytes)) => {
                    tracing::debug!("Received {} byte frame from camera", bytes.len());
                    frame::decode(&bytes).map(Some)
                }
                Some(other) => Err(ShellError::Internal(format!(
                    "camera prompt answered with {:?}",
                    other
                ))),
                None => Ok(None),
            }
        }
        .boxed()
    }
}
