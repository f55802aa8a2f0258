//! Image acquisition from the camera or the gallery
//!
//! Both sources launch an interactive prompt and resolve to the acquired
//! image, or to nothing when the user dismissed the surface. Permission
//! checks happen in [`acquire`] before a source is ever launched.

pub mod camera;
pub mod gallery;

use crate::error::ShellError;
use crate::permission::{Capability, PermissionGate};
use futures::future::BoxFuture;
use image::DynamicImage;
use serde::Serialize;

pub use camera::CameraSource;
pub use gallery::{ContentResolver, DirectoryResolver, GallerySource};

/// Which trigger started an acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Camera,
    Gallery,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Gallery => "gallery",
        }
    }
}

/// Outcome of one acquisition attempt
#[derive(Debug)]
pub enum AcquisitionResult {
    Image(DynamicImage),
    Cancelled,
    Denied,
}

impl AcquisitionResult {
    /// Turn the user-driven outcomes into their error counterparts
    pub fn into_image(self, source: SourceKind) -> Result<DynamicImage, ShellError> {
        match self {
            Self::Image(image) => Ok(image),
            Self::Cancelled => Err(ShellError::AcquisitionCancelled),
            Self::Denied => Err(ShellError::PermissionDenied(source.as_str().to_string())),
        }
    }
}

/// A surface the user can obtain an image from
pub trait ImageSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Capabilities that must be granted before [`ImageSource::acquire`] runs
    fn required_capabilities(&self) -> &'static [Capability];

    /// Launch the interactive surface. Resolves to `Ok(None)` when the user
    /// dismissed it.
    fn acquire(&self) -> BoxFuture<'_, Result<Option<DynamicImage>, ShellError>>;
}

/// Check permissions, then run the source
pub async fn acquire(
    gate: &PermissionGate,
    source: &dyn ImageSource,
) -> Result<AcquisitionResult, ShellError> {
    if !gate.ensure_granted(source.required_capabilities()).await {
        tracing::warn!("Skipping {} acquisition: permission denied", source.kind().as_str());
        return Ok(AcquisitionResult::Denied);
    }

    match source.acquire().await? {
        Some(image) => Ok(AcquisitionResult::Image(image)),
        None => {
            tracing::info!("{} acquisition cancelled by the user", source.kind().as_str());
            Ok(AcquisitionResult::Cancelled)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FixedSource;
    use super::*;
    use crate::permission::PermissionSet;
    use crate::prompt::PromptBroker;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_granted_source_yields_image() {
        let gate = PermissionGate::new(PermissionSet::from_granted(&Capability::ALL), PromptBroker::new());
        let source = FixedSource::solid([1, 2, 3]);

        let result = acquire(&gate, &source).await.unwrap();
        assert!(matches!(result, AcquisitionResult::Image(_)));
        assert_eq!(source.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_source() {
        let gate = PermissionGate::new(PermissionSet::from_granted(&Capability::ALL), PromptBroker::new());
        let source = FixedSource::cancelling();

        let result = acquire(&gate, &source).await.unwrap();
        assert!(matches!(result, AcquisitionResult::Cancelled));
        assert!(matches!(
            result.into_image(SourceKind::Camera),
            Err(ShellError::AcquisitionCancelled)
        ));
    }

    #[tokio::test]
    async fn test_denied_permission_never_launches_source() {
        let broker = PromptBroker::new();
        let gate = Arc::new(PermissionGate::new(PermissionSet::default(), broker.clone()));
        let source = Arc::new(FixedSource::solid([1, 2, 3]));

        let task = {
            let (gate, source) = (gate.clone(), source.clone());
            tokio::spawn(async move { acquire(&gate, source.as_ref()).await })
        };

        let prompt = loop {
            if let Some(p) = broker.list().into_iter().next() {
                break p;
            }
            tokio::task::yield_now().await;
        };
        broker.dismiss(prompt.id).unwrap();

        let result = task.await.unwrap().unwrap();
        assert!(matches!(result, AcquisitionResult::Denied));
        assert_eq!(source.launches.load(Ordering::SeqCst), 0);
    }
}
