use super::{ImageSource, SourceKind};
use crate::error::ShellError;
use crate::frame;
use crate::permission::Capability;
use crate::prompt::{PromptBroker, PromptKind, PromptReply, IMAGE_CONTENT_FILTER};
use futures::future::BoxFuture;
use futures::FutureExt;
use image::DynamicImage;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// File extensions the picker accepts as image content
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff"];

/// Turns an opaque gallery handle into the bytes it refers to
pub trait ContentResolver: Send + Sync {
    /// Read the content behind a handle
    fn resolve(&self, handle: &str) -> Result<Vec<u8>, ShellError>;

    /// Handles of every image currently available
    fn list(&self) -> Result<Vec<String>, ShellError>;
}

/// Resolves handles as file names inside a single gallery directory
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, handle: &str) -> Result<PathBuf, ShellError> {
        let relative = Path::new(handle);
        if handle.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(ShellError::Resolve(format!("invalid handle {:?}", handle)));
        }
        if !is_image_path(relative) {
            return Err(ShellError::Resolve(format!("{:?} is not image content", handle)));
        }

        let root = fs::canonicalize(&self.root)
            .map_err(|e| ShellError::Resolve(format!("gallery {}: {}", self.root.display(), e)))?;
        let path = fs::canonicalize(root.join(relative))
            .map_err(|e| ShellError::Resolve(format!("{}: {}", handle, e)))?;

        // Symlinks may still point outside the gallery
        if !path.starts_with(&root) {
            return Err(ShellError::Resolve(format!("{:?} escapes the gallery", handle)));
        }
        Ok(path)
    }
}

impl ContentResolver for DirectoryResolver {
    fn resolve(&self, handle: &str) -> Result<Vec<u8>, ShellError> {
        let path = self.locate(handle)?;
        fs::read(&path).map_err(|e| ShellError::Resolve(format!("{}: {}", path.display(), e)))
    }

    fn list(&self) -> Result<Vec<String>, ShellError> {
        let entries = fs::read_dir(&self.root)
            .map_err(|e| ShellError::Resolve(format!("gallery {}: {}", self.root.display(), e)))?;

        let mut handles: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| is_image_path(path))
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        handles.sort();
        Ok(handles)
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Pick an existing image through the gallery prompt
pub struct GallerySource {
    broker: PromptBroker,
    resolver: Arc<dyn ContentResolver>,
}

impl GallerySource {
    pub fn new(broker: PromptBroker, resolver: Arc<dyn ContentResolver>) -> Self {
        Self { broker, resolver }
    }
}

impl ImageSource for GallerySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Gallery
    }

    fn required_capabilities(&self) -> &'static [Capability] {
        &[Capability::StorageRead]
    }

    fn acquire(&self) -> BoxFuture<'_, Result<Option<DynamicImage>, ShellError>> {
        let pick = self.broker.launch(PromptKind::Gallery {
            content_filter: IMAGE_CONTENT_FILTER.to_string(),
        });
        tracing::info!("Gallery picker {} launched", pick.id());

        async move {
            let handle = match pick.await {
                Some(PromptReply::Handle(handle)) => handle,
                Some(other) => {
                    return Err(ShellError::Internal(format!(
                        "gallery prompt answered with {:?}",
                        other
                    )))
                }
                None => return Ok(None),
            };

            tracing::debug!("Resolving gallery handle {:?}", handle);
            let resolver = self.resolver.clone();
            tokio::task::spawn_blocking(move || {
                let bytes = resolver.resolve(&handle)?;
                frame::decode(&bytes)
            })
            .await
            .map_err(|e| ShellError::Internal(format!("Task join error: {}", e)))?
            .map(Some)
        }
        .boxed()
    }
}
