//! Interactive prompts awaiting an answer from the user
//!
//! Every interactive surface (permission dialog, camera capture, gallery
//! picker) is launched as a prompt. Launching returns immediately with a
//! [`PromptHandle`]; the handle resolves exactly once, either with the user's
//! reply or with `None` when the prompt was dismissed.

use crate::error::ShellError;
use crate::permission::Capability;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// MIME filter the gallery picker is restricted to
pub const IMAGE_CONTENT_FILTER: &str = "image/*";

/// What the user is being asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptKind {
    Permissions { capabilities: Vec<Capability> },
    Camera,
    Gallery { content_filter: String },
}

impl PromptKind {
    fn expected_reply(&self) -> &'static str {
        match self {
            Self::Permissions { .. } => "granted capabilities",
            Self::Camera => "captured frame",
            Self::Gallery { .. } => "content handle",
        }
    }
}

/// The user's answer to a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptReply {
    /// Subset of the requested capabilities the user granted
    Permissions(Vec<Capability>),
    /// Encoded still image from the capture surface
    Frame(Vec<u8>),
    /// Opaque handle of the picked gallery item
    Handle(String),
}

impl PromptReply {
    fn answers(&self, kind: &PromptKind) -> bool {
        matches!(
            (kind, self),
            (PromptKind::Permissions { .. }, PromptReply::Permissions(_))
                | (PromptKind::Camera, PromptReply::Frame(_))
                | (PromptKind::Gallery { .. }, PromptReply::Handle(_))
        )
    }
}

/// Public view of a pending prompt
#[derive(Debug, Clone, Serialize)]
pub struct PromptInfo {
    pub id: u64,
    #[serde(flatten)]
    pub kind: PromptKind,
}

struct Pending {
    kind: PromptKind,
    reply: oneshot::Sender<PromptReply>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    pending: Mutex<BTreeMap<u64, Pending>>,
}

/// Registry of prompts currently shown to the user
#[derive(Clone, Default)]
pub struct PromptBroker {
    inner: Arc<Inner>,
}

impl PromptBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, BTreeMap<u64, Pending>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Show a prompt; the returned handle resolves once it is answered or dismissed
    pub fn launch(&self, kind: PromptKind) -> PromptHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();

        tracing::debug!("Launching prompt {} ({:?})", id, kind);
        self.pending().insert(id, Pending { kind, reply: tx });

        PromptHandle {
            id,
            rx,
            broker: self.clone(),
        }
    }

    /// Prompts waiting for the user, oldest first
    pub fn list(&self) -> Vec<PromptInfo> {
        self.pending()
            .iter()
            .map(|(id, p)| PromptInfo {
                id: *id,
                kind: p.kind.clone(),
            })
            .collect()
    }

    /// Kind of a pending prompt
    pub fn kind_of(&self, id: u64) -> Result<PromptKind, ShellError> {
        self.pending()
            .get(&id)
            .map(|p| p.kind.clone())
            .ok_or(ShellError::UnknownPrompt(id))
    }

    /// Answer a prompt. A reply of the wrong shape leaves the prompt pending.
    pub fn respond(&self, id: u64, reply: PromptReply) -> Result<(), ShellError> {
        let pending = {
            let mut map = self.pending();
            let entry = map.get(&id).ok_or(ShellError::UnknownPrompt(id))?;
            if !reply.answers(&entry.kind) {
                return Err(ShellError::PromptMismatch {
                    id,
                    expected: entry.kind.expected_reply(),
                });
            }
            map.remove(&id).ok_or(ShellError::UnknownPrompt(id))?
        };

        tracing::debug!("Prompt {} answered", id);
        // The launcher may have given up in the meantime
        let _ = pending.reply.send(reply);
        Ok(())
    }

    /// Close a prompt without answering it
    pub fn dismiss(&self, id: u64) -> Result<(), ShellError> {
        self.pending()
            .remove(&id)
            .map(|_| tracing::debug!("Prompt {} dismissed", id))
            .ok_or(ShellError::UnknownPrompt(id))
    }
}

/// Pending result of a launched prompt
pub struct PromptHandle {
    id: u64,
    rx: oneshot::Receiver<PromptReply>,
    broker: PromptBroker,
}

impl PromptHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for PromptHandle {
    /// `None` when the prompt was dismissed
    type Output = Option<PromptReply>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(Result::ok)
    }
}

impl Drop for PromptHandle {
    fn drop(&mut self) {
        // Nobody is waiting any more, so stop showing the prompt
        self.broker.pending().remove(&self.id);
    }
}
