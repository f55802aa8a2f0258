//! Capability checks in front of the acquisition paths

use crate::prompt::{PromptBroker, PromptKind, PromptReply};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// A capability the user has to grant before an image can be acquired
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Camera,
    StorageRead,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Camera, Capability::StorageRead];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::StorageRead => "storage-read",
        }
    }
}

/// Grant state of every capability. Lives only as long as the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PermissionSet {
    pub camera: bool,
    pub storage_read: bool,
}

impl PermissionSet {
    pub fn from_granted(granted: &[Capability]) -> Self {
        let mut set = Self::default();
        for cap in granted {
            set.grant(*cap);
        }
        set
    }

    pub fn is_granted(&self, capability: Capability) -> bool {
        match capability {
            Capability::Camera => self.camera,
            Capability::StorageRead => self.storage_read,
        }
    }

    pub fn grant(&mut self, capability: Capability) {
        match capability {
            Capability::Camera => self.camera = true,
            Capability::StorageRead => self.storage_read = true,
        }
    }

    pub fn all_granted(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().all(|c| self.is_granted(*c))
    }
}

/// Asks the user for missing capabilities and remembers the answers
pub struct PermissionGate {
    granted: Mutex<PermissionSet>,
    broker: PromptBroker,
}

impl PermissionGate {
    pub fn new(initial: PermissionSet, broker: PromptBroker) -> Self {
        Self {
            granted: Mutex::new(initial),
            broker,
        }
    }

    pub fn snapshot(&self) -> PermissionSet {
        *self.granted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true once every requested capability is granted.
    ///
    /// If any is missing, a single prompt covering the whole requested set is
    /// shown and the call suspends until the user answers it. Dismissing the
    /// prompt counts as denying everything that was not already granted.
    pub async fn ensure_granted(&self, capabilities: &[Capability]) -> bool {
        if self.snapshot().all_granted(capabilities) {
            tracing::debug!("Permissions already granted: {}", names(capabilities));
            return true;
        }

        let reply = self
            .broker
            .launch(PromptKind::Permissions {
                capabilities: capabilities.to_vec(),
            })
            .await;

        let answered = match reply {
            Some(PromptReply::Permissions(granted)) => granted,
            _ => Vec::new(),
        };

        let all = {
            let mut set = self.granted.lock().unwrap_or_else(PoisonError::into_inner);
            for cap in answered.iter().filter(|c| capabilities.contains(*c)) {
                set.grant(*cap);
            }
            set.all_granted(capabilities)
        };

        if all {
            tracing::info!("Permissions granted: {}", names(capabilities));
        } else {
            tracing::warn!("Permissions denied: {}", names(capabilities));
        }
        all
    }
}

fn names(capabilities: &[Capability]) -> String {
    capabilities
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
