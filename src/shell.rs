//! Application shell
//!
//! A single task owns the display state and applies every change to it.
//! Triggers and finished acquisition cycles reach it as commands on one
//! channel, so results are handled in the order they complete and the
//! surface never sees two writers.

use crate::acquisition::{self, ImageSource, SourceKind};
use crate::display::{DisplayState, PresentationSurface};
use crate::error::ShellError;
use crate::permission::{Capability, PermissionGate};
use crate::transform::{self, LumaWeights};
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot};

const COMMAND_BUFFER: usize = 32;
/// Cycles kept around for status queries. Pending cycles are never evicted.
const RETAINED_CYCLES: usize = 256;

/// Where an image can come from
pub struct Sources {
    pub camera: Arc<dyn ImageSource>,
    pub gallery: Arc<dyn ImageSource>,
}

impl Sources {
    fn get(&self, kind: SourceKind) -> Arc<dyn ImageSource> {
        match kind {
            SourceKind::Camera => self.camera.clone(),
            SourceKind::Gallery => self.gallery.clone(),
        }
    }
}

/// How an acquisition cycle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Pending,
    Displayed { generation: u64 },
    Cancelled,
    Denied,
    Failed { error: String },
}

/// One press of a trigger and what became of it
#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    pub id: u64,
    pub source: SourceKind,
    #[serde(flatten)]
    pub outcome: CycleOutcome,
}

type CycleLog = Arc<Mutex<BTreeMap<u64, CycleRecord>>>;

fn lock(cycles: &CycleLog) -> MutexGuard<'_, BTreeMap<u64, CycleRecord>> {
    cycles.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Command {
    Trigger {
        source: SourceKind,
        started: oneshot::Sender<u64>,
    },
    Completed {
        cycle: u64,
        source: SourceKind,
        result: Result<DynamicImage, ShellError>,
    },
}

pub struct Shell<S> {
    state: DisplayState,
    surface: S,
    gate: Arc<PermissionGate>,
    sources: Sources,
    weights: LumaWeights,
    cycles: CycleLog,
    next_cycle: u64,
    rx: mpsc::Receiver<Command>,
    tx: mpsc::WeakSender<Command>,
}

impl<S: PresentationSurface> Shell<S> {
    /// Start the shell task. With `startup_check` the user is asked for every
    /// capability right away instead of on first use.
    pub fn spawn(
        gate: Arc<PermissionGate>,
        sources: Sources,
        surface: S,
        weights: LumaWeights,
        startup_check: bool,
    ) -> ShellHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let cycles = CycleLog::default();

        if startup_check {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.ensure_granted(&Capability::ALL).await;
            });
        }

        let shell = Shell {
            state: DisplayState::default(),
            surface,
            gate,
            sources,
            weights,
            cycles: cycles.clone(),
            next_cycle: 0,
            rx,
            tx: tx.downgrade(),
        };
        tokio::spawn(shell.run());

        ShellHandle { tx, cycles }
    }

    async fn run(mut self) {
        tracing::info!("Shell started ({} luminance)", self.weights.as_str());

        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Trigger { source, started } => {
                    let id = self.start_cycle(source);
                    let _ = started.send(id);
                }
                Command::Completed {
                    cycle,
                    source,
                    result,
                } => self.finish_cycle(cycle, source, result),
            }
        }

        tracing::debug!("Shell stopped");
    }

    fn start_cycle(&mut self, kind: SourceKind) -> u64 {
        self.next_cycle += 1;
        let id = self.next_cycle;
        self.record(id, kind, CycleOutcome::Pending);

        let Some(tx) = self.tx.upgrade() else {
            self.record(
                id,
                kind,
                CycleOutcome::Failed {
                    error: "shell is shutting down".to_string(),
                },
            );
            return id;
        };

        tracing::info!("Cycle {}: use {}", id, kind.as_str());
        let gate = self.gate.clone();
        let source = self.sources.get(kind);
        let weights = self.weights;
        tokio::spawn(async move {
            let result = run_cycle(&gate, source.as_ref(), weights).await;
            let _ = tx
                .send(Command::Completed {
                    cycle: id,
                    source: kind,
                    result,
                })
                .await;
        });

        id
    }

    fn finish_cycle(&mut self, id: u64, kind: SourceKind, result: Result<DynamicImage, ShellError>) {
        let outcome = match result {
            Ok(image) => {
                let (width, height) = image.dimensions();
                let generation = self.show(image, kind);
                tracing::info!(
                    "Cycle {}: displaying {}x{} grayscale image (generation {})",
                    id,
                    width,
                    height,
                    generation
                );
                CycleOutcome::Displayed { generation }
            }
            Err(ShellError::AcquisitionCancelled) => {
                tracing::info!("Cycle {}: cancelled, display unchanged", id);
                CycleOutcome::Cancelled
            }
            Err(ShellError::PermissionDenied(_)) => {
                tracing::warn!("Cycle {}: permission denied, display unchanged", id);
                CycleOutcome::Denied
            }
            Err(e) => {
                tracing::error!("Cycle {}: {}, display unchanged", id, e);
                CycleOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        self.record(id, kind, outcome);
    }

    /// Replace the displayed image and render it
    fn show(&mut self, image: DynamicImage, source: SourceKind) -> u64 {
        let generation = self.state.replace(image, source);
        self.surface.render(&self.state);
        generation
    }

    fn record(&self, id: u64, source: SourceKind, outcome: CycleOutcome) {
        let mut cycles = lock(&self.cycles);
        cycles.insert(id, CycleRecord { id, source, outcome });
        while cycles.len() > RETAINED_CYCLES {
            let Some(oldest_finished) = cycles
                .values()
                .find(|r| r.outcome != CycleOutcome::Pending)
                .map(|r| r.id)
            else {
                break;
            };
            cycles.remove(&oldest_finished);
        }
    }
}

async fn run_cycle(
    gate: &PermissionGate,
    source: &dyn ImageSource,
    weights: LumaWeights,
) -> Result<DynamicImage, ShellError> {
    let image = acquisition::acquire(gate, source)
        .await?
        .into_image(source.kind())?;

    tokio::task::spawn_blocking(move || transform::to_grayscale(&image, weights))
        .await
        .map_err(|e| ShellError::Internal(format!("Task join error: {}", e)))?
}

/// Cloneable entry point into a running shell
#[derive(Clone)]
pub struct ShellHandle {
    tx: mpsc::Sender<Command>,
    cycles: CycleLog,
}

impl ShellHandle {
    /// Press a trigger. Returns as soon as the cycle is started.
    pub async fn trigger(&self, source: SourceKind) -> Result<u64, ShellError> {
        let (started, rx) = oneshot::channel();
        self.tx
            .send(Command::Trigger { source, started })
            .await
            .map_err(|_| ShellError::Internal("shell is not running".to_string()))?;
        rx.await
            .map_err(|_| ShellError::Internal("shell dropped the trigger".to_string()))
    }

    pub fn cycle(&self, id: u64) -> Result<CycleRecord, ShellError> {
        lock(&self.cycles)
            .get(&id)
            .cloned()
            .ok_or(ShellError::UnknownCycle(id))
    }
}
