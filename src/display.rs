//! The display area and the state it renders
//!
//! [`DisplayState`] is owned by the shell and is only ever mutated there. A
//! [`PresentationSurface`] is handed the state by reference after every change
//! and publishes it; readers only ever observe whole frames.

use crate::acquisition::SourceKind;
use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::watch;

/// An image currently on screen
#[derive(Debug, Clone)]
pub struct Shown {
    pub image: Arc<DynamicImage>,
    /// Increases by one with every replacement, starting at 1
    pub generation: u64,
    pub source: SourceKind,
}

/// What the display area holds
#[derive(Debug, Default)]
pub struct DisplayState {
    current: Option<Shown>,
    generation: u64,
}

impl DisplayState {
    pub fn current(&self) -> Option<&Shown> {
        self.current.as_ref()
    }

    /// Replace the displayed image, returning its generation
    pub fn replace(&mut self, image: DynamicImage, source: SourceKind) -> u64 {
        self.generation += 1;
        self.current = Some(Shown {
            image: Arc::new(image),
            generation: self.generation,
            source,
        });
        self.generation
    }
}

/// Something that can put the display state in front of the user
pub trait PresentationSurface: Send + 'static {
    fn render(&mut self, state: &DisplayState);
}

/// Surface that publishes every rendered frame to any number of viewers
pub struct WatchSurface {
    tx: watch::Sender<Option<Shown>>,
}

impl WatchSurface {
    pub fn new() -> (Self, DisplayView) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, DisplayView { rx })
    }
}

impl PresentationSurface for WatchSurface {
    fn render(&mut self, state: &DisplayState) {
        self.tx.send_replace(state.current().cloned());
    }
}

/// Read-only view of the display area
#[derive(Clone)]
pub struct DisplayView {
    rx: watch::Receiver<Option<Shown>>,
}

impl DisplayView {
    pub fn snapshot(&self) -> Option<Shown> {
        self.rx.borrow().clone()
    }
}
