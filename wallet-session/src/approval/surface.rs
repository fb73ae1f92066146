//! Host abstraction for approval surfaces.
//!
//! A host opens top-level windows, delivers their inbound messages, and
//! supplies timers. Browser hosts implement this over `window.open` and the
//! `message` event; tests use scripted hosts.

use std::time::Duration;

use futures::channel::mpsc::UnboundedReceiver;
use futures::future::LocalBoxFuture;
use url::Url;

use crate::errors::WalletResult;

/// Window geometry for the approval surface. Surfaces never show browser chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceFeatures {
    pub width: u32,
    pub height: u32,
}

impl SurfaceFeatures {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `window.open` feature string.
    pub fn to_window_features(&self) -> String {
        format!(
            "width={},height={},toolbar=no,menubar=no,location=no,status=no,scrollbars=yes,resizable=yes",
            self.width, self.height
        )
    }
}

impl Default for SurfaceFeatures {
    fn default() -> Self {
        Self::new(480, 640)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    /// A structured message posted to the opener, with its sender origin.
    Message {
        origin: String,
        data: serde_json::Value,
    },
    /// Emitted by hosts that can observe the surface closing directly.
    Closed,
}

/// Control over one opened surface.
pub trait SurfaceHandle {
    /// Polled as a fallback when the host cannot emit [`SurfaceEvent::Closed`].
    fn is_closed(&self) -> bool;
    fn close(&self);
    /// Remove every listener the host attached for this surface.
    fn detach(&self);
}

pub struct OpenedSurface {
    pub handle: Box<dyn SurfaceHandle>,
    pub events: UnboundedReceiver<SurfaceEvent>,
}

pub trait SurfaceHost {
    /// URL of the page that requests approval; used for callback parameters.
    fn current_url(&self) -> String;

    /// Open a surface at `url`. Fails with `PopupBlocked` when the host refuses,
    /// in which case no listener may remain attached.
    fn open(&self, url: &Url, features: &SurfaceFeatures) -> WalletResult<OpenedSurface>;

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Closes and detaches the surface on every exit path, including drop of the
/// pending future.
pub(crate) struct SurfaceGuard {
    handle: Box<dyn SurfaceHandle>,
}

impl SurfaceGuard {
    pub(crate) fn new(handle: Box<dyn SurfaceHandle>) -> Self {
        Self { handle }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        self.handle.detach();
        if !self.handle.is_closed() {
            self.handle.close();
        }
    }
}
