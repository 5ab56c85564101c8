use std::ffi::OsString;
use std::path::Path;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::MonitorResult;

/// Pending wake-ups beyond this are dropped; one queued wake-up already
/// guarantees a read of everything appended so far.
const WAKE_QUEUE_CAPACITY: usize = 16;

/// Best-effort "the file may have changed" signal backed by OS notifications.
///
/// The watcher callback runs on notify's own thread and only pushes into a
/// bounded queue. Lost or coalesced notifications are harmless because the
/// engine also polls on a fixed interval.
pub struct WakeSource {
    _watcher: Option<RecommendedWatcher>,
    rx: Option<mpsc::Receiver<()>>,
}

impl WakeSource {
    /// Watches the parent directory of `path` for events touching the file.
    ///
    /// The directory is watched rather than the file so creation, removal
    /// and rotation are seen too.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonitorError::Watch`] if the platform watcher cannot
    /// be created or the directory cannot be watched.
    pub fn watch(path: &Path) -> MonitorResult<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file_name: Option<OsString> = path.file_name().map(ToOwned::to_owned);
        let (tx, rx) = mpsc::channel(WAKE_QUEUE_CAPACITY);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let relevant = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == file_name.as_deref());
                if relevant {
                    // Full queue means a wake-up is already pending.
                    let _ = tx.try_send(());
                }
            }
            Err(e) => debug!(error = %e, "File watcher error"),
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        info!(dir = %dir.display(), "Watching for file notifications");
        Ok(Self {
            _watcher: Some(watcher),
            rx: Some(rx),
        })
    }

    /// A source that never fires, for poll-only operation.
    pub fn disabled() -> Self {
        Self {
            _watcher: None,
            rx: None,
        }
    }

    /// Whether notifications are being delivered.
    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    /// Resolves on the next notification, coalescing any that queued up
    /// meanwhile. Never resolves for a disabled source.
    pub async fn notified(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.recv().await.is_some() {
                while rx.try_recv().is_ok() {}
                return;
            }
            debug!("File watcher stopped, continuing with polling only");
            self.rx = None;
        }
        std::future::pending::<()>().await
    }
}
