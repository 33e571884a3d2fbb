//! Periodic saves of one slot, driven by a scheduler task.

use crate::background::BackgroundSave;
use crate::config::SaveConfig;
use crate::error::SaveError;
use crate::events::{SaveEvent, SaveEventKind};
use crate::manager::SaveManager;
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{info, warn};
use yoki_archive::{Archive, Postcard, Serializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSaveOptions {
    interval: Duration,
    display_name: Option<String>,
}

impl AutoSaveOptions {
    /// Saves every `interval`, first one `interval` after start.
    ///
    /// # Errors
    ///
    /// [`SaveError::InvalidConfiguration`] for a zero interval.
    pub fn every(interval: Duration) -> Result<Self, SaveError> {
        if interval.is_zero() {
            return Err(SaveError::invalid_config("Auto-save interval must be positive"));
        }
        Ok(Self { interval, display_name: None })
    }

    /// Uses `auto_save_interval_secs` of a validated configuration.
    #[must_use]
    pub const fn from_config(config: &SaveConfig) -> Self {
        Self { interval: config.auto_save_interval(), display_name: None }
    }

    /// Name written into the header on each auto-save. Without one the stored name is kept.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

/// Controls a running auto-save.
///
/// Dropping the handle also stops the scheduler, but the archive is then lost with it;
/// call [`stop`](Self::stop) to get it back.
pub struct AutoSaveHandle<S: Serializer = Postcard> {
    slot: i32,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<Archive<S>, SaveError>>,
}

impl<S: Serializer> fmt::Debug for AutoSaveHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoSaveHandle")
            .field("slot", &self.slot)
            .field("running", &!self.task.is_finished())
            .finish()
    }
}

impl<S: Serializer> AutoSaveHandle<S> {
    #[must_use]
    pub const fn slot(&self) -> i32 {
        self.slot
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops scheduling, waits for a save still in flight, and returns the archive.
    ///
    /// # Errors
    ///
    /// [`SaveError::Internal`] if the scheduler or its last save panicked.
    pub async fn stop(self) -> Result<Archive<S>, SaveError> {
        // The scheduler may already be gone after a panic; the join below reports it.
        let _ = self.stop.send(());
        self.task.await.map_err(|err| SaveError::Internal {
            message: format!("Auto-save task failed: {err}").into(),
            context: Some(format!("Slot {}", self.slot).into()),
        })?
    }
}

impl<S: Serializer> SaveManager<S> {
    /// Saves `archive` into `slot` every `options.interval`.
    ///
    /// On each tick the scheduler calls `before_save` with the archive, then hands it to a
    /// [background save](Self::save_in_background) and leaves it alone until the save returns
    /// it. A tick that finds the slot still busy is skipped with a warning. Outcomes are
    /// reported through [`subscribe`](Self::subscribe).
    ///
    /// Must be called from within a tokio runtime.
    pub fn auto_save<F>(
        &self,
        slot: i32,
        archive: Archive<S>,
        options: AutoSaveOptions,
        before_save: F,
    ) -> AutoSaveHandle<S>
    where
        F: FnMut(&mut Archive<S>) + Send + 'static,
    {
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(schedule(self.clone(), slot, archive, options, before_save, stopped));
        AutoSaveHandle { slot, stop, task }
    }
}

async fn schedule<S, F>(
    manager: SaveManager<S>,
    slot: i32,
    archive: Archive<S>,
    options: AutoSaveOptions,
    mut before_save: F,
    mut stopped: oneshot::Receiver<()>,
) -> Result<Archive<S>, SaveError>
where
    S: Serializer,
    F: FnMut(&mut Archive<S>) + Send + 'static,
{
    let mut ticker = time::interval_at(Instant::now() + options.interval, options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut idle = Some(archive);
    let mut pending: Option<BackgroundSave<S>> = None;
    info!(slot, interval_ms = options.interval.as_millis() as u64, "Auto-save started");

    loop {
        tokio::select! {
            _ = &mut stopped => break,
            joined = async {
                match pending.as_mut() {
                    Some(job) => job.join().await,
                    None => std::future::pending().await,
                }
            }, if pending.is_some() => {
                pending = None;
                idle = Some(joined?.archive);
            }
            _ = ticker.tick() => {
                // The guard drops before the job is joined, so `pending` covers that gap.
                if pending.is_some() || manager.is_saving(slot) {
                    warn!(slot, "Auto-save tick skipped, previous save still running");
                    manager.emit(SaveEvent::new(slot, SaveEventKind::Skipped));
                    continue;
                }
                let Some(mut archive) = idle.take() else {
                    continue;
                };
                before_save(&mut archive);
                match manager.save_in_background(slot, archive, options.display_name.clone()) {
                    Ok(job) => pending = Some(job),
                    Err(archive) => {
                        warn!(slot, "Auto-save tick skipped, slot busy");
                        idle = Some(archive);
                    },
                }
            }
        }
    }

    if let Some(mut job) = pending.take() {
        idle = Some(job.join().await?.archive);
    }
    info!(slot, "Auto-save stopped");
    idle.ok_or_else(|| SaveError::from("Auto-save lost its archive"))
}
