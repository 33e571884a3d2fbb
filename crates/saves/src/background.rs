//! Background saves: the archive moves into a tokio task and comes back with the result.

use crate::error::SaveError;
use crate::events::{SaveEvent, SaveEventKind};
use crate::manager::SaveManager;
use fxhash::FxHashSet;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use yoki_archive::{Archive, ArchiveHeader, Postcard, Serializer};

/// Slots with a background save running.
#[derive(Debug, Default)]
pub(crate) struct InFlight(Arc<Mutex<FxHashSet<i32>>>);

impl InFlight {
    /// Marks `slot` busy, or returns `None` if it already is.
    pub(crate) fn try_acquire(&self, slot: i32) -> Option<InFlightGuard> {
        if self.0.lock().insert(slot) {
            Some(InFlightGuard { slots: Arc::clone(&self.0), slot })
        } else {
            None
        }
    }

    pub(crate) fn contains(&self, slot: i32) -> bool {
        self.0.lock().contains(&slot)
    }
}

/// Frees the slot on drop, including when the save task panics.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    slots: Arc<Mutex<FxHashSet<i32>>>,
    slot: i32,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.slots.lock().remove(&self.slot);
    }
}

/// What a finished background save hands back.
pub struct SaveOutcome<S: Serializer = Postcard> {
    /// The archive that was saved, returned to the caller unchanged.
    pub archive: Archive<S>,
    pub result: Result<ArchiveHeader, SaveError>,
}

impl<S: Serializer> fmt::Debug for SaveOutcome<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveOutcome")
            .field("archive", &self.archive)
            .field("result", &self.result)
            .finish()
    }
}

/// A save running on the tokio pool.
///
/// Dropping the handle does not cancel the save; the file is still replaced, but the archive
/// is then dropped with the task.
pub struct BackgroundSave<S: Serializer = Postcard> {
    slot: i32,
    handle: JoinHandle<SaveOutcome<S>>,
}

impl<S: Serializer> fmt::Debug for BackgroundSave<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundSave")
            .field("slot", &self.slot)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

impl<S: Serializer> BackgroundSave<S> {
    #[must_use]
    pub const fn slot(&self) -> i32 {
        self.slot
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the save and returns the archive together with its result.
    ///
    /// # Errors
    ///
    /// [`SaveError::Internal`] only if the task panicked; the archive is lost in that case.
    pub async fn wait(mut self) -> Result<SaveOutcome<S>, SaveError> {
        self.join().await
    }

    /// Polls the task by reference so it can sit in a `select!` loop.
    pub(crate) async fn join(&mut self) -> Result<SaveOutcome<S>, SaveError> {
        (&mut self.handle).await.map_err(|err| SaveError::Internal {
            message: format!("Background save task failed: {err}").into(),
            context: Some(format!("Slot {}", self.slot).into()),
        })
    }
}

impl<S: Serializer> SaveManager<S> {
    /// Saves `archive` into `slot` on a tokio task.
    ///
    /// Serialization, encryption and the write all happen off the caller. The archive is
    /// returned by [`BackgroundSave::wait`] and should not be needed until then.
    ///
    /// Only one background save per slot runs at a time: when one is already in flight this
    /// one is skipped, not queued, and `Err` hands the archive straight back.
    ///
    /// Must be called from within a tokio runtime.
    pub fn save_in_background(
        &self,
        slot: i32,
        archive: Archive<S>,
        display_name: Option<String>,
    ) -> Result<BackgroundSave<S>, Archive<S>> {
        let Some(guard) = self.in_flight.try_acquire(slot) else {
            debug!(slot, "Background save skipped, slot busy");
            self.emit(SaveEvent::new(slot, SaveEventKind::Skipped));
            return Err(archive);
        };

        let state = self.snapshot();
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let result = state.write_archive(slot, &archive, display_name.as_deref()).await;
            drop(guard);

            let kind = match &result {
                Ok(header) => SaveEventKind::Completed { header: header.clone() },
                Err(err) => {
                    warn!(slot, error = %err, "Background save failed");
                    SaveEventKind::Failed { message: err.to_string() }
                },
            };
            manager.emit(SaveEvent::new(slot, kind));

            SaveOutcome { archive, result }
        });

        Ok(BackgroundSave { slot, handle })
    }
}
