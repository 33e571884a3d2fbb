use yoki_archive::ArchiveHeader;

/// Outcome of a background or auto-save, broadcast to every
/// [`subscribe`](crate::SaveManager::subscribe)r.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveEvent {
    pub slot: i32,
    pub kind: SaveEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveEventKind {
    /// The file was replaced; `header` is what now sits on disk.
    Completed { header: ArchiveHeader },
    /// The save failed and the previous file, if any, is untouched.
    Failed { message: String },
    /// A save for the slot was already in flight.
    Skipped,
}

impl SaveEvent {
    pub(crate) const fn new(slot: i32, kind: SaveEventKind) -> Self {
        Self { slot, kind }
    }
}
