//! Schema migrations between save-file versions.
//!
//! A [`Migrator`] moves an archive from one schema version to a strictly greater one. The
//! [`MigrationChain`] links migrators by their source version and plans a full path before
//! anything is applied, so an unreachable target never leaves a half-migrated archive.

use crate::archive::Archive;
use crate::error::ArchiveError;
use crate::module::{Module, ModuleKey};
use crate::serializer::{Postcard, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

pub type ArchiveTransform<S> =
    Box<dyn Fn(&mut Archive<S>) -> Result<(), ArchiveError> + Send + Sync + 'static>;

pub type ModuleTransform =
    Box<dyn Fn(ModuleKey, &[u8]) -> Result<Vec<u8>, ArchiveError> + Send + Sync + 'static>;

/// How a migrator rewrites the archive.
pub enum Transform<S: Serializer = Postcard> {
    /// Free-form access to the whole archive.
    Archive(ArchiveTransform<S>),
    /// Applied to the bytes of every entry that has not been decoded yet.
    Module(ModuleTransform),
}

/// One step of the migration chain: `from` → `to`.
pub struct Migrator<S: Serializer = Postcard> {
    from: i32,
    to: i32,
    transform: Transform<S>,
}

impl<S: Serializer> fmt::Debug for Migrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.transform {
            Transform::Archive(_) => "archive",
            Transform::Module(_) => "module",
        };
        f.debug_struct("Migrator")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("transform", &kind)
            .finish()
    }
}

impl<S: Serializer> Migrator<S> {
    /// A migrator with whole-archive access.
    pub fn archive<F>(from: i32, to: i32, transform: F) -> Self
    where
        F: Fn(&mut Archive<S>) -> Result<(), ArchiveError> + Send + Sync + 'static,
    {
        Self { from, to, transform: Transform::Archive(Box::new(transform)) }
    }

    /// A migrator that rewrites raw module bytes, entry by entry.
    pub fn module<F>(from: i32, to: i32, transform: F) -> Self
    where
        F: Fn(ModuleKey, &[u8]) -> Result<Vec<u8>, ArchiveError> + Send + Sync + 'static,
    {
        Self { from, to, transform: Transform::Module(Box::new(transform)) }
    }

    /// A migrator replacing module `Old` with `New` through a typed conversion.
    ///
    /// `Old` and `New` may share a tag when a module evolves in place. Archives without
    /// `Old` pass through unchanged.
    pub fn convert<Old, New, F>(from: i32, to: i32, convert: F) -> Self
    where
        Old: Module,
        New: Module,
        F: Fn(Old) -> New + Send + Sync + 'static,
    {
        Self::archive(from, to, move |archive| {
            if let Some(old) = archive.take_module::<Old>()? {
                archive.register_module(convert(old));
            }
            Ok(())
        })
    }

    #[must_use]
    pub const fn from(&self) -> i32 {
        self.from
    }

    #[must_use]
    pub const fn to(&self) -> i32 {
        self.to
    }

    /// Runs this step on `archive`.
    ///
    /// # Errors
    ///
    /// Wraps the transform's error in [`ArchiveError::Migration`].
    pub fn apply(&self, archive: &mut Archive<S>) -> Result<(), ArchiveError> {
        let result = match &self.transform {
            Transform::Archive(f) => f(archive),
            Transform::Module(f) => archive.map_encoded(|key, bytes| f(key, bytes)),
        };
        result.map_err(|err| ArchiveError::Migration {
            from: self.from,
            to: self.to,
            source: Box::new(err),
            context: None,
        })
    }
}

/// Migrators indexed by source version.
pub struct MigrationChain<S: Serializer = Postcard> {
    steps: BTreeMap<i32, Arc<Migrator<S>>>,
}

impl<S: Serializer> Default for MigrationChain<S> {
    fn default() -> Self {
        Self { steps: BTreeMap::new() }
    }
}

impl<S: Serializer> Clone for MigrationChain<S> {
    fn clone(&self) -> Self {
        Self { steps: self.steps.clone() }
    }
}

impl<S: Serializer> fmt::Debug for MigrationChain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.steps.values().map(|m| (m.from, m.to))).finish()
    }
}

impl<S: Serializer> MigrationChain<S> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a step.
    ///
    /// # Errors
    ///
    /// * [`ArchiveError::InvalidMigrator`] unless `to > from`.
    /// * [`ArchiveError::DuplicateMigrator`] if a step from the same version exists.
    pub fn register(&mut self, migrator: Migrator<S>) -> Result<(), ArchiveError> {
        if migrator.to <= migrator.from {
            return Err(ArchiveError::InvalidMigrator {
                from: migrator.from,
                to: migrator.to,
                context: None,
            });
        }
        if self.steps.contains_key(&migrator.from) {
            return Err(ArchiveError::DuplicateMigrator { from: migrator.from, context: None });
        }

        debug!(from = migrator.from, to = migrator.to, "Migrator registered");
        self.steps.insert(migrator.from, Arc::new(migrator));
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Plans the steps leading from `from` to exactly `to`.
    ///
    /// `from == to` yields an empty plan.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::MigrationUnreachable`] when no step starts at the current
    /// frontier, when a step overshoots `to`, or when `from > to`. `frontier` reports the
    /// version the plan got stuck at.
    pub fn resolve(&self, from: i32, to: i32) -> Result<Vec<Arc<Migrator<S>>>, ArchiveError> {
        let mut plan = Vec::new();
        let mut frontier = from;

        while frontier != to {
            let next = self.steps.get(&frontier).filter(|m| frontier < to && m.to <= to);
            let Some(step) = next else {
                return Err(ArchiveError::MigrationUnreachable { from, to, frontier, context: None });
            };
            plan.push(Arc::clone(step));
            frontier = step.to;
        }

        Ok(plan)
    }

    /// Resolves the full plan, then applies it in order. Returns the number of steps run.
    ///
    /// Nothing is applied when resolution fails.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::MigrationUnreachable`] from planning, or [`ArchiveError::Migration`]
    /// if a step fails midway (the archive is then partially migrated and should be dropped).
    pub fn migrate(
        &self,
        archive: &mut Archive<S>,
        from: i32,
        to: i32,
    ) -> Result<usize, ArchiveError> {
        let plan = self.resolve(from, to)?;

        for step in &plan {
            step.apply(archive)?;
            debug!(from = step.from, to = step.to, "Migration step applied");
        }

        if !plan.is_empty() {
            info!(from, to, steps = plan.len(), "Archive migrated");
        }
        Ok(plan.len())
    }
}
