#![allow(dead_code)]

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use yoki_archive::prelude::*;

#[save_module(tag = "player.stats")]
pub struct PlayerStats {
    pub level: u32,
    pub gold: u64,
}

#[save_module(tag = "player.inventory")]
pub struct Inventory {
    pub items: Vec<String>,
}

#[save_module(tag = "world.flags")]
pub enum WorldPhase {
    Dawn,
    Night { moon: u8 },
}

/// Postcard that counts how many module decodes it performed.
#[derive(Debug, Default, Clone)]
pub struct CountingSerializer {
    pub decodes: Arc<AtomicUsize>,
}

impl CountingSerializer {
    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl Serializer for CountingSerializer {
    fn name(&self) -> &'static str {
        "counting-postcard"
    }

    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, ArchiveError> {
        Postcard.serialize(value)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ArchiveError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        Postcard.deserialize(bytes)
    }
}
