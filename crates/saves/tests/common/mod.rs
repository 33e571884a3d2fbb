#![allow(dead_code)]

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use yoki_archive::prelude::*;
use yoki_saves::SaveManager;

#[save_module(tag = "player.stats")]
pub struct PlayerStats {
    pub level: u32,
    pub gold: u64,
}

#[save_module(tag = "player.inventory")]
pub struct Inventory {
    pub items: Vec<String>,
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

pub async fn manager(root: &Path) -> SaveManager {
    SaveManager::builder().save_path(root).connect().await.expect("Manager setup failed")
}

pub fn sample(manager: &SaveManager) -> Archive {
    let mut archive = manager.archive();
    archive.register_module(PlayerStats { level: 12, gold: 340 });
    archive.register_module(Inventory { items: vec!["rope".into(), "torch".into()] });
    archive
}

pub fn stats(archive: &mut Archive) -> PlayerStats {
    archive.get_module::<PlayerStats>().unwrap().expect("stats module present").as_ref().clone()
}
