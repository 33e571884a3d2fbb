pub mod fixtures;

use fixtures::*;
use std::sync::Arc;
use yoki_archive::prelude::*;
use yoki_archive::format;

macro_rules! filler_modules {
    ($($name:ident => $tag:literal),* $(,)?) => {
        $(
            #[save_module(tag = $tag)]
            struct $name {
                value: u32,
            }
        )*

        fn register_fillers<S: Serializer>(archive: &mut Archive<S>) {
            $( archive.register_module($name { value: 1 }); )*
        }
    };
}

filler_modules! {
    Filler1 => "filler.1", Filler2 => "filler.2", Filler3 => "filler.3",
    Filler4 => "filler.4", Filler5 => "filler.5", Filler6 => "filler.6",
    Filler7 => "filler.7", Filler8 => "filler.8", Filler9 => "filler.9",
}

fn sample() -> Archive {
    let mut archive = Archive::<Postcard>::default();
    archive.register_module(PlayerStats { level: 4, gold: 250 });
    archive.register_module(Inventory { items: vec!["sword".into(), "lantern".into()] });
    archive.register_module(WorldPhase::Night { moon: 3 });
    archive
}

fn reload<S: Serializer>(archive: &Archive<S>) -> Archive<S> {
    let bytes = archive.to_table_bytes().unwrap();
    Archive::from_table_bytes(archive.serializer(), &bytes).unwrap()
}

#[test]
fn test_roundtrip_restores_every_module() {
    let mut restored = reload(&sample());

    assert_eq!(restored.len(), 3);
    assert_eq!(*restored.get_module::<PlayerStats>().unwrap().unwrap(), PlayerStats {
        level: 4,
        gold: 250
    });
    assert_eq!(restored.get_module::<Inventory>().unwrap().unwrap().items, ["sword", "lantern"]);
    assert_eq!(*restored.get_module::<WorldPhase>().unwrap().unwrap(), WorldPhase::Night {
        moon: 3
    });
}

#[test]
fn test_missing_module_is_none() {
    let mut archive = Archive::<Postcard>::default();
    assert!(archive.get_module::<PlayerStats>().unwrap().is_none());
    assert!(!archive.has_module::<PlayerStats>());
}

#[test]
fn test_lazy_decoding_touches_only_requested_module() {
    let serializer = Arc::new(CountingSerializer::default());
    let mut archive = Archive::new(Arc::clone(&serializer));
    archive.register_module(PlayerStats { level: 1, gold: 0 });
    register_fillers(&mut archive);
    assert_eq!(archive.len(), 10);

    let mut restored = reload(&archive);
    assert_eq!(serializer.decodes(), 0, "loading a table decodes nothing");

    restored.get_module::<PlayerStats>().unwrap();
    restored.get_module::<PlayerStats>().unwrap();
    assert_eq!(serializer.decodes(), 1, "decoded once and memoized");
    assert!(restored.is_loaded::<PlayerStats>());
    assert!(!restored.is_loaded::<Filler1>());
}

#[test]
fn test_untouched_raw_entries_pass_through_byte_for_byte() {
    let original = sample();
    let first = original.to_table_bytes().unwrap();

    let mut restored = Archive::from_table_bytes(original.serializer(), &first).unwrap();
    restored.get_module::<Inventory>().unwrap();
    assert_eq!(restored.to_table_bytes().unwrap(), first);

    let stats_key = PlayerStats::KEY;
    let before = restored.raw_bytes(stats_key).unwrap().to_vec();
    restored.register_module(PlayerStats { level: 5, gold: 250 });
    assert!(restored.raw_bytes(stats_key).is_none());

    let table = restored.serialize_all().unwrap();
    let entry = table.iter().find(|e| e.key == stats_key).unwrap();
    assert_ne!(entry.data, before);
}

#[test]
fn test_register_overwrites_and_remove_drops() {
    let mut archive = sample();
    archive.register_module(PlayerStats { level: 99, gold: 1 });
    assert_eq!(archive.len(), 3);
    assert_eq!(archive.get_module::<PlayerStats>().unwrap().unwrap().level, 99);

    assert!(archive.remove_module::<PlayerStats>());
    assert!(!archive.remove_module::<PlayerStats>());
    assert_eq!(archive.len(), 2);
}

#[test]
fn test_shared_modules_are_not_copied() {
    let stats = Arc::new(PlayerStats { level: 2, gold: 2 });
    let mut archive = Archive::<Postcard>::default();
    archive.register_shared(Arc::clone(&stats));

    let fetched = archive.get_module::<PlayerStats>().unwrap().unwrap();
    assert!(Arc::ptr_eq(&stats, &fetched));
}

#[test]
fn test_tag_collision_reports_type_mismatch() {
    #[save_module(tag = "player.stats")]
    struct Impostor {
        level: u32,
    }

    let mut archive = sample();
    let err = archive.get_module::<Impostor>().unwrap_err();
    assert!(matches!(err, ArchiveError::TypeMismatch { .. }), "{err}");
}

#[test]
fn test_undecodable_raw_entry_stays_raw() {
    let mut archive = Archive::<Postcard>::default();
    archive.insert_raw(PlayerStats::KEY, vec![0xFF]);

    let err = archive.get_module::<PlayerStats>().unwrap_err();
    assert!(matches!(err, ArchiveError::Serialization { .. }));
    assert_eq!(archive.raw_bytes(PlayerStats::KEY), Some(&[0xFF][..]));
}

#[test]
fn test_take_module_returns_owned_value() {
    let mut archive = reload(&sample());
    let stats = archive.take_module::<PlayerStats>().unwrap().unwrap();
    assert_eq!(stats.level, 4);
    assert!(!archive.has_module::<PlayerStats>());

    let shared = Arc::new(Inventory { items: vec!["key".into()] });
    archive.register_shared(Arc::clone(&shared));
    assert_eq!(archive.take_module::<Inventory>().unwrap().unwrap(), *shared);
}

#[test]
fn test_raw_helpers() {
    let mut archive = reload(&sample());
    let key = Inventory::KEY;

    archive.map_encoded(|_, bytes| Ok(bytes.to_vec())).unwrap();
    assert!(archive.raw_bytes(key).is_some());

    let failed = archive.map_encoded(|k, bytes| {
        if k == key {
            return Err(ArchiveError::InvalidFormat { message: "rejected".into(), context: None });
        }
        Ok(vec![bytes.len() as u8])
    });
    assert!(failed.is_err());
    assert_ne!(archive.raw_bytes(PlayerStats::KEY).map(<[u8]>::len), Some(1), "no partial rewrite");

    let bytes = archive.remove_raw(key).unwrap();
    archive.insert_raw(key, bytes);
    assert!(archive.contains_key(key));

    let keys: Vec<_> = archive.keys().collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn test_json_serializer_is_interchangeable() {
    let mut archive = Archive::<Json>::default();
    archive.register_module(PlayerStats { level: 8, gold: 16 });

    let table = archive.serialize_all().unwrap();
    assert_eq!(table[0].data, br#"{"level":8,"gold":16}"#);

    let mut restored = Archive::from_entries(archive.serializer(), table);
    assert_eq!(restored.get_module::<PlayerStats>().unwrap().unwrap().gold, 16);
}

#[test]
fn test_tables_are_deterministic() {
    let a = sample().to_table_bytes().unwrap();
    let b = sample().to_table_bytes().unwrap();
    assert_eq!(a, b);
    assert_eq!(format::decode_table(&a).unwrap().len(), 3);
}
