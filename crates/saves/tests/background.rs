mod common;

use common::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use yoki_crypto::{CryptoError, Encryptor};
use yoki_saves::*;

#[tokio::test]
async fn test_background_save_returns_archive_and_header() {
    let tmp = tempfile::tempdir().unwrap();
    let saves = manager(tmp.path()).await;
    let mut events = saves.subscribe();

    let job = saves
        .save_in_background(2, sample(&saves), Some("Background".to_owned()))
        .expect("slot 2 is idle");
    assert_eq!(job.slot(), 2);

    let outcome = job.wait().await.unwrap();
    let header = outcome.result.unwrap();
    assert_eq!(header.display_name, "Background");
    assert_eq!(outcome.archive.len(), 2, "archive comes back intact");
    assert!(!saves.is_saving(2));
    assert_eq!(saves.get_meta(2).await, Some(header.clone()));

    let event = events.recv().await.unwrap();
    assert_eq!(event, SaveEvent { slot: 2, kind: SaveEventKind::Completed { header } });
}

#[tokio::test]
async fn test_second_background_save_of_busy_slot_is_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let saves = manager(tmp.path()).await;
    let mut events = saves.subscribe();

    // On the current-thread runtime the first task cannot start before we yield.
    let first = saves.save_in_background(0, sample(&saves), None).expect("slot 0 is idle");
    assert!(saves.is_saving(0));

    let returned = saves.save_in_background(0, sample(&saves), None).expect_err("slot 0 is busy");
    assert_eq!(returned.len(), 2);
    assert_eq!(events.recv().await.unwrap().kind, SaveEventKind::Skipped);

    let other = saves.save_in_background(1, sample(&saves), None).expect("slot 1 is idle");

    assert!(first.wait().await.unwrap().result.is_ok());
    assert!(other.wait().await.unwrap().result.is_ok());
    assert!(saves.save_in_background(0, sample(&saves), None).is_ok());
}

#[tokio::test]
async fn test_background_failure_is_reported() {
    let tmp = tempfile::tempdir().unwrap();
    let saves = manager(tmp.path()).await;
    let mut events = saves.subscribe();

    let job = saves.save_in_background(99, sample(&saves), None).unwrap();
    let outcome = job.wait().await.unwrap();

    assert!(matches!(outcome.result, Err(SaveError::SlotOutOfRange { slot: 99, .. })));
    assert_eq!(outcome.archive.len(), 2);
    let event = events.recv().await.unwrap();
    assert!(matches!(event.kind, SaveEventKind::Failed { .. }));
    assert!(!saves.is_saving(99));
}

#[tokio::test]
async fn test_auto_save_runs_hook_and_returns_archive() {
    let tmp = tempfile::tempdir().unwrap();
    let saves = manager(tmp.path()).await;
    let ticks = Arc::new(AtomicU32::new(0));

    let options = AutoSaveOptions::every(Duration::from_millis(40)).unwrap().display_name("Auto");
    let hook_ticks = Arc::clone(&ticks);
    let handle = saves.auto_save(3, sample(&saves), options, move |archive| {
        let tick = hook_ticks.fetch_add(1, Ordering::SeqCst) + 1;
        archive.register_module(PlayerStats { level: tick, gold: 0 });
    });
    assert_eq!(handle.slot(), 3);
    assert!(handle.is_running());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let mut archive = handle.stop().await.unwrap();

    let hook_runs = ticks.load(Ordering::SeqCst);
    assert!(hook_runs >= 1, "at least one tick in 200ms");
    assert_eq!(stats(&mut archive).level, hook_runs);

    let meta = saves.get_meta(3).await.expect("auto-save wrote the slot");
    assert_eq!(meta.display_name, "Auto");
    let mut on_disk = saves.load(3).await.unwrap().unwrap();
    assert_eq!(stats(&mut on_disk).level, hook_runs);
}

/// Pass-through cipher that takes a while to seal.
#[derive(Debug)]
struct SlowEncryptor(Duration);

impl Encryptor for SlowEncryptor {
    fn algorithm(&self) -> &'static str {
        "slow"
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        std::thread::sleep(self.0);
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(ciphertext.to_vec())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_auto_save_skips_ticks_while_a_save_is_running() {
    let tmp = tempfile::tempdir().unwrap();
    let saves = SaveManager::builder()
        .save_path(tmp.path())
        .encryptor(SlowEncryptor(Duration::from_millis(150)))
        .connect()
        .await
        .unwrap();
    let mut events = saves.subscribe();

    let options = AutoSaveOptions::every(Duration::from_millis(20)).unwrap();
    let handle = saves.auto_save(1, sample(&saves), options, |_| {});

    let skipped = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(SaveEvent { slot: 1, kind: SaveEventKind::Skipped }) => break,
                Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {},
                Err(err) => panic!("event channel closed: {err}"),
            }
        }
    })
    .await;
    assert!(skipped.is_ok(), "a tick during a running save must be skipped");

    let archive = handle.stop().await.unwrap();
    assert_eq!(archive.len(), 2);
    assert!(saves.get_meta(1).await.is_some());
}

#[tokio::test]
async fn test_auto_save_stopped_before_first_tick() {
    let tmp = tempfile::tempdir().unwrap();
    let saves = manager(tmp.path()).await;

    let options = AutoSaveOptions::every(Duration::from_secs(60)).unwrap();
    let handle = saves.auto_save(0, sample(&saves), options, |_| {});
    let archive = handle.stop().await.unwrap();

    assert_eq!(archive.len(), 2);
    assert!(!saves.exists(0).await);
}

#[tokio::test]
async fn test_auto_save_options_validation() {
    assert!(matches!(
        AutoSaveOptions::every(Duration::ZERO),
        Err(SaveError::InvalidConfiguration { .. })
    ));
    let from_config = AutoSaveOptions::from_config(&SaveConfig::default());
    assert_eq!(from_config.interval(), Duration::from_secs(300));
}
