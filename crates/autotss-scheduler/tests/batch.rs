mod common;

use std::sync::Arc;

use autotss_core::types::UserId;
use autotss_devices::DeviceStore;
use autotss_scheduler::{DeviceRun, SchedulerError};
use common::{iphone8, release, FakeCatalog, Harness, ScriptedTool};
use tokio::sync::Semaphore;

fn ipad() -> autotss_core::types::Device {
    autotss_core::types::Device {
        name: "My iPad".to_string(),
        identifier: "iPad7,5".to_string(),
        board_config: "j71bap".to_string(),
        ecid: "ffeeddccbb".to_string(),
        ..iphone8()
    }
}

#[tokio::test]
async fn batch_processes_enabled_users_and_persists() {
    let h = Harness::new(
        FakeCatalog::with("iPhone10,1", vec![release("14.8", "18H17")]),
        ScriptedTool::default(),
    );
    h.store.put_devices(UserId(1), &[iphone8()]).unwrap();
    let mut other = iphone8();
    other.ecid = "abcdefabcd".to_string();
    h.store.put_devices(UserId(2), &[other]).unwrap();
    h.store.set_enabled(UserId(2), false).unwrap();

    let summary = h.batch().run_batch().await.unwrap();

    assert_eq!(summary.blobs_saved, 1);
    assert_eq!(summary.devices_saved_for, 1);
    assert_eq!(summary.message(), "Saved 1 blob for 1 device.");
    assert_eq!(h.store.get_devices(UserId(1)).unwrap()[0].saved_blobs.len(), 1);
    assert!(h.store.get_devices(UserId(2)).unwrap()[0].saved_blobs.is_empty());

    // Nothing new on the next pass.
    let again = h.batch().run_batch().await.unwrap();
    assert_eq!(again.blobs_saved, 0);
    assert_eq!(again.message(), "No new blobs were saved.");
}

#[tokio::test]
async fn erroring_device_does_not_stop_the_user() {
    // No catalog entry for the iPad: its pass errors, the iPhone still saves.
    let h = Harness::new(
        FakeCatalog::with("iPhone10,1", vec![release("14.8", "18H17")]),
        ScriptedTool::default(),
    );
    h.store.put_devices(UserId(1), &[ipad(), iphone8()]).unwrap();

    let summary = h.batch().run_batch().await.unwrap();

    assert_eq!(summary.devices_checked, 2);
    assert_eq!(summary.blobs_saved, 1);
    let stored = h.store.get_devices(UserId(1)).unwrap();
    assert_eq!(stored[0], ipad());
    assert_eq!(stored[1].saved_blobs.len(), 1);
}

#[tokio::test]
async fn empty_store_needs_nothing() {
    let h = Harness::new(FakeCatalog::default(), ScriptedTool::default());
    let summary = h.batch().run_batch().await.unwrap();
    assert_eq!(summary.message(), "No blobs need to be saved.");
}

#[tokio::test]
async fn save_user_ignores_enabled_flag() {
    let h = Harness::new(
        FakeCatalog::with("iPhone10,1", vec![release("14.8", "18H17")]),
        ScriptedTool::default(),
    );
    h.store.put_devices(UserId(3), &[iphone8(), ipad()]).unwrap();
    h.store.set_enabled(UserId(3), false).unwrap();

    let runs = h.batch().save_user(UserId(3)).await.unwrap();

    assert_eq!(runs.len(), 2);
    assert!(matches!(&runs[0], DeviceRun::Reconciled(o) if o.saved.len() == 1));
    assert!(matches!(&runs[1], DeviceRun::Errored { device, .. } if device == "My iPad"));
    assert_eq!(h.store.get_devices(UserId(3)).unwrap()[0].saved_blobs.len(), 1);
}

#[tokio::test]
async fn concurrent_run_for_same_user_is_refused() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::new(
        FakeCatalog::with("iPhone10,1", vec![release("14.8", "18H17")]),
        ScriptedTool {
            gate: Some(gate.clone()),
            ..Default::default()
        },
    );
    h.store.put_devices(UserId(1), &[iphone8()]).unwrap();
    let batch = Arc::new(h.batch());

    let first = {
        let batch = batch.clone();
        tokio::spawn(async move { batch.save_user(UserId(1)).await })
    };
    while !batch.is_running(UserId(1)) {
        tokio::task::yield_now().await;
    }

    let second = batch.save_user(UserId(1)).await;
    assert!(matches!(
        second,
        Err(SchedulerError::AlreadyRunning { user }) if user == UserId(1)
    ));

    // One permit per default generator.
    gate.add_permits(2);
    assert_eq!(first.await.unwrap().unwrap().len(), 1);
    assert!(!batch.is_running(UserId(1)));
}

#[tokio::test]
async fn device_added_mid_pass_survives_persist() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::new(
        FakeCatalog::with("iPhone10,1", vec![release("14.8", "18H17")]),
        ScriptedTool {
            gate: Some(gate.clone()),
            ..Default::default()
        },
    );
    h.store.put_devices(UserId(1), &[iphone8()]).unwrap();
    let batch = Arc::new(h.batch());

    let pass = {
        let batch = batch.clone();
        tokio::spawn(async move { batch.run_batch().await })
    };
    while h.tool_calls() == 0 {
        tokio::task::yield_now().await;
    }

    // The pass is parked inside the signing tool; the owner adds a device.
    h.store.put_devices(UserId(1), &[iphone8(), ipad()]).unwrap();

    gate.add_permits(2);
    let summary = pass.await.unwrap().unwrap();
    assert_eq!(summary.blobs_saved, 1);

    let stored = h.store.get_devices(UserId(1)).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].saved_blobs.len(), 1);
    assert_eq!(stored[1], ipad());
}

#[tokio::test]
async fn device_removed_mid_pass_stays_removed() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::new(
        FakeCatalog::with("iPhone10,1", vec![release("14.8", "18H17")]),
        ScriptedTool {
            gate: Some(gate.clone()),
            ..Default::default()
        },
    );
    let mut spare = iphone8();
    spare.name = "Spare".to_string();
    spare.ecid = "abcdefabcd".to_string();
    h.store.put_devices(UserId(1), &[iphone8(), spare.clone()]).unwrap();
    let batch = Arc::new(h.batch());

    let pass = {
        let batch = batch.clone();
        tokio::spawn(async move { batch.save_user(UserId(1)).await })
    };
    while h.tool_calls() == 0 {
        tokio::task::yield_now().await;
    }

    // First device removed while its tickets are being fetched.
    h.store.put_devices(UserId(1), &[spare]).unwrap();

    // Two generators for each of the two devices.
    gate.add_permits(4);
    assert_eq!(pass.await.unwrap().unwrap().len(), 2);

    let stored = h.store.get_devices(UserId(1)).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Spare");
    assert_eq!(stored[0].saved_blobs.len(), 1);
}
