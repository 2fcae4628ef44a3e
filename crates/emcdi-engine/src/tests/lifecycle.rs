//! Enable, disable, drain and shutdown.

use super::{harness, Outcomes};
use crate::testing::RecordingSink;
use crate::{Engine, EngineError};
use emcdi_config_and_utils::EngineConfig;
use emcdi_wire::ChannelType;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn submit_on_disabled_channel_is_rejected() {
    let sink = Arc::new(RecordingSink::new());
    let engine = Engine::new(EngineConfig::default(), sink.clone()).unwrap();
    let outcomes = Outcomes::default();

    let result = engine.submit(ChannelType::Control, 1, &b""[..], outcomes.callback());
    assert_eq!(result, Err(EngineError::ChannelDisabled(ChannelType::Control)));
    assert_eq!(outcomes.len(), 0);
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn enable_fails_when_transport_not_ready() {
    let sink = Arc::new(RecordingSink::new());
    sink.set_ready(false);
    let engine = Engine::new(EngineConfig::default(), sink.clone()).unwrap();

    assert_eq!(engine.enable(ChannelType::Logger), Err(EngineError::TransportNotReady));
    sink.set_ready(true);
    assert_eq!(engine.enable(ChannelType::Logger), Ok(()));
    assert_eq!(engine.enable(ChannelType::Logger), Ok(()));
}

#[tokio::test(start_paused = true)]
async fn disable_cancels_all_unfinished_commands() {
    let (engine, _sink) = harness(EngineConfig::default());
    let outcomes = Outcomes::default();

    for opcode in 0..4 {
        engine
            .submit(ChannelType::Control, opcode, &b""[..], outcomes.callback())
            .unwrap();
    }
    engine.disable(ChannelType::Control).await;

    assert_eq!(outcomes.all(), vec![Err(EngineError::Cancelled); 4]);
    let status = engine.status(ChannelType::Control);
    assert!(!status.enabled);
    assert_eq!(status.pending, 0);
    assert_eq!(status.running, None);
    assert_eq!(status.cleanup_pending, 0);

    let late = engine.submit(ChannelType::Control, 9, &b""[..], |_| {});
    assert_eq!(late, Err(EngineError::ChannelDisabled(ChannelType::Control)));
}

#[tokio::test(start_paused = true)]
async fn disable_reaps_already_cancelled_command_silently() {
    let (engine, _sink) = harness(EngineConfig::default());
    let outcomes = Outcomes::default();

    let handle = engine.submit(ChannelType::Spawn, 1, &b""[..], outcomes.callback()).unwrap();
    engine.cancel(ChannelType::Spawn, handle);
    engine.disable(ChannelType::Spawn).await;

    assert_eq!(outcomes.len(), 1);
    assert_eq!(engine.status(ChannelType::Spawn).pending, 0);
}

#[tokio::test(start_paused = true)]
async fn disable_twice_is_a_no_op() {
    let (engine, _sink) = harness(EngineConfig::default());
    engine.disable(ChannelType::Logger).await;
    engine.disable(ChannelType::Logger).await;
    assert!(!engine.is_enabled(ChannelType::Logger));
}

#[tokio::test(start_paused = true)]
async fn channel_can_be_reenabled_after_disable() {
    let (engine, sink) = harness(EngineConfig::default());
    engine.submit(ChannelType::Upgrade, 1, &b""[..], |_| {}).unwrap();
    engine.disable(ChannelType::Upgrade).await;

    engine.enable(ChannelType::Upgrade).unwrap();
    engine.submit(ChannelType::Upgrade, 2, &b""[..], |_| {}).unwrap();

    // Sequence numbers keep counting so stale responses cannot match.
    let status = engine.status(ChannelType::Upgrade);
    assert_eq!(status.last_seq, 2);
    assert_eq!(sink.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn drain_waits_for_running_callbacks() {
    let (engine, _sink) = harness(EngineConfig::default());
    let drained = Arc::new(AtomicBool::new(false));
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

    let handle = engine
        .submit(ChannelType::Counter, 1, &b""[..], move |_| {
            let _ = release_rx.recv();
        })
        .unwrap();

    // Run the callback on another thread; it blocks until released.
    let canceller = engine.clone();
    let callback_thread = std::thread::spawn(move || {
        canceller.cancel(ChannelType::Counter, handle);
    });

    while engine.status(ChannelType::Counter).cleanup_pending == 0 {
        tokio::task::yield_now().await;
    }

    let waiter = {
        let engine = engine.clone();
        let drained = drained.clone();
        tokio::spawn(async move {
            engine.wait_for_idle(ChannelType::Counter).await;
            drained.store(true, Ordering::SeqCst);
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    // Still reported busy: the running command awaits reaping and its
    // callback has not returned.
    assert!(!drained.load(Ordering::SeqCst));

    release_tx.send(()).unwrap();
    callback_thread.join().unwrap();
    tokio::time::sleep(engine.config().attempt_timeout() + Duration::from_millis(1)).await;

    waiter.await.unwrap();
    assert!(drained.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn shutdown_disables_every_channel() {
    let (engine, _sink) = harness(EngineConfig::default());
    let outcomes = Outcomes::default();
    for channel in ChannelType::ALL {
        engine.submit(channel, 1, &b""[..], outcomes.callback()).unwrap();
    }

    engine.shutdown().await;

    assert_eq!(outcomes.len(), ChannelType::COUNT);
    for channel in ChannelType::ALL {
        assert!(!engine.is_enabled(channel));
        assert_eq!(engine.status(channel).pending, 0);
    }
}
