//! Attempt timers, send failures and budget exhaustion.

use super::{harness, respond, seq_of, Outcomes};
use crate::{CommandState, EngineError, TransmitError};
use bytes::Bytes;
use emcdi_config_and_utils::EngineConfig;
use emcdi_wire::{ChannelType, Status};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn late_response_to_earlier_attempt_is_dropped() {
    let (engine, sink) = harness(EngineConfig::default());
    let outcomes = Outcomes::default();

    engine
        .submit(ChannelType::Control, 1, &b""[..], outcomes.callback())
        .unwrap();
    let first = sink.last_frame().unwrap();

    tokio::time::sleep(engine.config().attempt_timeout() + Duration::from_millis(1)).await;
    let second = sink.last_frame().unwrap();
    assert_eq!(seq_of(&engine, &second), seq_of(&engine, &first) + 1);

    respond(&engine, &first, Status::OK, b"stale");
    assert_eq!(outcomes.len(), 0);

    respond(&engine, &second, Status::OK, b"fresh");
    assert_eq!(outcomes.all(), vec![Ok(Bytes::from_static(b"fresh"))]);
}

#[tokio::test(start_paused = true)]
async fn response_cancels_attempt_timer() {
    let (engine, sink) = harness(EngineConfig::default());
    let outcomes = Outcomes::default();

    engine
        .submit(ChannelType::Logger, 1, &b""[..], outcomes.callback())
        .unwrap();
    respond(&engine, &sink.last_frame().unwrap(), Status::OK, b"");

    tokio::time::sleep(engine.config().hard_timeout() * 2).await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(sink.len(), 1);
    assert_eq!(engine.status(ChannelType::Logger).counters.timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn transient_send_failure_is_retried() {
    let (engine, sink) = harness(EngineConfig::default());
    let outcomes = Outcomes::default();

    sink.fail_next(2, TransmitError::Busy);
    let handle = engine
        .submit(ChannelType::Upgrade, 1, &b"blk"[..], outcomes.callback())
        .unwrap();
    assert_eq!(engine.command_state(ChannelType::Upgrade, handle), Some(CommandState::Retry));

    tokio::time::sleep(engine.config().busy_backoff() * 2 + Duration::from_millis(1)).await;
    assert_eq!(engine.command_state(ChannelType::Upgrade, handle), Some(CommandState::Running));
    assert_eq!(sink.len(), 1);
    // Failed sends never consume a sequence number.
    assert_eq!(seq_of(&engine, &sink.last_frame().unwrap()), 1);

    respond(&engine, &sink.last_frame().unwrap(), Status::OK, b"done");
    assert_eq!(outcomes.all(), vec![Ok(Bytes::from_static(b"done"))]);
}

#[tokio::test(start_paused = true)]
async fn persistent_send_failure_reports_transport_unavailable() {
    let (engine, sink) = harness(EngineConfig {
        retry_budget: 3,
        ..Default::default()
    });
    let x = Outcomes::default();
    let y = Outcomes::default();

    sink.fail_next(3, TransmitError::LinkDown);
    engine.submit(ChannelType::Spawn, 1, &b""[..], x.callback()).unwrap();
    let y_handle = engine.submit(ChannelType::Spawn, 2, &b""[..], y.callback()).unwrap();
    assert_eq!(engine.command_state(ChannelType::Spawn, y_handle), Some(CommandState::Queued));

    tokio::time::sleep(engine.config().busy_backoff() * 3).await;

    assert_eq!(x.all(), vec![Err(EngineError::TransportUnavailable { attempts: 3 })]);
    assert_eq!(engine.command_state(ChannelType::Spawn, y_handle), Some(CommandState::Running));
    assert_eq!(sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failures_of_all_kinds_share_one_budget() {
    let (engine, sink) = harness(EngineConfig {
        retry_budget: 3,
        ..Default::default()
    });
    let outcomes = Outcomes::default();

    sink.fail_next(1, TransmitError::Alloc);
    engine
        .submit(ChannelType::Control, 1, &b""[..], outcomes.callback())
        .unwrap();

    // Attempt 1 failed to send; attempt 2 goes out after the back-off.
    tokio::time::sleep(engine.config().busy_backoff() + Duration::from_millis(1)).await;
    assert_eq!(sink.len(), 1);

    // Attempt 2 answered with queue-full.
    respond(&engine, &sink.last_frame().unwrap(), Status::QUEUE_FULL, b"");
    tokio::time::sleep(engine.config().busy_backoff() + Duration::from_millis(1)).await;
    assert_eq!(sink.len(), 2);

    // Attempt 3 times out and spends the budget.
    tokio::time::sleep(engine.config().attempt_timeout()).await;
    assert_eq!(outcomes.all(), vec![Err(EngineError::Timeout)]);
    assert_eq!(sink.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn budget_of_one_fails_on_first_timeout() {
    let (engine, sink) = harness(EngineConfig {
        retry_budget: 1,
        ..Default::default()
    });
    let outcomes = Outcomes::default();

    engine
        .submit(ChannelType::Counter, 1, &b""[..], outcomes.callback())
        .unwrap();
    tokio::time::sleep(engine.config().attempt_timeout() + Duration::from_millis(1)).await;

    assert_eq!(outcomes.all(), vec![Err(EngineError::Timeout)]);
    assert_eq!(sink.len(), 1);
}
