//! Integration tests for the pan-tilt controller register protocol
//!
//! Runs the Focuser against the mock register bus; no hardware required.

use fisheye_ptz::adapters::{BusCall, MockRegisterBus};
use fisheye_ptz::hardware::{ActuatorOption, Focuser, BUSY_REG_ADDR};
use fisheye_ptz::polling::{PollOutcome, PollPolicy};
use std::time::Duration;
use tokio::time::Instant;
use tracing_test::traced_test;

#[tokio::test]
async fn test_set_get_round_trip_every_option() {
    let bus = MockRegisterBus::new();
    let mut focuser = Focuser::new(bus);

    for opt in ActuatorOption::ALL {
        let spec = opt.spec();
        focuser.set(opt, i32::from(spec.max_value)).await.unwrap();
        assert_eq!(focuser.get(opt).await.unwrap(), spec.max_value, "{:?}", opt);
    }
}

#[tokio::test]
async fn test_out_of_range_is_clamped_not_rejected() {
    let bus = MockRegisterBus::new();
    let mut focuser = Focuser::new(bus.clone());

    focuser.set(ActuatorOption::Zoom, 99999).await.unwrap();
    assert_eq!(focuser.get(ActuatorOption::Zoom).await.unwrap(), 20000);

    focuser.set(ActuatorOption::MotorY, 500).await.unwrap();
    assert_eq!(focuser.get(ActuatorOption::MotorY).await.unwrap(), 180);

    focuser.set(ActuatorOption::Focus, -1).await.unwrap();
    assert_eq!(bus.value(0x01), Some(0));
}

#[tokio::test]
async fn test_reset_motor_is_noop() {
    let bus = MockRegisterBus::new();
    let mut focuser = Focuser::new(bus.clone());
    focuser.set(ActuatorOption::MotorX, 120).await.unwrap();
    bus.clear_log();

    focuser.reset(ActuatorOption::MotorX).await.unwrap();
    focuser.reset(ActuatorOption::MotorY).await.unwrap();
    focuser.reset(ActuatorOption::IrCut).await.unwrap();
    focuser.reset(ActuatorOption::Mode).await.unwrap();

    assert!(bus.calls().is_empty());
    assert_eq!(focuser.get(ActuatorOption::MotorX).await.unwrap(), 120);
}

#[tokio::test]
async fn test_reset_focus_writes_reset_register_then_minimum() {
    let bus = MockRegisterBus::new();
    let mut focuser = Focuser::new(bus.clone());
    focuser.set(ActuatorOption::Focus, 15000).await.unwrap();
    bus.clear_log();

    focuser.reset(ActuatorOption::Focus).await.unwrap();
    assert_eq!(bus.writes(), vec![(0x0B, 0), (0x01, 0)]);
    assert_eq!(focuser.get(ActuatorOption::Focus).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_waits_while_motor_moves() {
    let bus = MockRegisterBus::new();
    let mut focuser = Focuser::new(bus.clone());

    bus.busy_for(25);
    let start = Instant::now();
    let outcome = focuser.wait_until_free().await.unwrap();

    assert_eq!(outcome, PollOutcome::Ready { attempts: 25 });
    assert!(start.elapsed() >= Duration::from_millis(250));
    let status_reads = bus
        .calls()
        .into_iter()
        .filter(|c| *c == BusCall::Read { register: BUSY_REG_ADDR })
        .count();
    assert_eq!(status_reads, 26);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_stuck_busy_times_out_and_write_still_happens() {
    let bus = MockRegisterBus::new();
    bus.set_always_busy(true);
    let mut focuser = Focuser::new(bus.clone());

    let start = Instant::now();
    let outcome = focuser.wait_until_free().await.unwrap();
    let waited = start.elapsed();
    assert_eq!(outcome, PollOutcome::TimedOut { attempts: 500 });
    assert!(waited >= Duration::from_secs(5) && waited < Duration::from_secs(6));
    assert!(logs_contain("still busy"));

    focuser
        .set_with(ActuatorOption::MotorX, 42, false)
        .await
        .unwrap();
    assert_eq!(bus.value(0x05), Some(42));
}

#[tokio::test(start_paused = true)]
async fn test_custom_poll_policy() {
    let bus = MockRegisterBus::new();
    bus.set_always_busy(true);
    let policy = PollPolicy::new(Duration::from_millis(100), Duration::from_millis(20));
    let mut focuser = Focuser::with_poll_policy(bus, policy);

    let outcome = focuser.wait_until_free().await.unwrap();
    assert_eq!(outcome, PollOutcome::TimedOut { attempts: 5 });
}

#[tokio::test]
async fn test_status_read_failure_surfaces_from_get() {
    let bus = MockRegisterBus::new();
    bus.fail_register(BUSY_REG_ADDR);
    let mut focuser = Focuser::new(bus);

    assert!(focuser.get(ActuatorOption::MotorX).await.is_err());
}
