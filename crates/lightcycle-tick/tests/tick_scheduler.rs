//! Integration tests for the ramping tick scheduler.
//!
//! Uses `start_paused = true` so time only moves when every task is idle;
//! `sleep_until` then resolves exactly at its deadline.

use std::time::Duration;

use lightcycle_tick::{TickConfig, TickPolicy, TickRamp, TickScheduler};

// =========================================================================
// Helpers
// =========================================================================

fn config_20hz() -> TickConfig {
    TickConfig::with_rate(20)
}

fn ramping(base: u32, interval_secs: u64, max: u32) -> TickConfig {
    TickConfig {
        tick_rate_hz: base,
        ramp: Some(TickRamp {
            interval: Duration::from_secs(interval_secs),
            max_rate_hz: max,
        }),
        ..TickConfig::default()
    }
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_ramps_from_one_hz() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 1);
    assert_eq!(
        cfg.ramp,
        Some(TickRamp {
            interval: Duration::from_secs(20),
            max_rate_hz: 128,
        })
    );
    assert_eq!(cfg.policy, TickPolicy::Skip);
}

#[test]
fn test_tick_duration_from_rate() {
    assert_eq!(TickConfig::tick_duration(20), Duration::from_millis(50));
    assert_eq!(TickConfig::tick_duration(1), Duration::from_secs(1));
    assert_eq!(TickConfig::tick_duration(60), Duration::from_secs_f64(1.0 / 60.0));
}

#[test]
fn test_rate_at_steps_every_interval() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.rate_at(Duration::ZERO), 1);
    assert_eq!(cfg.rate_at(Duration::from_secs(19)), 1);
    assert_eq!(cfg.rate_at(Duration::from_secs(20)), 2);
    assert_eq!(cfg.rate_at(Duration::from_secs(65)), 4);
}

#[test]
fn test_rate_at_caps_at_max() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.rate_at(Duration::from_secs(60 * 60 * 24)), 128);
    let cfg = ramping(2, 1, 5);
    assert_eq!(cfg.rate_at(Duration::from_secs(100)), 5);
}

#[test]
fn test_fixed_rate_never_ramps() {
    let cfg = config_20hz();
    assert_eq!(cfg.rate_at(Duration::from_secs(10_000)), 20);
}

#[test]
fn test_validated_clamps_rates() {
    let cfg = TickConfig::with_rate(0).validated();
    assert_eq!(cfg.tick_rate_hz, 1);

    let cfg = TickConfig::with_rate(500).validated();
    assert_eq!(cfg.tick_rate_hz, TickConfig::MAX_TICK_RATE_HZ);

    let cfg = ramping(10, 1, 4).validated();
    assert_eq!(cfg.ramp.unwrap().max_rate_hz, 10);

    let cfg = ramping(1, 0, 4).validated();
    assert_eq!(cfg.ramp, None);
}

#[test]
fn test_validated_orders_thresholds() {
    let cfg = TickConfig {
        budget_warn_threshold: 1.5,
        budget_critical_threshold: 0.5,
        ..TickConfig::default()
    }
    .validated();
    assert_eq!(cfg.budget_critical_threshold, 0.5);
    assert_eq!(cfg.budget_warn_threshold, 0.5);
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_fires_and_increments() {
    let mut s = TickScheduler::new(config_20hz());

    let info = s.wait_for_tick().await;
    assert_eq!(info.tick, 1);
    assert_eq!(info.rate_hz, 20);
    assert_eq!(info.dt, Duration::from_millis(50));
    assert!(!info.overrun);
    assert_eq!(info.ticks_skipped, 0);
    assert_eq!(s.tick_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_waits_one_tick_length() {
    let start = tokio::time::Instant::now();
    let mut s = TickScheduler::new(TickConfig::with_rate(1));

    s.wait_for_tick().await;
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_multiple_ticks_increment_monotonically() {
    let mut s = TickScheduler::new(config_20hz());

    for expected in 1..=5 {
        let info = s.wait_for_tick().await;
        assert_eq!(info.tick, expected);
    }
    assert_eq!(s.tick_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_ramp_speeds_up_over_time() {
    // 1 Hz, +1 Hz every 2 s, up to 3 Hz.
    // Ticks land at t = 1, 2, 2.5, 3, 3.5, 4, 4.33…
    let mut s = TickScheduler::new(ramping(1, 2, 3));

    let mut rates = Vec::new();
    for _ in 0..8 {
        rates.push(s.wait_for_tick().await.rate_hz);
    }
    assert_eq!(rates, vec![1, 1, 2, 2, 2, 2, 3, 3]);
    assert_eq!(s.tick_rate_hz(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_jitter_delays_only_first_tick() {
    let start = tokio::time::Instant::now();
    let mut s = TickScheduler::new(TickConfig {
        initial_jitter_us: 1_000,
        ..config_20hz()
    });

    s.wait_for_tick().await;
    let first = start.elapsed();
    assert!(first >= Duration::from_millis(50));
    assert!(first < Duration::from_millis(51));

    s.wait_for_tick().await;
    assert_eq!(start.elapsed() - first, Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_keeps_schedule() {
    let mut s = TickScheduler::new(TickConfig::with_rate(1));
    let due = s.next_tick_at();

    let timed_out = tokio::time::timeout(Duration::from_millis(500), s.wait_for_tick()).await;
    assert!(timed_out.is_err());
    assert_eq!(s.next_tick_at(), due);
    assert_eq!(s.tick_count(), 0);

    s.wait_for_tick().await;
    assert_eq!(s.tick_count(), 1);
}

// =========================================================================
// Overrun policies
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_reschedules_from_now() {
    let mut s = TickScheduler::new(config_20hz());
    s.wait_for_tick().await;

    // Stall for 3.5 ticks without polling the scheduler.
    tokio::time::advance(Duration::from_millis(225)).await;
    let info = s.wait_for_tick().await;

    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 3);
    assert_eq!(s.metrics().total_overruns, 1);
    assert_eq!(s.metrics().total_skipped, 3);
    assert_eq!(
        s.next_tick_at(),
        tokio::time::Instant::now() + Duration::from_millis(50)
    );
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_original_cadence() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::Drop,
        ..config_20hz()
    });
    s.wait_for_tick().await;
    let due = s.next_tick_at();

    tokio::time::advance(Duration::from_millis(120)).await;
    let info = s.wait_for_tick().await;

    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 0);
    assert_eq!(s.next_tick_at(), due + Duration::from_millis(50));
}

// =========================================================================
// Metrics
// =========================================================================

#[test]
fn test_initial_metrics_are_zero() {
    let s = TickScheduler::new(config_20hz());
    let m = s.metrics();
    assert_eq!(m.total_ticks, 0);
    assert_eq!(m.total_overruns, 0);
    assert_eq!(m.total_skipped, 0);
    assert_eq!(m.avg_tick_time, Duration::ZERO);
    assert_eq!(m.max_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_total_ticks_increments() {
    let mut s = TickScheduler::new(config_20hz());

    for _ in 0..3 {
        s.wait_for_tick().await;
        s.record_tick_end();
    }

    assert_eq!(s.metrics().total_ticks, 3);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_wait_is_noop() {
    let mut s = TickScheduler::new(config_20hz());
    s.record_tick_end();
    assert_eq!(s.metrics().total_ticks, 0);
    assert_eq!(s.metrics().budget_utilization, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_max_tick_time_tracked() {
    let mut s = TickScheduler::new(config_20hz());

    // record_tick_end measures wall-clock time, which paused tokio time
    // does not control.
    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(50));
    s.record_tick_end();

    assert!(s.metrics().max_tick_time > Duration::ZERO);
    let util = s.metrics().budget_utilization;
    assert!(util > 0.0 && util < 1.0, "utilization {util} should be under budget");
}

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_skips_avg_update() {
    let mut s = TickScheduler::new(TickConfig {
        metrics_enabled: false,
        ..config_20hz()
    });

    s.wait_for_tick().await;
    std::thread::sleep(Duration::from_micros(50));
    s.record_tick_end();

    assert_eq!(s.metrics().avg_tick_time, Duration::ZERO);
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

// =========================================================================
// Integration: select! loop pattern (mirrors the matchmaker)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut s = TickScheduler::new(config_20hz());
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(10);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(160)).await;
        tx.send("stop").await.ok();
    });

    let mut ticks_fired = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            info = s.wait_for_tick() => {
                ticks_fired += 1;
                s.record_tick_end();
                assert_eq!(info.tick, ticks_fired);
            }
        }
    }

    assert_eq!(ticks_fired, 3);
}
