//! Full-pipeline tests: scripted samplers driven through the poll loop
//! and kill coordinator via the public API.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use tamper_kill_switch::core::config::Config;
use tamper_kill_switch::daemon::signals::SignalHandler;
use tamper_kill_switch::daemon::watch::{InspectOutcome, PollLoop, stop_channel};
use tamper_kill_switch::kill::notify::{MockSink, NotifyError};
use tamper_kill_switch::kill::{KillCoordinator, KillState, MockPower};
use tamper_kill_switch::sampler::{MockSampler, Sample, SignalKind};
use tamper_kill_switch::verdict::{self, Verdict};

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.global.poll_interval_secs = 1;
    config.global.fallback_log = dir.path().join("kill-fallback.log");
    config
}

/// Every signal in its expected state.
fn clean_sampler() -> MockSampler {
    MockSampler::new()
        .with_sample(Sample::Bluetooth { devices: vec![] })
        .with_sample(Sample::Usb { ids: vec![] })
        .with_sample(Sample::Ac { online: true })
        .with_sample(Sample::Battery { present: true })
        .with_sample(Sample::Tray { status: 1 })
        .with_sample(Sample::Ethernet {
            interface: "eth0".to_string(),
            carrier: false,
        })
}

#[test]
fn clean_cycles_exit_when_stop_channel_drops() {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);

    let sink = MockSink::succeeding();
    let power = MockPower::new();
    let mut coordinator = KillCoordinator::new(&sink, &power, &config.global);

    let (stop_tx, stop_rx) = stop_channel();
    let poll = PollLoop::new(config, Arc::new(clean_sampler()), stop_rx);
    drop(stop_tx);

    let signals = SignalHandler::unregistered();
    poll.run(&signals, &mut coordinator).expect("run poll loop");

    assert_eq!(coordinator.state(), KillState::Armed);
    assert_eq!(power.call_count(), 0);
    assert!(sink.sent().is_empty());
}

#[test]
fn violation_notifies_then_powers_off() {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);

    let sink = MockSink::succeeding();
    let power = MockPower::new();
    let mut coordinator = KillCoordinator::new(&sink, &power, &config.global);

    let sampler = clean_sampler().with_sample(Sample::Ac { online: false });
    let (_stop_tx, stop_rx) = stop_channel();
    let poll = PollLoop::new(config.clone(), Arc::new(sampler), stop_rx);

    let signals = SignalHandler::unregistered();
    poll.run(&signals, &mut coordinator).expect("run poll loop");

    assert_eq!(coordinator.state(), KillState::Terminating);
    assert_eq!(power.call_count(), 1);

    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.contains(verdict::AC));
    // Alert delivered, so no local fallback record.
    assert!(!config.global.fallback_log.exists());
}

#[test]
fn undeliverable_alert_leaves_fallback_record() {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);

    let sink = MockSink::failing(NotifyError::Connectivity {
        details: "no route to host".to_string(),
    });
    let power = MockPower::new();
    let mut coordinator = KillCoordinator::new(&sink, &power, &config.global);

    let sampler = clean_sampler().with_sample(Sample::Ethernet {
        interface: "eth0".to_string(),
        carrier: true,
    });
    let (_stop_tx, stop_rx) = stop_channel();
    let poll = PollLoop::new(config.clone(), Arc::new(sampler), stop_rx);

    let signals = SignalHandler::unregistered();
    poll.run(&signals, &mut coordinator).expect("run poll loop");

    assert_eq!(power.call_count(), 1);

    let record = fs::read_to_string(&config.global.fallback_log).expect("fallback log written");
    let lines: Vec<&str> = record.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(verdict::ETHERNET));
    assert!(lines[0].contains("alert undeliverable"));
}

#[test]
fn shutdown_request_stops_before_sampling() {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);

    let sink = MockSink::succeeding();
    let power = MockPower::new();
    let mut coordinator = KillCoordinator::new(&sink, &power, &config.global);

    // Even a violating sampler must not kill once shutdown is requested.
    let sampler = clean_sampler().with_sample(Sample::Ac { online: false });
    let (_stop_tx, stop_rx) = stop_channel();
    let poll = PollLoop::new(config, Arc::new(sampler), stop_rx);

    let signals = SignalHandler::unregistered();
    signals.request_shutdown();
    poll.run(&signals, &mut coordinator).expect("run poll loop");

    assert_eq!(coordinator.state(), KillState::Armed);
    assert_eq!(power.call_count(), 0);
}

#[test]
fn shutdown_during_sleep_exits_promptly() {
    let dir = TempDir::new().expect("temp dir");
    let mut config = test_config(&dir);
    // Long interval so a full sleep would be unmistakable in the timing.
    config.global.poll_interval_secs = 5;

    let sink = MockSink::succeeding();
    let power = MockPower::new();
    let mut coordinator = KillCoordinator::new(&sink, &power, &config.global);

    let (stop_tx, stop_rx) = stop_channel();
    let poll = PollLoop::new(config, Arc::new(clean_sampler()), stop_rx);

    let signals = SignalHandler::unregistered().with_stop_sender(stop_tx);
    let requester = signals.clone();
    let thread = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(100));
        requester.request_shutdown();
    });

    let started = std::time::Instant::now();
    poll.run(&signals, &mut coordinator).expect("run poll loop");
    let elapsed = started.elapsed();
    thread.join().expect("requester thread");

    assert!(
        elapsed < std::time::Duration::from_secs(2),
        "shutdown request must interrupt the sleep, took {elapsed:?}"
    );
    assert_eq!(coordinator.state(), KillState::Armed);
    assert_eq!(power.call_count(), 0);
}

#[test]
fn missing_mandatory_signal_is_fatal() {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);

    let sink = MockSink::succeeding();
    let power = MockPower::new();
    let mut coordinator = KillCoordinator::new(&sink, &power, &config.global);

    // USB unscripted: the mock reports it unavailable.
    let sampler = MockSampler::new()
        .with_sample(Sample::Bluetooth { devices: vec![] })
        .with_sample(Sample::Ac { online: true })
        .with_sample(Sample::Battery { present: true })
        .with_sample(Sample::Tray { status: 1 })
        .with_sample(Sample::Ethernet {
            interface: "eth0".to_string(),
            carrier: false,
        });
    let (_stop_tx, stop_rx) = stop_channel();
    let poll = PollLoop::new(config, Arc::new(sampler), stop_rx);

    let signals = SignalHandler::unregistered();
    poll.run(&signals, &mut coordinator).expect("run poll loop");

    assert_eq!(coordinator.state(), KillState::Terminating);
    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].0.contains(verdict::SAMPLER_UNAVAILABLE));
}

#[test]
fn missing_optional_hardware_is_tolerated() {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);

    let sink = MockSink::succeeding();
    let power = MockPower::new();
    let mut coordinator = KillCoordinator::new(&sink, &power, &config.global);

    // Battery and tray unscripted: desktops without either stay clean.
    let sampler = MockSampler::new()
        .with_sample(Sample::Bluetooth { devices: vec![] })
        .with_sample(Sample::Usb { ids: vec![] })
        .with_sample(Sample::Ac { online: true })
        .with_sample(Sample::Ethernet {
            interface: "eth0".to_string(),
            carrier: false,
        });
    let (stop_tx, stop_rx) = stop_channel();
    let poll = PollLoop::new(config, Arc::new(sampler), stop_rx);
    drop(stop_tx);

    let signals = SignalHandler::unregistered();
    poll.run(&signals, &mut coordinator).expect("run poll loop");

    assert_eq!(coordinator.state(), KillState::Armed);
    assert_eq!(power.call_count(), 0);
}

#[test]
fn inspect_reports_all_signals_without_killing() {
    let dir = TempDir::new().expect("temp dir");
    let config = test_config(&dir);

    let sampler = clean_sampler()
        .with_sample(Sample::Ac { online: false })
        .with_sample(Sample::Tray { status: 2 });
    let (_stop_tx, stop_rx) = stop_channel();
    let poll = PollLoop::new(config, Arc::new(sampler), stop_rx);

    let reports = poll.inspect();
    assert_eq!(reports.len(), SignalKind::ALL.len());

    let violations: Vec<_> = reports
        .iter()
        .filter_map(|r| match &r.outcome {
            InspectOutcome::Evaluated {
                verdict: Verdict::Violation(v),
                ..
            } => Some(v),
            _ => None,
        })
        .collect();
    assert_eq!(violations.len(), 2);
    assert_eq!(violations[0].reason, verdict::AC);
    assert_eq!(violations[1].reason, verdict::CD_TRAY);
}
