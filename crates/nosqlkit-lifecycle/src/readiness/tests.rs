//! Unit tests for readiness strategies.

use std::io;
use std::net::TcpListener;
use std::time::{Duration, Instant};

use mockall::mock;
use nosqlkit_config::ReadinessSettings;
use rstest::rstest;

use super::*;
use crate::key::ConnectionKey;

mock! {
    Endpoint {}
    impl Probe for Endpoint {
        fn probe(&self, key: &ConnectionKey) -> io::Result<()>;
    }
}

fn refused() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused")
}

fn target(key: &ConnectionKey) -> ReadinessTarget<'_> {
    ReadinessTarget {
        engine: "redis",
        key,
        process: None,
    }
}

fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local address").port()
}

#[rstest]
fn tcp_probe_connects_to_a_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local address").port();
    let key = ConnectionKey::new("127.0.0.1", port);

    TcpProbe::default().probe(&key).expect("listener accepts");
}

#[rstest]
fn tcp_probe_fails_on_a_closed_port() {
    let key = ConnectionKey::new("127.0.0.1", unused_port());
    assert!(TcpProbe::new(Duration::from_millis(500)).probe(&key).is_err());
}

#[rstest]
fn backoff_gives_up_after_the_configured_attempts() {
    let mut probe = MockEndpoint::new();
    probe.expect_probe().times(3).returning(|_| Err(refused()));
    let strategy = ProbeWithBackoff::new(probe, 3, Duration::from_millis(1));
    let key = ConnectionKey::new("localhost", 6379);

    assert!(!strategy.await_ready(&target(&key)));
}

#[rstest]
fn backoff_stops_at_the_first_success() {
    let mut probe = MockEndpoint::new();
    let mut calls = 0_u32;
    probe.expect_probe().times(2).returning(move |_| {
        calls += 1;
        if calls < 2 { Err(refused()) } else { Ok(()) }
    });
    let strategy = ProbeWithBackoff::new(probe, 5, Duration::from_millis(1));
    let key = ConnectionKey::new("localhost", 6379);

    assert!(strategy.await_ready(&target(&key)));
}

#[rstest]
fn exhausted_probe_reports_not_ready_without_output() {
    let mut probe = MockEndpoint::new();
    probe.expect_probe().times(3).returning(|_| Err(refused()));
    let strategy = ProbeWithBackoff::new(probe, 3, Duration::from_millis(1));
    let key = ConnectionKey::new("localhost", 6379);

    let error = ensure_ready(&strategy, &target(&key)).expect_err("not ready");
    let LifecycleError::NotReady {
        engine,
        host,
        port,
        diagnostic,
    } = error
    else {
        panic!("expected NotReady");
    };
    assert_eq!(engine, "redis");
    assert_eq!(host, "localhost");
    assert_eq!(port, 6379);
    assert_eq!(diagnostic, NO_OUTPUT);
}

#[rstest]
fn console_marker_without_a_process_is_not_ready() {
    let key = ConnectionKey::new("localhost", 27017);
    let strategy = ConsoleMarker::new("Waiting for connections", 0, Duration::from_secs(1));
    assert!(!strategy.await_ready(&target(&key)));
}

#[rstest]
fn settings_select_the_matching_strategy() {
    let key = ConnectionKey::new("127.0.0.1", unused_port());
    let strategy = strategy_for(&ReadinessSettings::probe(1, Duration::from_millis(1)));
    assert!(!strategy.await_ready(&target(&key)));

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let open = ConnectionKey::new("127.0.0.1", listener.local_addr().expect("address").port());
    assert!(strategy.await_ready(&target(&open)));
}

#[cfg(unix)]
mod console {
    use super::*;
    use crate::process::{Launch, LaunchSpec, ManagedProcess, ProcessLauncher};

    fn shell(script: &str) -> ManagedProcess {
        ProcessLauncher
            .launch(&LaunchSpec::new("/bin/sh").arg("-c").arg(script))
            .expect("launch stand-in server")
    }

    fn with_process<'a>(key: &'a ConnectionKey, process: &'a ManagedProcess) -> ReadinessTarget<'a> {
        ReadinessTarget {
            engine: "mongodb",
            key,
            process: Some(process),
        }
    }

    #[rstest]
    fn marker_in_output_means_ready() {
        let process = shell("echo booting; echo 'Waiting for connections on 27017'; exec sleep 30");
        let key = ConnectionKey::new("localhost", 27017);
        let strategy = ConsoleMarker::new("Waiting for connections", 0, Duration::from_secs(5));

        assert!(strategy.await_ready(&with_process(&key, &process)));
    }

    #[rstest]
    fn lines_before_the_minimum_are_ignored() {
        let process = shell("echo Started.; exec sleep 30");
        let key = ConnectionKey::new("localhost", 7474);
        let strategy = ConsoleMarker::new("Started.", 1, Duration::from_millis(300));

        assert!(!strategy.await_ready(&with_process(&key, &process)));
    }

    #[rstest]
    fn marker_after_the_minimum_is_found() {
        let process = shell("echo Started.; echo Started.; exec sleep 30");
        let key = ConnectionKey::new("localhost", 7474);
        let strategy = ConsoleMarker::new("Started.", 1, Duration::from_secs(5));

        assert!(strategy.await_ready(&with_process(&key, &process)));
    }

    #[rstest]
    fn early_exit_fails_fast_with_the_last_output() {
        let process = shell("echo 'fatal: address already in use'; exit 1");
        let key = ConnectionKey::new("localhost", 27017);
        let strategy = ConsoleMarker::new("Waiting for connections", 0, Duration::from_secs(30));
        let started = Instant::now();

        let error = ensure_ready(&strategy, &with_process(&key, &process)).expect_err("crashed");
        assert!(started.elapsed() < Duration::from_secs(10));
        let LifecycleError::NotReady { diagnostic, .. } = error else {
            panic!("expected NotReady");
        };
        assert!(diagnostic.contains("address already in use"), "{diagnostic}");
    }

    #[rstest]
    fn silent_server_times_out() {
        let process = shell("exec sleep 30");
        let key = ConnectionKey::new("localhost", 8000);
        let strategy = ConsoleMarker::new("Initializing DynamoDB Local", 0, Duration::from_millis(200))
            .with_poll(Duration::from_millis(20));

        assert!(!strategy.await_ready(&with_process(&key, &process)));
    }

    #[rstest]
    fn unbounded_timeout_still_finds_the_marker() {
        let process = shell("echo 'Waiting for connections'; exec sleep 30");
        let key = ConnectionKey::new("localhost", 27017);
        let strategy = ConsoleMarker::new("Waiting for connections", 0, Duration::MAX);

        assert!(strategy.await_ready(&with_process(&key, &process)));
    }

    #[rstest]
    fn closed_stdout_on_a_live_server_waits_for_the_timeout() {
        let process = shell("exec >&-; exec sleep 30");
        let key = ConnectionKey::new("localhost", 7474);
        let strategy = ConsoleMarker::new("Started.", 0, Duration::from_millis(300))
            .with_poll(Duration::from_millis(20));
        let started = Instant::now();

        assert!(!strategy.await_ready(&with_process(&key, &process)));
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(process.is_running());
    }
}
