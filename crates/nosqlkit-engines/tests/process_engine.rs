//! Process engines driven by `/bin/sh` stand-in servers.
#![cfg(unix)]

mod common;

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use nosqlkit_config::ReadinessSettings;
use nosqlkit_engines::{ProcessEngine, ServerCommand, ServerInstance};
use nosqlkit_lifecycle::{LaunchError, LifecycleError, StartOutcome, StopOutcome, TargetPath};
use rstest::{fixture, rstest};

use common::{Fixture, READY_MARKER, closed_port, console_ready, process_exists, shell};

#[fixture]
fn sandbox() -> Fixture {
    Fixture::new()
}

fn serving_script() -> String {
    format!("echo booting; echo '{READY_MARKER}'; exec sleep 30")
}

#[rstest]
fn console_marker_server_starts_and_stops(sandbox: Fixture) {
    let config = sandbox.config("mongo-temp", 27100, console_ready());
    let manager = sandbox.manager(config, shell(&serving_script()));

    assert_eq!(manager.start_engine().expect("start"), StartOutcome::Started);
    let instance = manager.instance().expect("published instance");
    assert_eq!(instance.connection_uri(), "mongodb://127.0.0.1:27100");
    assert!(process_exists(instance.pid()));
    assert!(manager.target_path().as_std_path().is_dir());

    let pid = instance.pid();
    drop(instance);
    assert_eq!(manager.stop_engine(), StopOutcome::Stopped);
    assert!(!process_exists(pid));
    assert!(manager.instance().is_none());
    assert!(!manager.target_path().as_std_path().exists());
}

#[rstest]
fn generated_files_are_written_before_launch(sandbox: Fixture) {
    let config = sandbox.config("conf-temp", 27101, console_ready());
    let command = shell(&format!(
        "grep -q 'port=27101' server.conf || exit 3; echo '{READY_MARKER}'; exec sleep 30"
    ))
    .file("server.conf", "port=27101\n");
    let manager = sandbox.manager(config, command);

    assert_eq!(manager.start_engine().expect("start"), StartOutcome::Started);
    assert!(manager.target_path().as_std_path().join("server.conf").is_file());
    assert_eq!(manager.stop_engine(), StopOutcome::Stopped);
}

#[rstest]
fn early_exit_fails_with_the_console_output(sandbox: Fixture) {
    let config = sandbox.config("crash-temp", 27102, console_ready());
    let manager = sandbox.manager(config, shell("echo 'fatal: address already in use'; exit 1"));

    let error = manager.start_engine().expect_err("server crashes");
    let LifecycleError::NotReady { diagnostic, .. } = &error else {
        panic!("expected a readiness failure");
    };
    assert!(diagnostic.contains("fatal: address already in use"));
    assert!(!manager.is_running());
    assert!(sandbox.instances.get_any().is_err());
    assert!(!manager.target_path().as_std_path().exists());
}

#[rstest]
fn exhausted_probe_names_the_endpoint(sandbox: Fixture) {
    let port = closed_port();
    let readiness = ReadinessSettings::probe(3, Duration::from_millis(50));
    let config = sandbox.config("probe-temp", port, readiness);
    let manager = sandbox.manager(config, shell("exec sleep 30"));

    let error = manager.start_engine().expect_err("nothing listens");
    assert!(matches!(error, LifecycleError::NotReady { .. }));
    assert!(error.to_string().contains(&format!("127.0.0.1:{port}")));
    assert!(!manager.is_running());
    assert_eq!(manager.ref_count(), 0);
    assert!(manager.instance().is_none());
}

#[rstest]
fn probe_succeeds_against_a_listening_port(sandbox: Fixture) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let readiness = ReadinessSettings::probe(3, Duration::from_millis(50));
    let config = sandbox.config("listening-temp", port, readiness);
    let manager = sandbox.manager(config, shell("exec sleep 30"));

    assert_eq!(manager.start_engine().expect("start"), StartOutcome::Started);
    assert_eq!(manager.stop_engine(), StopOutcome::Stopped);
    drop(listener);
}

#[rstest]
fn missing_binary_is_a_launch_failure(sandbox: Fixture) {
    let config = sandbox.config("missing-temp", 27103, console_ready());
    let manager = sandbox.manager(config, ServerCommand::new("/nonexistent/bin/mongod"));

    let error = manager.start_engine().expect_err("binary missing");
    let LifecycleError::Launch { port, source, .. } = &error else {
        panic!("expected a launch failure");
    };
    assert_eq!(*port, 27103);
    assert!(matches!(source, LaunchError::ProgramNotFound { .. }));
    assert!(!manager.is_running());
}

#[rstest]
fn managers_for_the_same_endpoint_share_one_server(sandbox: Fixture) {
    let first = sandbox.manager(
        sandbox.config("shared-temp", 27104, console_ready()),
        shell(&serving_script()),
    );
    let second = sandbox.manager(
        sandbox.config("shared-temp", 27104, console_ready()),
        shell(&serving_script()),
    );

    assert_eq!(first.start_engine().expect("start"), StartOutcome::Started);
    assert_eq!(
        second.start_engine().expect("join"),
        StartOutcome::Shared { ref_count: 2 }
    );
    let from_first = first.instance().expect("instance");
    let from_second = second.instance().expect("instance");
    assert!(Arc::ptr_eq(&from_first, &from_second));
    let pid = from_first.pid();
    drop((from_first, from_second));

    assert_eq!(second.stop_engine(), StopOutcome::Released { remaining: 1 });
    assert!(process_exists(pid));
    assert_eq!(first.stop_engine(), StopOutcome::Stopped);
    assert!(!process_exists(pid));
}

#[rstest]
fn default_manager_publishes_into_the_global_registry(sandbox: Fixture) {
    let config = sandbox.config("global-temp", 27105, console_ready());
    let target = TargetPath::from(config.target_path());
    let identity = nosqlkit_lifecycle::EngineIdentity::from_config(&config);
    let manager = nosqlkit_lifecycle::ResourceLifecycleManager::new(
        identity,
        ProcessEngine::with_command(config, shell(&serving_script())),
    );

    manager.start_engine().expect("start");
    let running = ServerInstance::running_at(&target).expect("published globally");
    assert_eq!(running.key().port(), 27105);
    assert!(ServerInstance::any_running().is_ok());
    drop(running);

    assert_eq!(manager.stop_engine(), StopOutcome::Stopped);
    assert!(ServerInstance::running_at(&target).is_none());
}

#[rstest]
fn default_preset_without_an_installation_fails_to_launch(sandbox: Fixture) {
    let config = sandbox.config("preset-temp", 27106, console_ready());
    let manager = ProcessEngine::manager(config);

    let error = manager.start_engine().expect_err("no mongod under the engine path");
    assert!(matches!(
        error,
        LifecycleError::Launch {
            source: LaunchError::ProgramNotFound { .. },
            ..
        }
    ));
    assert!(!manager.is_running());
    assert!(ServerInstance::running_at(manager.target_path()).is_none());
}
