//! Unit tests for the engine configuration builder.

use rstest::rstest;

use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

#[rstest]
#[case(EngineKind::MongoDb, 27017)]
#[case(EngineKind::Redis, 6379)]
#[case(EngineKind::Elasticsearch, 9200)]
#[case(EngineKind::Neo4j, 7474)]
fn defaults_follow_engine(#[case] kind: EngineKind, #[case] port: u16) {
    let config = EngineConfig::builder(kind)
        .engine_path("/opt/engine")
        .build_with_env(no_env)
        .expect("valid config");

    assert_eq!(config.kind(), kind);
    assert_eq!(config.port(), port);
    assert_eq!(config.host(), DEFAULT_HOST);
    assert_eq!(config.target_path(), default_target_path(kind).as_path());
    assert_eq!(config.launch_timeout(), DEFAULT_LAUNCH_TIMEOUT);
    assert_eq!(config.shutdown_grace(), DEFAULT_SHUTDOWN_GRACE);
    assert_eq!(config.readiness(), &ReadinessSettings::for_engine(kind));
    assert!(config.extra_args().is_empty());
}

#[test]
fn explicit_options_override_defaults() {
    let config = EngineConfig::builder(EngineKind::Redis)
        .engine_path("/opt/redis")
        .target_path("build/redis-a")
        .host("localhost")
        .port(16379)
        .arg("--appendonly")
        .extra_args(["yes", "--save", ""])
        .launch_timeout(Duration::from_secs(3))
        .shutdown_grace(Duration::from_millis(250))
        .readiness(ReadinessSettings::probe(5, Duration::from_millis(100)))
        .build_with_env(no_env)
        .expect("valid config");

    assert_eq!(config.engine_path(), Utf8Path::new("/opt/redis"));
    assert_eq!(config.target_path(), Utf8Path::new("build/redis-a"));
    assert_eq!(config.host(), "localhost");
    assert_eq!(config.port(), 16379);
    assert_eq!(config.extra_args(), ["--appendonly", "yes", "--save", ""]);
    assert_eq!(config.launch_timeout(), Duration::from_secs(3));
    assert_eq!(config.shutdown_grace(), Duration::from_millis(250));
    assert_eq!(
        config.readiness(),
        &ReadinessSettings::probe(5, Duration::from_millis(100))
    );
}

#[test]
fn engine_path_falls_back_to_home_variable() {
    let config = EngineConfig::builder(EngineKind::MongoDb)
        .build_with_env(|key| (key == "MONGO_HOME").then(|| String::from("/srv/mongo")))
        .expect("env fallback");
    assert_eq!(config.engine_path(), Utf8Path::new("/srv/mongo"));
}

#[test]
fn explicit_engine_path_wins_over_environment() {
    let config = EngineConfig::builder(EngineKind::MongoDb)
        .engine_path("/opt/mongo")
        .build_with_env(|_| Some(String::from("/srv/mongo")))
        .expect("explicit path");
    assert_eq!(config.engine_path(), Utf8Path::new("/opt/mongo"));
}

#[rstest]
#[case::unset(None)]
#[case::blank(Some("   "))]
fn missing_engine_path_names_the_variable(#[case] value: Option<&str>) {
    let error = EngineConfig::builder(EngineKind::Neo4j)
        .build_with_env(|_| value.map(str::to_owned))
        .expect_err("engine path is required");
    assert_eq!(
        error,
        ConfigError::MissingEnginePath {
            engine: EngineKind::Neo4j,
            env_var: "NEO4J_HOME",
        }
    );
    assert!(error.to_string().contains("NEO4J_HOME"));
}

#[test]
fn zero_port_is_rejected() {
    let error = EngineConfig::builder(EngineKind::Redis)
        .engine_path("/opt/redis")
        .port(0)
        .build_with_env(no_env)
        .expect_err("port zero");
    assert_eq!(
        error,
        ConfigError::InvalidPort {
            engine: EngineKind::Redis
        }
    );
}

#[test]
fn empty_target_is_rejected() {
    let error = EngineConfig::builder(EngineKind::CouchDb)
        .engine_path("/opt/couchdb")
        .target_path("")
        .build_with_env(no_env)
        .expect_err("empty target");
    assert!(matches!(error, ConfigError::EmptyTargetPath { .. }));
}

#[test]
fn empty_host_is_rejected() {
    let error = EngineConfig::builder(EngineKind::CouchDb)
        .engine_path("/opt/couchdb")
        .host(" ")
        .build_with_env(no_env)
        .expect_err("empty host");
    assert!(matches!(error, ConfigError::EmptyHost { .. }));
}

#[test]
fn zero_launch_timeout_is_rejected() {
    let error = EngineConfig::builder(EngineKind::InfluxDb)
        .engine_path("/opt/influx")
        .launch_timeout(Duration::ZERO)
        .build_with_env(no_env)
        .expect_err("zero timeout");
    assert_eq!(
        error,
        ConfigError::ZeroDuration {
            engine: EngineKind::InfluxDb,
            option: "launch timeout",
        }
    );
}

#[test]
fn invalid_readiness_is_rejected() {
    let error = EngineConfig::builder(EngineKind::MongoDb)
        .engine_path("/opt/mongo")
        .readiness(ReadinessSettings::console_marker("", 0, Duration::from_secs(1)))
        .build_with_env(no_env)
        .expect_err("empty marker");
    assert!(matches!(error, ConfigError::InvalidReadiness { .. }));
}
