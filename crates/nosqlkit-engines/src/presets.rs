//! Command lines and generated configuration files for each engine.
//!
//! Every server is started from its installation directory with its data
//! directory pointed at the fixture's working directory. Engines that only
//! read their listen address from a configuration file get that file
//! generated into the working directory.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use nosqlkit_config::{EngineConfig, EngineKind};
use nosqlkit_lifecycle::LaunchSpec;

/// A file written into the working directory before launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// File name relative to the working directory.
    pub name: String,
    /// File contents.
    pub contents: String,
}

/// How to launch one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    files: Vec<GeneratedFile>,
}

impl ServerCommand {
    /// Command running `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the server.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Writes `contents` to `name` inside the working directory before launch.
    #[must_use]
    pub fn file(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.push(GeneratedFile {
            name: name.into(),
            contents: contents.into(),
        });
        self
    }

    /// Executable to run.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments in order.
    #[must_use]
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Environment overrides.
    #[must_use]
    pub fn environment(&self) -> &[(OsString, OsString)] {
        &self.env
    }

    /// Files generated before launch.
    #[must_use]
    pub fn files(&self) -> &[GeneratedFile] {
        &self.files
    }

    /// Converts the command into a launch spec running from `working_dir`.
    #[must_use]
    pub fn to_launch_spec(&self, label: &str, working_dir: &Path) -> LaunchSpec {
        let mut spec = LaunchSpec::new(&self.program)
            .args(self.args.iter().cloned())
            .working_dir(working_dir)
            .label(label);
        for (key, value) in &self.env {
            spec = spec.env(key.clone(), value.clone());
        }
        spec
    }
}

/// Default command for `config`, with `data_dir` as the absolute working
/// directory. The configured extra arguments are appended last.
#[must_use]
pub fn preset(config: &EngineConfig, data_dir: &Path) -> ServerCommand {
    let home = config.engine_path().as_std_path();
    let host = config.host();
    let port = config.port();
    let data = data_dir.display();

    let command = match config.kind() {
        EngineKind::MongoDb => ServerCommand::new(home.join("bin/mongod")).args([
            String::from("--port"),
            port.to_string(),
            String::from("--dbpath"),
            data.to_string(),
            String::from("--bind_ip"),
            host.to_owned(),
        ]),
        EngineKind::Redis => ServerCommand::new(home.join("bin/redis-server")).args([
            String::from("--port"),
            port.to_string(),
            String::from("--bind"),
            host.to_owned(),
            String::from("--dir"),
            data.to_string(),
        ]),
        EngineKind::Elasticsearch => ServerCommand::new(home.join("bin/elasticsearch")).args([
            format!("-Epath.data={data}"),
            format!("-Ehttp.port={port}"),
            format!("-Enetwork.host={host}"),
        ]),
        EngineKind::CouchDb => ServerCommand::new(home.join("bin/couchdb"))
            .arg("-couch_ini")
            .arg(home.join("etc/default.ini"))
            .arg(data_dir.join("local.ini"))
            .file(
                "local.ini",
                format!(
                    "[couchdb]\ndatabase_dir = {data}\nview_index_dir = {data}\n\n\
                     [chttpd]\nport = {port}\nbind_address = {host}\n"
                ),
            ),
        EngineKind::HBase => ServerCommand::new(home.join("bin/hbase"))
            .args(["master", "start"])
            .env("HBASE_CONF_DIR", data_dir)
            .env("HBASE_LOG_DIR", data_dir.join("logs"))
            .file("hbase-site.xml", hbase_site(host, port, data_dir)),
        EngineKind::Infinispan => ServerCommand::new(home.join("bin/server.sh")).args([
            String::from("-b"),
            host.to_owned(),
            format!("-Dinfinispan.bind.port={port}"),
            String::from("-s"),
            data.to_string(),
        ]),
        EngineKind::Neo4j => ServerCommand::new(home.join("bin/neo4j"))
            .arg("console")
            .env("NEO4J_CONF", data_dir)
            .file(
                "neo4j.conf",
                format!(
                    "server.directories.data={data}/data\n\
                     server.directories.logs={data}/logs\n\
                     server.http.listen_address={host}:{port}\n\
                     server.https.enabled=false\n"
                ),
            ),
        EngineKind::DynamoDb => ServerCommand::new("java").args([
            format!("-Djava.library.path={}", home.join("DynamoDBLocal_lib").display()),
            String::from("-jar"),
            home.join("DynamoDBLocal.jar").display().to_string(),
            String::from("-port"),
            port.to_string(),
            String::from("-dbPath"),
            data.to_string(),
        ]),
        EngineKind::InfluxDb => ServerCommand::new(home.join("influxd")).args([
            String::from("--http-bind-address"),
            format!("{host}:{port}"),
            String::from("--bolt-path"),
            data_dir.join("influxd.bolt").display().to_string(),
            String::from("--engine-path"),
            data_dir.join("engine").display().to_string(),
        ]),
    };
    command.args(config.extra_args().iter().cloned())
}

fn hbase_site(host: &str, port: u16, data_dir: &Path) -> String {
    let property = |name: &str, value: &str| {
        format!("  <property>\n    <name>{name}</name>\n    <value>{value}</value>\n  </property>\n")
    };
    let mut site = String::from("<?xml version=\"1.0\"?>\n<configuration>\n");
    site.push_str(&property(
        "hbase.rootdir",
        &format!("file://{}", data_dir.join("hbase").display()),
    ));
    site.push_str(&property("hbase.master.hostname", host));
    site.push_str(&property("hbase.master.port", &port.to_string()));
    site.push_str(&property("hbase.cluster.distributed", "false"));
    site.push_str("</configuration>\n");
    site
}
