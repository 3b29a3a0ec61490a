//! Synchronous process launch with console capture.

use std::ffi::{OsStr, OsString};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread;

use tracing::debug;

use super::PROCESS_TARGET;
use super::managed::ManagedProcess;
use super::output::{CapturedOutput, DEFAULT_CAPTURE_LIMIT};
use crate::error::LaunchError;

/// Everything needed to start a server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    label: String,
    capture_limit: usize,
}

impl LaunchSpec {
    /// Starts a spec for `program` with no arguments.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        let program = executable.into();
        let label = program
            .file_name()
            .map_or_else(
                || program.display().to_string(),
                |name| name.to_string_lossy().into_owned(),
            );
        Self {
            program,
            args: Vec::new(),
            working_dir: None,
            env: Vec::new(),
            label,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
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

    /// Runs the process from `dir`.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Overrides the name used in logs.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Caps the number of stdout lines retained.
    #[must_use]
    pub const fn capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = limit;
        self
    }

    /// Executable to run.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments passed to the executable.
    #[must_use]
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Working directory, if one was set.
    #[must_use]
    pub fn current_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Extra environment variables.
    pub fn envs(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.env
            .iter()
            .map(|(key, value)| (key.as_os_str(), value.as_os_str()))
    }

    /// Name used in logs.
    #[must_use]
    pub fn display_label(&self) -> &str {
        &self.label
    }
}

/// Something that turns a [`LaunchSpec`] into a running process.
pub trait Launch: Send + Sync + 'static {
    /// Starts the process described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when the process cannot be started.
    fn launch(&self, spec: &LaunchSpec) -> Result<ManagedProcess, LaunchError>;
}

/// Starts processes described by a [`LaunchSpec`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launch for ProcessLauncher {
    /// Spawns the process and starts draining its output streams.
    ///
    /// Stdout lines are kept in the returned handle's [`CapturedOutput`];
    /// stderr lines are forwarded to the debug log.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when the executable is missing, the OS refuses
    /// to start it, or the output readers cannot be attached.
    fn launch(&self, spec: &LaunchSpec) -> Result<ManagedProcess, LaunchError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.envs())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        debug!(
            target: PROCESS_TARGET,
            label = %spec.label,
            program = %spec.program.display(),
            args = ?spec.args,
            "spawning process"
        );

        let mut child = command.spawn().map_err(|err| spawn_error(&spec.program, err))?;
        let output = CapturedOutput::new(spec.capture_limit);
        if let Err(error) = attach_readers(&mut child, &spec.program, &spec.label, &output) {
            drop(child.kill());
            drop(child.wait());
            return Err(error);
        }
        let process = ManagedProcess::new(spec.label.clone(), child, output);
        debug!(target: PROCESS_TARGET, label = %spec.label, pid = process.pid(), "process started");
        Ok(process)
    }
}

fn spawn_error(program: &Path, err: io::Error) -> LaunchError {
    if err.kind() == io::ErrorKind::NotFound {
        LaunchError::ProgramNotFound {
            program: program.to_path_buf(),
            source: Arc::new(err),
        }
    } else {
        LaunchError::Spawn {
            program: program.to_path_buf(),
            source: Arc::new(err),
        }
    }
}

fn attach_readers(
    child: &mut Child,
    program: &Path,
    label: &str,
    output: &CapturedOutput,
) -> Result<(), LaunchError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| LaunchError::CaptureOutput {
            program: program.to_path_buf(),
            message: String::from("stdout was not piped"),
        })?;
    let sink = output.clone();
    spawn_reader(format!("{label}-stdout"), move || sink.consume(stdout))?;

    if let Some(stderr) = child.stderr.take() {
        let name = label.to_owned();
        spawn_reader(format!("{label}-stderr"), move || drain_stderr(&name, stderr))?;
    }
    Ok(())
}

fn spawn_reader<F>(name: String, body: F) -> Result<(), LaunchError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map(drop)
        .map_err(|err| LaunchError::Thread {
            name,
            source: Arc::new(err),
        })
}

/// Forwards stderr to the debug log so the child never blocks on a full pipe.
fn drain_stderr(label: &str, stderr: impl Read) {
    for line in BufReader::new(stderr).lines() {
        let Ok(text) = line else {
            break;
        };
        debug!(target: PROCESS_TARGET, label, stderr = %text, "process stderr");
    }
}
