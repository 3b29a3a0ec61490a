//! Engine hooks that run a server as an external process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nosqlkit_config::EngineConfig;
use nosqlkit_lifecycle::{
    AsyncSpawner, EngineHooks, EngineIdentity, LifecycleError, ManagedProcess, ReadinessTarget,
    ResourceLifecycleManager, TargetPath, ensure_ready, strategy_for,
};
use tracing::{debug, info, warn};

use crate::ENGINES_TARGET;
use crate::instance::ServerInstance;
use crate::presets::{GeneratedFile, ServerCommand, preset};

/// Starts and stops one engine's server binary.
///
/// `do_start` prepares the working directory, launches the server with a
/// bounded wait, and blocks until the configured readiness strategy
/// succeeds. A server that never becomes ready is destroyed before the
/// error is returned.
#[derive(Debug)]
pub struct ProcessEngine {
    config: EngineConfig,
    command: Option<ServerCommand>,
    process: Option<ManagedProcess>,
}

impl ProcessEngine {
    /// Hooks launching the engine's default command.
    #[must_use]
    pub const fn new(config: EngineConfig) -> Self {
        Self {
            config,
            command: None,
            process: None,
        }
    }

    /// Hooks launching `command` instead of the engine's default.
    #[must_use]
    pub const fn with_command(config: EngineConfig, command: ServerCommand) -> Self {
        Self {
            config,
            command: Some(command),
            process: None,
        }
    }

    /// Lifecycle manager for `config` backed by the process-wide registries.
    #[must_use]
    pub fn manager(config: EngineConfig) -> ResourceLifecycleManager<Self> {
        let identity = EngineIdentity::from_config(&config);
        ResourceLifecycleManager::new(identity, Self::new(config))
    }

    /// Configuration the hooks were created with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn command_for(&self, data_dir: &Path) -> ServerCommand {
        self.command
            .clone()
            .unwrap_or_else(|| preset(&self.config, data_dir))
    }

    fn discard(&self, process: &ManagedProcess) {
        if let Err(error) = process.destroy(self.config.shutdown_grace()) {
            warn!(
                target: ENGINES_TARGET,
                engine = %self.config.kind(),
                pid = process.pid(),
                %error,
                "failed to destroy server that never became ready"
            );
        }
    }
}

impl EngineHooks for ProcessEngine {
    type Handle = ServerInstance;

    fn do_start(&mut self, identity: &EngineIdentity) -> Result<Arc<ServerInstance>, LifecycleError> {
        let data_dir = absolute_dir(identity.target())?;
        let command = self.command_for(&data_dir);
        write_files(identity.target(), &data_dir, command.files())?;

        let spec = command.to_launch_spec(identity.engine(), &data_dir);
        let process = AsyncSpawner::new(self.config.launch_timeout())
            .spawn(spec)
            .map_err(|source| LifecycleError::Launch {
                engine: identity.engine().to_owned(),
                target: identity.target().clone(),
                port: identity.key().port(),
                source,
            })?;
        debug!(
            target: ENGINES_TARGET,
            engine = identity.engine(),
            pid = process.pid(),
            "server launched; awaiting readiness"
        );

        let strategy = strategy_for(self.config.readiness());
        let readiness = ReadinessTarget {
            engine: identity.engine(),
            key: identity.key(),
            process: Some(&process),
        };
        if let Err(error) = ensure_ready(strategy.as_ref(), &readiness) {
            self.discard(&process);
            return Err(error);
        }

        info!(
            target: ENGINES_TARGET,
            engine = identity.engine(),
            endpoint = %identity.key(),
            pid = process.pid(),
            "server ready"
        );
        let instance = Arc::new(ServerInstance::new(
            self.config.kind(),
            identity.key().clone(),
            identity.target().clone(),
            process.pid(),
        ));
        self.process = Some(process);
        Ok(instance)
    }

    fn do_stop(&mut self) -> Result<(), LifecycleError> {
        let Some(process) = self.process.take() else {
            return Ok(());
        };
        let pid = process.pid();
        process
            .destroy(self.config.shutdown_grace())
            .map_err(|source| LifecycleError::Teardown {
                engine: self.config.kind().to_string(),
                source,
            })?;
        debug!(target: ENGINES_TARGET, engine = %self.config.kind(), pid, "server destroyed");
        Ok(())
    }
}

fn absolute_dir(target: &TargetPath) -> Result<PathBuf, LifecycleError> {
    target
        .as_std_path()
        .canonicalize()
        .map_err(|source| workspace_error(target, source))
}

fn write_files(
    target: &TargetPath,
    data_dir: &Path,
    files: &[GeneratedFile],
) -> Result<(), LifecycleError> {
    for file in files {
        fs::write(data_dir.join(&file.name), &file.contents)
            .map_err(|source| workspace_error(target, source))?;
    }
    Ok(())
}

fn workspace_error(target: &TargetPath, source: io::Error) -> LifecycleError {
    LifecycleError::Workspace {
        path: target.as_path().to_path_buf(),
        source: Arc::new(source),
    }
}
