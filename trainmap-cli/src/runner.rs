//! Shared setup for commands that talk to the network.

use tokio::runtime::Runtime;
use tracing::info;
use trainmap::config::{config_file_path, ConfigFile};
use trainmap::logging::{self, LoggingGuard};

use crate::error::CliError;

/// Loaded configuration, installed logging and a runtime to run on.
pub struct CliRunner {
    config: ConfigFile,
    runtime: Runtime,
    _logging: LoggingGuard,
}

impl CliRunner {
    /// Load the configuration file and set up logging.
    ///
    /// The runtime is single-threaded: the map session handles one event at
    /// a time, and network tasks only post results back to it.
    pub fn new() -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let guard = logging::init(&config.logging.level, config.logging.file.as_deref())?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            config,
            runtime,
            _logging: guard,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Log the command and where its settings came from.
    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = trainmap::VERSION,
            config = %config_file_path().display(),
            "trainmap starting"
        );
    }
}
