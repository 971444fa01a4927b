//! Process environment: configuration parsing and the variables the runtime
//! maintains for handler code.

use std::path::{Path, PathBuf};

use clap::Parser;
use fn_runtime_core::context::FunctionMetadata;
use fn_runtime_core::contract::TRACE_ID_ENV;
use fn_runtime_core::resolver::SearchPath;
use thiserror::Error;

pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";
pub const HANDLER_ENV: &str = "_HANDLER";

const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin/:/bin";
const RUNTIME_BIN_DIR: &str = "/var/lang/bin";
const DEFAULT_LD_LIBRARY_PATH: &str = "/var/lang/lib:/lib64:/usr/lib64";
const DEFAULT_MODULE_DIRS: &[&str] = &["/opt/lib", "/opt"];

/// Runtime settings, read from the environment the host sets up.
#[derive(Debug, Clone, Parser)]
#[command(name = "bootstrap", about = "Function runtime invocation loop")]
pub struct RuntimeConfig {
    /// Control API `host:port`.
    #[arg(long, env = RUNTIME_API_ENV)]
    pub runtime_api: String,

    /// Handler reference, `module[.module...].function`.
    #[arg(long, env = HANDLER_ENV)]
    pub handler: Option<String>,

    #[arg(long, env = "LAMBDA_TASK_ROOT")]
    pub task_root: Option<PathBuf>,

    /// Colon-separated directories searched after the task root.
    #[arg(long, env = "LAMBDA_MODULE_PATH")]
    pub module_path: Option<String>,

    #[arg(long, env = "LAMBDA_RUNTIME_DIR")]
    pub runtime_dir: Option<PathBuf>,

    #[arg(long, env = "AWS_LAMBDA_FUNCTION_NAME")]
    pub function_name: Option<String>,

    #[arg(long, env = "AWS_LAMBDA_FUNCTION_VERSION")]
    pub function_version: Option<String>,

    #[arg(long, env = "AWS_LAMBDA_FUNCTION_MEMORY_SIZE")]
    pub memory_size: Option<String>,

    #[arg(long, env = "AWS_LAMBDA_LOG_GROUP_NAME")]
    pub log_group_name: Option<String>,

    #[arg(long, env = "AWS_LAMBDA_LOG_STREAM_NAME")]
    pub log_stream_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("_HANDLER is not set")]
    MissingHandler,
    #[error("LAMBDA_TASK_ROOT is not set")]
    MissingTaskRoot,
    #[error("AWS_LAMBDA_FUNCTION_MEMORY_SIZE must be a whole number of megabytes, got '{0}'")]
    InvalidMemorySize(String),
}

impl RuntimeConfig {
    /// Check everything bootstrap depends on, returning the handler reference.
    pub fn validate(&self) -> Result<&str, ConfigError> {
        if self.task_root.is_none() {
            return Err(ConfigError::MissingTaskRoot);
        }
        if let Some(memory_size) = &self.memory_size {
            parse_memory_size(memory_size)?;
        }
        self.handler
            .as_deref()
            .map(str::trim)
            .filter(|handler| !handler.is_empty())
            .ok_or(ConfigError::MissingHandler)
    }

    pub fn function_metadata(&self) -> FunctionMetadata {
        FunctionMetadata {
            function_name: self.function_name.clone(),
            function_version: self.function_version.clone(),
            memory_limit_mb: self
                .memory_size
                .as_deref()
                .and_then(|value| parse_memory_size(value).ok()),
            log_group_name: self.log_group_name.clone(),
            log_stream_name: self.log_stream_name.clone(),
        }
    }

    /// Task root first, then the override directories, or the default layer
    /// directories when no override is set.
    pub fn search_path(&self) -> SearchPath {
        let mut dirs: Vec<PathBuf> = self.task_root.iter().cloned().collect();
        match &self.module_path {
            Some(module_path) => dirs.extend(
                module_path
                    .split(':')
                    .filter(|dir| !dir.is_empty())
                    .map(PathBuf::from),
            ),
            None => dirs.extend(DEFAULT_MODULE_DIRS.iter().map(PathBuf::from)),
        }
        SearchPath::new(dirs)
    }
}

fn parse_memory_size(value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidMemorySize(value.to_string()))
}

/// Values for `PATH` and `LD_LIBRARY_PATH` that need to change given their
/// current values. Variables already customized by the host are left alone.
pub fn process_path_updates(
    path: Option<&str>,
    ld_library_path: Option<&str>,
    runtime_dir: Option<&Path>,
    task_root: Option<&Path>,
) -> Vec<(&'static str, String)> {
    let mut updates = Vec::new();

    if path.map_or(true, |path| path == DEFAULT_PATH) {
        updates.push(("PATH", format!("{RUNTIME_BIN_DIR}:{DEFAULT_PATH}")));
    }

    if ld_library_path.is_none() {
        let mut dirs = vec![DEFAULT_LD_LIBRARY_PATH.to_string()];
        for root in [runtime_dir, task_root].into_iter().flatten() {
            dirs.push(root.display().to_string());
            dirs.push(root.join("lib").display().to_string());
        }
        updates.push(("LD_LIBRARY_PATH", dirs.join(":")));
    }

    updates
}

pub fn apply_process_paths(config: &RuntimeConfig) {
    let path = std::env::var("PATH").ok();
    let ld_library_path = std::env::var("LD_LIBRARY_PATH").ok();
    let updates = process_path_updates(
        path.as_deref(),
        ld_library_path.as_deref(),
        config.runtime_dir.as_deref(),
        config.task_root.as_deref(),
    );
    for (name, value) in updates {
        tracing::debug!(name, value = value.as_str(), "updating process path");
        std::env::set_var(name, value);
    }
}

/// Expose the invocation's trace id to handler code, clearing any stale one.
///
/// Unlike the setup in `prepare_process`, this runs while the HTTP client's
/// worker thread is alive. Nothing on that thread reads the environment, but
/// environment writes are unsynchronized on glibc, so handler code must not
/// read it from other threads it spawns.
pub fn propagate_trace_id(trace_id: Option<&str>) {
    match trace_id {
        Some(trace_id) => std::env::set_var(TRACE_ID_ENV, trace_id),
        None => std::env::remove_var(TRACE_ID_ENV),
    }
}
