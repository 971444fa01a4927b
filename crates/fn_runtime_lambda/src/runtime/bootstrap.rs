use std::sync::Arc;

use fn_runtime_core::context::FunctionMetadata;
use fn_runtime_core::fault::{HandlerError, InvocationError};
use fn_runtime_core::handler::Handler;
use fn_runtime_core::panic::{catch_handler_panic, install_panic_capture};
use fn_runtime_core::resolver::{ModuleRegistry, Resolver};
use thiserror::Error;

use crate::adapters::control_plane::{ControlPlane, ControlPlaneError};
use crate::adapters::environment::{
    apply_process_paths, ConfigError, RuntimeConfig, RUNTIME_API_ENV,
};

/// Everything the invocation loop needs, prepared once per process.
pub struct Bootstrapped {
    pub handler: Arc<dyn Handler>,
    pub function: FunctionMetadata,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("handler module panicked while loading: {0}")]
    LoaderPanic(String),
    #[error("failed to report initialization error: {0}")]
    ControlPlane(#[from] ControlPlaneError),
}

/// Process-wide setup: library and binary search paths, the panic hook, and
/// removal of the control API address from handler-visible environment.
///
/// Writes the process environment, so it has to run before any other thread
/// exists; the HTTP client starts one as soon as it is built.
pub fn prepare_process(config: &RuntimeConfig) {
    apply_process_paths(config);
    std::env::remove_var(RUNTIME_API_ENV);
    install_panic_capture();
}

/// Validate the configuration and resolve the handler.
///
/// A configuration failure, or a module loader that panics, is posted to the
/// init error endpoint before it is returned. An unresolvable handler is not
/// an init failure: the returned handler is a stand-in that fails every
/// invocation.
pub fn bootstrap<C: ControlPlane>(
    config: &RuntimeConfig,
    registry: &ModuleRegistry,
    control_plane: &C,
) -> Result<Bootstrapped, BootstrapError> {
    let handler_reference = match config.validate() {
        Ok(reference) => reference,
        Err(error) => {
            tracing::error!(%error, "runtime initialization failed");
            let failure = InvocationError::runtime(HandlerError::untraced(error.clone()));
            control_plane.post_init_error(&failure.to_wire_shape().to_json_bytes())?;
            return Err(error.into());
        }
    };

    let search_path = config.search_path();
    let resolver = Resolver::new(registry, &search_path);
    let handler = match catch_handler_panic(|| resolver.resolve(handler_reference)) {
        Ok(resolution) => resolution.into_handler(),
        Err(loader_panic) => {
            tracing::error!(
                handler = handler_reference,
                error = loader_panic.message(),
                "handler module panicked while loading"
            );
            let message = loader_panic.message().to_string();
            let failure = InvocationError::runtime(loader_panic);
            control_plane.post_init_error(&failure.to_wire_shape().to_json_bytes())?;
            return Err(BootstrapError::LoaderPanic(message));
        }
    };
    tracing::debug!(
        handler = handler_reference,
        search_path = ?search_path.dirs(),
        "runtime initialized"
    );

    Ok(Bootstrapped {
        handler,
        function: config.function_metadata(),
    })
}
