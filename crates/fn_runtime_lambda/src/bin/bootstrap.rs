use std::process::ExitCode;

use clap::Parser;
use fn_runtime_lambda::adapters::environment::RuntimeConfig;
use fn_runtime_lambda::adapters::runtime_api::RuntimeApiClient;
use fn_runtime_lambda::functions::default_registry;
use fn_runtime_lambda::logging;
use fn_runtime_lambda::runtime::{bootstrap, prepare_process, EventLoop};

fn main() -> ExitCode {
    if let Err(error) = logging::init() {
        eprintln!("failed to install log subscriber: {error}");
    }

    let config = match RuntimeConfig::try_parse() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "failed to read runtime configuration");
            return ExitCode::FAILURE;
        }
    };

    prepare_process(&config);

    let client = match RuntimeApiClient::new(&config.runtime_api) {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(%error, "failed to create control plane client");
            return ExitCode::FAILURE;
        }
    };

    let registry = match default_registry() {
        Ok(registry) => registry,
        Err(error) => {
            tracing::error!(%error, "failed to assemble handler modules");
            return ExitCode::FAILURE;
        }
    };

    let ready = match bootstrap(&config, &registry, &client) {
        Ok(ready) => ready,
        Err(error) => {
            tracing::error!(%error, "bootstrap failed");
            return ExitCode::FAILURE;
        }
    };

    let event_loop = EventLoop::new(client, ready.handler, ready.function);
    match event_loop.run() {
        Ok(never) => match never {},
        Err(error) => {
            tracing::error!(%error, "lost contact with the control plane");
            ExitCode::FAILURE
        }
    }
}
