//! `demo.greeter`: greets by name, with the greeting read from
//! `greeter.json` on the module search path.

use std::fs;
use std::path::Path;

use fn_runtime_core::context::ExecutionContext;
use fn_runtime_core::handler::handler_fn;
use fn_runtime_core::resolver::{HandlerModule, ModuleError, SearchPath};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MODULE_PATH: &str = "demo.greeter";
pub const SETTINGS_FILE: &str = "greeter.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GreeterSettings {
    pub greeting: String,
    #[serde(default)]
    pub punctuation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GreetRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Greeting {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum GreetError {
    #[error("name must not be empty")]
    EmptyName,
}

/// Module loader registered under [`MODULE_PATH`].
pub fn load(search_path: &SearchPath) -> Result<HandlerModule, ModuleError> {
    let settings_path = search_path.find(SETTINGS_FILE).ok_or_else(|| {
        ModuleError::NotFound(format!("No module named '{MODULE_PATH}': {SETTINGS_FILE} not found"))
    })?;
    let settings = read_settings(&settings_path)?;

    Ok(HandlerModule::new().with_function(
        "greet",
        handler_fn(move |request: GreetRequest, _context: &ExecutionContext| {
            greet(&settings, &request.name)
        }),
    ))
}

fn read_settings(path: &Path) -> Result<GreeterSettings, ModuleError> {
    let text = fs::read_to_string(path)
        .map_err(|error| ModuleError::NotFound(format!("{}: {error}", path.display())))?;
    serde_json::from_str(&text).map_err(|error| {
        let line = error.line();
        ModuleError::Syntax {
            file: path.display().to_string(),
            line,
            text: text
                .lines()
                .nth(line.saturating_sub(1))
                .unwrap_or_default()
                .to_string(),
            message: error.to_string(),
        }
    })
}

pub fn greet(settings: &GreeterSettings, name: &str) -> Result<Greeting, GreetError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GreetError::EmptyName);
    }
    Ok(Greeting {
        message: format!(
            "{}, {name}{}",
            settings.greeting,
            settings.punctuation.as_deref().unwrap_or("!")
        ),
    })
}
