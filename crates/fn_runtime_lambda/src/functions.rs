//! Handler modules compiled into the `bootstrap` binary.

pub mod echo;
pub mod greeter;

use fn_runtime_core::resolver::{ModuleRegistry, RegistryError};

/// Registry with the reserved modules plus every module shipped here.
pub fn default_registry() -> Result<ModuleRegistry, RegistryError> {
    let mut registry = ModuleRegistry::new();
    registry.register_module(echo::MODULE_PATH, echo::module())?;
    registry.register_loader(greeter::MODULE_PATH, greeter::load)?;
    Ok(registry)
}
