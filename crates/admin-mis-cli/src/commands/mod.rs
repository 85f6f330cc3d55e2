//! Built-in commands of the `admin-mis` binary.

pub mod check;
pub mod runserver;

pub use check::CheckCommand;
pub use runserver::RunserverCommand;

use crate::command::CommandRegistry;

/// Registers `runserver` and `check`.
pub fn register_builtin_commands(registry: &mut CommandRegistry) {
    registry.register(Box::new(RunserverCommand));
    registry.register(Box::new(CheckCommand));
}
