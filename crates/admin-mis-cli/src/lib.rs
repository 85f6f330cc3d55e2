//! # admin-mis-cli
//!
//! The `admin-mis` binary and the pieces it is built from:
//!
//! - [`command`] - the [`ManagementCommand`] trait and [`CommandRegistry`]
//! - [`commands`] - `runserver` and `check`
//! - [`demo`] - the demo models, admins and fixture rows served by `runserver`
//!
//! ```rust
//! use admin_mis_cli::command::CommandRegistry;
//! use admin_mis_cli::commands::register_builtin_commands;
//!
//! let mut registry = CommandRegistry::new();
//! register_builtin_commands(&mut registry);
//! assert_eq!(registry.list_commands(), vec!["check", "runserver"]);
//! ```

// - module_name_repetitions: CheckCommand / RunserverCommand live in commands::*
// - unused_async: command handlers share one async signature
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]

pub mod command;
pub mod commands;
pub mod demo;

pub use command::{CommandRegistry, ManagementCommand};
