//! Command framework for the `admin-mis` binary.
//!
//! A [`ManagementCommand`] names itself, declares its arguments on a clap
//! subcommand and handles the parsed matches. The [`CommandRegistry`]
//! builds the top-level CLI from every registered command and dispatches.
//!
//! ```rust,no_run
//! use admin_mis_cli::command::ManagementCommand;
//! use admin_mis_core::{MisError, Settings};
//! use async_trait::async_trait;
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl ManagementCommand for Ping {
//!     fn name(&self) -> &str { "ping" }
//!     fn help(&self) -> &str { "Print pong" }
//!
//!     async fn handle(
//!         &self,
//!         _matches: &clap::ArgMatches,
//!         _settings: &Settings,
//!     ) -> Result<(), MisError> {
//!         println!("pong");
//!         Ok(())
//!     }
//! }
//! ```

use std::collections::HashMap;

use admin_mis_core::{MisError, Settings};
use async_trait::async_trait;

/// A subcommand of the `admin-mis` binary.
#[async_trait]
pub trait ManagementCommand: Send + Sync {
    fn name(&self) -> &str;

    /// One-line description shown in `--help`.
    fn help(&self) -> &str;

    /// Adds the command's own arguments. The default adds none.
    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd
    }

    async fn handle(&self, matches: &clap::ArgMatches, settings: &Settings) -> Result<(), MisError>;
}

/// Commands keyed by name.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn ManagementCommand>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Registers `command`, replacing any command of the same name.
    pub fn register(&mut self, command: Box<dyn ManagementCommand>) {
        self.commands.insert(command.name().to_string(), command);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ManagementCommand> {
        self.commands.get(name).map(AsRef::as_ref)
    }

    /// Registered names in sorted order.
    pub fn list_commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Builds the `admin-mis` CLI: a global `--settings FILE` option and
    /// one subcommand per registered command.
    pub fn build_cli(&self) -> clap::Command {
        let mut app = clap::Command::new("admin-mis")
            .about("Generic REST API over an admin-site registry")
            .subcommand_required(true)
            .arg(
                clap::Arg::new("settings")
                    .long("settings")
                    .value_name("FILE")
                    .global(true)
                    .help("TOML settings file"),
            );

        let mut entries: Vec<_> = self.commands.iter().collect();
        entries.sort_by_key(|(name, _)| name.as_str());

        for (name, cmd) in entries {
            // clap wants 'static names; commands are registered once at startup.
            let static_name: &'static str = Box::leak(name.clone().into_boxed_str());
            let subcmd = clap::Command::new(static_name).about(cmd.help().to_string());
            app = app.subcommand(cmd.add_arguments(subcmd));
        }
        app
    }

    /// Dispatches to the subcommand named in `matches`.
    pub async fn execute(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), MisError> {
        let (name, sub_matches) = matches
            .subcommand()
            .ok_or_else(|| MisError::ConfigurationError("No subcommand specified".to_string()))?;
        let cmd = self
            .get(name)
            .ok_or_else(|| MisError::ConfigurationError(format!("Unknown command: {name}")))?;
        tracing::debug!(command = name, "running command");
        cmd.handle(sub_matches, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl ManagementCommand for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn help(&self) -> &str {
            "Echo"
        }

        fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
            cmd.arg(clap::Arg::new("loud").long("loud").action(clap::ArgAction::SetTrue))
        }

        async fn handle(
            &self,
            matches: &clap::ArgMatches,
            _settings: &Settings,
        ) -> Result<(), MisError> {
            if matches.get_flag("loud") {
                return Err(MisError::BadRequest("too loud".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_register_and_list() {
        let mut registry = CommandRegistry::default();
        assert!(registry.is_empty());
        registry.register(Box::new(Echo("zeta")));
        registry.register(Box::new(Echo("alpha")));
        registry.register(Box::new(Echo("alpha")));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.list_commands(), vec!["alpha", "zeta"]);
        assert_eq!(registry.get("zeta").unwrap().help(), "Echo");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_global_settings_argument() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(Echo("echo")));
        let matches = registry
            .build_cli()
            .try_get_matches_from(["admin-mis", "echo", "--settings", "site.toml"])
            .unwrap();
        assert_eq!(matches.get_one::<String>("settings").unwrap(), "site.toml");
        assert!(registry.build_cli().try_get_matches_from(["admin-mis"]).is_err());
    }

    #[tokio::test]
    async fn test_execute() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(Echo("echo")));
        let settings = Settings::default();

        let matches = registry.build_cli().try_get_matches_from(["admin-mis", "echo"]).unwrap();
        assert!(registry.execute(&matches, &settings).await.is_ok());

        let matches = registry
            .build_cli()
            .try_get_matches_from(["admin-mis", "echo", "--loud"])
            .unwrap();
        assert!(matches!(
            registry.execute(&matches, &settings).await,
            Err(MisError::BadRequest(_))
        ));
    }
}
