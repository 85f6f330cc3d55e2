use admin_mis_cli::command::CommandRegistry;
use admin_mis_cli::commands::register_builtin_commands;
use admin_mis_core::logging::setup_logging;
use admin_mis_core::settings_loader;
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut registry = CommandRegistry::new();
    register_builtin_commands(&mut registry);
    let matches = registry.build_cli().get_matches();

    let settings = match matches.get_one::<String>("settings") {
        Some(path) => settings_loader::from_toml_file_with_env(path)
            .with_context(|| format!("loading settings from {path}"))?,
        None => settings_loader::from_env(),
    };
    setup_logging(&settings);

    registry.execute(&matches, &settings).await?;
    Ok(())
}
