//! The `runserver` command.
//!
//! Builds the demo site, seeds it and serves the admin API until Ctrl-C.

use admin_mis_core::{MisError, Settings};
use async_trait::async_trait;
use tokio::net::TcpListener;

use crate::command::ManagementCommand;
use crate::demo;

/// Serves the admin API over HTTP.
///
/// `--host` and `--port` override the `host` / `port` settings.
pub struct RunserverCommand;

impl RunserverCommand {
    /// The address to bind: command-line values first, then settings.
    pub fn bind_address(matches: &clap::ArgMatches, settings: &Settings) -> String {
        let host = matches
            .get_one::<String>("host")
            .map_or(settings.host.as_str(), String::as_str);
        let port = matches.get_one::<u16>("port").copied().unwrap_or(settings.port);
        format!("{host}:{port}")
    }
}

#[async_trait]
impl ManagementCommand for RunserverCommand {
    fn name(&self) -> &'static str {
        "runserver"
    }

    fn help(&self) -> &'static str {
        "Serve the admin API"
    }

    fn add_arguments(&self, cmd: clap::Command) -> clap::Command {
        cmd.arg(clap::Arg::new("host").long("host").help("Host to bind to"))
            .arg(
                clap::Arg::new("port")
                    .long("port")
                    .value_parser(clap::value_parser!(u16))
                    .help("Port to bind to"),
            )
    }

    async fn handle(
        &self,
        matches: &clap::ArgMatches,
        settings: &Settings,
    ) -> Result<(), MisError> {
        let addr = Self::bind_address(matches, settings);
        let site = demo::site(settings.clone())?;
        for problem in site.check() {
            tracing::warn!(%problem, "admin configuration problem");
        }
        demo::seed(&site).await?;
        let prefix = settings.api_prefix.clone();
        let router = site.into_router();

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Serving admin API at http://{addr}{prefix}/ (debug={})", settings.debug);
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    tracing::warn!("could not install the Ctrl-C handler");
                }
            })
            .await?;
        tracing::info!("server stopped");
        Ok(())
    }
}
