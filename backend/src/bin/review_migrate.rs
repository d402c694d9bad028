//! Apply the embedded schema migrations to the configured database.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;

use backend::ServiceSettings;
use backend::outbound::persistence::run_migrations;
use backend::telemetry::init_tracing;
use clap::Parser;
use ortho_config::OrthoConfig;
use tracing::info;

/// `review-migrate` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "review-migrate",
    about = "Apply pending review-backend schema migrations",
    version
)]
struct CliArgs {
    /// Database connection URL. Falls back to `REVIEW_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
}

fn resolve_database_url(
    cli: Option<String>,
    settings: &ServiceSettings,
) -> io::Result<String> {
    cli.or_else(|| settings.database_url.clone()).ok_or_else(|| {
        io::Error::other("no database configured: pass --database-url or set REVIEW_DATABASE_URL")
    })
}

fn main() -> io::Result<()> {
    let args = CliArgs::try_parse().map_err(io::Error::other)?;
    let settings = ServiceSettings::load_from_iter([OsString::from("review-migrate")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    let format = settings.log_format().map_err(io::Error::other)?;
    init_tracing(format);

    let database_url = resolve_database_url(args.database_url, &settings)?;
    run_migrations(&database_url).map_err(io::Error::other)?;
    info!("schema is up to date");
    Ok(())
}
