use std::str::FromStr;

use clap::Parser;
use tracing::{error, Level};

use analytics::{
    cli::{self, Cli, Commands},
    configuration::{get_configuration, set_configuration, AppState},
    error::Error,
    handler::cache_refresher,
    server,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let result = app_main().await;

    if let Err(err) = &result {
        error!("{}", err);
    }

    result
}

async fn app_main() -> Result<(), Error> {
    let cli = Cli::parse();

    set_configuration()?;
    let level = std::env::var("LOG_LEVEL").unwrap_or(String::from("INFO"));
    let level = Level::from_str(&level).map_err(|_| {
        Error::ConfigurationError(format!("invalid LOG_LEVEL '{}'", level))
    })?;

    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_level(true)
        .with_max_level(level)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::Refresh { domain, key } => {
            cli::run_refresh(&domain, key.as_deref()).await
        },
    }
}

async fn serve() -> Result<(), Error> {
    let config = match get_configuration() {
        Ok(config) => config,
        Err(e) => return Err(Error::ConfigurationError(e.to_string())),
    };

    let state = cli::init_state(config).await?;
    let app_state = AppState::new(state);

    let (_, _) = tokio::try_join!(
        server::server_task(&app_state),
        cache_refresher::cache_refresh_task(app_state.clone()),
    )?;

    Ok(())
}
