use clap::Parser;
use color_eyre::Result;
use refillr::cli::{self, Cli, Commands, Context};
use refillr::{Config, Profile};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    // Logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refillr=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Determine profile: --dev flag enables dev mode, otherwise use prod
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = match &cli.config {
        Some(path) => Config::load_from_path(&PathBuf::from(path))?,
        None => Config::load_with_profile(profile)?,
    };
    tracing::debug!("Using item file {:?}", config.get_store_path());

    let ctx = Context::new(config)?;

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => cli::handle_list(&ctx).await?,
        Commands::Add { name, brand, dose, time, label_id } => {
            cli::handle_add(&ctx, name, brand, dose, time, label_id).await?
        }
        Commands::AddLabel { id, time } => cli::handle_add_label(&ctx, id, time).await?,
        Commands::Edit { id, name, brand, dose, time } => {
            cli::handle_edit(&ctx, id, name, brand, dose, time).await?
        }
        Commands::Toggle { id } => cli::handle_toggle(&ctx, id).await?,
        Commands::Delete { id } => cli::handle_delete(&ctx, id).await?,
        Commands::Reset => cli::handle_reset(&ctx).await?,
        Commands::Search { query, brand, status, sort } => {
            cli::handle_search(&ctx, query, brand, status, sort).await?
        }
        Commands::Label { id } => cli::handle_label(&ctx, id).await?,
        Commands::Interactive => cli::handle_interactive(&ctx).await?,
    }

    Ok(())
}
