#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use imgpick::{
    AppState, ImagePicker, ScoreConfig, ScoreConfigOverrides, build_app,
    config::{Cli, Commands, Config, PickArgs},
    logging::init_logging,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config;

    // Keep guard alive so the file logger flushes
    let _log_guards = init_logging(&config, matches!(cli.command, Commands::Pick(_)));

    let picker = make_picker(&config)?;
    match cli.command {
        Commands::Pick(args) => pick(&picker, args).await,
        Commands::Serve { bind } => serve(picker, &config, bind).await,
    }
}

fn make_picker(config: &Config) -> anyhow::Result<ImagePicker> {
    let mut picker = ImagePicker::new(config.picker_options(), ScoreConfig::default())
        .context("building HTTP client")?;
    let overrides = config
        .score_config
        .as_deref()
        .map(ScoreConfigOverrides::load)
        .transpose()?;
    if picker.set_score_config(overrides.as_ref()) {
        tracing::info!("score overrides applied");
    }
    Ok(picker)
}

async fn pick(picker: &ImagePicker, args: PickArgs) -> anyhow::Result<()> {
    let html = match &args.html_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };
    let query = args.query.as_deref();

    if args.debug {
        let report = picker
            .get_best_image_debug(&args.url, query, html.as_deref(), None)
            .await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let image_url = match html.as_deref() {
        Some(h) => picker.get_best_image_from_html(&args.url, query, h, None).await?,
        None => picker.get_best_image(&args.url, query).await?,
    };
    println!("{image_url}");
    Ok(())
}

async fn serve(
    picker: ImagePicker,
    config: &Config,
    bind: std::net::SocketAddr,
) -> anyhow::Result<()> {
    tracing::info!("=== Configuration ===");
    tracing::info!("Bind address: {bind}");
    tracing::info!("Batch size: {}", config.batch_size);
    tracing::info!("Validate timeout: {}s", config.validate_timeout_secs);
    tracing::info!("Cache TTL: {}s", config.cache_ttl_secs);
    tracing::info!("Fetch timeout: {}s", config.fetch_timeout_secs);
    tracing::info!(
        "Score overrides: {}",
        config
            .score_config
            .as_ref()
            .map_or_else(|| "<none>".to_string(), |p| p.display().to_string())
    );
    tracing::info!("====================");

    let app = build_app(AppState::new(picker));
    let listener = TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
