use clap::Parser;
use fourcut::config::{ModelConfig, setup_logging};
use fourcut::render::font::{FontSources, load_font};
use tracing::{error, info, warn};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = fourcut::cli::CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    let model = match ModelConfig::from_cli(&cli) {
        Ok(model) => model,
        Err(err) => {
            error!("Invalid API base URL {:?}: {}", cli.openai_base_url, err);
            return;
        }
    };
    if model.api_key.is_none() {
        warn!("No server API key configured, users will be asked for their own");
    }
    info!(
        "Using text model {} and image model {} at {}",
        model.text_model, model.image_model, model.base_url
    );

    let http = reqwest::Client::new();
    let font = load_font(
        &FontSources {
            configured: cli.font_path.clone(),
            allow_download: !cli.no_font_download,
            ..Default::default()
        },
        &http,
    )
    .await;

    let state = fourcut::web::AppState::new(model, http, font);
    if let Err(err) = fourcut::web::setup_server(&cli.listen_address, cli.port, state).await {
        error!("Application error: {}", err);
    }
}
