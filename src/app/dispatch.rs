use crate::cli::commands::{Cli, Commands};
use anyhow::{Context, Result};
use storygap::Config;
use storygap::error::ExerciseError;
use storygap::story::{Exercise, StoryGapPipeline, StoryGapRequest};
use tracing::info;

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Serve { port, host } => {
            let mut config = config;
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if config.gateway.port == 0 {
                info!("Starting story gap gateway on {} (random port)", config.gateway.host);
            } else {
                info!(
                    "Starting story gap gateway on {}:{}",
                    config.gateway.host, config.gateway.port
                );
            }
            storygap::gateway::run_gateway(&config).await
        }

        Commands::Generate { difficulty, words } => {
            match run_generate(&config, &difficulty, words).await {
                Ok(exercise) => {
                    let json = serde_json::to_string_pretty(&exercise)
                        .context("serialize exercise")?;
                    println!("{json}");
                    Ok(())
                }
                Err(err) => {
                    let json = serde_json::to_string_pretty(&err.to_json())
                        .context("serialize error payload")?;
                    println!("{json}");
                    std::process::exit(1);
                }
            }
        }

        Commands::Config => {
            let rendered = toml::to_string_pretty(&config.redacted())
                .context("serialize effective config")?;
            println!("# {}", config.config_path.display());
            print!("{rendered}");
            Ok(())
        }
    }
}

/// CLI words go through the same normalizer as gateway payloads.
async fn run_generate(
    config: &Config,
    difficulty: &str,
    words: Vec<String>,
) -> Result<Exercise, ExerciseError> {
    let payload = serde_json::json!({ "wordSet": words, "difficulty": difficulty });
    let request = StoryGapRequest::from_payload(&payload)?;
    info!(
        words = request.words.len(),
        difficulty = %request.difficulty,
        "generating story gap exercise"
    );
    StoryGapPipeline::from_config(config).run(&request).await
}
