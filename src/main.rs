use anyhow::{Context, Result};
use recipe_suggest::api_connection::OllamaClient;
use recipe_suggest::cli::{parse_args, read_reply_file, Command};
use recipe_suggest::logging::init_logging;
use recipe_suggest::recipe_generator::RecipeGenerator;
use recipe_suggest::recipe_parser::{extract_recipes_with, Extraction};
use recipe_suggest::recipe_request::GenerationRequest;
use recipe_suggest::server::{serve, AppState};
use tracing::{info, warn};

fn print_extraction(extraction: &Extraction) -> Result<()> {
    if extraction.dropped > 0 {
        warn!(dropped = extraction.dropped, "some recipes failed validation and were dropped");
    }
    let rendered = serde_json::to_string_pretty(&extraction.collection)
        .context("Failed to serialize recipes")?;
    println!("{}", rendered);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok(); // Load .env before clap reads env fallbacks

    let cli = parse_args();
    init_logging(cli.log_format)?;
    let config = cli.model.to_config();

    match cli.command {
        Command::Serve(args) => {
            info!(ollama_url = %config.base_url, model = %config.model, policy = ?cli.policy, "starting recipe server");
            let client = OllamaClient::new(config).context("Failed to build model client")?;
            let state = AppState::new(RecipeGenerator::new(client, cli.policy));
            serve(args.addr(), state).await
        }
        Command::Extract { reply_file } => {
            info!(path = %reply_file.display(), "extracting recipes from saved reply");
            let raw = read_reply_file(&reply_file).await?;
            let extraction = extract_recipes_with(&raw, cli.policy)
                .with_context(|| format!("Failed to extract recipes from '{}'", reply_file.display()))?;
            print_extraction(&extraction)
        }
        Command::Generate {
            ingredients,
            diet,
            allergies,
        } => {
            let request = GenerationRequest::new(&ingredients, &diet, &allergies)?;
            let client = OllamaClient::new(config).context("Failed to build model client")?;
            let generator = RecipeGenerator::new(client, cli.policy);
            let extraction = generator
                .generate(&request)
                .await
                .context("Recipe generation failed")?;
            print_extraction(&extraction)
        }
    }
}
