use shopsight::{init, AppState, Config, Result};

use shopsight::core::download::ensure_assets;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env secrets before reading the configuration
    dotenv::dotenv().ok();

    // Initialize the application
    init()?;

    let config = Config::from_env()?;

    // One-shot download of the encoder checkpoint, catalog, and bank
    let download_client = reqwest::Client::new();
    ensure_assets(&download_client, &config.drive_dir).await?;

    // Initialize application state (loads the model and the bank)
    let addr = config.bind_addr;
    let state = AppState::initialize(config)?;

    // Build our application with routes
    let app = shopsight::create_router().with_state(state);

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
