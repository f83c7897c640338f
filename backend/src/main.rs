use std::sync::Arc;

use tokio::net::TcpListener;

use accounts_backend::{logging, routes, AppState, Config, JwksClient, SqliteDirectory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    logging::init(&config.logging.level);

    tracing::info!("Starting accounts API");

    // User directory
    let directory = SqliteDirectory::open(&config.database.url)?;
    directory.seed_roles(&config.roles.seed)?;
    let directory = Arc::new(directory);

    // Token verifier
    let verifier = match &config.oidc.jwks_uri {
        Some(jwks_uri) => {
            JwksClient::new(&config.oidc.issuer, config.oidc.audience.as_deref(), jwks_uri)?
        }
        None => JwksClient::discover(&config.oidc.issuer, config.oidc.audience.as_deref()).await?,
    };
    tracing::info!("Verifying tokens from {} with keys at {}", config.oidc.issuer, verifier.jwks_uri());

    let state = Arc::new(AppState::new(config.clone(), Arc::new(verifier), directory));

    if config.roles.verify_on_startup {
        let role = state.profiles.verify_default_role().map_err(|e| {
            tracing::error!("Startup check failed: {}", e);
            e
        })?;
        tracing::info!("Default role {} present (id {})", role.code, role.id);
    } else {
        tracing::warn!(
            "Skipping default role check; profile creation fails if role {} is missing",
            state.profiles.default_role()
        );
    }

    let app = routes::app(state);

    // Start server
    let addr = config.bind_addr();
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
