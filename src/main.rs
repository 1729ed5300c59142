use std::net::SocketAddr;

use foodgram_backend::{
    config::Config,
    server::{filters::routes, state::AppState},
    MIGRATOR,
};
use log::{error, info};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    info!("Running migrations...");
    MIGRATOR.run(&pool).await?;

    let state = AppState::new(pool, &config)
        .map_err(|e| e.info.unwrap_or_else(|| "Could not build state".to_string()))?;

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Server running on {address}");
    warp::serve(routes(state)).run(address).await;

    Ok(())
}
