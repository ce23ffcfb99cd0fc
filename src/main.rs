use std::{error::Error, net::SocketAddr, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};
use tokio::signal;

use foodgram::{actions::ingredients::load_ingredients, api::routes::routes, Config, State};

#[derive(Parser, Debug)]
#[command(name = "foodgram", version, about = "Recipe sharing API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Import `name,measurement_unit` rows into the ingredient catalog.
    LoadIngredients { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    info!("Connecting to database...");
    let state = State::new(config).await?;
    sqlx::migrate!("./migrations").run(&state.pool).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::LoadIngredients { path } => {
            let csv = tokio::fs::read_to_string(&path).await?;
            let inserted = load_ingredients(&csv, &state.pool).await?;
            info!("Loaded {inserted} new ingredients from {}", path.display());
            Ok(())
        }
    }
}

async fn serve(state: Arc<State>) -> Result<(), Box<dyn Error>> {
    tokio::fs::create_dir_all(&state.config.media_root).await?;

    let address = SocketAddr::new(state.config.host, state.config.port);
    let (bound, server) =
        warp::serve(routes(state)).try_bind_with_graceful_shutdown(address, shutdown_signal())?;

    info!("Server running on {bound}");
    server.await;

    info!("Server shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
