//! taskladder server binary

use anyhow::Context;
use axum::http::HeaderValue;
use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use taskladder::auth::AuthConfig;
use taskladder::config::Config;
use taskladder::models::{NewUser, Role};
use taskladder::store::Store;
use taskladder::AppState;

#[derive(Parser)]
#[command(name = "taskladder")]
#[command(about = "Taskladder server - hierarchy-scoped task assignment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP and WebSocket server (default)
    Serve,

    /// Mint an access token for an existing user
    Token {
        #[arg(short, long)]
        user: Uuid,
    },

    /// Create a super admin and print its token
    SuperAdmin {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        /// Login password; omit to create a token-only account
        #[arg(short, long, env = "SUPER_ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskladder=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let store = Store::new(pool);
    store.migrate().await?;

    let auth = AuthConfig::new(&config.jwt_secret, config.jwt_expiry_hours)
        .with_hash_cost(config.bcrypt_cost);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, store, auth).await,
        Commands::Token { user } => {
            let user = store.get_user(user).await?;
            println!("{}", auth.issue(&user)?);
            Ok(())
        }
        Commands::SuperAdmin {
            name,
            email,
            password,
        } => {
            let password_hash = match password {
                Some(password) => Some(auth.hash_password(&password).await?),
                None => None,
            };
            let user = store
                .create_user(NewUser {
                    name,
                    email,
                    role: Role::SuperAdmin,
                    company_id: None,
                    hierarchy_level_id: None,
                    reports_to: None,
                    password_hash,
                })
                .await?;
            tracing::info!(user_id = %user.id, "super admin created");
            println!("{}", auth.issue(&user)?);
            Ok(())
        }
    }
}

async fn serve(config: Config, store: Store, auth: AuthConfig) -> anyhow::Result<()> {
    let state = AppState::new(store, auth, config.day_boundary);

    let cors = match &config.frontend_url {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .context("FRONTEND_URL is not a valid origin")?,
            )
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    };

    let app = taskladder::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
