use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use take2_portal::{ApiClient, FileStore, PortalConfig, Role, SessionManager, ViewRouter};

/// Take2 Studio portal session tool.
#[derive(Parser)]
#[command(name = "take2", version, about)]
struct Cli {
    /// Backend origin (overrides TAKE2_BACKEND_URL)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Session file (overrides TAKE2_SESSION_FILE)
    #[arg(long, global = true)]
    session_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and persist the session
    Login {
        /// Sign in to the agency dashboard instead of the client portal
        #[arg(long)]
        admin: bool,
        email: String,
        password: String,
    },
    /// Forget the persisted session
    Logout,
    /// Show the current session
    Whoami,
    /// Show which view a path resolves to for the current session
    Route { path: String },
    /// Populate the backend's demo data (best-effort)
    Seed,
    /// Create a client account
    Register {
        name: String,
        email: String,
        password: String,
    },
    /// GET an API path with the session's credential and print the JSON
    Get { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    let config = PortalConfig::from_lookup(|name| match name {
        "TAKE2_BACKEND_URL" => cli.backend.clone().or_else(|| std::env::var(name).ok()),
        "TAKE2_SESSION_FILE" => cli
            .session_file
            .clone()
            .or_else(|| std::env::var(name).ok()),
        _ => std::env::var(name).ok(),
    })?;

    let store = FileStore::open(config.session_file())
        .with_context(|| format!("opening {}", config.session_file().display()))?;
    let manager = SessionManager::new(ApiClient::new(config.api().clone()), store);

    match cli.command {
        Command::Login {
            admin,
            email,
            password,
        } => {
            let role = if admin { Role::Admin } else { Role::Client };
            if !manager.login(&email, &password, role).await {
                bail!("invalid email or password");
            }
            let session = manager.snapshot();
            let name = session.profile().map_or("unknown", |p| p.display_name());
            println!("Signed in as {name} ({role})");
        }
        Command::Logout => {
            manager.logout();
            println!("Signed out");
        }
        Command::Whoami => {
            manager.initialize().await;
            let session = manager.snapshot();
            match (session.role(), session.profile()) {
                (Some(role), Some(profile)) if session.is_authenticated() => {
                    println!("{role}: {}", profile.display_name());
                    println!("{}", serde_json::to_string_pretty(profile)?);
                }
                _ => println!("Not signed in"),
            }
        }
        Command::Route { path } => {
            manager.initialize().await;
            let router = ViewRouter::new(manager.subscribe(), path);
            println!("{}", router.current());
        }
        Command::Seed => {
            manager.seed_demo_data().await;
            println!("Seed requested");
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let profile = manager.register(&name, &email, &password).await?;
            println!("Registered {}", profile.display_name());
        }
        Command::Get { path } => {
            manager.initialize().await;
            if !manager.snapshot().is_authenticated() {
                bail!("not signed in");
            }
            let value: serde_json::Value = manager.api().get_json(&path).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}
