use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use tenant_gateway::auth::UserIdentity;
use tenant_gateway::config::{load_config, load_from_env};
use tenant_gateway::observability::{logging, metrics};
use tenant_gateway::storage::KeyValueStore;
use tenant_gateway::{ApiResponse, Gateway, RequestOptions};

/// The library keeps the user identity in memory only; the CLI persists it
/// next to the token so separate invocations share one session.
const KEY_CLI_USER: &str = "cli.user";

#[derive(Parser)]
#[command(name = "tenant-cli")]
#[command(about = "Command-line client for a multi-tenant backend", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults plus environment overrides when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// State file holding the session, base URL and tenant cache.
    #[arg(short, long, default_value = ".tenant-gateway.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show resolver state and the session
    Status,
    /// Resolve the backend address
    Resolve {
        /// Re-probe every candidate, ignoring backoff
        #[arg(long)]
        force: bool,
    },
    /// Send a request and print the response
    Get { path: String },
    /// Send a JSON body with POST
    Post { path: String, body: String },
    /// Store a session token
    Login {
        token: String,
        user_id: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Drop the stored session
    Logout,
    /// Refresh and list the user's organizations
    Orgs,
    /// Select an organization
    Select { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };
    if config.storage.path.is_none() {
        config.storage.path = Some(cli.state.display().to_string());
    }

    logging::init(&config.observability.log_level);
    metrics::init();

    let gateway = Gateway::from_config(&config)?;
    if gateway.session.token().is_some() {
        let user = gateway
            .store
            .get(KEY_CLI_USER)
            .and_then(|raw| serde_json::from_str::<UserIdentity>(&raw).ok());
        gateway.session.set_user(user);
    }

    match cli.command {
        Commands::Status => {
            let user = gateway.session.user();
            print_json(&json!({
                "resolver": gateway.resolver.state(),
                "authenticated": gateway.session.is_authenticated(),
                "user": user.as_deref(),
            }))?;
        }
        Commands::Resolve { force } => {
            let address = gateway.resolver.resolve(force).await;
            print_json(&json!({
                "address": address,
                "backend_down": gateway.resolver.is_backend_down(),
                "backoff_remaining_ms": gateway.resolver.backoff_remaining().as_millis() as u64,
            }))?;
        }
        Commands::Get { path } => {
            let response = gateway.client.get(&path).await;
            print_response(&response)?;
        }
        Commands::Post { path, body } => {
            let body: Value = serde_json::from_str(&body)?;
            let response = gateway
                .client
                .request(&path, RequestOptions::method(reqwest::Method::POST).json(&body)?)
                .await;
            print_response(&response)?;
        }
        Commands::Login { token, user_id, email } => {
            let user = UserIdentity {
                id: user_id,
                email,
            };
            gateway.store.set(KEY_CLI_USER, &serde_json::to_string(&user)?)?;
            gateway.session.login(token, user);
            print_json(&json!({ "authenticated": true }))?;
        }
        Commands::Logout => {
            gateway.session.logout();
            gateway.store.remove(KEY_CLI_USER)?;
            gateway.directory.clear();
            print_json(&json!({ "authenticated": false }))?;
        }
        Commands::Orgs => {
            gateway.directory.start().await?;
            print_directory(&gateway)?;
        }
        Commands::Select { id } => {
            gateway.directory.start().await?;
            gateway.directory.select_tenant(&id);
            print_directory(&gateway)?;
        }
    }

    Ok(())
}

fn print_directory(gateway: &Gateway) -> Result<(), Box<dyn std::error::Error>> {
    let state = gateway.directory.snapshot();
    print_json(&json!({
        "tenants": state.tenants.as_ref(),
        "selected": state.selected.as_ref().map(|t| &t.id),
        "error": state.error.as_ref().map(ToString::to_string),
        "fresh": gateway.directory.is_fresh(),
    }))
}

fn print_response(response: &ApiResponse) -> Result<(), Box<dyn std::error::Error>> {
    if !response.is_success() {
        eprintln!("Error: backend returned status {}", response.status);
    }
    let body = response.json::<Value>().unwrap_or_else(|_| Value::String(response.text()));
    print_json(&json!({
        "status": response.status.as_u16(),
        "body": body,
    }))
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
