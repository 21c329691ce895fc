use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the route gateway admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:9180")]
    url: String,

    /// Admin API key; omit when the admin API has no key configured.
    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage routes
    Routes {
        #[command(subcommand)]
        action: RouteAction,
    },
    /// Inspect or clear the script log
    Logs {
        #[command(subcommand)]
        action: LogAction,
    },
    /// Show version, store revision and per-worker revisions
    Status,
}

#[derive(Subcommand)]
enum RouteAction {
    /// List all routes
    List,
    /// Show one route
    Get { id: String },
    /// Create or replace a route from a JSON file
    Put {
        id: String,
        /// JSON route definition
        #[arg(short, long)]
        file: PathBuf,
        /// Wait until every worker serves the new revision
        #[arg(long)]
        settle: bool,
    },
    /// Delete a route
    Delete { id: String },
}

#[derive(Subcommand)]
enum LogAction {
    /// Print captured script log lines
    Show,
    /// Clear the script log
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = format!("{}/apisix/admin", cli.url.trim_end_matches('/'));

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let request = match cli.command {
        Commands::Routes { action } => match action {
            RouteAction::List => client.get(format!("{}/routes", base)),
            RouteAction::Get { id } => client.get(format!("{}/routes/{}", base, id)),
            RouteAction::Put { id, file, settle } => {
                let body = std::fs::read_to_string(&file)?;
                // Fail early on malformed JSON instead of sending it.
                serde_json::from_str::<Value>(&body)?;
                client
                    .put(format!("{}/routes/{}", base, id))
                    .query(&[("settle", settle)])
                    .header(CONTENT_TYPE, "application/json")
                    .body(body)
            }
            RouteAction::Delete { id } => client.delete(format!("{}/routes/{}", base, id)),
        },
        Commands::Logs { action } => match action {
            LogAction::Show => {
                let res = client
                    .get(format!("{}/logs", base))
                    .query(&[("format", "text")])
                    .headers(headers)
                    .send()
                    .await?;
                return print_text(res).await;
            }
            LogAction::Clear => client.delete(format!("{}/logs", base)),
        },
        Commands::Status => client.get(format!("{}/status", base)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }
    print!("{}", text);
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
