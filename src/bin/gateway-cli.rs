use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde_json::Value;
use url::Url;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the query gateway admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long)]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// Inspect answer cache occupancy
    Cache,
    /// Inspect rate limiter key store and ceilings
    Limiter,
    /// Drop every cached answer for a tenant
    Invalidate {
        /// Tenant whose documents changed
        tenant: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let (method, segments) = match &cli.command {
        Commands::Status => (Method::GET, vec!["admin", "status"]),
        Commands::Cache => (Method::GET, vec!["admin", "cache"]),
        Commands::Limiter => (Method::GET, vec!["admin", "limiter"]),
        Commands::Invalidate { tenant } => (
            Method::POST,
            vec!["admin", "tenants", tenant.as_str(), "invalidate"],
        ),
    };

    // Segments are percent-encoded, so tenant ids may contain '/' or spaces.
    let mut endpoint = Url::parse(&cli.url)?;
    endpoint
        .path_segments_mut()
        .map_err(|_| "admin URL cannot be used as a base")?
        .pop_if_empty()
        .extend(segments);

    let res = client
        .request(method, endpoint)
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Err(format!("admin API returned status {status}").into());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
