use anyhow::{Context, Result, bail};
use clap::Parser;
use token_processor::models::Token;
use token_processor::redis::RedisClient;

/// Look up a token snapshot in the Redis cache.
#[derive(Debug, Parser)]
#[command(name = "token-query", version)]
struct Args {
    /// Token mint address.
    public_key: String,

    /// Print every series as of this unix time instead of the whole snapshot.
    #[arg(long)]
    at: Option<i64>,

    /// Defaults to $REDIS_URL, then redis://127.0.0.1:6379.
    #[arg(long)]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let args = Args::parse();
    let redis_url = args
        .redis_url
        .or_else(|| std::env::var("REDIS_URL").ok())
        .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string());

    let redis = RedisClient::new(&redis_url).await?;
    let Some(token) = redis.get::<Token>(&args.public_key).await? else {
        bail!("Token data not found: {}", args.public_key);
    };

    let output = match args.at {
        Some(at) => serde_json::to_string_pretty(&token.as_of(at)),
        None => serde_json::to_string_pretty(&token),
    }
    .context("Failed to render token")?;

    println!("{output}");
    Ok(())
}
