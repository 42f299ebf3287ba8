use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use connect_auth::client::{ChannelBuilder, ConnectionString, SparkSession};
use connect_auth::config;
use connect_auth::middleware::CredentialInjector;
use connect_auth::models::BearerToken;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "connect_auth=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::Cli::parse();
    let cfg = config::load(config::Overrides {
        remote: args.remote,
        token: args.token,
    })?;

    let result = match args.command {
        Some(cli::Commands::Range { start, end, step }) => run_range(&cfg, start, end, step).await,
        Some(cli::Commands::Inspect) => inspect(&cfg),
        None => run_range(&cfg, 0, 5, 1).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_range(cfg: &config::Config, start: i64, end: i64, step: i64) -> anyhow::Result<()> {
    let token = BearerToken::new(cfg.token.clone()).context("invalid CONNECT_AUTH_TOKEN")?;

    let mut channel_builder = ChannelBuilder::new(&cfg.remote)
        .with_context(|| format!("invalid remote '{}'", cfg.remote))?;
    channel_builder.add_interceptor(CredentialInjector::new(token).with_trace_mode(cfg.trace_mode()));

    let spark = SparkSession::builder()
        .channel_builder(channel_builder)
        .get_or_create()
        .await?;

    let shown = spark.range_with(start, end, step).show().await;
    if let Some(tonic::Code::Unauthenticated | tonic::Code::PermissionDenied) =
        shown.as_ref().err().and_then(|e| e.code())
    {
        tracing::error!("server rejected the bearer token, check CONNECT_AUTH_TOKEN");
    }
    // Release the session even when the query failed, then report the first error.
    let stopped = spark.stop().await;
    shown.context("query failed")?;
    stopped.context("failed to stop session")?;
    Ok(())
}

fn inspect(cfg: &config::Config) -> anyhow::Result<()> {
    let connection = ConnectionString::parse(&cfg.remote)?;
    println!("{}", serde_json::to_string_pretty(&connection.summary())?);
    Ok(())
}
