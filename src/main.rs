use capgw::{
    config::CliArgs,
    logging::{init_logging, LoggingConfig},
    server,
};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(&LoggingConfig {
        level: args.log_level.clone(),
        json_format: args.log_json,
    })?;

    let config = args.to_gateway_config().await?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        max_slots = config.registry.max_slots,
        include_default_in_unfiltered = config.registry.include_default_in_unfiltered,
        "Starting capability gateway"
    );

    server::startup(config).await
}
