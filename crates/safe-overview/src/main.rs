use {
    anyhow::{Context, Result},
    clap::Parser,
    safe_overview::{
        ApiVersion,
        OverviewParams,
        OverviewService,
        StaticChainCapabilities,
        arguments::Arguments,
        chain::load_chain_capabilities,
        gateway_api::GatewayOverviewSource,
        http_client::HttpClientFactory,
    },
    std::sync::Arc,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();
    observe::tracing::initialize(
        &args.logging.log_filter,
        args.logging.log_stderr_threshold,
        args.logging.use_json_logs,
    );
    observe::metrics::setup_registry(Some("safe_overview".to_owned()));
    tracing::info!("running safe-overview with validated arguments:\n{}", args);
    let result = run(args).await;
    tracing::debug!(
        "metrics:\n{}",
        observe::metrics::encode(observe::metrics::get_registry())
    );
    result
}

async fn run(args: Arguments) -> Result<()> {
    let client = HttpClientFactory::new(&args.http_client)
        .create()
        .context("creating http client")?;

    let mut capabilities = StaticChainCapabilities::new(args.v2_chain_ids.iter().cloned());
    if let Some(feature) = &args.v2_chain_feature {
        capabilities.extend(load_chain_capabilities(&client, &args.gateway_url, feature).await?);
    }

    let v1 = GatewayOverviewSource::new(args.gateway_url.clone(), ApiVersion::V1, client.clone())?;
    let v2 = GatewayOverviewSource::new(args.gateway_url.clone(), ApiVersion::V2, client)?;
    let service = OverviewService::new(
        args.service_config(),
        Arc::new(capabilities),
        Arc::new(v1),
        Arc::new(v2),
    );

    let params = OverviewParams {
        currency: args.currency.clone(),
        wallet_address: args.wallet_address,
    };
    let output = match args.safes.as_slice() {
        [safe] => {
            let overview = service
                .get_one(safe.clone(), params)
                .await
                .with_context(|| format!("fetching overview of {safe}"))?;
            if overview.is_none() {
                tracing::warn!(%safe, "gateway does not know this Safe");
            }
            serde_json::to_string_pretty(&overview)?
        }
        safes => {
            let overviews = service.get_many(safes, params).await;
            tracing::info!(
                requested = safes.len(),
                received = overviews.len(),
                "fetched overviews"
            );
            serde_json::to_string_pretty(&overviews)?
        }
    };
    println!("{output}");
    Ok(())
}
