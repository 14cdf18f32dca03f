//! Command line arguments of the `safe-overview` binary.

use {
    crate::{chain::ChainId, http_client, model::SafeRef, service::Configuration},
    alloy_primitives::Address,
    std::{
        fmt::{self, Display, Formatter},
        time::Duration,
    },
    tracing::level_filters::LevelFilter,
    url::Url,
};

#[derive(clap::Parser)]
pub struct LoggingArguments {
    #[clap(long, env, default_value = "warn,safe_overview=debug")]
    pub log_filter: String,

    #[clap(long, env, default_value = "error")]
    pub log_stderr_threshold: LevelFilter,

    /// Emit log lines as JSON objects.
    #[clap(long, env)]
    pub use_json_logs: bool,
}

impl Display for LoggingArguments {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let Self {
            log_filter,
            log_stderr_threshold,
            use_json_logs,
        } = self;

        writeln!(f, "log_filter: {log_filter}")?;
        writeln!(f, "log_stderr_threshold: {log_stderr_threshold}")?;
        writeln!(f, "use_json_logs: {use_json_logs}")?;
        Ok(())
    }
}

#[derive(clap::Parser)]
#[clap(about = "Fetches Safe overviews from the client gateway in batches")]
pub struct Arguments {
    #[clap(flatten)]
    pub http_client: http_client::Arguments,

    #[clap(flatten)]
    pub logging: LoggingArguments,

    /// Base URL of the Safe client gateway.
    #[clap(long, env, default_value = "https://safe-client.safe.global/")]
    pub gateway_url: Url,

    /// How long requests are collected after the first one arrived before
    /// they are sent to the gateway together.
    #[clap(
        long,
        env,
        default_value = "300ms",
        value_parser = humantime::parse_duration,
    )]
    pub batch_delay: Duration,

    /// Chains whose overviews are served by API version 2.
    #[clap(long, env, use_value_delimiter = true)]
    pub v2_chain_ids: Vec<ChainId>,

    /// Gateway chain feature that enables API version 2. When set, the chain
    /// configurations are loaded from the gateway on startup and every chain
    /// with this feature is added to `--v2-chain-ids`.
    #[clap(long, env)]
    pub v2_chain_feature: Option<String>,

    /// Fiat currency the balances are reported in.
    #[clap(long, env, default_value = "usd")]
    pub currency: String,

    /// The connected wallet, used to count transactions awaiting its
    /// confirmation.
    #[clap(long, env)]
    pub wallet_address: Option<Address>,

    /// Safes to fetch, as `<chainId>:<address>`.
    #[clap(required = true)]
    pub safes: Vec<SafeRef>,
}

impl Arguments {
    pub fn service_config(&self) -> Configuration {
        Configuration {
            batch_delay: self.batch_delay,
        }
    }
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let Self {
            http_client,
            logging,
            gateway_url,
            batch_delay,
            v2_chain_ids,
            v2_chain_feature,
            currency,
            wallet_address,
            safes,
        } = self;

        write!(f, "{http_client}")?;
        write!(f, "{logging}")?;
        writeln!(f, "gateway_url: {gateway_url}")?;
        writeln!(f, "batch_delay: {batch_delay:?}")?;
        writeln!(f, "v2_chain_ids: {v2_chain_ids:?}")?;
        writeln!(f, "v2_chain_feature: {v2_chain_feature:?}")?;
        writeln!(f, "currency: {currency}")?;
        writeln!(f, "wallet_address: {wallet_address:?}")?;
        writeln!(f, "safes: {}", safes.len())?;
        Ok(())
    }
}
