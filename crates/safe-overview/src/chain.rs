//! Chain identifiers and the per-chain switch between gateway API versions.

use {
    anyhow::{Context, Result, ensure},
    reqwest::{Client, Url},
    serde::{Deserialize, Serialize},
    std::{
        collections::HashSet,
        fmt::{self, Display, Formatter},
        str::FromStr,
    },
};

/// Decimal chain id as used by the gateway, e.g. `"1"` or `"11155111"`.
///
/// Compared as an exact string.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChainId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChainId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ensure!(
            !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()),
            "invalid chain id {s:?}"
        );
        Ok(Self(s.to_owned()))
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Decides which gateway API version serves the overviews of a chain.
///
/// Implementations answer from configuration that is already loaded. The
/// lookup happens synchronously for every request.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
pub trait ChainCapabilities: Send + Sync {
    /// Whether overviews of Safes on this chain come from API version 2.
    fn has_v2(&self, chain_id: &ChainId) -> bool;
}

/// A fixed set of chains that are served by API version 2.
#[derive(Clone, Debug, Default)]
pub struct StaticChainCapabilities {
    v2_chains: HashSet<ChainId>,
}

impl StaticChainCapabilities {
    pub fn new(v2_chains: impl IntoIterator<Item = ChainId>) -> Self {
        Self {
            v2_chains: v2_chains.into_iter().collect(),
        }
    }

    /// Adds the chains of `other`.
    pub fn extend(&mut self, other: Self) {
        self.v2_chains.extend(other.v2_chains);
    }

    pub fn v2_chains(&self) -> impl Iterator<Item = &ChainId> {
        self.v2_chains.iter()
    }
}

impl ChainCapabilities for StaticChainCapabilities {
    fn has_v2(&self, chain_id: &ChainId) -> bool {
        self.v2_chains.contains(chain_id)
    }
}

#[derive(Debug, Deserialize)]
struct ChainPage {
    next: Option<Url>,
    results: Vec<ChainConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainConfig {
    chain_id: ChainId,
    #[serde(default)]
    features: Vec<String>,
}

/// Loads the chain configurations from the gateway and collects every chain
/// that has `feature` enabled.
///
/// Follows the `next` links until all pages are read.
pub async fn load_chain_capabilities(
    client: &Client,
    gateway_url: &Url,
    feature: &str,
) -> Result<StaticChainCapabilities> {
    let mut url = Some(gateway_url.join("v1/chains").context("chains url")?);
    let mut capabilities = StaticChainCapabilities::default();
    while let Some(page_url) = url {
        tracing::debug!(url = %page_url, "loading chain configs");
        let page: ChainPage = client
            .get(page_url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("fetching chain configs from {page_url}"))?
            .json()
            .await
            .context("decoding chain configs")?;
        capabilities.extend(chains_with_feature(page.results, feature));
        url = page.next;
    }
    tracing::info!(
        v2_chains = ?capabilities.v2_chains().collect::<Vec<_>>(),
        %feature,
        "loaded chain capabilities"
    );
    Ok(capabilities)
}

fn chains_with_feature(configs: Vec<ChainConfig>, feature: &str) -> StaticChainCapabilities {
    StaticChainCapabilities::new(
        configs
            .into_iter()
            .filter(|config| config.features.iter().any(|f| f == feature))
            .map(|config| config.chain_id),
    )
}
