//! Safe client gateway implementation of [`OverviewSource`].
//!
//! Both API versions expose the same query shape:
//! `GET /{version}/safes?currency=usd&safes=1:0x..,137:0x..&trusted=false&exclude_spam=true`

use {
    crate::{
        model::{OverviewParams, SafeOverview, SafeRef},
        source::{ApiVersion, OverviewSource, SourceError},
    },
    anyhow::{Context, Result},
    reqwest::{Client, IntoUrl, Url},
    serde_json::Value,
};

/// Gateway client bound to one API version.
#[derive(Clone, Debug)]
pub struct GatewayOverviewSource {
    client: Client,
    base_url: Url,
    version: ApiVersion,
}

impl GatewayOverviewSource {
    pub const DEFAULT_URL: &'static str = "https://safe-client.safe.global/";

    pub fn new(base_url: impl IntoUrl, version: ApiVersion, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: base_url.into_url().context("gateway url")?,
            version,
        })
    }

    fn format_url(&self, safes: &[SafeRef], params: &OverviewParams) -> Url {
        let mut url = self
            .base_url
            .join(&format!("{}/safes", self.version))
            .expect("unexpectedly invalid URL segment");
        // Duplicates are sent as they are.
        let safes = safes
            .iter()
            .map(SafeRef::to_string)
            .collect::<Vec<_>>()
            .join(",");
        url.query_pairs_mut()
            .append_pair("currency", &params.currency)
            .append_pair("safes", &safes)
            .append_pair("trusted", "false")
            .append_pair("exclude_spam", "true");
        if let Some(wallet) = params.wallet_address {
            url.query_pairs_mut()
                .append_pair("wallet_address", &format!("{wallet:#x}"));
        }
        url
    }
}

#[async_trait::async_trait]
impl OverviewSource for GatewayOverviewSource {
    async fn fetch(
        &self,
        safes: &[SafeRef],
        params: &OverviewParams,
    ) -> Result<Vec<SafeOverview>, SourceError> {
        let url = self.format_url(safes, params);
        tracing::debug!(version = %self.version, %url, "querying gateway");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(SourceError::Send)?;
        let status = response.status();
        let body = response.text().await.map_err(SourceError::Send)?;
        tracing::trace!(version = %self.version, %status, %body, "gateway response");

        if !status.is_success() {
            return Err(SourceError::Status { status, body });
        }
        decode_overviews(self.version, body)
    }
}

/// Decodes the response record by record. A record that cannot be decoded is
/// dropped on its own, its Safe then counts as unknown to the gateway.
fn decode_overviews(version: ApiVersion, body: String) -> Result<Vec<SafeOverview>, SourceError> {
    let records: Vec<Value> = match serde_json::from_str(&body) {
        Ok(records) => records,
        Err(source) => return Err(SourceError::Deserialize { source, body }),
    };
    Ok(records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record.clone()) {
            Ok(overview) => Some(overview),
            Err(err) => {
                tracing::warn!(?err, %version, %record, "skipping undecodable overview");
                None
            }
        })
        .collect())
}
