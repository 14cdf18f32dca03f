//! Turns one drained batch into at most one gateway call per API version and
//! answers every queued request from the merged result.

use {
    crate::{
        model::{OverviewParams, SafeOverview, SafeRef},
        queue::QueueItem,
        service::OverviewError,
        source::{ApiVersion, OverviewSource, SourceError},
    },
    prometheus::{HistogramVec, IntCounterVec},
    std::sync::Arc,
    tracing::Instrument as _,
};

pub struct BatchDispatcher {
    v1: Arc<dyn OverviewSource>,
    v2: Arc<dyn OverviewSource>,
}

impl BatchDispatcher {
    pub fn new(v1: Arc<dyn OverviewSource>, v2: Arc<dyn OverviewSource>) -> Self {
        Self { v1, v2 }
    }

    fn source(&self, version: ApiVersion) -> &dyn OverviewSource {
        match version {
            ApiVersion::V1 => self.v1.as_ref(),
            ApiVersion::V2 => self.v2.as_ref(),
        }
    }

    /// Splits the batch by API version and fetches both partitions
    /// concurrently. Each partition answers its own items as soon as its
    /// request settles, independently of the other one.
    ///
    /// Both requests use the currency and wallet of the first item of the
    /// batch.
    pub async fn dispatch(self: &Arc<Self>, items: Vec<QueueItem>) {
        let Some(params) = shared_params(&items) else {
            return;
        };
        let (v2_items, v1_items): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|item| item.version == ApiVersion::V2);
        tracing::debug!(v1 = v1_items.len(), v2 = v2_items.len(), "dispatching overview batch");

        // Separate tasks so that not even a panicking source can take the
        // other partition down with it.
        let v1 = tokio::task::spawn(
            self.clone()
                .dispatch_partition(ApiVersion::V1, v1_items, params.clone())
                .in_current_span(),
        );
        let v2 = tokio::task::spawn(
            self.clone()
                .dispatch_partition(ApiVersion::V2, v2_items, params)
                .in_current_span(),
        );
        let (v1, v2) = futures::join!(v1, v2);
        for (version, result) in [(ApiVersion::V1, v1), (ApiVersion::V2, v2)] {
            if let Err(err) = result {
                tracing::error!(?err, %version, "overview partition task failed");
            }
        }
    }

    async fn dispatch_partition(
        self: Arc<Self>,
        version: ApiVersion,
        items: Vec<QueueItem>,
        params: OverviewParams,
    ) {
        if items.is_empty() {
            return;
        }
        let metrics = Metrics::get();
        metrics
            .overview_batches
            .with_label_values(&[version.as_str()])
            .inc();
        metrics
            .overview_batch_size
            .with_label_values(&[version.as_str()])
            .observe(items.len() as f64);

        let safes = items
            .iter()
            .map(|item| item.safe.clone())
            .collect::<Vec<_>>();
        let result = self.source(version).fetch(&safes, &params).await;
        distribute(version, items, result);
    }
}

/// All items of one batch share currency and wallet. Mixing them within one
/// window is not supported, the first item decides for both API versions.
fn shared_params(items: &[QueueItem]) -> Option<OverviewParams> {
    let params = items.first()?.params.clone();
    if items.iter().any(|item| item.params != params) {
        tracing::warn!(
            currency = %params.currency,
            wallet = ?params.wallet_address,
            "overview batch mixes request parameters, using those of the first request"
        );
    }
    Some(params)
}

fn distribute(
    version: ApiVersion,
    items: Vec<QueueItem>,
    result: Result<Vec<SafeOverview>, SourceError>,
) {
    let metrics = Metrics::get();
    match result {
        Ok(overviews) => {
            tracing::debug!(
                %version,
                requested = items.len(),
                received = overviews.len(),
                "received overview batch"
            );
            for item in items {
                let overview = find_overview(&overviews, &item.safe);
                let label = if overview.is_some() { "found" } else { "missing" };
                metrics
                    .overview_results
                    .with_label_values(&[version.as_str(), label])
                    .inc();
                // The caller might have stopped waiting.
                let _ = item.sender.send(Ok(overview));
            }
        }
        Err(err) => {
            tracing::error!(?err, %version, safes = items.len(), "failed to fetch overview batch");
            metrics
                .overview_results
                .with_label_values(&[version.as_str(), "failed"])
                .inc_by(items.len() as u64);
            for item in items {
                let _ = item.sender.send(Err(OverviewError::Fetch));
            }
        }
    }
}

/// A record for the same address on a different chain is a different Safe
/// and never matches.
fn find_overview(overviews: &[SafeOverview], safe: &SafeRef) -> Option<SafeOverview> {
    overviews
        .iter()
        .find(|overview| overview.is_for(safe))
        .cloned()
}

#[derive(prometheus_metric_storage::MetricStorage)]
struct Metrics {
    /// Number of gateway requests issued for overview batches.
    #[metric(labels("version"))]
    overview_batches: IntCounterVec,

    /// Number of Safes per gateway request.
    #[metric(labels("version"), buckets(1., 2., 5., 10., 20., 50., 100.))]
    overview_batch_size: HistogramVec,

    /// Outcome per requested Safe.
    #[metric(labels("version", "result"))]
    overview_results: IntCounterVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}
