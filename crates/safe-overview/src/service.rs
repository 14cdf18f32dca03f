//! The entry point for everything that needs Safe overviews.

use {
    crate::{
        chain::ChainCapabilities,
        dispatcher::BatchDispatcher,
        model::{OverviewParams, SafeOverview, SafeRef},
        queue::{QueueItem, RequestQueue},
        source::{ApiVersion, OverviewSource},
    },
    futures::future,
    std::{future::Future, sync::Arc, time::Duration},
    thiserror::Error,
    tokio::sync::oneshot,
};

/// `Ok(None)` means the gateway answered but does not know the Safe.
pub type OverviewResult = Result<Option<SafeOverview>, OverviewError>;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OverviewError {
    /// The gateway request of the batch the Safe was part of failed. The cause
    /// is logged when it happens.
    #[error("could not fetch overview")]
    Fetch,

    #[error("overview request was dropped before it was answered")]
    Dropped,
}

/// Overview service configuration.
#[derive(Clone, Debug)]
pub struct Configuration {
    /// How long to collect requests after the first one arrived before
    /// sending them to the gateway.
    pub batch_delay: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_millis(300),
        }
    }
}

/// Fetches Safe overviews, transparently batching requests that arrive close
/// together.
///
/// Each service owns its own queue, so independent instances never share a
/// batch.
#[derive(Clone)]
pub struct OverviewService {
    queue: Arc<RequestQueue>,
    capabilities: Arc<dyn ChainCapabilities>,
}

impl OverviewService {
    pub fn new(
        config: Configuration,
        capabilities: Arc<dyn ChainCapabilities>,
        v1: Arc<dyn OverviewSource>,
        v2: Arc<dyn OverviewSource>,
    ) -> Self {
        let dispatcher = Arc::new(BatchDispatcher::new(v1, v2));
        Self {
            queue: RequestQueue::new(config.batch_delay, dispatcher),
            capabilities,
        }
    }

    /// Requests the overview of a single Safe.
    ///
    /// The request is queued right away, not when the returned future is first
    /// polled. Dropping the future does not cancel the request.
    pub fn get_one(
        &self,
        safe: SafeRef,
        params: OverviewParams,
    ) -> impl Future<Output = OverviewResult> + Send + use<> {
        let response = self.request(safe, params);
        async move { response.await.unwrap_or(Err(OverviewError::Dropped)) }
    }

    /// Requests the overviews of many Safes, possibly on different chains.
    ///
    /// Resolves to the overviews that could be fetched. Safes whose batch
    /// failed or that the gateway does not know are left out, so the result
    /// can be shorter than the input.
    pub fn get_many(
        &self,
        safes: &[SafeRef],
        params: OverviewParams,
    ) -> impl Future<Output = Vec<SafeOverview>> + Send + use<> {
        let responses = safes
            .iter()
            .map(|safe| self.request(safe.clone(), params.clone()))
            .collect::<Vec<_>>();
        async move {
            if responses.is_empty() {
                return Vec::new();
            }
            future::join_all(responses)
                .await
                .into_iter()
                .filter_map(|response| match response {
                    Ok(Ok(overview)) => overview,
                    Ok(Err(_)) | Err(_) => None,
                })
                .collect()
        }
    }

    fn request(
        &self,
        safe: SafeRef,
        params: OverviewParams,
    ) -> oneshot::Receiver<OverviewResult> {
        let version = ApiVersion::from_has_v2(self.capabilities.has_v2(&safe.chain_id));
        let (sender, receiver) = oneshot::channel();
        self.queue.enqueue(QueueItem {
            safe,
            params,
            version,
            sender,
        });
        receiver
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            chain::{ChainId, MockChainCapabilities, StaticChainCapabilities},
            source::{MockOverviewSource, SourceError},
        },
        alloy_primitives::{Address, address},
        maplit::hashset,
        serde_json::json,
        std::sync::Mutex,
    };

    const SAFE_A: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
    const SAFE_B: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    const SAFE_C: Address = address!("cccccccccccccccccccccccccccccccccccccccc");

    fn chain(id: u64) -> ChainId {
        ChainId::from(id)
    }

    fn safe(chain_id: u64, address: Address) -> SafeRef {
        SafeRef::new(chain(chain_id), address)
    }

    fn overview(safe: &SafeRef) -> SafeOverview {
        SafeOverview {
            address: safe.address.into(),
            chain_id: safe.chain_id.clone(),
            summary: json!({
                "threshold": 2,
                "owners": [
                    { "value": "0x0101010101010101010101010101010101010101" },
                    { "value": "0x0202020202020202020202020202020202020202" }
                ],
                "fiatTotal": "100.5",
                "queued": 1,
                "awaitingConfirmation": 1
            })
            .as_object()
            .cloned()
            .unwrap(),
        }
    }

    /// Source that knows every Safe it is asked for.
    fn echo_source() -> MockOverviewSource {
        let mut source = MockOverviewSource::new();
        source
            .expect_fetch()
            .returning(|safes, _| Ok(safes.iter().map(overview).collect()));
        source
    }

    fn failing_source() -> MockOverviewSource {
        let mut source = MockOverviewSource::new();
        source.expect_fetch().returning(|_, _| {
            Err(SourceError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: String::new(),
            })
        });
        source
    }

    fn v2_on(chains: &[u64]) -> Arc<dyn ChainCapabilities> {
        Arc::new(StaticChainCapabilities::new(chains.iter().copied().map(chain)))
    }

    fn service(
        capabilities: Arc<dyn ChainCapabilities>,
        v1: MockOverviewSource,
        v2: MockOverviewSource,
    ) -> OverviewService {
        OverviewService::new(
            Configuration::default(),
            capabilities,
            Arc::new(v1),
            Arc::new(v2),
        )
    }

    fn params() -> OverviewParams {
        OverviewParams::new("usd")
    }

    #[tokio::test(start_paused = true)]
    async fn batches_requests_of_one_window() {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let mut v1 = MockOverviewSource::new();
        v1.expect_fetch().times(1).returning({
            let requested = requested.clone();
            move |safes, params| {
                assert_eq!(params.currency, "usd");
                requested.lock().unwrap().extend_from_slice(safes);
                Ok(safes.iter().map(overview).collect())
            }
        });
        let mut v2 = MockOverviewSource::new();
        v2.expect_fetch().never();
        let service = service(v2_on(&[]), v1, v2);

        let a = service.get_one(safe(1, SAFE_A), params());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let b = service.get_one(safe(1, SAFE_B), params());
        let (a, b) = futures::join!(a, b);

        assert_eq!(a, Ok(Some(overview(&safe(1, SAFE_A)))));
        assert_eq!(b, Ok(Some(overview(&safe(1, SAFE_B)))));
        assert_eq!(
            *requested.lock().unwrap(),
            vec![safe(1, SAFE_A), safe(1, SAFE_B)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn routes_by_chain_capability() {
        let mut capabilities = MockChainCapabilities::new();
        capabilities
            .expect_has_v2()
            .returning(|chain_id| chain_id.as_str() == "137");

        let mut v1 = MockOverviewSource::new();
        v1.expect_fetch()
            .times(1)
            .withf(|safes, _| safes.to_vec() == vec![safe(1, SAFE_A), safe(10, SAFE_C)])
            .returning(|safes, _| Ok(safes.iter().map(overview).collect()));
        let mut v2 = MockOverviewSource::new();
        v2.expect_fetch()
            .times(1)
            .withf(|safes, _| safes.to_vec() == vec![safe(137, SAFE_B)])
            .returning(|safes, _| Ok(safes.iter().map(overview).collect()));
        let service = service(Arc::new(capabilities), v1, v2);

        let overviews = service
            .get_many(
                &[safe(1, SAFE_A), safe(137, SAFE_B), safe(10, SAFE_C)],
                params(),
            )
            .await;
        let found = overviews
            .iter()
            .map(SafeOverview::safe)
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(
            found,
            hashset! { safe(1, SAFE_A), safe(137, SAFE_B), safe(10, SAFE_C) }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn v1_failure_does_not_affect_v2() {
        let service = service(v2_on(&[137]), failing_source(), echo_source());

        let (v1, v2) = futures::join!(
            service.get_one(safe(1, SAFE_A), params()),
            service.get_one(safe(137, SAFE_B), params()),
        );
        assert_eq!(v1, Err(OverviewError::Fetch));
        assert_eq!(v2, Ok(Some(overview(&safe(137, SAFE_B)))));
    }

    #[tokio::test(start_paused = true)]
    async fn v2_failure_does_not_affect_v1() {
        let service = service(v2_on(&[137]), echo_source(), failing_source());

        let (v1, v2) = futures::join!(
            service.get_one(safe(1, SAFE_A), params()),
            service.get_one(safe(137, SAFE_B), params()),
        );
        assert_eq!(v1, Ok(Some(overview(&safe(1, SAFE_A)))));
        assert_eq!(v2, Err(OverviewError::Fetch));
    }

    #[tokio::test(start_paused = true)]
    async fn get_many_omits_failed_safes() {
        let service = service(v2_on(&[137]), echo_source(), failing_source());

        let overviews = service
            .get_many(&[safe(1, SAFE_A), safe(137, SAFE_B)], params())
            .await;
        assert_eq!(overviews, vec![overview(&safe(1, SAFE_A))]);
    }

    #[tokio::test(start_paused = true)]
    async fn record_of_another_chain_does_not_match() {
        let mut v1 = MockOverviewSource::new();
        // Upstream returns the address, but tagged with chain 10.
        v1.expect_fetch()
            .returning(|_, _| Ok(vec![overview(&safe(10, SAFE_A))]));
        let service = service(v2_on(&[]), v1, MockOverviewSource::new());

        assert_eq!(service.get_one(safe(1, SAFE_A), params()).await, Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn partial_results() {
        let mut v1 = MockOverviewSource::new();
        v1.expect_fetch().returning(|safes, _| {
            Ok(safes
                .iter()
                .filter(|safe| safe.address != SAFE_C)
                .map(overview)
                .collect())
        });
        let service = service(v2_on(&[]), v1, MockOverviewSource::new());

        let (many, missing) = futures::join!(
            service.get_many(
                &[safe(1, SAFE_A), safe(1, SAFE_B), safe(1, SAFE_C)],
                params()
            ),
            service.get_one(safe(1, SAFE_C), params()),
        );
        assert_eq!(many.len(), 2);
        assert!(many.iter().all(|overview| overview.address.value != SAFE_C));
        assert_eq!(missing, Ok(None));
    }

    #[tokio::test]
    async fn get_many_without_safes() {
        let mut v1 = MockOverviewSource::new();
        v1.expect_fetch().never();
        let mut v2 = MockOverviewSource::new();
        v2.expect_fetch().never();
        let service = service(v2_on(&[]), v1, v2);

        assert!(service.get_many(&[], params()).await.is_empty());
        assert_eq!(service.queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicates_are_passed_through() {
        let mut v1 = MockOverviewSource::new();
        v1.expect_fetch()
            .times(1)
            .withf(|safes, _| safes.to_vec() == vec![safe(1, SAFE_A), safe(1, SAFE_A)])
            .returning(|safes, _| Ok(vec![overview(&safes[0])]));
        let service = service(v2_on(&[]), v1, MockOverviewSource::new());

        let (first, second) = futures::join!(
            service.get_one(safe(1, SAFE_A), params()),
            service.get_one(safe(1, SAFE_A), params()),
        );
        assert_eq!(first, Ok(Some(overview(&safe(1, SAFE_A)))));
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_callers_do_not_cancel_the_batch() {
        let service = service(v2_on(&[]), echo_source(), MockOverviewSource::new());

        drop(service.get_one(safe(1, SAFE_A), params()));
        let kept = service.get_one(safe(1, SAFE_B), params());
        assert_eq!(service.queue.pending(), 2);

        assert_eq!(kept.await, Ok(Some(overview(&safe(1, SAFE_B)))));
    }

    #[tokio::test(start_paused = true)]
    async fn every_request_is_answered_once() {
        observe::tracing::initialize_reentrant("warn");
        let service = service(v2_on(&[137]), echo_source(), failing_source());

        let safes = (0..20u8)
            .map(|i| safe(if i % 2 == 0 { 1 } else { 137 }, Address::repeat_byte(i)))
            .collect::<Vec<_>>();
        let results = future::join_all(
            safes
                .iter()
                .map(|safe| service.get_one(safe.clone(), params())),
        )
        .await;

        assert_eq!(results.len(), safes.len());
        for (safe, result) in safes.iter().zip(results) {
            if safe.chain_id == chain(1) {
                assert_eq!(result, Ok(Some(overview(safe))));
            } else {
                assert_eq!(result, Err(OverviewError::Fetch));
            }
        }
    }
}
