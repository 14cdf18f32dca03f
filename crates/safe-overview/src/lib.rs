//! Batched fetching of Safe overviews from the client gateway.
//!
//! Independent callers request the overview of a single Safe. Requests that
//! arrive within one batching window are coalesced into at most one gateway
//! call per API version and every caller is answered from the merged result.

pub mod arguments;
pub mod chain;
pub mod dispatcher;
pub mod gateway_api;
pub mod http_client;
pub mod model;
pub mod queue;
pub mod service;
pub mod source;

pub use {
    chain::{ChainCapabilities, ChainId, StaticChainCapabilities},
    model::{AddressInfo, OverviewParams, SafeOverview, SafeRef},
    service::{OverviewError, OverviewResult, OverviewService},
    source::{ApiVersion, OverviewSource, SourceError},
};
