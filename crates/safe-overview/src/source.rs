use {
    crate::model::{OverviewParams, SafeOverview, SafeRef},
    reqwest::StatusCode,
    std::fmt::{self, Display, Formatter},
    thiserror::Error,
};

/// The gateway API version that serves the overviews of a Safe.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    pub fn from_has_v2(has_v2: bool) -> Self {
        if has_v2 { Self::V2 } else { Self::V1 }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl Display for ApiVersion {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetches the overviews of many Safes in a single request.
///
/// Safes the upstream does not know about are simply missing from the
/// returned list. The list may contain the requested Safes in any order.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait OverviewSource: Send + Sync {
    async fn fetch(
        &self,
        safes: &[SafeRef],
        params: &OverviewParams,
    ) -> Result<Vec<SafeOverview>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    /// Connectivity problem or timeout.
    #[error("failed to send request")]
    Send(#[source] reqwest::Error),

    #[error("status {status} with body {body:?}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode response {body:?}")]
    Deserialize {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}
