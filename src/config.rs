use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of VAST documents fetched while following wrappers.
pub const DEFAULT_MAX_WRAPPER_HOPS: usize = 5;

/// Timeout applied to each VAST fetch.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_USER_AGENT: &str = concat!("vast-chain/", env!("CARGO_PKG_VERSION"));

/// Settings for [`VastChainResolver`](crate::resolver::VastChainResolver).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Fetches allowed per resolution. A chain that needs one more fails
    /// without performing it.
    pub max_wrapper_hops: usize,

    pub request_timeout: Duration,

    /// Budget for the whole walk. Checked before every hop and used to
    /// shorten the per-request timeout of the last hops.
    pub overall_deadline: Option<Duration>,

    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_wrapper_hops: DEFAULT_MAX_WRAPPER_HOPS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            overall_deadline: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn with_max_wrapper_hops(mut self, hops: usize) -> Self {
        self.max_wrapper_hops = hops;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = Some(deadline);
        self
    }
}
