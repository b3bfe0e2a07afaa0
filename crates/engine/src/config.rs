use std::time::Duration;

/// Longest wait between two cycles when no command asked for an immediate turn
pub const DEFAULT_SELECT_TIMEOUT: Duration = Duration::from_secs(1);

pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 5;

/// Largest request body a connection accepts
pub const DEFAULT_MAX_REQUEST_SIZE: u64 = 2 * 1024 * 1024;

/// Settings of an [`Engine`](crate::Engine).
///
/// ```
/// use std::time::Duration;
/// use rpc_engine::EngineConfig;
///
/// let config = EngineConfig::builder().select_timeout(Duration::from_millis(100)).keep_running(false).build();
/// assert_eq!(config.max_concurrent_downloads(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    select_timeout: Duration,
    keep_running: bool,
    max_concurrent_downloads: usize,
    max_request_size: u64,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    pub fn select_timeout(&self) -> Duration {
        self.select_timeout
    }

    /// While set, the engine never reports all downloads as finished.
    pub fn keep_running(&self) -> bool {
        self.keep_running
    }

    pub fn max_concurrent_downloads(&self) -> usize {
        self.max_concurrent_downloads
    }

    pub fn max_request_size(&self) -> u64 {
        self.max_request_size
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug)]
pub struct EngineConfigBuilder {
    select_timeout: Duration,
    keep_running: bool,
    max_concurrent_downloads: usize,
    max_request_size: u64,
}

impl EngineConfigBuilder {
    fn new() -> Self {
        Self {
            select_timeout: DEFAULT_SELECT_TIMEOUT,
            keep_running: true,
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
        }
    }

    pub fn select_timeout(mut self, select_timeout: Duration) -> Self {
        self.select_timeout = select_timeout;
        self
    }

    pub fn keep_running(mut self, keep_running: bool) -> Self {
        self.keep_running = keep_running;
        self
    }

    /// Values below one are raised to one.
    pub fn max_concurrent_downloads(mut self, max_concurrent_downloads: usize) -> Self {
        self.max_concurrent_downloads = max_concurrent_downloads.max(1);
        self
    }

    pub fn max_request_size(mut self, max_request_size: u64) -> Self {
        self.max_request_size = max_request_size;
        self
    }

    pub fn build(self) -> EngineConfig {
        EngineConfig {
            select_timeout: self.select_timeout,
            keep_running: self.keep_running,
            max_concurrent_downloads: self.max_concurrent_downloads,
            max_request_size: self.max_request_size,
        }
    }
}
