//! Start-up configuration for the scheduler: stage-queue capacities and
//! entity-pool sizes.

use serde::Serialize;

use crate::errors::ConfigError;

/// Capacities of the four stage queues. All must be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelArgs {
    req_len: usize,
    resp_len: usize,
    item_len: usize,
    error_len: usize,
}

impl ChannelArgs {
    pub fn new(req_len: usize, resp_len: usize, item_len: usize, error_len: usize) -> Self {
        Self {
            req_len,
            resp_len,
            item_len,
            error_len,
        }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.req_len == 0 {
            return Err(ConfigError::ZeroChannelCapacity("req_len"));
        }
        if self.resp_len == 0 {
            return Err(ConfigError::ZeroChannelCapacity("resp_len"));
        }
        if self.item_len == 0 {
            return Err(ConfigError::ZeroChannelCapacity("item_len"));
        }
        if self.error_len == 0 {
            return Err(ConfigError::ZeroChannelCapacity("error_len"));
        }
        Ok(())
    }

    pub fn req_len(&self) -> usize {
        self.req_len
    }

    pub fn resp_len(&self) -> usize {
        self.resp_len
    }

    pub fn item_len(&self) -> usize {
        self.item_len
    }

    pub fn error_len(&self) -> usize {
        self.error_len
    }
}

impl Default for ChannelArgs {
    fn default() -> Self {
        Self::new(10, 10, 10, 10)
    }
}

impl std::fmt::Display for ChannelArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "req: {}, resp: {}, item: {}, error: {}",
            self.req_len, self.resp_len, self.item_len, self.error_len
        )
    }
}

/// Sizes of the downloader and analyzer pools. Both must be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolArgs {
    downloader_pool_size: u32,
    analyzer_pool_size: u32,
}

impl PoolArgs {
    pub fn new(downloader_pool_size: u32, analyzer_pool_size: u32) -> Self {
        Self {
            downloader_pool_size,
            analyzer_pool_size,
        }
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.downloader_pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize("downloader_pool_size"));
        }
        if self.analyzer_pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize("analyzer_pool_size"));
        }
        Ok(())
    }

    pub fn downloader_pool_size(&self) -> u32 {
        self.downloader_pool_size
    }

    pub fn analyzer_pool_size(&self) -> u32 {
        self.analyzer_pool_size
    }
}

impl Default for PoolArgs {
    fn default() -> Self {
        Self::new(
            num_cpus::get().max(4) as u32,
            num_cpus::get().clamp(2, 8) as u32,
        )
    }
}

impl std::fmt::Display for PoolArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "downloaders: {}, analyzers: {}",
            self.downloader_pool_size, self.analyzer_pool_size
        )
    }
}
