use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP listen address
    pub addr: String,
    /// Append-only file, created on first start
    pub aof_path: PathBuf,
    /// How often the AOF is forced to disk
    pub flush_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:6379".to_string(),
            aof_path: PathBuf::from("appendonly.aof"),
            flush_interval: Duration::from_secs(1),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    pub fn aof_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.aof_path = path.into();
        self
    }

    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
