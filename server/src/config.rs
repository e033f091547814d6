use shared::world::DEFAULT_MAX_ENTITIES;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the server needs to start. Built from the command line by the
/// launcher binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on, e.g. `127.0.0.1:8080`; port 0 picks a free port
    pub bind_addr: String,
    /// Fixed simulation step
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub max_entities: usize,
    /// Silence after which a connection is treated as lost
    pub heartbeat_timeout: Duration,
    /// Directory holding save files
    pub save_dir: PathBuf,
    /// Save slot name inside `save_dir`
    pub save_location: String,
    /// Ignore and delete any existing save on startup
    pub clean_save: bool,
    /// Seed the fixed test layout instead of a random world
    pub test_map: bool,
    /// Seed for random world generation
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_duration: Duration::from_millis(50),
            max_clients: 32,
            max_entities: DEFAULT_MAX_ENTITIES,
            heartbeat_timeout: Duration::from_secs(5),
            save_dir: PathBuf::from("saves"),
            save_location: "world".to_string(),
            clean_save: false,
            test_map: false,
            seed: None,
        }
    }
}
