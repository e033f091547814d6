use shared::world::DEFAULT_MAX_ENTITIES;
use std::time::Duration;

/// Client session settings, filled in by the launcher.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. `127.0.0.1:8080`
    pub server_addr: String,
    /// Display name requested on join
    pub name: String,
    pub tick_duration: Duration,
    /// Heartbeat period; must stay well under the server's timeout
    pub ping_interval: Duration,
    /// Silence from the server longer than this ends the session
    pub server_timeout: Duration,
    pub max_entities: usize,
    pub low_graphics: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".to_string(),
            name: "Player".to_string(),
            tick_duration: Duration::from_millis(50),
            ping_interval: Duration::from_secs(1),
            server_timeout: Duration::from_secs(5),
            max_entities: DEFAULT_MAX_ENTITIES,
            low_graphics: false,
        }
    }
}
