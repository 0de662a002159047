use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Shared registration secret. `None` disables the pin gate.
    pub pin: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("CAUSEWAY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            pin: env::var("CAUSEWAY_PIN").ok().filter(|p| !p.is_empty()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            pin: None,
        }
    }
}
