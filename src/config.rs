use std::{str::FromStr, sync::LazyLock, time::Duration};

pub struct LiveConfig {
    listen_addr: String,
    width: u32,
    height: u32,
    frame_rate: u32,
    duration_ms: i64,
    channel_capacity: usize,
    stall_timeout: Option<Duration>,
}

impl LiveConfig {
    /// Reads `WEBM_LIVE_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("WEBM_LIVE_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            width: env_or("WEBM_LIVE_WIDTH", 320),
            height: env_or("WEBM_LIVE_HEIGHT", 240),
            frame_rate: env_or("WEBM_LIVE_FPS", 30),
            duration_ms: env_or("WEBM_LIVE_DURATION_MS", 10_000),
            channel_capacity: env_or("WEBM_LIVE_CHANNEL_CAPACITY", 64),
            stall_timeout: std::env::var("WEBM_LIVE_STALL_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis),
        }
    }

    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Length of each streamed sweep, in ms.
    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            log::warn!("ignoring invalid {}={}", key, value);
            default
        }),
        Err(_) => default,
    }
}

pub fn config() -> &'static LiveConfig {
    static CONFIG: LazyLock<LiveConfig> = LazyLock::new(LiveConfig::from_env);
    &CONFIG
}
