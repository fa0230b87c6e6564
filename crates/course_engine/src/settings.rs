use std::time::Duration;

/// Header carrying the API credential on every request.
pub const API_KEY_HEADER: &str = "X-OpenAI-API-Key";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    /// Applies to every request except the long-lived log stream.
    pub request_timeout: Duration,
    pub timings: Timings,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            timings: Timings::default(),
        }
    }
}

/// Schedules of the three collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub status_interval: Duration,
    pub files_interval: Duration,
    pub files_initial_delay: Duration,
    /// Gives the backend time to create the task's log queue.
    pub stream_start_delay: Duration,
    pub reconnect_delay: Duration,
    pub inactivity_threshold: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_millis(2000),
            files_interval: Duration::from_millis(3000),
            files_initial_delay: Duration::from_millis(1000),
            stream_start_delay: Duration::from_millis(500),
            reconnect_delay: Duration::from_millis(3000),
            inactivity_threshold: Duration::from_millis(10_000),
        }
    }
}
