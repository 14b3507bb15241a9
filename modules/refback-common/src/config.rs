use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Canonical base URL of the site whose posts receive refbacks.
    pub site_url: String,
    pub bind_addr: String,
    /// Rewrite every normalized URL to https, regardless of what the
    /// referer claimed.
    pub force_ssl: bool,
    pub fetch_timeout_secs: u64,
    pub fetch_user_agent: String,
    /// Capacity of the queue between the request-time capture and the
    /// deferred worker. Signals arriving while it is full are dropped.
    pub queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            site_url: required_env("REFBACK_SITE_URL"),
            bind_addr: env::var("REFBACK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            force_ssl: env::var("REFBACK_FORCE_SSL")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            fetch_timeout_secs: env::var("REFBACK_FETCH_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .expect("REFBACK_FETCH_TIMEOUT_SECS must be a number"),
            fetch_user_agent: env::var("REFBACK_USER_AGENT")
                .unwrap_or_else(|_| format!("refback/{}", env!("CARGO_PKG_VERSION"))),
            queue_capacity: env::var("REFBACK_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .expect("REFBACK_QUEUE_CAPACITY must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
