/// Server configuration - all tunables of the dispatch node
///
/// # Environment variables
///
/// Every field can be overridden through the environment:
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | Runtime environment |
/// | MERGE_RADIUS_KM | 2.0 | Max pairwise distance between grouped delivery addresses |
/// | MERGE_WINDOW_SECS | 600 | Max order-time spread inside a group |
/// | FORMATION_DEADLINE_SECS | 180 | How long a forming group waits for more members |
/// | MAX_GROUP_SIZE | 4 | Member cap per group |
/// | RESTAURANT_PROXIMITY_KM | 0.5 | How close two restaurants must be to co-group |
/// | PARTNER_SEARCH_RADIUS_KM | 5.0 | Partner lookup radius around the drop-off centroid |
/// | OFFER_TIMEOUT_SECS | 45 | How long a partner may sit on an offer |
/// | OFFER_RETRY_BUDGET | 3 | Offer attempts before a dispatch is abandoned |
/// | SWEEP_INTERVAL_SECS | 5 | Period of the deadline/solo/stale sweeps |
/// | DIRECTORY_STALENESS_SECS | 10 | Tolerated age of directory snapshots |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | Graceful shutdown budget (milliseconds) |
///
/// # Example
///
/// ```ignore
/// MERGE_RADIUS_KM=1.5 HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API port
    pub http_port: u16,
    /// Runtime environment: development | staging | production
    pub environment: String,

    // === Consolidation tunables ===
    /// Max pairwise distance between grouped delivery addresses (km)
    pub merge_radius_km: f64,
    /// Max order-time spread inside a group (seconds)
    pub merge_window_secs: u64,
    /// How long a forming group stays open to joiners (seconds)
    pub formation_deadline_secs: u64,
    /// Member cap per group
    pub max_group_size: usize,
    /// How close two restaurants must be for their orders to co-group (km)
    pub restaurant_proximity_km: f64,

    // === Assignment tunables ===
    /// Partner lookup radius around the drop-off centroid (km)
    pub partner_search_radius_km: f64,
    /// How long a partner may sit on an offer (seconds)
    pub offer_timeout_secs: u64,
    /// Offer attempts before a dispatch is abandoned
    pub offer_retry_budget: u32,

    // === Housekeeping ===
    /// Period of the deadline/solo/stale sweeps (seconds)
    pub sweep_interval_secs: u64,
    /// Tolerated age of directory snapshots (seconds); availability is
    /// re-checked at offer time, not at query time
    pub directory_staleness_secs: u64,
    /// Graceful shutdown budget (milliseconds)
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            http_port: env_parse("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            merge_radius_km: env_parse("MERGE_RADIUS_KM", 2.0),
            merge_window_secs: env_parse("MERGE_WINDOW_SECS", 600),
            formation_deadline_secs: env_parse("FORMATION_DEADLINE_SECS", 180),
            max_group_size: env_parse("MAX_GROUP_SIZE", 4),
            restaurant_proximity_km: env_parse("RESTAURANT_PROXIMITY_KM", 0.5),
            partner_search_radius_km: env_parse("PARTNER_SEARCH_RADIUS_KM", 5.0),
            offer_timeout_secs: env_parse("OFFER_TIMEOUT_SECS", 45),
            offer_retry_budget: env_parse("OFFER_RETRY_BUDGET", 3),
            sweep_interval_secs: env_parse("SWEEP_INTERVAL_SECS", 5),
            directory_staleness_secs: env_parse("DIRECTORY_STALENESS_SECS", 10),
            shutdown_timeout_ms: env_parse("SHUTDOWN_TIMEOUT_MS", 10_000),
        }
    }

    /// Deterministic configuration with short timeouts for tests
    pub fn for_tests() -> Self {
        Self {
            http_port: 0,
            environment: "test".into(),
            merge_radius_km: 2.0,
            merge_window_secs: 600,
            formation_deadline_secs: 180,
            max_group_size: 4,
            restaurant_proximity_km: 0.5,
            partner_search_radius_km: 5.0,
            offer_timeout_secs: 45,
            offer_retry_budget: 3,
            sweep_interval_secs: 1,
            directory_staleness_secs: 3600,
            shutdown_timeout_ms: 1_000,
        }
    }

    pub fn merge_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.merge_window_secs as i64)
    }

    pub fn formation_deadline(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.formation_deadline_secs as i64)
    }

    pub fn offer_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.offer_timeout_secs as i64)
    }

    pub fn offer_timeout_std(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.offer_timeout_secs)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
