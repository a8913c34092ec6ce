//! Configuration for Sideline
//!
//! CLI arguments and environment variable handling using clap, plus the
//! runtime [`DashboardConfig`] the controller is built from.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

use crate::aggregator::AggregatorConfig;
use crate::bus::TopicBinding;
use crate::types::SubjectId;

/// Record categories whose changes affect a player's dashboard
pub const DEFAULT_CORE_TOPICS: [&str; 5] = [
    "raw-activity",
    "wellness-checkins",
    "objectives",
    "performance-records",
    "attendance",
];

/// Topic keyed by the player's team, bound once the team is known
pub const SCHEDULE_TOPIC: &str = "schedule";

/// Column core topics are filtered on
pub const SUBJECT_FILTER_COLUMN: &str = "player_id";

/// Column group topics are filtered on
pub const GROUP_FILTER_COLUMN: &str = "team_id";

/// Upper bound accepted for the coalescing window
pub const MAX_COALESCE_WINDOW_MS: u64 = 5_000;

/// Sideline - live player dashboard core
#[derive(Parser, Debug, Clone)]
#[command(name = "sideline")]
#[command(about = "Keeps a player dashboard snapshot live from change notifications")]
pub struct Args {
    /// Unique identifier for this instance (used in bus client names)
    #[arg(long, env = "INSTANCE_ID", default_value_t = Uuid::new_v4())]
    pub instance_id: Uuid,

    /// Address the consumer HTTP surface listens on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8090")]
    pub listen: SocketAddr,

    /// Aggregation endpoint returning one player's dashboard snapshot
    #[arg(
        long,
        env = "AGGREGATOR_URL",
        default_value = "http://localhost:54321/functions/v1/player-dashboard"
    )]
    pub aggregator_url: String,

    /// API key sent as bearer token and `apikey` header (optional)
    #[arg(long, env = "AGGREGATOR_API_KEY")]
    pub aggregator_api_key: Option<String>,

    /// Aggregator request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "15000")]
    pub request_timeout_ms: u64,

    /// Window in milliseconds that collapses a burst of change events into one refetch
    #[arg(long, env = "COALESCE_WINDOW_MS", default_value = "25")]
    pub coalesce_window_ms: u64,

    /// Player to activate at startup (optional; can be set later over HTTP)
    #[arg(long, env = "PLAYER_ID")]
    pub player_id: Option<String>,

    /// Override the core topic list (comma-separated)
    #[arg(long, env = "CORE_TOPICS", value_delimiter = ',')]
    pub core_topics: Vec<String>,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// Enable development mode (in-memory bus when NATS is unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

/// NATS connection configuration
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,

    /// Prefix of change subjects: `{prefix}.{topic}.{column}.{value}`
    #[arg(long, env = "BUS_SUBJECT_PREFIX", default_value = "changes")]
    pub subject_prefix: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if self.coalesce_window_ms > MAX_COALESCE_WINDOW_MS {
            return Err(format!(
                "COALESCE_WINDOW_MS must be at most {} ms",
                MAX_COALESCE_WINDOW_MS
            ));
        }

        if self.nats.subject_prefix.trim().is_empty() {
            return Err("BUS_SUBJECT_PREFIX must not be empty".to_string());
        }

        match reqwest::Url::parse(&self.aggregator_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(format!(
                    "AGGREGATOR_URL must be http(s), got scheme '{}'",
                    url.scheme()
                ))
            }
            Err(e) => return Err(format!("AGGREGATOR_URL is invalid: {}", e)),
        }

        if let Some(ref player) = self.player_id {
            SubjectId::new(player).map_err(|e| e.to_string())?;
        }

        Ok(())
    }

    /// Initial subject, if one was configured
    pub fn initial_subject(&self) -> Option<SubjectId> {
        self.player_id
            .as_deref()
            .and_then(|p| SubjectId::new(p).ok())
    }

    /// Aggregator client settings
    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            url: self.aggregator_url.clone(),
            api_key: self.aggregator_api_key.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

/// One change topic and the column its events are filtered on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub filter_column: String,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, filter_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter_column: filter_column.into(),
        }
    }

    /// Bind the topic to a concrete filter value
    pub fn bind(&self, value: &str) -> TopicBinding {
        TopicBinding::new(&self.name, &self.filter_column, value)
    }
}

/// Runtime configuration of the dashboard controller
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Burst window for coalescing change events into one refetch
    pub coalesce_window: Duration,
    /// Topics filtered on the subject, opened on activation
    pub core_topics: Vec<TopicSpec>,
    /// Topics filtered on the subject's group, bound after the first snapshot reveals it
    pub group_topics: Vec<TopicSpec>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            coalesce_window: Duration::from_millis(25),
            core_topics: DEFAULT_CORE_TOPICS
                .iter()
                .map(|t| TopicSpec::new(*t, SUBJECT_FILTER_COLUMN))
                .collect(),
            group_topics: vec![TopicSpec::new(SCHEDULE_TOPIC, GROUP_FILTER_COLUMN)],
        }
    }
}

impl DashboardConfig {
    /// Runtime config from parsed arguments
    pub fn from_args(args: &Args) -> Self {
        let mut config = Self {
            coalesce_window: Duration::from_millis(args.coalesce_window_ms),
            ..Default::default()
        };

        let overrides: Vec<TopicSpec> = args
            .core_topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| TopicSpec::new(t, SUBJECT_FILTER_COLUMN))
            .collect();
        if !overrides.is_empty() {
            config.core_topics = overrides;
        }

        config
    }

    /// Core topic bindings for one subject
    pub fn core_bindings(&self, subject: &SubjectId) -> Vec<TopicBinding> {
        self.core_topics
            .iter()
            .map(|t| t.bind(subject.as_str()))
            .collect()
    }

    /// Group topic bindings for one group id
    pub fn group_bindings(&self, group_id: &str) -> Vec<TopicBinding> {
        self.group_topics.iter().map(|t| t.bind(group_id)).collect()
    }
}
