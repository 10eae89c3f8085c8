use crate::boards::Secret;
use crate::grades::GradeScale;
use crate::humanize::HumanDuration;
use crate::logbook::RecordPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub moon: MoonSettings,
    #[serde(default)]
    pub aurora: AuroraSettings,
    #[serde(default)]
    pub output: OutputSettings,
    /// Board password (loaded from environment, never from the config file)
    #[serde(skip)]
    pub password: Option<Secret>,
}

/// HTTP client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(60)
}

fn default_user_agent() -> String {
    concat!("boardlog/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Per-step retry policy for authentication and page fetches
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles on every further attempt
    #[serde(default = "default_backoff")]
    pub backoff: HumanDuration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> HumanDuration {
    HumanDuration::from_secs(1)
}

/// Moon backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoonSettings {
    #[serde(default = "default_moon_api_url")]
    pub api_url: String,
    #[serde(default = "default_moon_client_id")]
    pub client_id: String,
    #[serde(default = "default_moon_page_size")]
    pub page_size: u32,
}

impl Default for MoonSettings {
    fn default() -> Self {
        Self {
            api_url: default_moon_api_url(),
            client_id: default_moon_client_id(),
            page_size: default_moon_page_size(),
        }
    }
}

fn default_moon_api_url() -> String {
    "https://restapimoonboard.ems-x.com".to_string()
}

fn default_moon_client_id() -> String {
    "com.moonclimbing.mb".to_string()
}

fn default_moon_page_size() -> u32 {
    40
}

/// Aurora backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuroraSettings {
    /// Base URL template; `{host_base}` is replaced by the board's host base
    #[serde(default = "default_aurora_url_template")]
    pub url_template: String,
    /// Additional deployments (board identifier -> host base)
    #[serde(default)]
    pub host_bases: BTreeMap<String, String>,
}

impl Default for AuroraSettings {
    fn default() -> Self {
        Self {
            url_template: default_aurora_url_template(),
            host_bases: BTreeMap::new(),
        }
    }
}

fn default_aurora_url_template() -> String {
    "https://{host_base}.com".to_string()
}

/// Output defaults (CLI flags take precedence)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub grade_scale: GradeScale,
    #[serde(default = "default_headers")]
    pub headers: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Applies to unrecognized grades and malformed backend records
    #[serde(default, alias = "on_unrecognized_grade")]
    pub on_invalid_record: RecordPolicy,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            grade_scale: GradeScale::default(),
            headers: default_headers(),
            delimiter: default_delimiter(),
            on_invalid_record: RecordPolicy::default(),
        }
    }
}

fn default_headers() -> bool {
    true
}

fn default_delimiter() -> char {
    ','
}
