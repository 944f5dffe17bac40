use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScribeConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub generative: GenerativeConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub proactive: ProactiveConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// Settings for the generative text provider used by the planner and the
/// recommendation service. The API key itself is never stored in the file,
/// only the name of the environment variable holding it.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerativeConfig {
    pub enabled: bool,
    pub model: String,
    pub base_url: String,
    pub api_key_env: String,
    pub plan_temperature: f32,
    pub recommend_temperature: f32,
    /// Unset means no client-side timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            plan_temperature: 0.3,
            recommend_temperature: 0.7,
            request_timeout_secs: None,
        }
    }
}

impl GenerativeConfig {
    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RelayConfig {
    pub token_url: String,
    pub api_key_env: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            token_url: "https://api.assemblyai.com/v2/realtime/token".to_string(),
            api_key_env: "ASSEMBLYAI_API_KEY".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkflowConfig {
    pub default_dosage: String,
    pub default_duration: String,
    pub default_pharmacy: String,
    pub default_lab_facility: String,
    pub follow_up_days: i64,
    #[serde(default)]
    pub latency: ToolLatencyConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_dosage: "1-0-1".to_string(),
            default_duration: "5 days".to_string(),
            default_pharmacy: "Default Pharmacy".to_string(),
            default_lab_facility: "Quest".to_string(),
            follow_up_days: 7,
            latency: ToolLatencyConfig::default(),
        }
    }
}

/// Simulated latency of each mock clinical tool, in milliseconds.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ToolLatencyConfig {
    pub prescription_ms: u64,
    pub referral_ms: u64,
    pub lab_order_ms: u64,
    pub pharmacy_order_ms: u64,
    pub scheduling_ms: u64,
}

impl Default for ToolLatencyConfig {
    fn default() -> Self {
        Self {
            prescription_ms: 1500,
            referral_ms: 1800,
            lab_order_ms: 2000,
            pharmacy_order_ms: 1600,
            scheduling_ms: 1400,
        }
    }
}

impl ToolLatencyConfig {
    pub fn zero() -> Self {
        Self {
            prescription_ms: 0,
            referral_ms: 0,
            lab_order_ms: 0,
            pharmacy_order_ms: 0,
            scheduling_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProactiveConfig {
    pub default_patient_id: String,
}

impl Default for ProactiveConfig {
    fn default() -> Self {
        Self {
            default_patient_id: "patient_001".to_string(),
        }
    }
}

impl ScribeConfig {
    /// Load from a TOML file, then apply `SCRIBE__SECTION__KEY` overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("SCRIBE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        s.try_deserialize()
    }
}
