use crate::adapters::http::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::core::editor::DEFAULT_DEBOUNCE;
use crate::utils::error::{EnhancerError, Result};
use crate::utils::validation::{
    validate_at_least, validate_non_empty_string, validate_path, validate_range, validate_url,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "data-smith.toml";
pub const DEFAULT_OUTPUT_PATH: &str = "./results";
pub const MAX_DEBOUNCE_MS: u64 = 10_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub editor: EditorConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_OUTPUT_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 覆寫預設的日誌過濾等級，例如 "debug"
    pub level: Option<String>,
    pub json: bool,
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EnhancerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案不存在時使用預設值
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!("Loading configuration from {}", path.display());
            Self::from_file(path)
        } else {
            tracing::debug!("No configuration file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EnhancerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_BASE_URL})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EnhancerError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_seconds)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.editor.debounce_ms)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_url("service.base_url", &self.service.base_url)?;
        validate_at_least("service.timeout_seconds", self.service.timeout_seconds, 1)?;
        validate_range("editor.debounce_ms", self.editor.debounce_ms, 0, MAX_DEBOUNCE_MS)?;
        validate_path("output.path", &self.output.path)?;

        if let Some(level) = &self.logging.level {
            validate_non_empty_string("logging.level", level)?;
        }

        Ok(())
    }
}
