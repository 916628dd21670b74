//! TOML configuration.
//!
//! Every section is optional; command-line flags override file values.

use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use radiotrace_core::{AnalysisParams, RadioProfile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub trace: TraceConfig,
    /// Radio model, tagged by `family`.
    pub radio: RadioProfile,
    pub analysis: AnalysisParams,
}

/// Trace-level settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Device addresses (inferred from the capture when empty)
    pub local_addresses: Vec<IpAddr>,
    /// Trace duration in seconds (defaults to the last packet)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Default configuration as TOML.
    pub fn generate_default() -> Result<String> {
        toml::to_string_pretty(&Config::default()).context("Failed to serialize default config")
    }

    pub fn validate(&self) -> Result<()> {
        self.radio.validate().context("invalid [radio] section")?;
        self.analysis
            .validate()
            .context("invalid [analysis] section")?;
        if let Some(duration) = self.trace.duration {
            if !duration.is_finite() || duration < 0.0 {
                anyhow::bail!("trace duration must be a non-negative number of seconds");
            }
        }
        Ok(())
    }
}
