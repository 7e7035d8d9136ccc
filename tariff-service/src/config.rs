use rust_decimal::Decimal;
use serde::Deserialize;
use std::{fs, io::ErrorKind, time::Duration};
use tariff_client::domain::{SensorDescriptor, TariffKind};

use crate::transform::extract::EnergyUnit;

pub const DEFAULT_PROVIDER_URL: &str =
    "https://electrohold.bg/bg/sales/domakinstva/snabdyavane-po-regulirani-ceni/";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub refresh_interval_secs: u64,
    pub user_agent: String,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PROVIDER_URL.to_string(),
            timeout_secs: 10,
            refresh_interval_secs: 24 * 60 * 60,
            user_agent: concat!("tariff-service/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// How tariff rows are recognised on the provider page.
///
/// Bounds are compared against the per-kWh value before VAT.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub day_label: String,
    pub night_label: String,
    pub currency_marker: String,
    pub source_unit: EnergyUnit,
    pub vat_multiplier: Decimal,
    pub day_min: Option<Decimal>,
    pub day_max: Option<Decimal>,
    pub night_min: Option<Decimal>,
    pub night_max: Option<Decimal>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            day_label: "Дневна".to_string(),
            night_label: "Нощна".to_string(),
            currency_marker: "€".to_string(),
            source_unit: EnergyUnit::Kwh,
            // 20% VAT; the provider lists prices without it.
            vat_multiplier: Decimal::new(12, 1),
            day_min: Some(Decimal::new(1, 1)),
            day_max: None,
            night_min: Some(Decimal::new(5, 2)),
            night_max: Some(Decimal::new(1, 1)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub entity_prefix: String,
    pub name_prefix: String,
    pub unit: String,
}

impl SensorsConfig {
    pub fn descriptors(&self) -> Vec<SensorDescriptor> {
        TariffKind::ALL
            .into_iter()
            .map(|kind| SensorDescriptor::new(kind, &self.entity_prefix, &self.name_prefix, &self.unit))
            .collect()
    }
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            entity_prefix: "sensor.electrohold_tariff".to_string(),
            name_prefix: "Electrohold Tariff".to_string(),
            unit: "EUR/kWh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HomeAssistantConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    pub home_assistant: Option<HomeAssistantConfig>,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Reads `TARIFF_CONFIG` (default `tariff-config.toml`); a missing file
    /// means built-in defaults.
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("TARIFF_CONFIG").unwrap_or_else(|_| "tariff-config.toml".to_string());
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path, "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(anyhow::anyhow!("failed to read {path}: {e}")),
        };
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.provider.refresh_interval_secs == 0 {
            anyhow::bail!("provider.refresh_interval_secs must be greater than zero");
        }
        if self.provider.timeout_secs == 0 {
            anyhow::bail!("provider.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}
