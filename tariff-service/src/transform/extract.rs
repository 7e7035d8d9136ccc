//! Day/night tariff extraction from the provider's published price page.
//!
//! Candidate records are the rows of every table on the page (one entry per
//! `td`/`th` cell). When no table row carries a tariff label the page is read
//! as one record per text line instead. A record belongs to the day or night
//! band when one of its cells contains the configured label (case-sensitive);
//! its value is the first `<number> <marker>` match inside the band's bounds.
//! Later records overwrite earlier ones.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::{node::Node, Html, Selector};
use serde::Deserialize;
use tariff_client::domain::{TariffKind, TariffSnapshot};
use time::OffsetDateTime;

use crate::{
    config::ExtractorConfig,
    pipeline::{Envelope, PipelineError, Transform},
    sources::ProviderPage,
};

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table tr").expect("static selector"));
static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td, th").expect("static selector"));

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "br", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "dt", "dd", "section",
    "article",
];

const RATE_DECIMALS: u32 = 6;

#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned HTTP {0}")]
    HttpStatus(u16),
    #[error("no {0} tariff found on provider page")]
    MissingTariff(TariffKind),
    #[error("cannot parse {kind} tariff value '{text}'")]
    InvalidNumber { kind: TariffKind, text: String },
    #[error("{kind} tariff is negative: {rate}")]
    NegativeRate { kind: TariffKind, rate: Decimal },
    #[error("{kind} tariff {base} overflows when VAT is applied")]
    Overflow { kind: TariffKind, base: Decimal },
    #[error("invalid extractor pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl ExtractionError {
    /// Transport and HTTP status failures; everything else is a parse failure.
    pub fn is_network(&self) -> bool {
        matches!(self, ExtractionError::Transport(_) | ExtractionError::HttpStatus(_))
    }
}

/// Energy unit the provider quotes prices in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyUnit {
    #[default]
    Kwh,
    Mwh,
}

impl EnergyUnit {
    fn to_per_kwh(self, value: Decimal) -> Decimal {
        match self {
            EnergyUnit::Kwh => value,
            EnergyUnit::Mwh => (value / Decimal::ONE_THOUSAND).normalize(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl Bounds {
    fn contains(&self, value: Decimal) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Pre-VAT rates in currency/kWh as read from the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseRates {
    pub day: Decimal,
    pub night: Decimal,
}

#[derive(Debug, Clone)]
pub struct TariffExtractor {
    day_label: String,
    night_label: String,
    value_pattern: Regex,
    unit: EnergyUnit,
    vat_multiplier: Decimal,
    day_bounds: Bounds,
    night_bounds: Bounds,
}

impl TariffExtractor {
    pub fn new(cfg: &ExtractorConfig) -> Result<Self, ExtractionError> {
        // A hyphen right after a digit separates a range; elsewhere it is a sign.
        let value_pattern = Regex::new(&format!(
            r"(?:^|[^\d,.])([-−]?\d+[,.]\d+)\s*{}",
            regex::escape(cfg.currency_marker.trim())
        ))?;

        Ok(Self {
            day_label: cfg.day_label.clone(),
            night_label: cfg.night_label.clone(),
            value_pattern,
            unit: cfg.source_unit,
            vat_multiplier: cfg.vat_multiplier,
            day_bounds: Bounds {
                min: cfg.day_min,
                max: cfg.day_max,
            },
            night_bounds: Bounds {
                min: cfg.night_min,
                max: cfg.night_max,
            },
        })
    }

    /// Locate both pre-VAT rates in `html`.
    pub fn extract_base_rates(&self, html: &str) -> Result<BaseRates, ExtractionError> {
        let records = self.candidate_records(html);
        tracing::debug!(records = records.len(), "scanning provider page");

        let mut day = None;
        let mut night = None;

        for cells in &records {
            let kind = match self.classify(cells) {
                Some(kind) => kind,
                None => continue,
            };

            let bounds = match kind {
                TariffKind::Day => &self.day_bounds,
                TariffKind::Night => &self.night_bounds,
            };

            if let Some(value) = self.find_value(kind, cells, bounds)? {
                tracing::debug!(%kind, %value, ?cells, "matched tariff row");
                match kind {
                    TariffKind::Day => day = Some(value),
                    TariffKind::Night => night = Some(value),
                }
            } else {
                tracing::debug!(%kind, ?cells, "tariff row without a value in range");
            }
        }

        Ok(BaseRates {
            day: day.ok_or(ExtractionError::MissingTariff(TariffKind::Day))?,
            night: night.ok_or(ExtractionError::MissingTariff(TariffKind::Night))?,
        })
    }

    /// Full extraction: base rates, VAT and rounding.
    pub fn extract(
        &self,
        page: &ProviderPage,
        fetched_at: OffsetDateTime,
    ) -> Result<TariffSnapshot, ExtractionError> {
        let base = self.extract_base_rates(&page.body)?;
        let day_rate = self.with_vat(TariffKind::Day, base.day)?;
        let night_rate = self.with_vat(TariffKind::Night, base.night)?;

        Ok(TariffSnapshot {
            day_rate,
            night_rate,
            day_base: base.day,
            night_base: base.night,
            vat_multiplier: self.vat_multiplier,
            source_url: page.url.clone(),
            fetched_at,
        })
    }

    fn with_vat(&self, kind: TariffKind, base: Decimal) -> Result<Decimal, ExtractionError> {
        let rate = base
            .checked_mul(self.vat_multiplier)
            .ok_or(ExtractionError::Overflow { kind, base })?
            .round_dp(RATE_DECIMALS)
            .normalize();
        if rate < Decimal::ZERO {
            return Err(ExtractionError::NegativeRate { kind, rate });
        }
        Ok(rate)
    }

    fn classify(&self, cells: &[String]) -> Option<TariffKind> {
        let has = |label: &str| {
            !label.is_empty() && cells.iter().any(|c| c.contains(label))
        };

        if has(&self.day_label) {
            Some(TariffKind::Day)
        } else if has(&self.night_label) {
            Some(TariffKind::Night)
        } else {
            None
        }
    }

    fn find_value(
        &self,
        kind: TariffKind,
        cells: &[String],
        bounds: &Bounds,
    ) -> Result<Option<Decimal>, ExtractionError> {
        for cell in cells {
            let Some(caps) = self.value_pattern.captures(cell) else {
                continue;
            };
            let text = &caps[1];
            let value = Decimal::from_str(&text.replace(',', ".").replace('−', "-"))
                .map_err(|_| ExtractionError::InvalidNumber {
                    kind,
                    text: text.to_string(),
                })?;
            let value = self.unit.to_per_kwh(value);

            if bounds.contains(value) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Table rows, or text lines when no row carries a tariff label.
    fn candidate_records(&self, html: &str) -> Vec<Vec<String>> {
        let document = Html::parse_document(html);

        let rows = table_rows(&document);
        if rows.iter().any(|cells| self.classify(cells).is_some()) {
            rows
        } else {
            text_lines(&document)
        }
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn table_rows(document: &Html) -> Vec<Vec<String>> {
    document
        .select(&ROW_SELECTOR)
        .map(|row| {
            row.select(&CELL_SELECTOR)
                .map(|cell| normalize_whitespace(&cell.text().collect::<Vec<_>>().join(" ")))
                .collect()
        })
        .filter(|cells: &Vec<String>| !cells.is_empty())
        .collect()
}

fn text_lines(document: &Html) -> Vec<Vec<String>> {
    let mut text = String::new();

    for node in document.root_element().descendants() {
        match node.value() {
            Node::Element(el) if BLOCK_ELEMENTS.contains(&el.name()) => text.push('\n'),
            Node::Text(t) => {
                let hidden = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|el| el.name()))
                    .map_or(false, |name| matches!(name, "script" | "style"));
                if !hidden {
                    text.push_str(t);
                }
            }
            _ => {}
        }
    }

    text.lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .map(|line| vec![line])
        .collect()
}

#[async_trait::async_trait]
impl Transform<ProviderPage, TariffSnapshot> for TariffExtractor {
    async fn apply(
        &self,
        input: Envelope<ProviderPage>,
    ) -> Result<Envelope<TariffSnapshot>, PipelineError> {
        let fetched_at = OffsetDateTime::from(input.received_at);
        match self.extract(&input.payload, fetched_at) {
            Ok(snapshot) => {
                tracing::info!(
                    day_rate = %snapshot.day_rate,
                    night_rate = %snapshot.night_rate,
                    "extracted tariffs"
                );
                Ok(Envelope {
                    payload: snapshot,
                    received_at: input.received_at,
                })
            }
            Err(e) => {
                metrics::counter!("tariff_extract_failed_total").increment(1);
                Err(e.into())
            }
        }
    }
}
