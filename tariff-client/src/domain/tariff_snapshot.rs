use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

/// Time-of-use band of a regulated household tariff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TariffKind {
    Day,
    Night,
}

impl TariffKind {
    pub const ALL: [TariffKind; 2] = [TariffKind::Day, TariffKind::Night];

    /// Suffix appended to the entity prefix, e.g. `sensor.electrohold_tariff_day_euro`.
    pub fn slug(self) -> &'static str {
        match self {
            TariffKind::Day => "day_euro",
            TariffKind::Night => "night_euro",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TariffKind::Day => "Day Euro",
            TariffKind::Night => "Night Euro",
        }
    }
}

impl fmt::Display for TariffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TariffKind::Day => f.write_str("day"),
            TariffKind::Night => f.write_str("night"),
        }
    }
}

/// One successfully extracted pair of rates.
///
/// Rates are currency/kWh with VAT included. `day_base`/`night_base` are the
/// pre-VAT figures read from the provider page after unit conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TariffSnapshot {
    pub day_rate: Decimal,
    pub night_rate: Decimal,
    pub day_base: Decimal,
    pub night_base: Decimal,
    pub vat_multiplier: Decimal,
    pub source_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: OffsetDateTime,
}

impl TariffSnapshot {
    pub fn rate(&self, kind: TariffKind) -> Decimal {
        match kind {
            TariffKind::Day => self.day_rate,
            TariffKind::Night => self.night_rate,
        }
    }

    pub fn base(&self, kind: TariffKind) -> Decimal {
        match kind {
            TariffKind::Day => self.day_base,
            TariffKind::Night => self.night_base,
        }
    }

    /// Both rates must be non-negative for the snapshot to be published.
    pub fn is_valid(&self) -> bool {
        self.day_rate >= Decimal::ZERO && self.night_rate >= Decimal::ZERO
    }

    /// Compares everything except `fetched_at`.
    pub fn same_rates(&self, other: &TariffSnapshot) -> bool {
        self.day_rate == other.day_rate
            && self.night_rate == other.night_rate
            && self.day_base == other.day_base
            && self.night_base == other.night_base
            && self.vat_multiplier == other.vat_multiplier
    }

    /// VAT as a whole percentage, e.g. `"20%"` for a multiplier of `1.2`.
    pub fn vat_percent(&self) -> String {
        let pct = ((self.vat_multiplier - Decimal::ONE) * Decimal::ONE_HUNDRED).round();
        format!("{pct}%")
    }
}
