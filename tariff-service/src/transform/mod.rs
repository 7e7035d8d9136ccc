pub mod extract;

use crate::pipeline::{Envelope, PipelineError, Transform};
use tariff_client::domain::TariffSnapshot;

pub use extract::{ExtractionError, TariffExtractor};

/// Pure validation of a `TariffSnapshot`: both rates must be non-negative.
pub fn validate_snapshot(
    env: Envelope<TariffSnapshot>,
) -> Result<Envelope<TariffSnapshot>, PipelineError> {
    let s = &env.payload;

    if !s.is_valid() {
        return Err(PipelineError::Transform(format!(
            "tariff rates must be non-negative (day {}, night {})",
            s.day_rate, s.night_rate
        )));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct SnapshotValidation;

#[async_trait::async_trait]
impl Transform<TariffSnapshot, TariffSnapshot> for SnapshotValidation {
    async fn apply(
        &self,
        input: Envelope<TariffSnapshot>,
    ) -> Result<Envelope<TariffSnapshot>, PipelineError> {
        match validate_snapshot(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("validation_snapshot_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use time::macros::datetime;

    fn envelope(day: Decimal, night: Decimal) -> Envelope<TariffSnapshot> {
        Envelope::new(TariffSnapshot {
            day_rate: day,
            night_rate: night,
            day_base: day,
            night_base: night,
            vat_multiplier: Decimal::ONE,
            source_url: "https://example.test/tariffs".to_string(),
            fetched_at: datetime!(2025-01-01 00:00:00 UTC),
        })
    }

    #[test]
    fn snapshot_validation_accepts_valid_record() {
        let env = envelope(Decimal::new(19, 2), Decimal::new(9, 2));
        assert!(validate_snapshot(env).is_ok());
    }

    #[test]
    fn snapshot_validation_accepts_zero_rate() {
        let env = envelope(Decimal::new(19, 2), Decimal::ZERO);
        assert!(validate_snapshot(env).is_ok());
    }

    #[tokio::test]
    async fn snapshot_validation_rejects_negative_rate() {
        let env = envelope(Decimal::new(19, 2), Decimal::new(-9, 2));
        let res = SnapshotValidation.apply(env).await;
        assert!(matches!(res, Err(PipelineError::Transform(_))));
    }
}
