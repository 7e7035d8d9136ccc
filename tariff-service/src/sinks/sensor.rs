use std::time::Duration;

use futures::StreamExt;
use rust_decimal::prelude::ToPrimitive;
use tariff_client::{
    domain::{SensorDescriptor, SensorState, TariffKind, TariffSnapshot},
    ha::{HaError, HomeAssistantClient},
};

use super::SnapshotStore;
use crate::pipeline::{Envelope, PipelineError, Sink};

struct HomeAssistantPublisher {
    client: HomeAssistantClient,
    max_retries: u32,
    retry_backoff: Duration,
}

/// Publishing layer for the two tariff sensors.
///
/// Successful snapshots replace the store and are pushed to Home Assistant.
/// Failures of any kind keep the previous snapshot; until a first snapshot
/// exists the sensors are reported as unavailable.
pub struct SensorSink {
    store: SnapshotStore,
    sensors: Vec<SensorDescriptor>,
    publisher: Option<HomeAssistantPublisher>,
}

impl SensorSink {
    pub fn new(store: SnapshotStore, sensors: Vec<SensorDescriptor>) -> Self {
        Self {
            store,
            sensors,
            publisher: None,
        }
    }

    pub fn with_home_assistant(
        mut self,
        client: HomeAssistantClient,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        self.publisher = Some(HomeAssistantPublisher {
            client,
            max_retries,
            retry_backoff,
        });
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    async fn on_snapshot(&self, snapshot: TariffSnapshot) {
        for kind in TariffKind::ALL {
            if let Some(rate) = snapshot.rate(kind).to_f64() {
                let gauge = match kind {
                    TariffKind::Day => metrics::gauge!("tariff_day_rate"),
                    TariffKind::Night => metrics::gauge!("tariff_night_rate"),
                };
                gauge.set(rate);
            }
        }

        self.store.replace(snapshot);
        metrics::counter!("tariff_snapshots_published_total").increment(1);

        let Some(current) = self.store.current() else {
            return;
        };
        for descriptor in &self.sensors {
            let state = SensorState::available(descriptor, &current);
            self.publish(descriptor, &state).await;
        }
    }

    async fn on_failure(&self, err: &PipelineError) {
        metrics::counter!("tariff_update_failed_total", "kind" => err.kind()).increment(1);

        match self.store.current() {
            Some(previous) => {
                tracing::error!(
                    error = %err,
                    kind = err.kind(),
                    day_rate = %previous.day_rate,
                    night_rate = %previous.night_rate,
                    "tariff update failed, keeping previous snapshot"
                );
            }
            None => {
                tracing::error!(
                    error = %err,
                    kind = err.kind(),
                    "tariff update failed, no snapshot yet; sensors unavailable"
                );
                for descriptor in &self.sensors {
                    self.publish(descriptor, &SensorState::unavailable(descriptor)).await;
                }
            }
        }
    }

    /// Pushes one entity state; failures are logged and never propagate.
    async fn publish(&self, descriptor: &SensorDescriptor, state: &SensorState) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        let mut attempt: u32 = 0;
        loop {
            match publisher.client.set_state(&descriptor.entity_id, state).await {
                Ok(()) => {
                    tracing::info!(
                        entity_id = %descriptor.entity_id,
                        state = %state.state,
                        "published sensor state"
                    );
                    return;
                }
                Err(e) if attempt < publisher.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    let sleep_for = publisher.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        entity_id = %descriptor.entity_id,
                        "home assistant publish failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        entity_id = %descriptor.entity_id,
                        "home assistant publish failed, giving up"
                    );
                    metrics::counter!("ha_publish_errors_total").increment(1);
                    return;
                }
            }
        }
    }
}

fn is_retryable(e: &HaError) -> bool {
    !matches!(e, HaError::AuthenticationFailed | HaError::Config(_))
}

#[async_trait::async_trait]
impl Sink<TariffSnapshot> for SensorSink {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<TariffSnapshot>, PipelineError>>
            + Send
            + Unpin
            + 'static,
    {
        while let Some(item) = input.next().await {
            match item {
                Ok(env) => self.on_snapshot(env.payload).await,
                Err(e) => self.on_failure(&e).await,
            }
        }

        Ok(())
    }
}
