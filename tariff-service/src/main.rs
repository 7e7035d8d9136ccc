use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tariff_client::{domain::TariffSnapshot, ha::HomeAssistantClient};
use tariff_service::{
    config::AppConfig,
    observability,
    pipeline::Pipeline,
    sinks::{SensorSink, SnapshotStore},
    sources::{IntervalSchedule, ProviderClient, ProviderPage, ProviderPageSource},
    status_server,
    transform::{SnapshotValidation, TariffExtractor},
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;
    let store = SnapshotStore::new();

    // Start metrics/status server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        status_server::init(&metrics_cfg.bind_addr, store.clone())?;
    }

    let mut sink = SensorSink::new(store, cfg.sensors.descriptors());
    if let Some(ha_cfg) = &cfg.home_assistant {
        let client = HomeAssistantClient::from_config(ha_cfg.base_url.clone(), ha_cfg.token.clone())?;
        if !client.ping().await? {
            tracing::warn!(base_url = %client.base_url(), "Home Assistant not reachable yet");
        }
        sink = sink.with_home_assistant(
            client,
            ha_cfg.max_retries,
            Duration::from_millis(ha_cfg.retry_backoff_ms),
        );
    } else {
        tracing::info!("no [home_assistant] section, snapshots are served locally only");
    }

    let provider = ProviderClient::new(
        cfg.provider.url.clone(),
        cfg.provider.timeout(),
        &cfg.provider.user_agent,
    )?;
    let source = ProviderPageSource::new(provider, IntervalSchedule::new(cfg.provider.refresh_interval()));

    let pipeline: Pipeline<_, ProviderPage, TariffSnapshot, _> = Pipeline {
        source,
        extractor: Arc::new(TariffExtractor::new(&cfg.extractor)?),
        transforms: vec![Arc::new(SnapshotValidation)],
        sink,
    };

    tracing::info!(
        url = %cfg.provider.url,
        refresh_interval_secs = cfg.provider.refresh_interval_secs,
        "starting tariff pipeline"
    );

    tokio::select! {
        res = pipeline.run() => res?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}
