use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use mockito::{Matcher, Server};
use rust_decimal::Decimal;
use serde_json::json;
use tariff_client::{domain::TariffSnapshot, ha::HomeAssistantClient};
use tariff_service::{
    config::{ExtractorConfig, SensorsConfig},
    pipeline::{Pipeline, PipelineError, Source},
    sinks::{SensorSink, SnapshotStore},
    sources::{PageFileSource, ProviderClient, ProviderPage, ProviderPageSource, Ticks},
    transform::{ExtractionError, SnapshotValidation, TariffExtractor},
};
use time::macros::datetime;

const GOLDEN_PAGE: &str = include_str!("fixtures/electrohold_regulated_prices.html");
const MISSING_NIGHT_PAGE: &str = include_str!("fixtures/missing_night.html");

fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn extractor() -> TariffExtractor {
    TariffExtractor::new(&ExtractorConfig::default()).unwrap()
}

fn provider(url: String) -> ProviderClient {
    ProviderClient::new(url, Duration::from_secs(5), "tariff-service-test").unwrap()
}

fn previous_snapshot() -> TariffSnapshot {
    TariffSnapshot {
        day_rate: Decimal::new(15, 2),
        night_rate: Decimal::new(8, 2),
        day_base: Decimal::new(125, 3),
        night_base: Decimal::new(67, 3),
        vat_multiplier: Decimal::new(12, 1),
        source_url: "https://example.test/tariffs".to_string(),
        fetched_at: datetime!(2025-01-01 00:00:00 UTC),
    }
}

fn pipeline<S>(
    source: S,
    sink: SensorSink,
) -> Pipeline<S, ProviderPage, TariffSnapshot, SensorSink>
where
    S: Source<ProviderPage> + 'static,
{
    Pipeline {
        source,
        extractor: Arc::new(extractor()),
        transforms: vec![Arc::new(SnapshotValidation)],
        sink,
    }
}

#[test]
fn golden_page_yields_expected_rates() {
    let page = ProviderPage {
        url: "https://electrohold.bg/bg/sales/domakinstva/snabdyavane-po-regulirani-ceni/"
            .to_string(),
        body: GOLDEN_PAGE.to_string(),
    };

    let snapshot = extractor()
        .extract(&page, datetime!(2025-07-01 06:00:00 UTC))
        .unwrap();

    assert_eq!(snapshot.day_base, Decimal::new(12478, 5));
    assert_eq!(snapshot.night_base, Decimal::new(7236, 5));
    assert_eq!(snapshot.day_rate, Decimal::new(149736, 6));
    assert_eq!(snapshot.night_rate, Decimal::new(86832, 6));
    assert_eq!(snapshot.day_rate.to_string(), "0.149736");
    assert!(snapshot.is_valid());
}

#[test]
fn golden_page_extraction_is_idempotent() {
    let first = extractor().extract_base_rates(GOLDEN_PAGE).unwrap();
    let second = extractor().extract_base_rates(GOLDEN_PAGE).unwrap();
    assert_eq!(first, second);
}

#[test]
fn missing_night_row_is_an_extraction_error() {
    let err = extractor().extract_base_rates(MISSING_NIGHT_PAGE).unwrap_err();
    assert!(matches!(err, ExtractionError::MissingTariff(_)));
    assert!(err.to_string().contains("night"));
}

#[tokio::test]
async fn page_file_source_feeds_the_pipeline() {
    let store = SnapshotStore::new();
    let sink = SensorSink::new(store.clone(), SensorsConfig::default().descriptors());

    pipeline(
        PageFileSource::new(fixture_path("electrohold_regulated_prices.html")),
        sink,
    )
    .run()
    .await
    .unwrap();

    let snapshot = store.current().unwrap();
    assert_eq!(snapshot.day_rate, Decimal::new(149736, 6));
    assert!(snapshot.source_url.starts_with("file://"));
}

#[tokio::test]
async fn scheduled_refresh_publishes_both_sensors() {
    let mut provider_server = Server::new_async().await;
    let page = provider_server
        .mock("GET", "/tariffs")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(GOLDEN_PAGE)
        .create_async()
        .await;

    let mut ha = Server::new_async().await;
    let day = ha
        .mock("POST", "/api/states/sensor.electrohold_tariff_day_euro")
        .match_header("authorization", "Bearer ha-token")
        .match_body(Matcher::PartialJson(json!({
            "state": "0.149736",
            "attributes": {
                "friendly_name": "Electrohold Tariff Day Euro",
                "unit_of_measurement": "EUR/kWh",
                "device_class": "monetary",
                "base_price_excl_vat": "0.12478",
                "vat_rate": "20%"
            }
        })))
        .with_status(200)
        .create_async()
        .await;
    let night = ha
        .mock("POST", "/api/states/sensor.electrohold_tariff_night_euro")
        .match_body(Matcher::PartialJson(json!({ "state": "0.086832" })))
        .with_status(200)
        .create_async()
        .await;

    let store = SnapshotStore::new();
    let sink = SensorSink::new(store.clone(), SensorsConfig::default().descriptors())
        .with_home_assistant(
            HomeAssistantClient::new(ha.url(), "ha-token").unwrap(),
            0,
            Duration::from_millis(1),
        );
    let source = ProviderPageSource::new(
        provider(format!("{}/tariffs", provider_server.url())),
        Ticks::once(),
    );

    pipeline(source, sink).run().await.unwrap();

    page.assert_async().await;
    day.assert_async().await;
    night.assert_async().await;
    assert_eq!(store.current().unwrap().night_rate, Decimal::new(86832, 6));
}

#[tokio::test]
async fn server_error_keeps_previous_snapshot() {
    let mut provider_server = Server::new_async().await;
    let page = provider_server
        .mock("GET", "/tariffs")
        .with_status(502)
        .create_async()
        .await;

    let store = SnapshotStore::new();
    store.replace(previous_snapshot());
    let sink = SensorSink::new(store.clone(), SensorsConfig::default().descriptors());
    let source = ProviderPageSource::new(
        provider(format!("{}/tariffs", provider_server.url())),
        Ticks::once(),
    );

    pipeline(source, sink).run().await.unwrap();

    page.assert_async().await;
    assert_eq!(*store.current().unwrap(), previous_snapshot());
}

#[tokio::test]
async fn missing_label_keeps_previous_snapshot() {
    let mut provider_server = Server::new_async().await;
    provider_server
        .mock("GET", "/tariffs")
        .with_status(200)
        .with_body(MISSING_NIGHT_PAGE)
        .create_async()
        .await;

    let store = SnapshotStore::new();
    store.replace(previous_snapshot());
    let sink = SensorSink::new(store.clone(), SensorsConfig::default().descriptors());
    let source = ProviderPageSource::new(
        provider(format!("{}/tariffs", provider_server.url())),
        Ticks::once(),
    );

    pipeline(source, sink).run().await.unwrap();

    assert_eq!(*store.current().unwrap(), previous_snapshot());
}

#[tokio::test]
async fn fetch_timeout_is_a_network_failure() {
    // Accepts connections but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let client =
        ProviderClient::new(format!("http://{addr}/tariffs"), Duration::from_millis(200), "t")
            .unwrap();
    let source = ProviderPageSource::new(client, Ticks::once());

    let items: Vec<_> = source.stream().await.collect().await;

    assert!(matches!(items.as_slice(), [Err(PipelineError::Source(_))]));
}
