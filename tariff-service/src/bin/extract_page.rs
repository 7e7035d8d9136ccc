use anyhow::{Context, Result};
use std::env;
use tariff_service::{
    config::AppConfig,
    observability,
    sources::{PageFileSource, ProviderClient},
    transform::{validate_snapshot, TariffExtractor},
    Envelope,
};

/// One-shot extraction: `extract_page [saved_page.html]`.
///
/// Without a path the configured provider URL is fetched once. The snapshot
/// is printed as JSON.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let extractor = TariffExtractor::new(&cfg.extractor)?;

    let page = match env::args().nth(1) {
        Some(path) => PageFileSource::new(path).read().await?,
        None => ProviderClient::new(
            cfg.provider.url.clone(),
            cfg.provider.timeout(),
            &cfg.provider.user_agent,
        )?
        .fetch()
        .await
        .context("failed to fetch provider page")?,
    };

    let snapshot = extractor
        .extract(&page, time::OffsetDateTime::now_utc())
        .context("failed to extract tariffs")?;
    let env = validate_snapshot(Envelope::new(snapshot))?;

    println!("{}", serde_json::to_string_pretty(&env.payload)?);
    Ok(())
}
