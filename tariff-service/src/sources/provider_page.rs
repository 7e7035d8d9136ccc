use std::{sync::Arc, time::Duration};

use futures::Stream;
use tokio::sync::Mutex;

use super::schedule::Schedule;
use crate::{
    pipeline::{Envelope, PipelineError, Source},
    transform::extract::ExtractionError,
};

/// Raw provider page as fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPage {
    pub url: String,
    pub body: String,
}

/// One GET against the fixed provider URL, bounded by a timeout. No retries.
#[derive(Clone)]
pub struct ProviderClient {
    url: String,
    client: reqwest::Client,
}

impl ProviderClient {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, ExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<ProviderPage, ExtractionError> {
        metrics::counter!("tariff_fetch_total").increment(1);
        tracing::info!(url = %self.url, "fetching provider tariff page");

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "fetched provider page");

        Ok(ProviderPage {
            url: self.url.clone(),
            body,
        })
    }
}

/// Fetches the provider page once per tick of its schedule.
pub struct ProviderPageSource<S> {
    client: ProviderClient,
    schedule: Arc<Mutex<Option<S>>>,
}

impl<S: Schedule> ProviderPageSource<S> {
    pub fn new(client: ProviderClient, schedule: S) -> Self {
        Self {
            client,
            schedule: Arc::new(Mutex::new(Some(schedule))),
        }
    }
}

#[async_trait::async_trait]
impl<S: Schedule> Source<ProviderPage> for ProviderPageSource<S> {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<ProviderPage>, PipelineError>> + Send>>
    {
        let schedule = self.schedule.lock().await.take();
        let client = self.client.clone();

        let s = async_stream::stream! {
            match schedule {
                Some(mut schedule) => {
                    while schedule.tick().await {
                        match client.fetch().await {
                            Ok(page) => yield Ok(Envelope::new(page)),
                            Err(e) => {
                                tracing::warn!(error = %e, url = %client.url(), "provider fetch failed");
                                metrics::counter!("tariff_fetch_failed_total").increment(1);
                                yield Err(PipelineError::from(e));
                            }
                        }
                    }
                }
                None => {
                    yield Err(PipelineError::Source(
                        "provider page source already consumed".to_string(),
                    ));
                }
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::schedule::Ticks;
    use futures::StreamExt;

    fn client(url: String) -> ProviderClient {
        ProviderClient::new(url, Duration::from_secs(5), "tariff-service-test").unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_body_on_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tariffs")
            .with_status(200)
            .with_body("<p>Day: 0.19 BGN</p>")
            .create_async()
            .await;

        let page = client(format!("{}/tariffs", server.url())).fetch().await.unwrap();

        assert_eq!(page.body, "<p>Day: 0.19 BGN</p>");
        assert!(page.url.ends_with("/tariffs"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_maps_server_error_to_network_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tariffs")
            .with_status(503)
            .create_async()
            .await;

        let err = client(format!("{}/tariffs", server.url())).fetch().await.unwrap_err();

        assert!(matches!(err, ExtractionError::HttpStatus(503)));
        assert!(err.is_network());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn source_fetches_once_per_tick() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tariffs")
            .with_status(200)
            .with_body("ok")
            .expect(3)
            .create_async()
            .await;

        let source = ProviderPageSource::new(client(format!("{}/tariffs", server.url())), Ticks::new(3));
        let items: Vec<_> = source.stream().await.collect().await;

        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.is_ok()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn source_can_only_be_streamed_once() {
        let source = ProviderPageSource::new(client("http://127.0.0.1:9/".to_string()), Ticks::new(0));
        let first: Vec<_> = source.stream().await.collect().await;
        assert!(first.is_empty());

        let second: Vec<_> = source.stream().await.collect().await;
        assert!(matches!(second.as_slice(), [Err(PipelineError::Source(_))]));
    }
}
