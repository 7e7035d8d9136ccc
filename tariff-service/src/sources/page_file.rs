use std::path::PathBuf;

use async_stream::try_stream;
use futures::Stream;

use super::ProviderPage;
use crate::pipeline::{Envelope, PipelineError, Source};

/// A captured provider page on disk, yielded once.
pub struct PageFileSource {
    path: PathBuf,
}

impl PageFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub async fn read(&self) -> Result<ProviderPage, PipelineError> {
        let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PipelineError::Source(format!("failed to read {}: {e}", self.path.display()))
        })?;

        Ok(ProviderPage {
            url: format!("file://{}", self.path.display()),
            body,
        })
    }
}

#[async_trait::async_trait]
impl Source<ProviderPage> for PageFileSource {
    async fn stream(
        &self,
    ) -> std::pin::Pin<Box<dyn Stream<Item = Result<Envelope<ProviderPage>, PipelineError>> + Send>>
    {
        let source = PageFileSource::new(self.path.clone());
        let s = try_stream! {
            let page = source.read().await?;
            yield Envelope::new(page);
        };

        Box::pin(s)
    }
}
