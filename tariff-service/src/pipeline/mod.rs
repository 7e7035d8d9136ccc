use std::{pin::Pin, sync::Arc, time::SystemTime};

use futures::{Stream, StreamExt};

use crate::transform::extract::ExtractionError;

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

/// Source errors are network failures, transform errors are parse failures.
/// Sinks treat both as one "update failed" outcome; publishing never fails
/// the pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("transform error: {0}")]
    Transform(String),
}

impl PipelineError {
    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Source(_) => "network",
            PipelineError::Transform(_) => "parse",
        }
    }
}

impl From<ExtractionError> for PipelineError {
    fn from(e: ExtractionError) -> Self {
        if e.is_network() {
            PipelineError::Source(e.to_string())
        } else {
            PipelineError::Transform(e.to_string())
        }
    }
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

/// Source of `I`, one type-changing transform `I -> T`, then a chain of
/// same-type transforms before the sink.
pub struct Pipeline<S, I, T, K> {
    pub source: S,
    pub extractor: Arc<dyn Transform<I, T> + Send + Sync>,
    pub transforms: Vec<Arc<dyn Transform<T, T> + Send + Sync>>,
    pub sink: K,
}

impl<S, I, T, K> Pipeline<S, I, T, K>
where
    I: Send + 'static,
    T: Send + 'static,
    S: Source<I> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    pub async fn run(self) -> Result<(), PipelineError> {
        let input = self.source.stream().await;

        let extractor = self.extractor.clone();
        let mut stream: EnvelopeStream<T> = Box::pin(input.then(move |item| {
            let extractor = extractor.clone();
            async move {
                match item {
                    Ok(env) => extractor.apply(env).await,
                    Err(e) => Err(e),
                }
            }
        }));

        // Apply transforms in sequence (if any).
        for t in self.transforms {
            let t_arc = t.clone();
            stream = Box::pin(stream.then(move |item| {
                let t_inner = t_arc.clone();
                async move {
                    match item {
                        Ok(env) => t_inner.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        self.sink.run(stream).await
    }
}
