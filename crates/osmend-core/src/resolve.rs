//! Remote resolver.
//!
//! Looks up each distinct missing child against the OSM API and classifies
//! the outcome. 404 and 410 are valid classifications (the reference gets
//! dropped from its parents); any other non-200 status or transport failure
//! aborts the whole batch.

use crate::id::FeatureId;
use crate::{xml, Config, Error, Result};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Classification of one missing child id. Exactly one outcome is assigned
/// per id, independent of how many parents reference it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The feature exists upstream; carries its headless body, verbatim as
    /// returned by the API.
    Resolved(String),
    /// The feature existed and was deleted (HTTP 410).
    Gone,
    /// The feature never existed (HTTP 404).
    NeverExisted,
}

impl Outcome {
    /// Whether this outcome routes into the drop path: the reference is
    /// removed from its parents instead of the feature being re-created.
    pub fn is_drop(&self) -> bool {
        !matches!(self, Outcome::Resolved(_))
    }
}

/// Feature-lookup client. The endpoint is explicit constructor state so
/// concurrent pipelines with different endpoints cannot interfere.
#[derive(Debug, Clone)]
pub struct Resolver {
    client: reqwest::Client,
    endpoint: String,
    concurrency: usize,
}

impl Resolver {
    pub fn new(endpoint: impl Into<String>, concurrency: usize) -> Resolver {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("http client construction");
        Resolver {
            client,
            endpoint: endpoint.into(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Resolver {
        Resolver::new(config.endpoint.clone(), config.concurrency)
    }

    /// Look up a single feature and classify the result.
    pub async fn lookup(&self, id: FeatureId) -> Result<Outcome> {
        let url = format!("{}/{}/{}", self.endpoint, id.kind.as_tag(), id.num);
        let fail = |reason: String| Error::Resolution { id, reason };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await.map_err(|e| fail(e.to_string()))?;
                let feature = xml::extract_feature(&body, id)?
                    .ok_or_else(|| fail("response did not contain the feature".to_string()))?;
                Ok(Outcome::Resolved(feature))
            }
            StatusCode::GONE => Ok(Outcome::Gone),
            StatusCode::NOT_FOUND => Ok(Outcome::NeverExisted),
            status => Err(fail(format!("unexpected status {status}"))),
        }
    }

    /// Look up a batch of ids with bounded concurrency.
    ///
    /// The result is a total map: every requested id appears exactly once.
    /// The first fatal error cancels all work that has not yet acquired a
    /// slot; results of in-flight lookups are discarded.
    pub async fn resolve_all(
        &self,
        ids: impl IntoIterator<Item = FeatureId>,
    ) -> Result<HashMap<FeatureId, Outcome>> {
        let slots = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for id in ids {
            let resolver = self.clone();
            let slots = Arc::clone(&slots);
            tasks.spawn(async move {
                let _permit = slots.acquire_owned().await.expect("semaphore never closed");
                let outcome = resolver.lookup(id).await?;
                Ok::<_, Error>((id, outcome))
            });
        }

        let mut outcomes = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((id, outcome))) => {
                    tracing::debug!(%id, drop = outcome.is_drop(), "classified");
                    outcomes.insert(id, outcome);
                }
                Ok(Err(err)) => {
                    tasks.abort_all();
                    return Err(err);
                }
                Err(err) if err.is_cancelled() => {}
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            }
        }
        Ok(outcomes)
    }
}
