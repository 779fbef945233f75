//! MBID → audio descriptors
//!
//! Deliberately uncached: a recording without analysis today may gain one
//! later, so a miss here is retried on every run.

use crate::rate_budget::RateBudget;
use crate::retry::{call_with_retry, RetryPolicy};
use crate::services::{FeatureSource, ServiceError};
use crate::types::{FeatureBundle, Mbid};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureFetch {
    Features(FeatureBundle),
    NotFound,
    /// Gave up for this run
    Failed(ServiceError),
}

pub struct FeatureFetcher {
    source: Arc<dyn FeatureSource>,
    budget: Arc<RateBudget>,
    policy: RetryPolicy,
}

impl FeatureFetcher {
    pub fn new(source: Arc<dyn FeatureSource>, budget: Arc<RateBudget>, policy: RetryPolicy) -> Self {
        Self {
            source,
            budget,
            policy,
        }
    }

    pub async fn fetch(&self, mbid: &Mbid) -> FeatureFetch {
        let subject = mbid.to_string();
        let result = call_with_retry(
            self.source.service_name(),
            &subject,
            &self.policy,
            &self.budget,
            || self.source.pace(),
            || self.source.fetch_features(mbid),
        )
        .await;

        match result {
            Ok(Some(bundle)) => FeatureFetch::Features(bundle),
            Ok(None) => FeatureFetch::NotFound,
            Err(err) => {
                tracing::warn!(mbid = %mbid, error = %err, "Feature fetch abandoned for this run");
                FeatureFetch::Failed(err)
            }
        }
    }
}
