//! Fire-and-forget usage tracking.
//!
//! Query history and suggestion events feed analytics and the feedback
//! ranking signal. Recording happens off the request path and a sink that
//! is down only costs a warning, never a failed search.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One executed search, as recorded after the response is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHistoryRecord {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub query: String,
    pub refined_query: String,
    pub intent: String,
    pub result_count: usize,
    pub cache_hit: bool,
    pub response_time_ms: u64,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// A spelling suggestion that was shown to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRecord {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub original_query: String,
    pub suggested_query: String,
    pub confidence: f32,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Append-only event sink. Implementations must tolerate duplicate ids.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record_query(&self, record: QueryHistoryRecord) -> anyhow::Result<()>;
    async fn record_suggestion(&self, record: SuggestionRecord) -> anyhow::Result<()>;
}

/// Record a query event on a background task. Errors are logged and dropped.
pub fn track_query(sink: Arc<dyn TelemetrySink>, record: QueryHistoryRecord) {
    tokio::spawn(async move {
        if let Err(e) = sink.record_query(record).await {
            tracing::warn!(error = %e, "failed to record query history");
        }
    });
}

pub fn track_suggestion(sink: Arc<dyn TelemetrySink>, record: SuggestionRecord) {
    tokio::spawn(async move {
        if let Err(e) = sink.record_suggestion(record).await {
            tracing::warn!(error = %e, "failed to record suggestion");
        }
    });
}
