//! Natural-language query transformation.
//!
//! One generative call per query turns free text into an intent, entities
//! and structured filters. Every failure mode — timeout, unreachable
//! service, non-JSON output, missing required fields — collapses to the
//! same degraded result: `intent = "search"`, empty filters, the original
//! query as the refined query.

pub mod http;
pub mod prompt;

pub use http::HttpGenerativeService;
pub use prompt::{estimate_tokens, BuiltPrompt, PromptBuilder};

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PromptConfig;
use crate::types::{NlpFilters, QueryEntity, QueryTransformation};

/// Generative text collaborator. Implementations are expected to return
/// text that parses as the JSON contract from the prompt, but the
/// transformer tolerates anything.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    async fn generate(&self, prompt: &str, max_tokens: usize) -> anyhow::Result<String>;
}

/// Wire shape of the generative service's answer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTransformation {
    intent: String,
    #[serde(default)]
    entities: Vec<WireEntity>,
    #[serde(default)]
    filters: NlpFilters,
    refined_query: String,
}

#[derive(Debug, Deserialize)]
struct WireEntity {
    #[serde(rename = "type")]
    entity_type: String,
    value: String,
}

pub struct QueryTransformer {
    service: Arc<dyn GenerativeService>,
    builder: PromptBuilder,
    timeout: Duration,
}

impl QueryTransformer {
    pub fn new(service: Arc<dyn GenerativeService>, config: PromptConfig) -> Self {
        Self {
            service,
            timeout: Duration::from_secs(config.generation_timeout_secs),
            builder: PromptBuilder::new(config),
        }
    }

    /// Transform a raw query. Never errors; the degraded result carries the
    /// original query so the pipeline can proceed unchanged.
    pub async fn transform(&self, query: &str) -> QueryTransformation {
        let prompt = self.builder.build(query);
        if prompt.truncated {
            tracing::debug!(query = %query, "transformation prompt hard-truncated");
        }

        let generated =
            match tokio::time::timeout(self.timeout, self.service.generate(&prompt.text, 400))
                .await
            {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    tracing::warn!(query = %query, error = %e, "generative service failed, using degraded transformation");
                    return QueryTransformation::degraded(query);
                }
                Err(_) => {
                    tracing::warn!(query = %query, timeout_secs = self.timeout.as_secs(), "generative service timed out, using degraded transformation");
                    return QueryTransformation::degraded(query);
                }
            };

        match parse_wire_output(&generated) {
            Some(wire) => QueryTransformation {
                intent: wire.intent,
                entities: wire
                    .entities
                    .into_iter()
                    .map(|e| QueryEntity {
                        entity_type: e.entity_type,
                        value: e.value,
                    })
                    .collect(),
                filters: wire.filters,
                refined_query: wire.refined_query,
            },
            None => {
                tracing::warn!(query = %query, "generative output was not usable JSON, using degraded transformation");
                QueryTransformation::degraded(query)
            }
        }
    }
}

/// Extract the JSON object from model output that may be wrapped in prose
/// or markdown code fences.
fn parse_wire_output(raw: &str) -> Option<WireTransformation> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}
