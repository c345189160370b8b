//! Query resolution for a legal-document discovery platform.
//!
//! The crate turns free-text legal queries over a Colombian normative
//! corpus into ranked, cached search responses. The stages — tiered
//! caching, spell correction, citation parsing, generative query
//! transformation, filtered full-text execution and multi-signal
//! reranking — are orchestrated by [`pipeline::SearchPipeline`], with
//! external collaborators (document store, generative service, embedding
//! service, telemetry sink, cache backends) injected behind async traits.

pub mod cache;
pub mod citations;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod ranking;
pub mod search;
pub mod spell;
pub mod telemetry;
pub mod transform;
pub mod types;

pub use cache::{CacheBackend, CacheHit, CacheManager, CacheTier, MemoryBackend};
pub use citations::{Citation, CitationEnricher, CitationParser, CitationType};
pub use config::SearchConfig;
pub use error::PipelineError;
pub use pipeline::SearchPipeline;
pub use ranking::{EmbeddingService, RankedDocument, RankingProfile, Reranker};
pub use search::{DocumentStore, SearchExecutor, StorePage, StoreQuery};
pub use spell::{SpellCheckResult, SpellChecker};
pub use telemetry::{QueryHistoryRecord, SuggestionRecord, TelemetrySink};
pub use transform::{GenerativeService, HttpGenerativeService, QueryTransformer};
pub use types::{
    SearchFilters, SearchQuery, SearchResponse, SearchResult, SortMode, StoredDocument,
};
