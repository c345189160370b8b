//! Legal citation recognition and normalization.
//!
//! One pattern per citation type, scanned in a single pass over a
//! priority-ordered table so overlapping forms are attributed
//! deterministically ("Decreto Ley 100 de 1980" is a decree, never also the
//! law embedded in its text). Results are deduplicated by
//! (type, normalized form) keeping the first occurrence, and sorted by
//! ascending source position.

use async_trait::async_trait;
use chrono::Datelike;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationType {
    Law,
    Decree,
    ConstitutionalRuling,
    SupremeRuling,
    Resolution,
    AdministrativeConcept,
    Article,
    Code,
}

impl CitationType {
    pub fn label(&self) -> &'static str {
        match self {
            CitationType::Law => "ley",
            CitationType::Decree => "decreto",
            CitationType::ConstitutionalRuling => "sentencia_constitucional",
            CitationType::SupremeRuling => "sentencia_corte_suprema",
            CitationType::Resolution => "resolucion",
            CitationType::AdministrativeConcept => "concepto",
            CitationType::Article => "articulo",
            CitationType::Code => "codigo",
        }
    }
}

/// Structured pieces extracted from a citation match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationComponents {
    /// Law/decree/resolution number, ruling number, or article number.
    pub number: Option<String>,
    pub year: Option<String>,
    /// Qualifier such as "Orgánica"/"Estatutaria" for laws, "Ley" for
    /// decree-laws, the chamber letter for rulings (C, T, SU, SL, ...).
    pub modifier: Option<String>,
    /// Code name ("Civil", "De Comercio") or the norm an article belongs to.
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub citation_type: CitationType,
    /// The span exactly as it appeared in the source text.
    pub raw_text: String,
    /// Character offset of the first character of the match.
    pub position: usize,
    pub components: CitationComponents,
    pub normalized_form: String,
    pub url: Option<String>,
    /// Resolved lazily by an external collaborator; None until enriched.
    pub is_valid: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationStatistics {
    pub total: usize,
    pub by_type: HashMap<String, usize>,
    pub valid_citations: usize,
    pub invalid_citations: usize,
}

/// A citation plus the surrounding-context material attached by enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedCitation {
    pub citation: Citation,
    pub context: String,
    pub related: Vec<String>,
}

/// External collaborator that validates a citation against the corpus and
/// finds related norms. Failures leave the citation unenriched.
#[async_trait]
pub trait CitationEnricher: Send + Sync {
    async fn enrich(&self, citation: &Citation, context: &str) -> anyhow::Result<EnrichedCitation>;
}

static LAW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ley\s+(orgánica\s+|estatutaria\s+)?(?:número\s+|no\.?\s*)?(\d{1,5})\s+de\s+(\d{4})")
        .expect("law regex is valid")
});

static DECREE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)decreto\s+(ley\s+)?(?:número\s+|no\.?\s*)?(\d{1,5})\s+de\s+(\d{4})")
        .expect("decree regex is valid")
});

static CONSTITUTIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)sentencia\s+(C|T|SU)\s*-\s*(\d{1,4})\s+(?:de|del)\s+(\d{4})")
        .expect("constitutional ruling regex is valid")
});

static SUPREME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)sentencia\s+(SL|SP|SC|STC|STP|AL)\s*(\d{1,6})\s*-\s*(\d{4})")
        .expect("supreme ruling regex is valid")
});

static RESOLUTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)resoluci[oó]n\s+(?:número\s+|no\.?\s*)?(\d{1,6})\s+de\s+(\d{4})")
        .expect("resolution regex is valid")
});

static CONCEPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)concepto\s+(?:número\s+|no\.?\s*)?(\d{1,6})\s+de\s+(\d{4})")
        .expect("concept regex is valid")
});

static ARTICLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // The norm an article belongs to is reported as its own citation when
    // recognizable; capturing it here would claim overlapping spans.
    Regex::new(r"(?i)art[íi]culo\s+(\d{1,4})").expect("article regex is valid")
});

static CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)código\s+(civil|penal|de\s+comercio|sustantivo\s+del\s+trabajo|general\s+del\s+proceso|de\s+procedimiento\s+(?:civil|penal))")
        .expect("code regex is valid")
});

/// Recognition order. Rulings and decrees come before laws so composite
/// phrasings are claimed by the more specific pattern; articles and codes
/// last because they frequently appear inside other citations' context.
const PATTERN_PRIORITY: &[CitationType] = &[
    CitationType::ConstitutionalRuling,
    CitationType::SupremeRuling,
    CitationType::Decree,
    CitationType::Law,
    CitationType::Resolution,
    CitationType::AdministrativeConcept,
    CitationType::Code,
    CitationType::Article,
];

fn regex_for(citation_type: CitationType) -> &'static Regex {
    match citation_type {
        CitationType::Law => &LAW_RE,
        CitationType::Decree => &DECREE_RE,
        CitationType::ConstitutionalRuling => &CONSTITUTIONAL_RE,
        CitationType::SupremeRuling => &SUPREME_RE,
        CitationType::Resolution => &RESOLUTION_RE,
        CitationType::AdministrativeConcept => &CONCEPT_RE,
        CitationType::Article => &ARTICLE_RE,
        CitationType::Code => &CODE_RE,
    }
}

struct RawMatch {
    citation_type: CitationType,
    priority: usize,
    byte_start: usize,
    byte_end: usize,
    components: CitationComponents,
}

#[derive(Default)]
pub struct CitationParser;

impl CitationParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract, normalize, deduplicate and sort every citation in `text`.
    pub fn parse_citations(&self, text: &str) -> Vec<Citation> {
        let mut matches: Vec<RawMatch> = Vec::new();
        for (priority, &citation_type) in PATTERN_PRIORITY.iter().enumerate() {
            let re = regex_for(citation_type);
            for caps in re.captures_iter(text) {
                let whole = caps.get(0).expect("group 0 always present");
                matches.push(RawMatch {
                    citation_type,
                    priority,
                    byte_start: whole.start(),
                    byte_end: whole.end(),
                    components: extract_components(citation_type, &caps),
                });
            }
        }

        // Earlier start wins; on a tie the higher-priority pattern wins.
        matches.sort_by(|a, b| {
            a.byte_start
                .cmp(&b.byte_start)
                .then(a.priority.cmp(&b.priority))
        });

        let mut claimed_end = 0usize;
        let mut seen: HashSet<(CitationType, String)> = HashSet::new();
        let mut citations = Vec::new();

        for m in matches {
            // Skip matches inside a span already claimed by an earlier,
            // more specific pattern.
            if m.byte_start < claimed_end {
                continue;
            }
            let normalized = normalize(m.citation_type, &m.components);
            claimed_end = m.byte_end;

            if !seen.insert((m.citation_type, normalized.clone())) {
                continue;
            }

            let position = text[..m.byte_start].chars().count();
            citations.push(Citation {
                citation_type: m.citation_type,
                raw_text: text[m.byte_start..m.byte_end].to_string(),
                position,
                url: canonical_url(m.citation_type, &m.components),
                components: m.components,
                normalized_form: normalized,
                is_valid: None,
            });
        }

        citations
    }

    /// Aggregate counts for a text. Validity here is the local plausibility
    /// check (sane year range); authoritative validation is the enricher's job.
    pub fn citation_statistics(&self, text: &str) -> CitationStatistics {
        let citations = self.parse_citations(text);
        let mut by_type: HashMap<String, usize> = HashMap::new();
        let mut valid = 0usize;

        for citation in &citations {
            *by_type
                .entry(citation.citation_type.label().to_string())
                .or_insert(0) += 1;
            if is_plausible(citation) {
                valid += 1;
            }
        }

        CitationStatistics {
            total: citations.len(),
            invalid_citations: citations.len() - valid,
            valid_citations: valid,
            by_type,
        }
    }

    /// Attach surrounding context and collaborator-resolved validity to each
    /// citation. Enrichment calls run concurrently; a failure on one keeps
    /// the plain citation.
    pub async fn enrich_citations(
        &self,
        text: &str,
        citations: Vec<Citation>,
        enricher: &dyn CitationEnricher,
    ) -> Vec<EnrichedCitation> {
        let tasks = citations.into_iter().map(|citation| async move {
            let context = context_window(text, citation.position, 120);
            match enricher.enrich(&citation, &context).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(
                        citation = %citation.normalized_form,
                        error = %e,
                        "citation enrichment failed, returning bare citation"
                    );
                    EnrichedCitation {
                        citation,
                        context,
                        related: Vec::new(),
                    }
                }
            }
        });
        futures::future::join_all(tasks).await
    }
}

fn extract_components(citation_type: CitationType, caps: &regex::Captures<'_>) -> CitationComponents {
    let group = |i: usize| caps.get(i).map(|m| m.as_str().trim().to_string());
    match citation_type {
        CitationType::Law => CitationComponents {
            modifier: group(1).map(|m| title_case(&m)),
            number: group(2),
            year: group(3),
            source: None,
        },
        CitationType::Decree => CitationComponents {
            modifier: group(1).map(|m| title_case(&m)),
            number: group(2),
            year: group(3),
            source: None,
        },
        CitationType::ConstitutionalRuling | CitationType::SupremeRuling => CitationComponents {
            modifier: group(1).map(|m| m.to_uppercase()),
            number: group(2),
            year: group(3),
            source: None,
        },
        CitationType::Resolution | CitationType::AdministrativeConcept => CitationComponents {
            number: group(1),
            year: group(2),
            ..Default::default()
        },
        CitationType::Article => CitationComponents {
            number: group(1),
            ..Default::default()
        },
        CitationType::Code => CitationComponents {
            source: group(1).map(|s| title_case(&s)),
            ..Default::default()
        },
    }
}

/// The canonical textual form, independent of the phrasing found in source.
fn normalize(citation_type: CitationType, c: &CitationComponents) -> String {
    let number = c.number.as_deref().unwrap_or("");
    let year = c.year.as_deref().unwrap_or("");
    match citation_type {
        CitationType::Law => match &c.modifier {
            Some(modifier) => format!("Ley {} {} de {}", modifier, number, year),
            None => format!("Ley {} de {}", number, year),
        },
        CitationType::Decree => match &c.modifier {
            Some(_) => format!("Decreto Ley {} de {}", number, year),
            None => format!("Decreto {} de {}", number, year),
        },
        CitationType::ConstitutionalRuling => format!(
            "Sentencia {}-{} de {}",
            c.modifier.as_deref().unwrap_or(""),
            number,
            year
        ),
        CitationType::SupremeRuling => format!(
            "Sentencia {}{}-{}",
            c.modifier.as_deref().unwrap_or(""),
            number,
            year
        ),
        CitationType::Resolution => format!("Resolución {} de {}", number, year),
        CitationType::AdministrativeConcept => format!("Concepto {} de {}", number, year),
        CitationType::Article => format!("Artículo {}", number),
        CitationType::Code => format!("Código {}", c.source.as_deref().unwrap_or("")),
    }
}

/// Per-type canonical URL table. Parameter ordering is type-specific and
/// follows each source site's convention; types without a stable public
/// permalink resolve to None.
fn canonical_url(citation_type: CitationType, c: &CitationComponents) -> Option<String> {
    let number = c.number.as_deref()?;
    match citation_type {
        CitationType::Law => {
            let year = c.year.as_deref()?;
            Some(format!(
                "https://www.suin-juriscol.gov.co/legislacion/ley.html?numero={}&anio={}",
                number, year
            ))
        }
        CitationType::Decree => {
            let year = c.year.as_deref()?;
            // Decree pages key on year first.
            Some(format!(
                "https://www.suin-juriscol.gov.co/legislacion/decreto.html?anio={}&numero={}",
                year, number
            ))
        }
        CitationType::ConstitutionalRuling => {
            let year = c.year.as_deref()?;
            let letter = c.modifier.as_deref()?;
            let short_year = &year[year.len().saturating_sub(2)..];
            Some(format!(
                "https://www.corteconstitucional.gov.co/relatoria/{}/{}-{}-{}.htm",
                year, letter, number, short_year
            ))
        }
        CitationType::SupremeRuling => {
            let year = c.year.as_deref()?;
            let prefix = c.modifier.as_deref()?;
            Some(format!(
                "https://consultajurisprudencial.ramajudicial.gov.co/WebRelatoria/csj/index.xhtml?providencia={}{}-{}",
                prefix, number, year
            ))
        }
        CitationType::Resolution | CitationType::AdministrativeConcept | CitationType::Article => {
            None
        }
        CitationType::Code => None,
    }
}

fn is_plausible(citation: &Citation) -> bool {
    match citation.components.year.as_deref() {
        Some(year) => year
            .parse::<i32>()
            .map(|y| (1810..=chrono::Utc::now().year()).contains(&y))
            .unwrap_or(false),
        // Articles and codes carry no year; nothing to refute locally.
        None => true,
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            // Connectives stay lowercase ("Sustantivo del Trabajo").
            if matches!(word.to_lowercase().as_str(), "de" | "del" | "la" | "el") {
                word.to_lowercase()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(|c| c.to_lowercase()))
                        .collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn context_window(text: &str, char_position: usize, radius: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start = char_position.saturating_sub(radius);
    let end = (char_position + radius).min(chars.len());
    chars[start..end].iter().collect()
}
