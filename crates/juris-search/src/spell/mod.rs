//! Spelling correction over the legal domain vocabulary.
//!
//! Lookup order per token: exact dictionary membership, then the typo map,
//! then the acronym map, then fuzzy matching against the dictionary by edit
//! distance. Tokens of length <= 2 or purely numeric pass through untouched.
//! This component never errors; an unmatched token is simply left alone.

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;

const MAX_EDIT_DISTANCE: usize = 2;
const MIN_FUZZY_CONFIDENCE: f32 = 0.6;
const TYPO_MAP_CONFIDENCE: f32 = 0.95;
const ACRONYM_CONFIDENCE: f32 = 0.9;

/// Domain vocabulary: valid legal terms as they should appear.
const LEGAL_TERMS: &[&str] = &[
    "acción",
    "administrativo",
    "apelación",
    "artículo",
    "casación",
    "circular",
    "código",
    "concepto",
    "conciliación",
    "constitución",
    "constitucional",
    "contractual",
    "contratación",
    "contrato",
    "decreto",
    "demanda",
    "derecho",
    "derogatoria",
    "disciplinario",
    "ejecutoria",
    "embargo",
    "estatutaria",
    "expediente",
    "indemnización",
    "jurisdicción",
    "jurisprudencia",
    "laboral",
    "legislación",
    "ley",
    "licitación",
    "liquidación",
    "magistrado",
    "normativa",
    "notificación",
    "ordenanza",
    "orgánica",
    "pensión",
    "prescripción",
    "procedimiento",
    "providencia",
    "recurso",
    "reglamento",
    "resolución",
    "sanción",
    "sentencia",
    "sociedad",
    "sucesión",
    "tributario",
    "tutela",
    "vigencia",
];

/// Known misspellings with their corrections. Mostly accent drops, which
/// are by far the most common typo in this corpus.
const TYPO_MAP: &[(&str, &str)] = &[
    ("accion", "acción"),
    ("apelacion", "apelación"),
    ("articulo", "artículo"),
    ("casacion", "casación"),
    ("codigo", "código"),
    ("conciliacion", "conciliación"),
    ("constitucion", "constitución"),
    ("contratacion", "contratación"),
    ("indemnizacion", "indemnización"),
    ("juridico", "jurídico"),
    ("jurisdiccion", "jurisdicción"),
    ("legislacion", "legislación"),
    ("licitacion", "licitación"),
    ("liquidacion", "liquidación"),
    ("notificacion", "notificación"),
    ("organica", "orgánica"),
    ("pension", "pensión"),
    ("prescripcion", "prescripción"),
    ("resolucion", "resolución"),
    ("sancion", "sanción"),
    ("sentensia", "sentencia"),
    ("sucesion", "sucesión"),
];

/// Institutional acronyms normalized to their official uppercase form.
const ACRONYMS: &[(&str, &str)] = &[
    ("dian", "DIAN"),
    ("icbf", "ICBF"),
    ("ugpp", "UGPP"),
    ("anla", "ANLA"),
    ("sena", "SENA"),
    ("pot", "POT"),
    ("rut", "RUT"),
    ("eps", "EPS"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrectionKind {
    Spelling,
    LegalTerm,
    Acronym,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellCorrection {
    pub original: String,
    pub suggestion: String,
    /// Character offset of the token in the original query string.
    pub position: usize,
    pub confidence: f32,
    pub kind: CorrectionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellCheckResult {
    pub original_query: String,
    pub corrected_query: String,
    pub corrections: Vec<SpellCorrection>,
    pub has_corrections: bool,
    /// Mean of the individual correction confidences; 1.0 when nothing
    /// needed correcting.
    pub confidence: f32,
}

struct CachedSuggestion {
    value: Option<String>,
    expires_at: DateTime<Utc>,
}

pub struct SpellChecker {
    dictionary: HashSet<&'static str>,
    typo_map: HashMap<&'static str, &'static str>,
    acronyms: HashMap<&'static str, &'static str>,
    suggestion_cache: RwLock<LruCache<String, CachedSuggestion>>,
    suggestion_ttl_secs: i64,
}

impl SpellChecker {
    pub fn new() -> Self {
        Self {
            dictionary: LEGAL_TERMS.iter().copied().collect(),
            typo_map: TYPO_MAP.iter().copied().collect(),
            acronyms: ACRONYMS.iter().copied().collect(),
            suggestion_cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(512).expect("cache size is non-zero"),
            )),
            suggestion_ttl_secs: 600,
        }
    }

    /// Check a query and return the corrected form plus per-token details.
    pub fn check_spelling(&self, query: &str) -> SpellCheckResult {
        let mut corrections = Vec::new();
        let mut corrected = String::with_capacity(query.len());
        let mut last_byte = 0usize;

        for token in tokens_with_offsets(query) {
            corrected.push_str(&query[last_byte..token.byte_start]);
            last_byte = token.byte_end;

            match self.correct_token(token.text) {
                Some((suggestion, confidence, kind)) => {
                    corrections.push(SpellCorrection {
                        original: token.text.to_string(),
                        suggestion: suggestion.clone(),
                        position: token.char_offset,
                        confidence,
                        kind,
                    });
                    corrected.push_str(&suggestion);
                }
                None => corrected.push_str(token.text),
            }
        }
        corrected.push_str(&query[last_byte..]);

        let confidence = if corrections.is_empty() {
            1.0
        } else {
            corrections.iter().map(|c| c.confidence).sum::<f32>() / corrections.len() as f32
        };

        SpellCheckResult {
            original_query: query.to_string(),
            corrected_query: corrected,
            has_corrections: !corrections.is_empty(),
            confidence,
            corrections,
        }
    }

    /// "¿Quiso decir …?" phrasing for a result that carries corrections.
    /// Memoized in a TTL-bounded LRU keyed by the original query.
    pub fn generate_suggestion(&self, result: &SpellCheckResult) -> Option<String> {
        if !result.has_corrections {
            return None;
        }

        {
            let mut cache = self.suggestion_cache.write();
            if let Some(cached) = cache.get(&result.original_query) {
                if cached.expires_at > Utc::now() {
                    return cached.value.clone();
                }
            }
        }

        let suggestion = format!("¿Quiso decir \"{}\"?", result.corrected_query);
        self.suggestion_cache.write().put(
            result.original_query.clone(),
            CachedSuggestion {
                value: Some(suggestion.clone()),
                expires_at: Utc::now() + Duration::seconds(self.suggestion_ttl_secs),
            },
        );
        Some(suggestion)
    }

    fn correct_token(&self, token: &str) -> Option<(String, f32, CorrectionKind)> {
        if token.chars().count() <= 2 || token.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let lower = token.to_lowercase();
        if self.dictionary.contains(lower.as_str()) {
            return None;
        }

        if let Some(&fix) = self.typo_map.get(lower.as_str()) {
            return Some((
                match_case(token, fix),
                TYPO_MAP_CONFIDENCE,
                CorrectionKind::LegalTerm,
            ));
        }

        if let Some(&expanded) = self.acronyms.get(lower.as_str()) {
            // Already written in the official form — nothing to correct.
            if token == expanded {
                return None;
            }
            return Some((expanded.to_string(), ACRONYM_CONFIDENCE, CorrectionKind::Acronym));
        }

        self.fuzzy_match(&lower)
            .map(|(candidate, confidence)| {
                (match_case(token, candidate), confidence, CorrectionKind::Spelling)
            })
    }

    /// Best dictionary candidate within the edit-distance and confidence
    /// bounds, or None when nothing is close enough.
    fn fuzzy_match(&self, token: &str) -> Option<(&'static str, f32)> {
        let token_len = token.chars().count();
        let mut best: Option<(&'static str, usize, f32)> = None;

        for &candidate in &self.dictionary {
            let candidate_len = candidate.chars().count();
            // Distance is at least the length gap; skip hopeless candidates.
            if candidate_len.abs_diff(token_len) > MAX_EDIT_DISTANCE {
                continue;
            }
            let distance = strsim::levenshtein(token, candidate);
            if distance == 0 || distance > MAX_EDIT_DISTANCE {
                continue;
            }
            let confidence = 1.0 - distance as f32 / token_len.max(candidate_len) as f32;
            if confidence < MIN_FUZZY_CONFIDENCE {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, best_distance, best_confidence)) => {
                    distance < best_distance
                        || (distance == best_distance && confidence > best_confidence)
                }
            };
            if better {
                best = Some((candidate, distance, confidence));
            }
        }

        best.map(|(candidate, _, confidence)| (candidate, confidence))
    }
}

impl Default for SpellChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the original token's leading capitalization on the suggestion.
fn match_case(original: &str, suggestion: &str) -> String {
    let starts_upper = original.chars().next().is_some_and(|c| c.is_uppercase());
    if !starts_upper {
        return suggestion.to_string();
    }
    let mut chars = suggestion.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

struct Token<'a> {
    text: &'a str,
    byte_start: usize,
    byte_end: usize,
    char_offset: usize,
}

/// Whitespace tokens with both byte and character offsets. Byte offsets
/// rebuild the corrected string; character offsets go into the result.
fn tokens_with_offsets(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<(usize, usize)> = None;
    let mut char_idx = 0usize;

    for (byte_idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some((byte_start, char_start)) = start.take() {
                tokens.push(Token {
                    text: &text[byte_start..byte_idx],
                    byte_start,
                    byte_end: byte_idx,
                    char_offset: char_start,
                });
            }
        } else if start.is_none() {
            start = Some((byte_idx, char_idx));
        }
        char_idx += 1;
    }
    if let Some((byte_start, char_start)) = start {
        tokens.push(Token {
            text: &text[byte_start..],
            byte_start,
            byte_end: text.len(),
            char_offset: char_start,
        });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typo_map_hit_corrects_with_high_confidence() {
        let checker = SpellChecker::new();
        let result = checker.check_spelling("resolucion");

        assert!(result.has_corrections);
        assert_eq!(result.corrected_query, "resolución");
        assert!(result.confidence >= 0.9);
        assert_eq!(result.corrections[0].kind, CorrectionKind::LegalTerm);
    }

    #[test]
    fn non_domain_text_passes_through() {
        let checker = SpellChecker::new();
        let result = checker.check_spelling("the quick fox");

        assert!(!result.has_corrections);
        assert_eq!(result.corrected_query, "the quick fox");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn short_and_numeric_tokens_are_untouched() {
        let checker = SpellChecker::new();
        let result = checker.check_spelling("ley 100 de 1993");
        assert!(!result.has_corrections);
    }

    #[test]
    fn fuzzy_match_fixes_close_misspelling() {
        let checker = SpellChecker::new();
        // One transposition away from "tutela".
        let result = checker.check_spelling("tutlea contra sentencia");

        assert!(result.has_corrections);
        assert!(result.corrected_query.starts_with("tutela"));
        assert_eq!(result.corrections[0].kind, CorrectionKind::Spelling);
    }

    #[test]
    fn positions_are_character_offsets() {
        let checker = SpellChecker::new();
        let result = checker.check_spelling("buscar resolucion vigente");

        assert_eq!(result.corrections.len(), 1);
        assert_eq!(result.corrections[0].position, 7);
    }

    #[test]
    fn acronyms_expand_to_official_form() {
        let checker = SpellChecker::new();
        let result = checker.check_spelling("concepto dian sobre retención");

        let acronym = result
            .corrections
            .iter()
            .find(|c| c.kind == CorrectionKind::Acronym)
            .expect("acronym correction");
        assert_eq!(acronym.suggestion, "DIAN");
    }

    #[test]
    fn capitalization_is_preserved() {
        let checker = SpellChecker::new();
        let result = checker.check_spelling("Resolucion 1841");
        assert_eq!(result.corrected_query, "Resolución 1841");
    }

    #[test]
    fn suggestion_uses_did_you_mean_phrasing() {
        let checker = SpellChecker::new();
        let result = checker.check_spelling("resolucion");
        let suggestion = checker.generate_suggestion(&result).expect("suggestion");
        assert_eq!(suggestion, "¿Quiso decir \"resolución\"?");

        // Second call comes from the memo cache and must agree.
        assert_eq!(checker.generate_suggestion(&result), Some(suggestion));
    }

    #[test]
    fn no_suggestion_without_corrections() {
        let checker = SpellChecker::new();
        let result = checker.check_spelling("sentencia de tutela");
        assert!(checker.generate_suggestion(&result).is_none());
    }

    #[test]
    fn overall_confidence_is_the_mean() {
        let checker = SpellChecker::new();
        let result = checker.check_spelling("resolucion y apelacion");
        assert_eq!(result.corrections.len(), 2);
        let expected = (result.corrections[0].confidence + result.corrections[1].confidence) / 2.0;
        assert!((result.confidence - expected).abs() < 1e-6);
    }
}
