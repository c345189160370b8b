//! Prompt assembly for the query transformation call.
//!
//! The prompt is three blocks: a legal-domain context block, a capped set of
//! few-shot examples, and the output contract. When the estimated token
//! count exceeds the configured ceiling the builder degrades in a fixed
//! order: drop the examples block, then the context block, then
//! hard-truncate. The order is a policy constant, tested directly.

use crate::config::PromptConfig;

const CONTEXT_BLOCK: &str = "\
Eres un asistente de búsqueda jurídica sobre un corpus normativo colombiano: \
leyes, decretos, sentencias de la Corte Constitucional y de la Corte Suprema, \
resoluciones, conceptos administrativos y códigos. Tu tarea es convertir la \
consulta del usuario en filtros estructurados de búsqueda.";

const OUTPUT_CONTRACT: &str = r#"Responde únicamente con un objeto JSON con esta forma (todos los campos de "filters" son opcionales):
{
  "intent": "search",
  "entities": [{"type": "NORM_TYPE", "value": "..."}],
  "filters": {
    "normType": "...",
    "jurisdiction": "...",
    "topics": ["..."],
    "keywords": ["..."],
    "dateRange": {"from": "AAAA-MM-DD", "to": "AAAA-MM-DD", "dateType": "promulgacion"},
    "documentState": "...",
    "geographicScope": "...",
    "issuingEntities": ["..."]
  },
  "refinedQuery": "..."
}"#;

/// Few-shot transformation examples, most useful first. The builder takes
/// a prefix of this set.
const FEW_SHOT_EXAMPLES: &[(&str, &str)] = &[
    (
        "leyes sobre pensiones después de 2010",
        r#"{"intent":"search","entities":[{"type":"NORM_TYPE","value":"ley"},{"type":"TOPIC","value":"pensiones"}],"filters":{"normType":"LEY","topics":["pensiones"],"keywords":["régimen pensional"],"dateRange":{"from":"2010-01-01","to":null,"dateType":"promulgacion"}},"refinedQuery":"leyes régimen pensional"}"#,
    ),
    (
        "sentencia C-355 de 2006",
        r#"{"intent":"find_specific_document","entities":[{"type":"CITATION","value":"Sentencia C-355 de 2006"}],"filters":{"normType":"SENTENCIA_CONSTITUCIONAL"},"refinedQuery":"Sentencia C-355 de 2006"}"#,
    ),
    (
        "qué dice la DIAN sobre retención en la fuente",
        r#"{"intent":"search","entities":[{"type":"ENTITY","value":"DIAN"},{"type":"TOPIC","value":"retención en la fuente"}],"filters":{"normType":"CONCEPTO","topics":["retención en la fuente"],"issuingEntities":["DIAN"]},"refinedQuery":"conceptos DIAN retención en la fuente"}"#,
    ),
    (
        "normas vigentes de contratación estatal en Bogotá",
        r#"{"intent":"search","entities":[{"type":"TOPIC","value":"contratación estatal"},{"type":"PLACE","value":"Bogotá"}],"filters":{"topics":["contratación estatal"],"documentState":"vigente","geographicScope":"Bogotá"},"refinedQuery":"contratación estatal vigente Bogotá"}"#,
    ),
    (
        "cambios recientes en el código laboral",
        r#"{"intent":"recent_changes","entities":[{"type":"NORM_TYPE","value":"código"},{"type":"TOPIC","value":"laboral"}],"filters":{"normType":"CODIGO","topics":["derecho laboral"],"keywords":["reforma"]},"refinedQuery":"reformas código sustantivo del trabajo"}"#,
    ),
];

/// A prompt plus what the builder had to drop to fit the ceiling.
#[derive(Debug, Clone)]
pub struct BuiltPrompt {
    pub text: String,
    pub dropped_examples: bool,
    pub dropped_context: bool,
    pub truncated: bool,
}

/// Rough token estimate: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

pub struct PromptBuilder {
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, query: &str) -> BuiltPrompt {
        let examples = self.examples_block();
        let full = Self::assemble(Some(CONTEXT_BLOCK), Some(&examples), query);
        if estimate_tokens(&full) <= self.config.max_prompt_tokens {
            return BuiltPrompt {
                text: full,
                dropped_examples: false,
                dropped_context: false,
                truncated: false,
            };
        }

        let without_examples = Self::assemble(Some(CONTEXT_BLOCK), None, query);
        if estimate_tokens(&without_examples) <= self.config.max_prompt_tokens {
            return BuiltPrompt {
                text: without_examples,
                dropped_examples: true,
                dropped_context: false,
                truncated: false,
            };
        }

        let without_context = Self::assemble(None, None, query);
        if estimate_tokens(&without_context) <= self.config.max_prompt_tokens {
            return BuiltPrompt {
                text: without_context,
                dropped_examples: true,
                dropped_context: true,
                truncated: false,
            };
        }

        let max_chars = self.config.max_prompt_tokens * 4;
        let truncated: String = without_context.chars().take(max_chars).collect();
        BuiltPrompt {
            text: truncated,
            dropped_examples: true,
            dropped_context: true,
            truncated: true,
        }
    }

    fn examples_block(&self) -> String {
        let count = self.config.example_count.min(FEW_SHOT_EXAMPLES.len());
        let mut block = String::from("Ejemplos:\n");
        for (input, output) in &FEW_SHOT_EXAMPLES[..count] {
            block.push_str(&format!("Consulta: {}\nSalida: {}\n", input, output));
        }
        block
    }

    fn assemble(context: Option<&str>, examples: Option<&str>, query: &str) -> String {
        let mut parts = Vec::new();
        if let Some(context) = context {
            parts.push(context.to_string());
        }
        if let Some(examples) = examples {
            parts.push(examples.to_string());
        }
        parts.push(OUTPUT_CONTRACT.to_string());
        parts.push(format!("Consulta: {}\nSalida:", query));
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_prompt_tokens: usize) -> PromptConfig {
        PromptConfig {
            max_prompt_tokens,
            example_count: 4,
            generation_timeout_secs: 10,
        }
    }

    #[test]
    fn full_prompt_fits_under_a_generous_ceiling() {
        let builder = PromptBuilder::new(config(5_000));
        let prompt = builder.build("leyes sobre pensiones");

        assert!(!prompt.dropped_examples);
        assert!(!prompt.dropped_context);
        assert!(!prompt.truncated);
        assert!(prompt.text.contains("Ejemplos:"));
        assert!(prompt.text.contains("corpus normativo"));
        assert!(prompt.text.contains("refinedQuery"));
    }

    #[test]
    fn examples_are_dropped_first() {
        // Big enough for context + contract, too small for examples.
        let builder = PromptBuilder::new(config(350));
        let prompt = builder.build("leyes sobre pensiones");

        assert!(prompt.dropped_examples);
        assert!(!prompt.dropped_context);
        assert!(!prompt.truncated);
        assert!(!prompt.text.contains("Ejemplos:"));
        assert!(prompt.text.contains("corpus normativo"));
    }

    #[test]
    fn context_is_dropped_second() {
        let builder = PromptBuilder::new(config(180));
        let prompt = builder.build("leyes sobre pensiones");

        assert!(prompt.dropped_examples);
        assert!(prompt.dropped_context);
        assert!(!prompt.truncated);
        assert!(!prompt.text.contains("corpus normativo"));
        // The output contract survives every drop stage.
        assert!(prompt.text.contains("refinedQuery"));
    }

    #[test]
    fn hard_truncation_is_the_last_resort() {
        let builder = PromptBuilder::new(config(100));
        let prompt = builder.build(&"palabra ".repeat(500));

        assert!(prompt.truncated);
        assert!(estimate_tokens(&prompt.text) <= 100);
    }

    #[test]
    fn example_count_caps_the_block() {
        let mut cfg = config(100_000);
        cfg.example_count = 2;
        let builder = PromptBuilder::new(cfg);
        let prompt = builder.build("tutela");

        assert_eq!(prompt.text.matches("Consulta:").count(), 3); // 2 examples + the query
    }
}
