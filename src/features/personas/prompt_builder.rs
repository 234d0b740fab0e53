//! Chat system prompt construction
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Memory snippets and living summary sections
//! - 1.0.0: Fluent builder API

use super::Persona;
use crate::features::memory::MemoryHit;

const QUICK_RULES: &str = "Regras rápidas:\n\
- Responda em PT-BR.\n\
- Seja direta e prática.\n\
- Use gírias leves e emojis às vezes.\n\
- Se a pergunta pedir algo que depende de dados atuais, sugira usar /web.";

/// Builder for the system prompt of a plain chat turn
///
/// ```ignore
/// let prompt = PromptBuilder::new(&persona)
///     .with_summary(&summary)
///     .with_memories(&hits)
///     .build();
/// ```
pub struct PromptBuilder<'a> {
    persona: &'a Persona,
    summary: Option<String>,
    memories: Vec<String>,
    quick_rules: bool,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(persona: &'a Persona) -> Self {
        Self {
            persona,
            summary: None,
            memories: Vec::new(),
            quick_rules: true,
        }
    }

    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn with_memories(mut self, hits: &[MemoryHit]) -> Self {
        self.memories = hits.iter().map(|h| h.content.clone()).collect();
        self
    }

    pub fn without_quick_rules(mut self) -> Self {
        self.quick_rules = false;
        self
    }

    pub fn build(self) -> String {
        let mut prompt = self.persona.system_prompt();

        if let Some(summary) = &self.summary {
            prompt.push_str(&format!(
                "\n\nInformações do usuário (resumo vivo):\n{summary}"
            ));
        }

        prompt.push_str("\n\nContexto de memória (pode usar se for relevante):\n");
        prompt.push_str(&self.memories.join("\n"));

        if self.quick_rules {
            prompt.push_str("\n\n");
            prompt.push_str(QUICK_RULES);
        }
        prompt
    }
}

/// Prompt for answering from web search results
pub fn web_answer_prompt(persona: &Persona, results: &str, question: &str) -> String {
    format!(
        "{}\n\nVocê recebeu resultados de busca na web (resuma e responda com base neles).\n\n\
         RESULTADOS:\n{results}\n\nPERGUNTA DO USUÁRIO:\n{question}\n\n\
         Responda direto, do jeito da {} (curto, útil, com gíria leve/emoji na medida).",
        persona.system_prompt(),
        persona.name
    )
}
