//! # Feature: Assistant Persona
//!
//! Name, tagline and speaking style of the assistant. Ships with the "Zoe"
//! persona built in; a YAML file can override any field.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: YAML overrides loaded from PERSONA_CONFIG_PATH
//! - 1.0.0: Initial release with the built-in persona

use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_STYLE: &[&str] = &[
    "Português do Brasil.",
    "Tom jovem, animado e informal.",
    "Use emojis às vezes (sem exagero).",
    "Pode usar gírias leves como “bora”, “top”, “beleza”, “fechou”.",
    "Seja prática e não enrole.",
    "Pareça alguém que tomaria um café com o usuário (acolhedora, mas objetiva).",
    "Quando precisar negar algo, seja firme e educada.",
    "Evite textão: prefira respostas curtas e úteis.",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub name: String,
    pub tagline: String,
    pub one_liner: String,
    /// Style rules rendered as a bullet list in the system prompt
    pub style: Vec<String>,
}

impl Default for Persona {
    fn default() -> Self {
        Persona {
            name: "Zoe".to_string(),
            tagline: "Parceira bro 🤜🤛".to_string(),
            one_liner:
                "Jovem, animada, informal, direta ao ponto — gírias leves e uns emojis na medida."
                    .to_string(),
            style: DEFAULT_STYLE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Persona {
    /// Parse a YAML persona; fields left out keep their defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let persona: Persona = serde_yaml::from_str(yaml)?;
        if persona.name.trim().is_empty() {
            return Err(anyhow::anyhow!("Persona name must not be empty"));
        }
        Ok(persona)
    }

    /// Load from `path` when it exists, otherwise the built-in persona
    pub fn load_or_default(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!("📄 No persona file at {path} - using built-in persona");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let persona = Self::from_yaml(&contents)?;
        info!("📄 Loaded persona '{}' from {path}", persona.name);
        Ok(persona)
    }

    /// Persona block that opens every prompt
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "Você é {}, uma assistente com vibe de parceira “bro” (descontraída).\nEstilo de fala:",
            self.name
        );
        for rule in &self.style {
            prompt.push_str("\n- ");
            prompt.push_str(rule);
        }
        prompt
    }
}
