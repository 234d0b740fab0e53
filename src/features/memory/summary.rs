//! Living summary of what the assistant knows about the user
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use log::{info, warn};
use std::path::PathBuf;

use crate::core::AssistantResult;
use crate::features::llm::{ChatMessage, ChatModel};
use crate::features::personas::Persona;

pub const EMPTY_SUMMARY: &str = "Resumo vazio.";

#[derive(Debug, Clone)]
pub struct SummaryStore {
    path: PathBuf,
}

impl SummaryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SummaryStore { path: path.into() }
    }

    /// Current summary; missing, unreadable or blank file reads as [`EMPTY_SUMMARY`]
    pub async fn load(&self) -> String {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => EMPTY_SUMMARY.to_string(),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Could not read summary {}: {e}", self.path.display());
                }
                EMPTY_SUMMARY.to_string()
            }
        }
    }

    /// Overwrite the summary; blank text is ignored
    pub async fn save(&self, text: &str) -> AssistantResult<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        tokio::fs::write(&self.path, text.trim()).await?;
        Ok(())
    }

    /// Ask the model to merge `new_info` into the summary. Failures leave the file as it was.
    pub async fn update_with_model(&self, model: &dyn ChatModel, persona: &Persona, new_info: &str) {
        if new_info.trim().is_empty() {
            return;
        }
        let current = self.load().await;
        let prompt = format!(
            "{}\n\nAtualize o RESUMO VIVO do usuário. Mantenha curto (max 20 linhas).\n\n\
             RESUMO ATUAL:\n{current}\n\nNOVA INFO:\n{new_info}\n\nDevolva APENAS o resumo novo.",
            persona.system_prompt()
        );

        match model.complete(&[ChatMessage::user(prompt)], 0.2).await {
            Ok(updated) => match self.save(&updated).await {
                Ok(()) => info!("Living summary updated"),
                Err(e) => warn!("Failed to write summary: {e}"),
            },
            Err(e) => warn!("Summary update skipped: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AssistantError;
    use crate::features::llm::client::testing::ScriptedModel;

    fn scratch() -> (tempfile::TempDir, SummaryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SummaryStore::new(dir.path().join("summary.txt"));
        (dir, store)
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty_summary() {
        let (_dir, store) = scratch();
        assert_eq!(store.load().await, EMPTY_SUMMARY);
    }

    #[tokio::test]
    async fn test_blank_save_ignored() {
        let (_dir, store) = scratch();
        store.save("Gosta de café").await.unwrap();
        store.save("   ").await.unwrap();
        assert_eq!(store.load().await, "Gosta de café");
    }

    #[tokio::test]
    async fn test_update_with_model_writes_answer() {
        let (_dir, store) = scratch();
        let model = ScriptedModel::replying("- Concluiu: pagar conta");
        store
            .update_with_model(&model, &Persona::default(), "Concluiu: pagar conta")
            .await;
        assert_eq!(store.load().await, "- Concluiu: pagar conta");

        let prompt = &model.prompts.lock().unwrap()[0][0].content;
        assert!(prompt.contains("RESUMO ATUAL:\nResumo vazio."));
        assert!(prompt.contains("NOVA INFO:\nConcluiu: pagar conta"));
    }

    #[tokio::test]
    async fn test_update_failure_keeps_summary() {
        let (_dir, store) = scratch();
        store.save("antigo").await.unwrap();
        let model = ScriptedModel::new(vec![Err(AssistantError::Provider("down".into()))]);
        store.update_with_model(&model, &Persona::default(), "nova").await;
        assert_eq!(store.load().await, "antigo");
    }
}
