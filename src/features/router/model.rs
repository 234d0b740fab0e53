//! Model-backed routing and task extraction
//!
//! The model is asked for a single JSON object. Anything around it is ignored,
//! and anything we can't read degrades to plain chat.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Errors are kept on the decision instead of being discarded
//! - 1.0.0: Initial release

use chrono::NaiveDateTime;
use log::{debug, warn};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use super::{Action, RouteDecision, RouteSource};
use crate::core::time::{format_minute, parse_minute, roll_forward};
use crate::core::{non_blank, AssistantError, AssistantResult};
use crate::features::llm::{ChatMessage, ChatModel};
use crate::features::tasks::{Task, TaskDraft, TimeSource};

fn json_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("json block regex compiles"))
}

/// Outermost `{...}` span of a model answer
pub fn extract_json(raw: &str) -> Option<&str> {
    json_block_re().find(raw).map(|m| m.as_str())
}

fn json_object(raw: &str) -> AssistantResult<Map<String, Value>> {
    let block = extract_json(raw)
        .ok_or_else(|| AssistantError::MalformedOutput(format!("no JSON object in {raw:?}")))?;
    match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AssistantError::MalformedOutput("JSON is not an object".into())),
        Err(e) => Err(AssistantError::MalformedOutput(e.to_string())),
    }
}

/// Integers may arrive as numbers or numeric strings
fn lenient_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Decode a routing answer. Unknown actions become chat; a negative index or
/// zero minutes mean "not given".
pub fn parse_route(raw: &str) -> AssistantResult<RouteDecision> {
    let map = json_object(raw)?;

    let action = map
        .get("action")
        .or_else(|| map.get("Action"))
        .and_then(Value::as_str)
        .and_then(Action::from_wire)
        .unwrap_or(Action::Chat);

    let task_index = lenient_int(map.get("task_index"))
        .filter(|i| *i >= 0)
        .map(|i| i as usize);
    let minutes = lenient_int(map.get("minutes")).filter(|m| *m > 0);
    let search_query = map
        .get("search_query")
        .and_then(Value::as_str)
        .and_then(non_blank);

    Ok(RouteDecision {
        task_index,
        minutes,
        search_query,
        ..RouteDecision::new(action, RouteSource::Model)
    })
}

pub fn routing_prompt(text: &str, tasks: &[Task], now: NaiveDateTime) -> String {
    let pending = if tasks.is_empty() {
        "(nenhuma)".to_string()
    } else {
        tasks
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{i}: {} ({})", t.description, t.due_label()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Você classifica mensagens de um assistente pessoal.\n\n\
         Agora é {}.\nTarefas pendentes:\n{pending}\n\n\
         Mensagem do usuário: \"{text}\"\n\n\
         Responda APENAS o JSON:\n\
         {{\n  \"action\": \"TASK_CREATE\" ou \"TASK_DONE\" ou \"TASK_SNOOZE\" ou \"TASK_SILENCE\" ou \"WEB_SEARCH\" ou \"CHAT\",\n  \
         \"task_index\": (número da tarefa ou -1),\n  \
         \"minutes\": (minutos para adiar ou 0),\n  \
         \"search_query\": (termo de busca ou \"\")\n}}",
        format_minute(&now)
    )
}

/// Ask the model to classify `text`. Never fails: provider errors and
/// unreadable answers fall back to chat with the reason attached.
pub async fn route_with_model(
    model: &dyn ChatModel,
    text: &str,
    tasks: &[Task],
    now: NaiveDateTime,
) -> RouteDecision {
    let prompt = routing_prompt(text, tasks, now);
    let result = match model.complete(&[ChatMessage::user(prompt)], 0.0).await {
        Ok(raw) => parse_route(&raw),
        Err(e) => Err(e),
    };

    match result {
        Ok(decision) => {
            debug!("Model routed to {}", decision.action.as_str());
            decision
        }
        Err(e) => {
            warn!("Routing fell back to chat: {e}");
            RouteDecision::new(Action::Chat, RouteSource::Fallback(e))
        }
    }
}

/// Task description and time pulled out by the model. A time already in the
/// past is rolled forward.
pub async fn extract_task_with_model(
    model: &dyn ChatModel,
    text: &str,
    now: NaiveDateTime,
) -> AssistantResult<TaskDraft> {
    let prompt = format!(
        "Agora é {}. O usuário disse: \"{text}\".\n\
         Extraia JSON: {{\"descricao\": \"...\", \"data_hora\": \"YYYY-MM-DD HH:MM\"}}\n\
         Se a hora não for dita, assuma o próximo horário lógico.",
        format_minute(&now)
    );
    let raw = model.complete(&[ChatMessage::user(prompt)], 0.0).await?;
    let map = json_object(&raw)?;

    let description = map
        .get("descricao")
        .or_else(|| map.get("description"))
        .and_then(Value::as_str)
        .and_then(non_blank)
        .ok_or_else(|| AssistantError::MalformedOutput("missing descricao".into()))?;
    let due_raw = map
        .get("data_hora")
        .or_else(|| map.get("due_at"))
        .and_then(Value::as_str)
        .ok_or_else(|| AssistantError::MalformedOutput("missing data_hora".into()))?;
    let due_at = roll_forward(parse_minute(due_raw.trim())?, now);

    Ok(TaskDraft {
        description,
        due_at,
        time_source: TimeSource::Model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::llm::client::testing::ScriptedModel;

    fn now() -> NaiveDateTime {
        parse_minute("2026-10-17 10:00").unwrap()
    }

    #[test]
    fn test_extract_json_from_chatter() {
        let raw = "Claro! Aqui está:\n```json\n{\"action\": \"CHAT\"}\n```";
        assert_eq!(extract_json(raw), Some("{\"action\": \"CHAT\"}"));
        assert_eq!(extract_json("sem json"), None);
    }

    #[test]
    fn test_parse_route_full() {
        let decision = parse_route(
            r#"{"action": "TASK_SNOOZE", "task_index": "1", "minutes": 20, "search_query": ""}"#,
        )
        .unwrap();
        assert_eq!(decision.action, Action::TaskSnooze);
        assert_eq!(decision.task_index, Some(1));
        assert_eq!(decision.minutes, Some(20));
        assert_eq!(decision.search_query, None);
        assert!(matches!(decision.source, RouteSource::Model));
    }

    #[test]
    fn test_parse_route_aliases_and_defaults() {
        let decision = parse_route(r#"{"Action": "web_search", "task_index": -1}"#).unwrap();
        assert_eq!(decision.action, Action::WebSearch);
        assert_eq!(decision.task_index, None);

        let decision = parse_route(r#"{"action": "DANCE"}"#).unwrap();
        assert_eq!(decision.action, Action::Chat);
    }

    #[test]
    fn test_parse_route_malformed() {
        assert!(matches!(
            parse_route("{action: TASK_DONE"),
            Err(AssistantError::MalformedOutput(_))
        ));
        assert!(matches!(
            parse_route("{not json at all}"),
            Err(AssistantError::MalformedOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_answer_falls_back_to_chat() {
        let model = ScriptedModel::replying("acho que é TASK_DONE {\"action\": ");
        let decision = route_with_model(&model, "sei lá", &[], now()).await;
        assert_eq!(decision.action, Action::Chat);
        assert!(matches!(
            decision.source,
            RouteSource::Fallback(AssistantError::MalformedOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_chat() {
        let model = ScriptedModel::new(vec![Err(AssistantError::Provider("timeout".into()))]);
        let decision = route_with_model(&model, "sei lá", &[], now()).await;
        assert_eq!(decision.action, Action::Chat);
        assert!(matches!(decision.source, RouteSource::Fallback(ref e) if e.is_provider()));
    }

    #[tokio::test]
    async fn test_routing_prompt_lists_tasks() {
        let task = Task::new("pagar boleto", parse_minute("2026-10-17 15:00").unwrap(), now());
        let model = ScriptedModel::replying(r#"{"action": "TASK_DONE", "task_index": 0}"#);
        let decision = route_with_model(&model, "paguei", &[task], now()).await;
        assert_eq!(decision.action, Action::TaskDone);
        assert_eq!(decision.task_index, Some(0));

        let prompt = &model.prompts.lock().unwrap()[0][0].content;
        assert!(prompt.contains("0: pagar boleto (2026-10-17 15:00)"));
        assert!(prompt.contains("Agora é 2026-10-17 10:00"));
    }

    #[tokio::test]
    async fn test_extract_task_with_model_rolls_forward() {
        let model = ScriptedModel::replying(
            r#"{"descricao": "ligar pro banco", "data_hora": "2026-10-17 03:00"}"#,
        );
        let draft = extract_task_with_model(&model, "ligar pro banco às 3", now())
            .await
            .unwrap();
        assert_eq!(draft.description, "ligar pro banco");
        assert_eq!(draft.due_at, parse_minute("2026-10-17 15:00").unwrap());
        assert_eq!(draft.time_source, TimeSource::Model);
    }

    #[tokio::test]
    async fn test_extract_task_with_model_bad_time() {
        let model = ScriptedModel::replying(r#"{"descricao": "x", "data_hora": "amanhã"}"#);
        let err = extract_task_with_model(&model, "x", now()).await.unwrap_err();
        assert!(matches!(err, AssistantError::InvalidTimestamp(_)));
    }
}
