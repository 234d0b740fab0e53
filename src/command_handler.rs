use anyhow::Result;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;

use crate::core::time::format_minute;
use crate::core::{preview, AssistantError, AssistantResult};
use crate::features::audio::{read_clip, Transcriber};
use crate::features::llm::{ChatMessage, ChatModel};
use crate::features::memory::{EventKind, EventLog, MemoryHit, SummaryStore, DEFAULT_RECALL_LIMIT};
use crate::features::personas::{web_answer_prompt, Persona, PromptBuilder};
use crate::features::router::{
    extract_task_with_model, resolve_target, route, Action, RouteDecision, DEFAULT_SNOOZE_MINUTES,
};
use crate::features::search::{render_results, WebSearch};
use crate::features::tasks::{extract_task, Task, TaskDraft, TaskStore, TimeSource};
use crate::session::Session;

/// Session messages sent along with a chat turn
pub const CHAT_CONTEXT_MESSAGES: usize = 8;

const CHAT_TEMPERATURE: f32 = 0.2;

const EMPTY_AGENDA: &str = "Não tem nada na agenda agora — tá suave 😄";
const CHAT_FAILED: &str = "Ops, deu um errinho pra gerar a resposta agora 😅 Tenta de novo?";
const WEB_FAILED: &str = "Deu ruim pra consultar a web agora 😅 Tenta de novo daqui a pouquinho.";
const WEB_DISABLED: &str =
    "Busca na web não tá configurada aqui (falta a TAVILY_API_KEY) 😅 Posso responder de cabeça se quiser.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub web_used: bool,
    pub action: Action,
}

impl Reply {
    fn new(action: Action, text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            web_used: false,
            action,
        }
    }
}

#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<dyn TaskStore>,
    events: EventLog,
    summary: SummaryStore,
    model: Arc<dyn ChatModel>,
    persona: Persona,
    search: Option<Arc<dyn WebSearch>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    default_task_hour: u32,
}

impl CommandHandler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        events: EventLog,
        summary: SummaryStore,
        model: Arc<dyn ChatModel>,
        persona: Persona,
        default_task_hour: u32,
    ) -> Self {
        CommandHandler {
            store,
            events,
            summary,
            model,
            persona,
            search: None,
            transcriber: None,
            default_task_hour,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Process one user message. `None` when the input is blank or a double submit.
    pub async fn handle_message(
        &self,
        session: &mut Session,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<Option<Reply>> {
        if !session.should_process_input(text, Instant::now()) {
            debug!("Ignoring blank or repeated input");
            return Ok(None);
        }
        let text = text.trim();
        info!("💬 User: {}", preview(text));

        session.push_user(text);
        self.events.record(EventKind::ChatUser, text).await;

        let tasks = self.store.list().await?;
        let decision = route(text, &tasks, self.model.as_ref(), now, self.default_task_hour).await;
        info!("Routed to {} ({:?})", decision.action.as_str(), decision.source);

        let reply = match decision.action {
            Action::TaskCreate => self.create_from_text(text, decision, now).await?,
            Action::TaskDone => self.done_from_text(text, &decision, &tasks).await?,
            Action::TaskSnooze => self.snooze_from_text(text, &decision, &tasks, now).await?,
            Action::TaskSilence => self.silence_from_text(text, &decision, &tasks, now).await?,
            Action::WebSearch => self.web_answer(text, decision.search_query.as_deref()).await,
            Action::Chat => self.chat(session, text).await,
        };

        session.push_assistant(reply.text.clone(), reply.web_used);
        self.events.record(EventKind::ChatAssistant, &reply.text).await;
        Ok(Some(reply))
    }

    async fn create_from_text(
        &self,
        text: &str,
        decision: RouteDecision,
        now: NaiveDateTime,
    ) -> Result<Reply> {
        let draft = match decision.draft {
            Some(draft) if draft.time_source != TimeSource::Default => draft,
            fallback => self.draft_with_model(text, fallback, now).await,
        };

        let task = Task::new(draft.description, draft.due_at, now);
        self.store.insert(&task).await?;
        info!("📝 Task {} created for {}", task.id, task.due_label());

        let reply = format!(
            "Fechou! ✅ Agendei **{}** pra **{}**.",
            task.description,
            task.due_label()
        );
        self.events.record(EventKind::TaskCreate, &reply).await;
        self.update_summary(&format!("Nova tarefa: {} @ {}", task.description, task.due_label()))
            .await;
        Ok(Reply::new(Action::TaskCreate, reply))
    }

    /// Let the model find the time; fall back to the local parse with the default hour
    async fn draft_with_model(
        &self,
        text: &str,
        fallback: Option<TaskDraft>,
        now: NaiveDateTime,
    ) -> TaskDraft {
        match extract_task_with_model(self.model.as_ref(), text, now).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!("Task extraction by model failed, using default hour: {e}");
                fallback.unwrap_or_else(|| extract_task(text, now, self.default_task_hour))
            }
        }
    }

    async fn done_from_text(&self, text: &str, decision: &RouteDecision, tasks: &[Task]) -> Result<Reply> {
        let target = match resolve_target(decision, text, tasks) {
            Ok(task) => task,
            Err(AssistantError::NoMatchingTask) => return Ok(Reply::new(Action::TaskDone, EMPTY_AGENDA)),
            Err(e) => return Err(e.into()),
        };
        let task = self.complete_task(&target.id).await?;
        Ok(Reply::new(
            Action::TaskDone,
            format!("Top! ✅ Marquei como feito: **{}**.", task.description),
        ))
    }

    async fn snooze_from_text(
        &self,
        text: &str,
        decision: &RouteDecision,
        tasks: &[Task],
        now: NaiveDateTime,
    ) -> Result<Reply> {
        let target = match resolve_target(decision, text, tasks) {
            Ok(task) => task,
            Err(AssistantError::NoMatchingTask) => return Ok(Reply::new(Action::TaskSnooze, EMPTY_AGENDA)),
            Err(e) => return Err(e.into()),
        };
        let minutes = decision.minutes.unwrap_or(DEFAULT_SNOOZE_MINUTES);
        let task = self.snooze_task(&target.id, minutes, now).await?;
        let until = task.snoozed_until.unwrap_or(task.next_remind_at);
        Ok(Reply::new(
            Action::TaskSnooze,
            format!(
                "Beleza! ⏰ Adiei **{}** por {minutes} min, te chamo de novo às **{}**.",
                task.description,
                until.format("%H:%M")
            ),
        ))
    }

    async fn silence_from_text(
        &self,
        text: &str,
        decision: &RouteDecision,
        tasks: &[Task],
        now: NaiveDateTime,
    ) -> Result<Reply> {
        let target = match resolve_target(decision, text, tasks) {
            Ok(task) => task,
            Err(AssistantError::NoMatchingTask) => return Ok(Reply::new(Action::TaskSilence, EMPTY_AGENDA)),
            Err(e) => return Err(e.into()),
        };
        let task = self.silence_task(&target.id, now).await?;
        Ok(Reply::new(
            Action::TaskSilence,
            format!("Fechou 🔕 Não te lembro mais de **{}**.", task.description),
        ))
    }

    async fn web_answer(&self, text: &str, query: Option<&str>) -> Reply {
        let query = query.unwrap_or(text);
        let Some(search) = &self.search else {
            return Reply::new(Action::WebSearch, WEB_DISABLED);
        };

        let answer = match search.search(query).await {
            Ok(hits) => {
                let prompt = web_answer_prompt(&self.persona, &render_results(&hits), text);
                self.model
                    .complete(&[ChatMessage::user(prompt)], CHAT_TEMPERATURE)
                    .await
            }
            Err(e) => Err(e),
        };
        self.events.record(EventKind::WebSearch, &format!("Q: {query}")).await;

        match answer {
            Ok(text) => Reply {
                text,
                web_used: true,
                action: Action::WebSearch,
            },
            Err(e) => {
                warn!("Web answer failed: {e}");
                Reply::new(Action::WebSearch, WEB_FAILED)
            }
        }
    }

    async fn chat(&self, session: &Session, text: &str) -> Reply {
        let summary = self.summary.load().await;
        let memories: Vec<MemoryHit> = match self.events.search(text, DEFAULT_RECALL_LIMIT + 1).await {
            Ok(hits) => hits
                .into_iter()
                .filter(|h| h.content != text)
                .take(DEFAULT_RECALL_LIMIT)
                .collect(),
            Err(e) => {
                warn!("Memory recall failed: {e}");
                Vec::new()
            }
        };

        let system = PromptBuilder::new(&self.persona)
            .with_summary(&summary)
            .with_memories(&memories)
            .build();
        let mut messages = vec![ChatMessage::system(system)];
        messages.extend(session.recent(CHAT_CONTEXT_MESSAGES));

        match self.model.complete(&messages, CHAT_TEMPERATURE).await {
            Ok(answer) => Reply::new(Action::Chat, answer),
            Err(e) => {
                warn!("Chat completion failed: {e}");
                Reply::new(Action::Chat, CHAT_FAILED)
            }
        }
    }

    async fn update_summary(&self, new_info: &str) {
        self.summary
            .update_with_model(self.model.as_ref(), &self.persona, new_info)
            .await;
    }

    /// Pending tasks, earliest due first
    pub async fn list_tasks(&self) -> AssistantResult<Vec<Task>> {
        let mut tasks = self.store.list().await?;
        tasks.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.id.cmp(&b.id)));
        Ok(tasks)
    }

    /// Remove a task for good
    pub async fn complete_task(&self, id: &str) -> AssistantResult<Task> {
        let task = self.store.get(id).await?.ok_or(AssistantError::NoMatchingTask)?;
        if !self.store.remove(id).await? {
            return Err(AssistantError::NoMatchingTask);
        }
        info!("✅ Task {id} done");
        self.events
            .record(
                EventKind::TaskDone,
                &format!("Top! ✅ Marquei como feito: **{}**.", task.description),
            )
            .await;
        self.update_summary(&format!("Concluiu: {}", task.description)).await;
        Ok(task)
    }

    pub async fn snooze_task(&self, id: &str, minutes: i64, now: NaiveDateTime) -> AssistantResult<Task> {
        let mut task = self.store.get(id).await?.ok_or(AssistantError::NoMatchingTask)?;
        task.snooze(now, minutes);
        self.store.update(&task).await?;
        info!("⏰ Task {id} snoozed until {}", format_minute(&task.next_remind_at));
        self.events
            .record(
                EventKind::TaskSnooze,
                &format!("Adiado: {} até {}", task.description, format_minute(&task.next_remind_at)),
            )
            .await;
        Ok(task)
    }

    pub async fn silence_task(&self, id: &str, now: NaiveDateTime) -> AssistantResult<Task> {
        let mut task = self.store.get(id).await?.ok_or(AssistantError::NoMatchingTask)?;
        task.silence(now);
        self.store.update(&task).await?;
        info!("🔕 Task {id} silenced");
        self.events
            .record(EventKind::TaskSilence, &format!("Silenciado: {}", task.description))
            .await;
        Ok(task)
    }

    /// Transcribe a voice note. `None` when the same clip was already handled.
    pub async fn transcribe(&self, session: &mut Session, path: &str) -> AssistantResult<Option<String>> {
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or_else(|| AssistantError::Config("transcription is not configured".into()))?;
        let clip = read_clip(path).await?;
        if !session.register_audio(&clip.bytes) {
            debug!("Same audio clip again, skipping");
            return Ok(None);
        }
        let text = match transcriber.transcribe(clip).await {
            Ok(text) => text,
            Err(e) => {
                // a failed clip may be retried
                session.forget_audio();
                return Err(e);
            }
        };
        self.events.record(EventKind::Transcription, &text).await;
        Ok(Some(text))
    }

    pub async fn summary(&self) -> String {
        self.summary.load().await
    }

    pub async fn recall(&self, query: &str) -> AssistantResult<Vec<MemoryHit>> {
        self.events.search(query, DEFAULT_RECALL_LIMIT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::{parse_minute, Clock};
    use crate::database::Database;
    use crate::features::audio::transcriber::testing::FixedTranscriber;
    use crate::features::llm::client::testing::ScriptedModel;
    use crate::features::search::tavily::testing::StaticSearch;
    use crate::features::search::SearchHit;
    use crate::features::tasks::{SqliteTaskStore, TaskStatus};

    fn at(s: &str) -> NaiveDateTime {
        parse_minute(s).unwrap()
    }

    fn now() -> NaiveDateTime {
        at("2026-10-17 10:00")
    }

    struct Fixture {
        handler: CommandHandler,
        store: Arc<SqliteTaskStore>,
        model: Arc<ScriptedModel>,
        dir: tempfile::TempDir,
    }

    async fn fixture(answers: Vec<AssistantResult<String>>) -> Fixture {
        let database = Database::in_memory().await.unwrap();
        let store = Arc::new(SqliteTaskStore::new(database.clone()));
        let events = EventLog::new(database, Clock::from_offset_hours(-3));
        let dir = tempfile::tempdir().unwrap();
        let summary = SummaryStore::new(dir.path().join("summary.txt"));
        let model = Arc::new(ScriptedModel::new(answers));
        let handler = CommandHandler::new(
            store.clone(),
            events,
            summary,
            model.clone(),
            Persona::default(),
            9,
        );
        Fixture {
            handler,
            store,
            model,
            dir,
        }
    }

    async fn say(f: &Fixture, session: &mut Session, text: &str) -> Reply {
        f.handler.handle_message(session, text, now()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_remind_me_creates_task_without_routing_call() {
        let f = fixture(vec![Ok("- Tem que fazer X às 19:19".into())]).await;
        let mut session = Session::new();

        let reply = say(&f, &mut session, "me lembra de X às 19:19").await;
        assert_eq!(reply.action, Action::TaskCreate);
        assert_eq!(reply.text, "Fechou! ✅ Agendei **X** pra **2026-10-17 19:19**.");

        let tasks = f.store.list().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].due_at, at("2026-10-17 19:19"));
        // only the summary update reached the model
        assert_eq!(f.model.calls(), 1);
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_create_without_time_asks_model() {
        let f = fixture(vec![
            Ok(r#"{"descricao": "pagar a conta", "data_hora": "2026-10-17 18:00"}"#.into()),
            Ok("resumo".into()),
        ])
        .await;
        let mut session = Session::new();

        let reply = say(&f, &mut session, "me lembra de pagar a conta").await;
        assert_eq!(reply.text, "Fechou! ✅ Agendei **pagar a conta** pra **2026-10-17 18:00**.");
    }

    #[tokio::test]
    async fn test_create_falls_back_to_default_hour() {
        let f = fixture(vec![Ok("não sei".into())]).await;
        let mut session = Session::new();

        say(&f, &mut session, "me lembra de pagar a conta").await;
        let tasks = f.store.list().await.unwrap();
        assert_eq!(tasks[0].due_at, at("2026-10-18 09:00"));
    }

    #[tokio::test]
    async fn test_done_with_empty_agenda() {
        let f = fixture(vec![]).await;
        let mut session = Session::new();
        let reply = say(&f, &mut session, "já fiz").await;
        assert_eq!(reply.action, Action::TaskDone);
        assert_eq!(reply.text, EMPTY_AGENDA);
    }

    #[tokio::test]
    async fn test_done_removes_matching_task() {
        let f = fixture(vec![Ok("resumo".into())]).await;
        f.store
            .insert(&Task::new("levar o cachorro", at("2026-10-17 09:00"), now()))
            .await
            .unwrap();
        f.store
            .insert(&Task::new("pagar boleto", at("2026-10-17 12:00"), now()))
            .await
            .unwrap();
        let mut session = Session::new();

        let reply = say(&f, &mut session, "já fiz o boleto").await;
        assert_eq!(reply.text, "Top! ✅ Marquei como feito: **pagar boleto**.");
        let left = f.store.list().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].description, "levar o cachorro");
    }

    #[tokio::test]
    async fn test_snooze_and_silence_from_text() {
        let f = fixture(vec![]).await;
        let task = Task::new("tomar remédio", at("2026-10-17 09:00"), now());
        f.store.insert(&task).await.unwrap();
        let mut session = Session::new();

        let reply = say(&f, &mut session, "adia 20 min").await;
        assert_eq!(reply.action, Action::TaskSnooze);
        let stored = f.store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.next_remind_at, at("2026-10-17 10:20"));

        let reply = say(&f, &mut session, "para de me lembrar do remédio").await;
        assert_eq!(reply.action, Action::TaskSilence);
        let stored = f.store.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Silenced);
    }

    #[tokio::test]
    async fn test_malformed_routing_answer_becomes_chat() {
        let f = fixture(vec![Ok("{{{ nada".into()), Ok("E aí! Tudo certo 😄".into())]).await;
        let mut session = Session::new();

        let reply = say(&f, &mut session, "bom dia zoe").await;
        assert_eq!(reply.action, Action::Chat);
        assert_eq!(reply.text, "E aí! Tudo certo 😄");

        let prompts = f.model.prompts.lock().unwrap();
        let chat = &prompts[1];
        assert!(chat[0].content.starts_with("Você é Zoe"));
        assert_eq!(chat.last().unwrap().content, "bom dia zoe");
    }

    #[tokio::test]
    async fn test_chat_failure_is_friendly() {
        let f = fixture(vec![Ok(r#"{"action": "CHAT"}"#.into())]).await;
        let mut session = Session::new();
        let reply = say(&f, &mut session, "conta uma piada").await;
        assert_eq!(reply.text, CHAT_FAILED);
    }

    #[tokio::test]
    async fn test_web_search_without_backend() {
        let f = fixture(vec![]).await;
        let mut session = Session::new();
        let reply = say(&f, &mut session, "/web preço do café").await;
        assert_eq!(reply.action, Action::WebSearch);
        assert_eq!(reply.text, WEB_DISABLED);
        assert!(!reply.web_used);
    }

    #[tokio::test]
    async fn test_web_search_answers_from_results() {
        let mut f = fixture(vec![Ok("Tá R$ 5,10 hoje 💸".into())]).await;
        f.handler = f.handler.with_search(Arc::new(StaticSearch {
            result: Ok(vec![SearchHit {
                title: "Dólar".into(),
                content: "R$ 5,10".into(),
                url: String::new(),
            }]),
        }));
        let mut session = Session::new();

        let reply = say(&f, &mut session, "cotação do dólar").await;
        assert!(reply.web_used);
        assert_eq!(reply.text, "Tá R$ 5,10 hoje 💸");
        assert!(session.history().last().unwrap().web_used);

        let prompt = &f.model.prompts.lock().unwrap()[0][0].content;
        assert!(prompt.contains("Dólar: R$ 5,10"));
    }

    #[tokio::test]
    async fn test_web_search_failure_apologizes() {
        let mut f = fixture(vec![]).await;
        f.handler = f.handler.with_search(Arc::new(StaticSearch {
            result: Err("timeout".into()),
        }));
        let mut session = Session::new();
        let reply = say(&f, &mut session, "/web clima amanhã").await;
        assert_eq!(reply.text, WEB_FAILED);
    }

    #[tokio::test]
    async fn test_repeated_input_ignored() {
        let f = fixture(vec![]).await;
        let mut session = Session::new();
        say(&f, &mut session, "já fiz").await;
        let again = f.handler.handle_message(&mut session, "já fiz", now()).await.unwrap();
        assert!(again.is_none());
        assert!(f.handler.handle_message(&mut session, "   ", now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_direct_operations() {
        let f = fixture(vec![Ok("resumo".into())]).await;
        let late = Task::new("b", at("2026-10-17 15:00"), now());
        let early = Task::new("a", at("2026-10-17 11:00"), now());
        f.store.insert(&late).await.unwrap();
        f.store.insert(&early).await.unwrap();

        let listed = f.handler.list_tasks().await.unwrap();
        assert_eq!(listed[0].description, "a");

        let silenced = f.handler.silence_task(&early.id, now()).await.unwrap();
        assert_eq!(silenced.status, TaskStatus::Silenced);
        let snoozed = f.handler.snooze_task(&early.id, 15, now()).await.unwrap();
        assert_eq!(snoozed.status, TaskStatus::Active);
        assert_eq!(snoozed.next_remind_at, at("2026-10-17 10:15"));

        f.handler.complete_task(&late.id).await.unwrap();
        assert!(matches!(
            f.handler.complete_task(&late.id).await,
            Err(AssistantError::NoMatchingTask)
        ));
        assert_eq!(f.handler.summary().await, "resumo");
    }

    #[tokio::test]
    async fn test_transcribe_requires_configuration() {
        let f = fixture(vec![]).await;
        let mut session = Session::new();
        assert!(matches!(
            f.handler.transcribe(&mut session, "nota.wav").await,
            Err(AssistantError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_repeated_clip_is_not_uploaded_again() {
        let f = fixture(vec![]).await;
        let transcriber = Arc::new(FixedTranscriber::new("me lembra de regar as plantas"));
        let handler = f.handler.clone().with_transcriber(transcriber.clone());
        let path = f.dir.path().join("nota.wav");
        std::fs::write(&path, b"RIFF....WAVE").unwrap();
        let path = path.to_str().unwrap();
        let mut session = Session::new();

        let first = handler.transcribe(&mut session, path).await.unwrap();
        assert_eq!(first.as_deref(), Some("me lembra de regar as plantas"));
        assert_eq!(handler.transcribe(&mut session, path).await.unwrap(), None);
        assert_eq!(transcriber.uploads(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_clip_never_reaches_transcriber() {
        let f = fixture(vec![]).await;
        let transcriber = Arc::new(FixedTranscriber::new("oi"));
        let handler = f.handler.clone().with_transcriber(transcriber.clone());
        let mut session = Session::new();

        assert!(matches!(
            handler.transcribe(&mut session, "foto.png").await,
            Err(AssistantError::Unsupported(_))
        ));
        assert_eq!(transcriber.uploads(), 0);
    }
}
