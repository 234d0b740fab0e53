use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};

use zoe::core::{format_minute, Clock, Config, TaskBackend};
use zoe::database::Database;
use zoe::features::audio::AudioTranscriber;
use zoe::features::llm::OpenAiChatModel;
use zoe::features::memory::{EventLog, SummaryStore};
use zoe::features::personas::Persona;
use zoe::features::reminders::{Alert, ReminderPolicy, ReminderScheduler};
use zoe::features::router::DEFAULT_SNOOZE_MINUTES;
use zoe::features::search::TavilySearch;
use zoe::features::tasks::{import_legacy_json, JsonTaskStore, SqliteTaskStore, Task, TaskStore};
use zoe::{CommandHandler, Session};

const HELP: &str = "Comandos: /tasks, /done <id>, /snooze <id> [min], /silence <id>, \
/summary, /memory <busca>, /audio <arquivo>, /clear, /quit";

async fn open_task_store(
    config: &Config,
    database: &Database,
    clock: Clock,
) -> Result<Arc<dyn TaskStore>> {
    match config.task_backend {
        TaskBackend::Json => {
            info!("🗂️ Using JSON task store at {}", config.tasks_path);
            Ok(Arc::new(JsonTaskStore::new(&config.tasks_path).with_clock(clock)))
        }
        TaskBackend::Sqlite => {
            let store = SqliteTaskStore::new(database.clone());
            match import_legacy_json(&config.tasks_path, &store, clock).await {
                Ok(0) => {}
                Ok(n) => info!("📥 Imported {n} tasks from {}", config.tasks_path),
                Err(e) => warn!("Legacy task import skipped: {e}"),
            }
            Ok(Arc::new(store))
        }
    }
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("Nada pendente. ✨");
        return;
    }
    for task in tasks {
        let status = if task.is_active() { "⏳" } else { "🔕" };
        println!(
            "{status} [{}] {} @ {} (avisos: {})",
            task.id,
            task.description,
            task.due_label(),
            task.remind_count
        );
    }
}

fn print_alert(alert: &Alert) {
    println!("\n{}\n", alert.message());
}

/// Handle a `/command`; returns false when the session should end
async fn run_command(
    handler: &CommandHandler,
    session: &Arc<Mutex<Session>>,
    clock: &Clock,
    line: &str,
) -> Result<bool> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).unwrap_or_default();
    let now = clock.now_floor_minute();

    match command {
        "/quit" | "/exit" => return Ok(false),
        "/help" => println!("{HELP}"),
        "/tasks" => print_tasks(&handler.list_tasks().await?),
        "/done" => match handler.complete_task(arg).await {
            Ok(task) => println!("Top! ✅ Marquei como feito: {}", task.description),
            Err(e) => println!("Não rolou: {e}"),
        },
        "/snooze" => {
            let mut args = arg.split_whitespace();
            let id = args.next().unwrap_or_default();
            let minutes = args
                .next()
                .and_then(|m| m.parse::<i64>().ok())
                .unwrap_or(DEFAULT_SNOOZE_MINUTES);
            match handler.snooze_task(id, minutes, now).await {
                Ok(task) => println!(
                    "⏰ {} adiada pra {}",
                    task.description,
                    format_minute(&task.next_remind_at)
                ),
                Err(e) => println!("Não rolou: {e}"),
            }
        }
        "/silence" => match handler.silence_task(arg, now).await {
            Ok(task) => println!("🔕 {} silenciada", task.description),
            Err(e) => println!("Não rolou: {e}"),
        },
        "/summary" => println!("{}", handler.summary().await),
        "/memory" => {
            for hit in handler.recall(arg).await? {
                println!("[{}] {}: {}", hit.ts, hit.kind, hit.content);
            }
        }
        "/audio" => {
            let transcript = {
                let mut session = session.lock().await;
                handler.transcribe(&mut session, arg).await
            };
            match transcript {
                Ok(Some(text)) => {
                    println!("🎙️ {text}");
                    let now = clock.now_floor_minute();
                    let mut session = session.lock().await;
                    if let Some(reply) = handler.handle_message(&mut session, &text, now).await? {
                        println!("{}", reply.text);
                    }
                }
                Ok(None) => println!("Esse áudio eu já ouvi 😉"),
                Err(e) => println!("Não consegui transcrever: {e}"),
            }
        }
        "/clear" => {
            session.lock().await.clear();
            println!("Conversa limpa 🧹");
        }
        _ => println!("{HELP}"),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    // The openai crate reads credentials from the environment
    OpenAiChatModel::export_credentials(&config.llm_api_key, &config.llm_base_url);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Zoe...");

    let clock = config.clock();
    let database = Database::new(&config.database_path).await?;
    let store = open_task_store(&config, &database, clock).await?;
    let events = EventLog::new(database.clone(), clock);
    let summary = SummaryStore::new(&config.summary_path);

    let persona = match Persona::load_or_default(&config.persona_config_path) {
        Ok(persona) => persona,
        Err(e) => {
            error!("❌ Failed to load persona from {}: {e}", config.persona_config_path);
            Persona::default()
        }
    };

    let model = Arc::new(OpenAiChatModel::new(&config.llm_model));
    let transcriber = Arc::new(AudioTranscriber::new(
        config.llm_api_key.clone(),
        config.llm_base_url.clone(),
        config.transcription_model.clone(),
        config.transcription_language.clone(),
    ));

    let mut handler = CommandHandler::new(
        store.clone(),
        events.clone(),
        summary,
        model,
        persona.clone(),
        config.default_task_hour,
    )
    .with_transcriber(transcriber);
    match &config.tavily_api_key {
        Some(key) => handler = handler.with_search(Arc::new(TavilySearch::new(key.clone()))),
        None => info!("🔎 TAVILY_API_KEY not set - web search disabled"),
    }

    let session = Arc::new(Mutex::new(Session::new()));

    // Start the reminder scheduler
    let policy = ReminderPolicy {
        schedule_minutes: config.reminder_schedule.clone(),
        quiet_hours: config.quiet_hours,
    };
    let scheduler = ReminderScheduler::new(store, events, policy, clock);
    let (alert_tx, mut alert_rx) = mpsc::unbounded_channel();
    let scheduler_session = session.clone();
    let interval = std::time::Duration::from_secs(config.poll_interval_secs);
    tokio::spawn(async move {
        scheduler.run(scheduler_session, alert_tx, interval).await;
    });

    println!("{} — {}\n{}\n{HELP}\n", persona.name, persona.tagline, persona.one_liner);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        tokio::select! {
            Some(alert) = alert_rx.recv() => print_alert(&alert),
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Could not read input line: {e}");
                        continue;
                    }
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if line.starts_with('/') && !line.starts_with("/web") && !line.starts_with("/chat") {
                    match run_command(&handler, &session, &clock, line).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => error!("Command failed: {e}"),
                    }
                    continue;
                }

                let now = clock.now_floor_minute();
                let result = {
                    let mut session = session.lock().await;
                    handler.handle_message(&mut session, line, now).await
                };
                match result {
                    Ok(Some(reply)) => {
                        let badge = if reply.web_used { "🌐 " } else { "" };
                        println!("{badge}{}", reply.text);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Failed to handle message: {e}");
                        println!("Ops, deu um errinho aqui 😅 Tenta de novo?");
                    }
                }
            }
        }
    }

    info!("Bye! 👋");
    Ok(())
}
