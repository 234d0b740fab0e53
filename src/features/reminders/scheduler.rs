//! # Feature: Reminder Scheduler
//!
//! Polls the task store, picks the most overdue task and fires a reminder,
//! advancing it along the escalation schedule until it is silenced.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 2.0.0: Escalation schedule, quiet hours and session fingerprint guard
//! - 1.0.0: Initial release

use chrono::{Duration, NaiveDateTime};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::core::config::DEFAULT_SCHEDULE;
use crate::core::time::{format_minute, Clock, QuietHours};
use crate::core::AssistantResult;
use crate::features::memory::{EventKind, EventLog};
use crate::features::tasks::model::SILENCE_SENTINEL_DAYS;
use crate::features::tasks::{Task, TaskStatus, TaskStore};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderPolicy {
    pub schedule_minutes: Vec<i64>,
    pub quiet_hours: QuietHours,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        ReminderPolicy {
            schedule_minutes: DEFAULT_SCHEDULE.to_vec(),
            quiet_hours: QuietHours::default(),
        }
    }
}

/// A fired reminder, ready to be shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub task_id: String,
    pub description: String,
    pub due_at: NaiveDateTime,
    /// Count after this firing
    pub remind_count: u32,
    /// This was the last reminder of the schedule
    pub silenced: bool,
}

impl Alert {
    pub fn message(&self) -> String {
        let mut text = format!(
            "🔔 **Ei! Lembrete na área:** {}\n\n⏰ **{}**",
            self.description,
            format_minute(&self.due_at)
        );
        if self.silenced {
            text.push_str("\n\n🔕 Último aviso, vou parar de lembrar dessa.");
        }
        text
    }
}

/// Tasks due now, in firing order.
///
/// Nothing fires during quiet hours. Among due tasks the most overdue wins;
/// ties go to the earliest next reminder, then the smallest id.
pub fn due_tasks<'a>(tasks: &'a [Task], now: NaiveDateTime, policy: &ReminderPolicy) -> Vec<&'a Task> {
    if policy.quiet_hours.contains(&now) {
        return Vec::new();
    }
    let mut due: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Silenced)
        .filter(|t| now >= t.effective_next_remind())
        .collect();
    due.sort_by(|a, b| {
        a.due_at
            .cmp(&b.due_at)
            .then_with(|| a.effective_next_remind().cmp(&b.effective_next_remind()))
            .then_with(|| a.id.cmp(&b.id))
    });
    due
}

/// Pick the task that should fire now, if any
pub fn pick_due_task<'a>(
    tasks: &'a [Task],
    now: NaiveDateTime,
    policy: &ReminderPolicy,
) -> Option<&'a Task> {
    due_tasks(tasks, now, policy).into_iter().next()
}

/// Advance a task after a reminder fired
pub fn schedule_next(task: &mut Task, now: NaiveDateTime, policy: &ReminderPolicy) {
    task.remind_count += 1;
    task.snoozed_until = None;
    match policy.schedule_minutes.get(task.remind_count as usize) {
        Some(minutes) => task.next_remind_at = now + Duration::minutes(*minutes),
        None => {
            task.status = TaskStatus::Silenced;
            task.next_remind_at = now + Duration::days(SILENCE_SENTINEL_DAYS);
        }
    }
}

fn fingerprint(task: &Task) -> String {
    format!("{}::{}", task.id, format_minute(&task.effective_next_remind()))
}

#[derive(Clone)]
pub struct ReminderScheduler {
    store: Arc<dyn TaskStore>,
    events: EventLog,
    policy: ReminderPolicy,
    clock: Clock,
}

impl ReminderScheduler {
    pub fn new(store: Arc<dyn TaskStore>, events: EventLog, policy: ReminderPolicy, clock: Clock) -> Self {
        ReminderScheduler {
            store,
            events,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &ReminderPolicy {
        &self.policy
    }

    /// One due-check cycle. Fires at most one reminder.
    pub async fn poll(&self, session: &mut Session, now: NaiveDateTime) -> AssistantResult<Option<Alert>> {
        let tasks = self.store.list().await?;
        let Some(due) = due_tasks(&tasks, now, &self.policy)
            .into_iter()
            .find(|t| {
                let announced = session.alert_announced(&fingerprint(t));
                if announced {
                    debug!("Reminder for task {} already announced", t.id);
                }
                !announced
            })
        else {
            return Ok(None);
        };

        let mut task = due.clone();
        schedule_next(&mut task, now, &self.policy);
        // fingerprint only once the new state is stored, so a failed write retries
        self.store.update(&task).await?;
        session.mark_alert(&fingerprint(due));

        let alert = Alert {
            task_id: task.id.clone(),
            description: task.description.clone(),
            due_at: task.due_at,
            remind_count: task.remind_count,
            silenced: task.status == TaskStatus::Silenced,
        };
        info!(
            "🔔 Reminder fired for task {} ({}/{})",
            task.id,
            task.remind_count,
            self.policy.schedule_minutes.len()
        );

        self.events
            .record(EventKind::Alert, &format!("Disparado: {}", task.description))
            .await;
        session.push_assistant(alert.message(), false);

        Ok(Some(alert))
    }

    /// Poll forever on `interval`, forwarding alerts to `sender`
    pub async fn run(
        self,
        session: Arc<Mutex<Session>>,
        sender: mpsc::UnboundedSender<Alert>,
        interval: std::time::Duration,
    ) {
        info!(
            "Reminder scheduler started (interval: {}s, schedule: {:?})",
            interval.as_secs(),
            self.policy.schedule_minutes
        );
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            let now = self.clock.now_floor_minute();

            let result = {
                let mut session = session.lock().await;
                self.poll(&mut session, now).await
            };

            match result {
                Ok(Some(alert)) => {
                    if sender.send(alert).is_err() {
                        warn!("Alert receiver dropped, stopping reminder scheduler");
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => error!("Reminder check failed: {e}"),
            }
        }
    }
}
