use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::events::{publish, DeliveryEvent, EventKind};
use crate::state::AppState;
use crate::store::Mutation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub reminders_sent: usize,
    pub overdue: usize,
    pub open: usize,
}

/// One pass over the task table: send every reminder whose due time
/// has passed and refresh the overdue gauge. The due time is re-read
/// under the row lock, so a sweep racing another sweep (or a restart
/// replaying the same window) sends each reminder once.
pub fn sweep(state: &AppState, now: DateTime<Utc>) -> SweepOutcome {
    let due: Vec<_> = state
        .tasks
        .list()
        .into_iter()
        .filter(|task| task.reminder_due(now))
        .map(|task| task.id)
        .collect();

    let mut reminders_sent = 0;
    for task_id in due {
        let sent = state.tasks.update(task_id, None, |task| {
            if !task.reminder_due(now) {
                return Ok(Mutation::Unchanged(None));
            }
            task.send_reminder(&state.escalation, now)?;
            Ok(Mutation::Changed(Some(task.clone())))
        });

        match sent {
            Ok(Some(task)) => {
                reminders_sent += 1;
                state
                    .metrics
                    .reminders_sent_total
                    .with_label_values(&[&task.task_type.to_string()])
                    .inc();
                publish(
                    &state.events_tx,
                    DeliveryEvent::new(task.delivery_id, EventKind::ReminderDue, now)
                        .with_detail(format!("{} reminder #{}", task.task_type, task.reminder_count)),
                );
                info!(
                    task_id = %task.id,
                    task_type = %task.task_type,
                    reminder_count = task.reminder_count,
                    "coordination reminder sent"
                );
            }
            Ok(None) => {}
            Err(err) => warn!(task_id = %task_id, error = %err, "reminder send skipped"),
        }
    }

    let tasks = state.tasks.list();
    let open = tasks.iter().filter(|task| task.is_active()).count();
    let overdue = tasks
        .iter()
        .filter(|task| task.is_overdue(&state.escalation, now))
        .count();

    state.metrics.tasks_open.set(open as i64);
    state.metrics.tasks_overdue.set(overdue as i64);

    SweepOutcome {
        reminders_sent,
        overdue,
        open,
    }
}

/// The background polling loop. Schedule state lives in each task's
/// persisted `next_reminder_due`, so a crash or restart between ticks
/// loses nothing.
pub async fn run_reminder_sweep(state: Arc<AppState>, interval_secs: u64) {
    info!(interval_secs, "reminder sweep started");

    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        let outcome = sweep(&state, Utc::now());
        if outcome.reminders_sent > 0 || outcome.overdue > 0 {
            info!(
                reminders_sent = outcome.reminders_sent,
                overdue = outcome.overdue,
                open = outcome.open,
                "sweep completed"
            );
        } else {
            debug!(open = outcome.open, "sweep completed");
        }
    }
}
