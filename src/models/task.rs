use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::provider::{ContactChannel, DeliveryProvider, IntegrationKind};

/// Exponential backoff is capped at this multiple of the base interval.
pub const REMINDER_BACKOFF_CAP: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Phone,
    AppBooking,
    LineMessage,
    Email,
    PickupSchedule,
}

impl TaskType {
    /// Which kind of human work booking this carrier takes. Derived
    /// from the provider's configured channels in escalation order;
    /// on-demand carriers only need their pickup scheduled.
    pub fn for_provider(provider: &DeliveryProvider) -> TaskType {
        if provider.integration == IntegrationKind::AutoPickup {
            return TaskType::PickupSchedule;
        }

        provider
            .contact_channels
            .keys()
            .next()
            .map(|channel| match channel {
                ContactChannel::Phone => TaskType::Phone,
                ContactChannel::Line => TaskType::LineMessage,
                ContactChannel::App => TaskType::AppBooking,
                ContactChannel::Email => TaskType::Email,
            })
            .unwrap_or(TaskType::PickupSchedule)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::Phone => "phone",
            TaskType::AppBooking => "app_booking",
            TaskType::LineMessage => "line_message",
            TaskType::Email => "email",
            TaskType::PickupSchedule => "pickup_schedule",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReminderRule {
    pub base_interval: Duration,
    pub overdue_after: Duration,
}

/// Per-task-type escalation policy: base reminder interval and the SLA
/// threshold after which a task is surfaced as overdue. Held as a
/// table so the policy is tunable and testable on its own.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    rules: BTreeMap<TaskType, ReminderRule>,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert(
            TaskType::Phone,
            ReminderRule {
                base_interval: Duration::minutes(30),
                overdue_after: Duration::hours(4),
            },
        );
        rules.insert(
            TaskType::AppBooking,
            ReminderRule {
                base_interval: Duration::hours(2),
                overdue_after: Duration::hours(12),
            },
        );
        rules.insert(
            TaskType::LineMessage,
            ReminderRule {
                base_interval: Duration::hours(1),
                overdue_after: Duration::hours(6),
            },
        );
        rules.insert(
            TaskType::Email,
            ReminderRule {
                base_interval: Duration::hours(4),
                overdue_after: Duration::hours(24),
            },
        );
        rules.insert(
            TaskType::PickupSchedule,
            ReminderRule {
                base_interval: Duration::hours(6),
                overdue_after: Duration::hours(24),
            },
        );
        Self { rules }
    }
}

impl EscalationPolicy {
    pub fn rule(&self, task_type: TaskType) -> ReminderRule {
        self.rules[&task_type]
    }

    /// interval(n) = base · min(2^n, cap), where n reminders have
    /// already been sent.
    pub fn interval_after(&self, task_type: TaskType, reminders_sent: u32) -> Duration {
        let multiplier = 2u32
            .saturating_pow(reminders_sent)
            .min(REMINDER_BACKOFF_CAP);
        self.rule(task_type).base_interval * multiplier as i32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualCoordinationTask {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub provider_code: String,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub assigned_to: Option<Uuid>,
    pub instructions: String,
    /// Copied from the provider at creation so the task stays
    /// actionable even if the provider is edited later.
    pub contact_channels: BTreeMap<ContactChannel, String>,
    pub completion_notes: Option<String>,
    pub external_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub reminder_count: u32,
    pub last_reminder_sent: Option<DateTime<Utc>>,
    pub next_reminder_due: Option<DateTime<Utc>>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ManualCoordinationTask {
    pub fn open(
        delivery_id: Uuid,
        provider: &DeliveryProvider,
        instructions: String,
        policy: &EscalationPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let task_type = TaskType::for_provider(provider);
        Self {
            id: Uuid::new_v4(),
            delivery_id,
            provider_code: provider.code.clone(),
            task_type,
            status: TaskStatus::Pending,
            assigned_to: None,
            instructions,
            contact_channels: provider.contact_channels.clone(),
            completion_notes: None,
            external_reference: None,
            failure_reason: None,
            reminder_count: 0,
            last_reminder_sent: None,
            next_reminder_due: Some(now + policy.rule(task_type).base_interval),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn assign_to(&mut self, user_id: Uuid, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status != TaskStatus::Pending {
            return Err(AppError::InvalidTaskState {
                task_id: self.id,
                status: self.status,
                action: "assign",
            });
        }
        self.assigned_to = Some(user_id);
        self.status = TaskStatus::InProgress;
        self.updated_at = now;
        Ok(())
    }

    /// Bumps the reminder counter and pushes the next due time out with
    /// capped exponential backoff. The schedule lives entirely in
    /// `next_reminder_due`, so a restarted sweep picks up exactly where
    /// the last one left off.
    pub fn send_reminder(
        &mut self,
        policy: &EscalationPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(AppError::InvalidTaskState {
                task_id: self.id,
                status: self.status,
                action: "remind",
            });
        }
        self.reminder_count += 1;
        self.last_reminder_sent = Some(now);
        self.next_reminder_due = Some(now + policy.interval_after(self.task_type, self.reminder_count));
        self.updated_at = now;
        Ok(())
    }

    pub fn complete(
        &mut self,
        notes: &str,
        external_reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(AppError::InvalidTaskState {
                task_id: self.id,
                status: self.status,
                action: "complete",
            });
        }
        if notes.trim().is_empty() {
            return Err(AppError::Validation {
                field: "notes",
                message: "completion notes must not be empty".to_string(),
            });
        }
        self.status = TaskStatus::Completed;
        self.completion_notes = Some(notes.to_string());
        self.external_reference = external_reference;
        self.next_reminder_due = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn fail(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(AppError::InvalidTaskState {
                task_id: self.id,
                status: self.status,
                action: "fail",
            });
        }
        self.status = TaskStatus::Failed;
        self.failure_reason = Some(reason);
        self.next_reminder_due = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, reason: String, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.status.is_terminal() {
            return Err(AppError::InvalidTaskState {
                task_id: self.id,
                status: self.status,
                action: "cancel",
            });
        }
        self.status = TaskStatus::Cancelled;
        self.failure_reason = Some(reason);
        self.next_reminder_due = None;
        self.updated_at = now;
        Ok(())
    }

    pub fn reminder_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active()
            && self
                .next_reminder_due
                .is_some_and(|due| due <= now)
    }

    /// SLA signal, independent of the reminder schedule. Surfaced to
    /// operators; never acted on automatically.
    pub fn is_overdue(&self, policy: &EscalationPolicy, now: DateTime<Utc>) -> bool {
        self.is_active() && now - self.created_at > policy.rule(self.task_type).overdue_after
    }
}
