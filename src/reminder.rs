use crate::errors::{AppError, AppResult};
use crate::journal::Journal;
use crate::models::ReminderSettings;
use crate::settings::{load_reminder_settings, save_reminder_settings, KeyValueStore};
use chrono::{DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDateTime, Offset, TimeZone};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

pub const REMINDER_TITLE: &str = "Gratitude reminder";

/// One-shot notification handed to the platform scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRequest {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<FixedOffset>,
    pub delay_seconds: u64,
}

/// The platform notification scheduler. Implementations own permissions,
/// delivery and formatting.
pub trait ReminderScheduler: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    fn request_permission(&self) -> AppResult<bool>;

    fn schedule(&self, request: &ReminderRequest) -> AppResult<()>;

    fn cancel_all(&self) -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderOutcome {
    Scheduled { id: Uuid, fire_at: DateTime<FixedOffset> },
    NothingToSchedule,
    Disabled,
    PermissionDenied,
    Unavailable,
}

/// Next instant at local `hour:minute:00` strictly after `now`, in the zone
/// of `now`. A repeated wall time resolves to its first occurrence and a
/// skipped one is pushed forward by the length of the gap.
pub fn next_fire_at<Tz: TimeZone>(now: &DateTime<Tz>, hour: u32, minute: u32) -> AppResult<DateTime<Tz>> {
    validate_time(hour, minute)?;
    let zone = now.timezone();
    let today = now.naive_local().date();
    for day in [today, today + Duration::days(1)] {
        let wall = day
            .and_hms_opt(hour, minute, 0)
            .ok_or_else(|| AppError::InvalidInput(format!("invalid reminder time {hour}:{minute}")))?;
        let candidate = resolve_local(&zone, wall)?;
        if candidate > *now {
            return Ok(candidate);
        }
    }
    Err(AppError::Internal(format!(
        "no reminder instant found after {} for {hour}:{minute:02}",
        now.naive_local()
    )))
}

fn resolve_local<Tz: TimeZone>(zone: &Tz, wall: NaiveDateTime) -> AppResult<DateTime<Tz>> {
    match zone.from_local_datetime(&wall) {
        LocalResult::Single(instant) | LocalResult::Ambiguous(instant, _) => Ok(instant),
        LocalResult::None => {
            let before_gap = zone
                .offset_from_local_datetime(&(wall - Duration::hours(3)))
                .earliest()
                .ok_or_else(|| AppError::Internal(format!("cannot resolve local time {wall}")))?;
            let utc = wall - Duration::seconds(i64::from(before_gap.fix().local_minus_utc()));
            Ok(zone.from_utc_datetime(&utc))
        }
    }
}

pub fn build_request<Tz: TimeZone>(
    now: &DateTime<Tz>,
    hour: u32,
    minute: u32,
    body: String,
) -> AppResult<ReminderRequest> {
    let fire_at = next_fire_at(now, hour, minute)?;
    let delay_ms = (fire_at.clone() - now.clone()).num_milliseconds();
    let delay_seconds = ((delay_ms + 500) / 1000).max(1) as u64;
    Ok(ReminderRequest {
        id: Uuid::new_v4(),
        title: REMINDER_TITLE.to_string(),
        body,
        fire_at: fire_at.with_timezone(&fire_at.offset().fix()),
        delay_seconds,
    })
}

/// Twelve-hour label such as `9:00 AM`.
pub fn format_time(hour: u32, minute: u32) -> String {
    let period = if hour >= 12 { "PM" } else { "AM" };
    let display_hour = match hour % 12 {
        0 => 12,
        other => other,
    };
    format!("{}:{:02} {}", display_hour, minute, period)
}

fn validate_time(hour: u32, minute: u32) -> AppResult<()> {
    if hour >= 24 || minute >= 60 {
        return Err(AppError::InvalidInput(format!(
            "reminder time out of range: {hour}:{minute:02}"
        )));
    }
    Ok(())
}

/// Daily reminder flow: settings, permission and one pending notification
/// carrying a random note.
pub struct Reminders<S, K> {
    journal: Journal,
    scheduler: S,
    settings: K,
    clock: fn() -> DateTime<Local>,
}

impl<S, K> Reminders<S, K>
where
    S: ReminderScheduler,
    K: KeyValueStore,
{
    pub fn new(journal: Journal, scheduler: S, settings: K) -> Self {
        Self {
            journal,
            scheduler,
            settings,
            clock: Local::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn settings(&self) -> AppResult<ReminderSettings> {
        load_reminder_settings(&self.settings)
    }

    pub async fn set_enabled(&self, enabled: bool) -> AppResult<ReminderOutcome> {
        let mut settings = self.settings()?;

        if !enabled {
            self.scheduler.cancel_all()?;
            settings.enabled = false;
            save_reminder_settings(&self.settings, &settings)?;
            info!("gratitude reminders disabled");
            return Ok(ReminderOutcome::Disabled);
        }

        if !self.scheduler.is_available() {
            return Ok(ReminderOutcome::Unavailable);
        }
        if !self.scheduler.request_permission()? {
            info!("notification permission denied");
            return Ok(ReminderOutcome::PermissionDenied);
        }

        let outcome = self.schedule_random(settings.hour, settings.minute).await?;
        settings.enabled = true;
        save_reminder_settings(&self.settings, &settings)?;
        Ok(outcome)
    }

    pub async fn set_time(&self, hour: u32, minute: u32) -> AppResult<ReminderOutcome> {
        validate_time(hour, minute)?;
        let mut settings = self.settings()?;
        settings.hour = hour;
        settings.minute = minute;
        save_reminder_settings(&self.settings, &settings)?;

        if !settings.enabled {
            return Ok(ReminderOutcome::Disabled);
        }
        self.schedule_random(hour, minute).await
    }

    /// Called on every app open so the pending reminder carries a fresh note.
    pub async fn reschedule_if_enabled(&self) -> AppResult<ReminderOutcome> {
        let settings = self.settings()?;
        if !settings.enabled {
            return Ok(ReminderOutcome::Disabled);
        }
        self.schedule_random(settings.hour, settings.minute).await
    }

    async fn schedule_random(&self, hour: u32, minute: u32) -> AppResult<ReminderOutcome> {
        let Some(body) = self.journal.random_note_content().await? else {
            debug!("no notes available for reminder");
            return Ok(ReminderOutcome::NothingToSchedule);
        };

        let request = build_request(&(self.clock)(), hour, minute, body)?;
        self.scheduler.cancel_all()?;
        self.scheduler.schedule(&request)?;
        info!(
            reminder_id = %request.id,
            fire_at = %request.fire_at,
            delay_seconds = request.delay_seconds,
            "scheduled gratitude reminder"
        );

        Ok(ReminderOutcome::Scheduled {
            id: request.id,
            fire_at: request.fire_at,
        })
    }
}
