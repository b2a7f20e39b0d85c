use chrono::{Days, NaiveDate, Timelike};
use mongodb::bson::doc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::progression_service::ProgressionService;
use super::AppState;
use crate::error::{CoreError, CoreResult};
use crate::models::activity::{
    ActivityKind, ActivityLog, PeriodTotals, StartStudySessionRequest, StudySession, StudyStats,
};
use crate::models::streak::{StreakOutcome, UserStreak};
use crate::store::{Record, Repository};
use crate::utils::time::Clock;

const HEATMAP_DAYS: u64 = 365;
const WEEK_DAYS: u64 = 7;
const MONTH_DAYS: u64 = 30;

#[derive(Debug, Serialize)]
pub struct ActivityUpdate {
    pub log: ActivityLog,
    pub streak: UserStreak,
    pub streak_outcome: StreakOutcome,
}

#[derive(Clone)]
pub struct ActivityService {
    logs: Repository<ActivityLog>,
    study_sessions: Repository<StudySession>,
    progression: ProgressionService,
    clock: Arc<dyn Clock>,
}

/// First day of the `days`-long window ending today.
fn window_start(today: NaiveDate, days: u64) -> NaiveDate {
    today
        .checked_sub_days(Days::new(days.saturating_sub(1)))
        .unwrap_or(NaiveDate::MIN)
}

impl ActivityService {
    pub fn new(state: &AppState) -> Self {
        Self {
            logs: Repository::new(state.store.clone()),
            study_sessions: Repository::new(state.store.clone()),
            progression: ProgressionService::new(state),
            clock: state.clock.clone(),
        }
    }

    /// Adds `value` to today's counter for `kind` and `xp` to today's XP,
    /// then credits the day to the streak.
    pub async fn log_activity(
        &self,
        user_id: &str,
        kind: ActivityKind,
        value: u32,
        xp: u64,
    ) -> CoreResult<ActivityUpdate> {
        self.record(user_id, Some(kind), value, xp).await
    }

    /// XP paid outside a learning activity (challenge rewards, manual
    /// grants). Lands on today's row without moving any counter.
    pub async fn log_reward(&self, user_id: &str, xp: u64) -> CoreResult<ActivityUpdate> {
        self.record(user_id, None, 0, xp).await
    }

    async fn record(
        &self,
        user_id: &str,
        kind: Option<ActivityKind>,
        value: u32,
        xp: u64,
    ) -> CoreResult<ActivityUpdate> {
        let today = self.clock.today();
        let key = ActivityLog::new(user_id, today).id();

        let (log, applied) = self
            .logs
            .modify(&key, || ActivityLog::new(user_id, today), |log| {
                log.apply(kind, value, xp)
            })
            .await?;
        if !applied {
            return Err(CoreError::invalid_argument("Activity totals out of range"));
        }

        let (streak, streak_outcome) = self.progression.update_streak(user_id).await?;

        Ok(ActivityUpdate {
            log,
            streak,
            streak_outcome,
        })
    }

    async fn logs_since(&self, user_id: &str, since: NaiveDate) -> CoreResult<Vec<ActivityLog>> {
        let mut logs: Vec<ActivityLog> = self
            .logs
            .find(doc! { "user_id": user_id })
            .await?
            .into_iter()
            .filter(|log| log.date >= since)
            .collect();
        logs.sort_by_key(|log| log.date);
        Ok(logs)
    }

    pub async fn heatmap(&self, user_id: &str) -> CoreResult<Vec<ActivityLog>> {
        let since = window_start(self.clock.today(), HEATMAP_DAYS);
        self.logs_since(user_id, since).await
    }

    pub async fn study_stats(&self, user_id: &str) -> CoreResult<StudyStats> {
        let today = self.clock.today();
        let logs = self.logs_since(user_id, NaiveDate::MIN).await?;

        let week_start = window_start(today, WEEK_DAYS);
        let month_start = window_start(today, MONTH_DAYS);
        let mut week = PeriodTotals::default();
        let mut month = PeriodTotals::default();
        let mut total_time_minutes = 0;
        for log in &logs {
            total_time_minutes += log.time_studied_minutes;
            if log.date >= week_start {
                week.add(log);
            }
            if log.date >= month_start {
                month.add(log);
            }
        }

        let finished: Vec<StudySession> = self
            .study_sessions
            .find(doc! { "user_id": user_id })
            .await?
            .into_iter()
            .filter(|s| s.end_time.is_some())
            .collect();

        let mut by_hour: HashMap<u32, usize> = HashMap::new();
        for session in &finished {
            let hour = session
                .start_time
                .with_timezone(&self.clock.offset())
                .hour();
            *by_hour.entry(hour).or_default() += 1;
        }
        // ties go to the earlier hour
        let best_study_hour = by_hour
            .into_iter()
            .max_by(|(ha, ca), (hb, cb)| ca.cmp(cb).then_with(|| hb.cmp(ha)))
            .map(|(hour, _)| hour);

        Ok(StudyStats {
            total_time_minutes,
            total_time_hours: (f64::from(total_time_minutes) / 60.0 * 10.0).round() / 10.0,
            week,
            month,
            best_study_hour,
            total_sessions: finished.len(),
        })
    }

    pub async fn start_study_session(
        &self,
        user_id: &str,
        req: StartStudySessionRequest,
    ) -> CoreResult<StudySession> {
        let session = StudySession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            activity_type: req.activity_type,
            lesson_id: req.lesson_id,
            start_time: self.clock.now(),
            end_time: None,
            duration_minutes: 0,
        };
        let (session, _) = self.study_sessions.create(&session).await?;
        tracing::debug!("Study session {} started by {}", session.id, user_id);
        Ok(session)
    }

    /// Stamps the end time and whole-minute duration. Logging the minutes is
    /// left to the caller.
    pub async fn end_study_session(&self, user_id: &str, session_id: &str) -> CoreResult<StudySession> {
        let existing = self
            .study_sessions
            .get(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| CoreError::not_found(format!("Study session {}", session_id)))?;
        if existing.end_time.is_some() {
            return Err(CoreError::invalid_state("Study session already ended"));
        }

        let now = self.clock.now();
        let (session, ended_now) = self
            .study_sessions
            .modify(session_id, || existing.clone(), |s| {
                if s.end_time.is_some() {
                    return false;
                }
                s.end_time = Some(now);
                s.duration_minutes = (now - s.start_time).num_minutes().max(0) as u32;
                true
            })
            .await?;
        if !ended_now {
            return Err(CoreError::invalid_state("Study session already ended"));
        }

        Ok(session)
    }
}
