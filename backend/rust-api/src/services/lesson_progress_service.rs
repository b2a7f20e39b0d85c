use mongodb::bson::doc;
use std::sync::Arc;

use super::AppState;
use crate::error::{CoreError, CoreResult};
use crate::models::progress::{ProgressUpdateResponse, UpdateProgressRequest, UserProgress};
use crate::store::Repository;
use crate::utils::time::Clock;

#[derive(Clone)]
pub struct LessonProgressService {
    progress: Repository<UserProgress>,
    clock: Arc<dyn Clock>,
}

impl LessonProgressService {
    pub fn new(state: &AppState) -> Self {
        Self {
            progress: Repository::new(state.store.clone()),
            clock: state.clock.clone(),
        }
    }

    /// Update-or-create. Completion is sticky, so `newly_completed` is true
    /// at most once per lesson.
    pub async fn update(
        &self,
        user_id: &str,
        req: &UpdateProgressRequest,
    ) -> CoreResult<ProgressUpdateResponse> {
        let lesson_id = req.lesson_id.trim();
        if lesson_id.is_empty() {
            return Err(CoreError::invalid_argument("lesson_id is required"));
        }

        let now = self.clock.now();
        let key = UserProgress::key(user_id, lesson_id);
        let (progress, newly_completed) = self
            .progress
            .modify(&key, || UserProgress::new(user_id, lesson_id, now), |p| {
                p.score = req.score;
                p.updated_at = now;
                if req.completed && !p.completed {
                    p.completed = true;
                    p.completed_at = Some(now);
                    return true;
                }
                false
            })
            .await?;

        if newly_completed {
            tracing::info!(
                "User {} completed lesson {} with score {}",
                user_id,
                lesson_id,
                progress.score
            );
        }

        Ok(ProgressUpdateResponse {
            progress,
            newly_completed,
        })
    }

    pub async fn list(&self, user_id: &str) -> CoreResult<Vec<UserProgress>> {
        let mut rows = self.progress.find(doc! { "user_id": user_id }).await?;
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }
}
