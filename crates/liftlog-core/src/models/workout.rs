//! Workout session model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{EntityId, Syncable};

/// One performed set of an exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    /// Exercise name as shown in the exercise library
    pub exercise: String,
    /// Repetitions completed
    pub reps: u32,
    /// Load in kilograms, `None` for bodyweight
    #[serde(default)]
    pub weight_kg: Option<f64>,
}

/// A recorded training session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    /// Unique identifier
    pub id: EntityId,
    /// Owning user
    pub user_id: String,
    /// Session title, e.g. "Push day"
    pub name: String,
    /// Start timestamp (Unix ms)
    pub started_at: i64,
    /// End timestamp (Unix ms), `None` while in progress
    #[serde(default)]
    pub completed_at: Option<i64>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Sets in the order they were performed
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
}

impl WorkoutSession {
    /// Start a new session for `user_id` now
    #[must_use]
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            user_id: user_id.into(),
            name: name.into(),
            started_at: chrono::Utc::now().timestamp_millis(),
            completed_at: None,
            notes: None,
            sets: Vec::new(),
        }
    }

    /// Append a set
    #[must_use]
    pub fn with_set(mut self, exercise: impl Into<String>, reps: u32, weight_kg: Option<f64>) -> Self {
        self.sets.push(WorkoutSet {
            exercise: exercise.into(),
            reps,
            weight_kg,
        });
        self
    }

    /// Total lifted volume in kilograms (reps x load)
    #[must_use]
    pub fn volume_kg(&self) -> f64 {
        self.sets
            .iter()
            .filter_map(|set| set.weight_kg.map(|weight| weight * f64::from(set.reps)))
            .sum()
    }
}

impl Syncable for WorkoutSession {
    const ENTITY_TYPE: &'static str = "workout_session";

    fn id(&self) -> EntityId {
        self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "workout session name cannot be empty".into(),
            ));
        }
        if let Some(completed_at) = self.completed_at {
            if completed_at < self.started_at {
                return Err(Error::InvalidInput(
                    "workout session cannot end before it starts".into(),
                ));
            }
        }
        if self.sets.iter().any(|set| set.exercise.trim().is_empty()) {
            return Err(Error::InvalidInput("workout set needs an exercise".into()));
        }
        if self
            .sets
            .iter()
            .any(|set| set.weight_kg.is_some_and(|weight| weight < 0.0 || !weight.is_finite()))
        {
            return Err(Error::InvalidInput(
                "workout set weight must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_new() {
        let session = WorkoutSession::new("user-1", "Leg day");
        assert_eq!(session.user_id, "user-1");
        assert!(session.started_at > 0);
        assert!(session.completed_at.is_none());
        assert!(session.validate().is_ok());
    }

    #[test]
    fn test_volume_ignores_bodyweight_sets() {
        let session = WorkoutSession::new("user-1", "Mixed")
            .with_set("Squat", 5, Some(100.0))
            .with_set("Pull-up", 10, None);
        assert!((session.volume_kg() - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let session = WorkoutSession::new("user-1", "   ");
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_end_before_start() {
        let mut session = WorkoutSession::new("user-1", "Run");
        session.completed_at = Some(session.started_at - 1);
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let session = WorkoutSession::new("user-1", "Bench").with_set("Bench", 5, Some(-1.0));
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_payload_defaults_optional_fields() {
        let id = EntityId::new();
        let payload = serde_json::json!({
            "id": id,
            "user_id": "user-1",
            "name": "Imported",
            "started_at": 1_700_000_000_000_i64
        });
        let session: WorkoutSession = serde_json::from_value(payload).unwrap();
        assert_eq!(session.id, id);
        assert!(session.sets.is_empty());
        assert!(session.notes.is_none());
    }
}
