//! Body measurement model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{EntityId, Syncable};

/// A single body measurement (weight, optionally body fat)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyMetric {
    pub id: EntityId,
    pub user_id: String,
    /// Measurement timestamp (Unix ms)
    pub recorded_at: i64,
    pub weight_kg: f64,
    #[serde(default)]
    pub body_fat_percent: Option<f64>,
}

impl BodyMetric {
    #[must_use]
    pub fn new(user_id: impl Into<String>, weight_kg: f64) -> Self {
        Self {
            id: EntityId::new(),
            user_id: user_id.into(),
            recorded_at: chrono::Utc::now().timestamp_millis(),
            weight_kg,
            body_fat_percent: None,
        }
    }
}

impl Syncable for BodyMetric {
    const ENTITY_TYPE: &'static str = "body_metric";

    fn id(&self) -> EntityId {
        self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn validate(&self) -> Result<()> {
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(Error::InvalidInput("body weight must be positive".into()));
        }
        if let Some(fat) = self.body_fat_percent {
            if !(0.0..=100.0).contains(&fat) {
                return Err(Error::InvalidInput(
                    "body fat must be between 0 and 100 percent".into(),
                ));
            }
        }
        Ok(())
    }
}
