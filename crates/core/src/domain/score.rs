use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::scoring::Feature;

/// A row of score history as written after each scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub company_id: Uuid,
    pub scored_at: DateTime<Utc>,
    pub score: u8,
    pub explanation: String,
    pub feature_contributions: BTreeMap<Feature, f64>,
}

/// What score history readers get back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistoryEntry {
    pub date: DateTime<Utc>,
    pub score: i32,
    pub explanation: String,
}
