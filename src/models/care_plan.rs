use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

/// Lifecycle of a generated care plan: pending → processing → completed|failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarePlanStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl CarePlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for CarePlanStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(DatabaseError::InvalidEnum {
                field: "CarePlanStatus".into(),
                value: s.into(),
            }),
        }
    }
}

/// A care plan record attached to exactly one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarePlan {
    pub id: i64,
    pub order_id: i64,
    pub content: Option<String>,
    pub status: CarePlanStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of order data a generation job needs: what the worker loads
/// before calling the LLM.
#[derive(Debug, Clone)]
pub struct CarePlanInput {
    pub care_plan_id: i64,
    pub order_id: i64,
    pub patient_records: Option<String>,
    pub medication_name: String,
}
