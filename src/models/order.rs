use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::care_plan::CarePlanStatus;

/// A stored order. Belongs to exactly one patient and is compared against
/// sibling orders of that same patient only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub patient_id: i64,
    pub provider_id: i64,
    pub primary_diagnosis: Option<String>,
    pub medication_name: String,
    pub additional_diagnosis: Vec<String>,
    pub medication_history: Vec<String>,
    pub patient_records: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for a not-yet-persisted order, after the orchestrator has resolved
/// the patient and provider identifiers.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub patient_id: i64,
    pub provider_id: i64,
    pub primary_diagnosis: Option<String>,
    pub medication_name: String,
    pub additional_diagnosis: Vec<String>,
    pub medication_history: Vec<String>,
    pub patient_records: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An order joined with its patient's identity fields, as returned by the
/// same-day / other-day duplicate lookups. The patient fields exist so a
/// warning can cite the colliding order in human-readable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderMatch {
    pub id: i64,
    pub patient_id: i64,
    pub medication_name: String,
    pub created_at: DateTime<Utc>,
    pub patient_first_name: String,
    pub patient_last_name: String,
    pub patient_mrn: String,
    pub patient_date_of_birth: NaiveDate,
}

impl OrderMatch {
    /// Short description used in duplicate-check warnings.
    pub fn describe(&self) -> String {
        format!(
            "Order(id={}, patient=\"{} {}\"/{}, medication=\"{}\", created_at={})",
            self.id,
            self.patient_first_name,
            self.patient_last_name,
            self.patient_mrn,
            self.medication_name,
            self.created_at.format("%Y-%m-%dT%H:%M:%SZ"),
        )
    }
}

/// The full order view returned to clients: order + patient + provider +
/// care plan in one flat shape, matching what list/detail/search and the
/// SSE channel all serve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub id: i64,
    pub primary_diagnosis: Option<String>,
    pub medication_name: String,
    pub additional_diagnosis: Vec<String>,
    pub medication_history: Vec<String>,
    pub patient_records: Option<String>,
    pub order_created_at: DateTime<Utc>,
    pub patient_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub mrn: String,
    pub patient_date_of_birth: NaiveDate,
    pub provider_id: i64,
    pub provider_name: String,
    pub provider_npi: String,
    pub care_plan_id: Option<i64>,
    pub care_plan_content: Option<String>,
    pub care_plan_status: Option<CarePlanStatus>,
    pub error_message: Option<String>,
    pub care_plan_created_at: Option<DateTime<Utc>>,
    pub care_plan_updated_at: Option<DateTime<Utc>>,
}
