use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A stored patient. The MRN is the patient's unique business identifier;
/// MRN reuse across different identities is advisory, not fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub mrn: String,
    pub date_of_birth: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// Short description used in duplicate-check warnings.
    pub fn describe(&self) -> String {
        format!(
            "Patient(id={}, name=\"{} {}\", mrn={}, dob={})",
            self.id, self.first_name, self.last_name, self.mrn, self.date_of_birth
        )
    }
}
