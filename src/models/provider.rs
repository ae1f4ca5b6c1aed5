use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored provider. The NPI is the provider's unique business identifier;
/// no two providers may exist with the same NPI but different names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub npi: String,
    pub created_at: DateTime<Utc>,
}

impl Provider {
    /// Short description used in duplicate-check warnings.
    pub fn describe(&self) -> String {
        format!(
            "Provider(id={}, name=\"{}\", npi={})",
            self.id, self.name, self.npi
        )
    }
}
