//! Duplicate detection for incoming order submissions.
//!
//! Three checks share one result shape and one comparison policy (see
//! [`super::identity`]): the provider check guards the NPI-to-name binding,
//! the patient check surfaces MRN and identity overlaps as advisories, and
//! the order check buckets sibling orders by UTC calendar day.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::identity::{date_only, normalize_name};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{OrderMatch, Patient, Provider};

/// Immutable outcome of a single duplicate check.
///
/// `is_duplicate` means the submission matches an existing record closely
/// enough to treat as the same entity; `should_block` means the submission
/// must not proceed as-is. The two are distinct: a blocking conflict is an
/// irreconcilable clash, not the same entity. Only the same-day order
/// collision sets both — the colliding order is the same logical order and
/// it still may not proceed.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateCheckResult<T> {
    pub is_duplicate: bool,
    pub should_block: bool,
    pub warnings: Vec<String>,
    pub existing_record: Option<T>,
}

impl<T> DuplicateCheckResult<T> {
    pub fn new(
        is_duplicate: bool,
        should_block: bool,
        warnings: Vec<String>,
        existing_record: Option<T>,
    ) -> Self {
        Self {
            is_duplicate,
            should_block,
            warnings,
            existing_record,
        }
    }

    /// No related record found.
    pub fn clear() -> Self {
        Self::new(false, false, Vec::new(), None)
    }
}

/// Provider duplicate check: look up by exact NPI, then compare normalized
/// names. A name mismatch under the same NPI can never be auto-resolved —
/// the NPI is globally unique to one name — so it hard-blocks.
pub fn check_provider(
    conn: &Connection,
    name: &str,
    npi: &str,
) -> Result<DuplicateCheckResult<Provider>, DatabaseError> {
    let Some(existing) = repository::find_provider_by_npi(conn, npi)? else {
        return Ok(DuplicateCheckResult::clear());
    };

    if normalize_name(&existing.name) == normalize_name(name) {
        return Ok(DuplicateCheckResult::new(true, false, Vec::new(), Some(existing)));
    }

    let warning = format!(
        "Provider NPI conflict: input(name=\"{name}\", npi={npi}) does not match \
         existing {}. NPI must be globally unique, blocking create.",
        existing.describe(),
    );
    Ok(DuplicateCheckResult::new(false, true, vec![warning], Some(existing)))
}

/// Patient duplicate check: MRN takes precedence over name+DOB. Patient
/// conflicts never block; at most one advisory warning is produced.
pub fn check_patient(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    mrn: &str,
    date_of_birth: chrono::NaiveDate,
) -> Result<DuplicateCheckResult<Patient>, DatabaseError> {
    if let Some(existing) = repository::find_patient_by_mrn(conn, mrn)? {
        let same_first = normalize_name(&existing.first_name) == normalize_name(first_name);
        let same_last = normalize_name(&existing.last_name) == normalize_name(last_name);
        let same_dob = existing.date_of_birth == date_of_birth;

        if same_first && same_last && same_dob {
            return Ok(DuplicateCheckResult::new(true, false, Vec::new(), Some(existing)));
        }

        let warning = format!(
            "Patient MRN conflict: input(name=\"{first_name} {last_name}\", mrn={mrn}, \
             dob={date_of_birth}) differs from existing {}.",
            existing.describe(),
        );
        return Ok(DuplicateCheckResult::new(false, false, vec![warning], Some(existing)));
    }

    if let Some(existing) =
        repository::find_patient_by_name_dob(conn, first_name, last_name, date_of_birth, mrn)?
    {
        let warning = format!(
            "Patient identity overlap: input(name=\"{first_name} {last_name}\", mrn={mrn}, \
             dob={date_of_birth}) matches existing name+DOB {} but MRN differs.",
            existing.describe(),
        );
        return Ok(DuplicateCheckResult::new(false, false, vec![warning], Some(existing)));
    }

    Ok(DuplicateCheckResult::clear())
}

/// Order duplicate check over the patient's own orders with the same
/// normalized medication. A same-calendar-day repeat always blocks,
/// regardless of `confirm`; an other-day repeat needs the caller's explicit
/// confirmation to proceed silently.
pub fn check_order(
    conn: &Connection,
    patient_id: i64,
    medication_name: &str,
    created_at: DateTime<Utc>,
    confirm: bool,
) -> Result<DuplicateCheckResult<OrderMatch>, DatabaseError> {
    let date = date_only(created_at);

    if let Some(existing) = repository::find_order_same_day(conn, patient_id, medication_name, date)? {
        let warning = format!(
            "Order duplicate blocked: same patient_id={patient_id}, \
             medication=\"{medication_name}\", date={date} already exists as {}.",
            existing.describe(),
        );
        return Ok(DuplicateCheckResult::new(true, true, vec![warning], Some(existing)));
    }

    if let Some(existing) = repository::find_order_other_day(conn, patient_id, medication_name, date)? {
        if confirm {
            return Ok(DuplicateCheckResult::new(false, false, Vec::new(), Some(existing)));
        }

        let warning = format!(
            "Order similar warning: patient_id={patient_id} already has \
             medication=\"{medication_name}\" on a different day. Existing {}. \
             Pass confirm=true to proceed.",
            existing.describe(),
        );
        return Ok(DuplicateCheckResult::new(false, false, vec![warning], Some(existing)));
    }

    Ok(DuplicateCheckResult::clear())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rusqlite::params;

    use crate::db::repository::{insert_order, insert_patient, insert_provider};
    use crate::db::sqlite::open_memory_database;
    use crate::models::NewOrder;

    fn dob(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn seed_order(conn: &Connection, patient_id: i64, medication: &str, created: &str) {
        let provider_id = insert_provider(conn, "Dr. Seed", "9999999999").unwrap();
        insert_order(
            conn,
            &NewOrder {
                patient_id,
                provider_id,
                primary_diagnosis: None,
                medication_name: medication.into(),
                additional_diagnosis: vec![],
                medication_history: vec![],
                patient_records: None,
                created_at: ts(created),
            },
        )
        .unwrap();
    }

    // ── Provider ────────────────────────────────────────────────────────

    #[test]
    fn provider_unknown_npi_is_clear() {
        let conn = open_memory_database().unwrap();
        let result = check_provider(&conn, "Dr. Alice", "1234567890").unwrap();
        assert!(!result.is_duplicate);
        assert!(!result.should_block);
        assert!(result.warnings.is_empty());
        assert!(result.existing_record.is_none());
    }

    #[test]
    fn provider_same_npi_same_normalized_name_is_duplicate() {
        let conn = open_memory_database().unwrap();
        insert_provider(&conn, "DR. ALICE", "123").unwrap();

        let result = check_provider(&conn, "  dr. alice ", "123").unwrap();
        assert!(result.is_duplicate);
        assert!(!result.should_block);
        assert!(result.warnings.is_empty());
        assert!(result.existing_record.is_some());
    }

    #[test]
    fn provider_same_npi_different_name_blocks() {
        let conn = open_memory_database().unwrap();
        insert_provider(&conn, "DR. ALICE", "123").unwrap();

        let result = check_provider(&conn, "Dr. Bob", "123").unwrap();
        assert!(!result.is_duplicate);
        assert!(result.should_block);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("NPI conflict"));
        assert_eq!(result.existing_record.unwrap().name, "DR. ALICE");
    }

    #[test]
    fn provider_never_both_duplicate_and_blocking() {
        let conn = open_memory_database().unwrap();
        insert_provider(&conn, "Dr. Alice", "123").unwrap();

        for name in ["Dr. Alice", "Dr. Bob", "dr. ALICE  "] {
            let result = check_provider(&conn, name, "123").unwrap();
            assert!(!(result.is_duplicate && result.should_block));
        }
    }

    // ── Patient ─────────────────────────────────────────────────────────

    #[test]
    fn patient_full_mrn_match_is_duplicate() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();

        let result = check_patient(&conn, " JANE ", "doe", "MRN-1", dob(1980, 5, 1)).unwrap();
        assert!(result.is_duplicate);
        assert!(!result.should_block);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn patient_mrn_match_with_field_difference_warns_only() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();

        let result = check_patient(&conn, "Janet", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();
        assert!(!result.is_duplicate);
        assert!(!result.should_block);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("MRN conflict"));
        assert_eq!(result.existing_record.unwrap().mrn, "MRN-1");
    }

    #[test]
    fn patient_dob_difference_under_same_mrn_warns() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();

        let result = check_patient(&conn, "Jane", "Doe", "MRN-1", dob(1981, 5, 1)).unwrap();
        assert!(!result.is_duplicate);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn patient_identity_overlap_under_different_mrn_warns() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();

        let result = check_patient(&conn, "Jane", "Doe", "MRN-2", dob(1980, 5, 1)).unwrap();
        assert!(!result.is_duplicate);
        assert!(!result.should_block);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("identity overlap"));
        assert_eq!(result.existing_record.unwrap().mrn, "MRN-1");
    }

    #[test]
    fn patient_no_overlap_is_clear() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();

        let result = check_patient(&conn, "John", "Smith", "MRN-2", dob(1975, 2, 2)).unwrap();
        assert!(!result.is_duplicate);
        assert!(result.warnings.is_empty());
        assert!(result.existing_record.is_none());
    }

    // ── Order ───────────────────────────────────────────────────────────

    #[test]
    fn order_same_day_blocks_regardless_of_confirm() {
        let conn = open_memory_database().unwrap();
        let patient_id =
            insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();
        seed_order(&conn, patient_id, "Lisinopril", "2024-01-03T09:00:00Z");

        for confirm in [false, true] {
            let result = check_order(
                &conn,
                patient_id,
                "lisinopril ",
                ts("2024-01-03T10:20:30Z"),
                confirm,
            )
            .unwrap();
            assert!(result.is_duplicate);
            assert!(result.should_block, "same-day must block even with confirm");
            assert_eq!(result.warnings.len(), 1);
            assert!(result.warnings[0].contains("duplicate blocked"));
        }
    }

    #[test]
    fn order_other_day_without_confirm_warns() {
        let conn = open_memory_database().unwrap();
        let patient_id =
            insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();
        seed_order(&conn, patient_id, "Lisinopril", "2024-01-02T09:00:00Z");

        let result = check_order(
            &conn,
            patient_id,
            "Lisinopril",
            ts("2024-01-03T09:00:00Z"),
            false,
        )
        .unwrap();
        assert!(!result.is_duplicate);
        assert!(!result.should_block);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("confirm=true"));
        assert!(result.existing_record.is_some());
    }

    #[test]
    fn order_other_day_with_confirm_proceeds_silently() {
        let conn = open_memory_database().unwrap();
        let patient_id =
            insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();
        seed_order(&conn, patient_id, "Lisinopril", "2024-01-02T09:00:00Z");

        let result = check_order(
            &conn,
            patient_id,
            "Lisinopril",
            ts("2024-01-03T09:00:00Z"),
            true,
        )
        .unwrap();
        assert!(!result.is_duplicate);
        assert!(!result.should_block);
        assert!(result.warnings.is_empty());
        // Existing record is still surfaced for caller transparency
        assert!(result.existing_record.is_some());
    }

    #[test]
    fn order_midnight_straddle_is_other_day() {
        let conn = open_memory_database().unwrap();
        let patient_id =
            insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();
        seed_order(&conn, patient_id, "Lisinopril", "2024-01-03T23:59:59Z");

        // Two seconds later, across midnight: not a same-day collision
        let result = check_order(
            &conn,
            patient_id,
            "Lisinopril",
            ts("2024-01-04T00:00:01Z"),
            false,
        )
        .unwrap();
        assert!(!result.should_block);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn order_different_medication_is_clear() {
        let conn = open_memory_database().unwrap();
        let patient_id =
            insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();
        seed_order(&conn, patient_id, "Lisinopril", "2024-01-03T09:00:00Z");

        let result = check_order(
            &conn,
            patient_id,
            "Metformin",
            ts("2024-01-03T10:00:00Z"),
            false,
        )
        .unwrap();
        assert!(!result.is_duplicate);
        assert!(!result.should_block);
        assert!(result.warnings.is_empty());
        assert!(result.existing_record.is_none());
    }

    #[test]
    fn checks_are_idempotent_against_unchanged_state() {
        let conn = open_memory_database().unwrap();
        insert_provider(&conn, "Dr. Alice", "123").unwrap();
        let patient_id =
            insert_patient(&conn, "Jane", "Doe", "MRN-1", dob(1980, 5, 1)).unwrap();
        seed_order(&conn, patient_id, "Lisinopril", "2024-01-02T09:00:00Z");
        let now = ts("2024-01-03T09:00:00Z");

        let first = check_order(&conn, patient_id, "Lisinopril", now, false).unwrap();
        let second = check_order(&conn, patient_id, "Lisinopril", now, false).unwrap();
        assert_eq!(first.is_duplicate, second.is_duplicate);
        assert_eq!(first.should_block, second.should_block);
        assert_eq!(first.warnings, second.warnings);
        assert_eq!(
            first.existing_record.map(|r| r.id),
            second.existing_record.map(|r| r.id)
        );

        let p1 = check_provider(&conn, "Dr. Bob", "123").unwrap();
        let p2 = check_provider(&conn, "Dr. Bob", "123").unwrap();
        assert_eq!(p1.warnings, p2.warnings);
        assert_eq!(p1.should_block, p2.should_block);
    }
}
