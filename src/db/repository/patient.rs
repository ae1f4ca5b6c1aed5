use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::admission::identity::normalize_name;
use crate::db::DatabaseError;
use crate::models::Patient;

fn map_patient(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        mrn: row.get(3)?,
        date_of_birth: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Look up a stored patient by exact MRN.
pub fn find_patient_by_mrn(
    conn: &Connection,
    mrn: &str,
) -> Result<Option<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, first_name, last_name, mrn, date_of_birth, created_at
         FROM patients WHERE mrn = ?1 LIMIT 1",
    )?;

    Ok(stmt.query_row(params![mrn], map_patient).optional()?)
}

/// Look up a patient by case-insensitive name + date of birth, excluding the
/// given MRN. Prefers the most recently created match when several exist.
///
/// Candidates are narrowed by DOB and MRN in SQL; name equality is decided
/// in Rust, since SQLite's `LOWER` folds ASCII only.
pub fn find_patient_by_name_dob(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    date_of_birth: NaiveDate,
    excluding_mrn: &str,
) -> Result<Option<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, first_name, last_name, mrn, date_of_birth, created_at
         FROM patients
         WHERE date_of_birth = ?1
           AND mrn <> ?2
         ORDER BY created_at DESC, id DESC",
    )?;

    let wanted_first = normalize_name(first_name);
    let wanted_last = normalize_name(last_name);
    let rows = stmt.query_map(params![date_of_birth, excluding_mrn], map_patient)?;

    for row in rows {
        let patient = row?;
        if normalize_name(&patient.first_name) == wanted_first
            && normalize_name(&patient.last_name) == wanted_last
        {
            return Ok(Some(patient));
        }
    }
    Ok(None)
}

/// Insert a new patient row, returning its id.
pub fn insert_patient(
    conn: &Connection,
    first_name: &str,
    last_name: &str,
    mrn: &str,
    date_of_birth: NaiveDate,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patients (first_name, last_name, mrn, date_of_birth)
         VALUES (?1, ?2, ?3, ?4)",
        params![first_name, last_name, mrn, date_of_birth],
    )?;
    Ok(conn.last_insert_rowid())
}
