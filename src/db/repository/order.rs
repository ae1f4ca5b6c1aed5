use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::admission::identity::normalize_identifier;
use crate::db::DatabaseError;
use crate::models::{NewOrder, OrderMatch, OrderView};

fn map_order_match(row: &Row<'_>) -> rusqlite::Result<OrderMatch> {
    Ok(OrderMatch {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        medication_name: row.get(2)?,
        created_at: row.get(3)?,
        patient_first_name: row.get(4)?,
        patient_last_name: row.get(5)?,
        patient_mrn: row.get(6)?,
        patient_date_of_birth: row.get(7)?,
    })
}

const ORDER_MATCH_SELECT: &str = "SELECT
        o.id,
        o.patient_id,
        o.medication_name,
        o.created_at,
        p.first_name,
        p.last_name,
        p.mrn,
        p.date_of_birth
     FROM orders o
     JOIN patients p ON p.id = o.patient_id";

/// Most recent order of the patient for the same normalized medication on the
/// given calendar day.
///
/// Candidates are narrowed by patient and day in SQL; medication equality is
/// decided in Rust, since SQLite's `LOWER` folds ASCII only.
pub fn find_order_same_day(
    conn: &Connection,
    patient_id: i64,
    medication_name: &str,
    date: NaiveDate,
) -> Result<Option<OrderMatch>, DatabaseError> {
    let sql = format!(
        "{ORDER_MATCH_SELECT}
         WHERE o.patient_id = ?1
           AND DATE(o.created_at) = ?2
         ORDER BY o.created_at DESC, o.id DESC"
    );
    first_medication_match(conn, &sql, patient_id, medication_name, date)
}

/// Most recent order of the patient for the same normalized medication on any
/// other calendar day.
pub fn find_order_other_day(
    conn: &Connection,
    patient_id: i64,
    medication_name: &str,
    date: NaiveDate,
) -> Result<Option<OrderMatch>, DatabaseError> {
    let sql = format!(
        "{ORDER_MATCH_SELECT}
         WHERE o.patient_id = ?1
           AND DATE(o.created_at) <> ?2
         ORDER BY o.created_at DESC, o.id DESC"
    );
    first_medication_match(conn, &sql, patient_id, medication_name, date)
}

fn first_medication_match(
    conn: &Connection,
    sql: &str,
    patient_id: i64,
    medication_name: &str,
    date: NaiveDate,
) -> Result<Option<OrderMatch>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let wanted = normalize_identifier(medication_name);
    let rows = stmt.query_map(params![patient_id, date], map_order_match)?;

    for row in rows {
        let order = row?;
        if normalize_identifier(&order.medication_name) == wanted {
            return Ok(Some(order));
        }
    }
    Ok(None)
}

/// Insert a new order row, returning its id.
pub fn insert_order(conn: &Connection, order: &NewOrder) -> Result<i64, DatabaseError> {
    let additional = serde_json::to_string(&order.additional_diagnosis)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
    let history = serde_json::to_string(&order.medication_history)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    conn.execute(
        "INSERT INTO orders
            (patient_id, provider_id, primary_diagnosis, medication_name,
             additional_diagnosis, medication_history, patient_records, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            order.patient_id,
            order.provider_id,
            order.primary_diagnosis,
            order.medication_name,
            additional,
            history,
            order.patient_records,
            order.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn map_order_view(row: &Row<'_>) -> rusqlite::Result<OrderView> {
    let additional: String = row.get(3)?;
    let history: String = row.get(4)?;
    let status: Option<String> = row.get(18)?;

    Ok(OrderView {
        id: row.get(0)?,
        primary_diagnosis: row.get(1)?,
        medication_name: row.get(2)?,
        additional_diagnosis: serde_json::from_str(&additional).unwrap_or_default(),
        medication_history: serde_json::from_str(&history).unwrap_or_default(),
        patient_records: row.get(5)?,
        order_created_at: row.get(6)?,
        patient_id: row.get(7)?,
        first_name: row.get(8)?,
        last_name: row.get(9)?,
        mrn: row.get(10)?,
        patient_date_of_birth: row.get(11)?,
        provider_id: row.get(12)?,
        provider_name: row.get(13)?,
        provider_npi: row.get(14)?,
        care_plan_id: row.get(15)?,
        care_plan_content: row.get(16)?,
        error_message: row.get(17)?,
        care_plan_status: status.and_then(|s| s.parse().ok()),
        care_plan_created_at: row.get(19)?,
        care_plan_updated_at: row.get(20)?,
    })
}

const ORDER_VIEW_SELECT: &str = "SELECT
        o.id,
        o.primary_diagnosis,
        o.medication_name,
        o.additional_diagnosis,
        o.medication_history,
        o.patient_records,
        o.created_at,
        p.id,
        p.first_name,
        p.last_name,
        p.mrn,
        p.date_of_birth,
        pr.id,
        pr.name,
        pr.npi,
        cp.id,
        cp.content,
        cp.error_message,
        cp.status,
        cp.created_at,
        cp.updated_at
     FROM orders o
     JOIN patients p ON o.patient_id = p.id
     JOIN providers pr ON o.provider_id = pr.id
     LEFT JOIN care_plans cp ON o.id = cp.order_id";

/// All orders with patient, provider, and care plan info, newest first.
pub fn fetch_order_views(conn: &Connection) -> Result<Vec<OrderView>, DatabaseError> {
    let sql = format!("{ORDER_VIEW_SELECT} ORDER BY o.created_at DESC, o.id DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_order_view)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// One order view by id.
pub fn fetch_order_view(
    conn: &Connection,
    order_id: i64,
) -> Result<Option<OrderView>, DatabaseError> {
    let sql = format!("{ORDER_VIEW_SELECT} WHERE o.id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    Ok(stmt.query_row(params![order_id], map_order_view).optional()?)
}

/// Substring search over patient, provider, medication, and diagnosis fields.
pub fn search_order_views(
    conn: &Connection,
    term: &str,
) -> Result<Vec<OrderView>, DatabaseError> {
    let pattern = format!("%{term}%");
    let sql = format!(
        "{ORDER_VIEW_SELECT}
         WHERE LOWER(p.first_name) LIKE LOWER(?1)
            OR LOWER(p.last_name) LIKE LOWER(?1)
            OR LOWER(p.mrn) LIKE LOWER(?1)
            OR LOWER(pr.name) LIKE LOWER(?1)
            OR LOWER(pr.npi) LIKE LOWER(?1)
            OR LOWER(o.medication_name) LIKE LOWER(?1)
            OR LOWER(o.primary_diagnosis) LIKE LOWER(?1)
         ORDER BY o.created_at DESC, o.id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![pattern], map_order_view)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

/// Delete an order along with its care plan and queued jobs, in one
/// transaction. Returns false when no such order exists.
pub fn delete_order(conn: &Connection, order_id: i64) -> Result<bool, DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    let exists: Option<i64> = tx
        .query_row(
            "SELECT id FROM orders WHERE id = ?1",
            params![order_id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Ok(false);
    }

    tx.execute(
        "DELETE FROM jobs WHERE care_plan_id IN
            (SELECT id FROM care_plans WHERE order_id = ?1)",
        params![order_id],
    )?;
    tx.execute("DELETE FROM care_plans WHERE order_id = ?1", params![order_id])?;
    tx.execute("DELETE FROM orders WHERE id = ?1", params![order_id])?;

    tx.commit()?;
    Ok(true)
}
