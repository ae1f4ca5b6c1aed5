use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{CarePlan, CarePlanInput};

/// Create a pending care plan for the given order, returning its id.
pub fn insert_care_plan(conn: &Connection, order_id: i64) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO care_plans (order_id, status) VALUES (?1, 'pending')",
        params![order_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fetch one care plan by id.
pub fn get_care_plan(
    conn: &Connection,
    care_plan_id: i64,
) -> Result<Option<CarePlan>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, content, status, error_message, created_at, updated_at
         FROM care_plans WHERE id = ?1",
    )?;

    let plan = stmt
        .query_row(params![care_plan_id], |row| {
            let status: String = row.get(3)?;
            Ok(CarePlan {
                id: row.get(0)?,
                order_id: row.get(1)?,
                content: row.get(2)?,
                status: status.parse().unwrap_or(crate::models::CarePlanStatus::Pending),
                error_message: row.get(4)?,
                created_at: row.get(5)?,
                updated_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(plan)
}

/// Load the order fields a generation job needs.
pub fn fetch_care_plan_input(
    conn: &Connection,
    care_plan_id: i64,
) -> Result<Option<CarePlanInput>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT cp.id, o.id, o.patient_records, o.medication_name
         FROM care_plans cp
         JOIN orders o ON cp.order_id = o.id
         WHERE cp.id = ?1",
    )?;

    let input = stmt
        .query_row(params![care_plan_id], |row| {
            Ok(CarePlanInput {
                care_plan_id: row.get(0)?,
                order_id: row.get(1)?,
                patient_records: row.get(2)?,
                medication_name: row.get(3)?,
            })
        })
        .optional()?;

    Ok(input)
}

/// Flip a care plan to `processing`.
pub fn mark_care_plan_processing(
    conn: &Connection,
    care_plan_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE care_plans
         SET status = 'processing',
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?1",
        params![care_plan_id],
    )?;
    Ok(())
}

/// Store generated content and mark the care plan `completed`.
pub fn complete_care_plan(
    conn: &Connection,
    care_plan_id: i64,
    content: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE care_plans
         SET content = ?1,
             status = 'completed',
             error_message = NULL,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?2",
        params![content, care_plan_id],
    )?;
    Ok(())
}

/// Record the terminal failure of a care plan generation.
pub fn fail_care_plan(
    conn: &Connection,
    care_plan_id: i64,
    error_message: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE care_plans
         SET status = 'failed',
             error_message = ?1,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
         WHERE id = ?2",
        params![error_message, care_plan_id],
    )?;
    Ok(())
}
