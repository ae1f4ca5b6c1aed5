//! The admission orchestrator: sequences the three duplicate checks against
//! one incoming submission, resolves entity identifiers (reuse vs. create),
//! and decides accept / warn / block for the overall request.
//!
//! Steps 1–6 run inside a single transaction so that a block or a failure at
//! any step leaves no partial provider/patient/order/care-plan rows behind.
//! The generation job is enqueued after commit, keyed by the care plan id,
//! so a crash between commit and enqueue never loses committed rows.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use super::duplicate::{check_order, check_patient, check_provider, DuplicateCheckResult};
use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{NewOrder, OrderMatch, OrderView, Patient, Provider};
use crate::queue::{jobs, QueueError};

/// A validated order submission: transient request payload, discarded after
/// identifiers are resolved.
#[derive(Debug, Clone)]
pub struct OrderSubmission {
    pub first_name: String,
    pub last_name: String,
    pub mrn: String,
    pub date_of_birth: NaiveDate,
    pub provider_name: String,
    pub provider_npi: String,
    pub primary_diagnosis: Option<String>,
    pub medication_name: String,
    pub additional_diagnosis: Vec<String>,
    pub medication_history: Vec<String>,
    pub patient_records: Option<String>,
    pub confirm: bool,
}

/// The three raw check results, returned to callers for transparency.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionChecks {
    pub provider: DuplicateCheckResult<Provider>,
    pub patient: DuplicateCheckResult<Patient>,
    pub order: DuplicateCheckResult<OrderMatch>,
}

/// Which check produced the hard block.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", content = "duplicate_check", rename_all = "snake_case")]
pub enum BlockedCheck {
    Provider(DuplicateCheckResult<Provider>),
    Order(DuplicateCheckResult<OrderMatch>),
}

/// Everything a successful admission hands back.
#[derive(Debug, Clone, Serialize)]
pub struct AdmissionReceipt {
    pub order: OrderView,
    pub care_plan_id: i64,
    pub warnings: Vec<String>,
    pub checks: AdmissionChecks,
}

/// Terminal outcome of one admission attempt.
#[derive(Debug, Clone, Serialize)]
pub enum AdmissionOutcome {
    /// Committed: provider (possibly reused), patient (possibly reused),
    /// order, pending care plan, and exactly one enqueued generation job.
    Created(Box<AdmissionReceipt>),
    /// Hard conflict; nothing was persisted.
    Blocked(BlockedCheck),
    /// Order warning without the confirm flag; nothing was persisted. The
    /// caller must resubmit with `confirm=true`.
    ConfirmationRequired {
        warnings: Vec<String>,
        order_check: DuplicateCheckResult<OrderMatch>,
    },
}

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Run the full admission sequence for one submission.
pub fn admit(
    conn: &Connection,
    submission: &OrderSubmission,
    now: DateTime<Utc>,
) -> Result<AdmissionOutcome, AdmissionError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let mut warnings: Vec<String> = Vec::new();

    // 1. Provider check — a block here aborts before anything is written.
    let provider_check = check_provider(&tx, &submission.provider_name, &submission.provider_npi)?;
    if provider_check.should_block {
        tx.rollback().map_err(DatabaseError::from)?;
        tracing::info!(npi = %submission.provider_npi, "Admission blocked: provider NPI conflict");
        return Ok(AdmissionOutcome::Blocked(BlockedCheck::Provider(provider_check)));
    }

    // 2. Patient check — advisory only, never aborts on its own.
    let patient_check = check_patient(
        &tx,
        &submission.first_name,
        &submission.last_name,
        &submission.mrn,
        submission.date_of_birth,
    )?;
    warnings.extend(patient_check.warnings.iter().cloned());

    // 3. Resolve provider id: reuse on a true duplicate, else create.
    let provider_id = match (&provider_check.existing_record, provider_check.is_duplicate) {
        (Some(existing), true) => existing.id,
        _ => repository::insert_provider(&tx, &submission.provider_name, &submission.provider_npi)?,
    };

    // 4. Resolve patient id: reuse whenever the check's matched record
    // carries exactly the submitted MRN. Deliberately a raw string
    // comparison, independent of is_duplicate — an MRN-conflict submission
    // reuses the existing row (the conflict was surfaced as a warning)
    // instead of tripping the MRN unique constraint.
    let patient_id = match &patient_check.existing_record {
        Some(existing) if existing.mrn == submission.mrn => existing.id,
        _ => repository::insert_patient(
            &tx,
            &submission.first_name,
            &submission.last_name,
            &submission.mrn,
            submission.date_of_birth,
        )?,
    };

    // 5. Order check against the resolved patient id.
    let order_check = check_order(
        &tx,
        patient_id,
        &submission.medication_name,
        now,
        submission.confirm,
    )?;

    if order_check.should_block {
        tx.rollback().map_err(DatabaseError::from)?;
        tracing::info!(patient_id, "Admission blocked: same-day order collision");
        return Ok(AdmissionOutcome::Blocked(BlockedCheck::Order(order_check)));
    }

    if !order_check.warnings.is_empty() && !submission.confirm {
        tx.rollback().map_err(DatabaseError::from)?;
        tracing::info!(patient_id, "Admission needs confirmation: other-day order overlap");
        return Ok(AdmissionOutcome::ConfirmationRequired {
            warnings,
            order_check,
        });
    }
    warnings.extend(order_check.warnings.iter().cloned());

    // 6. Persist order + pending care plan; commit makes the admission final.
    let order_id = repository::insert_order(
        &tx,
        &NewOrder {
            patient_id,
            provider_id,
            primary_diagnosis: submission.primary_diagnosis.clone(),
            medication_name: submission.medication_name.clone(),
            additional_diagnosis: submission.additional_diagnosis.clone(),
            medication_history: submission.medication_history.clone(),
            patient_records: submission.patient_records.clone(),
            created_at: now,
        },
    )?;
    let care_plan_id = repository::insert_care_plan(&tx, order_id)?;
    tx.commit().map_err(DatabaseError::from)?;

    // 7. Enqueue the generation job, idempotent on the job key.
    let job_key = format!("careplan-{care_plan_id}");
    let enqueued = jobs::enqueue(conn, &job_key, care_plan_id, now)?;
    tracing::info!(order_id, care_plan_id, enqueued, "Order admitted, care plan queued");

    // 8. Return the persisted view plus warnings plus the raw checks.
    let order = repository::fetch_order_view(conn, order_id)?.ok_or_else(|| {
        DatabaseError::NotFound {
            entity_type: "order".into(),
            id: order_id.to_string(),
        }
    })?;

    Ok(AdmissionOutcome::Created(Box::new(AdmissionReceipt {
        order,
        care_plan_id,
        warnings,
        checks: AdmissionChecks {
            provider: provider_check,
            patient: patient_check,
            order: order_check,
        },
    })))
}
