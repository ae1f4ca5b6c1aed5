//! Order intake and retrieval endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::admission::{self, AdmissionOutcome, AdmissionReceipt, OrderSubmission};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository;
use crate::models::OrderView;

/// Incoming order payload. Identity fields are optional at the wire level so
/// validation can name every missing field instead of failing on the first.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mrn: Option<String>,
    pub date_of_birth: Option<String>,
    pub provider_name: Option<String>,
    pub provider_npi: Option<String>,
    pub primary_diagnosis: Option<String>,
    pub medication_name: Option<String>,
    #[serde(default)]
    pub additional_diagnosis: Vec<String>,
    #[serde(default)]
    pub medication_history: Vec<String>,
    pub patient_records: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

impl OrderRequest {
    /// Check required fields and parse the date of birth.
    fn validate(self) -> Result<OrderSubmission, ApiError> {
        let mut missing = Vec::new();

        let required = |value: &Option<String>, name: &str, missing: &mut Vec<String>| {
            match value {
                Some(v) if !v.trim().is_empty() => {}
                _ => missing.push(name.to_string()),
            }
        };

        required(&self.first_name, "firstName", &mut missing);
        required(&self.last_name, "lastName", &mut missing);
        required(&self.mrn, "mrn", &mut missing);
        required(&self.date_of_birth, "dateOfBirth", &mut missing);
        required(&self.provider_name, "providerName", &mut missing);
        required(&self.provider_npi, "providerNpi", &mut missing);
        required(&self.medication_name, "medicationName", &mut missing);

        if !missing.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let raw_dob = self.date_of_birth.unwrap_or_default();
        let date_of_birth = raw_dob.trim().parse::<NaiveDate>().map_err(|_| {
            ApiError::BadRequest(format!(
                "Invalid dateOfBirth \"{raw_dob}\", expected YYYY-MM-DD"
            ))
        })?;

        Ok(OrderSubmission {
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            mrn: self.mrn.unwrap_or_default(),
            date_of_birth,
            provider_name: self.provider_name.unwrap_or_default(),
            provider_npi: self.provider_npi.unwrap_or_default(),
            primary_diagnosis: self.primary_diagnosis,
            medication_name: self.medication_name.unwrap_or_default(),
            additional_diagnosis: self.additional_diagnosis,
            medication_history: self.medication_history,
            patient_records: self.patient_records,
            confirm: self.confirm,
        })
    }
}

/// `POST /api/orders` — run the admission sequence for one submission.
///
/// 201 with the full receipt on create; 409 on a hard block or when a
/// similar order needs `confirm=true`.
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<AdmissionReceipt>), ApiError> {
    let submission = request.validate()?;

    let outcome = {
        let conn = ctx.lock_db()?;
        admission::admit(&conn, &submission, Utc::now())?
    };

    match outcome {
        AdmissionOutcome::Created(receipt) => {
            tracing::info!(
                order_id = receipt.order.id,
                care_plan_id = receipt.care_plan_id,
                warnings = receipt.warnings.len(),
                "Order admitted"
            );
            Ok((StatusCode::CREATED, Json(*receipt)))
        }
        AdmissionOutcome::Blocked(check) => {
            tracing::info!(mrn = %submission.mrn, "Order blocked by duplicate check");
            Err(ApiError::DuplicateBlocked(check))
        }
        AdmissionOutcome::ConfirmationRequired {
            warnings,
            order_check,
        } => {
            tracing::info!(mrn = %submission.mrn, "Order needs confirmation");
            Err(ApiError::ConfirmationRequired {
                warnings,
                order_check,
            })
        }
    }
}

/// `GET /api/orders` — all order views, newest first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<OrderView>>, ApiError> {
    let conn = ctx.lock_db()?;
    Ok(Json(repository::fetch_order_views(&conn)?))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// `GET /api/orders/search?q=` — substring search across patient, provider,
/// and medication fields.
pub async fn search(
    State(ctx): State<ApiContext>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<OrderView>>, ApiError> {
    let term = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing query parameter: q".into()))?;

    let conn = ctx.lock_db()?;
    Ok(Json(repository::search_order_views(&conn, term.trim())?))
}

/// `GET /api/orders/:id` — single order view.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<Json<OrderView>, ApiError> {
    let conn = ctx.lock_db()?;
    repository::fetch_order_view(&conn, id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))
}

/// `DELETE /api/orders/:id` — remove the order with its care plan and jobs.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = {
        let conn = ctx.lock_db()?;
        repository::delete_order(&conn, id)?
    };

    if deleted {
        tracing::info!(order_id = id, "Order deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Order {id} not found")))
    }
}
