//! Care plan generation client. The LLM is an opaque external collaborator:
//! the worker hands it the order's patient records and medication and gets
//! text back. Everything behind `LlmClient` is swappable; tests use a stub.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const SYSTEM_PROMPT: &str = "You are an experienced clinical pharmacist \
specializing in creating comprehensive care plans.";

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Cannot connect to LLM backend at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("LLM backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Text generation seam: clinical input in, care plan text out.
pub trait LlmClient: Send + Sync {
    fn generate(
        &self,
        patient_records: &str,
        medication_name: &str,
    ) -> Result<String, LlmError>;
}

/// Build the care plan prompt from the order's clinical input.
fn build_prompt(patient_records: &str, medication_name: &str) -> String {
    format!(
        "You are a clinical pharmacist. Based on the following patient \
         information, generate a comprehensive care plan.\n\n\
         Patient Records:\n{patient_records}\n\n\
         Medication: {medication_name}\n\n\
         Please generate a care plan following this structure:\n\n\
         1. Problem list / Drug therapy problems (DTPs)\n\
         2. Goals (SMART)\n\
         3. Pharmacist interventions / plan\n\
         4. Monitoring plan & lab schedule\n\n\
         Provide detailed, clinically appropriate recommendations."
    )
}

/// HTTP client for a local generation backend.
///
/// Blocking on purpose: the worker runs on its own thread, and one
/// generation call at a time is the intended throughput.
pub struct HttpLlmClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl HttpLlmClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }
}

impl LlmClient for HttpLlmClient {
    fn generate(
        &self,
        patient_records: &str,
        medication_name: &str,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let prompt = build_prompt(patient_records, medication_name);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            system: SYSTEM_PROMPT,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                LlmError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                LlmError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                LlmError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| LlmError::HttpClient(e.to_string()))?;

        if parsed.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(parsed.response)
    }
}
