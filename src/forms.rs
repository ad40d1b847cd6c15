//! Forms-service collaborator: submission model and JotForm API client.
//!
//! The batch processor only sees the [`FormsService`] trait, so tests swap in
//! canned batches without touching the network.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::config::Settings;

const DEFAULT_BASE_URL: &str = "https://api.jotform.com";

/// Percent-encoded `{"status":"ACTIVE","new":"1"}`.
const NEW_SUBMISSIONS_FILTER: &str =
    "%7B%22status%22%3A%22ACTIVE%22%2C%22new%22%3A%221%22%7D";

/// One question's answer within a submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub text: String,
    /// Absent for non-question form elements (page titles, headers).
    #[serde(default)]
    pub answer: Option<String>,
}

/// One form response. Immutable once fetched.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub id: String,
    #[serde(default)]
    pub answers: BTreeMap<String, Answer>,
}

/// A fetched batch plus the API's remaining-call budget, when reported.
#[derive(Debug, Clone, Default)]
pub struct FetchBatch {
    pub submissions: Vec<Submission>,
    pub calls_left: Option<u64>,
}

/// Submission fetch / mark-read operations consumed by the batch processor.
pub trait FormsService {
    fn fetch_new(&self) -> Result<FetchBatch>;

    /// Mark the given submissions read. Returns the number of ids that could
    /// not be marked; failures are logged, never retried.
    fn mark_read(&self, ids: &[String]) -> Result<usize>;
}

#[derive(Debug, Deserialize)]
struct SubmissionsResponse {
    #[serde(rename = "resultSet")]
    result_set: Option<ResultSet>,
    /// JotForm reports the budget at the response top level.
    #[serde(rename = "limit-left")]
    limit_left: Option<u64>,
    #[serde(default)]
    content: Vec<Submission>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    count: u64,
    #[serde(rename = "limit-left")]
    limit_left: Option<u64>,
}

/// Blocking JotForm API client.
pub struct JotformClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    form_id: String,
}

impl JotformClient {
    pub fn new(settings: &Settings) -> JotformClient {
        JotformClient {
            agent: ureq::Agent::new_with_defaults(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: settings.api_key.clone(),
            form_id: settings.form_id.clone(),
        }
    }
}

impl FormsService for JotformClient {
    fn fetch_new(&self) -> Result<FetchBatch> {
        let url = format!(
            "{}/form/{}/submissions?filter={}",
            self.base_url, self.form_id, NEW_SUBMISSIONS_FILTER
        );
        let request = self.agent.get(&url).header("APIKEY", self.api_key.as_str());
        let mut response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => {
                // Non-success responses are logged and treated as an empty
                // batch; the next scheduled run retries naturally.
                tracing::warn!(code, "forms service returned non-success status");
                return Ok(FetchBatch::default());
            }
            Err(err) => return Err(err).context("fetch new submissions"),
        };
        let body: SubmissionsResponse = response
            .body_mut()
            .read_json()
            .context("decode submissions response")?;

        if let Some(result_set) = &body.result_set {
            tracing::debug!(count = result_set.count, "forms service result set");
        }
        let calls_left = body
            .limit_left
            .or_else(|| body.result_set.as_ref().and_then(|set| set.limit_left));
        Ok(FetchBatch {
            submissions: body.content,
            calls_left,
        })
    }

    fn mark_read(&self, ids: &[String]) -> Result<usize> {
        let mut failures = 0;
        for id in ids {
            let url = format!("{}/submission/{}", self.base_url, id);
            let result = self
                .agent
                .post(&url)
                .header("APIKEY", self.api_key.as_str())
                .send_form([("submission[new]", "0")]);
            if let Err(err) = result {
                tracing::warn!(submission = %id, error = %err, "mark read failed");
                failures += 1;
            }
        }
        Ok(failures)
    }
}
