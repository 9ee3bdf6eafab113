//! AGS score passback.

use crate::error::LtiError;
use crate::exchange::{BearerToken, TokenExchangeClient};
use chrono::{SecondsFormat, Utc};
use ltigate_telemetry::MetricsRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Media type of AGS score submissions.
pub const SCORE_CONTENT_TYPE: &str = "application/vnd.ims.lis.v1.score+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityProgress {
    Initialized,
    Started,
    InProgress,
    Submitted,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradingProgress {
    FullyGraded,
    Pending,
    PendingManual,
    Failed,
    NotReady,
}

/// Score body posted to `{lineitem}/scores`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEnvelope {
    pub score_given: f64,
    pub score_maximum: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub activity_progress: ActivityProgress,
    pub grading_progress: GradingProgress,
    /// RFC 3339, generated at submission time.
    pub timestamp: String,
    pub user_id: String,
}

impl GradeEnvelope {
    /// A final grade: `Completed` / `FullyGraded`, stamped now.
    ///
    /// The score is passed through as given; callers clamp.
    pub fn completed(submission: &GradeSubmission) -> Self {
        Self {
            score_given: submission.score,
            score_maximum: submission.max_score,
            comment: submission.comment.clone().filter(|c| !c.is_empty()),
            activity_progress: ActivityProgress::Completed,
            grading_progress: GradingProgress::FullyGraded,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            user_id: submission.user_id.clone(),
        }
    }
}

/// What to post and where.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeSubmission {
    pub lineitem_url: String,
    pub user_id: String,
    pub score: f64,
    pub max_score: f64,
    pub comment: Option<String>,
}

/// Posts scores to a line item, exchanging client credentials for a token
/// when the caller does not bring one.
pub struct GradePassbackClient {
    client: reqwest::Client,
    exchange: Arc<TokenExchangeClient>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl GradePassbackClient {
    pub fn new(client: reqwest::Client, exchange: Arc<TokenExchangeClient>) -> Self {
        Self {
            client,
            exchange,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Post `submission`, returning the envelope that was accepted.
    pub async fn submit(
        &self,
        submission: &GradeSubmission,
        bearer: Option<&BearerToken>,
    ) -> Result<GradeEnvelope, LtiError> {
        let result = self.post_score(submission, bearer).await;

        match &result {
            Ok(envelope) => {
                ltigate_telemetry::log_grade_submitted!(
                    user_id = %envelope.user_id,
                    lineitem = %submission.lineitem_url,
                    score = envelope.score_given,
                    max_score = envelope.score_maximum
                );
            }
            Err(e) => {
                ltigate_telemetry::log_grade_failed!(
                    user_id = %submission.user_id,
                    lineitem = %submission.lineitem_url,
                    error = %e
                );
            }
        }
        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "submitted",
                Err(e) => e.kind(),
            };
            metrics.record_grade_submission(outcome);
        }

        result
    }

    async fn post_score(
        &self,
        submission: &GradeSubmission,
        bearer: Option<&BearerToken>,
    ) -> Result<GradeEnvelope, LtiError> {
        let exchanged;
        let token = match bearer {
            Some(token) => token,
            None => {
                exchanged = self.exchange.exchange().await?;
                &exchanged
            }
        };

        let envelope = GradeEnvelope::completed(submission);

        let started = Instant::now();
        let response = self
            .client
            .post(scores_url(&submission.lineitem_url))
            .header("content-type", SCORE_CONTENT_TYPE)
            .header("authorization", token.authorization())
            .json(&envelope)
            .send()
            .await;
        if let Some(metrics) = &self.metrics {
            metrics.record_outbound("grade", started.elapsed().as_secs_f64());
        }

        let response = response.map_err(|e| LtiError::GradeEndpointUnreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LtiError::GradeRejected(status.as_u16()));
        }
        Ok(envelope)
    }
}

/// `{lineitem}/scores`, keeping any query string after the new segment.
pub fn scores_url(lineitem_url: &str) -> String {
    match lineitem_url.split_once('?') {
        Some((path, query)) => format!("{}/scores?{}", path.trim_end_matches('/'), query),
        None => format!("{}/scores", lineitem_url.trim_end_matches('/')),
    }
}

/// Validate a score from an untrusted caller: negative scores are rejected,
/// scores above the maximum are capped.
pub fn clamp_score(score: f64, max_score: f64) -> Result<f64, String> {
    if !score.is_finite() || !max_score.is_finite() {
        return Err("score must be a finite number".into());
    }
    if score < 0.0 {
        return Err("score cannot be negative".into());
    }
    if max_score <= 0.0 {
        return Err("max_score must be positive".into());
    }
    Ok(score.min(max_score))
}
