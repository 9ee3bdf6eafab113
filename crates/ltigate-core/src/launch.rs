//! Launch orchestration.
//!
//! A launch is verified under exactly one trust model, chosen from the
//! parameters it carries. Only a verified launch may run code or queue a
//! grade; grade passback is handed to the background queue and never fails
//! the launch.

use crate::claims::{ClaimsExtractor, LaunchClaims};
use crate::config::LtiConfig;
use crate::error::LtiError;
use crate::execution::{
    CleanRunPolicy, CodeExecutor, ExecutionError, ExecutionRequest, ExecutionResult, ScoringPolicy,
};
use crate::grade::GradeSubmission;
use crate::keyset::KeySetCache;
use crate::legacy::LegacySignatureVerifier;
use crate::params::LaunchParameters;
use crate::token::TokenVerifier;
use crate::worker::GradeQueue;
use ltigate_oauth1::{RequestTarget, SIGNATURE_PARAM};
use ltigate_telemetry::MetricsRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Form field carrying the signed id_token.
pub const ID_TOKEN_PARAM: &str = "id_token";

/// Comment attached to grades computed from a code run.
pub const AUTO_GRADE_COMMENT: &str = "Auto-graded by ltigate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustMode {
    /// LTI 1.1: OAuth 1.0a HMAC-SHA1 signed form.
    Legacy,
    /// LTI 1.3: JWT id_token verified against the platform key set.
    Token,
}

impl TrustMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Token => "token",
        }
    }

    /// Pick the trust model from the parameters present.
    ///
    /// An `oauth_signature` selects the legacy model even when an
    /// `id_token` is also present; the other model is never tried.
    pub fn detect(params: &LaunchParameters) -> Result<Self, LtiError> {
        if params.contains(SIGNATURE_PARAM) {
            Ok(Self::Legacy)
        } else if params.contains(ID_TOKEN_PARAM) {
            Ok(Self::Token)
        } else {
            Err(LtiError::MissingCredential("oauth_signature or id_token"))
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LaunchOptions {
    /// Run the launch's `code` custom parameter, if any.
    pub execute_code: bool,
    /// Queue a grade for the run when the launch names a line item.
    pub submit_grade: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            execute_code: true,
            submit_grade: true,
        }
    }
}

impl LaunchOptions {
    pub fn verify_only() -> Self {
        Self {
            execute_code: false,
            submit_grade: false,
        }
    }
}

#[derive(Debug)]
pub struct LaunchOutcome {
    pub claims: LaunchClaims,
    /// Present when code was found and an executor is configured.
    pub execution: Option<Result<ExecutionResult, ExecutionError>>,
    pub score: Option<f64>,
    /// Id of the queued grade job.
    pub grade_job: Option<Uuid>,
}

pub struct LaunchOrchestrator {
    legacy: LegacySignatureVerifier,
    tokens: TokenVerifier,
    keys: Arc<KeySetCache>,
    jwks_url: String,
    /// Required `deployment_id` claim, when one is configured.
    deployment_id: Option<String>,
    default_language: String,
    max_score: f64,
    executor: Option<Arc<dyn CodeExecutor>>,
    scoring: Arc<dyn ScoringPolicy>,
    grades: Option<GradeQueue>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl LaunchOrchestrator {
    pub fn new(config: &LtiConfig, keys: Arc<KeySetCache>) -> Self {
        Self {
            legacy: LegacySignatureVerifier::new(&config.legacy),
            tokens: TokenVerifier::new(config),
            keys,
            jwks_url: config.platform.jwks_url.clone(),
            deployment_id: config
                .platform
                .deployment_id
                .clone()
                .filter(|d| !d.is_empty()),
            default_language: config.default_language.clone(),
            max_score: config.grading.default_max_score,
            executor: None,
            scoring: Arc::new(CleanRunPolicy),
            grades: None,
            metrics: None,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn CodeExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_scoring(mut self, scoring: Arc<dyn ScoringPolicy>) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_grade_queue(mut self, grades: GradeQueue) -> Self {
        self.grades = Some(grades);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    /// Verify a launch, then run its code and queue its grade as `options`
    /// allow. `target` is only read in legacy mode.
    pub async fn handle_launch(
        &self,
        mode: TrustMode,
        target: &RequestTarget<'_>,
        params: &LaunchParameters,
        options: LaunchOptions,
    ) -> Result<LaunchOutcome, LtiError> {
        let claims = self.verify(mode, target, params).await?;

        let mut outcome = LaunchOutcome {
            claims,
            execution: None,
            score: None,
            grade_job: None,
        };
        if !options.execute_code {
            return Ok(outcome);
        }

        let Some(code) = outcome.claims.code() else {
            return Ok(outcome);
        };
        let language = outcome.claims.language(&self.default_language);
        let Some(execution) = self
            .execute(ExecutionRequest {
                source_code: code,
                language,
            })
            .await
        else {
            return Ok(outcome);
        };

        if let Ok(result) = &execution {
            let score = self.scoring.score(result, self.max_score);
            outcome.score = Some(score);

            if options.submit_grade {
                if let Some(lineitem) = outcome.claims.lineitem() {
                    outcome.grade_job = self.enqueue_grade(GradeSubmission {
                        lineitem_url: lineitem.to_string(),
                        user_id: outcome.claims.subject.clone(),
                        score,
                        max_score: self.max_score,
                        comment: Some(AUTO_GRADE_COMMENT.to_string()),
                    });
                }
            }
        }
        outcome.execution = Some(execution);

        Ok(outcome)
    }

    /// Verify a launch under `mode` and build its claims.
    pub async fn verify(
        &self,
        mode: TrustMode,
        target: &RequestTarget<'_>,
        params: &LaunchParameters,
    ) -> Result<LaunchClaims, LtiError> {
        let result = match mode {
            TrustMode::Legacy => self.verify_legacy(target, params),
            TrustMode::Token => self.verify_token(params).await,
        };

        match &result {
            Ok(claims) => {
                ltigate_telemetry::log_launch_verified!(
                    mode = mode.as_str(),
                    issuer = %claims.issuer,
                    user_id = %claims.subject,
                    message_type = %claims.message_type
                );
            }
            Err(e) => {
                ltigate_telemetry::log_launch_rejected!(
                    mode = mode.as_str(),
                    reason = e.kind(),
                    error = %e
                );
            }
        }
        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "verified",
                Err(e) => e.kind(),
            };
            metrics.record_launch(mode.as_str(), outcome);
        }

        result
    }

    fn verify_legacy(
        &self,
        target: &RequestTarget<'_>,
        params: &LaunchParameters,
    ) -> Result<LaunchClaims, LtiError> {
        if !self.legacy.verify(target, params)? {
            return Err(LtiError::SignatureInvalid);
        }
        ClaimsExtractor::from_legacy(params)
    }

    async fn verify_token(&self, params: &LaunchParameters) -> Result<LaunchClaims, LtiError> {
        let id_token = params
            .get(ID_TOKEN_PARAM)
            .ok_or(LtiError::MissingCredential(ID_TOKEN_PARAM))?;

        let keys = self.keys.resolve(&self.jwks_url).await?;
        let verified = match self.tokens.verify(id_token, &keys) {
            Err(LtiError::UnknownKey(kid)) => {
                // The platform may have rotated its keys since the last fetch.
                match self.keys.refresh_after_miss(&self.jwks_url).await? {
                    Some(fresh) => self.tokens.verify(id_token, &fresh)?,
                    None => return Err(LtiError::UnknownKey(kid)),
                }
            }
            other => other?,
        };

        let claims = ClaimsExtractor::extract(&verified)?;
        if let Some(expected) = &self.deployment_id {
            if claims.deployment_id != *expected {
                return Err(LtiError::DeploymentMismatch(claims.deployment_id));
            }
        }
        Ok(claims)
    }

    /// Run code through the configured executor. `None` when there is no
    /// executor.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Option<Result<ExecutionResult, ExecutionError>> {
        let executor = self.executor.as_ref()?;
        let language = request.language.clone();

        let started = Instant::now();
        let result = executor.execute(request).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_outbound("execution", started.elapsed().as_secs_f64());
            let outcome = match &result {
                Ok(_) => "completed",
                Err(e) => e.kind(),
            };
            metrics.record_execution(outcome);
        }
        if let Err(e) = &result {
            ltigate_telemetry::log_execution_failed!(language = %language, error = %e);
        }

        Some(result)
    }

    /// Score an execution result out of the configured maximum.
    pub fn score(&self, result: &ExecutionResult, max_score: Option<f64>) -> f64 {
        self.scoring
            .score(result, max_score.unwrap_or(self.max_score))
    }

    /// Hand a grade to the background queue. `None` when no queue is
    /// configured or the queue is full.
    pub fn enqueue_grade(&self, submission: GradeSubmission) -> Option<Uuid> {
        self.grades.as_ref()?.enqueue(submission).ok()
    }
}
