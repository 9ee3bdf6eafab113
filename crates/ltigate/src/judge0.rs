//! Judge0 code runner.

use futures_util::future::BoxFuture;
use ltigate_core::{CodeExecutor, ExecutionError, ExecutionRequest, ExecutionResult};
use serde::{Deserialize, Serialize};

/// Judge0 language ids by name.
const LANGUAGES: &[(&str, u32)] = &[
    ("go", 75),
    ("python", 71),
    ("java", 62),
    ("javascript", 63),
    ("cpp", 54),
    ("c", 50),
    ("php", 68),
    ("ruby", 72),
    ("rust", 73),
    ("swift", 83),
];

const FALLBACK_LANGUAGE_ID: u32 = 75;

/// Judge0 id for `language`; unknown names run as Go.
pub fn language_id(language: &str) -> u32 {
    let language = language.to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|(name, _)| *name == language)
        .map(|(_, id)| *id)
        .unwrap_or(FALLBACK_LANGUAGE_ID)
}

#[derive(Serialize)]
struct Submission<'a> {
    source_code: &'a str,
    language_id: u32,
}

#[derive(Deserialize)]
struct SubmissionStatus {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct SubmissionResult {
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
    status: Option<SubmissionStatus>,
    exit_code: Option<i32>,
    time: Option<String>,
    memory: Option<u64>,
}

impl From<SubmissionResult> for ExecutionResult {
    fn from(r: SubmissionResult) -> Self {
        Self {
            stdout: r.stdout.unwrap_or_default(),
            stderr: r.stderr.unwrap_or_default(),
            compile_output: r.compile_output.unwrap_or_default(),
            status: r.status.map(|s| s.description).unwrap_or_default(),
            exit_code: r.exit_code,
            time: r.time,
            memory: r.memory,
        }
    }
}

/// Runs code synchronously through `POST /submissions?wait=true`.
pub struct Judge0Executor {
    client: reqwest::Client,
    submissions_url: String,
    auth_token: Option<String>,
}

impl Judge0Executor {
    pub fn new(client: reqwest::Client, base_url: &str, auth_token: Option<String>) -> Self {
        Self {
            client,
            submissions_url: format!("{}/submissions?wait=true", base_url.trim_end_matches('/')),
            auth_token: auth_token.filter(|t| !t.is_empty()),
        }
    }

    async fn submit(&self, request: ExecutionRequest) -> Result<ExecutionResult, ExecutionError> {
        let submission = Submission {
            source_code: &request.source_code,
            language_id: language_id(&request.language),
        };

        let mut builder = self.client.post(&self.submissions_url).json(&submission);
        if let Some(token) = &self.auth_token {
            builder = builder.header("X-Auth-Token", token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExecutionError::Unreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::Rejected(status.as_u16()));
        }

        let result: SubmissionResult = response
            .json()
            .await
            .map_err(|e| ExecutionError::Malformed(e.to_string()))?;
        Ok(result.into())
    }
}

impl CodeExecutor for Judge0Executor {
    fn execute(
        &self,
        request: ExecutionRequest,
    ) -> BoxFuture<'_, Result<ExecutionResult, ExecutionError>> {
        Box::pin(self.submit(request))
    }
}
