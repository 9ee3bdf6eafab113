//! ltigate: an LTI tool provider.
//!
//! Verifies LTI 1.1 and LTI 1.3 launches, runs submitted code through Judge0
//! and passes grades back to the platform.

use std::process::ExitCode;

use clap::Parser;
use ltigate_telemetry::Telemetry;

mod api;
mod cli;
mod error;
mod judge0;
mod server;

use cli::Cli;
use server::ServerConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry_config = match cli.telemetry_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(2);
        }
    };
    let telemetry = match Telemetry::init(telemetry_config) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(1);
        }
    };

    let lti = match cli.lti_config() {
        Ok(lti) => lti,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "failed to load configuration");
            return ExitCode::from(2);
        }
    };
    let problems = lti.validate();
    if !problems.is_empty() {
        for problem in &problems {
            tracing::error!(error = %problem, "invalid configuration");
        }
        return ExitCode::from(2);
    }

    ltigate_telemetry::log_startup!(
        service = %telemetry.config().service_name,
        version = env!("CARGO_PKG_VERSION"),
        platform_issuer = %lti.platform.issuer,
        client_id = %lti.platform.client_id,
        tool = %lti.tool.base_url
    );

    let config = ServerConfig {
        listen_addr: cli.listen_addr(),
        lti,
        judge0_url: cli.judge0_url.clone(),
        judge0_auth_token: cli.judge0_auth_token.clone(),
        metrics: telemetry.metrics(),
    };

    match server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "server error");
            ExitCode::from(1)
        }
    }
}
