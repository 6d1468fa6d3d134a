// Helper functions shared by the pipeline steps

use std::process::{Output, Stdio};
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};
use url::Url;

use super::errors::ResolveError;

/// Provider-internal id of an embed: last path segment, query removed
pub fn embed_id(embed_url: &str) -> Result<String, ResolveError> {
    let id = embed_url
        .rsplit('/')
        .next()
        .and_then(|segment| segment.split(['?', '#']).next())
        .unwrap_or_default();

    if id.is_empty() {
        return Err(ResolveError::InvalidUrl(embed_url.to_string()));
    }

    Ok(id.to_string())
}

/// Build `base` with the given query parameters, percent-encoded
pub fn url_with_params(base: &str, params: &[(&str, &str)]) -> Result<String, ResolveError> {
    let url = Url::parse_with_params(base, params)
        .map_err(|e| ResolveError::InvalidUrl(format!("{}: {}", base, e)))?;
    Ok(url.into())
}

/// Shorten a secret-ish value for log output
pub fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(6).collect();
    format!("{}…({} chars)", prefix, value.chars().count())
}

/// Run `program` to completion, capturing stdout and stderr.
///
/// Spawn and I/O failures are `ExternalCommand`; exceeding `timeout_secs` is
/// `Timeout`, and the child is killed when its handle is dropped.
pub async fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout_secs: u64,
) -> Result<Output, ResolveError> {
    let child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ResolveError::ExternalCommand(format!("failed to start {}: {}", program, e)))?;

    match timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(output) => output
            .map_err(|e| ResolveError::ExternalCommand(format!("failed to collect output of {}: {}", program, e))),
        Err(_) => Err(ResolveError::Timeout(format!("{} after {}s", program, timeout_secs))),
    }
}
