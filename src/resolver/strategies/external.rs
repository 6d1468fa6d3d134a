// External command strategy
//
// Some provider generations could only be decoded by a helper script. The
// helper is treated as an opaque collaborator: it receives the embed URL and
// referrer as trailing arguments and prints a normalized result as JSON.

use tracing::{debug, warn};

use crate::resolver::config::ExternalCommand;
use crate::resolver::errors::ResolveError;
use crate::resolver::models::{EmbedRequest, NormalizedResult, TrackPolicy};
use crate::resolver::utils::run_with_timeout;

pub struct ExternalStrategy {
    command: ExternalCommand,
    timeout_seconds: u32,
    track_policy: TrackPolicy,
}

impl ExternalStrategy {
    pub fn new(command: ExternalCommand, timeout_seconds: u32, track_policy: TrackPolicy) -> Self {
        Self {
            command,
            timeout_seconds,
            track_policy,
        }
    }

    /// Build command arguments
    fn build_args(&self, request: &EmbedRequest) -> Vec<String> {
        let mut args = self.command.args.clone();
        args.push(request.embed_url.clone());
        args.push(request.referrer.clone().unwrap_or_default());
        args
    }

    /// Parse the helper's stdout
    fn parse_output(stdout: &[u8]) -> Result<NormalizedResult, ResolveError> {
        let text = String::from_utf8_lossy(stdout);
        let result: NormalizedResult = serde_json::from_str(text.trim())?;
        Ok(result)
    }

    pub async fn resolve(&self, request: &EmbedRequest) -> Result<NormalizedResult, ResolveError> {
        let args = self.build_args(request);
        debug!(program = %self.command.program, "Running external decrypt command");

        let output = run_with_timeout(&self.command.program, &args, self.timeout_seconds as u64).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(program = %self.command.program, status = %output.status, "External decrypt command failed");
            return Err(ResolveError::ExternalCommand(stderr.trim().to_string()));
        }

        let mut result = Self::parse_output(&output.stdout)?;
        result.tracks = self.track_policy.apply(std::mem::take(&mut result.tracks));
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ExternalCommand {
        ExternalCommand::new("sh").with_args(vec![
            "-c".to_string(),
            script.to_string(),
            "resolver".to_string(),
        ])
    }

    #[tokio::test]
    async fn test_parses_helper_output() {
        let script = r#"printf '{"sources":[{"file":"%s.m3u8","type":"hls"}],"tracks":[{"file":"t.jpg","kind":"thumbnails"},{"file":"en.vtt","kind":"captions"}],"t":5,"server":1}' "$1""#;
        let strategy = ExternalStrategy::new(sh(script), 5, TrackPolicy::CaptionsOnly);
        let request = EmbedRequest::new("https://provider.test/e/abc").with_referrer("https://site.test");

        let result = strategy.resolve(&request).await.unwrap();
        assert_eq!(result.sources[0].file, "https://provider.test/e/abc.m3u8");
        assert_eq!(result.tracks.len(), 1);
        assert_eq!(result.resume_time_seconds, 5);
        assert_eq!(result.server_id, 1);
    }

    #[tokio::test]
    async fn test_receives_referrer_argument() {
        let script = r#"printf '{"sources":[{"file":"%s","type":"hls"}]}' "$2""#;
        let strategy = ExternalStrategy::new(sh(script), 5, TrackPolicy::PassThrough);
        let request = EmbedRequest::new("https://provider.test/e/abc").with_referrer("https://site.test");

        let result = strategy.resolve(&request).await.unwrap();
        assert_eq!(result.sources[0].file, "https://site.test");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_error() {
        let strategy = ExternalStrategy::new(sh("echo 'no sources' >&2; exit 3"), 5, TrackPolicy::PassThrough);
        let result = strategy.resolve(&EmbedRequest::new("https://provider.test/e/abc")).await;

        match result {
            Err(ResolveError::ExternalCommand(msg)) => assert_eq!(msg, "no sources"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_output_is_parse_failure() {
        let strategy = ExternalStrategy::new(sh("echo hello"), 5, TrackPolicy::PassThrough);
        let result = strategy.resolve(&EmbedRequest::new("https://provider.test/e/abc")).await;

        assert!(matches!(result, Err(ResolveError::JsonParseFailure(_))));
    }

    #[tokio::test]
    async fn test_slow_helper_times_out() {
        let strategy = ExternalStrategy::new(sh("sleep 5"), 1, TrackPolicy::PassThrough);
        let result = strategy.resolve(&EmbedRequest::new("https://provider.test/e/abc")).await;

        assert!(matches!(result, Err(ResolveError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let strategy = ExternalStrategy::new(
            ExternalCommand::new("/nonexistent/embed-helper"),
            5,
            TrackPolicy::PassThrough,
        );
        let result = strategy.resolve(&EmbedRequest::new("https://provider.test/e/abc")).await;

        assert!(matches!(result, Err(ResolveError::ExternalCommand(_))));
    }
}
