use clap::Parser;
use std::process::ExitCode;

use embed_resolver_lib::resolver::{ApiVersion, ResolveError, ResolveMode, ResolverConfig, TrackPolicy};
use embed_resolver_lib::{init_logging, EmbedResolver, LoggingConfig};

/// Resolve a video embed page into playable sources and subtitle tracks
#[derive(Debug, Parser)]
#[command(name = "embed-resolver", version, about)]
struct Cli {
    /// Embed page URL
    embed_url: String,

    /// Page the embed was found on
    #[arg(long, default_value = "")]
    referrer: String,

    /// Send --referrer as Referer instead of the provider origin
    #[arg(long)]
    forward_referrer: bool,

    /// strict or best-effort
    #[arg(long)]
    mode: Option<ResolveMode>,

    /// Source API generation: v2, v3 or auto
    #[arg(long)]
    api: Option<ApiVersion>,

    /// Keep only caption/subtitle tracks
    #[arg(long)]
    captions_only: bool,

    /// Per-hop timeout in seconds
    #[arg(long)]
    timeout: Option<u32>,

    /// SOCKS5/HTTP proxy URL
    #[arg(long)]
    proxy: Option<String>,

    #[arg(long, env = "EMBED_RESOLVER_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// pretty or json
    #[arg(long, env = "EMBED_RESOLVER_LOG_FORMAT", default_value = "pretty")]
    log_format: String,
}

impl Cli {
    /// Environment config with command line flags applied on top
    fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::from_env();

        if let Some(mode) = self.mode {
            config = config.with_mode(mode);
        }
        if let Some(api) = self.api {
            config = config.with_api_version(api);
        }
        if self.forward_referrer {
            config = config.with_forward_referrer(true);
        }
        if self.captions_only {
            config = config.with_track_policy(TrackPolicy::CaptionsOnly);
        }
        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }
        if self.proxy.is_some() {
            config = config.with_proxy(self.proxy.clone());
        }

        config
    }
}

/// Multi-line explanation of a strict-mode failure for stderr
fn failure_report(err: &ResolveError) -> String {
    let stage = err.stage();
    let mut report = format!("Error ({}): {}\n{}\n", stage, stage.description(), err);

    report.push_str(stage.suggestion());
    report.push('\n');
    if stage.is_retryable() {
        report.push_str("This failure is usually temporary; retrying may help.\n");
    }
    if stage.other_server_might_help() {
        report.push_str("Another server for the same episode may still work.\n");
    }

    report
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: cli.log_level.clone(),
        format: cli.log_format.clone(),
        file_path: None,
    };
    if let Err(e) = init_logging(&logging) {
        eprintln!("Logging setup failed: {}", e);
        return ExitCode::from(2);
    }

    let resolver = match EmbedResolver::new(cli.resolver_config()) {
        Ok(resolver) => resolver,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    match resolver.resolve(&cli.embed_url, &cli.referrer).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprint!("{}", failure_report(&e));
            ExitCode::FAILURE
        }
    }
}
