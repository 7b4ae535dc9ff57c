use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{Level, debug, info};

use pinwarden_core::audit;
use pinwarden_core::config::ScanConfig;
use pinwarden_core::report::model::{EXIT_CLEAN, ToolInfo};
use pinwarden_core::report::render;
use pinwarden_core::scanner::Scanner;
use pinwarden_core::workflow::remote::{fetch_document, is_remote};
use pinwarden_core::workflow::read_document;

mod args;
mod telemetry;

use args::{Cli, Command, OutputFormat, ScanArgs};

/// Exit status for any error that prevented a complete scan.
const EXIT_FATAL: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    telemetry::init_tracing(cli.json_logs, level);

    let result = match cli.command {
        Command::Scan(args) => run_scan(args).await,
    };

    let code = result.unwrap_or_else(|e| {
        eprintln!("Error: {e:#}");
        EXIT_FATAL
    });
    std::process::exit(code);
}

async fn run_scan(args: ScanArgs) -> Result<i32> {
    let config = scan_config(&args);
    let remote = is_remote(&args.target);

    let source = if remote {
        fetch_document(&args.target, Duration::from_secs(config.provider.timeout_secs)).await?
    } else {
        read_document(Path::new(&args.target))?
    };

    let mut scanner = Scanner::from_config(&config).context("failed to create GitHub client")?;
    scanner.enable_checks(&args.checks)?;

    let tool = ToolInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: args.commit.clone(),
    };

    let (report, outcome) = tokio::select! {
        result = audit(&scanner, &source, tool) => result?,
        _ = tokio::signal::ctrl_c() => bail!("scan interrupted"),
    };

    if !args.quiet {
        let output = match args.format {
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => render::render_text(&report),
        };
        print!("{output}");
    }

    let code = report.summary.exit_code;
    if code == EXIT_CLEAN || !outcome.changed() {
        return Ok(code);
    }

    let show_diff = args.show_diff || remote;
    if show_diff {
        print!(
            "{}",
            render::render_diff(&args.target, &outcome.original, &outcome.remediated)
        );
    }

    if args.dry_run {
        debug!("dry run, not writing");
        return Ok(code);
    }

    let destination = match (&args.out, show_diff) {
        (Some(out), _) => Some(out.clone()),
        (None, false) => Some(PathBuf::from(&args.target)),
        (None, true) => None,
    };
    if let Some(path) = destination {
        std::fs::write(&path, &outcome.remediated)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "remediated workflow written");
    }

    Ok(code)
}

fn scan_config(args: &ScanArgs) -> ScanConfig {
    let mut config = ScanConfig::from_env();

    if let Some(token) = args.github_token.as_ref().filter(|t| !t.is_empty()) {
        config.provider.token = Some(token.clone());
    }
    if let Some(url) = &args.api_url {
        config.provider.api_url = url.trim_end_matches('/').to_string();
    }
    config.detection.concurrency = args.concurrency.max(1);

    config.cache.path = if args.no_cache {
        None
    } else {
        args.cache_path.clone().or_else(default_cache_path)
    };

    config
}

/// `$XDG_CACHE_HOME/pinwarden/cache.json`, falling back to `~/.cache`.
fn default_cache_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
    Some(base.join("pinwarden").join("cache.json"))
}
