use crate::{cli::telemetry, portal, routes::RouteTable};
use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub assets_dir: PathBuf,
    pub routes: RouteTable,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    if !args.assets_dir.join("index.html").is_file() {
        warn!(
            "No index.html in {}; unknown paths will return 404",
            args.assets_dir.display()
        );
    }

    let result = portal::new(args.port, &args.assets_dir, args.routes).await;
    telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    let list = |routes: &[String]| {
        if routes.is_empty() {
            "none".to_string()
        } else {
            routes.join(",")
        }
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("assets_dir", args.assets_dir.display().to_string()),
        ("protected_routes", list(args.routes.protected())),
        ("auth_only_routes", list(args.routes.auth_only())),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
