use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_ASSETS_DIR: &str = "assets-dir";
pub const ARG_PROTECTED_ROUTE: &str = "protected-route";
pub const ARG_AUTH_ONLY_ROUTE: &str = "auth-only-route";
pub const ARG_VERBOSITY: &str = "verbosity";

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accepts a level name or its index (`0` = error .. `4` = trace).
#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        let level = level.trim().to_lowercase();
        if let Ok(parsed) = level.parse::<u8>() {
            return if usize::from(parsed) < LOG_LEVELS.len() {
                Ok(parsed)
            } else {
                Err(format!("log level must be between 0 and {}", LOG_LEVELS.len() - 1))
            };
        }

        LOG_LEVELS
            .iter()
            .position(|name| *name == level)
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| "invalid log level".to_string())
    })
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    Command::new("raphacure")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("RAPHACURE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_ASSETS_DIR)
                .long("assets-dir")
                .help("Directory holding the built site; unknown paths fall back to its index.html")
                .default_value("./public")
                .env("RAPHACURE_ASSETS_DIR")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            Arg::new(ARG_PROTECTED_ROUTE)
                .long("protected-route")
                .help("Path prefix that requires a session (repeatable)")
                .env("RAPHACURE_PROTECTED_ROUTES")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .default_values(["/dashboard", "/profile"]),
        )
        .arg(
            Arg::new(ARG_AUTH_ONLY_ROUTE)
                .long("auth-only-route")
                .help("Path prefix only reachable without a session (repeatable)")
                .env("RAPHACURE_AUTH_ONLY_ROUTES")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("RAPHACURE_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
