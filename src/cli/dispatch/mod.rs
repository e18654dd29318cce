use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{ARG_ASSETS_DIR, ARG_AUTH_ONLY_ROUTE, ARG_PORT, ARG_PROTECTED_ROUTE};
use crate::routes::RouteTable;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let assets_dir = matches
        .get_one::<PathBuf>(ARG_ASSETS_DIR)
        .cloned()
        .context("missing required argument: --assets-dir")?;

    let values = |id: &str| -> Vec<String> {
        matches
            .get_many::<String>(id)
            .map(|values| values.cloned().collect())
            .unwrap_or_default()
    };

    Ok(Action::Server(Args {
        port,
        assets_dir,
        routes: RouteTable::new(values(ARG_PROTECTED_ROUTE), values(ARG_AUTH_ONLY_ROUTE)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn builds_server_action_from_arguments() -> Result<()> {
        temp_env::with_vars(
            [
                ("RAPHACURE_PROTECTED_ROUTES", None::<&str>),
                ("RAPHACURE_AUTH_ONLY_ROUTES", None),
                ("RAPHACURE_PORT", None),
                ("RAPHACURE_ASSETS_DIR", None),
            ],
            || {
                let matches = commands::new().get_matches_from(vec![
                    "raphacure",
                    "--port",
                    "9090",
                    "--protected-route",
                    "/orders/",
                    "--auth-only-route",
                    "/signin",
                ]);

                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 9090);
                assert_eq!(args.assets_dir, PathBuf::from("./public"));
                assert_eq!(args.routes.protected(), ["/orders".to_string()]);
                assert_eq!(args.routes.auth_only(), ["/signin".to_string()]);
                Ok(())
            },
        )
    }
}
