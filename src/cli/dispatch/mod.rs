use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;
use uuid::Uuid;

use crate::accounts::Role;
use crate::cli::actions::Action;

fn parse_guid(matches: &clap::ArgMatches) -> Result<Uuid> {
    let raw = matches
        .get_one::<String>("guid")
        .ok_or_else(|| anyhow!("missing required argument: --guid"))?;
    Uuid::parse_str(raw).context("invalid guid")
}

fn parse_role(raw: &str) -> Result<Role> {
    Role::from_name(raw).ok_or_else(|| anyhow!("invalid role: {raw}"))
}

/// Turn parsed arguments into the action to run, plus the DSN.
pub fn handler(matches: &clap::ArgMatches) -> Result<(String, Action)> {
    let dsn = matches
        .get_one::<String>("dsn")
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("missing required argument: --dsn"))?;

    let action = match matches.subcommand() {
        Some(("account", account)) => match account.subcommand() {
            Some(("create", sub)) => Action::AccountCreate {
                username: sub
                    .get_one::<String>("username")
                    .map(ToString::to_string)
                    .ok_or_else(|| anyhow!("missing required argument: --username"))?,
                email: sub
                    .get_one::<String>("email")
                    .map(ToString::to_string)
                    .ok_or_else(|| anyhow!("missing required argument: --email"))?,
                role: parse_role(
                    sub.get_one::<String>("role")
                        .map(String::as_str)
                        .unwrap_or("member"),
                )?,
                password: SecretString::from(
                    sub.get_one::<String>("password")
                        .map(ToString::to_string)
                        .ok_or_else(|| anyhow!("missing required argument: --password"))?,
                ),
                groups: sub
                    .get_many::<String>("groups")
                    .map(|groups| groups.cloned().collect())
                    .unwrap_or_default(),
            },
            Some(("remove", sub)) => Action::AccountRemove {
                guid: parse_guid(sub)?,
            },
            Some(("unlock", sub)) => Action::AccountUnlock {
                guid: parse_guid(sub)?,
            },
            Some(("suspend", sub)) => Action::AccountSuspend {
                guid: parse_guid(sub)?,
                lift: sub.get_flag("lift"),
            },
            Some(("set-role", sub)) => Action::AccountSetRole {
                username: sub
                    .get_one::<String>("username")
                    .map(ToString::to_string)
                    .ok_or_else(|| anyhow!("missing required argument: --username"))?,
                role: parse_role(
                    sub.get_one::<String>("role")
                        .map(String::as_str)
                        .ok_or_else(|| anyhow!("missing required argument: --role"))?,
                )?,
            },
            Some(("show", sub)) => Action::AccountShow {
                term: sub
                    .get_one::<String>("term")
                    .map(ToString::to_string)
                    .ok_or_else(|| anyhow!("missing required argument: term"))?,
            },
            _ => return Err(anyhow!("unknown account subcommand")),
        },
        Some(("keys", keys)) => match keys.subcommand() {
            Some(("create", sub)) => Action::KeysCreate {
                guid: parse_guid(sub)?,
                key_root: sub.get_one::<String>("key-root").map(PathBuf::from),
            },
            Some(("remove", sub)) => Action::KeysRemove {
                guid: parse_guid(sub)?,
                key_root: sub.get_one::<String>("key-root").map(PathBuf::from),
            },
            _ => return Err(anyhow!("unknown keys subcommand")),
        },
        _ => return Err(anyhow!("unknown subcommand")),
    };

    Ok((dsn, action))
}

#[cfg(test)]
mod tests {
    use super::handler;
    use crate::cli::actions::Action;
    use crate::cli::commands;

    #[test]
    fn dispatches_account_unlock() {
        let matches = commands::new().get_matches_from(vec![
            "warden",
            "--dsn",
            "postgres://localhost/warden",
            "account",
            "unlock",
            "--guid",
            "6e5e9e1a-13e4-4a1e-9a27-6e8d3f0a2b4c",
        ]);

        let (dsn, action) = handler(&matches).expect("dispatch should succeed");
        assert_eq!(dsn, "postgres://localhost/warden");
        assert!(matches!(action, Action::AccountUnlock { .. }));
    }

    #[test]
    fn rejects_malformed_guid() {
        let matches = commands::new().get_matches_from(vec![
            "warden",
            "--dsn",
            "postgres://localhost/warden",
            "account",
            "unlock",
            "--guid",
            "not-a-guid",
        ]);

        assert!(handler(&matches).is_err());
    }

    #[test]
    fn rejects_unknown_role() {
        let matches = commands::new().get_matches_from(vec![
            "warden",
            "--dsn",
            "postgres://localhost/warden",
            "account",
            "create",
            "-u",
            "khuntly",
            "-e",
            "khuntly@example.com",
            "-p",
            "S3curePassw0rd",
            "-r",
            "root",
        ]);

        assert!(handler(&matches).is_err());
    }
}
