use clap::{Arg, Command};

fn guid_arg() -> Arg {
    Arg::new("guid")
        .long("guid")
        .help("Account guid")
        .required(true)
}

fn key_root_arg() -> Arg {
    Arg::new("key-root")
        .long("key-root")
        .help("Directory for file-backed keys; omit to use the relational store")
        .env("WARDEN_KEY_ROOT")
}

#[must_use]
pub fn command() -> Command {
    Command::new("keys")
        .about("Key pair lifecycle")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Generate and store a key pair for an account")
                .arg(guid_arg())
                .arg(key_root_arg()),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an account's key pair")
                .arg(guid_arg())
                .arg(key_root_arg()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_guid() {
        assert!(command()
            .try_get_matches_from(vec!["keys", "create"])
            .is_err());

        let matches = command()
            .try_get_matches_from(vec![
                "keys",
                "create",
                "--guid",
                "6e5e9e1a-13e4-4a1e-9a27-6e8d3f0a2b4c",
            ])
            .expect("guid provided");
        let (name, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(name, "create");
        assert!(sub.get_one::<String>("key-root").is_none());
    }
}
