use clap::{Arg, ArgAction, Command};

fn guid_arg() -> Arg {
    Arg::new("guid")
        .long("guid")
        .help("Account guid")
        .required(true)
}

#[must_use]
pub fn command() -> Command {
    Command::new("account")
        .about("Account administration")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create an account with fresh credentials")
                .arg(
                    Arg::new("username")
                        .short('u')
                        .long("username")
                        .help("Unique username")
                        .required(true),
                )
                .arg(
                    Arg::new("email")
                        .short('e')
                        .long("email")
                        .help("Contact email address")
                        .required(true),
                )
                .arg(
                    Arg::new("role")
                        .short('r')
                        .long("role")
                        .help("Role: admin, member, or readonly")
                        .default_value("member"),
                )
                .arg(
                    Arg::new("password")
                        .short('p')
                        .long("password")
                        .help("Initial password; hashed before it leaves this process")
                        .env("WARDEN_PASSWORD")
                        .required(true),
                )
                .arg(
                    Arg::new("groups")
                        .short('g')
                        .long("groups")
                        .help("Comma-separated group names")
                        .value_delimiter(','),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an account and its credentials")
                .arg(guid_arg()),
        )
        .subcommand(
            Command::new("unlock")
                .about("Clear the lockout flag and zero the failed count")
                .arg(guid_arg()),
        )
        .subcommand(
            Command::new("suspend")
                .about("Suspend an account, or lift a suspension")
                .arg(guid_arg())
                .arg(
                    Arg::new("lift")
                        .long("lift")
                        .help("Lift the suspension instead of applying it")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("set-role")
                .about("Change an account's role")
                .arg(
                    Arg::new("username")
                        .short('u')
                        .long("username")
                        .help("Username of the account")
                        .required(true),
                )
                .arg(
                    Arg::new("role")
                        .short('r')
                        .long("role")
                        .help("Role: admin, member, or readonly")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Find accounts by email address or username")
                .arg(
                    Arg::new("term")
                        .help("Email address or username fragment")
                        .required(true),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_username_email_password() {
        let result = command().try_get_matches_from(vec!["account", "create", "-u", "khuntly"]);
        assert!(result.is_err());

        let matches = command()
            .try_get_matches_from(vec![
                "account",
                "create",
                "-u",
                "khuntly",
                "-e",
                "khuntly@example.com",
                "-p",
                "S3curePassw0rd",
            ])
            .expect("all required args present");
        let (name, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(name, "create");
        assert_eq!(sub.get_one::<String>("role").map(String::as_str), Some("member"));
    }

    #[test]
    fn groups_split_on_commas() {
        let matches = command()
            .try_get_matches_from(vec![
                "account",
                "create",
                "-u",
                "khuntly",
                "-e",
                "khuntly@example.com",
                "-p",
                "S3curePassw0rd",
                "-g",
                "operators,auditors",
            ])
            .expect("valid args");
        let (_, sub) = matches.subcommand().expect("subcommand");
        let groups: Vec<String> = sub
            .get_many::<String>("groups")
            .expect("groups present")
            .cloned()
            .collect();
        assert_eq!(groups, vec!["operators", "auditors"]);
    }

    #[test]
    fn suspend_lift_defaults_off() {
        let matches = command()
            .try_get_matches_from(vec![
                "account",
                "suspend",
                "--guid",
                "6e5e9e1a-13e4-4a1e-9a27-6e8d3f0a2b4c",
            ])
            .expect("valid args");
        let (_, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(sub.get_flag("lift"), false);
    }
}
