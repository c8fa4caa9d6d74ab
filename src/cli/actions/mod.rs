pub mod admin;

use secrecy::SecretString;
use std::path::PathBuf;
use uuid::Uuid;

use crate::accounts::Role;

/// Administrative actions the CLI can run.
#[derive(Debug)]
pub enum Action {
    AccountCreate {
        username: String,
        email: String,
        role: Role,
        password: SecretString,
        groups: Vec<String>,
    },
    AccountRemove {
        guid: Uuid,
    },
    AccountUnlock {
        guid: Uuid,
    },
    AccountSuspend {
        guid: Uuid,
        lift: bool,
    },
    AccountSetRole {
        username: String,
        role: Role,
    },
    AccountShow {
        term: String,
    },
    KeysCreate {
        guid: Uuid,
        key_root: Option<PathBuf>,
    },
    KeysRemove {
        guid: Uuid,
        key_root: Option<PathBuf>,
    },
}
