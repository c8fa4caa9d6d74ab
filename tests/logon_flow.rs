//! End-to-end logon, lockout, reset, and security-question behavior
//! over the in-memory backends.

use std::sync::Arc;

use uuid::Uuid;
use warden::accounts::memory::MemoryAccountStore;
use warden::accounts::{AccountManager, AccountStore, Role, UserAccount};
use warden::auth::{AnsweredQuestion, Authenticator, LoginStatus};
use warden::credentials::memory::MemoryCredentialStore;
use warden::credentials::{CredentialSeed, CredentialStore, SaltKind, SecurityQa};
use warden::crypto;
use warden::error::Error;
use warden::SecurityPolicy;

const USERNAME: &str = "khuntly";
const PASSWORD: &str = "S3curePassw0rd";
const WRONG_HASH: &str = "deadbeef";

fn policy() -> SecurityPolicy {
    SecurityPolicy::default()
        .with_iterations(16)
        .with_max_attempts(3)
}

struct Fixture {
    authenticator: Authenticator,
    accounts: AccountManager,
    account_store: Arc<MemoryAccountStore>,
    credentials: Arc<MemoryCredentialStore>,
    policy: SecurityPolicy,
    guid: Uuid,
    password_hash: String,
}

impl Fixture {
    fn hash(&self, secret: &str, salt: &str) -> String {
        crypto::hash_secret(
            secret,
            salt,
            self.policy.iterations(),
            self.policy.key_length(),
            self.policy.digest_algorithm(),
        )
        .expect("supported digest")
    }
}

async fn enroll(policy: SecurityPolicy, olr_setup: bool) -> Fixture {
    let account_store = Arc::new(MemoryAccountStore::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let accounts = AccountManager::new(account_store.clone());

    let guid = Uuid::new_v4();
    let mut account = UserAccount::new(guid, USERNAME, "khuntly@example.com", Role::Member);
    account.olr_setup = olr_setup;
    accounts.create(&account).await.expect("fresh account");

    let password_salt = crypto::generate_salt(policy.digest_algorithm(), policy.salt_length());
    let token_salt = crypto::generate_salt(policy.digest_algorithm(), policy.salt_length());
    let password_hash = crypto::hash_secret(
        PASSWORD,
        &password_salt,
        policy.iterations(),
        policy.key_length(),
        policy.digest_algorithm(),
    )
    .expect("supported digest");

    credentials
        .insert_credentials(
            guid,
            &CredentialSeed {
                password_hash: password_hash.clone(),
                password_salt,
                token_salt,
            },
        )
        .await
        .expect("fresh credentials");

    let authenticator = Authenticator::new(credentials.clone(), accounts.clone(), policy.clone());

    Fixture {
        authenticator,
        accounts,
        account_store,
        credentials,
        policy,
        guid,
        password_hash,
    }
}

#[tokio::test]
async fn three_failures_lock_and_the_lock_is_sticky() {
    let fx = enroll(policy(), true).await;

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let account = fx
            .authenticator
            .perform_logon(fx.guid, USERNAME, WRONG_HASH)
            .await
            .expect("logon attempt");
        statuses.push(account.status);
    }
    assert_eq!(
        statuses,
        vec![
            LoginStatus::Failure,
            LoginStatus::Failure,
            LoginStatus::Lockout
        ]
    );

    // The correct hash must still be rejected until an explicit unlock.
    let account = fx
        .authenticator
        .perform_logon(fx.guid, USERNAME, &fx.password_hash)
        .await
        .expect("logon attempt");
    assert_eq!(account.status, LoginStatus::Lockout);

    fx.accounts
        .set_lock(fx.guid, false, 0)
        .await
        .expect("administrative unlock");
    let account = fx
        .authenticator
        .perform_logon(fx.guid, USERNAME, &fx.password_hash)
        .await
        .expect("logon attempt");
    assert_eq!(account.status, LoginStatus::Success);
    assert_eq!(account.failed_count, 0);
}

#[tokio::test]
async fn successful_logon_resets_the_failed_count() {
    let fx = enroll(policy(), true).await;

    fx.authenticator
        .perform_logon(fx.guid, USERNAME, WRONG_HASH)
        .await
        .expect("logon attempt");

    let account = fx
        .authenticator
        .perform_logon(fx.guid, USERNAME, &fx.password_hash)
        .await
        .expect("logon attempt");
    assert_eq!(account.status, LoginStatus::Success);
    assert!(account.last_login.is_some());

    let stored = fx.account_store.fetch(fx.guid).await.expect("fetch");
    assert_eq!(stored[0].failed_count, 0);
    assert!(!stored[0].locked);
}

#[tokio::test]
async fn logon_requires_the_matching_username() {
    let fx = enroll(policy(), true).await;

    let result = fx
        .authenticator
        .perform_logon(fx.guid, "someone-else", &fx.password_hash)
        .await;
    assert!(matches!(result, Err(Error::AuthenticationFailure)));
}

#[tokio::test]
async fn suspension_wins_over_a_correct_password() {
    let fx = enroll(policy(), true).await;
    fx.accounts
        .set_suspended(fx.guid, true)
        .await
        .expect("suspend");

    let account = fx
        .authenticator
        .perform_logon(fx.guid, USERNAME, &fx.password_hash)
        .await
        .expect("logon attempt");
    assert_eq!(account.status, LoginStatus::Suspended);
}

#[tokio::test]
async fn unconfigured_olr_routes_to_setup() {
    let fx = enroll(policy(), false).await;

    let account = fx
        .authenticator
        .perform_logon(fx.guid, USERNAME, &fx.password_hash)
        .await
        .expect("logon attempt");
    assert_eq!(account.status, LoginStatus::OlrSetup);
    // Setup logons still carry a token for the follow-up endpoint.
    assert!(account.auth_token.is_some());
}

#[tokio::test]
async fn stale_password_yields_expired() {
    let fx = enroll(policy(), true).await;
    fx.credentials
        .backdate_password_change(fx.guid, chrono::Utc::now() - chrono::Duration::days(120))
        .await
        .expect("backdate");

    let account = fx
        .authenticator
        .perform_logon(fx.guid, USERNAME, &fx.password_hash)
        .await
        .expect("logon attempt");
    assert_eq!(account.status, LoginStatus::Expired);
    assert!(account.auth_token.is_some());
}

#[tokio::test]
async fn auth_token_round_trip_and_revocation() {
    let fx = enroll(policy(), true).await;

    let account = fx
        .authenticator
        .perform_logon(fx.guid, USERNAME, &fx.password_hash)
        .await
        .expect("logon attempt");
    let token = account.auth_token.expect("token on success");

    // Re-derivation is deterministic and independent of call order.
    for _ in 0..2 {
        assert!(fx
            .authenticator
            .validate_auth_token(fx.guid, USERNAME, &token)
            .await
            .expect("validation"));
    }
    assert!(!fx
        .authenticator
        .validate_auth_token(fx.guid, USERNAME, "tampered")
        .await
        .expect("validation"));

    fx.authenticator
        .perform_logoff(fx.guid, USERNAME, &token)
        .await
        .expect("logoff");
    assert!(!fx
        .authenticator
        .validate_auth_token(fx.guid, USERNAME, &token)
        .await
        .expect("validation"));
}

#[tokio::test]
async fn token_validation_reads_the_salt_fresh() {
    let fx = enroll(policy(), true).await;

    let account = fx
        .authenticator
        .perform_logon(fx.guid, USERNAME, &fx.password_hash)
        .await
        .expect("logon attempt");
    let token = account.auth_token.expect("token on success");

    // An out-of-band salt rotation must invalidate the token on the
    // very next validation; nothing may be cached.
    fx.credentials
        .store_salt(fx.guid, SaltKind::Token, "rotated-out-of-band")
        .await
        .expect("rotate");
    assert!(!fx
        .authenticator
        .validate_auth_token(fx.guid, USERNAME, &token)
        .await
        .expect("validation"));
}

#[tokio::test]
async fn security_answers_match_by_question_text_and_need_both() {
    let fx = enroll(policy(), true).await;

    let qa = SecurityQa {
        question_one: "First car?".to_string(),
        question_two: "First pet?".to_string(),
        answer_hash_one: fx.hash("corolla", "qa-salt"),
        answer_hash_two: fx.hash("biscuit", "qa-salt"),
    };
    fx.authenticator
        .configure_olr(fx.guid, USERNAME, &qa)
        .await
        .expect("configure");

    // Answers arrive in arbitrary order; matching is by question text.
    let shuffled = vec![
        AnsweredQuestion {
            question: "First pet?".to_string(),
            answer_hash: fx.hash("biscuit", "qa-salt"),
        },
        AnsweredQuestion {
            question: "First car?".to_string(),
            answer_hash: fx.hash("corolla", "qa-salt"),
        },
    ];
    assert!(fx
        .authenticator
        .verify_security_data(fx.guid, USERNAME, &shuffled)
        .await
        .expect("verify"));

    // One right answer is not enough.
    let partial = vec![
        AnsweredQuestion {
            question: "First car?".to_string(),
            answer_hash: fx.hash("corolla", "qa-salt"),
        },
        AnsweredQuestion {
            question: "First pet?".to_string(),
            answer_hash: fx.hash("goldfish", "qa-salt"),
        },
    ];
    assert!(!fx
        .authenticator
        .verify_security_data(fx.guid, USERNAME, &partial)
        .await
        .expect("verify"));
}

#[tokio::test]
async fn reset_requests_are_single_use_and_replaceable() {
    let fx = enroll(policy(), true).await;

    let first = fx
        .authenticator
        .open_reset(fx.guid, USERNAME)
        .await
        .expect("open reset");
    assert_eq!(first.len(), fx.policy.reset_id_length());

    // A second request replaces the first.
    let second = fx
        .authenticator
        .open_reset(fx.guid, USERNAME)
        .await
        .expect("open reset");
    assert!(matches!(
        fx.authenticator.redeem_reset(&first).await,
        Err(Error::ResetConsumed)
    ));

    let claimed = fx
        .authenticator
        .redeem_reset(&second)
        .await
        .expect("redeem");
    assert_eq!(claimed, fx.guid);

    // Consumed exactly once.
    assert!(matches!(
        fx.authenticator.redeem_reset(&second).await,
        Err(Error::ResetConsumed)
    ));
}

#[tokio::test]
async fn reset_requests_expire_even_if_never_consumed() {
    let fx = enroll(policy().with_reset_timeout_minutes(0), true).await;

    let reset_id = fx
        .authenticator
        .open_reset(fx.guid, USERNAME)
        .await
        .expect("open reset");
    assert!(matches!(
        fx.authenticator.redeem_reset(&reset_id).await,
        Err(Error::ResetExpired)
    ));
}

#[tokio::test]
async fn reset_respects_olr_configuration_and_lock() {
    let fx = enroll(policy(), false).await;
    assert!(matches!(
        fx.authenticator.open_reset(fx.guid, USERNAME).await,
        Err(Error::OlrNotConfigured)
    ));

    let fx = enroll(policy(), true).await;
    fx.accounts
        .set_olr_lock(fx.guid, true)
        .await
        .expect("olr lock");
    assert!(matches!(
        fx.authenticator.open_reset(fx.guid, USERNAME).await,
        Err(Error::OlrLocked)
    ));
}

#[tokio::test]
async fn reset_driven_password_change_takes_effect() {
    let fx = enroll(policy(), true).await;

    let reset_id = fx
        .authenticator
        .open_reset(fx.guid, USERNAME)
        .await
        .expect("open reset");
    let guid = fx
        .authenticator
        .redeem_reset(&reset_id)
        .await
        .expect("redeem");

    let new_salt = crypto::generate_salt(fx.policy.digest_algorithm(), fx.policy.salt_length());
    let new_hash = fx.hash("An0therPassw0rd", &new_salt);
    fx.authenticator
        .change_password(guid, USERNAME, &new_hash, &new_salt, true)
        .await
        .expect("change password");

    let account = fx
        .authenticator
        .perform_logon(fx.guid, USERNAME, &new_hash)
        .await
        .expect("logon attempt");
    assert_eq!(account.status, LoginStatus::Success);

    let account = fx
        .authenticator
        .perform_logon(fx.guid, USERNAME, &fx.password_hash)
        .await
        .expect("logon attempt");
    assert_eq!(account.status, LoginStatus::Failure);
}

#[tokio::test]
async fn uniqueness_scan_rejects_username_and_guid_collisions() {
    let fx = enroll(policy(), true).await;

    let result = fx.accounts.validate_unique(USERNAME, Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::DuplicateAccount { .. })));

    let result = fx.accounts.validate_unique("fresh-name", fx.guid).await;
    assert!(matches!(result, Err(Error::DuplicateAccount { .. })));

    let unique = fx
        .accounts
        .validate_unique("fresh-name", Uuid::new_v4())
        .await
        .expect("no collision");
    assert!(unique);

    // create() runs the same scan.
    let duplicate = UserAccount::new(
        Uuid::new_v4(),
        USERNAME,
        "other@example.com",
        Role::Member,
    );
    assert!(matches!(
        fx.accounts.create(&duplicate).await,
        Err(Error::DuplicateAccount { .. })
    ));
}

#[tokio::test]
async fn load_rejects_zero_and_ambiguous_matches() {
    let fx = enroll(policy(), true).await;

    let missing = Uuid::new_v4();
    assert!(matches!(
        fx.accounts.load(missing).await,
        Err(Error::AccountNotFound { .. })
    ));

    // Force a second record with the same guid through the raw store;
    // the manager must refuse to pick one.
    let twin = UserAccount::new(fx.guid, "twin", "twin@example.com", Role::Member);
    fx.account_store.insert(&twin).await.expect("raw insert");
    assert!(matches!(
        fx.accounts.load(fx.guid).await,
        Err(Error::AmbiguousAccount { matched: 2 })
    ));
}

#[tokio::test]
async fn find_routes_email_shaped_terms_to_the_email_lookup() {
    let fx = enroll(policy(), true).await;

    let by_email = fx
        .accounts
        .find("khuntly@example.com")
        .await
        .expect("email search");
    assert_eq!(by_email.len(), 1);
    assert_eq!(by_email[0].guid, fx.guid);

    let general = fx.accounts.find("hunt").await.expect("general search");
    assert_eq!(general.len(), 1);

    let nothing = fx
        .accounts
        .find("unknown@example.com")
        .await
        .expect("email search");
    assert!(nothing.is_empty());
}

#[tokio::test]
async fn the_question_catalogue_is_served_in_order() {
    let fx = enroll(policy(), true).await;
    fx.credentials
        .set_questions(vec!["First car?".to_string(), "First pet?".to_string()])
        .await;

    let questions = fx
        .credentials
        .security_questions()
        .await
        .expect("catalogue");
    assert_eq!(questions, vec!["First car?", "First pet?"]);
}

#[tokio::test]
async fn group_memberships_come_back_in_order() {
    let fx = enroll(policy(), true).await;
    fx.credentials
        .assign_groups(
            fx.guid,
            vec!["operators".to_string(), "auditors".to_string()],
        )
        .await
        .expect("assign");

    let groups = fx
        .credentials
        .groups(fx.guid, USERNAME)
        .await
        .expect("groups");
    assert_eq!(groups, vec!["operators", "auditors"]);
}
