//! Security policy knobs, read-only at runtime.

const DEFAULT_MAX_ATTEMPTS: i32 = 3;
const DEFAULT_ITERATIONS: u32 = 210_000;
const DEFAULT_KEY_LENGTH_BITS: u32 = 256;
const DEFAULT_SALT_LENGTH_BYTES: usize = 32;
const DEFAULT_RESET_ID_LENGTH: usize = 32;
const DEFAULT_RESET_TIMEOUT_MINUTES: i64 = 30;
const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;
const DEFAULT_PASSWORD_MAX_LENGTH: usize = 64;
const DEFAULT_PASSWORD_EXPIRATION_DAYS: i64 = 90;
const DEFAULT_DIGEST_ALGORITHM: &str = "sha-512";
const DEFAULT_CIPHER_ALGORITHM: &str = "aes";
const DEFAULT_CIPHER_MODE: &str = "cbc";
const DEFAULT_KEY_ALGORITHM: &str = "ed25519";

/// Tunables consumed by the crypto primitives, authenticator, and key
/// manager. Values are fixed once the policy is constructed.
#[derive(Clone, Debug)]
pub struct SecurityPolicy {
    max_attempts: i32,
    iterations: u32,
    key_length: u32,
    salt_length: usize,
    reset_id_length: usize,
    reset_timeout_minutes: i64,
    password_min_length: usize,
    password_max_length: usize,
    password_expiration_days: i64,
    digest_algorithm: String,
    cipher_algorithm: String,
    cipher_mode: String,
    key_algorithm: String,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            iterations: DEFAULT_ITERATIONS,
            key_length: DEFAULT_KEY_LENGTH_BITS,
            salt_length: DEFAULT_SALT_LENGTH_BYTES,
            reset_id_length: DEFAULT_RESET_ID_LENGTH,
            reset_timeout_minutes: DEFAULT_RESET_TIMEOUT_MINUTES,
            password_min_length: DEFAULT_PASSWORD_MIN_LENGTH,
            password_max_length: DEFAULT_PASSWORD_MAX_LENGTH,
            password_expiration_days: DEFAULT_PASSWORD_EXPIRATION_DAYS,
            digest_algorithm: DEFAULT_DIGEST_ALGORITHM.to_string(),
            cipher_algorithm: DEFAULT_CIPHER_ALGORITHM.to_string(),
            cipher_mode: DEFAULT_CIPHER_MODE.to_string(),
            key_algorithm: DEFAULT_KEY_ALGORITHM.to_string(),
        }
    }
}

impl SecurityPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: i32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_key_length(mut self, bits: u32) -> Self {
        self.key_length = bits;
        self
    }

    #[must_use]
    pub fn with_salt_length(mut self, bytes: usize) -> Self {
        self.salt_length = bytes;
        self
    }

    #[must_use]
    pub fn with_reset_id_length(mut self, length: usize) -> Self {
        self.reset_id_length = length;
        self
    }

    #[must_use]
    pub fn with_reset_timeout_minutes(mut self, minutes: i64) -> Self {
        self.reset_timeout_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_password_min_length(mut self, length: usize) -> Self {
        self.password_min_length = length;
        self
    }

    #[must_use]
    pub fn with_password_max_length(mut self, length: usize) -> Self {
        self.password_max_length = length;
        self
    }

    /// Password age limit in days; zero disables expiration.
    #[must_use]
    pub fn with_password_expiration_days(mut self, days: i64) -> Self {
        self.password_expiration_days = days;
        self
    }

    #[must_use]
    pub fn with_digest_algorithm(mut self, name: impl Into<String>) -> Self {
        self.digest_algorithm = name.into();
        self
    }

    #[must_use]
    pub fn with_cipher(mut self, algorithm: impl Into<String>, mode: impl Into<String>) -> Self {
        self.cipher_algorithm = algorithm.into();
        self.cipher_mode = mode.into();
        self
    }

    #[must_use]
    pub fn with_key_algorithm(mut self, name: impl Into<String>) -> Self {
        self.key_algorithm = name.into();
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    #[must_use]
    pub fn key_length(&self) -> u32 {
        self.key_length
    }

    #[must_use]
    pub fn salt_length(&self) -> usize {
        self.salt_length
    }

    #[must_use]
    pub fn reset_id_length(&self) -> usize {
        self.reset_id_length
    }

    #[must_use]
    pub fn reset_timeout_minutes(&self) -> i64 {
        self.reset_timeout_minutes
    }

    #[must_use]
    pub fn password_min_length(&self) -> usize {
        self.password_min_length
    }

    #[must_use]
    pub fn password_max_length(&self) -> usize {
        self.password_max_length
    }

    #[must_use]
    pub fn password_expiration_days(&self) -> i64 {
        self.password_expiration_days
    }

    #[must_use]
    pub fn digest_algorithm(&self) -> &str {
        &self.digest_algorithm
    }

    #[must_use]
    pub fn cipher_algorithm(&self) -> &str {
        &self.cipher_algorithm
    }

    #[must_use]
    pub fn cipher_mode(&self) -> &str {
        &self.cipher_mode
    }

    #[must_use]
    pub fn key_algorithm(&self) -> &str {
        &self.key_algorithm
    }
}

#[cfg(test)]
mod tests {
    use super::SecurityPolicy;

    #[test]
    fn policy_defaults_and_overrides() {
        let policy = SecurityPolicy::default();

        assert_eq!(policy.max_attempts(), super::DEFAULT_MAX_ATTEMPTS);
        assert_eq!(policy.iterations(), super::DEFAULT_ITERATIONS);
        assert_eq!(policy.key_length(), super::DEFAULT_KEY_LENGTH_BITS);
        assert_eq!(policy.digest_algorithm(), "sha-512");
        assert_eq!(policy.cipher_algorithm(), "aes");
        assert_eq!(policy.cipher_mode(), "cbc");
        assert_eq!(policy.key_algorithm(), "ed25519");

        let policy = policy
            .with_max_attempts(5)
            .with_iterations(10)
            .with_reset_timeout_minutes(1)
            .with_password_expiration_days(0)
            .with_digest_algorithm("sha-256");

        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.iterations(), 10);
        assert_eq!(policy.reset_timeout_minutes(), 1);
        assert_eq!(policy.password_expiration_days(), 0);
        assert_eq!(policy.digest_algorithm(), "sha-256");
    }

    #[test]
    fn max_attempts_floors_at_one() {
        let policy = SecurityPolicy::default().with_max_attempts(0);
        assert_eq!(policy.max_attempts(), 1);
    }
}
