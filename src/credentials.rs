//! Password hashing and one-time verification codes

use argon2::Argon2;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use rand::Rng;

/// How long an issued verification code stays valid
const OTP_VALIDITY_MINUTES: i64 = 10;

/// Hash a given password
pub fn hash(password: &str) -> String {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = Argon2::default();

    let hashed_password = argon2
        .hash_password(password.as_bytes(), &salt)
        .expect("Valid hashed password");

    hashed_password.to_string()
}

/// Verify a given password against a given hash
pub fn verify(hashed_password: &str, password: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hashed_password) else {
        return false;
    };

    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a fresh verification code
///
/// A uniformly random 6-digit decimal string from a cryptographically secure
/// source
pub fn generate_otp() -> String {
    let mut rng = rand::rng();

    rng.random_range(100_000..=999_999u32).to_string()
}

/// Expiry timestamp for a code issued right now
pub fn otp_expiry() -> DateTime<Utc> {
    Utc::now() + Duration::minutes(OTP_VALIDITY_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_not_the_plaintext() {
        let hashed = hash("somepassword");

        assert_ne!(hashed, "somepassword");
        assert!(verify(&hashed, "somepassword"));
        assert!(!verify(&hashed, "someotherpassword"));
    }

    #[test]
    fn test_verify_handles_garbage_hashes() {
        assert!(!verify("not-a-phc-string", "somepassword"));
    }

    #[test]
    fn test_otp_shape() {
        for _ in 0..64 {
            let otp = generate_otp();

            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
            assert!(otp.parse::<u32>().unwrap() >= 100_000);
        }
    }

    #[test]
    fn test_otp_expiry_is_in_the_future() {
        assert!(otp_expiry() > Utc::now());
    }
}
