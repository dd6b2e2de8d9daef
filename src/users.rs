use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

/// A diary account
///
/// Accounts start out unverified, a one-time code sent by mail moves them to
/// verified, only then can they log in with their password
#[derive(Clone, Debug)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub hashed_password: String,
    pub is_verified: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Does the submitted code match the stored one, and is it still fresh?
    ///
    /// A consumed or never-issued code never matches
    pub fn otp_accepts(&self, code: &str, now: DateTime<Utc>) -> bool {
        match (self.otp_code.as_deref(), self.otp_expires_at) {
            (Some(stored), Some(expires_at)) => stored == code && now <= expires_at,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn user_with_otp(code: &str, expires_at: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "ann@x.com".to_string(),
            name: "Ann".to_string(),
            hashed_password: String::new(),
            is_verified: false,
            is_staff: false,
            is_superuser: false,
            otp_code: Some(code.to_string()),
            otp_expires_at: Some(expires_at),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_otp_accepts_matching_fresh_code() {
        let now = Utc::now();
        let user = user_with_otp("123456", now + Duration::minutes(10));

        assert!(user.otp_accepts("123456", now));
        assert!(!user.otp_accepts("654321", now));
    }

    #[test]
    fn test_otp_rejects_expired_code() {
        let now = Utc::now();
        let user = user_with_otp("123456", now - Duration::seconds(1));

        assert!(!user.otp_accepts("123456", now));
    }

    #[test]
    fn test_otp_rejects_consumed_code() {
        let now = Utc::now();
        let mut user = user_with_otp("123456", now + Duration::minutes(10));
        user.otp_code = None;
        user.otp_expires_at = None;

        assert!(!user.otp_accepts("123456", now));
    }
}
