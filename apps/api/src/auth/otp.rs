use chrono::{DateTime, Duration, Utc};
use rand::Rng;

pub const OTP_TTL_MINUTES: i64 = 10;

/// Six ASCII digits, zero-padded.
pub fn generate_otp() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

pub fn otp_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(OTP_TTL_MINUTES)
}

/// True only when a code is stored, it has not expired and the candidate equals it.
pub fn otp_matches(
    stored: Option<&str>,
    expiry: Option<DateTime<Utc>>,
    candidate: &str,
    now: DateTime<Utc>,
) -> bool {
    match (stored, expiry) {
        (Some(code), Some(expiry)) => expiry > now && code == candidate.trim(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_matching_code_within_window() {
        let now = Utc::now();
        assert!(otp_matches(Some("123456"), Some(otp_expiry(now)), "123456", now));
        assert!(!otp_matches(Some("123456"), Some(otp_expiry(now)), "654321", now));
    }

    #[test]
    fn test_expired_or_missing_code_never_matches() {
        let now = Utc::now();
        let later = now + Duration::minutes(OTP_TTL_MINUTES + 1);
        assert!(!otp_matches(Some("123456"), Some(otp_expiry(now)), "123456", later));
        assert!(!otp_matches(None, Some(otp_expiry(now)), "123456", now));
        assert!(!otp_matches(Some("123456"), None, "123456", now));
    }
}
