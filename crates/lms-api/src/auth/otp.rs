use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::validation::OTP_LENGTH;

/// Generate a zero-padded six digit one-time passcode
pub fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:0width$}", width = OTP_LENGTH)
}

/// Whether an OTP issued at `created_at` is still redeemable at `now`.
pub fn is_otp_fresh(created_at: DateTime<Utc>, expiry_minutes: i64, now: DateTime<Utc>) -> bool {
    now < created_at + Duration::minutes(expiry_minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_otp;

    #[test]
    fn test_generated_otp_is_six_digits() {
        for _ in 0..200 {
            let otp = generate_otp();
            assert!(validate_otp(&otp).is_ok(), "bad otp {otp}");
        }
    }

    #[test]
    fn test_otp_freshness_window() {
        let issued = Utc::now();

        assert!(is_otp_fresh(issued, 5, issued));
        assert!(is_otp_fresh(issued, 5, issued + Duration::minutes(4)));
        assert!(!is_otp_fresh(issued, 5, issued + Duration::minutes(5)));
        assert!(!is_otp_fresh(issued, 5, issued + Duration::hours(1)));
    }
}
