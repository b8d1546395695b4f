//! Reference and code generation

use chrono::{DateTime, Utc};
use rand::Rng;

/// Tuition payment reference: `PAY-<millis>-<first 6 chars of the student id>`.
pub fn payment_reference(now: DateTime<Utc>, etudiant_id: &str) -> String {
    let prefix: String = etudiant_id.chars().take(6).collect();
    format!("PAY-{}-{}", now.timestamp_millis(), prefix)
}

/// Agent withdrawal reference: `RET-<millis>-<8 hex>`.
pub fn retrait_reference(now: DateTime<Utc>) -> String {
    let bytes: [u8; 4] = rand::thread_rng().gen();
    format!("RET-{}-{}", now.timestamp_millis(), hex::encode(bytes))
}

/// Wallet purchase reference: `CMD-<millis>-<0..999>`.
pub fn commande_reference(now: DateTime<Utc>) -> String {
    format!(
        "CMD-{}-{}",
        now.timestamp_millis(),
        rand::thread_rng().gen_range(0..1000)
    )
}

/// Wallet top-up reference: `RECH-<millis>-<0..999>`.
pub fn recharge_reference(now: DateTime<Utc>) -> String {
    format!(
        "RECH-{}-{}",
        now.timestamp_millis(),
        rand::thread_rng().gen_range(0..1000)
    )
}

/// Six digit one-time login code.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Promotion scope of a wallet purchase reference (`<promotionId>=...`).
pub fn commande_scope(reference: &str) -> Option<&str> {
    reference.split_once('=').map(|(scope, _)| scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_formats() {
        let now = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let millis = now.timestamp_millis();

        assert_eq!(
            payment_reference(now, "65a1b2c3d4"),
            format!("PAY-{}-65a1b2", millis)
        );
        assert_eq!(payment_reference(now, "e1"), format!("PAY-{}-e1", millis));

        let ret = retrait_reference(now);
        let suffix = ret.rsplit('-').next().unwrap();
        assert!(ret.starts_with(&format!("RET-{}-", millis)));
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));

        assert!(commande_reference(now).starts_with("CMD-"));
        assert!(recharge_reference(now).starts_with("RECH-"));
    }

    #[test]
    fn test_otp_is_six_digits() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            let value: u32 = otp.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn test_commande_scope() {
        assert_eq!(commande_scope("p1=carte-2024"), Some("p1"));
        assert_eq!(commande_scope("CMD-1-2"), None);
    }
}
