use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex encoded HMAC-SHA256 of `message` keyed with `secret`, as the gateway
/// signs its callbacks.
#[cfg(test)]
pub fn hmac_sha256_hex(secret: &str, message: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature produced by the payment gateway
/// over `order_id|payment_id`.
pub fn verify_payment_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature_hex: &str,
) -> bool {
    let expected = match hex::decode(signature_hex.trim()) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_signature() {
        let sig = hmac_sha256_hex("secret", "order_123|pay_456");
        assert_eq!(sig.len(), 64);
        assert!(verify_payment_signature("secret", "order_123", "pay_456", &sig));
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let sig = hmac_sha256_hex("secret", "order_123|pay_456").to_uppercase();
        assert!(verify_payment_signature("secret", "order_123", "pay_456", &sig));
    }

    #[test]
    fn test_rejects_wrong_secret_or_ids() {
        let sig = hmac_sha256_hex("secret", "order_123|pay_456");
        assert!(!verify_payment_signature("other", "order_123", "pay_456", &sig));
        assert!(!verify_payment_signature("secret", "order_999", "pay_456", &sig));
        assert!(!verify_payment_signature("secret", "order_123", "pay_999", &sig));
    }

    #[test]
    fn test_rejects_malformed_hex() {
        assert!(!verify_payment_signature("secret", "o", "p", ""));
        assert!(!verify_payment_signature("secret", "o", "p", "abc"));
        assert!(!verify_payment_signature("secret", "o", "p", "zz"));
    }

    #[test]
    fn test_truncated_signature_rejected() {
        let sig = hmac_sha256_hex("secret", "order_123|pay_456");
        assert!(!verify_payment_signature("secret", "order_123", "pay_456", &sig[..32]));
    }

    #[test]
    fn test_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            hmac_sha256_hex("Jefe", "what do ya want for nothing?"),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
