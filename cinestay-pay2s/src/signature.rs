use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::Pay2sError;

type HmacSha256 = Hmac<Sha256>;

/// Join `key=value` pairs with `&`, in the given order, without URL encoding.
pub fn canonical(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// HMAC-SHA256 of `data`, lower-case hex.
pub fn sign(secret_key: &str, data: &str) -> Result<String, Pay2sError> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|_| Pay2sError::Malformed("HMAC key error".to_string()))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature over `data`.
pub fn verify(secret_key: &str, data: &str, signature_hex: &str) -> Result<(), Pay2sError> {
    let sig_bytes = hex::decode(signature_hex.trim()).map_err(|_| Pay2sError::InvalidSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|_| Pay2sError::Malformed("HMAC key error".to_string()))?;
    mac.update(data.as_bytes());
    mac.verify_slice(&sig_bytes).map_err(|_| Pay2sError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc4231_known_answer() {
        let sig = sign("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(sig, "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
    }

    #[test]
    fn test_verify_accepts_upper_case_hex() {
        let data = canonical(&[("amount", "100000"), ("orderId", "CS12345678")]);
        let sig = sign("secret", &data).unwrap();
        assert!(verify("secret", &data, &sig.to_ascii_uppercase()).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let data = canonical(&[("amount", "100000"), ("orderId", "CS12345678")]);
        let sig = sign("secret", &data).unwrap();

        let tampered = canonical(&[("amount", "1000"), ("orderId", "CS12345678")]);
        assert!(matches!(verify("secret", &tampered, &sig), Err(Pay2sError::InvalidSignature)));
        assert!(matches!(verify("other", &data, &sig), Err(Pay2sError::InvalidSignature)));
        assert!(matches!(verify("secret", &data, "not-hex"), Err(Pay2sError::InvalidSignature)));
    }

    #[test]
    fn test_canonical_keeps_order() {
        assert_eq!(canonical(&[("b", "2"), ("a", "1")]), "b=2&a=1");
        assert_eq!(canonical(&[("extraData", "")]), "extraData=");
    }
}
