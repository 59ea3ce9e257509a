use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying GitHub's `sha256=<hex>` HMAC of the raw body.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Verifies a GitHub webhook signature against every configured secret.
///
/// GitHub sends `X-Hub-Signature-256: sha256=<hex>`. The delivery is
/// authentic if the HMAC-SHA256 of the raw body under *any* of `secrets`
/// matches. Each comparison is constant-time. With no secrets configured
/// nothing verifies.
pub fn verify<S: AsRef<[u8]>>(secrets: &[S], body: &[u8], signature_header: &str) -> bool {
    let Some(hex_sig) = signature_header.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };

    secrets.iter().any(|secret| {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_ref()) else {
            return false;
        };
        mac.update(body);
        mac.verify_slice(&expected).is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute_sig(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn valid_signature_passes() {
        let sig = compute_sig("hunter2", b"hello world");
        assert!(verify(&["hunter2"], b"hello world", &sig));
    }

    #[test]
    fn any_configured_secret_may_sign() {
        let body = br#"{"action":"opened"}"#;
        let sig = compute_sig("hunter2", body);

        assert!(verify(&["badsecret", "hunter2"], body, &sig));
        assert!(verify(&["hunter2", "badsecret"], body, &sig));
    }

    #[test]
    fn no_matching_secret_fails() {
        let sig = compute_sig("correct-secret", b"body");
        assert!(!verify(&["wrong-secret", "other-secret"], b"body", &sig));
    }

    #[test]
    fn no_secrets_always_fails() {
        let sig = compute_sig("", b"body");
        let none: [&str; 0] = [];
        assert!(!verify(&none, b"body", &sig));
    }

    #[test]
    fn tampered_body_fails() {
        let sig = compute_sig("secret", b"original body");
        assert!(!verify(&["secret"], b"tampered body", &sig));
    }

    #[test]
    fn missing_sha256_prefix_fails() {
        let sig = compute_sig("secret", b"body");
        let raw_hex = sig.strip_prefix("sha256=").unwrap().to_string();
        assert!(!verify(&["secret"], b"body", &raw_hex));
    }

    #[test]
    fn sha1_signature_is_not_accepted() {
        let sig = compute_sig("secret", b"body").replace("sha256=", "sha1=");
        assert!(!verify(&["secret"], b"body", &sig));
    }

    #[test]
    fn invalid_hex_fails() {
        assert!(!verify(&["secret"], b"body", "sha256=not-valid-hex!"));
    }

    #[test]
    fn empty_body_with_valid_sig_passes() {
        let sig = compute_sig("secret", b"");
        assert!(verify(&["secret"], b"", &sig));
    }

    #[test]
    fn byte_secrets_are_accepted() {
        let sig = compute_sig("hunter2", b"body");
        let secrets = vec![b"hunter2".to_vec()];
        assert!(verify(&secrets, b"body", &sig));
    }
}
