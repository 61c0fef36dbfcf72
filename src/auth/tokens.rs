use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Generate a random token of `n` bytes, hex-encoded (2n chars).
pub fn generate(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::fill(&mut bytes[..]);
    hex::encode(bytes)
}

/// One-way hash of a token for storage. Only the hash ever touches the database.
pub fn hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Constant-time equality for token material. Length mismatch compares unequal.
pub fn ct_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Check that a presented token is exactly `len` lowercase hex characters.
pub fn is_hex_of_len(token: &str, len: usize) -> bool {
    token.len() == len && token.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_has_expected_length_and_charset() {
        let token = generate(32);
        assert_eq!(token.len(), 64);
        assert!(is_hex_of_len(&token, 64));
    }

    #[test]
    fn generate_is_not_repeating() {
        assert_ne!(generate(32), generate(32));
    }

    #[test]
    fn hash_is_deterministic_and_hex() {
        let h1 = hash("abc");
        let h2 = hash("abc");
        assert_eq!(h1, h2);
        assert!(is_hex_of_len(&h1, 64));
        assert_ne!(h1, hash("abd"));
    }

    #[test]
    fn ct_eq_matches_and_rejects() {
        assert!(ct_eq("deadbeef", "deadbeef"));
        assert!(!ct_eq("deadbeef", "deadbeee"));
        assert!(!ct_eq("deadbeef", "deadbee"));
        assert!(!ct_eq("", "deadbeef"));
    }

    #[test]
    fn hex_check_rejects_bad_shapes() {
        assert!(is_hex_of_len("00ff00ff", 8));
        assert!(!is_hex_of_len("00FF00FF", 8));
        assert!(!is_hex_of_len("00ff00f", 8));
        assert!(!is_hex_of_len("00ff00fg", 8));
    }
}
