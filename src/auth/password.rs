use sha2::{Digest, Sha256};

/// Hex SHA-256 of the raw password. Unsalted, to stay compatible with
/// existing `users.json` files.
pub fn hash_password(plain: &str) -> String {
    format!("{:x}", Sha256::digest(plain.as_bytes()))
}

pub fn verify_password(plain: &str, hash: &str) -> bool {
    hash_password(plain).eq_ignore_ascii_case(hash.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password);
        assert_eq!(hash.len(), 64);
        assert!(verify_password(password, &hash));
    }

    #[test]
    fn verify_is_case_sensitive_on_password() {
        let hash = hash_password("Hunter2");
        assert!(!verify_password("hunter2", &hash));
        assert!(!verify_password("Hunter2 ", &hash));
    }

    #[test]
    fn verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-valid-hash"));
    }
}
