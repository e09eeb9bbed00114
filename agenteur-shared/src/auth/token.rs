/// Opaque tokens for refresh sessions and invitations
///
/// Raw tokens are handed to the caller once and never stored. Storage keeps a
/// SHA-256 digest; lookups hash the presented value and compare digests in
/// the database. A fast digest is enough because the input already carries
/// 256 bits of entropy.
///
/// # Format
///
/// - Raw token: 32 random bytes, lowercase hex (64 chars)
/// - Hash: SHA-256 of the raw string, lowercase hex (64 chars)
///
/// # Example
///
/// ```
/// use agenteur_shared::auth::token::{hash_token, OpaqueToken};
///
/// let token = OpaqueToken::generate();
/// assert_eq!(token.raw.len(), 64);
/// assert_eq!(hash_token(&token.raw), token.hash);
/// ```

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Number of random bytes in a raw token
pub const TOKEN_BYTES: usize = 32;

/// A freshly generated token and the digest to persist
#[derive(Clone, PartialEq, Eq)]
pub struct OpaqueToken {
    /// Value returned to the caller
    pub raw: String,

    /// Value stored in the database
    pub hash: String,
}

impl std::fmt::Debug for OpaqueToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpaqueToken")
            .field("raw", &"<redacted>")
            .field("hash", &self.hash)
            .finish()
    }
}

impl OpaqueToken {
    /// Generates a token from the OS random source
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);

        let raw = hex::encode(bytes);
        let hash = hash_token(&raw);

        Self { raw, hash }
    }
}

/// Hashes a raw token for storage or lookup
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_format() {
        let token = OpaqueToken::generate();

        assert_eq!(token.raw.len(), TOKEN_BYTES * 2);
        assert!(token.raw.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(token.hash.len(), 64);
        assert_ne!(token.raw, token.hash);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let token = OpaqueToken::generate();
        assert_eq!(hash_token(&token.raw), token.hash);
        assert_eq!(hash_token(&token.raw), hash_token(&token.raw));
    }

    #[test]
    fn test_hash_known_vector() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..200).map(|_| OpaqueToken::generate().raw).collect();
        assert_eq!(tokens.len(), 200);
    }

    #[test]
    fn test_debug_redacts_raw() {
        let token = OpaqueToken::generate();
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains(&token.raw));
        assert!(rendered.contains("<redacted>"));
    }
}
