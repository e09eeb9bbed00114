/// Password hashing with Argon2id
///
/// Hashes are PHC strings, so the parameters used at hash time travel with
/// the hash and verification never needs the current [`HashCost`].
///
/// # Example
///
/// ```
/// use agenteur_shared::auth::password::{hash_password, verify_password, HashCost};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cost = HashCost::default();
/// let hash = hash_password("super_secret_password_123", &cost)?;
///
/// assert!(verify_password("super_secret_password_123", &hash)?);
/// assert!(!verify_password("wrong_password", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Argon2id cost parameters
///
/// Higher values slow down both legitimate logins and brute-force attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory in KiB
    pub memory_kib: u32,

    /// Number of passes
    pub iterations: u32,

    /// Parallel lanes
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl HashCost {
    /// Minimal parameters for test suites
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Hashes a password with a random 16-byte salt
///
/// # Errors
///
/// Returns `PasswordError::HashError` if the cost parameters are rejected by
/// Argon2 or hashing fails.
pub fn hash_password(password: &str, cost: &HashCost) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(cost.memory_kib)
        .t_cost(cost.iterations)
        .p_cost(cost.parallelism)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored hash
///
/// Returns `Ok(false)` for a wrong password. Only a malformed stored hash
/// (or an internal Argon2 failure) is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;
    if parsed_hash.salt.is_none() || parsed_hash.hash.is_none() {
        return Err(PasswordError::InvalidHash(
            "Hash is missing its salt or output".to_string(),
        ));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_embeds_parameters() {
        let hash = hash_password("test_password_123", &HashCost::default())
            .expect("Hash should succeed");

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("v=19"));
        assert!(hash.contains("m=65536"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=4"));
    }

    #[test]
    fn test_hash_password_respects_custom_cost() {
        let hash = hash_password("pw", &HashCost::minimal()).expect("Hash should succeed");

        assert!(hash.contains("m=8"));
        assert!(hash.contains("t=1"));
        assert!(hash.contains("p=1"));
    }

    #[test]
    fn test_hash_password_rejects_invalid_cost() {
        let cost = HashCost {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };

        let result = hash_password("pw", &cost);
        assert!(matches!(result, Err(PasswordError::HashError(_))));
    }

    #[test]
    fn test_hash_password_produces_different_salts() {
        let cost = HashCost::minimal();
        let hash1 = hash_password("same_password", &cost).expect("Hash 1 should succeed");
        let hash2 = hash_password("same_password", &cost).expect("Hash 2 should succeed");

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password_correct_and_suffixed() {
        let passwords = vec![
            "simple",
            "with spaces",
            "with-special-chars!@#$%",
            "unicode-密码-パスワード",
        ];

        for password in passwords {
            let hash = hash_password(password, &HashCost::minimal()).expect("Hash should succeed");

            assert!(verify_password(password, &hash).expect("Verify should succeed"));

            let suffixed = format!("{}x", password);
            assert!(
                !verify_password(&suffixed, &hash).expect("Verify should succeed"),
                "Password '{}' should not verify",
                suffixed
            );
        }
    }

    #[test]
    fn test_verify_password_empty() {
        let hash = hash_password("password", &HashCost::minimal()).expect("Hash should succeed");

        let result = verify_password("", &hash).expect("Verify should succeed");
        assert!(!result, "Empty password should not verify");
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        let result = verify_password("password", "invalid_hash");
        assert!(matches!(result, Err(PasswordError::InvalidHash(_))));
    }

    #[test]
    fn test_verify_password_malformed_hash() {
        let result = verify_password("password", "$argon2id$invalid");
        assert!(
            matches!(result, Err(PasswordError::InvalidHash(_))),
            "Malformed hash should return error"
        );
    }

    #[test]
    fn test_verify_password_hash_without_output() {
        let hash = hash_password("password", &HashCost::minimal()).expect("Hash should succeed");
        let truncated = &hash[..hash.rfind('$').expect("Hash should have an output segment")];

        let result = verify_password("password", truncated);
        assert!(matches!(result, Err(PasswordError::InvalidHash(_))));
    }
}
