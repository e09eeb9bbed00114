/// Authentication and authorization primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: HS256 access token signing and validation
/// - [`token`]: opaque refresh and invitation tokens (random + SHA-256)
/// - [`authorization`]: organization access resolution and gates
///
/// # Example
///
/// ```
/// use agenteur_shared::auth::password::{hash_password, verify_password, HashCost};
/// use agenteur_shared::auth::token::{hash_token, OpaqueToken};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password", &HashCost::minimal())?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let refresh = OpaqueToken::generate();
/// assert_eq!(hash_token(&refresh.raw), refresh.hash);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod password;
pub mod token;
