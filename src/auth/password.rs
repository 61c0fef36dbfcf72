use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Current hashing policy: Argon2id, 19 MiB memory, 2 iterations, parallelism 1.
const POLICY_M_COST: u32 = 19 * 1024;
const POLICY_T_COST: u32 = 2;
const POLICY_P_COST: u32 = 1;

fn policy() -> Result<Argon2<'static>, String> {
    let params = Params::new(POLICY_M_COST, POLICY_T_COST, POLICY_P_COST, None)
        .map_err(|e| format!("Invalid params: {e}"))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password with the current policy, producing a PHC string.
pub fn hash(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    policy()?
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| format!("Hashing failed: {e}"))
}

/// Verify a password against a stored PHC hash.
pub fn verify(password: &str, hash: &str) -> Result<bool, String> {
    let parsed = PasswordHash::new(hash).map_err(|e| format!("Invalid hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Whether a stored hash was produced with weaker parameters than the current
/// policy and should be transparently replaced on the next successful login.
pub fn needs_rehash(hash: &str) -> Result<bool, String> {
    let parsed = PasswordHash::new(hash).map_err(|e| format!("Invalid hash: {e}"))?;
    if parsed.algorithm != Algorithm::Argon2id.ident() {
        return Ok(true);
    }
    let params =
        Params::try_from(&parsed).map_err(|e| format!("Unreadable hash params: {e}"))?;
    Ok(params.m_cost() < POLICY_M_COST
        || params.t_cost() < POLICY_T_COST
        || params.p_cost() < POLICY_P_COST)
}
