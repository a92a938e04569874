use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::HashingConfig;

/// Width of the `password_hash` column.
pub const MAX_HASH_LEN: usize = 100;

// Base64 widths of the 16-byte salt and 32-byte output in the PHC string.
const SALT_B64_LEN: usize = 22;
const OUTPUT_B64_LEN: usize = 43;

/// Argon2id hasher with a configurable work factor.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
    dummy_hash: String,
    #[cfg(test)]
    verifications: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl Argon2Hasher {
    /// Rejects params whose PHC string would not fit in [`MAX_HASH_LEN`].
    pub fn new(cfg: &HashingConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;

        let expected = phc_len(&params);
        if expected > MAX_HASH_LEN {
            anyhow::bail!(
                "argon2 params m={},t={},p={} produce {expected}-char hashes, limit is {MAX_HASH_LEN}",
                params.m_cost(),
                params.t_cost(),
                params.p_cost(),
            );
        }

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
            #[cfg(test)]
            verifications: Default::default(),
        };
        let dummy_hash = hasher.hash_password("account-service-dummy")?;
        if dummy_hash.len() > MAX_HASH_LEN {
            anyhow::bail!(
                "argon2 hash is {} chars, limit is {MAX_HASH_LEN}",
                dummy_hash.len()
            );
        }
        hasher.dummy_hash = dummy_hash;
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash_password(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// Parameters are read back from the stored PHC string, so hashes made
    /// under an older work factor still verify.
    pub fn verify_password(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        #[cfg(test)]
        self.verifications
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Full verification against a hash of a throwaway value. Used when no
    /// account matches the login email.
    pub fn verify_dummy(&self, plain: &str) {
        let _ = self.verify_password(plain, &self.dummy_hash);
    }

    #[cfg(test)]
    pub fn verifications(&self) -> usize {
        self.verifications
            .load(std::sync::atomic::Ordering::SeqCst)
    }
}

fn phc_len(params: &Params) -> usize {
    let header = format!(
        "$argon2id$v=19$m={},t={},p={}$",
        params.m_cost(),
        params.t_cost(),
        params.p_cost()
    );
    header.len() + SALT_B64_LEN + 1 + OUTPUT_B64_LEN
}

#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2Hasher {
    Argon2Hasher::new(&HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("test params are valid")
}
