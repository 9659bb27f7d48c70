use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{self, SaltString, rand_core::OsRng},
};
use tracing::warn;

use crate::error::{Error, Result};

/// Argon2id cost parameters. Raise them to make each hash slower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl HashParams {
    /// Cheapest settings argon2 accepts. For tests only.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
        }
    }
}

/// Salted one-way password hashing (Argon2id, PHC string format).
pub struct Hasher {
    argon2: Argon2<'static>,
    /// Verified against when the username is unknown, so that path costs the
    /// same as a wrong password.
    dummy_hash: String,
}

impl Hasher {
    pub fn new(params: HashParams) -> Result<Self> {
        let params = Params::new(params.memory_kib, params.iterations, params.parallelism, None)
            .map_err(|e| Error::Hashing(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut hasher = Self {
            argon2,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash("scrawl-dummy-password")?;
        Ok(hasher)
    }

    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| Error::Hashing(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// `Ok(false)` on mismatch. Only an unparseable stored hash is an error.
    pub fn verify(&self, stored: &str, plaintext: &str) -> Result<bool> {
        let parsed = PasswordHash::new(stored).map_err(|e| {
            warn!("Stored password hash does not parse: {}", e);
            Error::CorruptCredential
        })?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                warn!("Stored password hash is unusable: {}", e);
                Err(Error::CorruptCredential)
            }
        }
    }

    /// Burns one verification's worth of work and always reports a mismatch.
    pub fn verify_dummy(&self, plaintext: &str) -> Result<bool> {
        self.verify(&self.dummy_hash, plaintext)?;
        Ok(false)
    }
}
