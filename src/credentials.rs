//! Password hashing with argon2id. Only PHC strings are ever persisted.
use crate::config::PasswordCost;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

#[derive(Debug, Clone)]
pub struct Credentials {
    params: Params,
    decoy: String, // hash of a throwaway secret, checked when the user is unknown
    #[cfg(test)]
    pub(crate) verifications: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl Credentials {
    pub fn new(cost: PasswordCost) -> anyhow::Result<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        let mut credentials = Self {
            params,
            decoy: String::new(),
            #[cfg(test)]
            verifications: Default::default(),
        };
        let secret = SaltString::generate(&mut OsRng);
        credentials.decoy = credentials.hash_password(secret.as_str())?;
        Ok(credentials)
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash_password(&self, password: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;
        Ok(hash.to_string())
    }

    // the stored hash carries its own parameters, so verification works
    // even after the configured cost changes
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        #[cfg(test)]
        self.verifications
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Verify against the stored hash of an account that may not exist.
    ///
    /// A missing account still costs one full verification, against the
    /// decoy, and always fails. Both rejections take the same time.
    pub fn verify_stored(&self, password: &str, stored: Option<&str>) -> bool {
        match stored {
            Some(hash) => self.verify_password(password, hash),
            None => {
                let _ = self.verify_password(password, &self.decoy);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Credentials {
        Credentials::new(PasswordCost::new(8, 1, 1)).unwrap()
    }

    #[test]
    fn hash_verifies_only_the_original_password() {
        let credentials = cheap();
        let hash = credentials.hash_password("hunter2").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(credentials.verify_password("hunter2", &hash));
        assert!(!credentials.verify_password("hunter3", &hash));
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!cheap().verify_password("hunter2", "hunter2"));
    }

    #[test]
    fn missing_account_runs_against_the_decoy() {
        let credentials = cheap();
        let hash = credentials.hash_password("hunter2").unwrap();

        assert!(credentials.decoy.starts_with("$argon2id$v=19$m=8,t=1,p=1$"));
        assert!(credentials.verify_stored("hunter2", Some(&hash)));
        assert!(!credentials.verify_stored("hunter2", None));
        assert!(!credentials.verify_stored("", None));
    }

    #[test]
    fn rejects_impossible_cost() {
        assert!(Credentials::new(PasswordCost::new(1, 0, 0)).is_err());
    }
}
