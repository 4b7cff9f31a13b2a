// Firkinize — Secret Generator
//
// Produces login passwords for service identities and database users.
// The random source is injected once at process start so tests can
// substitute a seeded generator.
//
// Passwords travel as `Password`, which zeroizes on drop and never prints
// its value through Debug or Display.

use std::fmt;
use std::sync::Mutex;

use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zeroize::Zeroizing;

/// Length of every generated password.
pub const PASSWORD_LEN: usize = 16;

// ─── Password ────────────────────────────────────────────────────────────────

/// A credential string. Redacted in all formatted output.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(Zeroizing<String>);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Access the raw value. Callers must not log it.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Source of fresh passwords.
pub trait SecretGenerator: Send + Sync {
    /// Produce a new password of `PASSWORD_LEN` characters drawn from
    /// `[0-9a-zA-Z]`. Successive calls are independent.
    fn generate(&self) -> Password;
}

// ─── RNG-backed implementation ───────────────────────────────────────────────

/// Draws passwords uniformly from the 62-symbol alphanumeric alphabet.
pub struct RandomSecretGenerator<R> {
    rng: Mutex<R>,
}

impl RandomSecretGenerator<StdRng> {
    /// Generator seeded from the operating system's entropy source.
    pub fn from_os_rng() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }
}

impl<R: Rng + Send> RandomSecretGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl<R: Rng + Send> SecretGenerator for RandomSecretGenerator<R> {
    fn generate(&self) -> Password {
        // A poisoned lock still holds a usable RNG.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let value: String = (&mut *rng)
            .sample_iter(Alphanumeric)
            .take(PASSWORD_LEN)
            .map(char::from)
            .collect();
        Password::new(value)
    }
}

// ─── Fixed generator for tests ───────────────────────────────────────────────

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hands out `pw-0000000000000`, `pw-0000000000001`, ... and counts calls.
    pub struct SequenceGenerator {
        calls: AtomicUsize,
    }

    impl SequenceGenerator {
        pub fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// The password the n-th call (zero-based) returns.
        pub fn nth(n: usize) -> String {
            format!("pw-{:013}", n)
        }
    }

    impl SecretGenerator for SequenceGenerator {
        fn generate(&self) -> Password {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Password::new(Self::nth(n))
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> RandomSecretGenerator<StdRng> {
        RandomSecretGenerator::with_rng(StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_password_has_fixed_length_and_alphabet() {
        let generator = RandomSecretGenerator::from_os_rng();
        for _ in 0..50 {
            let pw = generator.generate();
            assert_eq!(pw.expose().len(), PASSWORD_LEN);
            assert!(pw.expose().chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_successive_passwords_differ() {
        let generator = seeded(7);
        let a = generator.generate();
        let b = generator.generate();
        assert_ne!(a, b, "Each call must draw fresh characters");
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let a = seeded(42).generate();
        let b = seeded(42).generate();
        assert_eq!(a.expose(), b.expose());
    }

    #[test]
    fn test_password_is_redacted_in_output() {
        let pw = Password::new("hunter2hunter2hu");
        assert_eq!(format!("{}", pw), "[REDACTED]");
        assert!(!format!("{:?}", pw).contains("hunter2"));
    }

    #[test]
    fn test_sequence_generator_counts_calls() {
        let generator = mock::SequenceGenerator::new();
        assert_eq!(generator.generate().expose(), mock::SequenceGenerator::nth(0));
        assert_eq!(generator.generate().expose(), mock::SequenceGenerator::nth(1));
        assert_eq!(generator.calls(), 2);
        assert_eq!(mock::SequenceGenerator::nth(0).len(), PASSWORD_LEN);
    }
}
