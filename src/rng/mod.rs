//! Randomness source for share and triple material.
//!
//! The engines only require a uniform source of 64-bit words and single bits;
//! they stay generic over `Rng + CryptoRng` so tests can inject a seeded
//! instance.
use rand::{CryptoRng, Error, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Cryptographically secure randomness source backed by ChaCha20.
pub struct SecureRng(ChaCha20Rng);

impl SecureRng {
    pub fn from_entropy() -> Self {
        Self(ChaCha20Rng::from_entropy())
    }

    /// Deterministic source for reproducible tests and dealer scripts.
    pub fn seed_from_u64(seed: u64) -> Self {
        Self(ChaCha20Rng::seed_from_u64(seed))
    }

    pub fn rand64(&mut self) -> u64 {
        self.0.next_u64()
    }

    /// A single uniform bit in the low bit of a word.
    pub fn rand_bit(&mut self) -> u32 {
        self.0.next_u32() & 1
    }
}

impl RngCore for SecureRng {
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.0.try_fill_bytes(dest)
    }
}

impl CryptoRng for SecureRng {}
