// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Ed25519 Signing
//!
//! Signing keypairs for pairing payloads and LAN discovery beacons.

use ring::rand::SystemRandom;
use ring::signature::{self, Ed25519KeyPair, KeyPair};
use thiserror::Error;
use zeroize::Zeroize;

/// Signing error types.
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Key generation failed")]
    KeyGenerationFailed,
    #[error("Invalid key material")]
    InvalidKeyMaterial,
}

/// An Ed25519 signature (64 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; 64],
}

impl Signature {
    /// Creates a signature from raw bytes.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Signature { bytes }
    }

    /// Returns the signature bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

/// An Ed25519 public key used for signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    bytes: [u8; 32],
}

impl VerifyingKey {
    /// Creates a verifying key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        VerifyingKey { bytes }
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Returns the key as a hex fingerprint.
    pub fn fingerprint(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Verifies a signature over a message.
    pub fn verify(&self, message: &[u8], sig: &Signature) -> bool {
        let key = signature::UnparsedPublicKey::new(&signature::ED25519, &self.bytes);
        key.verify(message, sig.as_bytes()).is_ok()
    }
}

/// An Ed25519 signing keypair.
///
/// The seed is retained so the keypair can round-trip through secure storage.
pub struct SigningKeyPair {
    keypair: Ed25519KeyPair,
    seed: [u8; 32],
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("public_key", &hex::encode(self.public_key().as_bytes()))
            .field("seed", &"[REDACTED]")
            .finish()
    }
}

impl Drop for SigningKeyPair {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

impl SigningKeyPair {
    /// Generates a new random signing keypair.
    pub fn generate() -> Result<Self, SigningError> {
        let rng = SystemRandom::new();
        let seed = ring::rand::generate::<[u8; 32]>(&rng)
            .map_err(|_| SigningError::KeyGenerationFailed)?
            .expose();
        Self::from_seed(seed)
    }

    /// Reconstructs a keypair from a stored seed.
    pub fn from_seed(seed: [u8; 32]) -> Result<Self, SigningError> {
        let keypair = Ed25519KeyPair::from_seed_unchecked(&seed)
            .map_err(|_| SigningError::InvalidKeyMaterial)?;
        Ok(SigningKeyPair { keypair, seed })
    }

    /// Returns the seed bytes for secure storage.
    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }

    /// Returns the public verification key.
    pub fn public_key(&self) -> VerifyingKey {
        let bytes: [u8; 32] = self
            .keypair
            .public_key()
            .as_ref()
            .try_into()
            .expect("Ed25519 public key is 32 bytes");
        VerifyingKey::from_bytes(bytes)
    }

    /// Signs a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.keypair.sign(message);
        let bytes: [u8; 64] = sig
            .as_ref()
            .try_into()
            .expect("Ed25519 signature is 64 bytes");
        Signature::from_bytes(bytes)
    }
}
