// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! HKDF Key Derivation
//!
//! HKDF-SHA256 with domain-separation info strings. Used to turn X25519
//! shared secrets into AEAD keys for per-device key wrapping.

use ring::hkdf;

/// HKDF-SHA256 key derivation.
pub struct Hkdf;

struct OkmLen(usize);

impl hkdf::KeyType for OkmLen {
    fn len(&self) -> usize {
        self.0
    }
}

impl Hkdf {
    /// Derives a 32-byte key from input key material.
    ///
    /// `salt` defaults to all zeroes when absent (RFC 5869). `info` must be a
    /// unique domain-separation string per use site.
    pub fn derive_key(salt: Option<&[u8; 32]>, ikm: &[u8], info: &[u8]) -> [u8; 32] {
        let salt_bytes: &[u8] = salt.map(|s| s.as_slice()).unwrap_or(&[0u8; 32]);
        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, salt_bytes);
        let prk = salt.extract(ikm);

        let mut okm = [0u8; 32];
        let info_parts = [info];
        prk.expand(&info_parts, OkmLen(32))
            .expect("HKDF-SHA256 expand to 32 bytes cannot fail")
            .fill(&mut okm)
            .expect("HKDF output length matches buffer");
        okm
    }
}
