// SPDX-FileCopyrightText: 2026 Worksync Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod encryption;
pub mod kdf;
pub mod keys;
pub mod password_kdf;
pub mod signing;

pub use encryption::{decrypt, encrypt, EncryptionAlgorithm, EncryptionError, SymmetricKey};
pub use kdf::Hkdf;
pub use keys::{
    DecryptionError, DeviceKeyPair, EncryptionManager, EncryptionMaterial, KeyError,
    KeyRotationPolicy, WrappedKey,
};
pub use password_kdf::{derive_key, derive_key_argon2id, derive_key_pbkdf2, KdfAlgorithm, PasswordKdfError};
pub use signing::{Signature, SigningError, SigningKeyPair, VerifyingKey};
