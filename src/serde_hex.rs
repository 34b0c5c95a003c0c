use crate::{EciesPublicKey, EciesSecretKey};
use std::borrow::Cow;

pub use hex_buffer_serde::Hex;

// a single-purpose type for use in `#[serde(with)]`
pub enum EciesPublicKeyHex {}

impl Hex<EciesPublicKey> for EciesPublicKeyHex {
    type Error = String;

    fn create_bytes(public_key: &EciesPublicKey) -> Cow<[u8]> {
        public_key.as_bytes().as_ref().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<EciesPublicKey, String> {
        EciesPublicKey::from_bytes(bytes).ok_or_else(|| "malformed public key".to_string())
    }
}

// a single-purpose type for use in `#[serde(with)]`
//
// Only the full election record (a backend-internal storage blob) uses this;
// client-facing views never carry the secret key at all.
pub enum EciesSecretKeyHex {}

impl Hex<EciesSecretKey> for EciesSecretKeyHex {
    type Error = String;

    fn create_bytes(secret_key: &EciesSecretKey) -> Cow<[u8]> {
        secret_key.to_bytes().to_vec().into()
    }

    fn from_bytes(bytes: &[u8]) -> Result<EciesSecretKey, String> {
        EciesSecretKey::from_bytes(bytes).ok_or_else(|| "wrong secret key length".to_string())
    }
}
