//! ECIES-ed25519: An Integrated Encryption Scheme on Twisted Edwards Curve25519.
//!
//! Every election gets one keypair from this module: the public half encrypts
//! ballots in the open, the secret half stays with the election authority and
//! is only touched by the close/tally path.
//!
//! These keys are for encryption only. They must never be used for signing or
//! in any protocol other than ECIES.

use crate::Error;
use aes_gcm::aead::{generic_array::GenericArray, Aead, NewAead};
use aes_gcm::Aes256Gcm;
use curve25519_dalek::constants;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::PUBLIC_KEY_LENGTH;
use ed25519_dalek::{PublicKey, SecretKey};
use hex::FromHex;
use rand::{thread_rng, Rng};
use rand_core::RngCore;
use sha2::Sha256;

/// AES-256-GCM nonce length in bytes.
pub const NONCE_LENGTH: usize = 12;

type AesKey = [u8; 32];
type SharedSecret = [u8; 32];

/// An ed25519 Public Key meant for use in ECIES
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EciesPublicKey(PublicKey);

impl EciesPublicKey {
    /// Convert this public key to a byte array.
    #[inline]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// View this public key as a byte array.
    #[inline]
    pub fn as_bytes<'a>(&'a self) -> &'a [u8; PUBLIC_KEY_LENGTH] {
        self.0.as_bytes()
    }

    /// Construct a public key from a slice of bytes.
    ///
    /// Will return None if the bytes are not a valid curve point.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let public = match PublicKey::from_bytes(bytes) {
            Ok(public) => public,
            Err(_) => return None,
        };

        Some(EciesPublicKey(public))
    }

    /// Derive a public key from a secret key
    pub fn from_secret(sk: &SecretKey) -> Self {
        let point = &Scalar::from_bits(sk.to_bytes()) * &constants::ED25519_BASEPOINT_TABLE;
        let public = PublicKey::from_bytes(&point.compress().to_bytes()).unwrap();
        EciesPublicKey(public)
    }

    /// Get the Edwards Point for this public key
    fn as_point(&self) -> EdwardsPoint {
        // Validated at construction, decompression cannot fail here
        CompressedEdwardsY::from_slice(self.0.as_bytes())
            .decompress()
            .unwrap()
    }
}

impl AsRef<[u8]> for EciesPublicKey {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl FromHex for EciesPublicKey {
    type Error = Error;

    fn from_hex<T: AsRef<[u8]>>(hex: T) -> Result<Self, Self::Error> {
        let bytes = hex::decode(hex)?;
        EciesPublicKey::from_bytes(&bytes).ok_or(Error::MalformedPublicKey)
    }
}

/// An ed25519 Secret Key meant for use in ECIES
///
/// Deliberately has no Debug impl so it cannot leak into log output.
pub struct EciesSecretKey(SecretKey);

impl EciesSecretKey {
    /// Convert this secret key to a byte array.
    #[inline]
    pub fn to_bytes(&self) -> [u8; ed25519_dalek::SECRET_KEY_LENGTH] {
        self.0.to_bytes()
    }

    /// View this secret key as a byte array.
    #[inline]
    pub fn as_bytes<'a>(&'a self) -> &'a [u8; ed25519_dalek::SECRET_KEY_LENGTH] {
        self.0.as_bytes()
    }

    /// Construct a secret key from a slice of bytes.
    ///
    /// Will return None if the slice is not exactly 32 bytes.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match SecretKey::from_bytes(bytes) {
            Ok(secret) => Some(EciesSecretKey(secret)),
            Err(_) => None,
        }
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> EciesPublicKey {
        EciesPublicKey::from_secret(&self.0)
    }
}

impl Clone for EciesSecretKey {
    fn clone(&self) -> Self {
        // 32 bytes in, 32 bytes out, cannot fail
        EciesSecretKey(SecretKey::from_bytes(self.0.as_bytes()).unwrap())
    }
}

/// Generate a keypair, ready for use in ECIES.
///
/// Fails only when the OS entropy source does, which is fatal and
/// non-retriable for the election being created.
pub fn generate_keypair() -> Result<(EciesSecretKey, EciesPublicKey), Error> {
    let mut bytes = [0u8; ed25519_dalek::SECRET_KEY_LENGTH];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| Error::EntropyFailure)?;

    let secret = SecretKey::from_bytes(&bytes).map_err(|_| Error::EntropyFailure)?;
    let public = EciesPublicKey::from_secret(&secret);
    Ok((EciesSecretKey(secret), public))
}

/// Encrypt a message using ECIES, it can only be decrypted by the receiver's secret key.
///
/// Returns the ephemeral public key, the AES nonce, and the ciphertext as
/// separate parts so callers can serialize them as structured fields.
pub fn encrypt(
    receiver_pub: &EciesPublicKey,
    msg: &[u8],
) -> Result<(EciesPublicKey, [u8; NONCE_LENGTH], Vec<u8>), Error> {
    let (ephemeral_sk, ephemeral_pk) = generate_keypair()?;

    let aes_key = encapsulate(&ephemeral_sk.0, receiver_pub);

    let mut nonce = [0u8; NONCE_LENGTH];
    thread_rng().fill(&mut nonce);

    let ciphertext = aes_encrypt(&aes_key, &nonce, msg)?;

    Ok((ephemeral_pk, nonce, ciphertext))
}

/// Decrypt an ECIES encrypted ciphertext using the receiver's secret key.
pub fn decrypt(
    receiver_sec: &EciesSecretKey,
    ephemeral_pub: &EciesPublicKey,
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, Error> {
    if nonce.len() != NONCE_LENGTH {
        return Err(Error::DecryptionFailed);
    }

    let aes_key = decapsulate(&receiver_sec.0, ephemeral_pub);
    aes_decrypt(&aes_key, nonce, ciphertext)
}

fn hkdf_sha256(master: &[u8]) -> AesKey {
    let h = hkdf::Hkdf::<Sha256>::new(None, master);
    let mut out = [0u8; 32];
    // Only fails if the output is too long for the hash, 32 bytes is fine
    h.expand(&[], &mut out).unwrap();
    out
}

fn generate_shared(secret: &SecretKey, public: &EciesPublicKey) -> SharedSecret {
    let public = public.as_point();
    let secret = Scalar::from_bits(secret.to_bytes());
    let shared_point = public * secret;
    let shared_point = shared_point.compress();
    shared_point.as_bytes().to_owned()
}

fn encapsulate(ephemeral_sk: &SecretKey, peer_pk: &EciesPublicKey) -> AesKey {
    let shared_point = generate_shared(ephemeral_sk, peer_pk);

    let ephemeral_pk = EciesPublicKey::from_secret(ephemeral_sk);

    let mut master = Vec::with_capacity(32 * 2);
    master.extend(ephemeral_pk.0.as_bytes().iter());
    master.extend(shared_point.iter());
    hkdf_sha256(master.as_slice())
}

fn decapsulate(sk: &SecretKey, ephemeral_pk: &EciesPublicKey) -> AesKey {
    let shared_point = generate_shared(sk, ephemeral_pk);

    let mut master = Vec::with_capacity(32 * 2);
    master.extend(ephemeral_pk.0.as_bytes().iter());
    master.extend(shared_point.iter());

    hkdf_sha256(master.as_slice())
}

fn aes_encrypt(key: &AesKey, nonce: &[u8; NONCE_LENGTH], msg: &[u8]) -> Result<Vec<u8>, Error> {
    let aead = Aes256Gcm::new(GenericArray::from_slice(key));
    let nonce = GenericArray::from_slice(nonce);

    aead.encrypt(nonce, msg).map_err(|_| Error::EncryptionFailed)
}

fn aes_decrypt(key: &AesKey, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    let aead = Aes256Gcm::new(GenericArray::from_slice(key));
    let nonce = GenericArray::from_slice(nonce);

    aead.decrypt(nonce, ciphertext)
        .map_err(|_| Error::DecryptionFailed)
}
