use crate::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Version tag carried by every encrypted ballot so it can be decrypted later
/// without guessing parameters.
pub const ENCRYPTION_VERSION: &str = "ecies-ed25519-aes256gcm/v1";

/// A voter's plaintext candidate selection.
///
/// Serialized to JSON bytes before encryption. Hashmaps are not allowed in
/// the properties because their unstable ordering leads to non-determinism.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Ballot {
    /// Name of the selected candidate, the tally aggregation key
    pub candidate: String,

    /// Application specific properties.
    #[serde(default)]
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, serde_json::Value>,
}

impl Ballot {
    pub fn new<S: Into<String>>(candidate: S) -> Self {
        Ballot {
            candidate: candidate.into(),
            properties: IndexMap::new(),
        }
    }

    /// Check the selection against the declared candidate list.
    ///
    /// A selection outside the list is classified as an invalid ballot, never
    /// tallied under a fabricated bucket.
    pub fn validate(&self, candidates: &[Candidate]) -> Result<(), Error> {
        if candidates.iter().any(|c| c.name == self.candidate) {
            Ok(())
        } else {
            Err(Error::AmbiguousCandidate(self.candidate.clone()))
        }
    }

    /// Encrypt this ballot under the election public key.
    pub fn encrypt(&self, election_key: &EciesPublicKey) -> Result<EncryptedBallot, Error> {
        let plaintext = serde_json::to_vec(self)?;
        let (ephemeral_public, nonce, ciphertext) =
            crate::ecies_ed25519::encrypt(election_key, &plaintext)?;

        Ok(EncryptedBallot {
            ephemeral_public,
            nonce: nonce.to_vec(),
            ciphertext,
            version: ENCRYPTION_VERSION.to_string(),
        })
    }
}

/// An encrypted ballot, opaque to the storage layer.
///
/// All byte fields are hex at the serde boundary so collaborators can store
/// them as text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EncryptedBallot {
    #[serde(with = "EciesPublicKeyHex")]
    pub ephemeral_public: EciesPublicKey,

    #[serde(with = "hex_serde")]
    pub nonce: Vec<u8>,

    #[serde(with = "hex_serde")]
    pub ciphertext: Vec<u8>,

    pub version: String,
}

impl EncryptedBallot {
    /// Decrypt with the election secret key.
    ///
    /// Any mismatch - wrong key, tampered ciphertext, bad nonce, unknown
    /// version, unparseable payload - comes back as `DecryptionFailed`.
    /// Callers tallying many ballots must treat this as per-ballot, not fatal.
    pub fn decrypt(&self, election_secret: &EciesSecretKey) -> Result<Ballot, Error> {
        if self.version != ENCRYPTION_VERSION {
            return Err(Error::DecryptionFailed);
        }

        let plaintext = crate::ecies_ed25519::decrypt(
            election_secret,
            &self.ephemeral_public,
            &self.nonce,
            &self.ciphertext,
        )?;

        serde_json::from_slice(&plaintext).map_err(|_| Error::DecryptionFailed)
    }
}

/// A stored ballot as the storage collaborator hands it back at close.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CastBallot {
    pub election_id: String,

    /// Textual voter identifier, used for the double-vote check and audit log
    pub voter: String,

    pub ballot: EncryptedBallot,

    /// Sibling hashes proving whitelist membership, required iff the
    /// election is private
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merkle_proof: Option<Vec<NodeHash>>,

    pub cast_at: DateTime<Utc>,
}
