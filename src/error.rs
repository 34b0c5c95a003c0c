use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("solavote: whitelist is empty - cannot build eligibility tree")]
    EmptyWhitelist,

    #[error("solavote: leaf {0} is not part of the eligibility tree")]
    LeafNotFound(String),

    #[error("solavote: merkle proof does not reconstruct the published root")]
    InvalidProof,

    #[error("solavote: private election has no eligibility tree")]
    TreeNotBuilt,

    #[error("solavote: merkle proof required for private elections")]
    ProofRequired,

    #[error("solavote: failed to decrypt ballot")]
    DecryptionFailed,

    #[error("solavote: failed to encrypt ballot")]
    EncryptionFailed,

    #[error("solavote: could not obtain secure randomness for keypair generation")]
    EntropyFailure,

    #[error("solavote: decrypted ballot names unknown candidate {0}")]
    AmbiguousCandidate(String),

    #[error("solavote: voter {0} appears more than once in the ballot set")]
    DuplicateVoter(String),

    #[error("solavote: voter {0} has already cast a ballot in this election")]
    AlreadyVoted(String),

    #[error("solavote: candidate {0} is declared more than once")]
    DuplicateCandidate(String),

    #[error("solavote: election must declare at least one candidate")]
    NoCandidates,

    #[error("solavote: election is not active")]
    ElectionClosed,

    #[error("solavote: invalid hexadecimal: {0}")]
    BadHex(#[from] hex::FromHexError),

    #[error("solavote: wrong length for a 32-byte hash")]
    BadHashLength,

    #[error("solavote: malformed public key")]
    MalformedPublicKey,

    #[error("solavote: JSON error serializing ballot: {0}")]
    JSONSerialization(#[from] serde_json::Error),
}
