use crate::*;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A candidate standing in an election.
///
/// The name is the identity key: unique within the election and used to
/// aggregate the tally.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub picture: Option<String>,
    pub manifesto: String,
}

impl Candidate {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Candidate {
            name: name.into(),
            picture: None,
            manifesto: String::new(),
        }
    }
}

/// An election record.
///
/// This is the backend-internal storage shape; it serializes the secret key
/// (hex) so the storage collaborator can persist it. Anything handed to a
/// client goes through [`Election::public_view`] instead, which never carries
/// the secret key, the whitelist, or the tree layers.
#[derive(Serialize, Deserialize, Clone)]
pub struct Election {
    pub id: String,
    pub title: String,

    /// Identifier of the creating authority; only they may close the election
    pub creator: String,

    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    pub is_private: bool,
    pub is_active: bool,

    /// Ballots are encrypted under this key by voters
    #[serde(with = "EciesPublicKeyHex")]
    pub public_key: EciesPublicKey,

    /// Held until close, readable only through [`Election::decryption_key`]
    #[serde(with = "EciesSecretKeyHex")]
    secret_key: EciesSecretKey,

    /// Ordered voter identifiers, private elections only
    pub whitelist: Vec<String>,

    pub candidates: Vec<Candidate>,

    /// Snapshot built at activation of a private election. Immutable while
    /// active; replaced wholesale on reactivation.
    pub merkle_tree: Option<MerkleTree>,

    pub created_at: DateTime<Utc>,
}

/// What a voter needs to prove eligibility: the published root and the
/// sibling hashes for their leaf.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EligibilityProof {
    pub merkle_root: NodeHash,
    pub proof: Vec<NodeHash>,
}

/// The client-facing election payload.
#[derive(Serialize, Debug, Clone)]
pub struct ElectionView {
    pub id: String,
    pub title: String,
    pub creator: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_private: bool,
    pub is_active: bool,
    #[serde(with = "EciesPublicKeyHex")]
    pub public_key: EciesPublicKey,
    pub candidates: Vec<Candidate>,
    pub merkle_root: Option<NodeHash>,
    pub created_at: DateTime<Utc>,
}

impl Election {
    /// Create a new election with a fresh encryption keypair.
    ///
    /// Elections start inactive; activating a private one builds the
    /// eligibility tree.
    pub fn new<S: Into<String>>(
        title: S,
        creator: S,
        candidates: Vec<Candidate>,
        is_private: bool,
    ) -> Result<Self, Error> {
        if candidates.is_empty() {
            return Err(Error::NoCandidates);
        }
        for (i, candidate) in candidates.iter().enumerate() {
            if candidates[..i].iter().any(|c| c.name == candidate.name) {
                return Err(Error::DuplicateCandidate(candidate.name.clone()));
            }
        }

        let (secret_key, public_key) = generate_keypair()?;

        Ok(Election {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            creator: creator.into(),
            start_time: None,
            end_time: None,
            is_private,
            is_active: false,
            public_key,
            secret_key,
            whitelist: vec![],
            candidates,
            merkle_tree: None,
            created_at: Utc::now(),
        })
    }

    /// The secret decryption key.
    ///
    /// This is the one private-key-bearing read path. It exists for the
    /// close/tally flow; nothing serving public data may call it.
    pub fn decryption_key(&self) -> &EciesSecretKey {
        &self.secret_key
    }

    /// Add a voter identifier to the whitelist.
    ///
    /// Whitelist edits never touch a published tree; they take effect on the
    /// next activation.
    pub fn add_to_whitelist<S: Into<String>>(&mut self, voter: S) {
        let voter = voter.into();
        if !self.whitelist.contains(&voter) {
            self.whitelist.push(voter);
        }
    }

    /// Remove a voter identifier from the whitelist.
    pub fn remove_from_whitelist(&mut self, voter: &str) {
        self.whitelist.retain(|v| v != voter);
    }

    /// Open the election for voting.
    ///
    /// For a private election the caller supplies the raw address bytes for
    /// each whitelisted voter, in whitelist order (decoding textual addresses
    /// is the caller's job), and a fresh eligibility tree is built from them.
    /// Reactivating replaces any earlier snapshot wholesale; there is no
    /// incremental update.
    pub fn activate<T: AsRef<[u8]>>(&mut self, whitelist_bytes: &[T]) -> Result<(), Error> {
        if self.is_private {
            self.merkle_tree = Some(MerkleTree::from_whitelist(whitelist_bytes)?);
        }
        self.is_active = true;
        Ok(())
    }

    /// Close the election to new ballots. The tree snapshot stays in place
    /// so already-issued proofs remain auditable.
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Produce an eligibility proof for a whitelisted voter.
    ///
    /// Works entirely off the stored snapshot. Unlisted voters get
    /// `LeafNotFound`, never a valid proof.
    pub fn eligibility_proof(&self, voter_bytes: &[u8]) -> Result<EligibilityProof, Error> {
        let tree = self.merkle_tree.as_ref().ok_or(Error::TreeNotBuilt)?;

        let leaf = hash_leaf(voter_bytes);
        let proof = tree.proof(&leaf)?;

        Ok(EligibilityProof {
            merkle_root: tree.root(),
            proof,
        })
    }

    /// Gate a ballot submission.
    ///
    /// For private elections this recomputes the root from the voter's leaf
    /// and proof and compares it to the published root. Double-vote
    /// prevention is the ballot store's job, not this check's.
    pub fn accept_ballot(
        &self,
        voter_bytes: &[u8],
        proof: Option<&[NodeHash]>,
    ) -> Result<(), Error> {
        if !self.is_active {
            return Err(Error::ElectionClosed);
        }

        if self.is_private {
            let tree = self.merkle_tree.as_ref().ok_or(Error::TreeNotBuilt)?;
            let proof = proof.ok_or(Error::ProofRequired)?;

            let leaf = hash_leaf(voter_bytes);
            require_membership(&leaf, proof, &tree.root())?;
        }

        Ok(())
    }

    /// Close the election: decrypt and tally every stored ballot, then flip
    /// to inactive.
    ///
    /// One logical close happens per election; persisting the returned result
    /// together with the deactivated election is the storage collaborator's
    /// transaction. Closing an already-closed election is rejected.
    pub fn close(
        &mut self,
        ballots: &[CastBallot],
        closed_at: DateTime<Utc>,
    ) -> Result<TallyResult, Error> {
        if !self.is_active {
            return Err(Error::ElectionClosed);
        }

        let result = TallyResult::tally(
            &self.id,
            ballots,
            &self.secret_key,
            &self.candidates,
            closed_at,
        )?;

        self.is_active = false;
        Ok(result)
    }

    /// The serializable shape handed to clients.
    pub fn public_view(&self) -> ElectionView {
        ElectionView {
            id: self.id.clone(),
            title: self.title.clone(),
            creator: self.creator.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            is_private: self.is_private,
            is_active: self.is_active,
            public_key: self.public_key.clone(),
            candidates: self.candidates.clone(),
            merkle_root: self.merkle_tree.as_ref().map(|t| t.root()),
            created_at: self.created_at,
        }
    }
}
