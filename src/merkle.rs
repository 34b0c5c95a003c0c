//! Merkle-tree eligibility for private elections.
//!
//! The whitelist of voter identifiers is hashed into leaves, the leaves into a
//! binary tree, and only the root is published. A voter proves membership with
//! the sibling hashes along their path; verification recomputes the root and
//! never needs the whitelist itself.
//!
//! Sibling pairs are sorted byte-wise before hashing, so neither proof
//! generation nor verification has to track left/right positions. When a level
//! has an odd number of nodes the last node is promoted to the next level
//! unpaired; build and verify agree on this rule.

use crate::Error;
use sha2::{Digest, Sha256};
use std::fmt;

/// A single SHA-256 node hash, hex-encoded at the serde boundary.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct NodeHash(pub [u8; 32]);

impl NodeHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, Error> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != 32 {
            return Err(Error::BadHashLength);
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(NodeHash(out))
    }
}

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl serde::Serialize for NodeHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> serde::Deserialize<'de> for NodeHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        NodeHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash a voter identifier into a leaf.
///
/// Takes already-decoded raw address bytes; decoding the textual address
/// representation is the caller's job.
pub fn hash_leaf(voter_bytes: &[u8]) -> NodeHash {
    let mut hasher = Sha256::new();
    hasher.update(voter_bytes);
    NodeHash(hasher.finalize().into())
}

/// Combine two sibling hashes: sort byte-wise, concatenate, hash.
fn hash_pair(a: &NodeHash, b: &NodeHash) -> NodeHash {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

    let mut hasher = Sha256::new();
    hasher.update(lo.as_bytes());
    hasher.update(hi.as_bytes());
    NodeHash(hasher.finalize().into())
}

/// A full Merkle tree over a whitelist.
///
/// The whole structure (root, leaves, every intermediate layer) is persisted
/// as one snapshot, so proofs can be generated later without re-deriving the
/// leaves. Once computed for an activation the snapshot is immutable; a
/// changed whitelist only takes effect through a fresh build on reactivation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MerkleTree {
    pub root: NodeHash,
    pub leaves: Vec<NodeHash>,
    pub layers: Vec<Vec<NodeHash>>,
}

impl MerkleTree {
    /// Build a tree from ordered leaf hashes.
    pub fn build(leaves: Vec<NodeHash>) -> Result<Self, Error> {
        if leaves.is_empty() {
            return Err(Error::EmptyWhitelist);
        }

        let mut layers = vec![leaves.clone()];
        let mut current = leaves.clone();

        while current.len() > 1 {
            let mut next = Vec::with_capacity((current.len() + 1) / 2);
            for pair in current.chunks(2) {
                match pair {
                    [a, b] => next.push(hash_pair(a, b)),
                    [a] => next.push(*a), // odd node promoted unpaired
                    _ => unreachable!(),
                }
            }
            layers.push(next.clone());
            current = next;
        }

        let root = current[0];
        Ok(MerkleTree {
            root,
            leaves,
            layers,
        })
    }

    /// Build a tree by hashing each whitelisted voter's raw address bytes.
    pub fn from_whitelist<T: AsRef<[u8]>>(whitelist: &[T]) -> Result<Self, Error> {
        let leaves = whitelist.iter().map(|w| hash_leaf(w.as_ref())).collect();
        MerkleTree::build(leaves)
    }

    pub fn root(&self) -> NodeHash {
        self.root
    }

    /// Generate the sibling hashes needed to recompute the root from a leaf.
    pub fn proof(&self, leaf: &NodeHash) -> Result<Vec<NodeHash>, Error> {
        let mut index = self
            .leaves
            .iter()
            .position(|l| l == leaf)
            .ok_or_else(|| Error::LeafNotFound(leaf.to_string()))?;

        let mut proof = Vec::new();
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = index ^ 1;
            if sibling < layer.len() {
                proof.push(layer[sibling]);
            }
            index /= 2;
        }

        Ok(proof)
    }
}

/// Recompute a candidate root from a leaf and its proof, and compare to the
/// expected root by exact byte equality.
pub fn verify_proof(leaf: &NodeHash, proof: &[NodeHash], expected_root: &NodeHash) -> bool {
    let mut running = *leaf;
    for sibling in proof {
        running = hash_pair(&running, sibling);
    }
    running == *expected_root
}

/// Membership check as an eligibility gate: a failed proof is an explicit
/// rejection, never silently treated as valid.
pub fn require_membership(
    leaf: &NodeHash,
    proof: &[NodeHash],
    expected_root: &NodeHash,
) -> Result<(), Error> {
    if verify_proof(leaf, proof, expected_root) {
        Ok(())
    } else {
        Err(Error::InvalidProof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("voter-{}", i).into_bytes()).collect()
    }

    #[test]
    fn leaf_hashing_is_deterministic() {
        assert_eq!(hash_leaf(b"alice"), hash_leaf(b"alice"));
        assert_ne!(hash_leaf(b"alice"), hash_leaf(b"bob"));
    }

    #[test]
    fn pair_hashing_is_order_independent() {
        let a = hash_leaf(b"a");
        let b = hash_leaf(b"b");
        assert_eq!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn empty_whitelist_is_an_error() {
        match MerkleTree::build(vec![]) {
            Err(Error::EmptyWhitelist) => (),
            other => panic!("expected EmptyWhitelist, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn single_leaf_tree() {
        let leaf = hash_leaf(b"only");
        let tree = MerkleTree::build(vec![leaf]).unwrap();

        assert_eq!(tree.root(), leaf);
        let proof = tree.proof(&leaf).unwrap();
        assert!(proof.is_empty());
        assert!(verify_proof(&leaf, &proof, &tree.root()));
    }

    #[test]
    fn every_whitelisted_leaf_proves_membership() {
        // Even and odd sizes, exercising the promoted-node rule
        for n in &[1, 2, 3, 4, 5, 7, 8, 16, 33] {
            let addrs = whitelist(*n);
            let tree = MerkleTree::from_whitelist(&addrs).unwrap();

            for addr in &addrs {
                let leaf = hash_leaf(addr);
                let proof = tree.proof(&leaf).unwrap();
                assert!(
                    verify_proof(&leaf, &proof, &tree.root()),
                    "proof failed for {:?} in tree of {}",
                    addr,
                    n
                );
            }
        }
    }

    #[test]
    fn construction_is_deterministic() {
        let addrs = whitelist(9);
        let a = MerkleTree::from_whitelist(&addrs).unwrap();
        let b = MerkleTree::from_whitelist(&addrs).unwrap();
        assert_eq!(a.root(), b.root());
        assert_eq!(a, b);
    }

    #[test]
    fn unlisted_address_gets_no_proof() {
        let tree = MerkleTree::from_whitelist(&whitelist(4)).unwrap();
        let outsider = hash_leaf(b"voter-99");

        match tree.proof(&outsider) {
            Err(Error::LeafNotFound(_)) => (),
            other => panic!("expected LeafNotFound, got {:?}", other),
        }
    }

    #[test]
    fn forged_proof_fails_verification() {
        let addrs = whitelist(4);
        let tree = MerkleTree::from_whitelist(&addrs).unwrap();

        // An unrelated voter reusing someone else's proof
        let stolen = tree.proof(&hash_leaf(&addrs[0])).unwrap();
        let outsider = hash_leaf(b"voter-99");
        assert!(!verify_proof(&outsider, &stolen, &tree.root()));
        assert!(require_membership(&outsider, &stolen, &tree.root()).is_err());

        // Random garbage siblings
        let garbage = vec![hash_leaf(b"x"), hash_leaf(b"y")];
        assert!(!verify_proof(&hash_leaf(&addrs[0]), &garbage, &tree.root()));
    }

    #[test]
    fn tampered_proof_fails_verification() {
        let addrs = whitelist(8);
        let tree = MerkleTree::from_whitelist(&addrs).unwrap();

        let leaf = hash_leaf(&addrs[3]);
        let mut proof = tree.proof(&leaf).unwrap();
        proof[0].0[0] ^= 0xff;

        match require_membership(&leaf, &proof, &tree.root()) {
            Err(Error::InvalidProof) => (),
            other => panic!("expected InvalidProof, got {:?}", other),
        }
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let tree = MerkleTree::from_whitelist(&whitelist(5)).unwrap();

        let json = serde_json::to_string(&tree).unwrap();
        let restored: MerkleTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, restored);

        // Proofs work off the restored snapshot without re-deriving leaves
        let leaf = hash_leaf(b"voter-2");
        let proof = restored.proof(&leaf).unwrap();
        assert!(verify_proof(&leaf, &proof, &restored.root()));
    }

    #[test]
    fn node_hash_hex_round_trip() {
        let h = hash_leaf(b"hex me");
        let restored = NodeHash::from_hex(&h.to_string()).unwrap();
        assert_eq!(h, restored);

        assert!(NodeHash::from_hex("abcd").is_err());
        assert!(NodeHash::from_hex("not hex at all").is_err());
    }
}
