use crate::*;
use std::collections::BTreeMap;

/// The ballot-storage contract the API layer must satisfy.
///
/// The store enforces the at-most-one-ballot-per-voter invariant at
/// acceptance time, and hands the full ordered ballot set back to the close
/// flow. Persisting a `TallyResult` and flipping the election inactive must
/// happen in one transaction as observed by any reader; that atomicity is the
/// implementer's responsibility.
pub trait BallotStore {
    /// Accept a ballot. Rejects a second ballot from the same voter with
    /// `AlreadyVoted`.
    fn cast(&mut self, ballot: CastBallot) -> Result<(), Error>;

    /// All stored ballots for an election, in acceptance order.
    fn ballots(&self, election_id: &str) -> Vec<CastBallot>;
}

/// A simple store that uses an in-memory BTreeMap
#[derive(Default, Clone)]
pub struct MemStore {
    inner: BTreeMap<String, Vec<CastBallot>>,
}

impl BallotStore for MemStore {
    fn cast(&mut self, ballot: CastBallot) -> Result<(), Error> {
        let ballots = self.inner.entry(ballot.election_id.clone()).or_default();

        if ballots.iter().any(|b| b.voter == ballot.voter) {
            return Err(Error::AlreadyVoted(ballot.voter));
        }

        ballots.push(ballot);
        Ok(())
    }

    fn ballots(&self, election_id: &str) -> Vec<CastBallot> {
        self.inner.get(election_id).cloned().unwrap_or_default()
    }
}
