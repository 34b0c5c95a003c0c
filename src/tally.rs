use crate::*;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::warn;
use std::collections::HashSet;

/// Per-candidate line in a tally, in result order (votes descending, ties in
/// declared candidate order).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CandidateTotal {
    pub candidate: String,
    pub votes: u64,
    /// Share of valid ballots, 0.0 when no ballot was valid. Not rounded at
    /// this layer.
    pub percentage: f64,
}

/// One successfully decrypted ballot, for audit only - never re-displayed on
/// the public tally surface.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub voter: String,
    pub selection: String,
    pub cast_at: DateTime<Utc>,
}

/// The outcome of closing an election. Created once at close, immutable
/// thereafter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TallyResult {
    pub election_id: String,

    /// Ballots that decrypted and named a declared candidate
    pub total_votes: u64,

    /// Undecryptable or unknown-candidate ballots, so operators can spot
    /// mass corruption
    pub excluded: u64,

    pub totals: Vec<CandidateTotal>,

    /// Every candidate tied at the maximum count, in declared order. Empty
    /// when no valid ballot was cast.
    pub winners: Vec<String>,

    pub closed_at: DateTime<Utc>,

    /// Decrypted ballots in processing order
    pub audit_log: Vec<AuditRecord>,
}

impl TallyResult {
    /// Decrypt and aggregate a full ballot set.
    ///
    /// A pure function of its inputs: `closed_at` is supplied by the caller,
    /// so re-running over the same ballot set yields an identical result.
    ///
    /// Per-ballot failures are recovered locally: a ballot that will not
    /// decrypt, or that names a candidate outside the declared list, is
    /// logged and excluded - it never aborts the tally. A ballot set that
    /// contains the same voter twice violates the acceptance invariant and
    /// is rejected outright rather than silently picking one ballot.
    pub fn tally(
        election_id: &str,
        ballots: &[CastBallot],
        election_secret: &EciesSecretKey,
        candidates: &[Candidate],
        closed_at: DateTime<Utc>,
    ) -> Result<Self, Error> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(ballots.len());
        for cast in ballots {
            if !seen.insert(&cast.voter) {
                return Err(Error::DuplicateVoter(cast.voter.clone()));
            }
        }

        // Seeded from the declared list so every candidate appears, in
        // declared order, even with zero votes
        let mut counts: IndexMap<&str, u64> = candidates
            .iter()
            .map(|c| (c.name.as_str(), 0u64))
            .collect();

        let mut excluded = 0u64;
        let mut audit_log = Vec::with_capacity(ballots.len());

        for cast in ballots {
            let ballot = match cast.ballot.decrypt(election_secret) {
                Ok(ballot) => ballot,
                Err(_) => {
                    warn!(
                        "election {}: skipping undecryptable ballot from {}",
                        election_id, cast.voter
                    );
                    excluded += 1;
                    continue;
                }
            };

            match ballot.validate(candidates) {
                Ok(()) => (),
                Err(Error::AmbiguousCandidate(name)) => {
                    warn!(
                        "election {}: skipping ballot from {} for unknown candidate {}",
                        election_id, cast.voter, name
                    );
                    excluded += 1;
                    continue;
                }
                Err(err) => return Err(err),
            }

            // Validated above, the key is present
            if let Some(count) = counts.get_mut(ballot.candidate.as_str()) {
                *count += 1;
            }

            audit_log.push(AuditRecord {
                voter: cast.voter.clone(),
                selection: ballot.candidate,
                cast_at: cast.cast_at,
            });
        }

        let total_votes: u64 = counts.values().sum();

        let mut totals: Vec<CandidateTotal> = counts
            .into_iter()
            .map(|(candidate, votes)| CandidateTotal {
                candidate: candidate.to_string(),
                votes,
                percentage: if total_votes == 0 {
                    0.0
                } else {
                    100.0 * votes as f64 / total_votes as f64
                },
            })
            .collect();

        // Stable sort: equal counts keep declared candidate order
        totals.sort_by(|a, b| b.votes.cmp(&a.votes));

        let winners = if total_votes == 0 {
            vec![]
        } else {
            let max_votes = totals[0].votes;
            totals
                .iter()
                .take_while(|t| t.votes == max_votes)
                .map(|t| t.candidate.clone())
                .collect()
        };

        Ok(TallyResult {
            election_id: election_id.to_string(),
            total_votes,
            excluded,
            totals,
            winners,
            closed_at,
            audit_log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate::new("Ada Lovelace"),
            Candidate::new("Alan Turing"),
            Candidate::new("Grace Hopper"),
        ]
    }

    fn cast(
        voter: &str,
        candidate: &str,
        public: &EciesPublicKey,
        cast_at: DateTime<Utc>,
    ) -> CastBallot {
        CastBallot {
            election_id: "test".to_string(),
            voter: voter.to_string(),
            ballot: Ballot::new(candidate).encrypt(public).unwrap(),
            merkle_proof: None,
            cast_at,
        }
    }

    #[test]
    fn counts_percentages_and_winner() {
        let (secret, public) = generate_keypair().unwrap();
        let now = Utc::now();

        let ballots = vec![
            cast("v1", "Alan Turing", &public, now),
            cast("v2", "Alan Turing", &public, now),
            cast("v3", "Ada Lovelace", &public, now),
            cast("v4", "Alan Turing", &public, now),
        ];

        let result = TallyResult::tally("test", &ballots, &secret, &candidates(), now).unwrap();

        assert_eq!(result.total_votes, 4);
        assert_eq!(result.excluded, 0);
        assert_eq!(result.winners, vec!["Alan Turing"]);

        assert_eq!(result.totals[0].candidate, "Alan Turing");
        assert_eq!(result.totals[0].votes, 3);
        assert!((result.totals[0].percentage - 75.0).abs() < f64::EPSILON);

        assert_eq!(result.totals[1].candidate, "Ada Lovelace");
        assert_eq!(result.totals[2].candidate, "Grace Hopper");
        assert_eq!(result.totals[2].votes, 0);
        assert_eq!(result.totals[2].percentage, 0.0);

        // Audit log is in ballot-processing order
        let voters: Vec<&str> = result.audit_log.iter().map(|r| r.voter.as_str()).collect();
        assert_eq!(voters, vec!["v1", "v2", "v3", "v4"]);
        assert_eq!(result.audit_log[2].selection, "Ada Lovelace");
    }

    #[test]
    fn ties_keep_declared_candidate_order() {
        let (secret, public) = generate_keypair().unwrap();
        let now = Utc::now();

        // A, A, B, B, C with declared order [Ada, Alan, Grace]
        let ballots = vec![
            cast("v1", "Ada Lovelace", &public, now),
            cast("v2", "Ada Lovelace", &public, now),
            cast("v3", "Alan Turing", &public, now),
            cast("v4", "Alan Turing", &public, now),
            cast("v5", "Grace Hopper", &public, now),
        ];

        let result = TallyResult::tally("test", &ballots, &secret, &candidates(), now).unwrap();

        assert_eq!(result.total_votes, 5);
        assert_eq!(result.winners, vec!["Ada Lovelace", "Alan Turing"]);
        assert_eq!(result.totals[0].candidate, "Ada Lovelace");
        assert_eq!(result.totals[1].candidate, "Alan Turing");
        assert_eq!(result.totals[2].candidate, "Grace Hopper");
    }

    #[test]
    fn corrupt_ballot_is_excluded_not_fatal() {
        let (secret, public) = generate_keypair().unwrap();
        let now = Utc::now();

        let mut ballots = vec![
            cast("v1", "Ada Lovelace", &public, now),
            cast("v2", "Ada Lovelace", &public, now),
            cast("v3", "Alan Turing", &public, now),
            cast("v4", "Grace Hopper", &public, now),
            cast("v5", "Ada Lovelace", &public, now),
        ];
        ballots[1].ballot.ciphertext[0] ^= 0xff;

        let result = TallyResult::tally("test", &ballots, &secret, &candidates(), now).unwrap();

        assert_eq!(result.total_votes, 4);
        assert_eq!(result.excluded, 1);
        assert_eq!(result.audit_log.len(), 4);
        assert_eq!(result.winners, vec!["Ada Lovelace"]);
    }

    #[test]
    fn unknown_candidate_ballot_is_excluded() {
        let (secret, public) = generate_keypair().unwrap();
        let now = Utc::now();

        let ballots = vec![
            cast("v1", "Ada Lovelace", &public, now),
            cast("v2", "Charles Babbage", &public, now),
        ];

        let result = TallyResult::tally("test", &ballots, &secret, &candidates(), now).unwrap();

        assert_eq!(result.total_votes, 1);
        assert_eq!(result.excluded, 1);
        // No fabricated bucket
        assert!(result.totals.iter().all(|t| t.candidate != "Charles Babbage"));
        assert_eq!(result.audit_log.len(), 1);
    }

    #[test]
    fn empty_ballot_set_tallies_to_zero() {
        let (secret, _) = generate_keypair().unwrap();
        let now = Utc::now();

        let result = TallyResult::tally("test", &[], &secret, &candidates(), now).unwrap();

        assert_eq!(result.total_votes, 0);
        assert_eq!(result.excluded, 0);
        assert!(result.winners.is_empty());
        assert!(result.totals.iter().all(|t| t.percentage == 0.0));
        // Declared order preserved when nothing separates the candidates
        assert_eq!(result.totals[0].candidate, "Ada Lovelace");
    }

    #[test]
    fn duplicate_voter_rejects_the_ballot_set() {
        let (secret, public) = generate_keypair().unwrap();
        let now = Utc::now();

        let ballots = vec![
            cast("v1", "Ada Lovelace", &public, now),
            cast("v1", "Alan Turing", &public, now),
        ];

        match TallyResult::tally("test", &ballots, &secret, &candidates(), now) {
            Err(Error::DuplicateVoter(voter)) => assert_eq!(voter, "v1"),
            _ => panic!("expected DuplicateVoter"),
        }
    }

    #[test]
    fn tally_is_idempotent() {
        let (secret, public) = generate_keypair().unwrap();
        let now = Utc::now();

        let ballots = vec![
            cast("v1", "Ada Lovelace", &public, now),
            cast("v2", "Alan Turing", &public, now),
            cast("v3", "Alan Turing", &public, now),
        ];

        let first = TallyResult::tally("test", &ballots, &secret, &candidates(), now).unwrap();
        let second = TallyResult::tally("test", &ballots, &secret, &candidates(), now).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
