// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-request voting state machine.
//!
//! Every agent replica that receives a request opens an [`Election`] and
//! broadcasts a random [`Vote`]. Until the showdown deadline it compares
//! incoming peer votes against its own: a strictly higher peer vote folds the
//! election, anything else is called. A replica that is still voting when the
//! showdown fires becomes the executor. Equal votes mean both replicas
//! execute; with 128 random bits per vote that case is not handled.
//!
//! The state machine is pure: transitions mutate the state and report what
//! happened, and the dispatcher turns those reports into bus publishes,
//! metric increments, and timer bookkeeping.

use crate::event::Request;
use serde::{Deserialize, Serialize};

/// A replica's bid for executing one request.
///
/// 128 random bits rendered as the canonical lowercase hyphenated form.
/// Votes are totally ordered by lexicographic comparison of that rendering;
/// the highest vote wins.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vote(String);

impl Vote {
    /// Cast a fresh random vote.
    pub fn cast() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap a vote string received from a peer.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Vote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Election lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionState {
    /// Own vote is out, showdown timer armed.
    Voting,
    /// A higher peer vote was seen; this replica yields.
    Folded,
    /// Showdown passed without a higher vote; the child process runs.
    Executing,
    /// Terminal; the record can be dropped.
    Done,
}

crate::simple_display! {
    ElectionState {
        Voting => "voting",
        Folded => "folded",
        Executing => "executing",
        Done => "done",
    }
}

/// What a peer vote did to the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerVote {
    /// Peer vote was not higher; stay in the race.
    Call,
    /// Peer vote was higher; election folded.
    Fold,
    /// Election already decided; vote had no effect.
    Ignored,
}

/// One in-flight election: the original request, this replica's vote, and
/// the machine state.
#[derive(Debug, Clone)]
pub struct Election {
    vote: Vote,
    state: ElectionState,
    request: Request,
}

impl Election {
    /// Open an election for a request with a fresh random vote.
    pub fn open(request: Request) -> Self {
        Self::with_vote(request, Vote::cast())
    }

    /// Open an election with a caller-supplied vote.
    pub fn with_vote(request: Request, vote: Vote) -> Self {
        Self { vote, state: ElectionState::Voting, request }
    }

    pub fn vote(&self) -> &Vote {
        &self.vote
    }

    pub fn state(&self) -> ElectionState {
        self.state
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Compare a peer's vote against our own.
    ///
    /// Folding is decided by strict comparison: a peer vote equal to our own
    /// is a call, so both replicas may execute.
    pub fn peer_vote(&mut self, peer: &Vote) -> PeerVote {
        match self.state {
            ElectionState::Voting => {
                if self.vote < *peer {
                    self.state = ElectionState::Folded;
                    PeerVote::Fold
                } else {
                    PeerVote::Call
                }
            }
            _ => PeerVote::Ignored,
        }
    }

    /// Showdown deadline reached. Returns true exactly when this call moved
    /// the election into `Executing`; the caller must then run the request.
    pub fn showdown(&mut self) -> bool {
        if self.state == ElectionState::Voting {
            self.state = ElectionState::Executing;
            true
        } else {
            false
        }
    }

    /// The child process has started. Returns false when the election was
    /// not in `Executing`, which the caller should log as an anomaly.
    pub fn spawned(&self) -> bool {
        self.state == ElectionState::Executing
    }

    /// Terminal transition once the executed request has completed.
    pub fn finish(&mut self) {
        self.state = ElectionState::Done;
    }
}

#[cfg(test)]
#[path = "voting_tests.rs"]
mod tests;
