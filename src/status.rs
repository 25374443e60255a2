//! Member status and the `supersedes` partial order (§3 DATA MODEL).

use std::collections::BTreeSet;

use crate::node::{Incarnation, Node};

/// Tagged variant describing a peer's last known liveness state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Alive {
        incarnation: Incarnation,
    },
    Suspect {
        incarnation: Incarnation,
        suspected_by: BTreeSet<Node>,
    },
    Unreachable {
        incarnation: Incarnation,
    },
    /// Terminal. Once `Dead`, a member must never transition to any other
    /// status (§3 invariant 3).
    Dead,
}

impl Status {
    pub fn incarnation(&self) -> Option<Incarnation> {
        match self {
            Status::Alive { incarnation }
            | Status::Suspect { incarnation, .. }
            | Status::Unreachable { incarnation } => Some(*incarnation),
            Status::Dead => None,
        }
    }

    /// `Alive < Suspect < Unreachable < Dead`.
    fn rank(&self) -> u8 {
        match self {
            Status::Alive { .. } => 0,
            Status::Suspect { .. } => 1,
            Status::Unreachable { .. } => 2,
            Status::Dead => 3,
        }
    }

    pub fn is_suspect(&self) -> bool {
        matches!(self, Status::Suspect { .. })
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, Status::Dead)
    }

    /// Strict partial order used to drop stale updates. `self.supersedes(other)`
    /// holds when `self` is a strictly newer/stronger report than `other`.
    pub fn supersedes(&self, other: &Status) -> bool {
        match (self, other) {
            (Status::Dead, Status::Dead) => false,
            (Status::Dead, _) => true,
            (_, Status::Dead) => false,
            _ => {
                let (a_inc, b_inc) = (self.incarnation().unwrap(), other.incarnation().unwrap());
                if a_inc != b_inc {
                    return a_inc > b_inc;
                }
                let (a_rank, b_rank) = (self.rank(), other.rank());
                if a_rank != b_rank {
                    return a_rank > b_rank;
                }
                if let (
                    Status::Suspect {
                        suspected_by: a_by, ..
                    },
                    Status::Suspect {
                        suspected_by: b_by, ..
                    },
                ) = (self, other)
                {
                    return a_by.is_superset(b_by) && a_by.len() > b_by.len();
                }
                false
            }
        }
    }
}
