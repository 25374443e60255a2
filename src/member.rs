//! The member table: the authoritative local view of the cluster (§4.1).

use std::collections::HashMap;

use crate::node::Node;
use crate::status::Status;

/// `{ peer, status, protocol_period, suspicion_started_at_nanos? }` (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub peer: Node,
    pub status: Status,
    pub protocol_period: u64,
    pub suspicion_started_at_nanos: Option<u64>,
}

/// Outcome of a `mark` write, surfaced for observability (§7).
#[derive(Debug, Clone)]
pub enum MarkDirective {
    Applied {
        previous: Option<Status>,
        current: Status,
    },
    IgnoredDueToOlderStatus(Status),
}

pub struct MemberTable {
    members: HashMap<Node, Member>,
    max_independent_suspicions: usize,
}

impl MemberTable {
    pub fn new(max_independent_suspicions: usize) -> Self {
        MemberTable {
            members: HashMap::new(),
            max_independent_suspicions,
        }
    }

    pub fn get(&self, node: &Node) -> Option<&Member> {
        self.members.get(node)
    }

    pub fn status_of(&self, node: &Node) -> Option<&Status> {
        self.members.get(node).map(|m| &m.status)
    }

    pub fn is_member(&self, node: &Node) -> bool {
        self.members.contains_key(node)
    }

    pub fn all_members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn suspects(&self) -> impl Iterator<Item = &Member> {
        self.members.values().filter(|m| m.status.is_suspect())
    }

    pub fn other_member_count(&self, exclude: &Node) -> usize {
        self.members.len() - usize::from(self.is_member(exclude))
    }

    /// The single write path for the member table (§4.1 `mark`). Does not
    /// touch the probe scheduler or gossip buffer; callers (the protocol
    /// engine) layer those side effects on top, see `ProtocolEngine::mark`.
    pub fn apply(
        &mut self,
        peer: Node,
        incoming: Status,
        now_nanos: u64,
        protocol_period_now: u64,
    ) -> MarkDirective {
        let previous = self.members.get(&peer).map(|m| m.status.clone());

        let mut incoming = incoming;
        let mut carried_suspicion_start = None;
        let mut carried_protocol_period = None;

        if let Status::Suspect {
            incarnation: inc_new,
            suspected_by: by_new,
        } = &incoming
        {
            if let Some(Status::Suspect {
                incarnation: inc_prev,
                suspected_by: by_prev,
            }) = &previous
            {
                if inc_new == inc_prev {
                    let mut merged = by_prev.clone();
                    for node in by_new.iter() {
                        if merged.len() >= self.max_independent_suspicions {
                            break;
                        }
                        merged.insert(*node);
                    }
                    incoming = Status::Suspect {
                        incarnation: *inc_new,
                        suspected_by: merged,
                    };
                    if let Some(existing) = self.members.get(&peer) {
                        carried_suspicion_start = existing.suspicion_started_at_nanos;
                        carried_protocol_period = Some(existing.protocol_period);
                    }
                }
            }
        }

        let suspicion_started_at_nanos = match carried_suspicion_start {
            Some(started) => Some(started),
            None if incoming.is_suspect() => Some(now_nanos),
            None => None,
        };

        if let Some(prev) = &previous {
            if prev.supersedes(&incoming) {
                return MarkDirective::IgnoredDueToOlderStatus(prev.clone());
            }
        }

        let protocol_period = carried_protocol_period.unwrap_or(protocol_period_now);
        let member = Member {
            peer,
            status: incoming.clone(),
            protocol_period,
            suspicion_started_at_nanos,
        };
        self.members.insert(peer, member);
        MarkDirective::Applied {
            previous,
            current: incoming,
        }
    }

    /// Removes a member outright. Used only for test setup; the engine
    /// itself never drops a row once created (§3: dead members are retained
    /// for continued gossip).
    #[cfg(test)]
    pub fn remove_for_test(&mut self, node: &Node) {
        self.members.remove(node);
    }
}
