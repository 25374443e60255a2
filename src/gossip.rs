//! Piggybacked gossip dissemination with per-entry decay (§4.4).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::member::Member;
use crate::node::Node;
#[cfg(test)]
use crate::status::Status;

/// `{ member, gossip_count }` (§3).
#[derive(Debug, Clone)]
pub struct Gossip {
    pub member: Member,
    pub gossip_count: u32,
}

/// The wire-level contract for piggybacked membership updates (§6).
#[derive(Debug, Clone)]
pub enum GossipPayload {
    None,
    Membership(Vec<Member>),
}

impl GossipPayload {
    pub fn members(&self) -> &[Member] {
        match self {
            GossipPayload::None => &[],
            GossipPayload::Membership(list) => list,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, GossipPayload::None)
    }
}

struct Entry {
    id: u64,
    gossip: Gossip,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse on count so the lowest
        // gossip_count (fewest-times-gossiped) pops first (§2 Gossip Buffer).
        other
            .gossip
            .gossip_count
            .cmp(&self.gossip.gossip_count)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A min-heap of `Gossip` entries keyed by `gossip_count`, with a
/// `node -> latest entry id` side index used for lazy deletion: `insert`
/// bumps a node's id so any older heap entry for that node is silently
/// discarded on pop instead of being returned (§9 "Heap with update-by-key",
/// option b).
pub struct GossipBuffer {
    heap: BinaryHeap<Entry>,
    latest_id_for_node: HashMap<Node, u64>,
    next_id: u64,
    max_gossip_count_per_message: u32,
}

impl GossipBuffer {
    pub fn new(max_gossip_count_per_message: u32) -> Self {
        GossipBuffer {
            heap: BinaryHeap::new(),
            latest_id_for_node: HashMap::new(),
            next_id: 0,
            max_gossip_count_per_message,
        }
    }

    /// Inserts a new gossip entry, implicitly superseding any prior entry
    /// for the same node.
    pub fn insert(&mut self, gossip: Gossip) {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.latest_id_for_node.insert(gossip.member.peer, id);
        self.heap.push(Entry { id, gossip });
    }

    fn pop_live(&mut self) -> Option<Entry> {
        while let Some(entry) = self.heap.pop() {
            if self.latest_id_for_node.get(&entry.gossip.member.peer) == Some(&entry.id) {
                return Some(entry);
            }
            // stale entry superseded by a later insert() for the same node
        }
        None
    }

    /// §4.4 `make_gossip_payload`.
    pub fn make_payload(
        &mut self,
        target: Option<Node>,
        self_member_lookup: impl Fn(&Node) -> Option<Member>,
        max_number_of_messages: usize,
    ) -> GossipPayload {
        let mut out = Vec::new();
        let mut buddy_peer = None;

        if let Some(target) = target {
            if let Some(member) = self_member_lookup(&target) {
                if member.status.is_suspect() {
                    buddy_peer = Some(member.peer);
                    out.push(member);
                }
            }
        }

        let mut drained = 0;
        while drained < max_number_of_messages {
            let Some(entry) = self.pop_live() else {
                break;
            };
            drained += 1;
            let Entry { gossip, .. } = entry;
            let Gossip {
                member,
                gossip_count,
            } = gossip;

            let is_buddy_duplicate = buddy_peer == Some(member.peer);
            if !is_buddy_duplicate {
                out.push(member.clone());
            }

            let gossip_count = gossip_count + 1;
            if gossip_count < self.max_gossip_count_per_message {
                self.insert(Gossip {
                    member,
                    gossip_count,
                });
            } else {
                self.latest_id_for_node.remove(&member.peer);
            }
        }

        if out.is_empty() {
            GossipPayload::None
        } else {
            GossipPayload::Membership(out)
        }
    }

    #[cfg(test)]
    pub fn pending_count(&mut self) -> usize {
        let mut popped = Vec::new();
        let mut count = 0;
        while let Some(entry) = self.pop_live() {
            count += 1;
            popped.push(entry);
        }
        for entry in popped {
            self.latest_id_for_node
                .insert(entry.gossip.member.peer, entry.id);
            self.heap.push(entry);
        }
        count
    }
}

#[cfg(test)]
fn bare_member(peer: Node, status: Status) -> Member {
    Member {
        peer,
        status,
        protocol_period: 0,
        suspicion_started_at_nanos: None,
    }
}
