//! The top-level protocol engine (§4.5): `on_ping`, `on_ping_request`,
//! `on_ping_response`, `on_ping_request_response`, `on_periodic_tick`, and
//! `make_gossip_payload`. Owns the five other components and emits
//! directives; never performs I/O (§5).

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;

use rand::seq::SliceRandom;
use rand::RngCore;

use crate::config::Config;
use crate::error::ConfigError;
use crate::gossip::{Gossip, GossipBuffer, GossipPayload};
use crate::lifeguard::{LhmEvent, LifeguardController};
use crate::member::{MarkDirective, Member, MemberTable};
use crate::node::{Incarnation, Node};
use crate::probe::ProbeScheduler;
use crate::status::Status;
use crate::time::Clock;

/// Directives the engine emits (§4.6) — the shell consumes, never produces,
/// these.
#[derive(Debug, Clone)]
pub enum Directive {
    SendPing {
        target: Node,
        timeout: Duration,
        /// Set when this ping is relaying an indirect probe on behalf of
        /// another peer (§4.5 `on_ping_request`); `None` for direct probes
        /// dispatched from `on_periodic_tick`.
        ping_req_origin: Option<Node>,
    },
    SendPingRequest {
        target: Node,
        via: Node,
        timeout: Duration,
    },
    Reply(PingResponse),
    Connect {
        node: Node,
    },
    MemberStatusChanged {
        from: Option<Status>,
        to: Status,
        member: Node,
    },
    LogEvent {
        level: log::Level,
        message: String,
    },
}

/// `PingResponse ∈ { Ack, Nack, Timeout, Error }` (§4.6), reused both as the
/// shell's report of a completed probe and as the payload of a `Reply`
/// directive.
#[derive(Debug, Clone)]
pub enum PingResponse {
    Ack {
        target: Node,
        incarnation: Incarnation,
        payload: GossipPayload,
    },
    Nack {
        target: Node,
    },
    Timeout,
    Error,
}

/// Rich outcome taxonomy for `on_ping_response` / `on_ping_request_response`
/// (§4.5.2, §7).
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    UnknownMember,
    NewlySuspect,
    IgnoredDueToOlderStatus(Status),
    AlreadyUnreachable,
    AlreadyDead,
    Alive { previous: Option<Status> },
    NackReceived,
}

pub struct ProtocolEngine {
    self_node: Node,
    incarnation: Incarnation,
    protocol_period: u64,
    config: Config,
    members: MemberTable,
    probes: ProbeScheduler,
    gossip: GossipBuffer,
    lifeguard: LifeguardController,
    clock: Box<dyn Clock>,
    rng: Box<dyn RngCore>,
}

impl ProtocolEngine {
    pub fn new(config: Config, self_addr: SocketAddr) -> Result<Self, ConfigError> {
        Self::with_clock_and_rng(
            config,
            self_addr,
            Box::new(crate::time::SystemClock::new()),
            Box::new(rand::thread_rng()),
        )
    }

    pub fn with_clock_and_rng(
        config: Config,
        self_addr: SocketAddr,
        clock: Box<dyn Clock>,
        rng: Box<dyn RngCore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let self_node = Node::new(self_addr, 0);
        let mut engine = ProtocolEngine {
            self_node,
            incarnation: 0,
            protocol_period: 0,
            members: MemberTable::new(config.max_independent_suspicions),
            probes: ProbeScheduler::new(),
            gossip: GossipBuffer::new(config.max_gossip_count_per_message),
            lifeguard: LifeguardController::new(&config),
            clock,
            rng,
            config,
        };
        // §3 invariant 1: local node always present as Alive{incarnation}.
        engine.mark(self_node, Status::Alive { incarnation: 0 });
        Ok(engine)
    }

    // -- read-only accessors -------------------------------------------------

    pub fn self_node(&self) -> Node {
        self.self_node
    }

    pub fn incarnation(&self) -> Incarnation {
        self.incarnation
    }

    pub fn protocol_period(&self) -> u64 {
        self.protocol_period
    }

    pub fn lhm(&self) -> u32 {
        self.lifeguard.lhm()
    }

    /// The Lifeguard-scaled period the shell should wait between
    /// `on_periodic_tick` calls (§4.2 `dynamic_probe_interval`). The engine
    /// itself never schedules its own ticks (§5); the shell reads this after
    /// each tick to learn how long to sleep before the next one.
    pub fn dynamic_probe_interval(&self) -> Duration {
        self.lifeguard.dynamic_probe_interval(self.config.probe_interval)
    }

    pub fn status_of(&self, peer: &Node) -> Option<Status> {
        self.members.status_of(peer).cloned()
    }

    pub fn is_member(&self, peer: &Node) -> bool {
        self.members.is_member(peer)
    }

    pub fn all_members(&self) -> Vec<Member> {
        self.members.all_members().cloned().collect()
    }

    pub fn suspects(&self) -> Vec<Member> {
        self.members.suspects().cloned().collect()
    }

    pub fn other_member_count(&self) -> usize {
        self.members.other_member_count(&self.self_node)
    }

    pub fn probe_list(&self) -> &[Node] {
        self.probes.members()
    }

    // -- the single write path (§4.1) ---------------------------------------

    /// `mark(peer, new_status)`: the single write path. Delegates table
    /// bookkeeping to `MemberTable::apply`, then layers on the probe
    /// scheduler and gossip buffer side effects the data-model description
    /// of `mark` groups under the same operation.
    fn mark(&mut self, peer: Node, status: Status) -> MarkDirective {
        let now = self.clock.now_nanos();
        let was_new = !self.members.is_member(&peer);
        let directive = self.members.apply(peer, status, now, self.protocol_period);
        if let MarkDirective::Applied { ref current, .. } = directive {
            if current.is_dead() {
                self.probes.remove(&peer);
            } else if was_new && peer != self.self_node {
                self.probes.insert(peer, &mut *self.rng);
            }
            if let Some(member) = self.members.get(&peer).cloned() {
                self.gossip.insert(Gossip {
                    member,
                    gossip_count: 0,
                });
            }
        }
        directive
    }

    fn add_member(&mut self, peer: Node, status: Status) -> MarkDirective {
        self.mark(peer, status)
    }

    // -- gossip dissemination (§4.4) -----------------------------------------

    pub fn make_gossip_payload(&mut self, target: Option<Node>) -> GossipPayload {
        let members = &self.members;
        self.gossip.make_payload(
            target,
            |node| members.get(node).cloned(),
            self.config.max_number_of_messages,
        )
    }

    // -- event handlers (§4.5) -----------------------------------------------

    pub fn on_ping(&mut self, payload: GossipPayload) -> Vec<Directive> {
        let mut directives = self.process_gossip_payload(payload);
        let reply_payload = self.make_gossip_payload(None);
        directives.push(Directive::Reply(PingResponse::Ack {
            target: self.self_node,
            incarnation: self.incarnation,
            payload: reply_payload,
        }));
        directives
    }

    pub fn on_ping_request(
        &mut self,
        target: Node,
        reply_to: Node,
        payload: GossipPayload,
    ) -> Vec<Directive> {
        let mut directives = self.process_gossip_payload(payload);

        if target == self.self_node {
            directives.push(Directive::LogEvent {
                level: log::Level::Warn,
                message: format!("{reply_to} asked us to ping-request ourselves"),
            });
            return directives;
        }

        if !self.members.is_member(&target) {
            self.add_member(target, Status::Alive { incarnation: 0 });
        }

        let timeout = self.lifeguard.dynamic_ping_timeout(self.config.ping_timeout);
        directives.push(Directive::SendPing {
            target,
            timeout,
            ping_req_origin: Some(reply_to),
        });
        directives
    }

    pub fn on_ping_response(
        &mut self,
        result: PingResponse,
        pinged_peer: Node,
    ) -> (ProbeOutcome, Vec<Directive>) {
        self.resolve_probe_result(result, pinged_peer, LhmEvent::FailedProbe)
    }

    pub fn on_ping_request_response(
        &mut self,
        result: PingResponse,
        pinged_peer: Node,
    ) -> (ProbeOutcome, Vec<Directive>) {
        self.resolve_probe_result(result, pinged_peer, LhmEvent::ProbeWithMissedNack)
    }

    fn resolve_probe_result(
        &mut self,
        result: PingResponse,
        pinged_peer: Node,
        timeout_event: LhmEvent,
    ) -> (ProbeOutcome, Vec<Directive>) {
        let mut directives = Vec::new();

        if !self.members.is_member(&pinged_peer) {
            return (ProbeOutcome::UnknownMember, directives);
        }

        match result {
            PingResponse::Timeout | PingResponse::Error => {
                self.lifeguard.record(timeout_event);
                let previous_status = self.members.status_of(&pinged_peer).cloned();
                match previous_status {
                    Some(Status::Alive { incarnation }) | Some(Status::Suspect { incarnation, .. }) => {
                        let mut suspected_by = BTreeSet::new();
                        suspected_by.insert(self.self_node);
                        let directive = self.mark(
                            pinged_peer,
                            Status::Suspect {
                                incarnation,
                                suspected_by,
                            },
                        );
                        match directive {
                            MarkDirective::Applied { previous, current } => {
                                directives.push(Directive::MemberStatusChanged {
                                    from: previous,
                                    to: current,
                                    member: pinged_peer,
                                });
                                (ProbeOutcome::NewlySuspect, directives)
                            }
                            MarkDirective::IgnoredDueToOlderStatus(prev) => {
                                (ProbeOutcome::IgnoredDueToOlderStatus(prev), directives)
                            }
                        }
                    }
                    Some(Status::Unreachable { .. }) => (ProbeOutcome::AlreadyUnreachable, directives),
                    Some(Status::Dead) => (ProbeOutcome::AlreadyDead, directives),
                    None => (ProbeOutcome::UnknownMember, directives),
                }
            }
            PingResponse::Ack {
                target,
                incarnation,
                payload,
            } => {
                debug_assert_eq!(target, pinged_peer, "ack target must match the pinged peer");
                self.lifeguard.record(LhmEvent::SuccessfulProbe);
                let previous = self.members.status_of(&pinged_peer).cloned();
                let directive = self.mark(pinged_peer, Status::Alive { incarnation });
                directives.extend(self.process_gossip_payload(payload));
                match directive {
                    MarkDirective::Applied { .. } => (ProbeOutcome::Alive { previous }, directives),
                    MarkDirective::IgnoredDueToOlderStatus(prev) => {
                        (ProbeOutcome::IgnoredDueToOlderStatus(prev), directives)
                    }
                }
            }
            PingResponse::Nack { .. } => (ProbeOutcome::NackReceived, directives),
        }
    }

    pub fn on_periodic_tick(&mut self) -> Vec<Directive> {
        let mut directives = Vec::new();

        if let Some(target) = self.probes.next(&mut *self.rng) {
            let timeout = self.lifeguard.dynamic_ping_timeout(self.config.ping_timeout);
            directives.push(Directive::SendPing {
                target,
                timeout,
                ping_req_origin: None,
            });
        }

        let now = self.clock.now_nanos();
        let suspects: Vec<Member> = self.members.suspects().cloned().collect();
        for member in suspects {
            if let Status::Suspect {
                incarnation,
                suspected_by,
            } = &member.status
            {
                let timeout = self.lifeguard.suspicion_timeout(suspected_by.len() as u32);
                let started = member.suspicion_started_at_nanos.unwrap_or(now);
                if now.saturating_sub(started) > timeout.as_nanos() as u64 {
                    let next_status = if self.config.unreachable_phase_enabled {
                        Status::Unreachable {
                            incarnation: *incarnation,
                        }
                    } else {
                        Status::Dead
                    };
                    if let MarkDirective::Applied { previous, current } =
                        self.mark(member.peer, next_status)
                    {
                        directives.push(Directive::MemberStatusChanged {
                            from: previous,
                            to: current,
                            member: member.peer,
                        });
                    }
                }
            }
        }

        self.protocol_period += 1;
        directives
    }

    /// §4.5.4 ping-request target selection for indirect probes.
    pub fn members_to_ping_request(&mut self, target: Node) -> Vec<Node> {
        let mut candidates: Vec<Node> = self
            .members
            .all_members()
            .filter(|m| {
                m.peer != target
                    && m.peer != self.self_node
                    && matches!(m.status, Status::Alive { .. } | Status::Suspect { .. })
            })
            .map(|m| m.peer)
            .collect();
        candidates.shuffle(&mut *self.rng);
        candidates.truncate(self.config.indirect_probe_count);
        candidates
    }

    // -- gossip payload classification (§4.5.1) ------------------------------

    fn process_gossip_payload(&mut self, payload: GossipPayload) -> Vec<Directive> {
        let mut directives = Vec::new();
        let members = match payload {
            GossipPayload::None => return directives,
            GossipPayload::Membership(members) => members,
        };

        for member in members {
            if member.peer == self.self_node {
                directives.extend(self.process_myself_gossip(&member.status));
            } else {
                directives.extend(self.process_other_member_gossip(member));
            }
        }
        directives
    }

    fn process_myself_gossip(&mut self, status: &Status) -> Vec<Directive> {
        let mut directives = Vec::new();
        match status {
            Status::Alive { .. } => {}
            Status::Suspect { incarnation, .. } if *incarnation == self.incarnation => {
                self.lifeguard.record(LhmEvent::RefutingSuspectMessageAboutSelf);
                self.incarnation += 1;
                self.mark(self.self_node, Status::Alive { incarnation: self.incarnation });
            }
            Status::Suspect { incarnation, .. } if *incarnation > self.incarnation => {
                let message = format!(
                    "peer reported us Suspect at incarnation {incarnation} > our own {}; ignoring",
                    self.incarnation
                );
                warn!("{message}");
                directives.push(Directive::LogEvent {
                    level: log::Level::Warn,
                    message,
                });
            }
            Status::Suspect { .. } => {
                // stale report at an incarnation we've already superseded
            }
            Status::Unreachable { incarnation } if *incarnation == self.incarnation => {
                self.incarnation += 1;
                self.mark(self.self_node, Status::Alive { incarnation: self.incarnation });
            }
            Status::Unreachable { .. } => {}
            Status::Dead => {
                let previous = self.members.status_of(&self.self_node).cloned();
                self.mark(self.self_node, Status::Dead);
                directives.push(Directive::MemberStatusChanged {
                    from: previous,
                    to: Status::Dead,
                    member: self.self_node,
                });
            }
        }
        directives
    }

    fn process_other_member_gossip(&mut self, member: Member) -> Vec<Directive> {
        let mut directives = Vec::new();
        if self.members.is_member(&member.peer) {
            let directive = self.mark(member.peer, member.status);
            if let MarkDirective::Applied { previous, current } = directive {
                if matches!(previous, Some(Status::Alive { .. })) && current.is_suspect() {
                    directives.push(Directive::MemberStatusChanged {
                        from: previous,
                        to: current,
                        member: member.peer,
                    });
                }
            }
        } else {
            self.add_member(member.peer, member.status);
            directives.push(Directive::Connect { node: member.peer });
        }
        directives
    }
}
