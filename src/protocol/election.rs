use crate::id::NodeId;
use crate::message::{Kind, Message};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Per-node election state. Advances monotonically along
/// `Offline -> Participating -> Decided` or
/// `Offline -> Participating -> Leader`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Offline,
    Participating,
    Decided,
    Leader,
}

/// The Chang-Roberts state machine for one node.
///
/// The machine is purely message-in, messages-out: the runner feeds it one
/// received message at a time through `handle` and forwards whatever comes
/// back, so all socket and queue concerns stay outside. A preliminary
/// greetings round-trip acts as an all-online barrier: once a node's own
/// greeting has traversed the ring, `maybe_start` originates its election
/// token.
#[derive(Debug, Clone)]
pub struct Election {
    id: NodeId,
    state: NodeState,
    peers: HashSet<NodeId>,
    leader: Option<NodeId>,
    all_ready: bool,
    finished: bool,
}

impl Election {
    pub fn new(id: NodeId) -> Self {
        // the census starts with ourselves
        let mut peers = HashSet::new();
        peers.insert(id);
        Self {
            id,
            state: NodeState::Offline,
            peers,
            leader: None,
            all_ready: false,
            finished: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn leader(&self) -> Option<NodeId> {
        self.leader
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Number of distinct ids observed via greetings, own id included.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Handles one received message, returning the messages to send.
    pub fn handle(&mut self, msg: Message) -> Vec<Message> {
        match msg.kind {
            Kind::Greetings => self.handle_greetings(msg),
            Kind::ElectionStart => self.handle_election_start(msg),
            Kind::ElectedLeader => self.handle_elected_leader(msg),
        }
    }

    /// The one and only origination rule: once the greeting has come back
    /// around and the node is still offline, it joins the election with its
    /// own token.
    pub fn maybe_start(&mut self) -> Option<Message> {
        if self.state == NodeState::Offline && self.all_ready {
            self.state = NodeState::Participating;
            Some(Message::election_start(self.id))
        } else {
            None
        }
    }

    fn handle_greetings(&mut self, msg: Message) -> Vec<Message> {
        if msg.source == self.id {
            // our own greeting traversed the whole ring: everyone is online
            self.all_ready = true;
            vec![]
        } else {
            self.peers.insert(msg.source);
            vec![msg]
        }
    }

    fn handle_election_start(&mut self, msg: Message) -> Vec<Message> {
        match msg.source.cmp(&self.id) {
            Ordering::Greater => {
                // a larger id survives us: relay it
                self.state = NodeState::Participating;
                vec![msg]
            }
            Ordering::Less => {
                if self.state != NodeState::Participating {
                    // suppress the smaller id, substitute our own
                    self.state = NodeState::Participating;
                    vec![Message {
                        source: self.id,
                        ..msg
                    }]
                } else {
                    // already represented by our own (or a larger) token
                    vec![]
                }
            }
            Ordering::Equal => {
                // our token circumnavigated: no larger id exists
                self.leader = Some(self.id);
                self.state = NodeState::Leader;
                vec![Message::elected_leader(self.id)]
            }
        }
    }

    fn handle_elected_leader(&mut self, msg: Message) -> Vec<Message> {
        let forward = if msg.source != self.id {
            self.leader = Some(msg.source);
            self.state = NodeState::Decided;
            vec![msg]
        } else {
            // the announcement echoed back to the leader: stop it here
            vec![]
        };
        self.finished = true;
        forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greetings_from_peers_are_recorded_and_relayed() {
        let mut election = Election::new(20);
        let out = election.handle(Message::greetings(10));
        assert_eq!(out, vec![Message::greetings(10)]);
        assert_eq!(election.peer_count(), 2);
        assert!(election.maybe_start().is_none());
    }

    #[test]
    fn own_greeting_opens_the_barrier_and_is_not_relayed() {
        let mut election = Election::new(20);
        assert_eq!(election.handle(Message::greetings(20)), vec![]);
        let start = election.maybe_start().expect("should originate");
        assert_eq!(start, Message::election_start(20));
        assert_eq!(election.state(), NodeState::Participating);
        // origination fires exactly once
        assert!(election.maybe_start().is_none());
    }

    #[test]
    fn larger_token_is_relayed_unchanged() {
        let mut election = Election::new(10);
        let token = Message::new(30, Kind::ElectionStart, "payload");
        let out = election.handle(token.clone());
        assert_eq!(out, vec![token]);
        assert_eq!(election.state(), NodeState::Participating);
    }

    #[test]
    fn smaller_token_is_replaced_when_not_yet_participating() {
        let mut election = Election::new(30);
        let out = election.handle(Message::new(10, Kind::ElectionStart, "v"));
        assert_eq!(out, vec![Message::new(30, Kind::ElectionStart, "v")]);
        assert_eq!(election.state(), NodeState::Participating);
    }

    #[test]
    fn smaller_token_is_discarded_when_already_participating() {
        let mut election = Election::new(30);
        election.handle(Message::greetings(30));
        assert!(election.maybe_start().is_some());
        assert_eq!(election.handle(Message::election_start(10)), vec![]);
        assert_eq!(election.state(), NodeState::Participating);
    }

    #[test]
    fn own_token_elects_self() {
        let mut election = Election::new(30);
        election.handle(Message::greetings(30));
        assert!(election.maybe_start().is_some());
        let out = election.handle(Message::election_start(30));
        assert_eq!(out, vec![Message::elected_leader(30)]);
        assert_eq!(election.state(), NodeState::Leader);
        assert_eq!(election.leader(), Some(30));
        // not finished until the announcement echoes back
        assert!(!election.finished());
    }

    #[test]
    fn leader_announcement_decides_and_finishes() {
        let mut election = Election::new(10);
        let out = election.handle(Message::elected_leader(30));
        assert_eq!(out, vec![Message::elected_leader(30)]);
        assert_eq!(election.state(), NodeState::Decided);
        assert_eq!(election.leader(), Some(30));
        assert!(election.finished());
    }

    #[test]
    fn leader_absorbs_its_own_announcement() {
        let mut election = Election::new(30);
        election.handle(Message::greetings(30));
        assert!(election.maybe_start().is_some());
        election.handle(Message::election_start(30));
        assert_eq!(election.handle(Message::elected_leader(30)), vec![]);
        assert!(election.finished());
        assert_eq!(election.leader(), Some(30));
        assert_eq!(election.state(), NodeState::Leader);
    }

    // Drives a full ring without sockets: node i sends to node i-1 (mod n),
    // every node processes at most one message per round, and each round a
    // still-offline node may originate. Returns the machines at quiescence.
    fn circulate(ids: Vec<NodeId>) -> Vec<Election> {
        let n = ids.len();
        let mut machines: Vec<_> = ids.iter().map(|&id| Election::new(id)).collect();
        let mut queues: Vec<Vec<Message>> = vec![Vec::new(); n];

        // seed the greeting round
        for (i, &id) in ids.iter().enumerate() {
            queues[(i + n - 1) % n].push(Message::greetings(id));
        }

        for _round in 0..(n * n * 8) {
            if machines.iter().all(|m| m.finished()) {
                break;
            }
            for i in 0..n {
                let downstream = (i + n - 1) % n;
                if !queues[i].is_empty() {
                    let msg = queues[i].remove(0);
                    for out in machines[i].handle(msg) {
                        queues[downstream].push(out);
                    }
                }
                if let Some(start) = machines[i].maybe_start() {
                    queues[downstream].push(start);
                }
            }
        }
        machines
    }

    fn assert_consensus(machines: &[Election], expected: NodeId, n: usize) {
        for machine in machines {
            assert!(machine.finished(), "node {} never finished", machine.id());
            assert_eq!(machine.leader(), Some(expected));
            assert_eq!(machine.peer_count(), n);
            let expected_state = if machine.id() == expected {
                NodeState::Leader
            } else {
                NodeState::Decided
            };
            assert_eq!(machine.state(), expected_state);
        }
    }

    #[test]
    fn three_node_ring_elects_the_maximum() {
        let machines = circulate(vec![10, 20, 30]);
        assert_consensus(&machines, 30, 3);
    }

    #[test]
    fn two_node_ring_elects_the_maximum() {
        let machines = circulate(vec![7, 3]);
        assert_consensus(&machines, 7, 2);
    }

    #[test]
    fn descending_ids_still_elect_the_maximum() {
        let machines = circulate(vec![50, 40, 30, 20, 10]);
        assert_consensus(&machines, 50, 5);
    }

    #[test]
    fn unsorted_ids_elect_the_maximum() {
        let machines = circulate(vec![1, 4, 2, 3]);
        assert_consensus(&machines, 4, 4);
    }
}
