// This module contains the per-node activities (listener, talker,
// processor).
mod node;

// This module contains the framed connection plumbing.
pub mod rw;

// Re-exports.
pub use node::NodeReport;

use crate::config::Config;
use crate::id::{ClockIds, IdSource, NodeId, PortAlloc};
use crate::protocol::NodeState;
use crate::sink::LogSink;
use crate::RunResult;
use color_eyre::eyre::{eyre, WrapErr};
use futures::stream::{FuturesUnordered, StreamExt};
use node::Node;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Barrier;

/// The process-wide id source, port allocator and print sink, constructed
/// once by the caller and threaded through node construction explicitly so
/// that tests can inject a deterministic id source.
pub struct Env {
    pub ids: Box<dyn IdSource + Send>,
    pub ports: PortAlloc,
    pub sink: Arc<LogSink>,
}

impl Env {
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self {
            ids: Box::new(ClockIds),
            ports: PortAlloc::new(),
            sink,
        }
    }
}

/// Runs one complete election: builds the ring, spawns every node, joins
/// them all and verifies that the ring reached consensus. The returned
/// reports are sorted by node id.
pub async fn run(config: &Config, mut env: Env) -> RunResult<Vec<NodeReport>> {
    let nodes = build_ring(config, &mut env)?;
    for node in &nodes {
        env.sink.node(
            node.id,
            format!(
                "up: listen port {}, talk port {}, delay {:?}",
                node.listen_port, node.talk_port, node.delay
            ),
        );
    }

    let ready = Arc::new(Barrier::new(nodes.len()));
    let mut handles: FuturesUnordered<_> = nodes
        .into_iter()
        .map(|node| {
            tokio::spawn(node::node_task(node, ready.clone(), env.sink.clone()))
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    while let Some(joined) = handles.next().await {
        let report = joined.wrap_err("node task panicked")??;
        reports.push(report);
    }
    reports.sort_by_key(|report| report.id);

    let leader = verify_agreement(&reports)?;
    tracing::info!(leader, nodes = reports.len(), "election reached consensus");
    Ok(reports)
}

/// Allocates ids and ports in input order and wires the ring: each node
/// listens on its own port and its talker targets the counter-clockwise
/// neighbor's listener. Duplicate ids are fatal here, before any socket is
/// touched.
fn build_ring(config: &Config, env: &mut Env) -> RunResult<Vec<Node>> {
    let n = config.n();
    if n == 0 {
        return Err(eyre!("a ring needs at least one node"));
    }

    let ids: Vec<NodeId> = (0..n).map(|_| env.ids.next_id()).collect();
    verify_unique(&ids)?;
    let ports: Vec<u16> = (0..n).map(|_| env.ports.next_port()).collect();

    let nodes = (0..n)
        .map(|i| Node {
            id: ids[i],
            listen_port: ports[i],
            talk_port: ports[(i + n - 1) % n],
            delay: config.delays()[i],
        })
        .collect();
    Ok(nodes)
}

fn verify_unique(ids: &[NodeId]) -> RunResult<()> {
    let mut seen = HashSet::new();
    for &id in ids {
        if !seen.insert(id) {
            return Err(eyre!(
                "id {} was assigned to more than one node",
                id
            ));
        }
    }
    Ok(())
}

/// Consensus check at join time: every node must have finished with the
/// same leader, and exactly one node may wear the crown.
fn verify_agreement(reports: &[NodeReport]) -> RunResult<NodeId> {
    let mut agreed = None;
    for report in reports {
        let leader = report.leader.ok_or_else(|| {
            eyre!("node {} finished without a leader", report.id)
        })?;
        match agreed {
            None => agreed = Some(leader),
            Some(expected) if expected != leader => {
                return Err(eyre!(
                    "node {} decided on leader {} while others decided on {}",
                    report.id,
                    leader,
                    expected
                ));
            }
            Some(_) => {}
        }
    }
    let leader =
        agreed.ok_or_else(|| eyre!("no nodes took part in the election"))?;

    let crowned = reports
        .iter()
        .filter(|report| report.state == NodeState::Leader)
        .count();
    if crowned != 1 {
        return Err(eyre!(
            "expected exactly one node in the leader state, found {}",
            crowned
        ));
    }
    Ok(leader)
}
