use crate::id::NodeId;
use crate::message::Message;
use crate::protocol::{Election, NodeState};
use crate::run::rw::Connection;
use crate::sink::LogSink;
use crate::RunResult;
use color_eyre::eyre::{eyre, Report, WrapErr};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{watch, Barrier};
use tokio::task::JoinHandle;
use tokio::time::{self, timeout};

const LOCALHOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Both the accept and the connect side give up after this deadline; a ring
/// with a missing neighbor cannot elect anyone, so the node fails fatally.
const CONNECT_DEADLINE: Duration = Duration::from_secs(3);

/// Cadence of the processor loop: one pass, one message.
const PROCESS_PACE: Duration = Duration::from_millis(200);

/// Everything a node needs to take its place in the ring.
#[derive(Debug)]
pub(super) struct Node {
    pub id: NodeId,
    pub listen_port: u16,
    pub talk_port: u16,
    pub delay: Duration,
}

/// Final per-node account, returned to the driver once the node's three
/// activities have wound down.
#[derive(Debug)]
pub struct NodeReport {
    pub id: NodeId,
    pub state: NodeState,
    pub leader: Option<NodeId>,
    pub peers: usize,
}

/// The processor activity. Owns the node lifecycle: binds the listen socket,
/// seeds its own greeting, spawns the listener and (after the ring-wide
/// readiness rendezvous) the talker, then runs the election loop until the
/// node is finished and both peer activities have been joined.
pub(super) async fn node_task(
    node: Node,
    ready: Arc<Barrier>,
    sink: Arc<LogSink>,
) -> RunResult<NodeReport> {
    let listener = TcpListener::bind((LOCALHOST, node.listen_port))
        .await
        .wrap_err_with(|| {
            format!("node {} failed to bind port {}", node.id, node.listen_port)
        })?;
    sink.node(node.id, format!("listening on port {}", node.listen_port));

    let mut election = Election::new(node.id);
    let (send_tx, send_rx) = mpsc::unbounded_channel();
    let (recv_tx, mut recv_rx) = mpsc::unbounded_channel();
    let (finished_tx, finished_rx) = watch::channel(false);

    // the greeting that opens the all-ready barrier goes out before any
    // peer activity runs
    let _ = send_tx.send(Message::greetings(node.id));

    let listen = tokio::spawn(listener_task(
        node.id,
        listener,
        recv_tx,
        finished_rx,
        sink.clone(),
    ));

    // every listener in the ring is bound once past this point, so the
    // talkers can connect without racing the binds
    ready.wait().await;

    let talk = tokio::spawn(talker_task(
        node.id,
        node.talk_port,
        node.delay,
        send_rx,
        sink.clone(),
    ));

    let mut pace = time::interval(PROCESS_PACE);
    loop {
        pace.tick().await;

        // at most one message per pass
        match recv_rx.try_recv() {
            Ok(msg) => {
                for out in election.handle(msg) {
                    if send_tx.send(out).is_err() {
                        return Err(task_failure(talk, "talker").await);
                    }
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                return Err(task_failure(listen, "listener").await);
            }
        }

        if let Some(start) = election.maybe_start() {
            sink.node(node.id, "all peers online, joining the election");
            if send_tx.send(start).is_err() {
                return Err(task_failure(talk, "talker").await);
            }
        }

        if election.finished() {
            break;
        }
    }

    match (election.state(), election.leader()) {
        (NodeState::Leader, _) => sink.node(node.id, "elected leader"),
        (_, Some(leader)) => {
            sink.node(node.id, format!("decided on leader {:05}", leader))
        }
        _ => {}
    }

    // closing the send queue lets the talker drain the tail (the final
    // leader announcement may still be in flight) before it disconnects;
    // only then is the listener told to stop
    drop(send_tx);
    talk.await.wrap_err("talker task panicked")??;
    let _ = finished_tx.send(true);
    listen.await.wrap_err("listener task panicked")??;

    Ok(NodeReport {
        id: node.id,
        state: election.state(),
        leader: election.leader(),
        peers: election.peer_count(),
    })
}

/// The listener activity. Accepts exactly one inbound connection (from the
/// upstream neighbor) within the deadline, then feeds complete frames into
/// the receive queue until the node finishes or the peer hangs up.
/// Undecodable payloads are dropped with a log line.
async fn listener_task(
    id: NodeId,
    listener: TcpListener,
    queue: UnboundedSender<Message>,
    mut finished: watch::Receiver<bool>,
    sink: Arc<LogSink>,
) -> RunResult<()> {
    let (stream, _addr) = timeout(CONNECT_DEADLINE, listener.accept())
        .await
        .map_err(|_| {
            eyre!("node {} timed out waiting for its upstream connection", id)
        })?
        .wrap_err_with(|| {
            format!("node {} failed to accept its upstream connection", id)
        })?;

    let mut connection = Connection::new(stream);
    loop {
        tokio::select! {
            _ = finished.changed() => break,
            next = connection.recv() => match next {
                Some(Ok(msg)) => {
                    if queue.send(msg).is_err() {
                        break;
                    }
                }
                Some(Err(report)) => {
                    sink.node(id, format!("dropping an undecodable payload: {}", report));
                }
                None => break,
            }
        }
    }
    Ok(())
}

/// The talker activity. Connects to the downstream neighbor within the
/// deadline, then writes queued messages one at a time, sleeping the
/// configured delay before each send. Draining a closed queue ends the
/// activity with a graceful disconnect.
async fn talker_task(
    id: NodeId,
    port: u16,
    delay: Duration,
    mut queue: UnboundedReceiver<Message>,
    sink: Arc<LogSink>,
) -> RunResult<()> {
    let stream = timeout(CONNECT_DEADLINE, TcpStream::connect((LOCALHOST, port)))
        .await
        .map_err(|_| eyre!("node {} timed out connecting to port {}", id, port))?
        .wrap_err_with(|| {
            format!("node {} failed to connect to port {}", id, port)
        })?;
    sink.node(id, format!("talking on port {}", port));

    let mut connection = Connection::new(stream);
    while let Some(msg) = queue.recv().await {
        if !delay.is_zero() {
            time::sleep(delay).await;
        }
        connection.send(&msg).await.wrap_err_with(|| {
            format!("node {} failed to write to port {}", id, port)
        })?;
    }
    connection.shutdown().await;
    Ok(())
}

/// Extracts the error behind a peer activity that died under the processor.
async fn task_failure(
    handle: JoinHandle<RunResult<()>>,
    activity: &str,
) -> Report {
    match handle.await {
        Ok(Ok(())) => {
            eyre!("{} exited before the election finished", activity)
        }
        Ok(Err(report)) => report,
        Err(e) => eyre!("{} task panicked: {:?}", activity, e),
    }
}
