//! `RaftReplicator` — a Raft-backed `lockd_core::Replicator`.
//!
//! raft-rs's `RawNode` is not thread-safe, so all mutating operations
//! (step, propose, tick, ready, advance) must happen sequentially from
//! one owner. This is enforced at compile time with a handle/driver
//! split:
//!
//! - [`RaftReplicator`]: the public handle (`Clone + Send + Sync`),
//!   implementing `lockd_core::Replicator`. All mutating operations go
//!   through an `mpsc` channel to the driver.
//! - [`ReplicatorDriver`]: the private actor that exclusively owns
//!   `RawNode`. Only the task running [`ReplicatorDriver::run`] touches
//!   it.
//!
//! This replicator bootstraps one fixed voter set at startup and never
//! changes it: there is no `ConfChange`, witness-node, or async-write
//! support.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use raft::eraftpb::{ConfState, Entry, EntryType, Message};
use raft::{Config as RawConfig, RawNode};
use slog::{o, Logger};
use tokio::sync::{mpsc, oneshot, watch};

use lockd_core::{
    ClusterStatus, Command, CommandResult, LockError, LockStateMachine, Replicator,
    ReplicatorError,
};

use crate::error::{RaftError, Result};
use crate::storage::RaftLogStorage;
use crate::transport::PeerClients;

/// Tuning knobs for a `RaftReplicator` node. Ticks, not wall-clock units,
/// per raft-rs convention — `tick_interval` is how often `advance` calls
/// `raw_node.tick()`.
#[derive(Debug, Clone)]
pub struct RaftConfig {
    /// This replica's numeric Raft id (see [`crate::assign_node_ids`]).
    pub id: u64,
    /// Every other voter's numeric Raft id.
    pub peers: Vec<u64>,
    /// Ticks before an election timeout fires.
    pub election_tick: usize,
    /// Ticks between leader heartbeats.
    pub heartbeat_tick: usize,
    /// Max bytes per append message.
    pub max_size_per_msg: u64,
    /// Max in-flight append messages.
    pub max_inflight_msgs: usize,
    /// Wall-clock interval between `tick()` calls.
    pub tick_interval: Duration,
    /// How long a proposal waits for commit before `ReplicatorError::Timeout`.
    pub proposal_timeout: Duration,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            id: 1,
            peers: vec![],
            election_tick: 10,
            heartbeat_tick: 3,
            max_size_per_msg: 1024 * 1024,
            max_inflight_msgs: 256,
            tick_interval: Duration::from_millis(100),
            proposal_timeout: Duration::from_secs(10),
        }
    }
}

impl RaftConfig {
    fn to_raw(&self) -> RawConfig {
        RawConfig {
            id: self.id,
            election_tick: self.election_tick,
            heartbeat_tick: self.heartbeat_tick,
            max_size_per_msg: self.max_size_per_msg,
            max_inflight_msgs: self.max_inflight_msgs,
            ..Default::default()
        }
    }
}

/// Role a replica believes it currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Follower,
    Candidate,
    PreCandidate,
    Leader,
}

const ROLE_FOLLOWER: u8 = 0;
const ROLE_CANDIDATE: u8 = 1;
const ROLE_LEADER: u8 = 2;
const ROLE_PRE_CANDIDATE: u8 = 3;

impl NodeRole {
    fn to_u8(self) -> u8 {
        match self {
            NodeRole::Follower => ROLE_FOLLOWER,
            NodeRole::Candidate => ROLE_CANDIDATE,
            NodeRole::Leader => ROLE_LEADER,
            NodeRole::PreCandidate => ROLE_PRE_CANDIDATE,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            ROLE_CANDIDATE => NodeRole::Candidate,
            ROLE_LEADER => NodeRole::Leader,
            ROLE_PRE_CANDIDATE => NodeRole::PreCandidate,
            _ => NodeRole::Follower,
        }
    }
}

impl From<raft::StateRole> for NodeRole {
    fn from(role: raft::StateRole) -> Self {
        match role {
            raft::StateRole::Follower => NodeRole::Follower,
            raft::StateRole::Candidate => NodeRole::Candidate,
            raft::StateRole::Leader => NodeRole::Leader,
            raft::StateRole::PreCandidate => NodeRole::PreCandidate,
        }
    }
}

impl From<NodeRole> for lockd_core::Role {
    /// `PreCandidate` (raft-rs's pre-vote phase) collapses into
    /// `Candidate` at this boundary — spec's `role` enumerates exactly
    /// `FOLLOWER`/`CANDIDATE`/`LEADER`.
    fn from(role: NodeRole) -> Self {
        match role {
            NodeRole::Follower => lockd_core::Role::Follower,
            NodeRole::Candidate | NodeRole::PreCandidate => lockd_core::Role::Candidate,
            NodeRole::Leader => lockd_core::Role::Leader,
        }
    }
}

struct PendingProposal {
    tx: oneshot::Sender<std::result::Result<CommandResult, LockError>>,
}

/// Messages sent from the [`RaftReplicator`] handle to the
/// [`ReplicatorDriver`] actor.
enum RaftMsg {
    Step {
        msg: Message,
    },
    Propose {
        data: Vec<u8>,
        tx: oneshot::Sender<std::result::Result<CommandResult, LockError>>,
    },
    Campaign {
        tx: oneshot::Sender<Result<()>>,
    },
}

/// The public handle: `Clone + Send + Sync`, shared with HTTP handlers
/// and the periodic expiration sweep.
#[derive(Clone)]
pub struct RaftReplicator {
    msg_tx: mpsc::UnboundedSender<RaftMsg>,
    state_machine: Arc<StdRwLock<LockStateMachine>>,
    addresses: Arc<HashMap<u64, String>>,
    self_id: u64,
    cached_role: Arc<AtomicU8>,
    cached_leader_id: Arc<AtomicU64>,
    cached_term: Arc<AtomicU64>,
    last_applied: Arc<AtomicU64>,
    proposal_timeout: Duration,
    started_at: Instant,
}

/// The private actor. Only the task running [`Self::run`] may touch
/// `raw_node` — see the module-level invariant.
pub struct ReplicatorDriver {
    raw_node: RawNode<RaftLogStorage>,
    state_machine: Arc<StdRwLock<LockStateMachine>>,
    pending: HashMap<u64, PendingProposal>,
    proposal_id: u64,
    last_tick: Instant,
    msg_rx: mpsc::UnboundedReceiver<RaftMsg>,
    cached_role: Arc<AtomicU8>,
    cached_leader_id: Arc<AtomicU64>,
    cached_term: Arc<AtomicU64>,
    last_applied: Arc<AtomicU64>,
    config: RaftConfig,
    addresses: Arc<HashMap<u64, String>>,
}

impl RaftReplicator {
    /// Build a `(handle, driver)` pair over a fresh state machine,
    /// bootstrapping the voter set from `addresses` (id → `host:port`,
    /// fixed for the process lifetime) if the log storage is empty.
    pub fn new(
        config: RaftConfig,
        storage: RaftLogStorage,
        addresses: HashMap<u64, String>,
    ) -> Result<(Self, ReplicatorDriver)> {
        let initial = storage
            .initial_state()
            .map_err(|e| RaftError::Storage(e.to_string()))?;

        if initial.conf_state.voters.is_empty() {
            let mut voters = vec![config.id];
            voters.extend(config.peers.iter().copied());
            voters.sort_unstable();
            let cs = ConfState {
                voters,
                ..Default::default()
            };
            storage
                .set_conf_state(&cs)
                .map_err(|e| RaftError::Storage(format!("bootstrap conf state: {e}")))?;
            tracing::info!(voters = ?cs.voters, "bootstrapped raft voter set");
        }

        let raw_config = config.to_raw();
        let logger = Logger::root(slog::Discard, o!());
        let raw_node = RawNode::new(&raw_config, storage, &logger)
            .map_err(|e| RaftError::Raft(e.to_string()))?;

        let state_machine = Arc::new(StdRwLock::new(LockStateMachine::new()));
        let cached_role = Arc::new(AtomicU8::new(ROLE_FOLLOWER));
        let cached_leader_id = Arc::new(AtomicU64::new(0));
        let cached_term = Arc::new(AtomicU64::new(0));
        let last_applied = Arc::new(AtomicU64::new(0));
        let addresses = Arc::new(addresses);

        let (msg_tx, msg_rx) = mpsc::unbounded_channel();

        let handle = RaftReplicator {
            msg_tx,
            state_machine: state_machine.clone(),
            addresses: addresses.clone(),
            self_id: config.id,
            cached_role: cached_role.clone(),
            cached_leader_id: cached_leader_id.clone(),
            cached_term: cached_term.clone(),
            last_applied: last_applied.clone(),
            proposal_timeout: config.proposal_timeout,
            started_at: Instant::now(),
        };

        let driver = ReplicatorDriver {
            raw_node,
            state_machine,
            pending: HashMap::new(),
            proposal_id: 0,
            last_tick: Instant::now(),
            msg_rx,
            cached_role,
            cached_leader_id,
            cached_term,
            last_applied,
            config,
            addresses,
        };

        Ok((handle, driver))
    }

    /// Shared handle to the state machine, for reads that bypass the log.
    pub fn state_machine(&self) -> Arc<StdRwLock<LockStateMachine>> {
        Arc::clone(&self.state_machine)
    }

    /// This replica's numeric Raft id.
    pub fn id(&self) -> u64 {
        self.self_id
    }

    /// Feed an inbound Raft message from a peer into the driver.
    pub fn step(&self, msg: Message) -> Result<()> {
        self.msg_tx
            .send(RaftMsg::Step { msg })
            .map_err(|_| RaftError::ChannelClosed)
    }

    /// Campaign to become leader. Used once at startup on a bootstrap
    /// node when there is no existing leader to hear a heartbeat from.
    pub async fn campaign(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.msg_tx
            .send(RaftMsg::Campaign { tx })
            .map_err(|_| RaftError::ChannelClosed)?;
        rx.await.map_err(|_| RaftError::ProposalDropped)?
    }

    fn role(&self) -> NodeRole {
        NodeRole::from_u8(self.cached_role.load(Ordering::Relaxed))
    }

    fn leader_address(&self) -> Option<String> {
        let id = self.cached_leader_id.load(Ordering::Relaxed);
        if id == 0 {
            return None;
        }
        self.addresses.get(&id).cloned()
    }
}

#[async_trait]
impl Replicator for RaftReplicator {
    async fn submit(
        &self,
        cmd: Command,
    ) -> std::result::Result<std::result::Result<CommandResult, LockError>, ReplicatorError> {
        // Built as the lower-level `RaftError` throughout and converted to
        // the narrower `ReplicatorError` contract only at this boundary
        // (via `?`'s automatic `From` conversion, or explicitly below).
        if self.role() != NodeRole::Leader {
            return Err(RaftError::NotLeader {
                leader_hint: self.leader_address(),
            }
            .into());
        }

        let data: Vec<u8> = bincode::serialize(&cmd).map_err(RaftError::from)?;
        let (tx, rx) = oneshot::channel();
        self.msg_tx
            .send(RaftMsg::Propose { data, tx })
            .map_err(|_| RaftError::ChannelClosed)?;

        match tokio::time::timeout(self.proposal_timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(RaftError::ProposalDropped.into()),
            Err(_) => Err(RaftError::Timeout(self.proposal_timeout).into()),
        }
    }

    fn is_leader(&self) -> bool {
        self.role() == NodeRole::Leader
    }

    fn leader(&self) -> Option<String> {
        self.leader_address()
    }

    fn status(&self) -> ClusterStatus {
        let mut peers: Vec<String> = self.addresses.values().cloned().collect();
        peers.sort();
        ClusterStatus {
            role: self.role().into(),
            is_leader: self.is_leader(),
            has_quorum: self.is_ready(),
            leader: self.leader_address(),
            peers,
            term: self.cached_term.load(Ordering::Relaxed),
            last_applied_index: self.last_applied.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed().as_secs_f64(),
        }
    }

    fn is_ready(&self) -> bool {
        self.cached_leader_id.load(Ordering::Relaxed) != 0
    }
}

impl ReplicatorDriver {
    /// Drain pending channel messages and feed them to `raw_node`.
    fn process_messages(&mut self) {
        while let Ok(msg) = self.msg_rx.try_recv() {
            match msg {
                RaftMsg::Step { msg } => {
                    if let Err(e) = self.raw_node.step(msg) {
                        tracing::warn!(error = %e, "raft step failed");
                    }
                }
                RaftMsg::Propose { data, tx } => {
                    self.proposal_id += 1;
                    let id = self.proposal_id;
                    let mut payload = Vec::with_capacity(8 + data.len());
                    payload.extend_from_slice(&id.to_be_bytes());
                    payload.extend_from_slice(&data);
                    match self.raw_node.propose(vec![], payload) {
                        Ok(()) => {
                            self.pending.insert(id, PendingProposal { tx });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "raft propose failed");
                            let _ = tx.send(Err(LockError::InvalidArgument {
                                message: format!("proposal rejected: {e}"),
                            }));
                        }
                    }
                }
                RaftMsg::Campaign { tx } => {
                    let result = self
                        .raw_node
                        .campaign()
                        .map_err(|e| RaftError::Raft(e.to_string()));
                    let _ = tx.send(result);
                }
            }
        }
    }

    /// Tick, collect ready state, apply committed entries, and return
    /// outgoing messages the caller should deliver to peers.
    async fn advance(&mut self) -> Result<Vec<Message>> {
        let mut outgoing = Vec::new();

        if self.last_tick.elapsed() >= self.config.tick_interval {
            self.raw_node.tick();
            self.last_tick = Instant::now();
        }

        if !self.raw_node.has_ready() {
            self.update_cached_status();
            return Ok(outgoing);
        }

        let mut ready = self.raw_node.ready();

        if !ready.messages().is_empty() {
            outgoing.extend(ready.take_messages());
        }
        if !ready.persisted_messages().is_empty() {
            outgoing.extend(ready.take_persisted_messages());
        }

        let committed = ready.take_committed_entries();
        if !committed.is_empty() {
            self.apply_entries(committed)?;
        }

        if !ready.snapshot().is_empty() {
            self.raw_node
                .mut_store()
                .apply_snapshot(ready.snapshot())
                .map_err(|e| RaftError::Storage(e.to_string()))?;
        }
        if !ready.entries().is_empty() {
            self.raw_node
                .mut_store()
                .append(ready.entries())
                .map_err(|e| RaftError::Storage(e.to_string()))?;
        }
        if let Some(hs) = ready.hs() {
            self.raw_node
                .mut_store()
                .set_hard_state(hs)
                .map_err(|e| RaftError::Storage(e.to_string()))?;
        }

        let mut light = self.raw_node.advance(ready);
        if !light.messages().is_empty() {
            outgoing.extend(light.take_messages());
        }
        if !light.committed_entries().is_empty() {
            let committed = light.take_committed_entries();
            self.apply_entries(committed)?;
        }
        self.raw_node.advance_apply();

        self.update_cached_status();
        Ok(outgoing)
    }

    fn apply_entries(&mut self, entries: Vec<Entry>) -> Result<()> {
        let mut sm = self
            .state_machine
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        for entry in entries {
            self.last_applied.store(entry.index, Ordering::Relaxed);
            if entry.data.is_empty() {
                continue;
            }
            match entry.get_entry_type() {
                EntryType::EntryNormal => {
                    if entry.data.len() < 8 {
                        tracing::warn!(index = entry.index, "entry shorter than proposal header");
                        continue;
                    }
                    let (id_bytes, cmd_bytes) = entry.data.split_at(8);
                    let proposal_id = u64::from_be_bytes(
                        id_bytes.try_into().expect("split_at(8) guarantees 8 bytes"),
                    );
                    let command: Command = bincode::deserialize(cmd_bytes)
                        .map_err(|e| RaftError::Serialization(e.to_string()))?;
                    let result = sm.apply(&command);
                    if let Some(proposal) = self.pending.remove(&proposal_id) {
                        let _ = proposal.tx.send(result);
                    }
                }
                EntryType::EntryConfChange | EntryType::EntryConfChangeV2 => {
                    tracing::warn!(
                        index = entry.index,
                        "ignoring unexpected conf-change entry; membership is fixed"
                    );
                }
            }
        }
        Ok(())
    }

    fn update_cached_status(&self) {
        let role: NodeRole = self.raw_node.raft.state.into();
        self.cached_role.store(role.to_u8(), Ordering::Relaxed);
        self.cached_leader_id
            .store(self.raw_node.raft.leader_id, Ordering::Relaxed);
        self.cached_term
            .store(self.raw_node.raft.term, Ordering::Relaxed);
    }

    /// Drive this replica until `shutdown` fires: tick, apply, and ship
    /// outgoing Raft messages to peers over gRPC.
    pub async fn run(mut self, peers: Arc<PeerClients>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {
                    tracing::info!("raft driver shutting down");
                    break;
                }
            }

            self.process_messages();
            match self.advance().await {
                Ok(messages) => {
                    for msg in messages {
                        if let Some(addr) = self.addresses.get(&msg.to) {
                            peers.send(addr, msg).await;
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "raft advance failed"),
            }
        }
    }
}
