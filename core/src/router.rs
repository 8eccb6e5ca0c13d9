//! `Router`: accepts client and storage connections, hashes requests to
//! peers, coordinates multi-peer fan-out, and triggers resharding.
//!
//! Connection minting (`GET_CONNECTION_CLIENT`/`GET_CONNECTION_STORAGE`
//! handshake, channel naming) is a transport concern this crate does not
//! implement — callers register an already-connected channel directly via
//! [`Router::add_client`]/[`Router::add_storage`].

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::channel::Channel;
use crate::protocol::{RequestEnvelope, TransportEnvelope, TransportOp};
use crate::record::{hash_record, RecordCodec};

struct FanOutState {
    remaining: usize,
    status: bool,
    target: Option<u64>,
}

/// Who a storage's in-flight response is owed to: a single client, a
/// shared receipt tracking completions of one logical fan-out operation
/// across every peer, or nobody (a reshard-forwarded ADD the peer never
/// waits on a reply for).
#[derive(Clone)]
enum Originator {
    Single(u64),
    FanOut(Rc<RefCell<FanOutState>>),
    Internal,
}

struct StorageSlot<C> {
    /// Router-to-peer dispatch, and the peer's reply to it.
    channel: C,
    /// Peer-to-router only: reshard-induced ADDs the peer forwards after a
    /// `STORAGE_REBALANCE`, picked up here and re-hashed like any other
    /// request.
    reshard: C,
    inflight: Option<Originator>,
    queue: VecDeque<(Originator, TransportEnvelope)>,
}

/// Router state: the set of clients currently awaiting a reply is kept
/// separate from the active set so "at most one outstanding request per
/// client" falls out of the data structure rather than needing a runtime
/// check.
pub struct Router<C> {
    active_clients: Vec<(u64, C)>,
    waiting_clients: HashMap<u64, C>,
    storages: Vec<StorageSlot<C>>,
    client_seq: u64,
    rebalance_active: bool,
    rebalance_pending: bool,
}

impl<C: Channel> Router<C> {
    pub fn new() -> Self {
        Self {
            active_clients: Vec::new(),
            waiting_clients: HashMap::new(),
            storages: Vec::new(),
            client_seq: 0,
            rebalance_active: false,
            rebalance_pending: false,
        }
    }

    /// Register an already-connected client channel, returning its id.
    pub fn add_client(&mut self, channel: C) -> u64 {
        let id = self.client_seq;
        self.client_seq += 1;
        self.active_clients.push((id, channel));
        id
    }

    /// Register an already-connected storage peer's pair of channels: the
    /// dispatch/reply channel and the reshard-forwarding channel. A peer
    /// join always sets `rebalance_pending`, coalescing with any rebalance
    /// already pending (but not one already in flight, which completes
    /// against the old `N` and triggers a fresh one on its own).
    pub fn add_storage(&mut self, channel: C, reshard: C) -> usize {
        let idx = self.storages.len();
        self.storages.push(StorageSlot {
            channel,
            reshard,
            inflight: None,
            queue: VecDeque::new(),
        });
        self.rebalance_pending = true;
        idx
    }

    pub fn storage_count(&self) -> usize {
        self.storages.len()
    }

    pub fn active_client_count(&self) -> usize {
        self.active_clients.len() + self.waiting_clients.len()
    }

    pub fn rebalance_in_progress(&self) -> bool {
        self.rebalance_active || self.rebalance_pending
    }

    /// One cooperative tick: drain ready client requests, drain ready
    /// storage responses and reshard forwards (dispatching one queued
    /// request per idle storage), then trigger a pending rebalance if none
    /// is in flight.
    pub fn tick(&mut self) {
        self.drain_clients();
        self.drain_reshard_forwards();
        self.drain_storages();
        self.trigger_rebalance();
    }

    fn drain_clients(&mut self) {
        let mut i = 0;
        while i < self.active_clients.len() {
            if self.active_clients[i].1.is_closed() {
                self.active_clients.remove(i);
                continue;
            }
            let message = self.active_clients[i].1.try_recv();
            let Some(incoming) = message else {
                i += 1;
                continue;
            };
            let (client_id, channel) = self.active_clients.remove(i);
            match incoming.op {
                TransportOp::CloseConnection => {}
                TransportOp::Request => self.route_request(client_id, channel, incoming),
                _ => {
                    let mut channel = channel;
                    channel.send(TransportEnvelope::error(TransportOp::Error));
                    self.active_clients.push((client_id, channel));
                }
            }
        }
        // A client waiting on a storage reply can also hang up; treat that
        // the same as an explicit CLOSE_CONNECTION and drop the pending
        // response rather than leaving the entry parked forever.
        self.waiting_clients.retain(|_, channel| !channel.is_closed());
    }

    fn route_request(&mut self, client_id: u64, mut channel: C, incoming: TransportEnvelope) {
        let payload = match &incoming.payload {
            Some(p) => p,
            None => {
                channel.send(TransportEnvelope::error(TransportOp::Error));
                self.active_clients.push((client_id, channel));
                return;
            }
        };
        let req = match RequestEnvelope::decode(payload) {
            Ok(req) => req,
            Err(_) => {
                channel.send(TransportEnvelope::error(TransportOp::Error));
                self.active_clients.push((client_id, channel));
                return;
            }
        };
        if self.storages.is_empty() {
            channel.send(TransportEnvelope::error(TransportOp::Error));
            self.active_clients.push((client_id, channel));
            return;
        }

        if req.code.is_namespace_delete() {
            let n = self.storages.len();
            let state = Rc::new(RefCell::new(FanOutState {
                remaining: n,
                status: false,
                target: Some(client_id),
            }));
            for slot in &mut self.storages {
                slot.queue
                    .push_back((Originator::FanOut(state.clone()), incoming.clone()));
            }
            self.waiting_clients.insert(client_id, channel);
            return;
        }

        let record = match RecordCodec::decode(&req.payload) {
            Ok(record) => record,
            Err(_) => {
                channel.send(TransportEnvelope::error(TransportOp::Error));
                self.active_clients.push((client_id, channel));
                return;
            }
        };
        let shard = (hash_record(&record) as usize) % self.storages.len();
        self.storages[shard]
            .queue
            .push_back((Originator::Single(client_id), incoming));
        self.waiting_clients.insert(client_id, channel);
    }

    /// Pick up ADDs a peer forwarded after a rebalance and re-hash them to
    /// whichever peer now owns them. Nobody is waiting on these, so they're
    /// tagged `Originator::Internal` and dropped silently on completion.
    fn drain_reshard_forwards(&mut self) {
        let n = self.storages.len();
        if n == 0 {
            return;
        }
        for i in 0..n {
            let Some(incoming) = self.storages[i].reshard.try_recv() else {
                continue;
            };
            let shard = match incoming
                .payload
                .as_deref()
                .ok_or(())
                .and_then(|p| RequestEnvelope::decode(p).map_err(|_| ()))
                .and_then(|req| RecordCodec::decode(&req.payload).map_err(|_| ()))
            {
                Ok(record) => (hash_record(&record) as usize) % n,
                Err(_) => {
                    tracing::warn!(peer = i, "dropping malformed reshard-forwarded request");
                    continue;
                }
            };
            self.storages[shard]
                .queue
                .push_back((Originator::Internal, incoming));
        }
    }

    fn drain_storages(&mut self) {
        let mut i = 0;
        while i < self.storages.len() {
            if self.storages[i].channel.is_closed() {
                self.fail_closed_storage(i);
                self.storages.remove(i);
                continue;
            }

            if self.storages[i].inflight.is_none() {
                if let Some((originator, mut envelope)) = self.storages[i].queue.pop_front() {
                    envelope.status = 1;
                    self.storages[i].channel.send(envelope);
                    self.storages[i].inflight = Some(originator);
                }
                i += 1;
                continue;
            }

            let Some(response) = self.storages[i].channel.try_recv() else {
                i += 1;
                continue;
            };
            let originator = self.storages[i].inflight.take().unwrap();
            self.resolve_storage_response(originator, response);
            i += 1;
        }
    }

    /// A peer has disappeared without an explicit close message. Its
    /// in-flight and queued originators are failed with ERROR rather than
    /// left waiting forever, and the slot itself is dropped.
    fn fail_closed_storage(&mut self, idx: usize) {
        let slot = &mut self.storages[idx];
        let inflight = slot.inflight.take();
        let orphaned: Vec<Originator> = inflight
            .into_iter()
            .chain(slot.queue.drain(..).map(|(originator, _)| originator))
            .collect();
        for originator in orphaned {
            self.resolve_storage_response(originator, TransportEnvelope::error(TransportOp::Error));
        }
    }

    /// Route one peer's response (real or synthesized for a dead peer) to
    /// whoever is owed it: a single client, a shared fan-out receipt, or
    /// nobody.
    fn resolve_storage_response(&mut self, originator: Originator, response: TransportEnvelope) {
        match originator {
            Originator::Internal => {}
            Originator::Single(client_id) => {
                if let Some(mut ch) = self.waiting_clients.remove(&client_id) {
                    ch.send(response);
                    self.active_clients.push((client_id, ch));
                }
            }
            Originator::FanOut(state) => {
                // The router-level status byte is always 1 on a real reply
                // (see `drain_storages`'s dispatch, and `bool_response`'s
                // `TransportEnvelope::ok`) regardless of the boolean the
                // peer actually computed; the true/false outcome lives in
                // the payload bytes, not the status bit.
                let ok = response.op != TransportOp::Error && response.payload.as_deref() == Some(b"true");
                let resolved = {
                    let mut st = state.borrow_mut();
                    st.status = st.status || ok;
                    st.remaining -= 1;
                    if st.remaining == 0 {
                        Some((st.status, st.target))
                    } else {
                        None
                    }
                };
                if let Some((final_status, target)) = resolved {
                    match target {
                        Some(client_id) => {
                            if let Some(mut ch) = self.waiting_clients.remove(&client_id) {
                                let reply = if final_status {
                                    TransportEnvelope::ok(TransportOp::Ok, None)
                                } else {
                                    TransportEnvelope::error(TransportOp::Error)
                                };
                                ch.send(reply);
                                self.active_clients.push((client_id, ch));
                            }
                        }
                        None => {
                            tracing::info!("rebalance fan-out resolved");
                            self.rebalance_active = false;
                        }
                    }
                }
            }
        }
    }

    fn trigger_rebalance(&mut self) {
        if self.rebalance_active || !self.rebalance_pending {
            return;
        }
        let n = self.storages.len();
        if n == 0 {
            return;
        }
        tracing::info!(n, "triggering rebalance");
        let mut payload = Vec::new();
        payload.extend_from_slice(&(n as u64).to_ne_bytes());
        let envelope = TransportEnvelope::ok(TransportOp::StorageRebalance, Some(payload));
        let state = Rc::new(RefCell::new(FanOutState {
            remaining: n,
            status: false,
            target: None,
        }));
        for slot in &mut self.storages {
            slot.queue
                .push_back((Originator::FanOut(state.clone()), envelope.clone()));
        }
        self.rebalance_active = true;
        self.rebalance_pending = false;
    }
}

impl<C: Channel> Default for Router<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::protocol::RequestCode;
    use crate::record::Record;

    fn rec(candidate_id: i32, contest_id: i32) -> Record {
        Record {
            candidate_id,
            last_name: "A".into(),
            first_name: "B".into(),
            patronymic: String::new(),
            birth_date: String::new(),
            resume_link: String::new(),
            hr_manager_id: 0,
            contest_id,
            programming_language: "Rust".into(),
            num_tasks: 0,
            solved_tasks: 0,
            cheating_detected: false,
        }
    }

    fn add_envelope(record: &Record) -> TransportEnvelope {
        let req = RequestEnvelope {
            code: RequestCode::Add,
            database: "db".into(),
            schema: "sch".into(),
            table: "tbl".into(),
            payload: RecordCodec::encode(record),
        };
        TransportEnvelope::ok(TransportOp::Request, Some(req.encode()))
    }

    #[test]
    fn request_routes_to_storage_and_reply_comes_back() {
        let mut router: Router<MemoryChannel> = Router::new();
        let (mut client_side, router_client_end) = MemoryChannel::pair();
        router.add_client(router_client_end);

        let (router_storage_end, mut peer_side) = MemoryChannel::pair();
        let (_router_reshard_end, _peer_reshard_end) = MemoryChannel::pair();
        router.add_storage(router_storage_end, _router_reshard_end);

        client_side.send(add_envelope(&rec(1, 1)));
        router.tick(); // client drain enqueues on the one storage
        router.tick(); // storage drain dispatches it

        let forwarded = peer_side.try_recv().unwrap();
        assert_eq!(forwarded.status, 1);
        assert_eq!(forwarded.op, TransportOp::Request);

        peer_side.send(TransportEnvelope::ok(TransportOp::Ok, Some(b"true".to_vec())));
        router.tick();

        let reply = client_side.try_recv().unwrap();
        assert_eq!(reply.payload, Some(b"true".to_vec()));
        assert_eq!(router.active_client_count(), 1);
    }

    fn namespace_delete(router: &mut Router<MemoryChannel>) -> (MemoryChannel, MemoryChannel, MemoryChannel) {
        let (mut client_side, router_client_end) = MemoryChannel::pair();
        router.add_client(router_client_end);

        let (router_peer_a, peer_a) = MemoryChannel::pair();
        let (router_peer_b, peer_b) = MemoryChannel::pair();
        let (reshard_a, _) = MemoryChannel::pair();
        let (reshard_b, _) = MemoryChannel::pair();
        router.add_storage(router_peer_a, reshard_a);
        router.add_storage(router_peer_b, reshard_b);

        let req = RequestEnvelope {
            code: RequestCode::DeleteTable,
            database: "db".into(),
            schema: "sch".into(),
            table: "tbl".into(),
            payload: Vec::new(),
        };
        client_side.send(TransportEnvelope::ok(TransportOp::Request, Some(req.encode())));
        router.tick();
        router.tick();
        (client_side, peer_a, peer_b)
    }

    #[test]
    fn namespace_delete_fans_out_and_aggregates_with_or() {
        let mut router: Router<MemoryChannel> = Router::new();
        let (mut client_side, mut peer_a, mut peer_b) = namespace_delete(&mut router);

        peer_a.try_recv().unwrap();
        peer_b.try_recv().unwrap();
        // Real peer replies: one real `false` (table didn't exist there),
        // one real `true` (it did, and got removed). Both go through the
        // router's status byte the same way `StoragePeer::apply` would
        // (status=1 on every real reply, success or not) so this is what a
        // genuine "one peer had it, one didn't" delete looks like on the
        // wire.
        peer_a.send(TransportEnvelope::ok(TransportOp::Ok, Some(b"false".to_vec())));
        peer_b.send(TransportEnvelope::ok(TransportOp::Ok, Some(b"true".to_vec())));
        router.tick();

        let reply = client_side.try_recv().unwrap();
        assert_eq!(reply.op, TransportOp::Ok, "logical OR: one success is enough");
    }

    #[test]
    fn namespace_delete_reports_failure_when_no_peer_had_it() {
        let mut router: Router<MemoryChannel> = Router::new();
        let (mut client_side, mut peer_a, mut peer_b) = namespace_delete(&mut router);

        peer_a.try_recv().unwrap();
        peer_b.try_recv().unwrap();
        peer_a.send(TransportEnvelope::ok(TransportOp::Ok, Some(b"false".to_vec())));
        peer_b.send(TransportEnvelope::ok(TransportOp::Ok, Some(b"false".to_vec())));
        router.tick();

        let reply = client_side.try_recv().unwrap();
        assert_eq!(reply.op, TransportOp::Error, "every peer genuinely reported false");
    }

    #[test]
    fn joining_a_storage_triggers_exactly_one_rebalance() {
        let mut router: Router<MemoryChannel> = Router::new();
        let (router_peer_a, mut peer_a) = MemoryChannel::pair();
        let (reshard_a, _) = MemoryChannel::pair();
        router.add_storage(router_peer_a, reshard_a);
        router.tick();
        peer_a.try_recv().unwrap(); // initial join still fans out to the lone peer

        let (router_peer_b, mut peer_b) = MemoryChannel::pair();
        let (reshard_b, _) = MemoryChannel::pair();
        router.add_storage(router_peer_b, reshard_b);
        router.tick();
        let msg_a = peer_a.try_recv().unwrap();
        let msg_b = peer_b.try_recv().unwrap();
        assert_eq!(msg_a.op, TransportOp::StorageRebalance);
        assert_eq!(msg_b.op, TransportOp::StorageRebalance);

        peer_a.send(TransportEnvelope::ok(TransportOp::Ok, None));
        peer_b.send(TransportEnvelope::ok(TransportOp::Ok, None));
        router.tick();

        // no further rebalance fires without another join.
        for _ in 0..3 {
            router.tick();
        }
        assert!(peer_a.try_recv().is_none());
        assert!(peer_b.try_recv().is_none());
    }

    #[test]
    fn reshard_forwarded_add_is_rehashed_to_the_right_peer() {
        let mut router: Router<MemoryChannel> = Router::new();
        let (router_peer_a, mut peer_a) = MemoryChannel::pair();
        let (router_peer_b, mut peer_b) = MemoryChannel::pair();
        let (reshard_a, mut peer_a_reshard) = MemoryChannel::pair();
        let (reshard_b, _peer_b_reshard) = MemoryChannel::pair();
        router.add_storage(router_peer_a, reshard_a);
        router.add_storage(router_peer_b, reshard_b);

        // drain the initial two-peer rebalance so it doesn't interfere.
        router.tick();
        peer_a.try_recv().unwrap();
        peer_b.try_recv().unwrap();
        peer_a.send(TransportEnvelope::ok(TransportOp::Ok, None));
        peer_b.send(TransportEnvelope::ok(TransportOp::Ok, None));
        router.tick();

        let record = rec(42, 1);
        let shard = (hash_record(&record) as usize) % 2;
        let req = RequestEnvelope {
            code: RequestCode::Add,
            database: "db".into(),
            schema: "sch".into(),
            table: "tbl".into(),
            payload: RecordCodec::encode(&record),
        };
        peer_a_reshard.send(TransportEnvelope::ok(TransportOp::Request, Some(req.encode())));
        router.tick();

        let landed_on_a = peer_a.try_recv();
        let landed_on_b = peer_b.try_recv();
        if shard == 0 {
            assert!(landed_on_a.is_some());
            assert!(landed_on_b.is_none());
        } else {
            assert!(landed_on_b.is_some());
            assert!(landed_on_a.is_none());
        }
    }

    #[test]
    fn closing_an_idle_client_channel_evicts_it() {
        let mut router: Router<MemoryChannel> = Router::new();
        let (mut client_side, router_client_end) = MemoryChannel::pair();
        router.add_client(router_client_end);
        assert_eq!(router.active_client_count(), 1);

        client_side.close();
        router.tick();
        assert_eq!(router.active_client_count(), 0);
    }

    #[test]
    fn closing_a_waiting_client_drops_its_pending_response() {
        let mut router: Router<MemoryChannel> = Router::new();
        let (mut client_side, router_client_end) = MemoryChannel::pair();
        router.add_client(router_client_end);

        let (router_storage_end, mut peer_side) = MemoryChannel::pair();
        let (_router_reshard_end, _peer_reshard_end) = MemoryChannel::pair();
        router.add_storage(router_storage_end, _router_reshard_end);

        client_side.send(add_envelope(&rec(1, 1)));
        router.tick();
        router.tick();
        peer_side.try_recv().unwrap();

        // the client hangs up while its add is still in flight at the peer.
        client_side.close();
        router.tick();
        assert_eq!(router.active_client_count(), 0);

        peer_side.send(TransportEnvelope::ok(TransportOp::Ok, Some(b"true".to_vec())));
        router.tick();
        // no client left to receive the reply and no panic resolving it.
        assert_eq!(router.active_client_count(), 0);
    }

    #[test]
    fn a_vanished_storage_fails_its_inflight_client_and_is_dropped() {
        let mut router: Router<MemoryChannel> = Router::new();
        let (mut client_side, router_client_end) = MemoryChannel::pair();
        router.add_client(router_client_end);

        let (router_storage_end, mut peer_side) = MemoryChannel::pair();
        let (_router_reshard_end, _peer_reshard_end) = MemoryChannel::pair();
        router.add_storage(router_storage_end, _router_reshard_end);

        client_side.send(add_envelope(&rec(1, 1)));
        router.tick();
        router.tick();
        peer_side.try_recv().unwrap();

        assert_eq!(router.storage_count(), 1);
        peer_side.close();
        router.tick();

        let reply = client_side.try_recv().unwrap();
        assert_eq!(reply.op, TransportOp::Error);
        assert_eq!(router.storage_count(), 0);
    }
}
