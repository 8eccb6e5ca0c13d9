//! `StoragePeer`: owns one partition and the two channels connecting it to
//! the router (inbound requests, outbound reshard-induced ADDs).

use std::collections::VecDeque;

use crate::channel::Channel;
use crate::error::ProtocolError;
use crate::partition::PartitionEngine;
use crate::protocol::{RequestCode, RequestEnvelope, TransportEnvelope, TransportOp};
use crate::record::{hash_record, Record, RecordCodec};

/// A request queued for the outbound channel: either a reshard-induced ADD
/// or (conceptually) any other message this peer initiates toward the
/// router.
struct QueuedRequest {
    envelope: TransportEnvelope,
}

/// One storage node. `id` is assigned at handshake time from the suffix of
/// the connection name the router mints — modeled here as a plain field
/// since connection naming is a transport concern out of this crate's
/// scope.
pub struct StoragePeer<In, Out> {
    id: usize,
    partition: PartitionEngine,
    pub(crate) inbound: In,
    pub(crate) outbound: Out,
    outbound_queue: VecDeque<QueuedRequest>,
    pending_local_deletes: Vec<(String, String, String, Record)>,
}

impl<In: Channel, Out: Channel> StoragePeer<In, Out> {
    pub fn new(id: usize, inbound: In, outbound: Out) -> Self {
        Self {
            id,
            partition: PartitionEngine::new(),
            inbound,
            outbound,
            outbound_queue: VecDeque::new(),
            pending_local_deletes: Vec::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// One cooperative tick: drain one queued outbound send, then handle at
    /// most one inbound message.
    pub fn tick(&mut self) {
        if !self.outbound.is_closed() {
            if let Some(queued) = self.outbound_queue.pop_front() {
                self.outbound.send(queued.envelope);
            }
        }

        let Some(incoming) = self.inbound.try_recv() else {
            return;
        };

        match incoming.op {
            TransportOp::Request => self.handle_request(incoming),
            TransportOp::StorageRebalance => self.handle_rebalance(incoming),
            other => {
                tracing::debug!(peer = self.id, op = ?other, "ignoring unexpected transport op");
            }
        }
    }

    fn handle_request(&mut self, incoming: TransportEnvelope) {
        let payload = match &incoming.payload {
            Some(p) => p,
            None => {
                self.inbound.send(TransportEnvelope::error(TransportOp::Error));
                return;
            }
        };
        let response = match RequestEnvelope::decode(payload) {
            Ok(req) => self.apply(&req),
            Err(_) => TransportEnvelope::error(TransportOp::Error),
        };
        self.inbound.send(response);
    }

    fn apply(&mut self, req: &RequestEnvelope) -> TransportEnvelope {
        tracing::debug!(peer = self.id, code = ?req.code, db = %req.database, "applying request");
        match req.code {
            RequestCode::Add => match RecordCodec::decode(&req.payload) {
                Ok(record) => {
                    let ok = self.partition.add(&req.database, &req.schema, &req.table, record);
                    bool_response(ok)
                }
                Err(_) => TransportEnvelope::error(TransportOp::Error),
            },
            RequestCode::Contains => match RecordCodec::decode(&req.payload) {
                Ok(record) => bool_response(self.partition.contains(&req.database, &req.schema, &req.table, &record)),
                Err(_) => TransportEnvelope::error(TransportOp::Error),
            },
            RequestCode::Remove => match RecordCodec::decode(&req.payload) {
                Ok(record) => bool_response(self.partition.remove(&req.database, &req.schema, &req.table, &record)),
                Err(_) => TransportEnvelope::error(TransportOp::Error),
            },
            RequestCode::GetKey => match RecordCodec::decode(&req.payload) {
                Ok(probe) => match self.partition.get_key(&req.database, &req.schema, &req.table, &probe) {
                    Some(found) => TransportEnvelope::ok(TransportOp::Ok, Some(RecordCodec::encode(found))),
                    None => TransportEnvelope::ok(TransportOp::Ok, None),
                },
                Err(_) => TransportEnvelope::error(TransportOp::Error),
            },
            RequestCode::DeleteDatabase => bool_response(self.partition.delete_database(&req.database)),
            RequestCode::DeleteSchema => bool_response(self.partition.delete_schema(&req.database, &req.schema)),
            RequestCode::DeleteTable => {
                bool_response(self.partition.delete_table(&req.database, &req.schema, &req.table))
            }
        }
    }

    /// `STORAGE_REBALANCE(N)`: figure out which of our records no longer
    /// belong to us under the new peer count, queue an ADD for each onto
    /// the outbound channel, ACK immediately, then remove them locally.
    fn handle_rebalance(&mut self, incoming: TransportEnvelope) {
        let n = match incoming
            .payload
            .as_deref()
            .and_then(|p| p.get(0..8))
            .map(|b| u64::from_ne_bytes(b.try_into().unwrap()))
        {
            Some(n) => n as usize,
            None => {
                self.inbound.send(TransportEnvelope::error(TransportOp::Error));
                return;
            }
        };

        tracing::info!(peer = self.id, n, "rebalance starting");

        for (db, schema, table, record) in self.partition.iter_all() {
            if (hash_record(record) as usize) % n != self.id {
                let envelope = RequestEnvelope {
                    code: RequestCode::Add,
                    database: db.to_owned(),
                    schema: schema.to_owned(),
                    table: table.to_owned(),
                    payload: RecordCodec::encode(record),
                };
                self.outbound_queue.push_back(QueuedRequest {
                    envelope: TransportEnvelope::ok(TransportOp::Request, Some(envelope.encode())),
                });
                self.pending_local_deletes
                    .push((db.to_owned(), schema.to_owned(), table.to_owned(), record.clone()));
            }
        }

        self.inbound.send(TransportEnvelope::ok(TransportOp::Ok, None));

        for (db, schema, table, record) in self.pending_local_deletes.drain(..) {
            self.partition.remove(&db, &schema, &table, &record);
        }

        tracing::info!(peer = self.id, "rebalance finished");
    }
}

fn bool_response(value: bool) -> TransportEnvelope {
    let payload = if value { b"true".to_vec() } else { b"false".to_vec() };
    TransportEnvelope::ok(TransportOp::Ok, Some(payload))
}

impl From<ProtocolError> for TransportEnvelope {
    fn from(_: ProtocolError) -> Self {
        TransportEnvelope::error(TransportOp::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;

    fn sample_record(candidate_id: i32) -> Record {
        Record {
            candidate_id,
            last_name: "Doe".into(),
            first_name: "Jane".into(),
            patronymic: String::new(),
            birth_date: "2001-01-01".into(),
            resume_link: String::new(),
            hr_manager_id: 1,
            contest_id: 1,
            programming_language: "Rust".into(),
            num_tasks: 3,
            solved_tasks: 3,
            cheating_detected: false,
        }
    }

    fn add_request(record: &Record) -> TransportEnvelope {
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
    fn add_request_applies_and_acks() {
        let (mut router_side, peer_side) = MemoryChannel::pair();
        let (_, peer_out) = MemoryChannel::pair();
        let mut peer = StoragePeer::new(0, peer_side, peer_out);
        router_side.send(add_request(&sample_record(1)));
        peer.tick();
        let response = router_side.try_recv().unwrap();
        assert_eq!(response.payload, Some(b"true".to_vec()));
    }

    #[test]
    fn malformed_payload_yields_error_response() {
        let (mut router_side, peer_side) = MemoryChannel::pair();
        let (peer_out, _router_in) = MemoryChannel::pair();
        let mut peer = StoragePeer::new(0, peer_side, peer_out);
        router_side.send(TransportEnvelope::ok(TransportOp::Request, Some(vec![99])));
        peer.tick();
        let response = router_side.try_recv().unwrap();
        assert_eq!(response.status, 0);
        assert_eq!(response.op, TransportOp::Error);
    }

    #[test]
    fn rebalance_queues_non_owned_records_for_outbound_add() {
        let (mut router_side, peer_side) = MemoryChannel::pair();
        let (mut router_in, peer_out) = MemoryChannel::pair();
        let mut peer = StoragePeer::new(0, peer_side, peer_out);

        for candidate in 1..=20 {
            router_side.send(add_request(&sample_record(candidate)));
            peer.tick();
            router_side.try_recv();
        }

        let mut payload = Vec::new();
        payload.extend_from_slice(&(2u64).to_ne_bytes());
        router_side.send(TransportEnvelope::ok(TransportOp::StorageRebalance, Some(payload)));
        peer.tick();
        let ack = router_side.try_recv().unwrap();
        assert_eq!(ack.op, TransportOp::Ok);

        // every record whose hash%2 != 0 should now be queued for the peer
        // that actually owns it, and removed from our own partition. Each
        // tick drains at most one queued send, so tick until empty.
        let mut queued = 0;
        loop {
            peer.tick();
            if router_in.try_recv().is_some() {
                queued += 1;
            } else {
                break;
            }
        }
        assert!(queued > 0);
    }
}
