//! `ClientStub`: the typed request builder a CLI or test harness drives
//! against one `Channel` to a `Router`. Connection-name handshaking
//! (`GET_CONNECTION_CLIENT`) is elided along with the rest of transport
//! minting — a stub is constructed directly from an already-registered
//! channel.

use thiserror::Error;

use crate::channel::Channel;
use crate::protocol::{RequestCode, RequestEnvelope, TransportEnvelope, TransportOp};
use crate::record::{Record, RecordCodec};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("a request is already awaiting a reply")]
    RequestInFlight,
    #[error("no reply is pending")]
    NoRequestInFlight,
    #[error("router replied with an error")]
    RouterError,
    #[error("malformed reply payload")]
    MalformedReply,
}

pub type ClientResult<T> = Result<T, ClientError>;

/// The decoded outcome of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Bool(bool),
    Record(Option<Record>),
    Ack,
}

/// One client's view of its connection to a `Router`. At most one request
/// may be outstanding at a time, mirroring the router's own per-client
/// bookkeeping. The in-flight request's code is kept around so `poll` can
/// tell a `GetKey` miss (reply with no payload) apart from a plain ack.
pub struct ClientStub<C> {
    channel: C,
    awaiting: Option<RequestCode>,
}

impl<C: Channel> ClientStub<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            awaiting: None,
        }
    }

    fn send_request(&mut self, req: RequestEnvelope) -> ClientResult<()> {
        if self.awaiting.is_some() {
            return Err(ClientError::RequestInFlight);
        }
        let code = req.code;
        self.channel
            .send(TransportEnvelope::ok(TransportOp::Request, Some(req.encode())));
        self.awaiting = Some(code);
        Ok(())
    }

    pub fn add(&mut self, database: &str, schema: &str, table: &str, record: &Record) -> ClientResult<()> {
        self.send_request(RequestEnvelope {
            code: RequestCode::Add,
            database: database.to_owned(),
            schema: schema.to_owned(),
            table: table.to_owned(),
            payload: RecordCodec::encode(record),
        })
    }

    pub fn contains(&mut self, database: &str, schema: &str, table: &str, record: &Record) -> ClientResult<()> {
        self.send_request(RequestEnvelope {
            code: RequestCode::Contains,
            database: database.to_owned(),
            schema: schema.to_owned(),
            table: table.to_owned(),
            payload: RecordCodec::encode(record),
        })
    }

    pub fn remove(&mut self, database: &str, schema: &str, table: &str, record: &Record) -> ClientResult<()> {
        self.send_request(RequestEnvelope {
            code: RequestCode::Remove,
            database: database.to_owned(),
            schema: schema.to_owned(),
            table: table.to_owned(),
            payload: RecordCodec::encode(record),
        })
    }

    pub fn get_key(&mut self, database: &str, schema: &str, table: &str, probe: &Record) -> ClientResult<()> {
        self.send_request(RequestEnvelope {
            code: RequestCode::GetKey,
            database: database.to_owned(),
            schema: schema.to_owned(),
            table: table.to_owned(),
            payload: RecordCodec::encode(probe),
        })
    }

    pub fn delete_database(&mut self, database: &str) -> ClientResult<()> {
        self.send_request(RequestEnvelope {
            code: RequestCode::DeleteDatabase,
            database: database.to_owned(),
            schema: String::new(),
            table: String::new(),
            payload: Vec::new(),
        })
    }

    pub fn delete_schema(&mut self, database: &str, schema: &str) -> ClientResult<()> {
        self.send_request(RequestEnvelope {
            code: RequestCode::DeleteSchema,
            database: database.to_owned(),
            schema: schema.to_owned(),
            table: String::new(),
            payload: Vec::new(),
        })
    }

    pub fn delete_table(&mut self, database: &str, schema: &str, table: &str) -> ClientResult<()> {
        self.send_request(RequestEnvelope {
            code: RequestCode::DeleteTable,
            database: database.to_owned(),
            schema: schema.to_owned(),
            table: table.to_owned(),
            payload: Vec::new(),
        })
    }

    /// Non-blocking: `Ok(None)` if the router hasn't replied yet, `Err` if
    /// no request was ever sent or the router signaled failure.
    pub fn poll(&mut self) -> ClientResult<Option<Reply>> {
        let Some(code) = self.awaiting else {
            return Err(ClientError::NoRequestInFlight);
        };
        let Some(envelope) = self.channel.try_recv() else {
            return Ok(None);
        };
        self.awaiting = None;
        if envelope.op == TransportOp::Error || envelope.status == 0 {
            return Err(ClientError::RouterError);
        }
        match &envelope.payload {
            // A GetKey miss is a real answer (no record at that key), not
            // a bare acknowledgment — every other request code that
            // replies with no payload really is just an ack.
            None if code == RequestCode::GetKey => Ok(Some(Reply::Record(None))),
            None => Ok(Some(Reply::Ack)),
            Some(bytes) => match bytes.as_slice() {
                b"true" => Ok(Some(Reply::Bool(true))),
                b"false" => Ok(Some(Reply::Bool(false))),
                other => RecordCodec::decode(other)
                    .map(|record| Some(Reply::Record(Some(record))))
                    .map_err(|_| ClientError::MalformedReply),
            },
        }
    }

    pub fn close(mut self) {
        self.channel.send(TransportEnvelope::ok(TransportOp::CloseConnection, None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;

    fn rec(candidate_id: i32) -> Record {
        Record {
            candidate_id,
            last_name: "Doe".into(),
            first_name: "Jane".into(),
            patronymic: String::new(),
            birth_date: String::new(),
            resume_link: String::new(),
            hr_manager_id: 0,
            contest_id: 1,
            programming_language: "Rust".into(),
            num_tasks: 0,
            solved_tasks: 0,
            cheating_detected: false,
        }
    }

    #[test]
    fn second_request_before_a_reply_is_rejected() {
        let (_, channel) = MemoryChannel::pair();
        let mut client = ClientStub::new(channel);
        client.add("db", "sch", "tbl", &rec(1)).unwrap();
        let err = client.add("db", "sch", "tbl", &rec(2)).unwrap_err();
        assert_eq!(err, ClientError::RequestInFlight);
    }

    #[test]
    fn poll_before_any_request_is_an_error() {
        let (_, channel) = MemoryChannel::pair();
        let mut client = ClientStub::new(channel);
        assert_eq!(client.poll().unwrap_err(), ClientError::NoRequestInFlight);
    }

    #[test]
    fn bool_reply_decodes_and_clears_awaiting() {
        let (mut router_side, channel) = MemoryChannel::pair();
        let mut client = ClientStub::new(channel);
        client.contains("db", "sch", "tbl", &rec(1)).unwrap();
        assert!(client.poll().unwrap().is_none());
        router_side.send(TransportEnvelope::ok(TransportOp::Ok, Some(b"true".to_vec())));
        assert_eq!(client.poll().unwrap(), Some(Reply::Bool(true)));
        // a fresh request is accepted now that the prior one resolved.
        client.contains("db", "sch", "tbl", &rec(2)).unwrap();
    }

    #[test]
    fn error_reply_surfaces_as_router_error() {
        let (mut router_side, channel) = MemoryChannel::pair();
        let mut client = ClientStub::new(channel);
        client.remove("db", "sch", "tbl", &rec(1)).unwrap();
        router_side.send(TransportEnvelope::error(TransportOp::Error));
        assert_eq!(client.poll().unwrap_err(), ClientError::RouterError);
    }

    #[test]
    fn get_key_miss_decodes_as_an_empty_record_not_an_ack() {
        let (mut router_side, channel) = MemoryChannel::pair();
        let mut client = ClientStub::new(channel);
        client.get_key("db", "sch", "tbl", &rec(1)).unwrap();
        router_side.send(TransportEnvelope::ok(TransportOp::Ok, None));
        assert_eq!(client.poll().unwrap(), Some(Reply::Record(None)));
    }

    #[test]
    fn delete_reply_with_no_payload_is_still_an_ack() {
        let (mut router_side, channel) = MemoryChannel::pair();
        let mut client = ClientStub::new(channel);
        client.delete_table("db", "sch", "tbl").unwrap();
        router_side.send(TransportEnvelope::ok(TransportOp::Ok, None));
        assert_eq!(client.poll().unwrap(), Some(Reply::Ack));
    }
}
