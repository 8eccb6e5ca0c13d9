//! Wire protocol: request codes, the client→router→peer request envelope,
//! and the transport envelope every channel message is wrapped in.

use crate::error::{ProtocolError, ProtocolResult};

/// The literal sentinel payload meaning "no data", distinct from any valid
/// payload (which is always binary, never this exact ASCII string).
pub const NULL_DATA: &[u8] = b"null";

/// Operation requested of a `PartitionEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCode {
    Add = 10,
    Contains = 11,
    Remove = 12,
    GetKey = 13,
    DeleteDatabase = 14,
    DeleteSchema = 15,
    DeleteTable = 16,
}

impl RequestCode {
    pub fn from_u8(b: u8) -> ProtocolResult<Self> {
        match b {
            10 => Ok(Self::Add),
            11 => Ok(Self::Contains),
            12 => Ok(Self::Remove),
            13 => Ok(Self::GetKey),
            14 => Ok(Self::DeleteDatabase),
            15 => Ok(Self::DeleteSchema),
            16 => Ok(Self::DeleteTable),
            other => Err(ProtocolError::UnknownRequestCode(other)),
        }
    }

    /// Whether this code addresses an entire namespace level rather than a
    /// single record — these are the codes the Router fans out to every
    /// peer instead of routing by hash.
    pub fn is_namespace_delete(self) -> bool {
        matches!(self, Self::DeleteDatabase | Self::DeleteSchema | Self::DeleteTable)
    }
}

/// A typed request travelling from `ClientStub` to a `StoragePeer`,
/// addressed by namespace path. `payload` carries the encoded `Record` for
/// `Add`/`Contains`/`Remove`/`GetKey`; empty for the `DELETE_*` codes.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub code: RequestCode,
    pub database: String,
    pub schema: String,
    pub table: String,
    pub payload: Vec<u8>,
}

impl RequestEnvelope {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(self.code as u8);
        write_str(&mut buf, &self.database);
        write_str(&mut buf, &self.schema);
        write_str(&mut buf, &self.table);
        write_bytes(&mut buf, &self.payload);
        buf
    }

    pub fn decode(buf: &[u8]) -> ProtocolResult<Self> {
        let mut cursor = 0usize;
        if buf.is_empty() {
            return Err(ProtocolError::Truncated { expected: 1, got: 0 });
        }
        let code = RequestCode::from_u8(buf[0])?;
        cursor += 1;
        let database = read_str(buf, &mut cursor)?;
        let schema = read_str(buf, &mut cursor)?;
        let table = read_str(buf, &mut cursor)?;
        let payload = read_bytes(buf, &mut cursor)?;
        Ok(Self {
            code,
            database,
            schema,
            table,
            payload,
        })
    }
}

/// Transport-level operation code, the first byte a channel message carries
/// after the status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOp {
    Request = 10,
    Log = 13,
    GetConnectionClient = 14,
    CloseConnection = 15,
    GetConnectionStorage = 16,
    Ok = 20,
    Error = 21,
    StorageRebalance = 30,
}

impl TransportOp {
    pub fn from_u8(b: u8) -> ProtocolResult<Self> {
        match b {
            10 => Ok(Self::Request),
            13 => Ok(Self::Log),
            14 => Ok(Self::GetConnectionClient),
            15 => Ok(Self::CloseConnection),
            16 => Ok(Self::GetConnectionStorage),
            20 => Ok(Self::Ok),
            21 => Ok(Self::Error),
            30 => Ok(Self::StorageRebalance),
            other => Err(ProtocolError::UnknownOp(other)),
        }
    }
}

/// One message exchanged over a `Channel`: a status byte (set by the
/// receiving side, written last so the sender observes body-before-status
/// ordering), an op code, and an optional payload (`None` encodes as
/// [`NULL_DATA`]).
#[derive(Debug, Clone)]
pub struct TransportEnvelope {
    pub status: u8,
    pub op: TransportOp,
    pub payload: Option<Vec<u8>>,
}

impl TransportEnvelope {
    pub fn new(status: u8, op: TransportOp, payload: Option<Vec<u8>>) -> Self {
        Self { status, op, payload }
    }

    pub fn ok(op: TransportOp, payload: Option<Vec<u8>>) -> Self {
        Self::new(1, op, payload)
    }

    pub fn error(op: TransportOp) -> Self {
        Self::new(0, op, None)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + std::mem::size_of::<usize>());
        buf.push(self.status);
        buf.push(self.op as u8);
        match &self.payload {
            Some(data) => write_bytes(&mut buf, data),
            None => write_bytes(&mut buf, NULL_DATA),
        }
        buf
    }

    pub fn decode(buf: &[u8]) -> ProtocolResult<Self> {
        if buf.len() < 2 {
            return Err(ProtocolError::Truncated { expected: 2, got: buf.len() });
        }
        let status = buf[0];
        let op = TransportOp::from_u8(buf[1])?;
        let mut cursor = 2usize;
        let raw = read_bytes(buf, &mut cursor)?;
        let payload = if raw == NULL_DATA { None } else { Some(raw) };
        Ok(Self { status, op, payload })
    }
}

fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&data.len().to_ne_bytes());
    buf.extend_from_slice(data);
}

fn read_bytes(buf: &[u8], cursor: &mut usize) -> ProtocolResult<Vec<u8>> {
    let prefix = std::mem::size_of::<usize>();
    if buf.len() < *cursor + prefix {
        return Err(ProtocolError::Truncated {
            expected: *cursor + prefix,
            got: buf.len(),
        });
    }
    let len = usize::from_ne_bytes(buf[*cursor..*cursor + prefix].try_into().unwrap());
    *cursor += prefix;
    if buf.len() < *cursor + len {
        return Err(ProtocolError::Truncated {
            expected: *cursor + len,
            got: buf.len(),
        });
    }
    let data = buf[*cursor..*cursor + len].to_vec();
    *cursor += len;
    Ok(data)
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_bytes(buf, s.as_bytes());
}

fn read_str(buf: &[u8], cursor: &mut usize) -> ProtocolResult<String> {
    let bytes = read_bytes(buf, cursor)?;
    String::from_utf8(bytes).map_err(|_| ProtocolError::MissingPayload)
}
