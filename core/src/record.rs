//! `Record`: the value type stored in every partition's `OrderedMap`, and
//! its canonical (length-prefixed, write-once) wire encoding.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::{ProtocolError, ProtocolResult};

/// A candidate's contest submission. Keyed by `(candidate_id, contest_id)`;
/// every other field is payload and plays no part in equality, ordering, or
/// hashing.
#[derive(Debug, Clone)]
pub struct Record {
    pub candidate_id: i32,
    pub last_name: String,
    pub first_name: String,
    pub patronymic: String,
    pub birth_date: String,
    pub resume_link: String,
    pub hr_manager_id: i32,
    pub contest_id: i32,
    pub programming_language: String,
    pub num_tasks: i32,
    pub solved_tasks: i32,
    pub cheating_detected: bool,
}

impl Record {
    /// A record carrying only the key, for use as a search probe against a
    /// table's `OrderedMap<Record, ()>` without allocating the payload.
    pub fn search_key(candidate_id: i32, contest_id: i32) -> Self {
        Self {
            candidate_id,
            last_name: String::new(),
            first_name: String::new(),
            patronymic: String::new(),
            birth_date: String::new(),
            resume_link: String::new(),
            hr_manager_id: 0,
            contest_id,
            programming_language: String::new(),
            num_tasks: 0,
            solved_tasks: 0,
            cheating_detected: false,
        }
    }

    fn key(&self) -> (i32, i32) {
        (self.contest_id, self.candidate_id)
    }
}

/// Hash a record by its key only, for routing (`hash(record) mod N`). Uses
/// `DefaultHasher` rather than reproducing the source's bespoke
/// `candidate_id ^ (contest_id << 1)` mix — any deterministic, uniform hash
/// over the key satisfies the routing invariant.
pub fn hash_record(record: &Record) -> u64 {
    let mut hasher = DefaultHasher::new();
    record.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.candidate_id == other.candidate_id && self.contest_id == other.contest_id
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.candidate_id.hash(state);
        self.contest_id.hash(state);
    }
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

fn write_field(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&s.len().to_ne_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn read_field<'a>(buf: &'a [u8], cursor: &mut usize) -> ProtocolResult<&'a str> {
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
    let s = std::str::from_utf8(&buf[*cursor..*cursor + len])
        .map_err(|_| ProtocolError::Truncated { expected: *cursor + len, got: buf.len() })?;
    *cursor += len;
    Ok(s)
}

fn write_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_ne_bytes());
}

fn read_i32(buf: &[u8], cursor: &mut usize) -> ProtocolResult<i32> {
    if buf.len() < *cursor + 4 {
        return Err(ProtocolError::Truncated {
            expected: *cursor + 4,
            got: buf.len(),
        });
    }
    let v = i32::from_ne_bytes(buf[*cursor..*cursor + 4].try_into().unwrap());
    *cursor += 4;
    Ok(v)
}

/// Encodes and decodes a [`Record`] as a self-describing sequence of
/// length-prefixed fields, in declared order, each field written exactly
/// once (see DESIGN.md for the original bug this intentionally avoids).
pub struct RecordCodec;

impl RecordCodec {
    pub fn encode(record: &Record) -> Vec<u8> {
        let mut buf = Vec::new();
        write_i32(&mut buf, record.candidate_id);
        write_field(&mut buf, &record.last_name);
        write_field(&mut buf, &record.first_name);
        write_field(&mut buf, &record.patronymic);
        write_field(&mut buf, &record.birth_date);
        write_field(&mut buf, &record.resume_link);
        write_i32(&mut buf, record.hr_manager_id);
        write_i32(&mut buf, record.contest_id);
        write_field(&mut buf, &record.programming_language);
        write_i32(&mut buf, record.num_tasks);
        write_i32(&mut buf, record.solved_tasks);
        buf.push(record.cheating_detected as u8);
        buf
    }

    pub fn decode(buf: &[u8]) -> ProtocolResult<Record> {
        let mut cursor = 0usize;
        let candidate_id = read_i32(buf, &mut cursor)?;
        let last_name = read_field(buf, &mut cursor)?.to_owned();
        let first_name = read_field(buf, &mut cursor)?.to_owned();
        let patronymic = read_field(buf, &mut cursor)?.to_owned();
        let birth_date = read_field(buf, &mut cursor)?.to_owned();
        let resume_link = read_field(buf, &mut cursor)?.to_owned();
        let hr_manager_id = read_i32(buf, &mut cursor)?;
        let contest_id = read_i32(buf, &mut cursor)?;
        let programming_language = read_field(buf, &mut cursor)?.to_owned();
        let num_tasks = read_i32(buf, &mut cursor)?;
        let solved_tasks = read_i32(buf, &mut cursor)?;
        if buf.len() < cursor + 1 {
            return Err(ProtocolError::Truncated {
                expected: cursor + 1,
                got: buf.len(),
            });
        }
        let cheating_detected = buf[cursor] != 0;
        Ok(Record {
            candidate_id,
            last_name,
            first_name,
            patronymic,
            birth_date,
            resume_link,
            hr_manager_id,
            contest_id,
            programming_language,
            num_tasks,
            solved_tasks,
            cheating_detected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            candidate_id: 100,
            last_name: "Ivanov".into(),
            first_name: "Ivan".into(),
            patronymic: "Ivanovich".into(),
            birth_date: "2000-01-01".into(),
            resume_link: "https://example.test/cv".into(),
            hr_manager_id: 7,
            contest_id: 5,
            programming_language: "Rust".into(),
            num_tasks: 10,
            solved_tasks: 8,
            cheating_detected: false,
        }
    }

    #[test]
    fn roundtrip_is_exact() {
        let rec = sample();
        let bytes = RecordCodec::encode(&rec);
        let decoded = RecordCodec::decode(&bytes).unwrap();
        assert_eq!(decoded.candidate_id, rec.candidate_id);
        assert_eq!(decoded.last_name, rec.last_name);
        assert_eq!(decoded.programming_language, rec.programming_language);
        assert_eq!(decoded.solved_tasks, rec.solved_tasks);
        assert_eq!(decoded.cheating_detected, rec.cheating_detected);
    }

    #[test]
    fn encoding_writes_each_field_once() {
        let rec = sample();
        let bytes = RecordCodec::encode(&rec);
        // exactly: 3 i32 fields before programming_language's length prefix,
        // the rest is 5 length-prefixed strings + 3 i32 + 1 bool; reencoding
        // a decoded record must reproduce the same byte length, which would
        // not hold if any field were duplicated.
        let decoded = RecordCodec::decode(&bytes).unwrap();
        let reencoded = RecordCodec::encode(&decoded);
        assert_eq!(bytes, reencoded);
    }

    #[test]
    fn equality_and_ordering_use_key_only() {
        let mut a = sample();
        let mut b = sample();
        b.last_name = "Petrov".into();
        assert_eq!(a, b);

        a.contest_id = 1;
        b.contest_id = 2;
        assert!(a < b);

        a.contest_id = b.contest_id;
        a.candidate_id = 1;
        b.candidate_id = 2;
        assert!(a < b);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let rec = sample();
        let bytes = RecordCodec::encode(&rec);
        let err = RecordCodec::decode(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }
}
