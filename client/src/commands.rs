//! The command-file/interactive-menu grammar: `;`-separated verb plus
//! arguments per line, one record's fields as a `CONTEST_INFO` sub-field
//! of space-separated tokens.

use shardmap_core::record::Record;

#[derive(Debug)]
pub enum CommandError {
    Empty,
    UnknownVerb(String),
    WrongArity { verb: &'static str, expected: usize, got: usize },
    MalformedRecord(String),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownVerb(v) => write!(f, "invalid command: {v}"),
            Self::WrongArity { verb, expected, got } => {
                write!(f, "{verb} expects {expected} fields, got {got}")
            }
            Self::MalformedRecord(reason) => write!(f, "malformed contest info: {reason}"),
        }
    }
}

impl std::error::Error for CommandError {}

#[derive(Debug)]
pub enum Command {
    Add { database: String, schema: String, table: String, record: Record },
    Get { database: String, schema: String, table: String, candidate_id: i32, contest_id: i32 },
    Contains { database: String, schema: String, table: String, record: Record },
    Remove { database: String, schema: String, table: String, record: Record },
    RemoveDatabase { database: String },
    RemoveSchema { database: String, schema: String },
    RemoveTable { database: String, schema: String, table: String },
}

/// Parse one `CONTEST_INFO` sub-field: 12 space-separated tokens in
/// declared field order, the same as every other field in `Record`.
pub fn parse_record(text: &str) -> Result<Record, CommandError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() != 12 {
        return Err(CommandError::MalformedRecord(format!(
            "expected 12 fields, got {}",
            tokens.len()
        )));
    }
    let parse_i32 = |s: &str| s.parse::<i32>().map_err(|_| CommandError::MalformedRecord(format!("not an integer: {s}")));
    Ok(Record {
        candidate_id: parse_i32(tokens[0])?,
        last_name: tokens[1].to_owned(),
        first_name: tokens[2].to_owned(),
        patronymic: tokens[3].to_owned(),
        birth_date: tokens[4].to_owned(),
        resume_link: tokens[5].to_owned(),
        hr_manager_id: parse_i32(tokens[6])?,
        contest_id: parse_i32(tokens[7])?,
        programming_language: tokens[8].to_owned(),
        num_tasks: parse_i32(tokens[9])?,
        solved_tasks: parse_i32(tokens[10])?,
        cheating_detected: tokens[11] == "true",
    })
}

/// Parse one `;`-separated command line.
pub fn parse_line(line: &str) -> Result<Command, CommandError> {
    let fields: Vec<&str> = line.split(';').collect();
    let verb = fields.first().copied().unwrap_or("");
    if verb.is_empty() {
        return Err(CommandError::Empty);
    }
    match verb {
        "ADD" => {
            check_arity("ADD", &fields, 5)?;
            Ok(Command::Add {
                database: fields[1].to_owned(),
                schema: fields[2].to_owned(),
                table: fields[3].to_owned(),
                record: parse_record(fields[4])?,
            })
        }
        "GET" => {
            check_arity("GET", &fields, 6)?;
            let candidate_id = fields[4].parse().map_err(|_| CommandError::MalformedRecord("candidate id".into()))?;
            let contest_id = fields[5].parse().map_err(|_| CommandError::MalformedRecord("contest id".into()))?;
            Ok(Command::Get {
                database: fields[1].to_owned(),
                schema: fields[2].to_owned(),
                table: fields[3].to_owned(),
                candidate_id,
                contest_id,
            })
        }
        "CONTAINS" => {
            check_arity("CONTAINS", &fields, 5)?;
            Ok(Command::Contains {
                database: fields[1].to_owned(),
                schema: fields[2].to_owned(),
                table: fields[3].to_owned(),
                record: parse_record(fields[4])?,
            })
        }
        "REMOVE" => {
            check_arity("REMOVE", &fields, 5)?;
            Ok(Command::Remove {
                database: fields[1].to_owned(),
                schema: fields[2].to_owned(),
                table: fields[3].to_owned(),
                record: parse_record(fields[4])?,
            })
        }
        "REMOVE_DATABASE" => {
            check_arity("REMOVE_DATABASE", &fields, 2)?;
            Ok(Command::RemoveDatabase { database: fields[1].to_owned() })
        }
        "REMOVE_SCHEMA" => {
            check_arity("REMOVE_SCHEMA", &fields, 3)?;
            Ok(Command::RemoveSchema {
                database: fields[1].to_owned(),
                schema: fields[2].to_owned(),
            })
        }
        "REMOVE_TABLE" => {
            check_arity("REMOVE_TABLE", &fields, 4)?;
            Ok(Command::RemoveTable {
                database: fields[1].to_owned(),
                schema: fields[2].to_owned(),
                table: fields[3].to_owned(),
            })
        }
        other => Err(CommandError::UnknownVerb(other.to_owned())),
    }
}

fn check_arity(verb: &'static str, fields: &[&str], expected: usize) -> Result<(), CommandError> {
    if fields.len() != expected {
        return Err(CommandError::WrongArity { verb, expected, got: fields.len() });
    }
    Ok(())
}
