use crate::core::db::Session;
use crate::core::{CommandResult, Result, SessionError};
use crate::document::{render, render_document, to_document, to_documents};
use mongodb::bson::Document;
use serde_json::Value;
use std::io::{BufRead, Write};

/// Represents a parsed shell command.
#[derive(Debug, PartialEq)]
pub enum Command {
    Connect,
    Use(String),
    Coll(String),
    Close,
    Status,
    Help,
    Quit,
    InsertOne(Document),
    InsertMany(Vec<Document>),
    Find { filter: Document, limit: u64 },
    UpdateOne { filter: Document, update: Document },
    UpdateMany { filter: Document, update: Document },
    DeleteOne(Document),
    DeleteMany(Document),
    /// A known command with unusable arguments
    Invalid(String),
    Unknown(String),
}

const CRUD_COMMANDS: [&str; 7] = [
    "insert_one",
    "insert_many",
    "find",
    "update_one",
    "update_many",
    "delete_one",
    "delete_many",
];

const HELP: &str = "\
Available commands:
  :connect - (Re)connect to the server
  :use <db> - Select a database
  :coll <name> - Select a collection in the current database
  :close - Close the connection
  :status - Show the connection state
  :help - List all available commands
  :quit - Exit the shell
  insert_one <doc> - Insert one document
  insert_many [<doc>, ...] - Insert several documents
  find [filter] [limit] - Fetch documents, limit 0 means all
  update_one <filter> <update> - Update the first matching document
  update_many <filter> <update> - Update every matching document
  delete_one <filter> - Delete the first matching document
  delete_many [filter] - Delete every matching document

Arguments are JSON values separated by whitespace; extended JSON such as
{\"_id\": {\"$oid\": \"...\"}} is accepted.";

/// Parses a user input line into a corresponding `Command`.
///
/// Lines starting with a colon (`:`) control the session; anything else is a
/// CRUD command followed by JSON arguments.
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    if let Some(trimmed) = input.strip_prefix(':') {
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        return match parts.as_slice() {
            ["connect"] => Command::Connect,
            ["use", name] => Command::Use(name.to_string()),
            ["coll", name] => Command::Coll(name.to_string()),
            ["close"] => Command::Close,
            ["status"] => Command::Status,
            ["help"] => Command::Help,
            ["quit"] | ["q"] => Command::Quit,
            _ => Command::Unknown(input.to_string()),
        };
    }

    let (name, rest) = input.split_once(char::is_whitespace).unwrap_or((input, ""));
    if !CRUD_COMMANDS.contains(&name) {
        return Command::Unknown(input.to_string());
    }
    let args = match json_args(rest) {
        Ok(args) => args,
        Err(e) => return Command::Invalid(format!("{name}: {e}")),
    };
    let parsed = match name {
        "insert_one" => single(args).and_then(to_document).map(Command::InsertOne),
        "insert_many" => single(args).and_then(to_documents).map(Command::InsertMany),
        "find" => find_args(args),
        "update_one" => pair(args).map(|(filter, update)| Command::UpdateOne { filter, update }),
        "update_many" => pair(args).map(|(filter, update)| Command::UpdateMany { filter, update }),
        "delete_one" => single(args).and_then(to_document).map(Command::DeleteOne),
        "delete_many" => optional_filter(args).map(Command::DeleteMany),
        _ => return Command::Unknown(input.to_string()),
    };
    parsed.unwrap_or_else(|e| Command::Invalid(format!("{name}: {}", reason(e))))
}

fn reason(e: SessionError) -> String {
    match e {
        SessionError::Command(message) => message,
        other => other.to_string(),
    }
}

fn json_args(text: &str) -> std::result::Result<Vec<Value>, serde_json::Error> {
    serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .collect()
}

fn arity(expected: &str) -> SessionError {
    SessionError::Command(format!("expected {expected}"))
}

fn single(args: Vec<Value>) -> Result<Value> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(arity("exactly one argument")),
    }
}

fn pair(args: Vec<Value>) -> Result<(Document, Document)> {
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(filter), Some(update), None) => Ok((to_document(filter)?, to_document(update)?)),
        _ => Err(arity("a filter and an update")),
    }
}

fn optional_filter(args: Vec<Value>) -> Result<Document> {
    match args.len() {
        0 => Ok(Document::new()),
        1 => single(args).and_then(to_document),
        _ => Err(arity("at most one filter")),
    }
}

fn limit_arg(value: &Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| SessionError::Command(format!("limit must be a non-negative integer, got {value}")))
}

fn find_args(args: Vec<Value>) -> Result<Command> {
    let mut args = args.into_iter();
    let (filter, limit) = match (args.next(), args.next(), args.next()) {
        (None, _, _) => (Document::new(), 0),
        (Some(limit @ Value::Number(_)), None, _) => (Document::new(), limit_arg(&limit)?),
        (Some(filter), None, _) => (to_document(filter)?, 0),
        (Some(filter), Some(limit), None) => (to_document(filter)?, limit_arg(&limit)?),
        _ => return Err(arity("at most a filter and a limit")),
    };
    Ok(Command::Find { filter, limit })
}

/// Runs a command against the session.
///
/// # Returns
///
/// Text to show the user, if any.
pub fn execute(session: &mut Session, command: Command) -> CommandResult {
    let output = match command {
        Command::Connect => {
            session.connect()?;
            "Connected.".to_string()
        }
        Command::Use(name) => {
            session.select_database(&name)?;
            format!("Using database {name}.")
        }
        Command::Coll(name) => {
            session.select_collection(&name)?;
            format!("Using collection {name}.")
        }
        Command::Close => {
            session.close();
            "Connection closed.".to_string()
        }
        Command::Status => format!(
            "{:?} (database: {}, collection: {})",
            session.stage(),
            session.database_name().unwrap_or("-"),
            session.collection_name().unwrap_or("-")
        ),
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok(None),
        Command::InsertOne(document) => {
            let id = session.insert_one(document)?;
            format!("Inserted document with _id {}.", render(id))
        }
        Command::InsertMany(documents) => {
            let ids = session.insert_many(documents)?;
            let rendered: Vec<String> = ids.into_iter().map(render).collect();
            format!("Inserted {} document(s): {}", rendered.len(), rendered.join(", "))
        }
        Command::Find { filter, limit } => {
            let documents = session.find(filter, limit)?;
            let mut lines: Vec<String> = documents.iter().map(render_document).collect();
            lines.push(format!("({} document(s))", documents.len()));
            lines.join("\n")
        }
        Command::UpdateOne { filter, update } => {
            format!("Modified {} document(s).", session.update_one(filter, update)?)
        }
        Command::UpdateMany { filter, update } => {
            format!("Modified {} document(s).", session.update_many(filter, update)?)
        }
        Command::DeleteOne(filter) => format!("Deleted {} document(s).", session.delete_one(filter)?),
        Command::DeleteMany(filter) => format!("Deleted {} document(s).", session.delete_many(filter)?),
        Command::Invalid(message) => return Err(SessionError::Command(message)),
        Command::Unknown(input) => {
            return Err(SessionError::Command(format!(
                "Unknown command: {input}. Type :help for a list of commands."
            )))
        }
    };
    Ok(Some(output))
}

/// Connects and applies the configured default selections.
pub fn start_session(session: &mut Session, database: Option<&str>, collection: Option<&str>) -> Result<()> {
    session.connect()?;
    if let Some(database) = database {
        session.select_database(database)?;
        if let Some(collection) = collection {
            session.select_collection(collection)?;
        }
    }
    Ok(())
}

/// Reads commands line by line until end of input or `:quit`.
///
/// Command output goes to `output`, failures to `errors`; a failing command
/// does not end the shell.
pub fn run_repl<R: BufRead, W: Write, E: Write>(
    session: &mut Session,
    input: R,
    mut output: W,
    mut errors: E,
) -> Result<()> {
    writeln!(output, "Welcome to the mongoconnect shell! Type :help for commands, :quit to exit.")?;
    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let command = parse_command(trimmed);
        if command == Command::Quit {
            break;
        }
        match execute(session, command) {
            Ok(Some(text)) => writeln!(output, "{text}")?,
            Ok(None) => {}
            Err(e) => writeln!(errors, "Error: {e}")?,
        }
    }
    output.flush()?;
    Ok(())
}
