//! Statement splitting for annotated SQL scripts
//!
//! Sections of a script are annotated with special comments starting with
//! `-- +goose`, which say whether the section runs when the migration is
//! applied (`Up`) or rolled back (`Down`). Everything after a direction
//! marker belongs to that direction until the next marker.
//!
//! The base case is to split on semicolons, since they naturally end a
//! statement. Bodies such as pl/pgsql functions carry semicolons inside a
//! single statement; `StatementBegin`/`StatementEnd` tell the splitter to
//! ignore them.

use super::definitions::MigrationDirection;
use crate::error::ScriptError;

/// Prefix of every control line
pub const SQL_CMD_PREFIX: &str = "-- +goose ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Up,
    Down,
    StatementBegin,
    StatementEnd,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let cmd = line.strip_prefix(SQL_CMD_PREFIX)?;
        match cmd.trim() {
            "Up" => Some(Command::Up),
            "Down" => Some(Command::Down),
            "StatementBegin" => Some(Command::StatementBegin),
            "StatementEnd" => Some(Command::StatementEnd),
            _ => None,
        }
    }
}

/// Whether `line` ends with a statement-terminating semicolon.
///
/// Words are scanned up to the first one starting a `--` comment; the line
/// terminates a statement iff the last word before it ends with `;`. Quoted
/// strings are not recognized, so `END " ; " -- note` does not terminate.
pub fn ends_with_semicolon(line: &str) -> bool {
    let mut prev = "";

    for word in line.split_whitespace() {
        if word.starts_with("--") {
            break;
        }
        prev = word;
    }

    prev.ends_with(';')
}

/// Split `script` into the statements of `direction`.
pub fn split_statements(
    script: &str,
    direction: MigrationDirection,
) -> Result<Vec<String>, ScriptError> {
    let mut stmts = Vec::new();
    let mut buf = String::new();

    // counted so scripts without any annotation can be diagnosed
    let mut up_sections = 0usize;
    let mut down_sections = 0usize;

    let mut statement_ended = false;
    let mut ignore_semicolons = false;
    let mut direction_is_active = false;

    for line in script.lines() {
        match Command::parse(line) {
            Some(Command::Up) => {
                direction_is_active = direction == MigrationDirection::Up;
                up_sections += 1;
            }
            Some(Command::Down) => {
                direction_is_active = direction == MigrationDirection::Down;
                down_sections += 1;
            }
            Some(Command::StatementBegin) => {
                if direction_is_active {
                    ignore_semicolons = true;
                }
            }
            Some(Command::StatementEnd) => {
                if direction_is_active {
                    statement_ended = ignore_semicolons;
                    ignore_semicolons = false;
                }
            }
            None => {}
        }

        if !direction_is_active {
            continue;
        }

        buf.push_str(line);
        buf.push('\n');

        // semicolons inside a statement block don't end the statement
        if (!ignore_semicolons && ends_with_semicolon(line)) || statement_ended {
            statement_ended = false;
            stmts.push(std::mem::take(&mut buf));
        }
    }

    if ignore_semicolons {
        return Err(ScriptError::UnclosedStatementBlock);
    }

    let remaining = buf.trim();
    if !remaining.is_empty() {
        return Err(ScriptError::UnterminatedStatement(remaining.to_string()));
    }

    if up_sections == 0 && down_sections == 0 {
        return Err(ScriptError::NoDirectionMarkers);
    }

    Ok(stmts)
}
