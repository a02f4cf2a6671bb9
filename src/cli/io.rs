//! JSON I/O handling for CLI
//!
//! - Input: one JSON document on stdin (may span lines)
//! - Output: one JSON object per line on stdout
//! - UTF-8 only

use std::io::{self, Read, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read one JSON document from stdin
pub fn read_request() -> CliResult<Value> {
    let mut input = String::new();
    io::stdin().lock().read_to_string(&mut input)?;
    parse_request(&input)
}

fn parse_request(input: &str) -> CliResult<Value> {
    if input.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }
    Ok(serde_json::from_str(input)?)
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_json(&serde_json::json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(error: &CliError) -> CliResult<()> {
    write_json(&error_response(error))
}

fn error_response(error: &CliError) -> Value {
    let mut response = serde_json::json!({
        "status": "error",
        "code": error.code_str(),
        "message": error.message()
    });
    if let (Some(details), Value::Object(map)) = (error.details(), &mut response) {
        map.insert("failures".to_string(), details.clone());
    }
    response
}

fn write_json(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
