//! JSON I/O handling for CLI
//!
//! - Input: single JSON object via stdin
//! - Output: single JSON object per line via stdout
//! - UTF-8 only

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read a JSON request from stdin
pub fn read_request<T: DeserializeOwned>() -> CliResult<T> {
    read_request_from(io::stdin().lock())
}

/// Read a JSON request from `reader`; the whole input is one document
pub fn read_request_from<T: DeserializeOwned, R: Read>(mut reader: R) -> CliResult<T> {
    let mut input = String::new();
    reader.read_to_string(&mut input)?;

    if input.trim().is_empty() {
        return Err(CliError::io_error("Empty input"));
    }

    let request = serde_json::from_str(&input)?;
    Ok(request)
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_response_to(&mut io::stdout(), data)
}

pub fn write_response_to<W: Write>(out: &mut W, data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    write_line(out, &response)
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_error_to(&mut io::stdout(), code, message)
}

pub fn write_error_to<W: Write>(out: &mut W, code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    write_line(out, &response)
}

fn write_line<W: Write>(out: &mut W, response: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, response)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Request {
        statements: Vec<String>,
    }

    #[test]
    fn test_read_multiline_request() {
        let input = "{\n  \"statements\": [\"SELECT 1\"]\n}\n";
        let request: Request = read_request_from(input.as_bytes()).unwrap();
        assert_eq!(request.statements, vec!["SELECT 1".to_string()]);
    }

    #[test]
    fn test_read_empty_input() {
        let result: CliResult<Request> = read_request_from("  \n".as_bytes());
        assert_eq!(result.err().map(|e| e.code_str()), Some("SQLGRADE_CLI_IO_ERROR"));
    }

    #[test]
    fn test_write_response_envelope() {
        let mut out = Vec::new();
        write_response_to(&mut out, serde_json::json!({"verdict": 1})).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"data\":{\"verdict\":1},\"status\":\"ok\"}\n"
        );
    }

    #[test]
    fn test_write_error_envelope() {
        let mut out = Vec::new();
        write_error_to(&mut out, "SQLGRADE_CLI_IO_ERROR", "Empty input").unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["code"], "SQLGRADE_CLI_IO_ERROR");
    }
}
