//! Operation string parser
//!
//! Parses strings like `"trim:start_time=0,end_time=10;rotate:angle=90;denoise"`
//! into operation requests. Semicolons separate operations, which run in the
//! order written; parameters follow a colon as comma-separated `name=value` pairs.

use serde_json::{Map, Number, Value};
use thiserror::Error;
use video_edit_core::OperationRequest;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("Empty operation string")]
    EmptyInput,

    #[error("Empty operation at position {position}")]
    EmptyOperation { position: usize },

    #[error("Invalid parameter \"{param}\" in operation {position}: expected name=value")]
    InvalidParam { position: usize, param: String },

    #[error("Parameter \"{name}\" given twice in operation {position}")]
    DuplicateParam { position: usize, name: String },
}

/// Parse an operation string into requests, one per `;`-separated entry
///
/// Kinds and parameter names are passed through unchecked; the validator
/// reports unknown ones with their position.
pub fn parse_ops_string(input: &str) -> Result<Vec<OperationRequest>, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    input
        .split(';')
        .enumerate()
        .map(|(position, entry)| parse_operation(position, entry.trim()))
        .collect()
}

fn parse_operation(position: usize, entry: &str) -> Result<OperationRequest, ParseError> {
    let (kind, params) = match entry.split_once(':') {
        Some((kind, params)) => (kind.trim(), Some(params)),
        None => (entry, None),
    };
    if kind.is_empty() {
        return Err(ParseError::EmptyOperation { position });
    }

    let mut request = OperationRequest::new(kind);
    let Some(params) = params else {
        return Ok(request);
    };

    let mut map = Map::new();
    for pair in params.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, value) = pair
            .split_once('=')
            .map(|(n, v)| (n.trim(), v.trim()))
            .filter(|(n, v)| !n.is_empty() && !v.is_empty())
            .ok_or_else(|| ParseError::InvalidParam {
                position,
                param: pair.to_string(),
            })?;
        if map.insert(name.to_string(), parse_value(value)).is_some() {
            return Err(ParseError::DuplicateParam {
                position,
                name: name.to_string(),
            });
        }
    }
    request.params = map;
    Ok(request)
}

/// Integers and floats become JSON numbers, `true`/`false` booleans, anything else a string
fn parse_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sequence_with_params() {
        let ops = parse_ops_string("trim:start_time=0,end_time=10.5; rotate:angle=90 ;denoise").unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].kind, "trim");
        assert_eq!(ops[0].params.get("start_time"), Some(&json!(0)));
        assert_eq!(ops[0].params.get("end_time"), Some(&json!(10.5)));
        assert_eq!(ops[1].kind, "rotate");
        assert_eq!(ops[2].kind, "denoise");
        assert!(ops[2].params.is_empty());
    }

    #[test]
    fn test_value_types() {
        assert_eq!(parse_value("2"), json!(2));
        assert_eq!(parse_value("-0.25"), json!(-0.25));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("fast"), json!("fast"));
        assert_eq!(parse_value("NaN"), json!("NaN"));
    }

    #[test]
    fn test_trailing_colon_and_comma() {
        let ops = parse_ops_string("upscale:;speed_adjust:speed=2,").unwrap();
        assert!(ops[0].params.is_empty());
        assert_eq!(ops[1].params.get("speed"), Some(&json!(2)));
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_ops_string("  "), Err(ParseError::EmptyInput));
        assert_eq!(
            parse_ops_string("denoise;;rotate"),
            Err(ParseError::EmptyOperation { position: 1 })
        );
        assert_eq!(
            parse_ops_string("rotate:angle"),
            Err(ParseError::InvalidParam {
                position: 0,
                param: "angle".to_string()
            })
        );
        assert_eq!(
            parse_ops_string("crop:x=1,x=2"),
            Err(ParseError::DuplicateParam {
                position: 0,
                name: "x".to_string()
            })
        );
    }
}
