//! # JSON Helpers
//!
//! Request bodies go through simd-json's slice parser; responses are
//! serialized with serde_json, which is where serde's ecosystem lives.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Parse a JSON string into a typed value
///
/// # Errors
///
/// Returns [`Error::JsonParse`] on malformed input.
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();
    parse_json_bytes(&mut bytes)
}

/// Parse JSON bytes in place into a typed value
///
/// simd-json mutates the buffer while parsing, hence the `&mut`.
///
/// # Errors
///
/// Returns [`Error::JsonParse`] on malformed input.
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::JsonParse {
        reason: e.to_string(),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns [`Error::Json`] when the value cannot be serialized.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Serialize a value to pretty-printed JSON
///
/// # Errors
///
/// Returns [`Error::Json`] when the value cannot be serialized.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Login {
        #[serde(rename = "userEmail")]
        user_email: String,
        password: String,
    }

    #[test]
    fn test_parse_json_object() {
        let json = r#"{"userEmail": "skmdev@gmail.com", "password": "123"}"#;
        let data: Login = parse_json(json).unwrap();
        assert_eq!(data.user_email, "skmdev@gmail.com");
    }

    #[test]
    fn test_parse_json_value() {
        let value: Value = parse_json(r#"{"page": 1}"#).unwrap();
        assert_eq!(value["page"], 1);
    }

    #[test]
    fn test_parse_json_bytes() {
        let mut bytes = r#"{"userEmail": "a@b.c", "password": "x"}"#.as_bytes().to_vec();
        let data: Login = parse_json_bytes(&mut bytes).unwrap();
        assert_eq!(data.password, "x");
    }

    #[test]
    fn test_to_json_round_trip() {
        let data = Login {
            user_email: "a@b.c".to_string(),
            password: "x".to_string(),
        };
        let json = to_json(&data).unwrap();
        assert!(json.contains("userEmail"));
    }

    #[test]
    fn test_invalid_json() {
        let result: Result<Value> = parse_json("not valid json");
        assert!(result.is_err());
    }
}
