//! Reading and writing fields of serialized state documents.
//!
//! Documents are `serde_json::Value` trees. These helpers give uniform
//! errors for missing or mistyped keys, and encode GL enums by name.

use gleam::gl::GLenum;
use serde_json::{Map, Value};

use crate::enums::GlEnumTable;
use crate::error::DocError;

pub type Object = Map<String, Value>;

pub fn as_object<'a>(node: &'a Value) -> Result<&'a Object, DocError> {
    node.as_object().ok_or(DocError::NotA { expected: "object" })
}

pub fn require_value<'a>(node: &'a Object, key: &str) -> Result<&'a Value, DocError> {
    node.get(key).ok_or_else(|| DocError::MissingKey(key.to_string()))
}

fn wrong(key: &str, expected: &'static str) -> DocError {
    DocError::WrongType {
        key: key.to_string(),
        expected,
    }
}

pub fn get_u64(node: &Object, key: &str) -> Result<u64, DocError> {
    require_value(node, key)?
        .as_u64()
        .ok_or_else(|| wrong(key, "an unsigned integer"))
}

pub fn get_u32(node: &Object, key: &str) -> Result<u32, DocError> {
    let n = get_u64(node, key)?;
    if n > u64::from(u32::MAX) {
        return Err(wrong(key, "a 32-bit unsigned integer"));
    }
    Ok(n as u32)
}

pub fn get_i32(node: &Object, key: &str) -> Result<i32, DocError> {
    let n = require_value(node, key)?
        .as_i64()
        .ok_or_else(|| wrong(key, "an integer"))?;
    if n < i64::from(i32::MIN) || n > i64::from(i32::MAX) {
        return Err(wrong(key, "a 32-bit integer"));
    }
    Ok(n as i32)
}

pub fn get_bool(node: &Object, key: &str) -> Result<bool, DocError> {
    match require_value(node, key)? {
        Value::Bool(b) => Ok(*b),
        // Older writers used 0/1.
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        _ => Err(wrong(key, "a boolean")),
    }
}

pub fn get_str<'a>(node: &'a Object, key: &str) -> Result<&'a str, DocError> {
    require_value(node, key)?
        .as_str()
        .ok_or_else(|| wrong(key, "a string"))
}

pub fn get_array<'a>(node: &'a Object, key: &str) -> Result<&'a Vec<Value>, DocError> {
    require_value(node, key)?
        .as_array()
        .ok_or_else(|| wrong(key, "an array"))
}

pub fn get_object<'a>(node: &'a Object, key: &str) -> Result<&'a Object, DocError> {
    require_value(node, key)?
        .as_object()
        .ok_or_else(|| wrong(key, "an object"))
}

/// Apply `get` to `key` if it is present, or return `default`.
pub fn opt<'a, T>(
    node: &'a Object,
    key: &str,
    default: T,
    get: impl FnOnce(&'a Object, &str) -> Result<T, DocError>,
) -> Result<T, DocError> {
    if node.contains_key(key) {
        get(node, key)
    } else {
        Ok(default)
    }
}

/// Parse a GL enum stored either by name or as a number.
pub fn parse_enum(value: &Value, key: &str, enums: &GlEnumTable) -> Result<GLenum, DocError> {
    match value {
        Value::String(name) => enums.value(name).ok_or_else(|| DocError::UnknownEnum {
            key: key.to_string(),
            value: name.clone(),
        }),
        Value::Number(n) => n
            .as_u64()
            .filter(|&n| n <= u64::from(u32::MAX))
            .map(|n| n as GLenum)
            .ok_or_else(|| wrong(key, "a GL enum")),
        _ => Err(wrong(key, "a GL enum")),
    }
}

pub fn get_enum(node: &Object, key: &str, enums: &GlEnumTable) -> Result<GLenum, DocError> {
    parse_enum(require_value(node, key)?, key, enums)
}

/// The document form of a GL enum: its name.
pub fn enum_value(enums: &GlEnumTable, value: GLenum) -> Value {
    Value::String(enums.name(value, None))
}

/// Like `enum_value`, preferring names with the given prefix.
pub fn enum_value_prefixed(enums: &GlEnumTable, value: GLenum, prefix: &str) -> Value {
    Value::String(enums.name(value, Some(prefix)))
}
