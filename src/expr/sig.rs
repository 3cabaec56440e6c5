#![forbid(unsafe_code)]

//! Canonical byte signatures for grouping, dedup, and join keys.
//!
//! Every key value is encoded as a type tag byte followed by a fixed or
//! length-prefixed payload, so two values produce the same signature exactly
//! when they are the same key. Signatures are only compared for equality and
//! hashed; they are never decoded.

use crate::context::Context;
use crate::expr::Evaluator;
use crate::types::{Result, SendaError};
use crate::value::Value;

const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_TIMESTAMP: u8 = 5;
const TAG_VERTEX: u8 = 6;
const TAG_EDGE: u8 = 7;
const TAG_PATH: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_TUPLE: u8 = 10;

/// Appends the canonical encoding of one value.
pub fn encode_value(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(v) => {
            out.push(TAG_BOOL);
            out.push(*v as u8);
        }
        Value::Int(v) => {
            out.push(TAG_INT);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::Float(v) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Value::Str(v) => {
            out.push(TAG_STR);
            out.extend_from_slice(&(v.len() as u32).to_be_bytes());
            out.extend_from_slice(v.as_bytes());
        }
        Value::Timestamp(v) => {
            out.push(TAG_TIMESTAMP);
            out.extend_from_slice(&v.to_be_bytes());
        }
        Value::Vertex { label, vid } => {
            out.push(TAG_VERTEX);
            out.extend_from_slice(&label.0.to_be_bytes());
            out.extend_from_slice(&vid.0.to_be_bytes());
        }
        // Edge identity is its relation plus endpoints; the payload is data,
        // not identity.
        Value::Edge(edge) => {
            out.push(TAG_EDGE);
            out.extend_from_slice(&edge.triplet.src_label.0.to_be_bytes());
            out.extend_from_slice(&edge.triplet.dst_label.0.to_be_bytes());
            out.extend_from_slice(&edge.triplet.edge_type.0.to_be_bytes());
            out.extend_from_slice(&edge.src.0.to_be_bytes());
            out.extend_from_slice(&edge.dst.0.to_be_bytes());
        }
        Value::Path(steps) => {
            out.push(TAG_PATH);
            out.extend_from_slice(&(steps.len() as u32).to_be_bytes());
            for (label, vid) in steps.iter() {
                out.extend_from_slice(&label.0.to_be_bytes());
                out.extend_from_slice(&vid.0.to_be_bytes());
            }
        }
        Value::List(items) => encode_sequence(TAG_LIST, items, out)?,
        Value::Tuple(items) => encode_sequence(TAG_TUPLE, items, out)?,
    }
    Ok(())
}

fn encode_sequence(tag: u8, items: &[Value], out: &mut Vec<u8>) -> Result<()> {
    out.push(tag);
    out.extend_from_slice(&(items.len() as u32).to_be_bytes());
    for item in items {
        encode_value(item, out)?;
    }
    Ok(())
}

/// Computes the signature of one row under a list of key evaluators.
pub fn row_signature(keys: &[Evaluator], ctx: &Context, row: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(keys.len() * 12);
    for key in keys {
        encode_value(&key.eval(ctx, row)?, &mut out)?;
    }
    Ok(out)
}

/// Computes the signature of a single already-evaluated value.
pub fn value_signature(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(12);
    encode_value(value, &mut out)?;
    Ok(out)
}

/// Guards against unbounded signatures from pathological keys.
pub fn check_signature_len(sig: &[u8]) -> Result<()> {
    const MAX_SIGNATURE_BYTES: usize = 1 << 20;
    if sig.len() > MAX_SIGNATURE_BYTES {
        return Err(SendaError::unsupported(
            "grouping key encoding exceeds the signature size limit",
        ));
    }
    Ok(())
}
