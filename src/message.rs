//! Wire format of task and result messages.
//!
//! Tasks carry `Message`, `LowerBound`, `UpperBound` and `Target` attributes
//! with the label as body. Results carry `Success`, the `LowerBound` and
//! `UpperBound` of the task they answer and, on success, `Nonce` and `Hash`.

use crate::error::{Error, Result};
use crate::queue::Message;
use crate::search::{SearchTask, WorkerResult};
use std::str::FromStr;

pub const ATTR_MESSAGE: &str = "Message";
pub const ATTR_LOWER_BOUND: &str = "LowerBound";
pub const ATTR_UPPER_BOUND: &str = "UpperBound";
pub const ATTR_TARGET: &str = "Target";
pub const ATTR_SUCCESS: &str = "Success";
pub const ATTR_NONCE: &str = "Nonce";
pub const ATTR_HASH: &str = "Hash";

/// Hex length of a SHA-256 digest.
const HASH_HEX_LEN: usize = 64;

pub fn encode_task(task: &SearchTask) -> Result<Message> {
    let payload = std::str::from_utf8(&task.payload)
        .map_err(|e| Error::Config(format!("payload is not valid UTF-8: {e}")))?;
    Ok(Message::new(task.label.as_str())
        .with_attribute(ATTR_MESSAGE, payload)
        .with_attribute(ATTR_LOWER_BOUND, task.lower)
        .with_attribute(ATTR_UPPER_BOUND, task.upper)
        .with_attribute(ATTR_TARGET, task.target))
}

pub fn decode_task(message: &Message) -> Result<SearchTask> {
    let payload = require(message, ATTR_MESSAGE)?;
    let lower: u32 = parse(message, ATTR_LOWER_BOUND)?;
    let upper: u32 = parse(message, ATTR_UPPER_BOUND)?;
    let target: u32 = parse(message, ATTR_TARGET)?;
    let task = SearchTask::new(payload.as_bytes().to_vec(), lower, upper, target)
        .map_err(|e| Error::Decode(e.to_string()))?;
    Ok(task.with_label(message.body.as_str()))
}

pub fn encode_result(task: &SearchTask, result: &WorkerResult) -> Message {
    let message = match result {
        WorkerResult::Found { nonce, hash } => {
            Message::new(format!("Nonce is {nonce} for hash: {hash}"))
                .with_attribute(ATTR_SUCCESS, true)
                .with_attribute(ATTR_NONCE, nonce)
                .with_attribute(ATTR_HASH, hash)
        }
        WorkerResult::NotFound { reason } => {
            Message::new(reason.as_str()).with_attribute(ATTR_SUCCESS, false)
        }
    };
    message
        .with_attribute(ATTR_LOWER_BOUND, task.lower)
        .with_attribute(ATTR_UPPER_BOUND, task.upper)
}

pub fn decode_result(message: &Message) -> Result<WorkerResult> {
    let success = parse_bool(require(message, ATTR_SUCCESS)?)
        .ok_or_else(|| Error::Decode(format!("{ATTR_SUCCESS} is not a boolean")))?;
    if !success {
        return Ok(WorkerResult::NotFound {
            reason: message.body.clone(),
        });
    }

    let nonce: u32 = parse(message, ATTR_NONCE)?;
    let hash = require(message, ATTR_HASH)?;
    let well_formed = hash.len() == HASH_HEX_LEN
        && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if !well_formed {
        return Err(Error::Decode(format!(
            "{ATTR_HASH} must be {HASH_HEX_LEN} lowercase hex characters, got '{hash}'"
        )));
    }
    Ok(WorkerResult::Found {
        nonce,
        hash: hash.to_string(),
    })
}

/// Range a result answers, `None` when the sender left both bounds out.
pub fn result_range(message: &Message) -> Result<Option<(u32, u32)>> {
    match (
        message.attribute(ATTR_LOWER_BOUND),
        message.attribute(ATTR_UPPER_BOUND),
    ) {
        (None, None) => Ok(None),
        _ => Ok(Some((
            parse(message, ATTR_LOWER_BOUND)?,
            parse(message, ATTR_UPPER_BOUND)?,
        ))),
    }
}

fn require<'a>(message: &'a Message, key: &str) -> Result<&'a str> {
    message
        .attribute(key)
        .ok_or_else(|| Error::Decode(format!("message didn't contain key {key}")))
}

fn parse<T>(message: &Message, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = require(message, key)?;
    raw.trim()
        .parse()
        .map_err(|e| Error::Decode(format!("{key} '{raw}': {e}")))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
