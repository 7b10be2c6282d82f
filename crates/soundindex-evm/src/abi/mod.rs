//! Event ABI parsing and log decoding.
//!
//! Events are described with human-readable signatures:
//!
//! ```text
//! ItemListed(address indexed owner, address indexed nft, uint256 tokenId, ...)
//! ```
//!
//! `topic0` of a log is the keccak-256 of the canonical signature
//! (`ItemListed(address,address,uint256,...)`). Indexed parameters are read
//! from `topics[1..]`; the rest are ABI-decoded from `data`.
//!
//! Decoded values become JSON: integers as decimal strings, addresses as
//! EIP-55 checksummed strings, byte strings as `0x` hex.

pub mod soundchain;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

use crate::rpc::RawLog;

/// Errors from parsing signatures or decoding logs.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("invalid event signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("event {event}: missing topic for indexed parameter '{param}'")]
    MissingTopic { event: String, param: String },

    #[error("event {event}: invalid hex: {reason}")]
    InvalidHex { event: String, reason: String },

    #[error("event {event}: ABI decode failed: {reason}")]
    DecodeFailed { event: String, reason: String },
}

/// One parameter of an event.
#[derive(Debug, Clone)]
pub struct EventParam {
    pub name: String,
    pub ty: DynSolType,
    pub indexed: bool,
}

impl EventParam {
    /// Reference types are stored hashed when indexed; the value is lost.
    fn is_hashed_when_indexed(&self) -> bool {
        matches!(
            self.ty,
            DynSolType::String
                | DynSolType::Bytes
                | DynSolType::Array(_)
                | DynSolType::FixedArray(..)
                | DynSolType::Tuple(_)
        )
    }
}

/// A parsed event definition.
#[derive(Debug, Clone)]
pub struct EventAbi {
    pub name: String,
    pub params: Vec<EventParam>,
    topic0: String,
}

impl EventAbi {
    /// Parse a human-readable event signature. A leading `event ` keyword
    /// and a trailing `;` are accepted. Tuple parameters are not supported.
    pub fn parse(signature: &str) -> Result<Self, AbiError> {
        let invalid = |reason: &str| AbiError::InvalidSignature {
            signature: signature.to_string(),
            reason: reason.to_string(),
        };

        let s = signature.trim().trim_end_matches(';').trim();
        let s = s.strip_prefix("event ").unwrap_or(s).trim();

        let open = s.find('(').ok_or_else(|| invalid("missing '('"))?;
        if !s.ends_with(')') {
            return Err(invalid("missing closing ')'"));
        }
        let name = s[..open].trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("bad event name"));
        }

        let inner = s[open + 1..s.len() - 1].trim();
        let mut params = Vec::new();
        if !inner.is_empty() {
            for (i, raw) in inner.split(',').enumerate() {
                let tokens: Vec<&str> = raw.split_whitespace().collect();
                let (ty, indexed, pname) = match tokens.as_slice() {
                    [ty] => (*ty, false, None),
                    [ty, "indexed"] => (*ty, true, None),
                    [ty, "indexed", n] => (*ty, true, Some(*n)),
                    [ty, n] => (*ty, false, Some(*n)),
                    _ => return Err(invalid(&format!("cannot parse parameter '{}'", raw.trim()))),
                };
                let ty = DynSolType::parse(ty).map_err(|e| invalid(&e.to_string()))?;
                params.push(EventParam {
                    name: pname.map(str::to_string).unwrap_or_else(|| i.to_string()),
                    ty,
                    indexed,
                });
            }
        }

        let mut abi = Self {
            name: name.to_string(),
            params,
            topic0: String::new(),
        };
        abi.topic0 = keccak256_hex(abi.signature().as_bytes());
        Ok(abi)
    }

    /// Canonical signature, e.g. `Transfer(address,address,uint256)`.
    pub fn signature(&self) -> String {
        let types: Vec<String> = self
            .params
            .iter()
            .map(|p| p.ty.sol_type_name().into_owned())
            .collect();
        format!("{}({})", self.name, types.join(","))
    }

    /// `0x`-prefixed lowercase keccak-256 of the canonical signature.
    pub fn topic0(&self) -> &str {
        &self.topic0
    }

    /// Decode a log already known to carry this event's `topic0`.
    pub fn decode(&self, topics: &[String], data: &str) -> Result<Map<String, Value>, AbiError> {
        let mut out = Map::new();

        let mut topic_iter = topics.iter().skip(1);
        for param in self.params.iter().filter(|p| p.indexed) {
            let topic = topic_iter.next().ok_or_else(|| AbiError::MissingTopic {
                event: self.name.clone(),
                param: param.name.clone(),
            })?;
            let value = if param.is_hashed_when_indexed() {
                Value::String(topic.to_lowercase())
            } else {
                let bytes = self.hex_bytes(topic)?;
                let decoded = param.ty.abi_decode(&bytes).map_err(|e| AbiError::DecodeFailed {
                    event: self.name.clone(),
                    reason: format!("topic '{}': {e}", param.name),
                })?;
                to_json(decoded)
            };
            out.insert(param.name.clone(), value);
        }

        let data_params: Vec<&EventParam> = self.params.iter().filter(|p| !p.indexed).collect();
        if !data_params.is_empty() {
            let bytes = self.hex_bytes(data)?;
            let tuple = DynSolType::Tuple(data_params.iter().map(|p| p.ty.clone()).collect());
            let decoded = tuple
                .abi_decode_params(&bytes)
                .map_err(|e| AbiError::DecodeFailed {
                    event: self.name.clone(),
                    reason: e.to_string(),
                })?;
            let values = match decoded {
                DynSolValue::Tuple(vals) => vals,
                other => vec![other],
            };
            for (param, value) in data_params.iter().zip(values) {
                out.insert(param.name.clone(), to_json(value));
            }
        }

        Ok(out)
    }

    fn hex_bytes(&self, s: &str) -> Result<Vec<u8>, AbiError> {
        hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|e| AbiError::InvalidHex {
            event: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

/// The result of decoding one log against a contract ABI.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLog {
    /// Event name, or the raw `topic0` when the ABI has no matching event.
    pub event: String,
    pub return_values: Value,
    /// `false` when the log did not match any event in the ABI.
    pub known: bool,
}

/// The events of one contract, keyed by `topic0`.
#[derive(Debug, Clone)]
pub struct ContractAbi {
    pub name: String,
    events: Vec<EventAbi>,
    by_topic0: HashMap<String, usize>,
}

impl ContractAbi {
    pub fn new(name: impl Into<String>, events: Vec<EventAbi>) -> Self {
        let by_topic0 = events
            .iter()
            .enumerate()
            .map(|(i, e)| (e.topic0().to_string(), i))
            .collect();
        Self {
            name: name.into(),
            events,
            by_topic0,
        }
    }

    /// Build from human-readable signatures.
    pub fn from_signatures(name: impl Into<String>, signatures: &[&str]) -> Result<Self, AbiError> {
        let events = signatures
            .iter()
            .map(|s| EventAbi::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(name, events))
    }

    pub fn events(&self) -> &[EventAbi] {
        &self.events
    }

    pub fn event_by_topic0(&self, topic0: &str) -> Option<&EventAbi> {
        self.by_topic0
            .get(&topic0.to_lowercase())
            .map(|&i| &self.events[i])
    }

    pub fn event_by_name(&self, name: &str) -> Option<&EventAbi> {
        self.events.iter().find(|e| e.name == name)
    }

    /// Decode a raw log. Logs with an unknown (or no) `topic0` are not an
    /// error: they keep the raw topics and data.
    pub fn decode_log(&self, log: &RawLog) -> Result<DecodedLog, AbiError> {
        let topic0 = log.topics.first().map(String::as_str).unwrap_or_default();
        match self.event_by_topic0(topic0) {
            Some(abi) => Ok(DecodedLog {
                event: abi.name.clone(),
                return_values: Value::Object(abi.decode(&log.topics, &log.data)?),
                known: true,
            }),
            None => Ok(DecodedLog::raw(log)),
        }
    }
}

impl DecodedLog {
    /// The log kept undecoded: tagged with its lowercased `topic0`, with
    /// `{topics, data}` as the values. No router knows such a tag.
    pub fn raw(log: &RawLog) -> Self {
        let topic0 = log.topics.first().map(String::as_str).unwrap_or_default();
        DecodedLog {
            event: topic0.to_lowercase(),
            return_values: serde_json::json!({
                "topics": log.topics,
                "data": log.data,
            }),
            known: false,
        }
    }
}

/// `0x`-prefixed keccak-256 of `bytes`.
pub fn keccak256_hex(bytes: &[u8]) -> String {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(bytes);
    hasher.finalize(&mut output);
    format!("0x{}", hex::encode(output))
}

/// Convert a decoded ABI value into JSON.
fn to_json(value: DynSolValue) -> Value {
    #[allow(unreachable_patterns)]
    match value {
        DynSolValue::Bool(b) => Value::Bool(b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::Address(a) => Value::String(a.to_checksum(None)),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word.as_slice()[..size])))
        }
        DynSolValue::Function(f) => Value::String(format!("0x{}", hex::encode(f.as_slice()))),
        DynSolValue::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        DynSolValue::String(s) => Value::String(s),
        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) | DynSolValue::Tuple(vals) => {
            Value::Array(vals.into_iter().map(to_json).collect())
        }
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(n: u64) -> String {
        format!("{n:064x}")
    }

    fn addr_topic(addr: &str) -> String {
        format!("0x{:0>64}", addr.trim_start_matches("0x").to_lowercase())
    }

    fn log(topics: Vec<String>, data: String) -> RawLog {
        RawLog {
            address: "0x0".into(),
            topics,
            data,
            block_number: "0x1".into(),
            block_hash: "0x0".into(),
            tx_hash: "0x0".into(),
            log_index: "0x0".into(),
            removed: None,
        }
    }

    #[test]
    fn transfer_topic0() {
        let abi = EventAbi::parse(
            "event Transfer(address indexed from, address indexed to, uint256 indexed tokenId);",
        )
        .unwrap();
        assert_eq!(abi.signature(), "Transfer(address,address,uint256)");
        assert_eq!(
            abi.topic0(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn uint_alias_is_canonicalised() {
        let abi = EventAbi::parse("Paid(uint amount, bool ok)").unwrap();
        assert_eq!(abi.signature(), "Paid(uint256,bool)");
    }

    #[test]
    fn unnamed_params_get_positional_names() {
        let abi = EventAbi::parse("Ping(uint256, address indexed)").unwrap();
        assert_eq!(abi.params[0].name, "0");
        assert_eq!(abi.params[1].name, "1");
        assert!(abi.params[1].indexed);
    }

    #[test]
    fn rejects_malformed_signatures() {
        assert!(EventAbi::parse("Transfer").is_err());
        assert!(EventAbi::parse("Transfer(address from").is_err());
        assert!(EventAbi::parse("Transfer(notatype from)").is_err());
        assert!(EventAbi::parse("(address from)").is_err());
    }

    #[test]
    fn decodes_indexed_and_data_params() {
        let abi = EventAbi::parse(
            "ItemCanceled(address indexed owner, address indexed nft, uint256 tokenId)",
        )
        .unwrap();
        let topics = vec![
            abi.topic0().to_string(),
            addr_topic("0xd8da6bf26964af9d7eed9e03e53415d37aa96045"),
            addr_topic("0xab5801a7d398351b8be11c439e05c5b3259aec9b"),
        ];
        let values = abi.decode(&topics, &format!("0x{}", word(42))).unwrap();

        assert_eq!(values["owner"], "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
        assert_eq!(values["tokenId"], "42");
    }

    #[test]
    fn decodes_bools_in_data() {
        let abi = EventAbi::parse("Flags(bool a, bool b, uint256 n)").unwrap();
        let data = format!("0x{}{}{}", word(1), word(0), word(7));
        let values = abi.decode(&[abi.topic0().to_string()], &data).unwrap();
        assert_eq!(values["a"], true);
        assert_eq!(values["b"], false);
        assert_eq!(values["n"], "7");
    }

    #[test]
    fn missing_indexed_topic_is_error() {
        let abi = EventAbi::parse("Transfer(address indexed from, address indexed to, uint256 indexed tokenId)")
            .unwrap();
        let err = abi.decode(&[abi.topic0().to_string()], "0x").unwrap_err();
        assert!(matches!(err, AbiError::MissingTopic { .. }));
    }

    #[test]
    fn short_data_is_error() {
        let abi = EventAbi::parse("Paid(uint256 amount, uint256 fee)").unwrap();
        let err = abi
            .decode(&[abi.topic0().to_string()], &format!("0x{}", word(1)))
            .unwrap_err();
        assert!(matches!(err, AbiError::DecodeFailed { .. }));
    }

    #[test]
    fn unknown_topic0_keeps_raw_log() {
        let abi = ContractAbi::from_signatures("test", &["Paid(uint256 amount)"]).unwrap();
        let unknown = "0x8be0079c531659141344cd1fd0a4f28419497f9722a3daafe3b4186f6b6457e0";
        let decoded = abi
            .decode_log(&log(vec![unknown.to_string()], "0x".into()))
            .unwrap();

        assert!(!decoded.known);
        assert_eq!(decoded.event, unknown);
        assert_eq!(decoded.return_values["topics"][0], unknown);
    }

    #[test]
    fn topic0_lookup_is_case_insensitive() {
        let abi = ContractAbi::from_signatures(
            "nft",
            &["Transfer(address indexed from, address indexed to, uint256 indexed tokenId)"],
        )
        .unwrap();
        let upper = "0xDDF252AD1BE2C89B69C2B068FC378DAA952BA7F163C4A11628F55A4DF523B3EF";
        assert_eq!(abi.event_by_topic0(upper).unwrap().name, "Transfer");
    }
}
