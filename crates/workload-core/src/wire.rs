//! Binary wire format between the generation core and external drivers.
//!
//! Every message is a small fixed header followed by a MessagePack body:
//!
//! ```text
//! +-------+---------+------+----------------------+
//! | magic | version | kind | body (named msgpack) |
//! | 4 B   | u16 BE  | u8   | ...                  |
//! +-------+---------+------+----------------------+
//! ```
//!
//! Bodies are encoded as maps keyed by field name, so a reader ignores
//! fields it does not know and falls back to defaults for fields a
//! writer did not send. Adding an enum variant is not compatible: an
//! older reader rejects it as a serialization error.

use crate::descriptor::{GroupBinding, ParamBinding, Step, Unit, Workload};
use crate::driver_config::DriverConfig;
use crate::error::{Result, WorkloadError};
use crate::resolved::{ResolvedUnit, RowBatch};
use crate::rule::GenerationRule;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Leading bytes of every message.
pub const WIRE_MAGIC: [u8; 4] = *b"BGW1";

/// Current format version.
pub const WIRE_VERSION: u16 = 1;

const HEADER_LEN: usize = 7;

/// What a message body holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadKind {
    Workload = 1,
    Step = 2,
    Unit = 3,
    ParamBinding = 4,
    GroupBinding = 5,
    GenerationRule = 6,
    DriverConfig = 7,
    ResolvedUnit = 8,
    RowBatch = 9,
}

impl PayloadKind {
    fn from_byte(byte: u8) -> Result<Self> {
        Ok(match byte {
            1 => PayloadKind::Workload,
            2 => PayloadKind::Step,
            3 => PayloadKind::Unit,
            4 => PayloadKind::ParamBinding,
            5 => PayloadKind::GroupBinding,
            6 => PayloadKind::GenerationRule,
            7 => PayloadKind::DriverConfig,
            8 => PayloadKind::ResolvedUnit,
            9 => PayloadKind::RowBatch,
            other => {
                return Err(WorkloadError::Serialization(format!(
                    "unknown payload kind {other}"
                )))
            }
        })
    }
}

/// A type that can travel over the wire.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Tag written into the header.
    const KIND: PayloadKind;
}

macro_rules! wire_message {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl WireMessage for $ty {
                const KIND: PayloadKind = PayloadKind::$kind;
            }
        )*
    };
}

wire_message! {
    Workload => Workload,
    Step => Step,
    Unit => Unit,
    ParamBinding => ParamBinding,
    GroupBinding => GroupBinding,
    GenerationRule => GenerationRule,
    DriverConfig => DriverConfig,
    ResolvedUnit => ResolvedUnit,
    RowBatch => RowBatch,
}

/// Encode a message with its header.
pub fn encode<T: WireMessage>(message: &T) -> Result<Vec<u8>> {
    encode_as(T::KIND, message)
}

fn encode_as<T: Serialize>(kind: PayloadKind, message: &T) -> Result<Vec<u8>> {
    let body = rmp_serde::to_vec_named(message)?;
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.extend_from_slice(&WIRE_MAGIC);
    out.extend_from_slice(&WIRE_VERSION.to_be_bytes());
    out.push(kind as u8);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Read the header of an encoded message.
pub fn peek_kind(bytes: &[u8]) -> Result<(u16, PayloadKind)> {
    if bytes.len() < HEADER_LEN {
        return Err(WorkloadError::Serialization(format!(
            "message is {} bytes, shorter than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    if bytes[..4] != WIRE_MAGIC {
        return Err(WorkloadError::Serialization(
            "bad magic: not a benchgen wire message".to_string(),
        ));
    }
    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if version == 0 || version > WIRE_VERSION {
        return Err(WorkloadError::Serialization(format!(
            "unsupported wire version {version} (this build reads up to {WIRE_VERSION})"
        )));
    }
    Ok((version, PayloadKind::from_byte(bytes[6])?))
}

/// Decode a message, checking its header against the expected type.
pub fn decode<T: WireMessage>(bytes: &[u8]) -> Result<T> {
    let (_, kind) = peek_kind(bytes)?;
    if kind != T::KIND {
        return Err(WorkloadError::Serialization(format!(
            "expected {:?} payload, found {kind:?}",
            T::KIND
        )));
    }
    Ok(rmp_serde::from_slice(&bytes[HEADER_LEN..])?)
}
