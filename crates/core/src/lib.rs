//! Core types and traits for strata-queue
//!
//! This crate defines the foundations shared by the queue crates:
//! - Error: Error type and `Result` alias
//! - Codec: element codecs and the `Element` registry trait
//! - QueueConfig: configuration, loadable from `queue.toml`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod error;

pub use codec::{
    BigIntCodec, BincodeCodec, BoolCodec, Codec, DecimalCodec, Element, F32Codec, F64Codec,
    I16Codec, I32Codec, I64Codec, I8Codec, StringCodec, U64Codec, U8Codec,
};
pub use config::{DurabilityMode, QueueConfig, CONFIG_FILE_NAME, DEFAULT_TABLE};
pub use error::{Error, Result};

// Element types with built-in codecs, re-exported so callers need not
// depend on the numeric crates directly.
pub use num_bigint::BigInt;
pub use bigdecimal::BigDecimal;
