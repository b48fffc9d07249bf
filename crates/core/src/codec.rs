//! Element codecs
//!
//! Every element passes through a codec on its way into and out of the
//! ordered store. The codec is chosen once, when the queue is opened:
//!
//! - Built-in element types implement [`Element`], which names their codec.
//!   `PersistentQueue::<i64>::open(path)` picks [`I64Codec`] without any
//!   runtime type inspection.
//! - Any other `serde` type can use [`BincodeCodec`] through the explicit
//!   `open_with_codec` constructors.
//!
//! ## Byte Layouts
//!
//! | Type      | Layout                                                   |
//! |-----------|----------------------------------------------------------|
//! | `bool`    | 1 byte, `0x00` or `0x01`                                 |
//! | `i8`/`u8` | 1 byte                                                   |
//! | integers  | fixed width, big-endian                                  |
//! | floats    | IEEE 754 bits, big-endian                                |
//! | `String`  | UTF-8 bytes                                              |
//! | `BigDecimal` | scale (i32, big-endian) + unscaled value (signed BE)  |
//! | `BigInt`  | two's complement, big-endian, minimal length             |

use crate::error::{Error, Result};
use bigdecimal::BigDecimal;
use byteorder::{BigEndian, ByteOrder};
use num_bigint::BigInt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Converts queue elements to and from their stored bytes.
///
/// # Thread Safety
///
/// Codecs must be `Send + Sync`; a queue shares one codec between all
/// threads that push or pop.
pub trait Codec<T>: Send + Sync {
    /// Encode an element for storage.
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode an element previously produced by [`Codec::encode`].
    ///
    /// Returns `Error::SerializationError` for malformed input.
    fn decode(&self, bytes: &[u8]) -> Result<T>;

    /// Short identifier used in logs and error messages.
    fn codec_id(&self) -> &'static str;
}

/// Element types with a built-in codec.
pub trait Element: Sized + 'static {
    /// Codec used when the queue is opened without an explicit one
    type Codec: Codec<Self> + Default + 'static;

    /// Instantiate the built-in codec
    fn default_codec() -> Self::Codec {
        Self::Codec::default()
    }
}

fn expect_len(bytes: &[u8], expected: usize, codec_id: &str) -> Result<()> {
    if bytes.len() != expected {
        return Err(Error::serialization(format!(
            "{} codec expects {} bytes, got {}",
            codec_id,
            expected,
            bytes.len()
        )));
    }
    Ok(())
}

// ============================================================================
// Single-byte codecs
// ============================================================================

/// Codec for `bool`
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCodec;

impl Codec<bool> for BoolCodec {
    fn encode(&self, value: &bool) -> Result<Vec<u8>> {
        Ok(vec![u8::from(*value)])
    }

    fn decode(&self, bytes: &[u8]) -> Result<bool> {
        expect_len(bytes, 1, self.codec_id())?;
        match bytes[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::serialization(format!(
                "bool codec got invalid byte 0x{:02x}",
                other
            ))),
        }
    }

    fn codec_id(&self) -> &'static str {
        "bool"
    }
}

impl Element for bool {
    type Codec = BoolCodec;
}

/// Codec for `i8`
#[derive(Debug, Clone, Copy, Default)]
pub struct I8Codec;

impl Codec<i8> for I8Codec {
    fn encode(&self, value: &i8) -> Result<Vec<u8>> {
        Ok(value.to_be_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<i8> {
        expect_len(bytes, 1, self.codec_id())?;
        Ok(bytes[0] as i8)
    }

    fn codec_id(&self) -> &'static str {
        "i8"
    }
}

impl Element for i8 {
    type Codec = I8Codec;
}

/// Codec for `u8`
#[derive(Debug, Clone, Copy, Default)]
pub struct U8Codec;

impl Codec<u8> for U8Codec {
    fn encode(&self, value: &u8) -> Result<Vec<u8>> {
        Ok(vec![*value])
    }

    fn decode(&self, bytes: &[u8]) -> Result<u8> {
        expect_len(bytes, 1, self.codec_id())?;
        Ok(bytes[0])
    }

    fn codec_id(&self) -> &'static str {
        "u8"
    }
}

impl Element for u8 {
    type Codec = U8Codec;
}

// ============================================================================
// Fixed-width big-endian codecs
// ============================================================================

macro_rules! big_endian_codec {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $id:literal, $read:ident, $write:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Codec<$ty> for $name {
            fn encode(&self, value: &$ty) -> Result<Vec<u8>> {
                let mut buf = vec![0u8; std::mem::size_of::<$ty>()];
                BigEndian::$write(&mut buf, *value);
                Ok(buf)
            }

            fn decode(&self, bytes: &[u8]) -> Result<$ty> {
                expect_len(bytes, std::mem::size_of::<$ty>(), $id)?;
                Ok(BigEndian::$read(bytes))
            }

            fn codec_id(&self) -> &'static str {
                $id
            }
        }

        impl Element for $ty {
            type Codec = $name;
        }
    };
}

big_endian_codec!(
    /// Codec for `i16`
    I16Codec, i16, "i16", read_i16, write_i16
);
big_endian_codec!(
    /// Codec for `i32`
    I32Codec, i32, "i32", read_i32, write_i32
);
big_endian_codec!(
    /// Codec for `i64`
    I64Codec, i64, "i64", read_i64, write_i64
);
big_endian_codec!(
    /// Codec for `u64`
    U64Codec, u64, "u64", read_u64, write_u64
);
big_endian_codec!(
    /// Codec for `f32` (IEEE 754 single precision)
    F32Codec, f32, "f32", read_f32, write_f32
);
big_endian_codec!(
    /// Codec for `f64` (IEEE 754 double precision)
    F64Codec, f64, "f64", read_f64, write_f64
);

// ============================================================================
// Variable-width codecs
// ============================================================================

/// Codec for `String` (UTF-8)
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec<String> for StringCodec {
    fn encode(&self, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(Error::serialization)
    }

    fn codec_id(&self) -> &'static str {
        "string"
    }
}

impl Element for String {
    type Codec = StringCodec;
}

/// Codec for `num_bigint::BigInt`
///
/// Stored as minimal two's complement big-endian bytes; zero is `[0x00]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigIntCodec;

impl Codec<BigInt> for BigIntCodec {
    fn encode(&self, value: &BigInt) -> Result<Vec<u8>> {
        Ok(value.to_signed_bytes_be())
    }

    fn decode(&self, bytes: &[u8]) -> Result<BigInt> {
        if bytes.is_empty() {
            return Err(Error::serialization("bigint codec got no bytes"));
        }
        Ok(BigInt::from_signed_bytes_be(bytes))
    }

    fn codec_id(&self) -> &'static str {
        "bigint"
    }
}

impl Element for BigInt {
    type Codec = BigIntCodec;
}

/// Codec for `bigdecimal::BigDecimal`
///
/// Arbitrary precision in both directions. The scale and the unscaled value
/// are stored as separate fields: four big-endian bytes of signed scale
/// followed by the unscaled value in the [`BigIntCodec`] layout. A negative
/// scale multiplies by a power of ten (`12` with scale `-3` is `12000`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DecimalCodec;

const SCALE_WIDTH: usize = 4;

impl Codec<BigDecimal> for DecimalCodec {
    fn encode(&self, value: &BigDecimal) -> Result<Vec<u8>> {
        let (unscaled, scale) = value.as_bigint_and_exponent();
        let scale = i32::try_from(scale).map_err(|_| {
            Error::serialization(format!("decimal scale {} does not fit in 32 bits", scale))
        })?;

        let mut buf = vec![0u8; SCALE_WIDTH];
        BigEndian::write_i32(&mut buf, scale);
        buf.extend_from_slice(&unscaled.to_signed_bytes_be());
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> Result<BigDecimal> {
        if bytes.len() <= SCALE_WIDTH {
            return Err(Error::serialization(format!(
                "decimal codec expects more than {} bytes, got {}",
                SCALE_WIDTH,
                bytes.len()
            )));
        }
        let scale = BigEndian::read_i32(&bytes[..SCALE_WIDTH]);
        let unscaled = BigInt::from_signed_bytes_be(&bytes[SCALE_WIDTH..]);
        Ok(BigDecimal::new(unscaled, i64::from(scale)))
    }

    fn codec_id(&self) -> &'static str {
        "decimal"
    }
}

impl Element for BigDecimal {
    type Codec = DecimalCodec;
}

// ============================================================================
// Structured fallback
// ============================================================================

/// Fallback codec for any `serde` type, backed by `bincode`.
///
/// Not registered through [`Element`]; pass it explicitly when opening a
/// queue of user-defined structs.
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    /// Create a new bincode codec
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BincodeCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BincodeCodec")
    }
}

impl<T> Clone for BincodeCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for BincodeCodec<T> {
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn codec_id(&self) -> &'static str {
        "bincode"
    }
}
