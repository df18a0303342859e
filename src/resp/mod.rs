mod codec;
mod decode;
mod encode;

use bytes::BytesMut;
use enum_dispatch::enum_dispatch;
use std::ops::Deref;
use thiserror::Error;

pub use codec::{CodecError, RespFrameCodec};

#[enum_dispatch]
pub trait RespEncode {
    fn encode(self) -> Vec<u8>;
}

// Decoding works on the front of a buffer that may still be filling up.
// `expect_length` measures a frame without consuming it, so an aggregate can
// tell whether all of its elements have arrived before it advances the buffer.
pub trait RespDecode: Sized {
    const PREFIX: &'static str;
    fn decode(buf: &mut BytesMut) -> Result<Self, RespError>;
    fn expect_length(buf: &[u8]) -> Result<usize, RespError>;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RespError {
    #[error("unknown frame type: {0:#04x}")]
    UnknownType(u8),
    #[error("invalid length: {0}")]
    InvalidLength(String),
    #[error("out of bounds: {0}")]
    OutOfBounds(String),
    #[error("stream ended in the middle of a frame")]
    UnexpectedEnd,
    #[error("frame is not complete")]
    NotComplete,
    #[error("arrays nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("array element {index}: {source}")]
    Nested {
        index: usize,
        source: Box<RespError>,
    },
}

#[enum_dispatch(RespEncode)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespFrame {
    SimpleString(SimpleString),
    Error(SimpleError),
    Integer(i64),
    BulkString(BulkString),
    NullBulkString(RespNullBulkString),
    Array(RespArray),
    NullArray(RespNullArray),
    Null(RespNull),
}

// A null bulk string ($-1), a null array (*-1) and RESP3 null (_) are three
// different variants, and none of them equals the empty string or empty array.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleString(pub(crate) String);
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleError(pub(crate) String);
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkString(pub(crate) Vec<u8>);
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespNull;
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespArray(pub(crate) Vec<RespFrame>);
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespNullArray;
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespNullBulkString;

macro_rules! deref_newtype {
    ($($name:ident => $target:ty),* $(,)?) => {
        $(
            impl Deref for $name {
                type Target = $target;

                fn deref(&self) -> &Self::Target {
                    &self.0
                }
            }
        )*
    };
}

deref_newtype! {
    SimpleString => String,
    SimpleError => String,
    BulkString => Vec<u8>,
    RespArray => Vec<RespFrame>,
}

impl AsRef<[u8]> for BulkString {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl SimpleString {
    pub fn new(s: impl Into<String>) -> Self {
        SimpleString(s.into())
    }
}

impl SimpleError {
    pub fn new(s: impl Into<String>) -> Self {
        SimpleError(s.into())
    }
}

impl BulkString {
    pub fn new(s: impl Into<Vec<u8>>) -> Self {
        BulkString(s.into())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl RespArray {
    pub fn new(s: impl Into<Vec<RespFrame>>) -> Self {
        RespArray(s.into())
    }

    pub fn into_inner(self) -> Vec<RespFrame> {
        self.0
    }
}

// Byte-like values become bulk strings, the shape every request argument has.
macro_rules! bulk_from {
    ($([$($generics:tt)*] $from:ty),* $(,)?) => {
        $(
            impl<$($generics)*> From<$from> for BulkString {
                fn from(s: $from) -> Self {
                    BulkString(AsRef::<[u8]>::as_ref(s).to_vec())
                }
            }

            impl<$($generics)*> From<$from> for RespFrame {
                fn from(s: $from) -> Self {
                    RespFrame::BulkString(s.into())
                }
            }
        )*
    };
}

bulk_from! {
    [] &str,
    [] &[u8],
    [const N: usize] &[u8; N],
}
