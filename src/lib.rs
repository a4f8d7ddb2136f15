#![deny(clippy::pedantic, missing_docs, unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![doc = include_str!("../README.md")]

// Implements the OpenToken binary token format: a compact, authenticated,
// encrypted envelope for carrying an ordered set of key/value claims between
// parties that share a password.
//
// Module map:
//
// TextCodec         --> text_codec.rs
// KeyDeriver        --> key_deriver.rs
// CipherSuite table --> cipher_suite.rs
// Payload           --> payload.rs
// FrameCodec        --> frame.rs
// ClaimValidator    --> claims.rs
// Public API        --> codec.rs

mod cipher_suite;
mod claims;
mod codec;
mod error;
mod frame;
mod key_deriver;
mod payload;
mod text_codec;

pub use cipher_suite::CipherSuite;
pub use claims::{Clock, FixedClock, SystemClock};
pub use codec::OpenTokenCodec;
pub use error::OpenTokenError;
pub use key_deriver::Password;
pub use payload::Payload;

/// Low-level building blocks, exposed for callers who need to work below the
/// [`OpenTokenCodec`] facade — e.g. to interoperate with a token produced by
/// another implementation, or to drive TextCodec/KeyDeriver independently.
pub mod low_level {
    pub use crate::key_deriver::derive;
    pub use crate::text_codec::{from_otk, to_otk};
}
