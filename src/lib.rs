//! A binary (version 2) Proxy Protocol header codec written in Rust.
//! Parses a header from the front of a byte stream and writes one back out.

mod ip;

pub mod v2;

pub use v2::{parse, write, Header, ParseError};

use std::io::ErrorKind;

/// The canonical way to determine when a streamed header should be retried in a streaming context.
/// The protocol states that servers may choose to support partial headers or to close the connection if the header is not present all at once.
pub trait PartialResult {
    /// Tests whether this `Result` is successful or whether the error is terminal.
    /// A terminal error will not result in a success even with more bytes.
    /// Retrying with the same -- or more -- input will not change the result.
    fn is_complete(&self) -> bool {
        !self.is_incomplete()
    }

    /// Tests whether this `Result` is incomplete.
    /// An action that leads to an incomplete result may have a different result with more bytes.
    /// Retrying with the same input will not change the result.
    fn is_incomplete(&self) -> bool;
}

impl<T, E: PartialResult> PartialResult for Result<T, E> {
    fn is_incomplete(&self) -> bool {
        match self {
            Ok(_) => false,
            Err(error) => error.is_incomplete(),
        }
    }
}

impl PartialResult for v2::ParseError {
    fn is_incomplete(&self) -> bool {
        match self {
            v2::ParseError::SignatureRead(kind)
            | v2::ParseError::CommandRead(kind)
            | v2::ParseError::TransportProtocolRead(kind)
            | v2::ParseError::LengthRead(kind)
            | v2::ParseError::InvalidAddress(kind) => *kind == ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
