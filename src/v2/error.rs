use std::io::ErrorKind;

/// An error in parsing a binary PROXY protocol header.
/// Read failures carry the kind of the underlying I/O error.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unable to read the 12 byte signature ({0:?}).")]
    SignatureRead(ErrorKind),
    #[error("Expected header to start with a signature of '\\r\\n\\r\\n\\0\\r\\nQUIT\\n'.")]
    SignatureMismatch,
    #[error("Unable to read the version and command byte ({0:?}).")]
    CommandRead(ErrorKind),
    #[error("Unsupported version and command {0:#04X}. Must be one of: 0x20 (Local), 0x21 (Proxy).")]
    UnsupportedCommand(u8),
    #[error("Unable to read the address family and protocol byte ({0:?}).")]
    TransportProtocolRead(ErrorKind),
    #[error("Unsupported address family and protocol {0:#04X}. Address family must be one of: IPv4, IPv6, Unix; protocol one of: Stream, Datagram.")]
    UnsupportedTransportProtocol(u8),
    #[error("Unable to read the 2 byte address length ({0:?}).")]
    LengthRead(ErrorKind),
    #[error("Header advertises {declared} bytes of addresses, but the address family requires exactly {expected}.")]
    InvalidLength { declared: u16, expected: u16 },
    #[error("Unable to read the address block ({0:?}).")]
    InvalidAddress(ErrorKind),
    #[error("Header contains an invalid Unix path for the source.")]
    SourceUnixAddress(#[source] std::str::Utf8Error),
    #[error("Header contains an invalid Unix path for the destination.")]
    DestinationUnixAddress(#[source] std::str::Utf8Error),
}
