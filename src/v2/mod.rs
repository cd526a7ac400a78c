//! Version 2 of the HAProxy protocol (binary version).
//!
//! See <https://haproxy.org/download/1.8/doc/proxy-protocol.txt>

mod builder;
mod error;
mod model;

pub use crate::ip::{IPv4, IPv6, Unix};
pub use builder::HeaderBuilder;
pub use error::ParseError;
pub use model::{
    AddressFamily, Addresses, Command, Header, Protocol, TransportProtocol, Version,
    ADDRESS_FAMILY_PROTOCOL, IPV4_ADDRESSES_BYTES, IPV6_ADDRESSES_BYTES, LENGTH,
    LOCAL_ENCODED_LENGTH, LOCAL_LENGTH, MINIMUM_LENGTH, PROTOCOL_PREFIX, SUPPORTED_COMMANDS,
    SUPPORTED_TRANSPORT_PROTOCOLS, UNIX_ADDRESSES_BYTES, UNIX_PATH_BYTES, UNIX_RESERVED_BYTES,
    UNSPECIFIED_TRANSPORT_PROTOCOL, VERSION_COMMAND,
};

use nom::bytes::complete::take;
use nom::combinator::{map, rest};
use nom::number::complete::{be_u128, be_u16, be_u32};
use nom::sequence::{pair, terminated, tuple};
use nom::IResult;
use std::convert::TryFrom;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddrV4, SocketAddrV6};
use std::str::{from_utf8, Utf8Error};
use tracing::{debug, trace};

/// Parses a binary PROXY protocol header from the front of the reader.
///
/// On success the reader is positioned immediately after the header.
/// On failure the reader may be partially consumed and should be discarded.
pub fn parse<R: Read + ?Sized>(reader: &mut R) -> Result<Header, ParseError> {
    match parse_header(reader) {
        Ok(header) => {
            trace!(
                command = ?header.command(),
                transport_protocol = ?header.transport_protocol(),
                "parsed proxy protocol header"
            );
            Ok(header)
        }
        Err(error) => {
            match &error {
                ParseError::UnsupportedCommand(byte)
                | ParseError::UnsupportedTransportProtocol(byte) => {
                    debug!(kind = ?error, byte, "rejected proxy protocol header")
                }
                ParseError::InvalidLength { declared, expected } => debug!(
                    kind = ?error,
                    declared,
                    expected,
                    "rejected proxy protocol header"
                ),
                _ => debug!(kind = ?error, %error, "rejected proxy protocol header"),
            }
            Err(error)
        }
    }
}

/// Writes the complete header to the writer in a single call.
/// Returns the number of bytes written.
pub fn write<W: Write + ?Sized>(header: &Header, writer: &mut W) -> io::Result<usize> {
    let bytes = header.to_bytes();

    writer.write_all(&bytes)?;
    trace!(length = bytes.len(), "wrote proxy protocol header");

    Ok(bytes.len())
}

impl Header {
    /// The complete wire representation of this header.
    pub fn to_bytes(&self) -> Vec<u8> {
        HeaderBuilder::from(self).build()
    }
}

impl<'a> TryFrom<&'a [u8]> for Header {
    type Error = ParseError;

    fn try_from(mut input: &'a [u8]) -> Result<Self, Self::Error> {
        parse(&mut input)
    }
}

fn parse_header<R: Read + ?Sized>(reader: &mut R) -> Result<Header, ParseError> {
    let mut signature = [0; VERSION_COMMAND];
    reader
        .read_exact(&mut signature)
        .map_err(|e| ParseError::SignatureRead(e.kind()))?;

    if &signature != PROTOCOL_PREFIX {
        return Err(ParseError::SignatureMismatch);
    }

    let command = Command::try_from(read_u8(reader).map_err(ParseError::CommandRead)?)?;

    if command.is_local() {
        return Ok(Header::local());
    }

    let transport_protocol =
        TransportProtocol::try_from(read_u8(reader).map_err(ParseError::TransportProtocolRead)?)?;

    let mut length = [0; 2];
    reader
        .read_exact(&mut length)
        .map_err(|e| ParseError::LengthRead(e.kind()))?;
    let length = u16::from_be_bytes(length);

    let expected = transport_protocol.address_length();
    if length != expected {
        return Err(ParseError::InvalidLength {
            declared: length,
            expected,
        });
    }

    let mut address_bytes = vec![0; length as usize];
    reader
        .read_exact(&mut address_bytes)
        .map_err(|e| ParseError::InvalidAddress(e.kind()))?;

    let addresses = parse_addresses(transport_protocol.address_family, &address_bytes)?;

    Ok(Header::proxy(transport_protocol.protocol, addresses))
}

fn read_u8<R: Read + ?Sized>(reader: &mut R) -> Result<u8, ErrorKind> {
    let mut byte = [0];

    reader.read_exact(&mut byte).map_err(|e| e.kind())?;

    Ok(byte[0])
}

/// Decodes an address block whose length has already been checked against the address family.
fn parse_addresses(address_family: AddressFamily, input: &[u8]) -> Result<Addresses, ParseError> {
    match address_family {
        AddressFamily::IPv4 => ipv4(input)
            .map(|(_, addresses)| Addresses::IPv4(addresses))
            .map_err(|_| ParseError::InvalidAddress(ErrorKind::InvalidData)),
        AddressFamily::IPv6 => ipv6(input)
            .map(|(_, addresses)| Addresses::IPv6(addresses))
            .map_err(|_| ParseError::InvalidAddress(ErrorKind::InvalidData)),
        AddressFamily::Unix => {
            let (_, (source, destination)) =
                unix(input).map_err(|_| ParseError::InvalidAddress(ErrorKind::InvalidData))?;

            Ok(Addresses::Unix(Unix::new(
                unix_path(source).map_err(ParseError::SourceUnixAddress)?,
                unix_path(destination).map_err(ParseError::DestinationUnixAddress)?,
            )))
        }
    }
}

fn ipv4(input: &[u8]) -> IResult<&[u8], IPv4> {
    map(
        tuple((be_u32, be_u32, be_u16, be_u16)),
        |(source, destination, source_port, destination_port)| {
            IPv4::new(
                SocketAddrV4::new(source.into(), source_port),
                SocketAddrV4::new(destination.into(), destination_port),
            )
        },
    )(input)
}

fn ipv6(input: &[u8]) -> IResult<&[u8], IPv6> {
    map(
        tuple((be_u128, be_u128, be_u16, be_u16)),
        |(source, destination, source_port, destination_port)| {
            IPv6::new(
                SocketAddrV6::new(source.into(), source_port, 0, 0),
                SocketAddrV6::new(destination.into(), destination_port, 0, 0),
            )
        },
    )(input)
}

/// Splits the block into the two path slots, ignoring the reserved trailing bytes.
fn unix(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    terminated(pair(take(UNIX_PATH_BYTES), take(UNIX_PATH_BYTES)), rest)(input)
}

/// A path slot holds the path up to the first null byte.
fn unix_path(slot: &[u8]) -> Result<String, Utf8Error> {
    let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());

    Ok(from_utf8(&slot[..end])?.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PartialResult;
    use std::io::Cursor;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn ipv4_input() -> Vec<u8> {
        let mut input = Vec::from(&PROTOCOL_PREFIX[..]);

        input.push(0x21);
        input.push(0x11);
        input.extend_from_slice(&[0, 12]);
        input.extend_from_slice(&[192, 0, 2, 1]);
        input.extend_from_slice(&[198, 51, 100, 1]);
        input.extend_from_slice(&[1, 187]);
        input.extend_from_slice(&[0, 80]);

        input
    }

    fn ipv4_header() -> Header {
        Header::proxy(
            Protocol::Stream,
            IPv4::new(
                SocketAddrV4::new(Ipv4Addr::new(192, 0, 2, 1), 443),
                SocketAddrV4::new(Ipv4Addr::new(198, 51, 100, 1), 80),
            ),
        )
    }

    fn ipv6_header() -> Header {
        Header::proxy(
            Protocol::Datagram,
            IPv6::new(
                SocketAddrV6::new(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1), 65535, 0, 0),
                SocketAddrV6::new(Ipv6Addr::LOCALHOST, 0, 0, 0),
            ),
        )
    }

    fn unix_header() -> Header {
        Header::proxy(
            Protocol::Stream,
            Unix::new("/var/run/haproxy.sock", "/var/run/backend.sock"),
        )
    }

    #[test]
    fn parse_ipv4() {
        let input = ipv4_input();
        let header = Header::try_from(&input[..]).unwrap();

        assert_eq!(header, ipv4_header());
        assert_eq!(Some(443), header.source_port());
        assert_eq!(Some(80), header.destination_port());
    }

    #[test]
    fn parse_leaves_trailing_bytes() {
        let mut input = ipv4_input();
        input.extend_from_slice(b"GET / HTTP/1.1\r\n");

        let mut reader = Cursor::new(input);
        let header = parse(&mut reader).unwrap();
        let mut remaining = String::new();
        reader.read_to_string(&mut remaining).unwrap();

        assert_eq!(header, ipv4_header());
        assert_eq!(remaining, "GET / HTTP/1.1\r\n");
    }

    #[test]
    fn parse_invalid_length() {
        let cases: [(u8, u16, u16); 8] = [
            (0x11, 11, 12),
            (0x11, 36, 12),
            (0x12, 218, 12),
            (0x21, 12, 36),
            (0x22, 218, 36),
            (0x31, 216, 218),
            (0x32, 36, 218),
            (0x31, 12, 218),
        ];

        for &(transport_protocol, declared, expected) in cases.iter() {
            let mut input = Vec::from(&PROTOCOL_PREFIX[..]);
            input.extend_from_slice(&[0x21, transport_protocol]);
            input.extend_from_slice(&declared.to_be_bytes());
            input.resize(input.len() + declared as usize + 64, 0);

            let mut reader = Cursor::new(input);

            assert_eq!(
                parse(&mut reader),
                Err(ParseError::InvalidLength { declared, expected })
            );
            assert_eq!(reader.position() as usize, MINIMUM_LENGTH);
        }
    }

    #[test]
    fn parse_local() {
        let mut input = Vec::from(&PROTOCOL_PREFIX[..]);
        input.push(0x20);
        input.extend_from_slice(&[0xFF, 0x00, 0x01, 0x02]);

        let mut reader = Cursor::new(input);
        let header = parse(&mut reader).unwrap();

        assert!(header.command().is_local());
        assert_eq!(None, header.addresses());
        assert_eq!(None, header.source_port());
        assert_eq!(reader.position(), 13);
    }

    #[test]
    fn parse_signature_mismatch() {
        let mut input = ipv4_input();
        input[4] = 1;

        assert_eq!(
            Header::try_from(&input[..]),
            Err(ParseError::SignatureMismatch)
        );
    }

    #[test]
    fn parse_unsupported_command() {
        let mut input = ipv4_input();
        input[VERSION_COMMAND] = 0x22;

        let mut reader = Cursor::new(input);

        assert_eq!(
            parse(&mut reader),
            Err(ParseError::UnsupportedCommand(0x22))
        );
        assert_eq!(reader.position(), 13);
    }

    #[test]
    fn parse_unsupported_version() {
        let mut input = ipv4_input();
        input[VERSION_COMMAND] = 0x11;

        assert_eq!(
            Header::try_from(&input[..]),
            Err(ParseError::UnsupportedCommand(0x11))
        );
    }

    #[test]
    fn parse_unsupported_transport_protocol() {
        let mut input = ipv4_input();
        input[ADDRESS_FAMILY_PROTOCOL] = 0x00;

        let mut reader = Cursor::new(input);

        assert_eq!(
            parse(&mut reader),
            Err(ParseError::UnsupportedTransportProtocol(0x00))
        );
        assert_eq!(reader.position(), 14);
    }

    #[test]
    fn parse_truncated() {
        let input = ipv4_input();

        for end in 0..input.len() {
            let result = Header::try_from(&input[..end]);
            let expected = match end {
                0..=11 => ParseError::SignatureRead(ErrorKind::UnexpectedEof),
                12 => ParseError::CommandRead(ErrorKind::UnexpectedEof),
                13 => ParseError::TransportProtocolRead(ErrorKind::UnexpectedEof),
                14..=15 => ParseError::LengthRead(ErrorKind::UnexpectedEof),
                _ => ParseError::InvalidAddress(ErrorKind::UnexpectedEof),
            };

            assert!(result.is_incomplete());
            assert_eq!(result, Err(expected));
        }
    }

    #[test]
    fn parse_truncated_unix() {
        let input = unix_header().to_bytes();

        for end in MINIMUM_LENGTH..input.len() {
            assert_eq!(
                Header::try_from(&input[..end]),
                Err(ParseError::InvalidAddress(ErrorKind::UnexpectedEof))
            );
        }
    }

    #[test]
    fn parse_unix() {
        let mut input = unix_header().to_bytes();
        input.extend_from_slice(b"data");

        let mut reader = Cursor::new(input);
        let header = parse(&mut reader).unwrap();

        assert_eq!(header, unix_header());
        assert_eq!(reader.position() as usize, MINIMUM_LENGTH + 218);
    }

    #[test]
    fn parse_unix_trims_path() {
        let mut input = Vec::from(&PROTOCOL_PREFIX[..]);
        input.extend_from_slice(&[0x21, 0x32, 0, 218]);
        input.extend_from_slice(b" /tmp/a.sock \0garbage");
        input.resize(MINIMUM_LENGTH + UNIX_PATH_BYTES, 0);
        input.resize(MINIMUM_LENGTH + UNIX_ADDRESSES_BYTES as usize, 0);

        let header = Header::try_from(&input[..]).unwrap();

        assert_eq!(
            header,
            Header::proxy(Protocol::Datagram, Unix::new("/tmp/a.sock", ""))
        );
    }

    #[test]
    fn parse_unix_invalid_source() {
        let mut input = Vec::from(&PROTOCOL_PREFIX[..]);
        input.extend_from_slice(&[0x21, 0x31, 0, 218]);
        input.extend_from_slice(&[0xF0, 0x90, 0x80]);
        input.resize(MINIMUM_LENGTH + UNIX_ADDRESSES_BYTES as usize, 0);

        let result = Header::try_from(&input[..]);

        assert!(matches!(result, Err(ParseError::SourceUnixAddress(_))));
        assert!(result.is_complete());
    }

    #[test]
    fn parse_unix_invalid_destination() {
        let mut input = Vec::from(&PROTOCOL_PREFIX[..]);
        input.extend_from_slice(&[0x21, 0x31, 0, 218]);
        input.resize(MINIMUM_LENGTH + UNIX_PATH_BYTES, 0);
        input.push(0xFF);
        input.resize(MINIMUM_LENGTH + UNIX_ADDRESSES_BYTES as usize, 0);

        assert!(matches!(
            Header::try_from(&input[..]),
            Err(ParseError::DestinationUnixAddress(_))
        ));
    }

    #[test]
    fn round_trip() {
        for header in vec![ipv4_header(), ipv6_header(), unix_header(), Header::local()] {
            let mut output = Vec::new();
            let written = write(&header, &mut output).unwrap();

            assert_eq!(written, header.encoded_len());
            assert_eq!(written, output.len());
            assert_eq!(Header::try_from(&output[..]), Ok(header));
        }
    }

    #[test]
    fn write_ipv4() {
        let mut output = Vec::new();

        write(&ipv4_header(), &mut output).unwrap();

        assert_eq!(output, ipv4_input());
        assert_eq!(&output[..12], &PROTOCOL_PREFIX[..]);
        assert_eq!(output[VERSION_COMMAND], 0x21);
        assert_eq!(output[ADDRESS_FAMILY_PROTOCOL], 0x11);
        assert_eq!(&output[LENGTH..MINIMUM_LENGTH], &[0x00, 0x0C]);
    }

    #[test]
    fn write_local() {
        let mut output = Vec::new();

        let written = write(&Header::local(), &mut output).unwrap();

        assert_eq!(written, LOCAL_ENCODED_LENGTH);
        assert_eq!(written, 14);
        assert_eq!(&output[..12], &PROTOCOL_PREFIX[..]);
        assert_eq!(output[VERSION_COMMAND], 0x20);
        assert_eq!(output[ADDRESS_FAMILY_PROTOCOL], UNSPECIFIED_TRANSPORT_PROTOCOL);

        let mut reader = Cursor::new(output);

        assert_eq!(parse(&mut reader), Ok(Header::local()));
        assert_eq!(reader.position() as usize, LOCAL_LENGTH);
    }

    #[test]
    fn round_trip_unix_long_paths() {
        let source = format!("/{}é", "a".repeat(106));
        let destination = "b".repeat(108);
        let header = Header::proxy(
            Protocol::Datagram,
            Unix::new(source.as_str(), destination.as_str()),
        );

        let parsed = Header::try_from(&header.to_bytes()[..]).unwrap();

        assert_eq!(
            parsed,
            Header::proxy(
                Protocol::Datagram,
                Unix::new(&source[..107], destination.as_str())
            )
        );
    }

    struct FailingWriter {
        attempts: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            self.attempts += 1;
            Err(io::Error::new(ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure() {
        let mut writer = FailingWriter { attempts: 0 };

        let error = write(&ipv6_header(), &mut writer).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::BrokenPipe);
        assert_eq!(writer.attempts, 1);
    }

    #[test]
    fn write_to_fixed_buffer_too_small() {
        let mut buffer = [0u8; 20];
        let mut output = &mut buffer[..];

        let error = write(&ipv4_header(), &mut output).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::WriteZero);
    }
}
