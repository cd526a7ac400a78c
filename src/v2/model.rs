use crate::ip::{IPv4, IPv6, Unix};
use crate::v2::error::ParseError;
use std::convert::TryFrom;
use std::net::{SocketAddrV4, SocketAddrV6};
use std::ops::BitOr;

pub const PROTOCOL_PREFIX: &[u8; 12] = b"\r\n\r\n\0\r\nQUIT\n";
pub const VERSION_COMMAND: usize = PROTOCOL_PREFIX.len();
pub const ADDRESS_FAMILY_PROTOCOL: usize = VERSION_COMMAND + 1;
pub const LENGTH: usize = ADDRESS_FAMILY_PROTOCOL + 1;
pub const MINIMUM_LENGTH: usize = LENGTH + 2;
/// A local header is parsed up to and including the version and command byte.
pub const LOCAL_LENGTH: usize = ADDRESS_FAMILY_PROTOCOL;
/// A local header is written with an unspecified transport protocol byte and no length.
pub const LOCAL_ENCODED_LENGTH: usize = LENGTH;
/// The address family and protocol byte written for local headers.
pub const UNSPECIFIED_TRANSPORT_PROTOCOL: u8 = 0x00;

pub const IPV4_ADDRESSES_BYTES: u16 = 12;
pub const IPV6_ADDRESSES_BYTES: u16 = 36;
pub const UNIX_ADDRESSES_BYTES: u16 = 218;
pub const UNIX_PATH_BYTES: usize = 108;
/// Trailing bytes of the Unix address block not covered by the two paths.
pub const UNIX_RESERVED_BYTES: usize = UNIX_ADDRESSES_BYTES as usize - 2 * UNIX_PATH_BYTES;

/// Every version and command byte this codec accepts.
pub static SUPPORTED_COMMANDS: [u8; 2] = [0x20, 0x21];

/// Every address family and protocol byte this codec accepts.
pub static SUPPORTED_TRANSPORT_PROTOCOLS: [u8; 6] = [0x11, 0x12, 0x21, 0x22, 0x31, 0x32];

/// The version of the proxy protocol header, stored in the high nibble of the command byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Version {
    Two = 0x20,
}

/// The type of connection received by the server from the proxy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Health checks and other connections established by the proxy itself.
    Local = 0,
    Proxy,
}

impl Command {
    pub fn is_local(&self) -> bool {
        matches!(self, Command::Local)
    }
}

impl BitOr<Command> for Version {
    type Output = u8;

    fn bitor(self, command: Command) -> u8 {
        self as u8 | command as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = ParseError;

    fn try_from(version_command: u8) -> Result<Self, Self::Error> {
        if !SUPPORTED_COMMANDS.contains(&version_command) {
            return Err(ParseError::UnsupportedCommand(version_command));
        }

        match version_command & 0x0F {
            0x00 => Ok(Command::Local),
            _ => Ok(Command::Proxy),
        }
    }
}

/// The address family of the proxied connection, stored in the high nibble of the transport protocol byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressFamily {
    IPv4 = 0x10,
    IPv6 = 0x20,
    Unix = 0x30,
}

impl AddressFamily {
    /// The exact number of address bytes a header of this family must advertise.
    pub fn address_length(&self) -> u16 {
        match self {
            AddressFamily::IPv4 => IPV4_ADDRESSES_BYTES,
            AddressFamily::IPv6 => IPV6_ADDRESSES_BYTES,
            AddressFamily::Unix => UNIX_ADDRESSES_BYTES,
        }
    }
}

/// The transport protocol of the proxied connection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    Stream = 1,
    Datagram,
}

impl BitOr<Protocol> for AddressFamily {
    type Output = u8;

    fn bitor(self, protocol: Protocol) -> u8 {
        self as u8 | protocol as u8
    }
}

/// The combined address family and transport protocol of a header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TransportProtocol {
    pub address_family: AddressFamily,
    pub protocol: Protocol,
}

impl TransportProtocol {
    pub fn new(address_family: AddressFamily, protocol: Protocol) -> Self {
        TransportProtocol {
            address_family,
            protocol,
        }
    }

    pub fn is_ipv4(&self) -> bool {
        self.address_family == AddressFamily::IPv4
    }

    pub fn is_ipv6(&self) -> bool {
        self.address_family == AddressFamily::IPv6
    }

    pub fn is_unix(&self) -> bool {
        self.address_family == AddressFamily::Unix
    }

    pub fn address_length(&self) -> u16 {
        self.address_family.address_length()
    }
}

impl From<TransportProtocol> for u8 {
    fn from(transport_protocol: TransportProtocol) -> Self {
        transport_protocol.address_family | transport_protocol.protocol
    }
}

impl TryFrom<u8> for TransportProtocol {
    type Error = ParseError;

    fn try_from(address_family_protocol: u8) -> Result<Self, Self::Error> {
        if !SUPPORTED_TRANSPORT_PROTOCOLS.contains(&address_family_protocol) {
            return Err(ParseError::UnsupportedTransportProtocol(
                address_family_protocol,
            ));
        }

        let address_family = match address_family_protocol & 0xF0 {
            0x10 => AddressFamily::IPv4,
            0x20 => AddressFamily::IPv6,
            _ => AddressFamily::Unix,
        };
        let protocol = match address_family_protocol & 0x0F {
            0x01 => Protocol::Stream,
            _ => Protocol::Datagram,
        };

        Ok(TransportProtocol::new(address_family, protocol))
    }
}

/// The source and destination of the proxied connection.
/// The variant determines the address family of the header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Addresses {
    IPv4(IPv4),
    IPv6(IPv6),
    Unix(Unix),
}

impl Addresses {
    pub fn address_family(&self) -> AddressFamily {
        match self {
            Addresses::IPv4(..) => AddressFamily::IPv4,
            Addresses::IPv6(..) => AddressFamily::IPv6,
            Addresses::Unix(..) => AddressFamily::Unix,
        }
    }

    /// The source port; Unix sockets have none.
    pub fn source_port(&self) -> Option<u16> {
        match self {
            Addresses::IPv4(a) => Some(a.source.port()),
            Addresses::IPv6(a) => Some(a.source.port()),
            Addresses::Unix(..) => None,
        }
    }

    /// The destination port; Unix sockets have none.
    pub fn destination_port(&self) -> Option<u16> {
        match self {
            Addresses::IPv4(a) => Some(a.destination.port()),
            Addresses::IPv6(a) => Some(a.destination.port()),
            Addresses::Unix(..) => None,
        }
    }
}

impl From<IPv4> for Addresses {
    fn from(addresses: IPv4) -> Self {
        Addresses::IPv4(addresses)
    }
}

impl From<IPv6> for Addresses {
    fn from(addresses: IPv6) -> Self {
        Addresses::IPv6(addresses)
    }
}

impl From<Unix> for Addresses {
    fn from(addresses: Unix) -> Self {
        Addresses::Unix(addresses)
    }
}

impl From<(SocketAddrV4, SocketAddrV4)> for Addresses {
    fn from((source, destination): (SocketAddrV4, SocketAddrV4)) -> Self {
        Addresses::IPv4(IPv4::new(source, destination))
    }
}

impl From<(SocketAddrV6, SocketAddrV6)> for Addresses {
    fn from((source, destination): (SocketAddrV6, SocketAddrV6)) -> Self {
        Addresses::IPv6(IPv6::new(source, destination))
    }
}

/// A binary PROXY protocol header.
///
/// Local headers carry no transport protocol nor addresses;
/// proxy headers always carry both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    command: Command,
    proxied: Option<(Protocol, Addresses)>,
}

impl Header {
    /// Create a new instance of a header for a connection established by the proxy itself.
    pub fn local() -> Self {
        Header {
            command: Command::Local,
            proxied: None,
        }
    }

    /// Create a new instance of a header for a proxied connection.
    pub fn proxy<T: Into<Addresses>>(protocol: Protocol, addresses: T) -> Self {
        Header {
            command: Command::Proxy,
            proxied: Some((protocol, addresses.into())),
        }
    }

    pub fn version(&self) -> Version {
        Version::Two
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn transport_protocol(&self) -> Option<TransportProtocol> {
        self.proxied.as_ref().map(|(protocol, addresses)| {
            TransportProtocol::new(addresses.address_family(), *protocol)
        })
    }

    /// The addresses of the client and server connected to by the proxy.
    pub fn addresses(&self) -> Option<&Addresses> {
        self.proxied.as_ref().map(|(_, addresses)| addresses)
    }

    pub fn source_port(&self) -> Option<u16> {
        self.addresses().and_then(Addresses::source_port)
    }

    pub fn destination_port(&self) -> Option<u16> {
        self.addresses().and_then(Addresses::destination_port)
    }

    /// The number of bytes this header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        match self.transport_protocol() {
            Some(transport_protocol) => {
                MINIMUM_LENGTH + transport_protocol.address_length() as usize
            }
            None => LOCAL_ENCODED_LENGTH,
        }
    }
}
