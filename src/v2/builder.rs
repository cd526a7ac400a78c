use crate::v2::{
    Addresses, Header, Version, MINIMUM_LENGTH, PROTOCOL_PREFIX, UNIX_ADDRESSES_BYTES,
    UNIX_PATH_BYTES, UNIX_RESERVED_BYTES, UNSPECIFIED_TRANSPORT_PROTOCOL,
};

/// Assembles the bytes of a header into a single buffer.
pub struct HeaderBuilder {
    header: Vec<u8>,
}

impl HeaderBuilder {
    /// Start a header with the signature and the given version and command byte.
    pub fn new(version_command: u8) -> Self {
        let mut header = Vec::with_capacity(MINIMUM_LENGTH + UNIX_ADDRESSES_BYTES as usize);

        header.extend_from_slice(PROTOCOL_PREFIX);
        header.push(version_command);

        HeaderBuilder { header }
    }

    /// Writes the address family and protocol byte without a length, as local headers do.
    pub fn write_unspecified(mut self) -> Self {
        self.header.push(UNSPECIFIED_TRANSPORT_PROTOCOL);
        self
    }

    pub fn write_transport_protocol(mut self, address_family_protocol: u8, length: u16) -> Self {
        self.header.push(address_family_protocol);
        self.header.extend_from_slice(&length.to_be_bytes());
        self
    }

    pub fn write_addresses(mut self, addresses: &Addresses) -> Self {
        match addresses {
            Addresses::IPv4(a) => {
                self.header.extend_from_slice(&a.source.ip().octets());
                self.header.extend_from_slice(&a.destination.ip().octets());
                self.header.extend_from_slice(&a.source.port().to_be_bytes());
                self.header.extend_from_slice(&a.destination.port().to_be_bytes());
            }
            Addresses::IPv6(a) => {
                self.header.extend_from_slice(&a.source.ip().octets());
                self.header.extend_from_slice(&a.destination.ip().octets());
                self.header.extend_from_slice(&a.source.port().to_be_bytes());
                self.header.extend_from_slice(&a.destination.port().to_be_bytes());
            }
            Addresses::Unix(a) => {
                self.write_path(&a.source);
                self.write_path(&a.destination);
                self.pad(UNIX_RESERVED_BYTES);
            }
        }

        self
    }

    /// Writes the path null-padded to exactly 108 bytes.
    /// Longer paths are truncated on a character boundary so the slot stays valid UTF-8.
    fn write_path(&mut self, path: &str) {
        let mut length = path.len().min(UNIX_PATH_BYTES);

        while !path.is_char_boundary(length) {
            length -= 1;
        }

        self.header.extend_from_slice(&path.as_bytes()[..length]);
        self.pad(UNIX_PATH_BYTES - length);
    }

    fn pad(&mut self, count: usize) {
        let length = self.header.len() + count;

        self.header.resize(length, 0);
    }

    pub fn build(self) -> Vec<u8> {
        self.header
    }
}

impl From<&Header> for HeaderBuilder {
    fn from(header: &Header) -> Self {
        let builder = HeaderBuilder::new(Version::Two | header.command());

        match (header.transport_protocol(), header.addresses()) {
            (Some(transport_protocol), Some(addresses)) => builder
                .write_transport_protocol(
                    transport_protocol.into(),
                    transport_protocol.address_length(),
                )
                .write_addresses(addresses),
            _ => builder.write_unspecified(),
        }
    }
}
