//! Models for storing the source and destination endpoints of a proxied connection.

use std::net::{SocketAddrV4, SocketAddrV6};
use std::path::Path;

/// The source and destination IPv4 addresses and ports of a header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IPv4 {
    pub source: SocketAddrV4,
    pub destination: SocketAddrV4,
}

impl IPv4 {
    /// Create a new IPv4 addresses.
    pub fn new<T: Into<SocketAddrV4>>(source: T, destination: T) -> Self {
        IPv4 {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// The source and destination IPv6 addresses and ports of a header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IPv6 {
    pub source: SocketAddrV6,
    pub destination: SocketAddrV6,
}

impl IPv6 {
    /// Create a new IPv6 addresses.
    pub fn new<T: Into<SocketAddrV6>>(source: T, destination: T) -> Self {
        IPv6 {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// The source and destination paths of a Unix domain socket connection.
/// Paths are kept as UTF-8 text, which is the only form the header can carry.
/// Unix addresses carry no ports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unix {
    pub source: String,
    pub destination: String,
}

impl Unix {
    /// Create a new pair of Unix socket paths.
    pub fn new<T: Into<String>>(source: T, destination: T) -> Self {
        Unix {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn source_path(&self) -> &Path {
        Path::new(&self.source)
    }

    pub fn destination_path(&self) -> &Path {
        Path::new(&self.destination)
    }
}
