use std::fmt::{Display, Formatter};
use std::io;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

/// A scanner error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A scanner error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid config: {0}")]
    BadConfig(String),
    #[error("permutation error: {0}")]
    PermError(#[from] PermError),
    #[error("invalid packet: {0}")]
    PacketError(#[from] yarrp_packet::error::Error),
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    #[error("invalid prefix on line {line}: {text}")]
    BadPrefix { line: usize, text: String },
    #[error("address family mismatch for {0}")]
    AddressFamily(String),
    #[error("instance {0} already running")]
    InstanceLocked(u8),
    #[error("invalid packet size: {0}")]
    InvalidPacketSize(usize),
    #[error("missing address from socket call")]
    MissingAddr,
    #[error("invalid source IP address: {0}")]
    InvalidSourceAddr(IpAddr),
}

/// A permutation result.
pub type PermResult<T> = std::result::Result<T, PermError>;

/// A permutation error.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum PermError {
    #[error("bad key length: expected {expected} bytes, got {actual}")]
    BadKeyLength { expected: usize, actual: usize },
    #[error("mode not supported for range")]
    ModeNotSupported,
    #[error("cipher not supported for range")]
    CipherNotSupported,
    #[error("cannot allocate a prefix table of {range} entries")]
    OutOfMemory { range: u64 },
    #[error("value out of range")]
    Range,
    #[error("end of permutation")]
    End,
    #[error("operation not supported in cycle mode")]
    OperationNotSupported,
}

/// Custom IO error result.
pub type IoResult<T> = std::result::Result<T, IoError>;

/// Custom IO error.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("Bind error for {1}: {0}")]
    Bind(io::Error, SocketAddr),
    #[error("Connect error for {1}: {0}")]
    Connect(io::Error, SocketAddr),
    #[error("Sendto error for {1}: {0}")]
    SendTo(io::Error, SocketAddr),
    #[error("Failed to {1}: {0}")]
    Other(io::Error, IoOperation),
}

impl IoError {
    /// Get the custom error kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Bind(e, _) | Self::Connect(e, _) | Self::SendTo(e, _) | Self::Other(e, _) => {
                ErrorKind::from(e)
            }
        }
    }
}

/// Custom error kind.
///
/// This includes additional error kinds that are not part of the standard [`io::ErrorKind`].
#[derive(Debug, Eq, PartialEq)]
pub enum ErrorKind {
    NoBufferSpace,
    HostUnreachable,
    Std(io::ErrorKind),
}

/// Io operation.
#[derive(Debug)]
pub enum IoOperation {
    NewSocket,
    SetNonBlocking,
    Select,
    RecvFrom,
    SetHeaderIncluded,
    SetRecvBufferSize,
    LocalAddr,
    LockDir,
    LockFile,
    ReadInput,
    WriteOutput,
    SpawnThread,
}

impl Display for IoOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewSocket => write!(f, "create new socket"),
            Self::SetNonBlocking => write!(f, "set non-blocking"),
            Self::Select => write!(f, "select"),
            Self::RecvFrom => write!(f, "recv from"),
            Self::SetHeaderIncluded => write!(f, "set header included"),
            Self::SetRecvBufferSize => write!(f, "set receive buffer size"),
            Self::LocalAddr => write!(f, "local address"),
            Self::LockDir => write!(f, "create lock directory"),
            Self::LockFile => write!(f, "lock instance file"),
            Self::ReadInput => write!(f, "read input"),
            Self::WriteOutput => write!(f, "write output"),
            Self::SpawnThread => write!(f, "spawn thread"),
        }
    }
}
