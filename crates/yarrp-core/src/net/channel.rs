use crate::constants::RECV_BUFFER_SIZE;
use crate::error::{Error, ErrorKind, IoError, Result};
use crate::net::socket::Socket;
use crate::net::{ProbeSender, ReplyReceiver};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::instrument;

/// Open the raw sockets used by a scan.
///
/// The sending and receiving halves are returned separately so that each may be moved to its own
/// thread.  This operation requires the `CAP_NET_RAW` capability on Linux.
#[instrument(level = "trace")]
pub fn connect<S: Socket>(source_addr: IpAddr) -> Result<(SendChannel<S>, RecvChannel<S>)> {
    let send_socket = match source_addr {
        IpAddr::V4(_) => S::new_send_socket_ipv4(),
        IpAddr::V6(_) => S::new_send_socket_ipv6(),
    }?;
    let mut recv_socket = match source_addr {
        IpAddr::V4(_) => S::new_recv_socket_ipv4(),
        IpAddr::V6(_) => S::new_recv_socket_ipv6(),
    }?;
    if let Err(err) = recv_socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        tracing::warn!(%err, size = RECV_BUFFER_SIZE, "using default receive buffer");
    }
    Ok((
        SendChannel {
            socket: send_socket,
        },
        RecvChannel {
            socket: recv_socket,
        },
    ))
}

/// The sending half of a raw socket pair.
pub struct SendChannel<S: Socket> {
    socket: S,
}

impl<S: Socket + Send> ProbeSender for SendChannel<S> {
    /// A failed send loses only this probe and is logged, the scan carries on.
    #[instrument(skip(self, packet), level = "trace")]
    fn send_probe(&mut self, packet: &[u8], target: IpAddr) -> Result<()> {
        if let Err(err) = self.socket.send_to(packet, SocketAddr::new(target, 0)) {
            match err.kind() {
                ErrorKind::NoBufferSpace | ErrorKind::HostUnreachable => {
                    tracing::debug!(%target, %err, "probe not sent");
                }
                ErrorKind::Std(_) => tracing::warn!(%target, %err, "probe not sent"),
            }
        }
        Ok(())
    }
}

/// The receiving half of a raw socket pair.
pub struct RecvChannel<S: Socket> {
    socket: S,
}

impl<S: Socket + Send> ReplyReceiver for RecvChannel<S> {
    #[instrument(skip(self, buf), level = "trace")]
    fn recv_packet(&mut self, buf: &mut [u8], timeout: Duration) -> Result<Option<(usize, IpAddr)>> {
        if !self.socket.is_readable(timeout)? {
            return Ok(None);
        }
        match self.socket.recv_from(buf) {
            Ok((bytes_read, Some(addr))) => Ok(Some((bytes_read, addr.ip()))),
            Ok((_, None)) => Err(Error::MissingAddr),
            Err(err) if is_would_block(&err) => Ok(None),
            Err(err) => Err(Error::IoError(err)),
        }
    }
}

fn is_would_block(err: &IoError) -> bool {
    err.kind() == ErrorKind::Std(std::io::ErrorKind::WouldBlock)
}
