use crate::error::Result;
use crate::net::platform::{Ipv4ByteOrder, Platform};
use std::net::IpAddr;

pub struct PlatformImpl;

impl Platform for PlatformImpl {
    fn byte_order_for_address(addr: IpAddr) -> Result<Ipv4ByteOrder> {
        address::for_address(addr)
    }
    fn discover_local_addr(target_addr: IpAddr, port: u16) -> Result<IpAddr> {
        address::discover_local_addr(target_addr, port)
    }
}

mod address {
    use crate::error::{Error, Result};
    use crate::net::platform::Ipv4ByteOrder;
    use crate::net::socket::Socket;
    use crate::net::SocketImpl;
    use std::net::{IpAddr, SocketAddr};
    use tracing::instrument;

    #[cfg(not(target_os = "linux"))]
    use std::net::Ipv4Addr;

    /// The size of the test packet to use for discovering the `total_length` byte order.
    #[cfg(not(target_os = "linux"))]
    const TEST_PACKET_LENGTH: u16 = 256;

    /// Linux accepts either network byte order or host byte order for the `total_length` field,
    /// and so we skip the check and return network byte order unconditionally.
    #[cfg(target_os = "linux")]
    #[allow(clippy::unnecessary_wraps)]
    pub const fn for_address(_src_addr: IpAddr) -> Result<Ipv4ByteOrder> {
        Ok(Ipv4ByteOrder::Network)
    }

    #[cfg(not(target_os = "linux"))]
    #[instrument(ret, level = "trace")]
    pub fn for_address(addr: IpAddr) -> Result<Ipv4ByteOrder> {
        let addr = match addr {
            IpAddr::V4(addr) => addr,
            IpAddr::V6(_) => return Ok(Ipv4ByteOrder::Network),
        };
        match test_send_local_ip4_packet(addr, TEST_PACKET_LENGTH) {
            Ok(()) => Ok(Ipv4ByteOrder::Network),
            Err(Error::IoError(io))
                if io.kind() == crate::error::ErrorKind::Std(std::io::ErrorKind::InvalidInput) =>
            {
                test_send_local_ip4_packet(addr, TEST_PACKET_LENGTH.swap_bytes())
                    .map(|()| Ipv4ByteOrder::Host)
            }
            Err(err) => Err(err),
        }
    }

    /// Attempt to send an `ICMP` echo to localhost.
    ///
    /// The packet is actually of length `256` bytes, but we set the `total_length` based on the
    /// input provided to test if the OS rejects the attempt during the call to `send_to`.
    #[cfg(not(target_os = "linux"))]
    #[instrument(ret, level = "trace")]
    fn test_send_local_ip4_packet(src_addr: Ipv4Addr, total_length: u16) -> Result<()> {
        use yarrp_packet::icmpv4::echo::EchoPacket;
        use yarrp_packet::icmpv4::{IcmpCode, IcmpType};
        let mut icmp_buf = [0_u8; EchoPacket::minimum_packet_size()];
        let mut icmp = EchoPacket::new(&mut icmp_buf)?;
        icmp.set_icmp_type(IcmpType::EchoRequest);
        icmp.set_icmp_code(IcmpCode(0));
        icmp.set_checksum(yarrp_packet::checksum::icmp_ipv4_checksum(icmp.packet()));
        let mut ipv4_buf = [0_u8; TEST_PACKET_LENGTH as usize];
        let mut ipv4 = yarrp_packet::ipv4::Ipv4Packet::new(&mut ipv4_buf)?;
        ipv4.set_version(4);
        ipv4.set_header_length(5);
        ipv4.set_protocol(yarrp_packet::IpProtocol::Icmp);
        ipv4.set_ttl(255);
        ipv4.set_source(src_addr);
        ipv4.set_destination(Ipv4Addr::LOCALHOST);
        ipv4.set_total_length(total_length);
        ipv4.set_payload(icmp.packet());
        let mut probe_socket = SocketImpl::new_send_socket_ipv4()?;
        let remote_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        probe_socket.send_to(ipv4.packet(), remote_addr)?;
        Ok(())
    }

    // Note that no packets are transmitted by this method.
    #[instrument(ret, level = "trace")]
    pub fn discover_local_addr(target_addr: IpAddr, port: u16) -> Result<IpAddr> {
        let mut socket = match target_addr {
            IpAddr::V4(_) => SocketImpl::new_udp_dgram_socket_ipv4(),
            IpAddr::V6(_) => SocketImpl::new_udp_dgram_socket_ipv6(),
        }?;
        socket.connect(SocketAddr::new(target_addr, port))?;
        Ok(socket.local_addr()?.ok_or(Error::MissingAddr)?.ip())
    }
}

mod socket {
    use crate::error::{ErrorKind, IoError, IoOperation, IoResult};
    use crate::net::socket::Socket;
    use itertools::Itertools;
    use nix::{
        sys::select::FdSet,
        sys::time::{TimeVal, TimeValLike},
        Error,
    };
    use socket2::{Domain, Protocol, SockAddr, Type};
    use std::io;
    use std::net::SocketAddr;
    use std::os::fd::AsFd;
    use std::time::Duration;
    use tracing::instrument;

    /// A network socket.
    pub struct SocketImpl {
        inner: socket2::Socket,
    }

    impl SocketImpl {
        fn new(domain: Domain, ty: Type, protocol: Protocol) -> IoResult<Self> {
            Ok(Self {
                inner: socket2::Socket::new(domain, ty, Some(protocol))
                    .map_err(|err| IoError::Other(err, IoOperation::NewSocket))?,
            })
        }

        fn set_nonblocking(&self, nonblocking: bool) -> IoResult<()> {
            self.inner
                .set_nonblocking(nonblocking)
                .map_err(|err| IoError::Other(err, IoOperation::SetNonBlocking))
        }

        fn set_header_included(&self, included: bool) -> IoResult<()> {
            self.inner
                .set_header_included_v4(included)
                .map_err(|err| IoError::Other(err, IoOperation::SetHeaderIncluded))
        }
    }

    impl Socket for SocketImpl {
        #[instrument(level = "trace")]
        fn new_send_socket_ipv4() -> IoResult<Self> {
            let socket = Self::new(
                Domain::IPV4,
                Type::RAW,
                Protocol::from(nix::libc::IPPROTO_RAW),
            )?;
            socket.set_nonblocking(true)?;
            socket.set_header_included(true)?;
            Ok(socket)
        }
        // A raw `IPv6` socket opened with `IPPROTO_RAW` implies the IP header is included.
        #[instrument(level = "trace")]
        fn new_send_socket_ipv6() -> IoResult<Self> {
            let socket = Self::new(
                Domain::IPV6,
                Type::RAW,
                Protocol::from(nix::libc::IPPROTO_RAW),
            )?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_recv_socket_ipv4() -> IoResult<Self> {
            let socket = Self::new(Domain::IPV4, Type::RAW, Protocol::ICMPV4)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_recv_socket_ipv6() -> IoResult<Self> {
            let socket = Self::new(Domain::IPV6, Type::RAW, Protocol::ICMPV6)?;
            socket.set_nonblocking(true)?;
            Ok(socket)
        }
        #[instrument(level = "trace")]
        fn new_udp_dgram_socket_ipv4() -> IoResult<Self> {
            Self::new(Domain::IPV4, Type::DGRAM, Protocol::UDP)
        }
        #[instrument(level = "trace")]
        fn new_udp_dgram_socket_ipv6() -> IoResult<Self> {
            Self::new(Domain::IPV6, Type::DGRAM, Protocol::UDP)
        }
        #[instrument(skip(self), level = "trace")]
        fn bind(&mut self, address: SocketAddr) -> IoResult<()> {
            self.inner
                .bind(&SockAddr::from(address))
                .map_err(|err| IoError::Bind(err, address))
        }
        #[instrument(skip(self), level = "trace")]
        fn connect(&mut self, address: SocketAddr) -> IoResult<()> {
            tracing::trace!(?address);
            self.inner
                .connect(&SockAddr::from(address))
                .map_err(|err| IoError::Connect(err, address))
        }
        #[instrument(skip(self), level = "trace")]
        fn local_addr(&mut self) -> IoResult<Option<SocketAddr>> {
            Ok(self
                .inner
                .local_addr()
                .map_err(|err| IoError::Other(err, IoOperation::LocalAddr))?
                .as_socket())
        }
        #[instrument(skip(self), level = "trace")]
        fn set_recv_buffer_size(&mut self, size: usize) -> IoResult<()> {
            self.inner
                .set_recv_buffer_size(size)
                .map_err(|err| IoError::Other(err, IoOperation::SetRecvBufferSize))
        }
        #[instrument(skip(self, buf), level = "trace")]
        fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> IoResult<()> {
            tracing::trace!(buf = format!("{:02x?}", buf.iter().format(" ")), ?addr);
            self.inner
                .send_to(buf, &SockAddr::from(addr))
                .map_err(|err| IoError::SendTo(err, addr))?;
            Ok(())
        }
        #[instrument(skip(self), level = "trace")]
        fn is_readable(&mut self, timeout: Duration) -> IoResult<bool> {
            let mut read = FdSet::new();
            read.insert(self.inner.as_fd());
            let readable = nix::sys::select::select(
                None,
                Some(&mut read),
                None,
                None,
                Some(&mut TimeVal::milliseconds(timeout.as_millis() as i64)),
            );
            match readable {
                Ok(readable) => Ok(readable == 1),
                Err(Error::EINTR) => Ok(false),
                Err(err) => Err(IoError::Other(io::Error::from(err), IoOperation::Select)),
            }
        }
        #[instrument(skip(self, buf), level = "trace")]
        fn recv_from(&mut self, buf: &mut [u8]) -> IoResult<(usize, Option<SocketAddr>)> {
            let (bytes_read, addr) = self
                .inner
                .recv_from_into_buf(buf)
                .map_err(|err| IoError::Other(err, IoOperation::RecvFrom))?;
            tracing::trace!(
                buf = format!("{:02x?}", buf[..bytes_read].iter().format(" ")),
                bytes_read,
                ?addr
            );
            Ok((bytes_read, addr))
        }
    }

    impl From<&io::Error> for ErrorKind {
        fn from(value: &io::Error) -> Self {
            if value.raw_os_error() == io::Error::from(Error::ENOBUFS).raw_os_error() {
                Self::NoBufferSpace
            } else if value.raw_os_error() == io::Error::from(Error::EHOSTUNREACH).raw_os_error() {
                Self::HostUnreachable
            } else {
                Self::Std(value.kind())
            }
        }
    }

    // only used for unit tests
    impl From<ErrorKind> for io::Error {
        fn from(value: ErrorKind) -> Self {
            match value {
                ErrorKind::NoBufferSpace => Self::from(Error::ENOBUFS),
                ErrorKind::HostUnreachable => Self::from(Error::EHOSTUNREACH),
                ErrorKind::Std(kind) => Self::from(kind),
            }
        }
    }

    /// An extension trait to allow `recv_from` method which writes to a `&mut [u8]`.
    ///
    /// This is required for `socket2::Socket` which [does not currently provide] this method.
    ///
    /// [does not currently provide]: https://github.com/rust-lang/socket2/issues/223
    trait RecvFrom {
        fn recv_from_into_buf(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)>;
    }

    impl RecvFrom for socket2::Socket {
        // Safety: the `recv` implementation promises not to write uninitialised
        // bytes to the `buf`fer, so this casting is safe.
        #![allow(unsafe_code)]
        fn recv_from_into_buf(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
            let buf = unsafe {
                &mut *(std::ptr::from_mut::<[u8]>(buf) as *mut [std::mem::MaybeUninit<u8>])
            };
            self.recv_from(buf)
                .map(|(size, addr)| (size, addr.as_socket()))
        }
    }
}

pub use socket::SocketImpl;
