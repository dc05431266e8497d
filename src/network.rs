use crate::error::GvcpError;
use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::IpNetwork;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;
use tracing::{debug, warn};

const RECV_BUFFER_LEN: usize = 2048;

/// Datagram plumbing used by a session. Implemented over real UDP sockets by
/// [`UdpTransport`] and by an in-memory double in tests.
pub trait Transport {
    /// Sends `data` to the limited broadcast address on every local interface.
    fn send_broadcast(&mut self, data: &[u8]) -> Result<usize, GvcpError>;

    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<usize, GvcpError>;

    /// Blocks until one datagram arrives. Fails with `GvcpError::Timeout`
    /// once `timeout` elapses.
    fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, GvcpError>;
}

pub struct UdpTransport {
    port: u16,
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    pub fn new(port: u16) -> Self {
        UdpTransport { port, socket: None }
    }

    /// Returns the shared `0.0.0.0:<port>` socket, binding it on first use.
    pub fn socket(&mut self) -> Result<&UdpSocket, GvcpError> {
        match self.socket {
            Some(ref socket) => Ok(socket),
            None => {
                let socket = bind_broadcast_socket(Ipv4Addr::UNSPECIFIED, self.port)?;
                debug!("Bound shared socket on 0.0.0.0:{}", self.port);
                Ok(self.socket.insert(socket))
            }
        }
    }

    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("Closed shared socket");
        }
    }

    fn broadcast_target(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::BROADCAST, self.port))
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl Transport for UdpTransport {
    /// One short-lived socket per interface address, each dropped right after
    /// its send so the replies land on the shared socket.
    fn send_broadcast(&mut self, data: &[u8]) -> Result<usize, GvcpError> {
        let target = self.broadcast_target();
        self.socket()?;

        let addresses = local_ipv4_addresses();
        if addresses.is_empty() {
            let err = GvcpError::Configuration(
                "no interface addresses found, don't know where to send packets".into(),
            );
            warn!("{}", err);
            warn!("Using only default interface");
            let sent = self.socket()?.send_to(data, target)?;
            return Ok(sent);
        }

        let mut last = 0;
        for address in addresses {
            let socket = bind_broadcast_socket(address, self.port)?;
            debug!("Broadcasting {} bytes from {}", data.len(), address);
            last = socket.send_to(data, target)?;
        }

        Ok(last)
    }

    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<usize, GvcpError> {
        debug!("Sending {} bytes to {}", data.len(), target);
        Ok(self.socket()?.send_to(data, target)?)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, GvcpError> {
        if timeout.is_zero() {
            return Err(GvcpError::Timeout("receive deadline already passed".into()));
        }

        let socket = self.socket()?;
        socket.set_read_timeout(Some(timeout))?;

        let mut buf = [0u8; RECV_BUFFER_LEN];
        match socket.recv_from(&mut buf) {
            Ok((len, src)) => {
                debug!("Received {} bytes from {}", len, src);
                Ok(buf[..len].to_vec())
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(GvcpError::Timeout(format!("no datagram within {:?}", timeout)))
            }
            Err(e) => Err(GvcpError::IoError(e)),
        }
    }
}

fn bind_broadcast_socket(address: Ipv4Addr, port: u16) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_broadcast(true)?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddrV4::new(address, port).into())?;
    Ok(socket.into())
}

/// First IPv4 address of every active, non-loopback interface.
pub fn local_ipv4_addresses() -> Vec<Ipv4Addr> {
    datalink::interfaces()
        .iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .filter_map(interface_ipv4)
        .collect()
}

fn interface_ipv4(interface: &NetworkInterface) -> Option<Ipv4Addr> {
    interface.ips.iter().find_map(|network| match network {
        IpNetwork::V4(v4) if !v4.ip().is_loopback() => Some(v4.ip()),
        _ => None,
    })
}

#[cfg(test)]
pub mod mock {
    use super::Transport;
    use crate::error::GvcpError;
    use std::collections::VecDeque;
    use std::net::SocketAddr;
    use std::time::Duration;

    type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>>>;

    /// Records every datagram sent and answers with whatever the responder
    /// returns for it.
    pub struct MockTransport {
        pub broadcasts: Vec<Vec<u8>>,
        pub unicasts: Vec<(Vec<u8>, SocketAddr)>,
        pub inbound: VecDeque<Vec<u8>>,
        pub receive_calls: usize,
        responder: Responder,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::with_responder(|_| Vec::new())
        }

        pub fn with_responder(responder: impl FnMut(&[u8]) -> Vec<Vec<u8>> + 'static) -> Self {
            MockTransport {
                broadcasts: Vec::new(),
                unicasts: Vec::new(),
                inbound: VecDeque::new(),
                receive_calls: 0,
                responder: Box::new(responder),
            }
        }

        fn respond(&mut self, data: &[u8]) {
            let replies = (self.responder)(data);
            self.inbound.extend(replies);
        }
    }

    impl Transport for MockTransport {
        fn send_broadcast(&mut self, data: &[u8]) -> Result<usize, GvcpError> {
            self.broadcasts.push(data.to_vec());
            self.respond(data);
            Ok(data.len())
        }

        fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<usize, GvcpError> {
            self.unicasts.push((data.to_vec(), target));
            self.respond(data);
            Ok(data.len())
        }

        fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, GvcpError> {
            self.receive_calls += 1;
            match self.inbound.pop_front() {
                Some(datagram) => Ok(datagram),
                None => {
                    // Behave like a socket that waited out its timeout.
                    std::thread::sleep(timeout.min(Duration::from_millis(5)));
                    Err(GvcpError::Timeout("mock inbound queue empty".into()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnet::util::MacAddr;
    use std::net::IpAddr;
    use std::sync::atomic::{AtomicU16, Ordering};

    static PORT_COUNTER: AtomicU16 = AtomicU16::new(50000);

    fn get_unique_port() -> u16 {
        PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
    }

    fn create_mock_interface(ips: Vec<IpNetwork>) -> NetworkInterface {
        NetworkInterface {
            name: String::from("mock0"),
            description: String::from("Mock interface for testing"),
            index: 1,
            mac: Some(MacAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55)),
            ips,
            flags: 0,
        }
    }

    #[test]
    fn test_interface_ipv4_picks_first_v4() {
        let interface = create_mock_interface(vec![
            IpNetwork::new("fe80::1".parse::<IpAddr>().unwrap(), 64).unwrap(),
            IpNetwork::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)), 24).unwrap(),
            IpNetwork::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 10)), 8).unwrap(),
        ]);
        assert_eq!(
            interface_ipv4(&interface),
            Some(Ipv4Addr::new(192, 168, 1, 10))
        );
    }

    #[test]
    fn test_interface_ipv4_skips_loopback() {
        let interface = create_mock_interface(vec![IpNetwork::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            8,
        )
        .unwrap()]);
        assert_eq!(interface_ipv4(&interface), None);
    }

    #[test]
    fn test_local_addresses_exclude_loopback() {
        for address in local_ipv4_addresses() {
            assert!(!address.is_loopback());
        }
    }

    #[test]
    fn test_shared_socket_options() -> Result<(), GvcpError> {
        let port = get_unique_port();
        let mut transport = UdpTransport::new(port);

        let socket = transport.socket()?;
        assert_eq!(socket.local_addr()?.port(), port);
        assert!(socket.broadcast()?, "Broadcast should be enabled");

        transport.close();
        assert!(transport.socket.is_none());
        Ok(())
    }

    #[test]
    fn test_reuse_address_allows_second_bind() -> io::Result<()> {
        let port = get_unique_port();
        let _first = bind_broadcast_socket(Ipv4Addr::UNSPECIFIED, port)?;
        let _second = bind_broadcast_socket(Ipv4Addr::LOCALHOST, port)?;
        Ok(())
    }

    #[test]
    fn test_receive_timeout() {
        let mut transport = UdpTransport::new(get_unique_port());
        let result = transport.receive(Duration::from_millis(20));
        assert!(matches!(result, Err(GvcpError::Timeout(_))));
    }

    #[test]
    fn test_receive_zero_timeout() {
        let mut transport = UdpTransport::new(get_unique_port());
        let result = transport.receive(Duration::ZERO);
        assert!(matches!(result, Err(GvcpError::Timeout(_))));
    }

    #[test]
    fn test_unicast_send_receive() -> Result<(), GvcpError> {
        let port = get_unique_port();
        let mut transport = UdpTransport::new(port);
        transport.socket()?;

        let sender = UdpSocket::bind("127.0.0.1:0")?;
        sender.send_to(b"hello", ("127.0.0.1", port))?;

        let datagram = transport.receive(Duration::from_secs(1))?;
        assert_eq!(datagram, b"hello");
        Ok(())
    }
}
