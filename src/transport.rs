use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use tracing::warn;

/// Best-effort datagram sender for mirroring messages to a remote viewer.
///
/// The socket never blocks, and send failures are logged and dropped: a
/// missing peer must not stall the tick loop.
#[derive(Debug)]
pub struct DatagramMirror {
    socket: UdpSocket,
    address: SocketAddr,
    sent: u64,
    dropped: u64,
}

impl DatagramMirror {
    pub fn connect(address: SocketAddr) -> io::Result<Self> {
        let unspecified = if address.is_ipv4() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        };
        let socket = UdpSocket::bind(SocketAddr::new(unspecified, 0))?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            address,
            sent: 0,
            dropped: 0,
        })
    }

    pub fn send(&mut self, payload: &str) {
        match self.socket.send_to(payload.as_bytes(), self.address) {
            Ok(_) => self.sent += 1,
            Err(e) => {
                self.dropped += 1;
                warn!("Failed to mirror {} bytes to {}: {}", payload.len(), self.address, e);
            }
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_mirror_delivers_to_local_peer() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let mut mirror = DatagramMirror::connect(peer.local_addr().unwrap()).unwrap();
        mirror.send("{\"SystemTime\":{}}");

        let mut buf = [0u8; 64];
        let (len, _) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"{\"SystemTime\":{}}");
        assert_eq!(mirror.sent(), 1);
    }

    #[test]
    fn test_oversized_send_is_swallowed() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut mirror = DatagramMirror::connect(peer.local_addr().unwrap()).unwrap();

        // larger than any UDP datagram can carry
        let payload = "x".repeat(70_000);
        mirror.send(&payload);

        assert_eq!(mirror.sent(), 0);
        assert_eq!(mirror.dropped(), 1);
    }
}
