use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::Duration;

use crate::communication::{KrbChannel, TransportProtocol};

const RECV_TIMEOUT_SECONDS: u64 = 5;

/// Send Kerberos messages over UDP
#[derive(Debug)]
pub struct UdpChannel {
    dst_addr: SocketAddr,
}

impl UdpChannel {
    pub fn new(dst_addr: SocketAddr) -> Self {
        return Self { dst_addr };
    }
}

impl KrbChannel for UdpChannel {
    fn send_recv(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
        return send_recv_udp(&self.dst_addr, raw);
    }

    fn protocol(&self) -> TransportProtocol {
        return TransportProtocol::UDP;
    }

    fn ip(&self) -> IpAddr {
        return self.dst_addr.ip();
    }
}

pub fn send_recv_udp(
    dst_addr: &SocketAddr,
    raw_request: &[u8],
) -> io::Result<Vec<u8>> {
    let udp_socket = UdpSocket::bind("0.0.0.0:0")?;
    udp_socket.connect(dst_addr)?;
    udp_socket
        .set_read_timeout(Some(Duration::new(RECV_TIMEOUT_SECONDS, 0)))?;

    udp_socket.send(raw_request)?;

    let data_length = peek_response_size(&udp_socket)?;

    let mut raw_response = vec![0; data_length];
    udp_socket.recv(&mut raw_response)?;

    return Ok(raw_response);
}

/// Grow a peek buffer until the pending datagram fits in it.
fn peek_response_size(udp_socket: &UdpSocket) -> io::Result<usize> {
    let mut buffer = vec![0; 2048];
    let mut data_length = udp_socket.peek(&mut buffer)?;
    while data_length == buffer.len() {
        buffer.resize(buffer.len() * 2, 0);
        data_length = udp_socket.peek(&mut buffer)?;
    }
    return Ok(data_length);
}
