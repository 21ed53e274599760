use std::io;
use std::io::{Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::time::Duration;

use crate::communication::{KrbChannel, TransportProtocol};

const CONNECT_TIMEOUT_SECONDS: u64 = 5;

/// Reply length limit; a longer length prefix means a corrupt stream.
const MAX_REPLY_LEN: u32 = 8 * 1024 * 1024;

/// Send Kerberos messages over TCP
#[derive(Debug)]
pub struct TcpChannel {
    dst_addr: SocketAddr,
}

impl TcpChannel {
    pub fn new(dst_addr: SocketAddr) -> Self {
        return Self { dst_addr };
    }
}

impl KrbChannel for TcpChannel {
    fn send_recv(&self, raw: &[u8]) -> io::Result<Vec<u8>> {
        return send_recv_tcp(&self.dst_addr, raw);
    }

    fn protocol(&self) -> TransportProtocol {
        return TransportProtocol::TCP;
    }

    fn ip(&self) -> IpAddr {
        return self.dst_addr.ip();
    }
}

pub fn send_recv_tcp(
    dst_addr: &SocketAddr,
    raw: &[u8],
) -> io::Result<Vec<u8>> {
    let mut tcp_stream = TcpStream::connect_timeout(
        dst_addr,
        Duration::new(CONNECT_TIMEOUT_SECONDS, 0),
    )?;

    // Kerberos TCP messages travel behind a 4-byte length prefix
    let mut sized_request =
        Vec::with_capacity(raw.len() + std::mem::size_of::<u32>());
    sized_request.extend_from_slice(&(raw.len() as u32).to_be_bytes());
    sized_request.extend_from_slice(raw);
    tcp_stream.write_all(&sized_request)?;

    let mut len_bytes = [0u8; 4];
    tcp_stream.read_exact(&mut len_bytes)?;
    let data_length = u32::from_be_bytes(len_bytes);
    if data_length > MAX_REPLY_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Reply of {} bytes announced by KDC", data_length),
        ));
    }

    let mut raw_response = vec![0; data_length as usize];
    tcp_stream.read_exact(&mut raw_response)?;

    return Ok(raw_response);
}
