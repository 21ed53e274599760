//! Means to move Kerberos messages between this client and a KDC.

use std::io;
use std::net::{IpAddr, SocketAddr};

mod tcp_channel;
pub use tcp_channel::TcpChannel;

mod udp_channel;
pub use udp_channel::UdpChannel;

/// Transport protocols available to send Kerberos messages.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum TransportProtocol {
    TCP,
    UDP,
}

/// One-shot request/response channel to a KDC.
pub trait KrbChannel {
    fn send_recv(&self, raw: &[u8]) -> io::Result<Vec<u8>>;
    fn protocol(&self) -> TransportProtocol;
    fn ip(&self) -> IpAddr;
}

/// Generates a channel for the given address and transport protocol.
pub fn new_krb_channel(
    dst_address: SocketAddr,
    transport_protocol: TransportProtocol,
) -> Box<dyn KrbChannel> {
    match transport_protocol {
        TransportProtocol::TCP => {
            return Box::new(TcpChannel::new(dst_address));
        }
        TransportProtocol::UDP => {
            return Box::new(UdpChannel::new(dst_address));
        }
    }
}

/// Realm-addressed transport used by the convenience driver. `tcp_only`
/// must be honored once the KDC has answered KRB_ERR_RESPONSE_TOO_BIG.
pub trait KdcTransport {
    fn send_to_kdc(
        &self,
        raw: &[u8],
        realm: &str,
        tcp_only: bool,
    ) -> io::Result<Vec<u8>>;
}

/// Sends every request to one fixed KDC address: UDP first, TCP when
/// forced.
pub struct AddressTransport {
    kdc_address: SocketAddr,
}

impl AddressTransport {
    pub fn new(kdc_address: SocketAddr) -> Self {
        return Self { kdc_address };
    }
}

impl KdcTransport for AddressTransport {
    fn send_to_kdc(
        &self,
        raw: &[u8],
        _realm: &str,
        tcp_only: bool,
    ) -> io::Result<Vec<u8>> {
        let protocol = if tcp_only {
            TransportProtocol::TCP
        } else {
            TransportProtocol::UDP
        };
        return new_krb_channel(self.kdc_address, protocol).send_recv(raw);
    }
}
