use kerberos_asn1::HostAddress;
use std::net::{IpAddr, UdpSocket};

pub const ADDRTYPE_INET: i32 = 2;
pub const ADDRTYPE_INET6: i32 = 24;

/// 32 bit bounded addition, used to derive ticket lifetimes without
/// overflowing the protocol's timestamps.
pub fn addint32(x: i32, y: i32) -> i32 {
    if x > 0 && y > i32::max_value() - x {
        return i32::max_value();
    }
    if x < 0 && y < i32::min_value() - x {
        return i32::min_value();
    }
    return x + y;
}

/// Best-effort list of this host's addresses for the request address field.
pub fn local_host_addresses() -> Vec<HostAddress> {
    let mut addresses = Vec::new();
    if let Some(ip) = local_source_ip() {
        addresses.push(host_address_from_ip(ip));
    }
    return addresses;
}

fn host_address_from_ip(ip: IpAddr) -> HostAddress {
    match ip {
        IpAddr::V4(v4) => HostAddress {
            addr_type: ADDRTYPE_INET,
            address: v4.octets().to_vec(),
        },
        IpAddr::V6(v6) => HostAddress {
            addr_type: ADDRTYPE_INET6,
            address: v6.octets().to_vec(),
        },
    }
}

fn local_source_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    // connect() only selects the outgoing interface; no datagram is sent
    socket.connect(("198.51.100.1", 88)).ok()?;
    return Some(socket.local_addr().ok()?.ip());
}
