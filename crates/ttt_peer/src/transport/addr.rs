//! Local address discovery.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::{debug, instrument};

/// Best guess at this machine's LAN address, falling back to loopback.
///
/// Connecting a UDP socket sends nothing; it only asks the OS which local
/// interface would route to a public address.
#[instrument]
pub fn local_ip() -> IpAddr {
    let discover = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
        Ok(socket.local_addr()?.ip())
    };

    match discover() {
        Ok(ip) if !ip.is_unspecified() && !ip.is_loopback() => ip,
        Ok(ip) => {
            debug!(%ip, "No routable interface, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        Err(e) => {
            debug!(error = %e, "Address discovery failed, using loopback");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
