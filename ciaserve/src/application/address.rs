use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::Path;

use ciaserve_core::error::{Result, ShareError};

/// Manual override file, looked up in the shared directory.
pub const OVERRIDE_FILE: &str = "ip override.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostSource {
    Flag,
    OverrideFile,
    Detected,
    Loopback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedHost {
    pub bind: IpAddr,
    pub advertise: IpAddr,
    pub source: HostSource,
}

/// Flag, then override file, then auto-detection. An explicit address is
/// both bound and advertised; otherwise all interfaces are bound.
pub fn resolve(flag: Option<IpAddr>, dir: &Path) -> Result<ResolvedHost> {
    if let Some(ip) = flag {
        return Ok(ResolvedHost {
            bind: ip,
            advertise: ip,
            source: HostSource::Flag,
        });
    }
    if let Some(ip) = read_override(&dir.join(OVERRIDE_FILE))? {
        return Ok(ResolvedHost {
            bind: ip,
            advertise: ip,
            source: HostSource::OverrideFile,
        });
    }
    let any = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    Ok(match detect_local_ip() {
        Some(ip) => ResolvedHost {
            bind: any,
            advertise: ip,
            source: HostSource::Detected,
        },
        None => ResolvedHost {
            bind: any,
            advertise: IpAddr::V4(Ipv4Addr::LOCALHOST),
            source: HostSource::Loopback,
        },
    })
}

/// First non-empty line of the override file, if the file exists.
pub fn read_override(path: &Path) -> Result<Option<IpAddr>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let Some(line) = text.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Ok(None);
    };
    line.parse::<IpAddr>().map(Some).map_err(|e| {
        ShareError::Config(format!(
            "{}: invalid address {line:?}: {e}",
            path.display()
        ))
    })
}

/// Address of the interface that routes off-host. Connecting a UDP socket
/// only selects a route; nothing is sent.
pub fn detect_local_ip() -> Option<IpAddr> {
    let sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    sock.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    let ip = sock.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
