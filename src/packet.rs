use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const SYNC_STREAM: [u8; 6] = [ 0xff, 0xff, 0xff, 0xff, 0xff, 0xff ];

/// Length of a magic packet without a SecureOn suffix.
pub const MAGIC_LEN: usize = 102;

const ADDR_REPEATS: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("expected 6 groups separated by ':' or '-', got {0}")]
    GroupCount(usize),
    #[error("'{0}' is not a two-digit hex group")]
    BadGroup(String),
    #[error("address mixes ':' and '-' separators")]
    MixedSeparators,
    #[error("SecureOn password must be 4 or 6 bytes, got {0}")]
    PasswordLength(usize),
}

/// Six-byte link-layer address, immutable once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddr([u8; 6]);

impl HardwareAddr {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for HardwareAddr {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let sep = match (s.contains(':'), s.contains('-')) {
            (true, true) => return Err(FormatError::MixedSeparators),
            (true, false) => ':',
            (false, true) => '-',
            /* no separator at all, e.g. "AABBCCDDEEFF" */
            (false, false) => return Err(FormatError::GroupCount(1)),
        };

        let groups: Vec<&str> = s.split(sep).collect();
        if groups.len() != 6 {
            return Err(FormatError::GroupCount(groups.len()));
        }

        let mut octets = [0u8; 6];
        for (octet, group) in octets.iter_mut().zip(&groups) {
            /* from_str_radix alone would admit a leading '+' */
            if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(FormatError::BadGroup((*group).to_string()));
            }
            *octet = u8::from_str_radix(group, 16)
                .map_err(|_| FormatError::BadGroup((*group).to_string()))?;
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for HardwareAddr {
    /// Colon-separated lowercase hex; `{:-}` is not a thing, so the
    /// alternate flag `{:#}` selects dash separators instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if f.alternate() { '-' } else { ':' };
        let o = &self.0;
        write!(f, "{:02x}{sep}{:02x}{sep}{:02x}{sep}{:02x}{sep}{:02x}{sep}{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5])
    }
}

impl From<pnet::util::MacAddr> for HardwareAddr {
    fn from(mac: pnet::util::MacAddr) -> Self {
        Self([ mac.0, mac.1, mac.2, mac.3, mac.4, mac.5 ])
    }
}

/// Optional magic packet suffix. Some adapters ("SecureOn") require it;
/// either 4 bytes in IPv4 style or a full 6-byte hardware address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureOnPassword(Vec<u8>);

impl SecureOnPassword {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        match bytes.len() {
            4 | 6 => Ok(Self(bytes.to_vec())),
            n => Err(FormatError::PasswordLength(n)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for SecureOnPassword {
    type Err = FormatError;

    /// Accepts either dotted IPv4 ("10.0.0.1") or hardware address syntax.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(ip) = s.trim().parse::<std::net::Ipv4Addr>() {
            return Self::from_bytes(&ip.octets());
        }
        let addr = HardwareAddr::from_str(s)?;
        Self::from_bytes(&addr.octets())
    }
}

/// The classic wake frame: 6x 0xff sync stream followed by the target
/// address repeated 16 times, plus an optional SecureOn suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicPacket {
    addr: HardwareAddr,
    password: Option<SecureOnPassword>,
}

impl MagicPacket {
    pub fn new(addr: HardwareAddr, password: Option<SecureOnPassword>) -> Self {
        Self { addr, password }
    }

    pub fn hardware_addr(&self) -> HardwareAddr {
        self.addr
    }

    pub fn password(&self) -> Option<&SecureOnPassword> {
        self.password.as_ref()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let suffix = self.password.as_ref().map_or(0, |p| p.as_bytes().len());
        let mut buf = Vec::with_capacity(MAGIC_LEN + suffix);

        buf.extend_from_slice(&SYNC_STREAM);
        for _ in 0..ADDR_REPEATS {
            buf.extend_from_slice(&self.addr.octets());
        }
        if let Some(pw) = &self.password {
            buf.extend_from_slice(pw.as_bytes());
        }

        buf
    }

    /// Classifies a received datagram. `None` means "not a magic packet",
    /// which is the normal outcome for nearly everything a listener sees;
    /// it is deliberately not an error.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < MAGIC_LEN {
            return None;
        }
        if buf[..6] != SYNC_STREAM {
            return None;
        }

        let mut blocks = buf[6..MAGIC_LEN].chunks(6);
        let first = blocks.next()?;
        if blocks.any(|b| b != first) {
            return None;
        }

        let mut octets = [0u8; 6];
        octets.copy_from_slice(first);

        /* trailing bytes are only meaningful at SecureOn lengths; anything
         * else is padding some senders append and carries no information */
        let password = SecureOnPassword::from_bytes(&buf[MAGIC_LEN..]).ok();

        Some(Self { addr: HardwareAddr(octets), password })
    }
}
