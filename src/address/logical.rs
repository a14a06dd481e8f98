use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::AddressParseError;

/// Lowest port number treated as per-connection rather than a service port.
pub const EPHEMERAL_PORT_FLOOR: u16 = 1024;

/// Port namespace of a port-qualified address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    pub fn protocol_number(self) -> u8 {
        match self {
            Transport::Tcp => 6,
            Transport::Udp => 17,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Udp => "udp",
        }
    }
}

/// A protocol-level address.
///
/// Port-qualified variants keep TCP and UDP in separate namespaces, so
/// `10.0.0.1:53/tcp` and `10.0.0.1:53/udp` never compare equal. The
/// `ephemeral` tag is part of the value: the decoder sets it for ports at or
/// above [`EPHEMERAL_PORT_FLOOR`] unless ephemeral enumeration is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalAddress {
    Ipv4(Ipv4Addr),
    Ipv4WithPort {
        address: Ipv4Addr,
        transport: Transport,
        port: u16,
        ephemeral: bool,
    },
}

impl LogicalAddress {
    pub fn with_port(address: Ipv4Addr, transport: Transport, port: u16) -> Self {
        LogicalAddress::Ipv4WithPort {
            address,
            transport,
            port,
            ephemeral: false,
        }
    }

    /// Tags the port as ephemeral when it sits at or above the threshold.
    /// Addresses without a port are returned unchanged.
    pub fn tag_ephemeral(self) -> Self {
        match self {
            LogicalAddress::Ipv4WithPort {
                address,
                transport,
                port,
                ..
            } if port >= EPHEMERAL_PORT_FLOOR => LogicalAddress::Ipv4WithPort {
                address,
                transport,
                port,
                ephemeral: true,
            },
            other => other,
        }
    }

    pub fn ipv4(&self) -> Ipv4Addr {
        match self {
            LogicalAddress::Ipv4(address) => *address,
            LogicalAddress::Ipv4WithPort { address, .. } => *address,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            LogicalAddress::Ipv4(_) => None,
            LogicalAddress::Ipv4WithPort { port, .. } => Some(*port),
        }
    }

    pub fn transport(&self) -> Option<Transport> {
        match self {
            LogicalAddress::Ipv4(_) => None,
            LogicalAddress::Ipv4WithPort { transport, .. } => Some(*transport),
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(
            self,
            LogicalAddress::Ipv4WithPort {
                ephemeral: true,
                ..
            }
        )
    }

    /// The address with any port qualification stripped.
    pub fn host(&self) -> LogicalAddress {
        LogicalAddress::Ipv4(self.ipv4())
    }
}

impl From<Ipv4Addr> for LogicalAddress {
    fn from(address: Ipv4Addr) -> Self {
        LogicalAddress::Ipv4(address)
    }
}

impl fmt::Display for LogicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalAddress::Ipv4(address) => write!(f, "{address}"),
            LogicalAddress::Ipv4WithPort {
                address,
                transport,
                port,
                ephemeral,
            } => {
                write!(f, "{address}:{port}/{}", transport.name())?;
                if *ephemeral {
                    write!(f, "~")?;
                }
                Ok(())
            }
        }
    }
}

/// Parses the [`Display`](fmt::Display) form: `a.b.c.d`, `a.b.c.d:port/tcp`,
/// `a.b.c.d:port/udp`, with a trailing `~` for ephemeral ports.
impl FromStr for LogicalAddress {
    type Err = AddressParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressParseError::Logical(text.to_string());

        let Some((host, qualifier)) = text.split_once(':') else {
            let address = Ipv4Addr::from_str(text).map_err(|_| invalid())?;
            return Ok(LogicalAddress::Ipv4(address));
        };

        let address = Ipv4Addr::from_str(host).map_err(|_| invalid())?;
        let (qualifier, ephemeral) = match qualifier.strip_suffix('~') {
            Some(rest) => (rest, true),
            None => (qualifier, false),
        };
        let (port, transport) = qualifier.split_once('/').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        let transport = match transport {
            "tcp" => Transport::Tcp,
            "udp" => Transport::Udp,
            _ => return Err(invalid()),
        };

        Ok(LogicalAddress::Ipv4WithPort {
            address,
            transport,
            port,
            ephemeral,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::{LogicalAddress, Transport};

    #[test]
    fn transport_namespaces_do_not_collide() {
        let ip = Ipv4Addr::new(10, 0, 0, 2);
        let tcp = LogicalAddress::with_port(ip, Transport::Tcp, 53);
        let udp = LogicalAddress::with_port(ip, Transport::Udp, 53);
        assert_ne!(tcp, udp);
        assert_eq!(tcp.host(), udp.host());
    }

    #[test]
    fn ephemeral_tag_only_applies_above_floor() {
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        assert!(
            LogicalAddress::with_port(ip, Transport::Udp, 53000)
                .tag_ephemeral()
                .is_ephemeral()
        );
        assert!(
            !LogicalAddress::with_port(ip, Transport::Udp, 1023)
                .tag_ephemeral()
                .is_ephemeral()
        );
        assert!(!LogicalAddress::Ipv4(ip).tag_ephemeral().is_ephemeral());
    }

    #[test]
    fn parses_display_forms() {
        for text in ["10.0.0.1", "10.0.0.1:53/udp", "10.0.0.1:53000/tcp~"] {
            let parsed: LogicalAddress = text.parse().expect("address should parse");
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn non_numeric_octet_is_an_error() {
        assert!("10.0.x.1".parse::<LogicalAddress>().is_err());
        assert!("10.0.0.1:http/tcp".parse::<LogicalAddress>().is_err());
        assert!("10.0.0.1:80/sctp".parse::<LogicalAddress>().is_err());
    }
}
