pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const VLAN_8021Q: u16 = 0x8100;
    pub const IPV6: u16 = 0x86DD;
    pub const QINQ_8021AD: u16 = 0x88A8;
}

pub mod ip_proto {
    pub const ICMP: u8 = 1;
    pub const IGMP: u8 = 2;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

pub mod icmp_type {
    pub const ECHO_REPLY: u8 = 0;
    pub const DESTINATION_UNREACHABLE: u8 = 3;
    pub const REDIRECT: u8 = 5;
    pub const ECHO_REQUEST: u8 = 8;
    pub const ROUTER_ADVERTISEMENT: u8 = 9;
}

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const IPV4_MIN_HEADER_LEN: usize = 20;

pub fn ethertype_name(value: u16) -> &'static str {
    match value {
        ethertype::IPV4 => "ipv4",
        ethertype::ARP => "arp",
        ethertype::VLAN_8021Q => "vlan",
        ethertype::IPV6 => "ipv6",
        ethertype::QINQ_8021AD => "qinq",
        _ => "unknown",
    }
}

pub fn ip_protocol_name(value: u8) -> &'static str {
    match value {
        ip_proto::ICMP => "icmp",
        ip_proto::IGMP => "igmp",
        ip_proto::TCP => "tcp",
        ip_proto::UDP => "udp",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::{ethertype, ethertype_name, ip_proto, ip_protocol_name};

    #[test]
    fn ethertype_names_cover_known_values() {
        assert_eq!(ethertype_name(ethertype::IPV4), "ipv4");
        assert_eq!(ethertype_name(ethertype::VLAN_8021Q), "vlan");
        assert_eq!(ethertype_name(0x1234), "unknown");
    }

    #[test]
    fn ip_protocol_names_cover_known_values() {
        assert_eq!(ip_protocol_name(ip_proto::TCP), "tcp");
        assert_eq!(ip_protocol_name(ip_proto::ICMP), "icmp");
        assert_eq!(ip_protocol_name(250), "unknown");
    }
}
