//! Protocol naming, port mapping, and display colours.
//!
//! The upstream data server labels each hit with a service name derived
//! from the destination port. Everything downstream (histograms, top-K
//! rows, chart colours) keys on that name, so it is normalised exactly
//! once at the ingestion boundary with [`normalize_protocol`].

/// Catch-all protocol for unknown, empty, or numeric-looking names.
pub const OTHER: &str = "OTHER";

/// Known service names and their chart colours.
///
/// Any protocol not listed here is folded into [`OTHER`].
const SERVICE_COLORS: &[(&str, &str)] = &[
    ("CHARGEN", "#4CAF50"),
    ("FTP-DATA", "#F44336"),
    ("FTP", "#FF5722"),
    ("SSH", "#FF9800"),
    ("TELNET", "#FFC107"),
    ("SMTP", "#8BC34A"),
    ("WINS", "#009688"),
    ("DNS", "#00BCD4"),
    ("DHCP", "#03A9F4"),
    ("TFTP", "#2196F3"),
    ("HTTP", "#3F51B5"),
    ("DICOM", "#9C27B0"),
    ("POP3", "#E91E63"),
    ("NTP", "#795548"),
    ("RPC", "#607D8B"),
    ("IMAP", "#9E9E9E"),
    ("SNMP", "#FF6B35"),
    ("LDAP", "#FF8E53"),
    ("HTTPS", "#0080FF"),
    ("SMB", "#BF00FF"),
    ("SMTPS", "#80FF00"),
    ("EMAIL", "#00FF80"),
    ("IPMI", "#00FFFF"),
    ("IPP", "#8000FF"),
    ("IMAPS", "#FF0080"),
    ("POP3S", "#80FF80"),
    ("NFS", "#FF8080"),
    ("SOCKS", "#8080FF"),
    ("SQL", "#00FF00"),
    ("ORACLE", "#FFFF00"),
    ("PPTP", "#FF00FF"),
    ("MQTT", "#00FF40"),
    ("SSDP", "#40FF00"),
    ("IEC104", "#FF4000"),
    ("HL7", "#4000FF"),
    ("MYSQL", "#00FF00"),
    ("RDP", "#FF0060"),
    ("IPSEC", "#60FF00"),
    ("SIP", "#FFCCFF"),
    ("POSTGRESQL", "#00CCFF"),
    ("ADB", "#FFCCCC"),
    ("VNC", "#0000FF"),
    ("REDIS", "#CC00FF"),
    ("IRC", "#FFCC00"),
    ("JETDIRECT", "#8000FF"),
    ("ELASTICSEARCH", "#FF8000"),
    ("INDUSTRIAL", "#80FF40"),
    ("MEMCACHED", "#40FF80"),
    ("MONGODB", "#FF4080"),
    ("SCADA", "#8040FF"),
    (OTHER, "#78909C"),
];

/// Destination port to service name, as assigned by the data server.
const PORT_PROTOCOLS: &[(u16, &str)] = &[
    (19, "CHARGEN"),
    (20, "FTP-DATA"),
    (21, "FTP"),
    (22, "SSH"),
    (2222, "SSH"),
    (23, "TELNET"),
    (2223, "TELNET"),
    (25, "SMTP"),
    (42, "WINS"),
    (53, "DNS"),
    (67, "DHCP"),
    (69, "TFTP"),
    (80, "HTTP"),
    (81, "HTTP"),
    (104, "DICOM"),
    (110, "POP3"),
    (123, "NTP"),
    (135, "RPC"),
    (143, "IMAP"),
    (161, "SNMP"),
    (389, "LDAP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (465, "SMTPS"),
    (587, "EMAIL"),
    (623, "IPMI"),
    (631, "IPP"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1025, "NFS"),
    (1080, "SOCKS"),
    (1433, "SQL"),
    (1521, "ORACLE"),
    (1723, "PPTP"),
    (1883, "MQTT"),
    (1900, "SSDP"),
    (2404, "IEC104"),
    (2575, "HL7"),
    (3306, "MYSQL"),
    (3389, "RDP"),
    (5000, "IPSEC"),
    (5060, "SIP"),
    (5061, "SIP"),
    (5432, "POSTGRESQL"),
    (5555, "ADB"),
    (5900, "VNC"),
    (6379, "REDIS"),
    (6667, "IRC"),
    (8080, "HTTP"),
    (8888, "HTTP"),
    (8443, "HTTPS"),
    (9100, "JETDIRECT"),
    (9200, "ELASTICSEARCH"),
    (10001, "INDUSTRIAL"),
    (11112, "DICOM"),
    (11211, "MEMCACHED"),
    (27017, "MONGODB"),
    (50100, "SCADA"),
];

/// Normalise a raw protocol label into a known service name.
///
/// Trims and uppercases the input. Empty strings, numeric-looking strings
/// (a bare port number such as `"2222"`), and names outside the known
/// service table all become [`OTHER`].
pub fn normalize_protocol(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || looks_numeric(trimmed) {
        return OTHER.to_owned();
    }
    let upper = trimmed.to_ascii_uppercase();
    if SERVICE_COLORS.iter().any(|(name, _)| *name == upper) {
        upper
    } else {
        OTHER.to_owned()
    }
}

/// Map a destination port to its service name, or [`OTHER`].
pub fn port_to_protocol(port: u16) -> &'static str {
    PORT_PROTOCOLS
        .iter()
        .find(|(p, _)| *p == port)
        .map_or(OTHER, |(_, name)| *name)
}

/// Chart colour for a normalised protocol name.
///
/// Unknown names get the [`OTHER`] colour.
pub fn protocol_color(protocol: &str) -> &'static str {
    SERVICE_COLORS
        .iter()
        .find(|(name, _)| *name == protocol)
        .or_else(|| SERVICE_COLORS.iter().find(|(name, _)| *name == OTHER))
        .map_or("#78909C", |(_, color)| *color)
}

/// True for strings made only of digits, signs, dots, and whitespace.
fn looks_numeric(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | ' '))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_are_uppercased() {
        assert_eq!(normalize_protocol("ssh"), "SSH");
        assert_eq!(normalize_protocol("  Http "), "HTTP");
        assert_eq!(normalize_protocol("FTP-DATA"), "FTP-DATA");
    }

    #[test]
    fn unknown_and_numeric_names_become_other() {
        assert_eq!(normalize_protocol(""), OTHER);
        assert_eq!(normalize_protocol("2222"), OTHER);
        assert_eq!(normalize_protocol("8.5"), OTHER);
        assert_eq!(normalize_protocol("gopher"), OTHER);
    }

    #[test]
    fn ports_map_to_services() {
        assert_eq!(port_to_protocol(22), "SSH");
        assert_eq!(port_to_protocol(2222), "SSH");
        assert_eq!(port_to_protocol(8443), "HTTPS");
        assert_eq!(port_to_protocol(4), OTHER);
    }

    #[test]
    fn colors_fall_back_to_other() {
        assert_eq!(protocol_color("SSH"), "#FF9800");
        assert_eq!(protocol_color("NOPE"), "#78909C");
    }
}
