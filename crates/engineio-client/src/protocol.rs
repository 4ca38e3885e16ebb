use std::str::FromStr;

/// Error returned when parsing an unsupported engine.io protocol version
#[derive(Debug)]
pub struct UnknownProtocolVersionError;
impl std::fmt::Display for UnknownProtocolVersionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown protocol version")
    }
}
impl std::error::Error for UnknownProtocolVersionError {}

/// The engine.io protocol version, sent as the `EIO` query parameter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// The protocol version 3. The client sends the pings.
    V3 = 3,
    /// The protocol version 4. The server sends the pings.
    V4 = 4,
}

impl ProtocolVersion {
    /// The value of the `EIO` query parameter
    pub fn as_str(self) -> &'static str {
        match self {
            ProtocolVersion::V3 => "3",
            ProtocolVersion::V4 => "4",
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = UnknownProtocolVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "3" => Ok(ProtocolVersion::V3),
            "4" => Ok(ProtocolVersion::V4),
            _ => Err(UnknownProtocolVersionError),
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_version_from_str() {
        assert_eq!("3".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V3);
        assert_eq!("4".parse::<ProtocolVersion>().unwrap(), ProtocolVersion::V4);
        assert!("5".parse::<ProtocolVersion>().is_err());
        assert_eq!(ProtocolVersion::V4.to_string(), "4");
    }
}
