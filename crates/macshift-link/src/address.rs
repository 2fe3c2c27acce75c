use std::fmt;
use std::str::FromStr;

use macaddr::MacAddr6;
use rand::RngCore;
use thiserror::Error;

const MULTICAST_BIT: u8 = 0x01;
const LOCAL_BIT: u8 = 0x02;

/// An EUI-48 hardware address, rendered as lowercase colon-separated hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddress(MacAddr6);

impl HardwareAddress {
    /// Builds an address from raw octets.
    pub fn new(octets: [u8; 6]) -> Self {
        Self(MacAddr6::from(octets))
    }

    /// Raw octets in transmission order.
    pub fn octets(&self) -> [u8; 6] {
        let mut octets = [0_u8; 6];
        octets.copy_from_slice(self.0.as_bytes());
        octets
    }

    /// True when the group bit of the first octet is set.
    pub fn is_multicast(&self) -> bool {
        self.first_octet() & MULTICAST_BIT != 0
    }

    /// True when the address is not a vendor-assigned (burned-in) one.
    pub fn is_locally_administered(&self) -> bool {
        self.first_octet() & LOCAL_BIT != 0
    }

    fn first_octet(&self) -> u8 {
        self.octets()[0]
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, f] = self.octets();
        write!(
            formatter,
            "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{f:02x}"
        )
    }
}

impl FromStr for HardwareAddress {
    type Err = AddressParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        MacAddr6::from_str(trimmed)
            .map(Self)
            .map_err(|_| AddressParseError {
                value: trimmed.to_owned(),
            })
    }
}

impl From<MacAddr6> for HardwareAddress {
    fn from(value: MacAddr6) -> Self {
        Self(value)
    }
}

/// Raised when text is not a six-octet hardware address.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{value}' is not a hardware address")]
pub struct AddressParseError {
    /// Offending text, trimmed.
    pub value: String,
}

/// Three leading octets shared by every generated address.
///
/// Only unicast, locally administered prefixes are accepted so that a
/// generated address can never collide with a vendor-assigned address or be
/// interpreted as a multicast group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPrefix([u8; 3]);

impl AddressPrefix {
    /// Prefix octets.
    pub const fn octets(&self) -> [u8; 3] {
        self.0
    }

    /// Appends three uniformly random octets to the prefix.
    pub fn generate<R: RngCore + ?Sized>(&self, rng: &mut R) -> HardwareAddress {
        let mut tail = [0_u8; 3];
        rng.fill_bytes(&mut tail);
        let [a, b, c] = self.0;
        let [d, e, f] = tail;
        HardwareAddress::new([a, b, c, d, e, f])
    }
}

/// `02:00:00`, the smallest locally administered unicast prefix.
impl Default for AddressPrefix {
    fn default() -> Self {
        Self([LOCAL_BIT, 0x00, 0x00])
    }
}

impl fmt::Display for AddressPrefix {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(formatter, "{a:02x}:{b:02x}:{c:02x}")
    }
}

impl FromStr for AddressPrefix {
    type Err = PrefixError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = || PrefixError::Malformed {
            value: value.to_owned(),
        };
        let mut octets = [0_u8; 3];
        let mut parts = value.trim().split(':');
        for slot in &mut octets {
            let part = parts.next().ok_or_else(malformed)?;
            if part.is_empty() || part.len() > 2 {
                return Err(malformed());
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| malformed())?;
        }
        if parts.next().is_some() {
            return Err(malformed());
        }
        if octets[0] & MULTICAST_BIT != 0 {
            return Err(PrefixError::Multicast {
                value: value.to_owned(),
            });
        }
        if octets[0] & LOCAL_BIT == 0 {
            return Err(PrefixError::Universal {
                value: value.to_owned(),
            });
        }
        Ok(Self(octets))
    }
}

/// Reasons a configured prefix is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrefixError {
    /// Not exactly three hex octets of one or two digits each.
    #[error("address prefix '{value}' must be three colon-separated hex octets")]
    Malformed {
        /// Prefix as configured.
        value: String,
    },
    /// Generated addresses would be group addresses.
    #[error("address prefix '{value}' has the multicast bit set")]
    Multicast {
        /// Prefix as configured.
        value: String,
    },
    /// Generated addresses could collide with vendor-assigned ones.
    #[error("address prefix '{value}' is not locally administered")]
    Universal {
        /// Prefix as configured.
        value: String,
    },
}
