//! Hop addresses and the recipient/relay address space.
//!
//! Every hop inside an envelope is named by a 10-digit zero-padded decimal
//! address. Recipients and relays live in two disjoint contiguous ranges, the
//! relay range strictly above the recipient range, so a relay can tell a final
//! delivery from another forward by looking at the number alone.

use crate::{Result, RoutingError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Width of the address field at the front of every decrypted layer.
pub const ADDRESS_WIDTH: usize = 10;

/// Numeric hop address (a listening port in the HTTP deployment).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub u32);

impl Address {
    /// Fixed-width wire form, e.g. `0000004012`.
    pub fn encode(&self) -> String {
        format!("{:0width$}", self.0, width = ADDRESS_WIDTH)
    }

    /// Parses the fixed-width wire form. Anything other than exactly ten
    /// ASCII digits is malformed.
    pub fn decode(field: &[u8]) -> Result<Self> {
        if field.len() != ADDRESS_WIDTH || !field.iter().all(u8::is_ascii_digit) {
            return Err(RoutingError::MalformedLayer(
                "next hop field is not a 10-digit decimal address".to_string(),
            ));
        }

        let value = field
            .iter()
            .fold(0u64, |acc, digit| acc * 10 + u64::from(digit - b'0'));

        // Well-formed but beyond every range.
        u32::try_from(value)
            .map(Address)
            .map_err(|_| RoutingError::InvalidDestination(value))
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Where a resolved next hop points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopTarget {
    /// Another relay, identified by its node id.
    Relay { node_id: u32, address: Address },
    /// The final recipient, identified by its user id.
    Recipient { user_id: u32, address: Address },
}

impl HopTarget {
    pub fn address(&self) -> Address {
        match self {
            Self::Relay { address, .. } | Self::Recipient { address, .. } => *address,
        }
    }
}

/// The two disjoint address ranges shared by every node of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpace {
    recipients: Range<u32>,
    relays: Range<u32>,
}

impl AddressSpace {
    /// Builds the space from base addresses and range sizes.
    pub fn new(base_user: u32, max_users: u32, base_relay: u32, max_relays: u32) -> Result<Self> {
        let recipients = base_user
            ..base_user.checked_add(max_users).ok_or_else(|| {
                RoutingError::InvalidConfig("recipient range overflows u32".to_string())
            })?;
        let relays = base_relay
            ..base_relay.checked_add(max_relays).ok_or_else(|| {
                RoutingError::InvalidConfig("relay range overflows u32".to_string())
            })?;

        if recipients.is_empty() || relays.is_empty() {
            return Err(RoutingError::InvalidConfig(
                "recipient and relay ranges must be non-empty".to_string(),
            ));
        }
        if relays.start < recipients.end {
            return Err(RoutingError::InvalidConfig(format!(
                "relay range {:?} must lie strictly above recipient range {:?}",
                relays, recipients
            )));
        }

        Ok(Self { recipients, relays })
    }

    pub fn recipient_range(&self) -> Range<u32> {
        self.recipients.clone()
    }

    pub fn relay_range(&self) -> Range<u32> {
        self.relays.clone()
    }

    /// Address a relay with the given node id listens on.
    pub fn relay_address(&self, node_id: u32) -> Result<Address> {
        Self::offset(&self.relays, node_id, "relay")
    }

    /// Address a user with the given id listens on. An id past the end of
    /// the recipient range is an invalid destination.
    pub fn recipient_address(&self, user_id: u32) -> Result<Address> {
        Self::offset(&self.recipients, user_id, "user").map_err(|_| {
            RoutingError::InvalidDestination(u64::from(self.recipients.start) + u64::from(user_id))
        })
    }

    /// Decides whether an address is a relay, a recipient, or neither.
    pub fn classify(&self, address: Address) -> Result<HopTarget> {
        let value = address.value();
        if self.relays.contains(&value) {
            Ok(HopTarget::Relay {
                node_id: value - self.relays.start,
                address,
            })
        } else if self.recipients.contains(&value) {
            Ok(HopTarget::Recipient {
                user_id: value - self.recipients.start,
                address,
            })
        } else {
            Err(RoutingError::InvalidDestination(u64::from(value)))
        }
    }

    fn offset(range: &Range<u32>, id: u32, kind: &str) -> Result<Address> {
        range
            .start
            .checked_add(id)
            .filter(|value| range.contains(value))
            .map(Address)
            .ok_or_else(|| {
                RoutingError::InvalidConfig(format!(
                    "{kind} id {id} does not fit the {kind} range {range:?}"
                ))
            })
    }
}
