use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Miner actor id-address.
///
/// Only the id-address form (`f0<id>`) is supported; the engine always talks
/// about a registered miner actor, which is resolvable to its id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(u64);

impl Address {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f0{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressParseError {
    #[error("address is missing the `f0` id prefix")]
    MissingPrefix,

    #[error("invalid actor id: {0}")]
    InvalidId(#[from] std::num::ParseIntError),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .strip_prefix("f0")
            .ok_or(AddressParseError::MissingPrefix)?;
        Ok(Self(id.parse()?))
    }
}
