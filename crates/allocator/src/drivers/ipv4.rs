use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use rand::{Rng, RngCore};

use crate::driver::PoolDriver;
use crate::error::{AllocatorError, Result};

/// Host addresses of an IPv4 CIDR block.
///
/// The network and broadcast addresses are excluded, except for /31 and /32
/// blocks where every address is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Driver {
    network: Ipv4Addr,
    prefix_len: u8,
    first: u32,
    last: u32,
}

impl Ipv4Driver {
    /// Build a driver over `network/prefix_len`; host bits of `network` are
    /// ignored.
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(AllocatorError::configuration(format!(
                "invalid prefix length /{prefix_len}"
            )));
        }

        let mask = u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0);
        let base = u32::from(network) & mask;
        let broadcast = base | !mask;
        let (first, last) = if prefix_len >= 31 {
            (base, broadcast)
        } else {
            (base + 1, broadcast - 1)
        };

        Ok(Self {
            network: Ipv4Addr::from(base),
            prefix_len,
            first,
            last,
        })
    }

    /// Network address of the block
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Prefix length of the block
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Number of allocatable host addresses
    pub fn len(&self) -> u64 {
        u64::from(self.last - self.first) + 1
    }

    /// Always false; every block has at least one host address
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `addr` is an allocatable host address of this block
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        (self.first..=self.last).contains(&u32::from(addr))
    }
}

impl FromStr for Ipv4Driver {
    type Err = AllocatorError;

    fn from_str(cidr: &str) -> Result<Self> {
        let invalid = || AllocatorError::configuration(format!("invalid CIDR '{cidr}'"));
        let (addr, len) = cidr.split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.trim().parse().map_err(|_| invalid())?;
        let len: u8 = len.trim().parse().map_err(|_| invalid())?;
        Self::new(addr, len)
    }
}

impl fmt::Display for Ipv4Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl PoolDriver for Ipv4Driver {
    fn pick_random(&self, rng: &mut dyn RngCore) -> String {
        Ipv4Addr::from(rng.random_range(self.first..=self.last)).to_string()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = String> + '_> {
        Box::new((self.first..=self.last).map(|n| Ipv4Addr::from(n).to_string()))
    }
}
