//! Stock [`PoolDriver`](crate::PoolDriver) implementations
//!
//! - [`ListDriver`]: an explicit, ordered set of keys
//! - [`RangeDriver`]: an inclusive numeric range, e.g. a node-port range
//! - [`Ipv4Driver`]: the host addresses of an IPv4 CIDR block
//!
//! Every constructor rejects an empty key space.

mod ipv4;
mod list;
mod range;

pub use ipv4::Ipv4Driver;
pub use list::ListDriver;
pub use range::RangeDriver;
