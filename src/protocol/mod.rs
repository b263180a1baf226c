//! Master/slave coordination protocol.
//!
//! One board at a time is bus master. It commands the X-Y and Z stage boards
//! to absolute positions, polls them until they report in position, and
//! passes mastership on with a handover frame when its work is done.

pub mod frame;
mod master;
mod role;
mod slave;

pub use frame::{Command, Header, Status};
pub use master::BusMaster;
pub use role::CoordinationFlags;
pub use slave::{NoAxis, PositionTarget, SlaveEndpoint, Target};
