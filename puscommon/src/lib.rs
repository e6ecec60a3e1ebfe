//! PUS Common Library (puscommon)
//!
//! This library contains definitions shared between the onboard services
//! (pusd) and the software talking to them: service and error code numbers,
//! binary field formats, packets and the format policy.

pub mod types;
pub mod field;
pub mod time;
pub mod packet;
pub mod policy;
pub mod config;
pub mod error;

pub use types::*;
pub use field::*;
pub use time::*;
pub use packet::*;
pub use policy::*;
pub use config::*;
pub use error::*;
