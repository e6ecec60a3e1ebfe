//! pusd - Onboard PUS Service Framework
//!
//! pusd runs PUS services on the spacecraft: it queues the telecommands
//! addressed to each service, executes them through the registered
//! subservice handlers and reports their verification status. The event
//! reporting service (service 5) is built on top of this framework.

pub mod config;
pub mod event_reporting;
pub mod host;
pub mod output;
pub mod parameter;
pub mod report;
pub mod service;
pub mod verification;

pub use config::*;
pub use event_reporting::*;
pub use host::*;
pub use output::*;
pub use parameter::*;
pub use report::*;
pub use service::*;
pub use verification::*;
