pub mod command;
pub mod connectivity;
pub mod context;
pub mod event;

pub use command::Command;
pub use connectivity::{ConnectivityMachine, ConnectivitySnapshot, ConnectivityState};
pub use context::{BackoffPolicy, ConnectivityContext, PolicyError};
pub use event::{Event, EventParseError};
