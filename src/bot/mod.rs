//! Bot core: command routing, replies and the connection state machine.

pub mod dispatcher;
pub mod reconnect;
pub mod replies;
pub mod router;

pub use dispatcher::{DispatchSettings, Dispatcher, MAX_REPLY_LEN, TodayFn};
pub use router::{Command, route};
