//! Chrome DevTools Protocol transport
//!
//! One WebSocket per browser; every page is a flattened session on it and
//! receives its own events through a channel.

pub mod client;
pub mod protocol;
pub mod session;

pub use client::{CDPClient, CDPError, EventReceiver};
pub use protocol::{CDPEvent, CDPRequest, CDPResponse};
pub use session::CDPSession;
