// XMPP session supervision: one worker task owns the session, reconnects
// forever with backoff, and talks to the rest of the bridge over channels.

pub mod backoff;
pub mod error;
pub mod session;
pub mod supervisor;

pub use backoff::{Backoff, BackoffConfig};
pub use error::NetError;
pub use session::{XmppClient, XmppEvent};
pub use supervisor::{
    spawn_supervisor, SessionConfig, SessionState, XmppCommand, XmppHandle, XmppNotification,
};
