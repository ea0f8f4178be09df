//! Async netlink transport.
//!
//! A minimal netlink implementation covering what datapath control needs:
//! an async socket, message framing, attributes, and Generic Netlink family
//! resolution.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ ovs::Dpif                               │
//! │ (resolved families, datapath requests)  │
//! └────────────────┬────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────┐
//! │ genl (control family, GENL header)      │
//! └────────────────┬────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────┐
//! │ NetlinkSocket (Protocol::Generic)       │
//! └─────────────────────────────────────────┘
//! ```

pub mod attr;
mod builder;
mod error;
pub mod genl;
pub mod message;
mod socket;

pub use attr::{AttrIter, NlAttr};
pub use builder::MessageBuilder;
pub use error::{Error, Result};
pub use message::{MessageIter, MessageParser, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use socket::{NetlinkSocket, Protocol};
