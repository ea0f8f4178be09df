//! Generic Netlink message header.
//!
//! GENL messages have an additional header after the standard netlink header:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ nlmsghdr (16 bytes)                     │
//! │   nlmsg_len, nlmsg_type (family_id),    │
//! │   nlmsg_flags, nlmsg_seq, nlmsg_pid     │
//! ├─────────────────────────────────────────┤
//! │ genlmsghdr (4 bytes)                    │
//! │   cmd (u8), version (u8), reserved (u16)│
//! ├─────────────────────────────────────────┤
//! │ Family header (optional, e.g. ovs_header│
//! ├─────────────────────────────────────────┤
//! │ Attributes (TLV format)                 │
//! └─────────────────────────────────────────┘
//! ```

use std::mem;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::netlink::error::{Error, Result};
use crate::netlink::message::{MessageParser, NLMSG_ALIGNTO};

/// Generic Netlink message header.
///
/// This header immediately follows the standard netlink header in GENL messages.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct GenlMsgHdr {
    /// Command identifier (family-specific)
    pub cmd: u8,
    /// Interface version
    pub version: u8,
    /// Reserved for future use
    pub reserved: u16,
}

/// Size of the GENL header in bytes.
pub const GENL_HDRLEN: usize = mem::size_of::<GenlMsgHdr>();

impl GenlMsgHdr {
    /// Create a new GENL header with the given command and version.
    #[inline]
    pub const fn new(cmd: u8, version: u8) -> Self {
        Self {
            cmd,
            version,
            reserved: 0,
        }
    }

    /// Parse a header from a byte slice.
    ///
    /// Returns `None` if the slice is too short.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        Self::read_from_prefix(data).ok().map(|(h, _)| h)
    }
}

impl MessageParser<'_> {
    /// Consume the GENL header, accepting `cmd` or, if given, `alt_cmd`.
    pub fn check_genlmsghdr(&mut self, cmd: u8, alt_cmd: Option<u8>) -> Result<GenlMsgHdr> {
        let raw = self.take(NLMSG_ALIGNTO, GENL_HDRLEN)?;
        let header = GenlMsgHdr::from_bytes(raw).ok_or(Error::Truncated {
            expected: GENL_HDRLEN,
            actual: raw.len(),
        })?;

        if header.cmd != cmd && Some(header.cmd) != alt_cmd {
            return Err(Error::ProtocolMismatch(format!(
                "generic netlink command {}, expected {}",
                header.cmd, cmd
            )));
        }

        Ok(header)
    }
}
