//! Netlink message header and parsing.

use super::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    align_to(len, NLMSG_ALIGNTO)
}

/// Align a length to an arbitrary power-of-two boundary.
#[inline]
pub const fn align_to(len: usize, align: usize) -> usize {
    (len + align - 1) & !(align - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Create a new message header.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Check if this is an error message.
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NlMsgType::ERROR
    }

    /// Check if this is a done message.
    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NlMsgType::DONE
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse header from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(h, _)| h)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Standard netlink message types.
pub struct NlMsgType;

impl NlMsgType {
    /// Error message or ACK.
    pub const ERROR: u16 = 2;
    /// End of multipart message.
    pub const DONE: u16 = 3;
}

/// Request message flag.
pub const NLM_F_REQUEST: u16 = 0x01;

/// Iterator over netlink messages in a buffer.
///
/// Yields each complete message, header included, so that it can be handed
/// to a [`MessageParser`].
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    /// Create a new message iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<(NlMsgHdr, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLMSG_HDRLEN {
            return None;
        }

        let header = match NlMsgHdr::from_bytes(self.data) {
            Ok(h) => h,
            Err(e) => return Some(Err(e)),
        };

        let msg_len = header.nlmsg_len as usize;
        if msg_len < NLMSG_HDRLEN || msg_len > self.data.len() {
            self.data = &[];
            return Some(Err(Error::InvalidMessage(format!(
                "invalid message length: {}",
                msg_len
            ))));
        }

        let msg = &self.data[..msg_len];
        let aligned_len = nlmsg_align(msg_len);

        // Move to next message
        if aligned_len >= self.data.len() {
            self.data = &[];
        } else {
            self.data = &self.data[aligned_len..];
        }

        Some(Ok((header, msg)))
    }
}

/// Netlink error message payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    /// Error code (negative errno or 0 for ACK).
    pub error: i32,
    /// Original message header that caused the error.
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    /// Parse error message from payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(e, _)| e)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }

    /// Check if this is an ACK (no error).
    pub fn is_ack(&self) -> bool {
        self.error == 0
    }
}

/// Cursor over a single received netlink message.
///
/// Fixed-size headers are consumed in order (netlink header, family header,
/// family-specific header); whatever is left is the attribute payload.
#[derive(Debug, Clone)]
pub struct MessageParser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MessageParser<'a> {
    /// Create a parser positioned at the start of a message.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Advance to the next `align` boundary and consume `size` bytes.
    ///
    /// Returns the offset of the consumed region.
    pub fn align_advance(&mut self, align: usize, size: usize) -> Result<usize> {
        let start = align_to(self.pos, align);
        let end = start + size;
        if end > self.data.len() {
            return Err(Error::Truncated {
                expected: end,
                actual: self.data.len(),
            });
        }
        self.pos = end;
        Ok(start)
    }

    /// Consume `size` bytes at `align` and return them.
    pub fn take(&mut self, align: usize, size: usize) -> Result<&'a [u8]> {
        let start = self.align_advance(align, size)?;
        Ok(&self.data[start..start + size])
    }

    /// Consume the netlink header, checking it is addressed to `msg_type`.
    ///
    /// Kernel error replies are surfaced as [`Error::Kernel`]; any other type
    /// is a [`Error::ProtocolMismatch`].
    pub fn expect_nlmsghdr(&mut self, msg_type: u16) -> Result<NlMsgHdr> {
        let raw = self.take(NLMSG_ALIGNTO, NLMSG_HDRLEN)?;
        let header = NlMsgHdr::from_bytes(raw)?;

        if header.nlmsg_len as usize > self.data.len() {
            return Err(Error::Truncated {
                expected: header.nlmsg_len as usize,
                actual: self.data.len(),
            });
        }
        // Ignore anything past this message
        self.data = &self.data[..header.nlmsg_len as usize];

        if header.is_error() {
            let err = NlMsgError::from_bytes(self.remaining())?;
            if !err.is_ack() {
                return Err(Error::from_errno(err.error));
            }
        }

        if header.nlmsg_type != msg_type {
            return Err(Error::ProtocolMismatch(format!(
                "netlink message type {}, expected {}",
                header.nlmsg_type, msg_type
            )));
        }

        Ok(header)
    }
}
