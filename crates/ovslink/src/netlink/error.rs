//! Error types for netlink and datapath operations.

use std::io;

/// Result type for netlink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during netlink and datapath operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Kernel returned an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes available.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// The control family reported that no family has this name.
    #[error("generic netlink family not found: {name}")]
    FamilyNotFound {
        /// The family name that was queried.
        name: String,
    },

    /// A datapath family is still missing after the module autoload attempt.
    #[error(
        "generic netlink family '{name}' unavailable; the Open vSwitch kernel module is probably not loaded, try 'modprobe openvswitch'"
    )]
    FamilyUnavailable {
        /// The family name that could not be resolved.
        name: String,
    },

    /// A reply does not address the expected family or command.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// A multicast group is not registered by a resolved family.
    #[error("no generic netlink multicast group '{group}' in family '{family}'")]
    NoSuchGroup {
        /// The group name that was requested.
        group: String,
        /// The family the group was looked up in.
        family: String,
    },

    /// The request cannot be carried out in the current state.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// No datapath matches an identifier, by name or by ifindex.
    #[error("cannot find datapath \"{identifier}\"")]
    NoSuchDatapath {
        /// The identifier as supplied by the caller.
        identifier: String,
    },
}

impl Error {
    /// Create a kernel error from an errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Check if the kernel reported an unknown generic netlink family.
    pub fn is_family_not_found(&self) -> bool {
        matches!(self, Self::FamilyNotFound { .. })
    }

    /// Check if the kernel lacks Open vSwitch datapath support.
    ///
    /// Tooling should suggest loading the `openvswitch` module when this
    /// returns `true`.
    pub fn is_family_unavailable(&self) -> bool {
        matches!(self, Self::FamilyUnavailable { .. })
    }

    /// Check if this error means the requested datapath does not exist.
    ///
    /// The datapath family reports unknown datapaths with ENODEV.
    pub fn is_no_such_datapath(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } => *errno == libc::ENODEV,
            Self::NoSuchDatapath { .. } => true,
            _ => false,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Kernel { errno, .. } => matches!(*errno, libc::EPERM | libc::EACCES),
            Self::Io(e) => e.kind() == io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }

    /// Check if the socket receive buffer overflowed (ENOBUFS).
    ///
    /// The kernel dropped messages addressed to this socket, but the
    /// socket stays usable.
    pub fn is_overrun(&self) -> bool {
        match self {
            Self::Io(e) => e.raw_os_error() == Some(libc::ENOBUFS),
            Self::Kernel { errno, .. } => *errno == libc::ENOBUFS,
            _ => false,
        }
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}
