//! Open vSwitch datapath control.
//!
//! The kernel datapath is driven through four Generic Netlink families.
//! A [`Dpif`] owns one netlink socket plus the resolved metadata for all
//! four, and is the entry point for datapath requests:
//!
//! ```text
//! follow_ovs_flows()
//!   └─ Dpif::open_generic(true)        resolve families, join "ovs_flow"
//!        └─ Dpif::resolve_datapath()   name, falling back to ifindex
//!             └─ DatapathHandle::follow_flows()
//!                  └─ (FlowEvents, FlowStop)
//! ```
//!
//! Family resolution provokes a one-time module autoload if the kernel does
//! not know the families yet; see [`autoload`].

pub mod autoload;
mod cancel;
mod datapath;
mod dpif;
mod family;
mod flow;
mod follow;
mod header;

pub use autoload::{MODULE_AUTOLOAD, ModuleAutoload, request_kernel_module_autoload};
pub use cancel::{Cancelable, CancelableDpif};
pub use datapath::{Datapath, DatapathHandle, DatapathLookup, resolve_datapath};
pub use dpif::Dpif;
pub use family::{Families, FamilyLookup, resolve_family, resolve_family_with};
pub use flow::{
    DEFAULT_CHANNEL_CAPACITY, FlowChange, FlowEvents, FlowInfo, FlowStats, FlowStop, parse_flow_event,
};
pub use follow::{FlowMonitor, FollowConfig, follow_flows_with, follow_ovs_flows};
pub use header::{OVS_HEADER_LEN, OvsHeader};

use std::fmt;

/// Name of the datapath the kernel module creates for `ovs-vswitchd`.
pub const DEFAULT_DATAPATH: &str = "ovs-system";

/// Multicast group on the flow family that carries flow-table changes.
pub const OVS_FLOW_MCGROUP: &str = "ovs_flow";

/// The four datapath Generic Netlink families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OvsFamily {
    Datapath,
    Vport,
    Flow,
    Packet,
}

impl OvsFamily {
    /// All families, in resolution order.
    pub const ALL: [OvsFamily; 4] = [
        OvsFamily::Datapath,
        OvsFamily::Vport,
        OvsFamily::Flow,
        OvsFamily::Packet,
    ];

    /// Registered Generic Netlink family name.
    pub const fn name(self) -> &'static str {
        match self {
            OvsFamily::Datapath => "ovs_datapath",
            OvsFamily::Vport => "ovs_vport",
            OvsFamily::Flow => "ovs_flow",
            OvsFamily::Packet => "ovs_packet",
        }
    }

    /// Interface version sent in the GENL header.
    pub const fn version(self) -> u8 {
        match self {
            OvsFamily::Datapath => 2,
            OvsFamily::Vport | OvsFamily::Flow | OvsFamily::Packet => 1,
        }
    }

    /// Command older kernels put in replies to get/delete requests.
    ///
    /// Until Linux 4.19 the datapath, vport and flow families answered with
    /// their NEW command instead of echoing the request command
    /// ("openvswitch: Use correct reply values in datapath and vport ops").
    /// The packet family never had this bug.
    pub const fn legacy_reply_cmd(self) -> Option<u8> {
        match self {
            OvsFamily::Datapath => Some(OvsDpCmd::New as u8),
            OvsFamily::Vport => Some(OvsVportCmd::New as u8),
            OvsFamily::Flow => Some(OvsFlowCmd::New as u8),
            OvsFamily::Packet => None,
        }
    }
}

impl fmt::Display for OvsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Datapath interface index, as carried in `struct ovs_header`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatapathId(pub u32);

impl From<u32> for DatapathId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Datapath family commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvsDpCmd {
    Unspec = 0,
    New = 1,
    Del = 2,
    Get = 3,
    Set = 4,
}

/// Datapath family attributes
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvsDpAttr {
    Unspec = 0,
    Name = 1,
    UpcallPid = 2,
    Stats = 3,
    MegaflowStats = 4,
    UserFeatures = 5,
}

/// Vport family commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvsVportCmd {
    Unspec = 0,
    New = 1,
    Del = 2,
    Get = 3,
    Set = 4,
}

/// Flow family commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvsFlowCmd {
    Unspec = 0,
    New = 1,
    Del = 2,
    Get = 3,
    Set = 4,
}

/// Flow family attributes
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvsFlowAttr {
    Unspec = 0,
    Key = 1,
    Actions = 2,
    Stats = 3,
    TcpFlags = 4,
    Used = 5,
    Clear = 6,
    Mask = 7,
    Probe = 8,
    Ufid = 9,
    UfidFlags = 10,
    Pad = 11,
}

/// Packet family commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OvsPacketCmd {
    Unspec = 0,
    Miss = 1,
    Action = 2,
    Execute = 3,
}
