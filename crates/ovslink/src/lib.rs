//! Async Open vSwitch datapath control over generic netlink.
//!
//! This crate talks to the kernel `openvswitch` module through its four
//! generic netlink families (`ovs_datapath`, `ovs_vport`, `ovs_flow`,
//! `ovs_packet`). It resolves those families (provoking a module autoload
//! once per process if they are missing), identifies datapaths by name or
//! ifindex, and follows the flow-table change events the kernel multicasts.
//!
//! # Example
//!
//! ```no_run
//! use ovslink::ovs::follow_ovs_flows;
//!
//! # async fn example() -> ovslink::Result<()> {
//! let (mut events, monitor) = follow_ovs_flows().await?;
//!
//! while let Some(event) = events.recv().await {
//!     let event = event?;
//!     println!("{:?} on datapath {}", event.kind, event.datapath);
//! }
//!
//! monitor.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Sessions
//!
//! ```no_run
//! use ovslink::ovs::Dpif;
//!
//! # async fn example() -> ovslink::Result<()> {
//! let dpif = Dpif::open_generic(false).await?;
//!
//! // Accepts a datapath name or its ifindex
//! let dp = dpif.resolve_datapath("ovs-system").await?;
//! println!("{} has ifindex {}", dp.name, dp.handle.id());
//!
//! dpif.close()?;
//! # Ok(())
//! # }
//! ```

pub mod netlink;
pub mod ovs;

// Re-export common types at crate root for convenience
pub use netlink::{Error, Protocol, Result};
