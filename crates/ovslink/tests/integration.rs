//! Integration test entry point.
//!
//! The actual tests are organized in the `integration/` directory. They
//! need root and the `openvswitch` kernel module, and skip themselves
//! otherwise. Datapath tests also need `ovs-dpctl`.
//!
//! # Running Tests
//!
//! ```bash
//! # Run all integration tests
//! sudo cargo test -p ovslink --features integration --test integration
//!
//! # Run a single test
//! sudo cargo test -p ovslink --features integration --test integration test_follow_and_stop
//! ```
//!
//! # Test Organization
//!
//! - `families.rs` - Family resolution and session lifecycle
//! - `datapath.rs` - Datapath lookup and identifier resolution
//! - `follow.rs` - Flow following and teardown

#[macro_use]
#[path = "common/mod.rs"]
mod common;

#[path = "integration/families.rs"]
mod families;

#[path = "integration/datapath.rs"]
mod datapath;

#[path = "integration/follow.rs"]
mod follow;
