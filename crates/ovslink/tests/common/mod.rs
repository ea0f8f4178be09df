//! Common test utilities for integration tests.
//!
//! Provides `TestDatapath` for throwaway kernel datapaths and helper macros
//! for skipping tests on hosts that cannot run them.

use ovslink::Result;
use std::io;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};

/// Global counter for unique datapath names.
static DATAPATH_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Generate a unique datapath name for this test.
///
/// Datapath names are interface names, so this stays under IFNAMSIZ.
fn unique_dp_name(prefix: &str) -> String {
    let id = DATAPATH_COUNTER.fetch_add(1, Ordering::SeqCst);
    let pid = std::process::id() % 100_000;
    format!("{}{}-{}", prefix, pid, id)
}

/// A kernel datapath created with `ovs-dpctl`, deleted on drop.
pub struct TestDatapath {
    name: String,
}

impl TestDatapath {
    /// Create a new datapath with a unique name.
    pub fn new(prefix: &str) -> Result<Self> {
        let name = unique_dp_name(prefix);
        dpctl(&["add-dp", &name])?;
        Ok(Self { name })
    }

    /// Get the datapath name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the datapath ifindex.
    pub fn ifindex(&self) -> Result<u32> {
        let path = format!("/sys/class/net/{}/ifindex", self.name);
        let raw = std::fs::read_to_string(&path)?;
        raw.trim()
            .parse()
            .map_err(|e| ovslink::Error::InvalidMessage(format!("bad ifindex in {path}: {e}")))
    }
}

impl Drop for TestDatapath {
    fn drop(&mut self) {
        let _ = Command::new("ovs-dpctl")
            .args(["del-dp", &self.name])
            .status();
    }
}

fn dpctl(args: &[&str]) -> Result<()> {
    let output = Command::new("ovs-dpctl")
        .args(args)
        .output()
        .map_err(|e| ovslink::Error::Io(io::Error::from(e.kind())))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ovslink::Error::InvalidMessage(format!(
            "ovs-dpctl {:?} failed: {}",
            args, stderr
        )));
    }

    Ok(())
}

/// Check if running as root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Check if the openvswitch kernel module is loaded.
pub fn has_openvswitch() -> bool {
    Path::new("/sys/module/openvswitch").exists()
}

/// Check if `ovs-dpctl` can be run.
pub fn has_dpctl() -> bool {
    Command::new("ovs-dpctl")
        .arg("--version")
        .output()
        .is_ok_and(|o| o.status.success())
}

/// Check if a datapath with this name exists.
pub fn datapath_exists(name: &str) -> bool {
    Path::new("/sys/class/net").join(name).exists()
}

/// Skip the test unless running as root with the openvswitch module loaded.
#[macro_export]
macro_rules! require_openvswitch {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
        if !crate::common::has_openvswitch() {
            eprintln!("Skipping test: openvswitch module not loaded");
            return Ok(());
        }
    };
}

/// Like `require_openvswitch!`, additionally requiring `ovs-dpctl`.
#[macro_export]
macro_rules! require_dpctl {
    () => {
        require_openvswitch!();
        if !crate::common::has_dpctl() {
            eprintln!("Skipping test: ovs-dpctl not available");
            return Ok(());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_dp_name() {
        let name1 = unique_dp_name("olt");
        let name2 = unique_dp_name("olt");
        assert_ne!(name1, name2);
        assert!(name1.starts_with("olt"));
        assert!(name1.len() < libc::IFNAMSIZ);
    }
}
