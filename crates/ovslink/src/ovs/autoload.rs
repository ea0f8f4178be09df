//! One-shot kernel module autoload.
//!
//! Some kernels load `openvswitch` lazily the first time something asks
//! for a network device of that name. Family resolution uses this as a
//! last resort: if a datapath family is unknown, the probe runs once per
//! process and the lookup is retried.
//!
//! [`MODULE_AUTOLOAD`] is intentionally shared, mutable process state. Its
//! only transition is from "not attempted" to "attempted", and it happens
//! at most once no matter how many sessions or threads race to trigger it.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use tokio::runtime::{Handle, RuntimeFlavor};

/// Pseudo-interface whose lookup makes the kernel request the module.
pub const OVS_AUTOLOAD_IFNAME: &str = "openvswitch";

/// Process-wide autoload guard used by [`resolve_family`](super::resolve_family).
pub static MODULE_AUTOLOAD: ModuleAutoload = ModuleAutoload::new(probe_openvswitch_module);

/// Run-at-most-once coordinator for a module autoload probe.
///
/// Concurrent callers of [`trigger`](Self::trigger) block until the first
/// caller's probe has finished.
pub struct ModuleAutoload {
    once: Once,
    probe: fn(),
}

impl ModuleAutoload {
    /// Create a guard that will run `probe` on first trigger.
    pub const fn new(probe: fn()) -> Self {
        Self {
            once: Once::new(),
            probe,
        }
    }

    /// Run the probe if no caller has yet, otherwise wait for it.
    ///
    /// Blocks the calling thread, possibly for as long as the kernel takes
    /// to load the module. A panicking probe counts as attempted and does
    /// not poison the guard.
    pub fn trigger(&self) {
        self.once.call_once(|| {
            tracing::debug!("attempting kernel module autoload");
            if panic::catch_unwind(AssertUnwindSafe(self.probe)).is_err() {
                tracing::warn!("kernel module autoload probe panicked");
            }
        });
    }

    /// Like [`trigger`](Self::trigger), for callers on a tokio runtime.
    ///
    /// On a multi-threaded runtime the worker is handed over to other tasks
    /// while the probe runs. A current-thread runtime is blocked as with
    /// `trigger`.
    pub fn trigger_in_runtime(&self) {
        if self.attempted() {
            return;
        }
        match Handle::try_current() {
            Ok(rt) if rt.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.trigger())
            }
            _ => self.trigger(),
        }
    }

    /// Whether the probe has already run.
    pub fn attempted(&self) -> bool {
        self.once.is_completed()
    }
}

impl std::fmt::Debug for ModuleAutoload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleAutoload")
            .field("attempted", &self.attempted())
            .finish()
    }
}

fn probe_openvswitch_module() {
    request_kernel_module_autoload(OVS_AUTOLOAD_IFNAME);
}

/// Ask the kernel for the index of interface `ifname`, discarding the answer.
///
/// With `CAP_SYS_MODULE`, a `SIOCGIFINDEX` on an unknown name makes the
/// kernel try to load a module aliased to it. Netdev ioctls do not work on
/// netlink sockets, so a throwaway UDP socket is used and always closed.
/// Every failure is ignored.
pub fn request_kernel_module_autoload(ifname: &str) {
    if ifname.is_empty() || ifname.len() >= libc::IFNAMSIZ {
        return;
    }

    // SAFETY: plain socket(2) call, the result is checked below.
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        tracing::trace!(
            error = %std::io::Error::last_os_error(),
            "cannot open socket for module autoload"
        );
        return;
    }
    // SAFETY: fd is a freshly created descriptor owned by nothing else.
    let socket = unsafe { OwnedFd::from_raw_fd(fd) };

    // SAFETY: ifreq is a plain C struct for which all-zero is valid.
    let mut req: libc::ifreq = unsafe { std::mem::zeroed() };
    for (dst, &src) in req.ifr_name.iter_mut().zip(ifname.as_bytes()) {
        *dst = src as libc::c_char;
    }

    // SAFETY: req is initialized, NUL-terminated (name is shorter than
    // IFNAMSIZ) and outlives the call.
    let ret = unsafe { libc::ioctl(socket.as_raw_fd(), libc::SIOCGIFINDEX as _, &mut req) };
    tracing::trace!(ifname, ret, "module autoload probe issued");
}
