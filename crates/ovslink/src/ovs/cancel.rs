//! Cancelable resources.

use std::ops::Deref;

use super::dpif::Dpif;
use crate::netlink::Result;

/// A resource that can be released through a uniform interface.
///
/// Lets registries of heterogeneous resources hold them as
/// `Box<dyn Cancelable>` and release them without knowing their type.
pub trait Cancelable: Send {
    /// Release the resource.
    fn cancel(self: Box<Self>) -> Result<()>;
}

/// A [`Dpif`] whose cancellation closes the session.
#[derive(Debug)]
pub struct CancelableDpif(Dpif);

impl CancelableDpif {
    pub fn new(dpif: Dpif) -> Self {
        Self(dpif)
    }

    pub fn into_inner(self) -> Dpif {
        self.0
    }
}

impl From<Dpif> for CancelableDpif {
    fn from(dpif: Dpif) -> Self {
        Self(dpif)
    }
}

impl Deref for CancelableDpif {
    type Target = Dpif;

    fn deref(&self) -> &Dpif {
        &self.0
    }
}

impl Cancelable for CancelableDpif {
    fn cancel(self: Box<Self>) -> Result<()> {
        self.0.close()
    }
}
