//! One-call flow following.

use std::sync::{Mutex, PoisonError};

use super::DEFAULT_DATAPATH;
use super::dpif::Dpif;
use super::flow::{DEFAULT_CHANNEL_CAPACITY, FlowEvents, FlowStop};
use crate::netlink::Result;

/// Settings for [`follow_flows_with`].
///
/// # Example
///
/// ```
/// use ovslink::ovs::FollowConfig;
///
/// let config = FollowConfig::default().datapath("br0").channel_capacity(64);
/// assert_eq!(config.datapath, "br0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowConfig {
    /// Datapath name or ifindex.
    pub datapath: String,
    /// Undelivered events buffered before the reader waits.
    pub channel_capacity: usize,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            datapath: DEFAULT_DATAPATH.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl FollowConfig {
    /// Set the datapath to follow.
    pub fn datapath(mut self, datapath: impl Into<String>) -> Self {
        self.datapath = datapath.into();
        self
    }

    /// Set the event buffer size.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

/// Owns everything [`follow_flows_with`] set up.
///
/// [`stop`](Self::stop) stops the reader, then closes the session. Dropping
/// the monitor does the same without waiting for the reader.
#[derive(Debug)]
pub struct FlowMonitor {
    // Declared first so that it drops before the session.
    flows: FlowStop,
    dpif: Mutex<Option<Dpif>>,
}

impl FlowMonitor {
    /// Stop following and close the session.
    ///
    /// Safe to call more than once; later calls do nothing and succeed.
    pub async fn stop(&self) -> Result<()> {
        self.flows.stop().await;

        let dpif = self
            .dpif
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match dpif {
            Some(dpif) => {
                tracing::debug!("closing flow session");
                dpif.close()
            }
            None => Ok(()),
        }
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.flows.is_stopped()
    }
}

/// Follow flow changes in the `ovs-system` datapath.
pub async fn follow_ovs_flows() -> Result<(FlowEvents, FlowMonitor)> {
    follow_flows_with(&FollowConfig::default()).await
}

/// Follow flow changes in the datapath named by `config`.
///
/// Opens a Generic Netlink session subscribed to flow changes, resolves the
/// datapath and starts the reader. If any step fails, the session is closed
/// before the error is returned.
pub async fn follow_flows_with(config: &FollowConfig) -> Result<(FlowEvents, FlowMonitor)> {
    let dpif = Dpif::open_generic(true).await?;

    let started = match dpif.resolve_datapath(&config.datapath).await {
        Ok(dp) => {
            tracing::debug!(datapath = %dp.name, id = %dp.handle.id(), "resolved datapath");
            dp.handle.follow_flows_with_capacity(config.channel_capacity)
        }
        Err(e) => Err(e),
    };

    match started {
        Ok((events, flows)) => Ok((
            events,
            FlowMonitor {
                flows,
                dpif: Mutex::new(Some(dpif)),
            },
        )),
        Err(e) => {
            dpif.close()?;
            Err(e)
        }
    }
}
