//! Flow-table change events.
//!
//! When a socket has joined the `ovs_flow` multicast group, the kernel sends
//! it a copy of every flow that is created, deleted or modified in any
//! datapath. [`DatapathHandle::follow_flows`] reads those messages in a
//! background task and delivers the ones for a single datapath.
//!
//! # Example
//!
//! ```ignore
//! use ovslink::ovs::Dpif;
//! use tokio_stream::StreamExt;
//!
//! let dpif = Dpif::open_generic(true).await?;
//! let dp = dpif.resolve_datapath("ovs-system").await?;
//! let (mut events, stop) = dp.handle.follow_flows()?;
//!
//! while let Some(flow) = events.next().await {
//!     let flow = flow?;
//!     println!("{} flow, key {} bytes", flow.kind, flow.key.len());
//! }
//!
//! stop.stop().await;
//! dpif.close()?;
//! ```

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use super::datapath::DatapathHandle;
use super::{DatapathId, OvsFlowAttr, OvsFlowCmd};
use crate::netlink::attr::{AttrIter, get};
use crate::netlink::genl::{GENL_HDRLEN, GenlMsgHdr};
use crate::netlink::message::NLMSG_ALIGNTO;
use crate::netlink::{Error, MessageIter, MessageParser, NetlinkSocket, NlMsgHdr, Result};

/// Default number of undelivered events buffered per followed datapath.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// What happened to a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowChange {
    New,
    Deleted,
    Changed,
}

impl fmt::Display for FlowChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlowChange::New => "new",
            FlowChange::Deleted => "deleted",
            FlowChange::Changed => "changed",
        })
    }
}

/// Flow hit counters (mirrors struct ovs_flow_stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowStats {
    pub packets: u64,
    pub bytes: u64,
}

/// A flow-table change reported by the kernel.
///
/// Key, mask and actions are kept as raw nested attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowInfo {
    pub kind: FlowChange,
    pub datapath: DatapathId,
    pub key: Vec<u8>,
    pub mask: Option<Vec<u8>>,
    pub actions: Option<Vec<u8>>,
    pub ufid: Option<Vec<u8>>,
    pub stats: Option<FlowStats>,
    pub tcp_flags: Option<u8>,
    /// Last use, in milliseconds of kernel monotonic time.
    pub used: Option<u64>,
}

impl FlowInfo {
    /// Iterate over the flow key attributes.
    pub fn key_attrs(&self) -> AttrIter<'_> {
        AttrIter::new(&self.key)
    }

    /// Iterate over the flow mask attributes, if the kernel sent a mask.
    pub fn mask_attrs(&self) -> Option<AttrIter<'_>> {
        self.mask.as_deref().map(AttrIter::new)
    }
}

/// Decode one netlink message as a flow event.
///
/// Returns `Ok(None)` for messages that do not belong to the flow family.
pub fn parse_flow_event(flow_family: u16, msg: &[u8]) -> Result<Option<FlowInfo>> {
    let header = NlMsgHdr::from_bytes(msg)?;
    if header.nlmsg_type != flow_family {
        return Ok(None);
    }

    let mut parser = MessageParser::new(msg);
    parser.expect_nlmsghdr(flow_family)?;

    let raw = parser.take(NLMSG_ALIGNTO, GENL_HDRLEN)?;
    let genl = GenlMsgHdr::from_bytes(raw).ok_or(Error::Truncated {
        expected: GENL_HDRLEN,
        actual: raw.len(),
    })?;
    let kind = match genl.cmd {
        c if c == OvsFlowCmd::New as u8 => FlowChange::New,
        c if c == OvsFlowCmd::Del as u8 => FlowChange::Deleted,
        c if c == OvsFlowCmd::Set as u8 => FlowChange::Changed,
        c => {
            return Err(Error::ProtocolMismatch(format!(
                "unexpected flow notification command {c}"
            )));
        }
    };

    let ovs = parser.take_ovs_header()?;

    let mut key = None;
    let mut flow = FlowInfo {
        kind,
        datapath: ovs.datapath_id(),
        key: Vec::new(),
        mask: None,
        actions: None,
        ufid: None,
        stats: None,
        tcp_flags: None,
        used: None,
    };

    for (attr_type, payload) in AttrIter::new(parser.remaining()) {
        match attr_type {
            t if t == OvsFlowAttr::Key as u16 => key = Some(payload.to_vec()),
            t if t == OvsFlowAttr::Mask as u16 => flow.mask = Some(payload.to_vec()),
            t if t == OvsFlowAttr::Actions as u16 => flow.actions = Some(payload.to_vec()),
            t if t == OvsFlowAttr::Ufid as u16 => flow.ufid = Some(payload.to_vec()),
            t if t == OvsFlowAttr::Stats as u16 => {
                if payload.len() < 16 {
                    return Err(Error::InvalidAttribute("truncated flow stats".into()));
                }
                flow.stats = Some(FlowStats {
                    packets: get::u64_ne(&payload[..8])?,
                    bytes: get::u64_ne(&payload[8..16])?,
                });
            }
            t if t == OvsFlowAttr::TcpFlags as u16 => flow.tcp_flags = Some(get::u8(payload)?),
            t if t == OvsFlowAttr::Used as u16 => flow.used = Some(get::u64_ne(payload)?),
            _ => {}
        }
    }

    flow.key = key.ok_or_else(|| Error::InvalidMessage("flow event without a key".into()))?;
    Ok(Some(flow))
}

/// Flow events for one followed datapath.
///
/// Also usable as a [`Stream`]. Ends once the reader stops, whether through
/// [`FlowStop::stop`] or a socket error (delivered as a final `Err` item).
/// Events still buffered when the reader is stopped are discarded.
#[derive(Debug)]
pub struct FlowEvents {
    rx: mpsc::Receiver<Result<FlowInfo>>,
    stopped: Arc<AtomicBool>,
}

impl FlowEvents {
    pub(crate) fn new(rx: mpsc::Receiver<Result<FlowInfo>>, stopped: Arc<AtomicBool>) -> Self {
        Self { rx, stopped }
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<Result<FlowInfo>> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }

    /// Whether the reader has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Stream for FlowEvents {
    type Item = Result<FlowInfo>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.is_stopped() {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(_)) if this.is_stopped() => Poll::Ready(None),
            other => other,
        }
    }
}

/// Stops a flow reader.
///
/// Dropping it aborts the reader without waiting for it.
#[derive(Debug)]
pub struct FlowStop {
    stopped: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FlowStop {
    pub(crate) fn new(stopped: Arc<AtomicBool>, task: JoinHandle<()>) -> Self {
        Self {
            stopped,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stop the reader and wait for it to finish.
    ///
    /// No event is delivered once this returns. Calling it again does
    /// nothing.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::Release);

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(task) = task else {
            return;
        };

        task.abort();
        match task.await {
            Err(e) if e.is_panic() => tracing::warn!("flow reader panicked: {e}"),
            _ => tracing::debug!("flow reader stopped"),
        }
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl Drop for FlowStop {
    fn drop(&mut self) {
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            self.stopped.store(true, Ordering::Release);
            task.abort();
        }
    }
}

impl DatapathHandle<'_> {
    /// Start following flow changes in this datapath.
    ///
    /// The session must have joined the `ovs_flow` group (see
    /// [`Dpif::open_generic`](super::Dpif::open_generic)). A reader task
    /// takes over the session's socket until it is stopped, so the session
    /// should not be used for requests meanwhile. Must be called from
    /// within a tokio runtime.
    pub fn follow_flows(&self) -> Result<(FlowEvents, FlowStop)> {
        self.follow_flows_with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Like [`follow_flows`](Self::follow_flows) with a custom event buffer.
    pub fn follow_flows_with_capacity(&self, capacity: usize) -> Result<(FlowEvents, FlowStop)> {
        let runtime = tokio::runtime::Handle::try_current().map_err(io::Error::other)?;

        let dpif = self.dpif();
        let flow_family = dpif.families().flow.id;
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stopped = Arc::new(AtomicBool::new(false));

        let task = runtime.spawn(read_flow_events(
            dpif.shared_socket(),
            flow_family,
            self.id(),
            tx,
        ));

        tracing::debug!(datapath = %self.id(), capacity, "following flows");
        Ok((
            FlowEvents::new(rx, Arc::clone(&stopped)),
            FlowStop::new(stopped, task),
        ))
    }
}

/// Where a flow reader gets its messages from.
pub(crate) trait MessageSource: Send + Sync + 'static {
    fn recv_msg(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

impl MessageSource for NetlinkSocket {
    fn recv_msg(&self) -> impl Future<Output = Result<Vec<u8>>> + Send {
        NetlinkSocket::recv_msg(self)
    }
}

/// Deliver flow events for `datapath` until the receiver goes away.
///
/// A receive buffer overrun is reported and reading goes on; any other
/// receive error is reported and ends the reader.
async fn read_flow_events<S: MessageSource>(
    socket: Arc<S>,
    flow_family: u16,
    datapath: DatapathId,
    tx: mpsc::Sender<Result<FlowInfo>>,
) {
    loop {
        let data = match socket.recv_msg().await {
            Ok(data) => data,
            Err(e) if e.is_overrun() => {
                tracing::warn!(%datapath, "flow events lost, receive buffer overrun");
                if tx.send(Err(e)).await.is_err() {
                    return;
                }
                continue;
            }
            Err(e) => {
                tracing::debug!(%datapath, error = %e, "flow reader receive failed");
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        for result in MessageIter::new(&data) {
            let item = match result.and_then(|(_, msg)| parse_flow_event(flow_family, msg)) {
                Ok(Some(flow)) if flow.datapath == datapath => Ok(flow),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(%datapath, error = %e, "malformed flow event");
                    Err(e)
                }
            };

            if tx.send(item).await.is_err() {
                tracing::trace!(%datapath, "flow receiver dropped, reader exiting");
                return;
            }
        }
    }
}
