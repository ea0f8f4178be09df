//! Datapath interface sessions.

use std::sync::Arc;

use super::family::Families;
use super::header::OvsHeader;
use super::{DatapathId, OVS_FLOW_MCGROUP, OvsFamily};
use crate::netlink::genl::GenlMsgHdr;
use crate::netlink::message::{NLM_F_REQUEST, NlMsgError};
use crate::netlink::{
    Error, MessageBuilder, MessageIter, MessageParser, NLMSG_HDRLEN, NetlinkSocket, Protocol,
    Result,
};

/// A session with the kernel datapath.
///
/// Owns one netlink socket and the metadata of all four datapath families.
/// A `Dpif` is built whole or not at all: if any family fails to resolve,
/// the socket is closed and no handle is returned.
///
/// # Example
///
/// ```ignore
/// use ovslink::ovs::Dpif;
///
/// let dpif = Dpif::open_generic(false).await?;
/// for (family, info) in dpif.families().iter() {
///     println!("{family}: id {}", info.id);
/// }
/// dpif.close()?;
/// ```
#[derive(Debug)]
pub struct Dpif {
    socket: Arc<NetlinkSocket>,
    families: Families,
}

impl Dpif {
    /// Open a session over the netfilter netlink protocol.
    pub async fn open() -> Result<Self> {
        Self::open_with_protocol(Protocol::Netfilter).await
    }

    /// Open a session over `protocol` and resolve all datapath families.
    pub async fn open_with_protocol(protocol: Protocol) -> Result<Self> {
        let socket = NetlinkSocket::new(protocol)?;

        let families = match Families::resolve(&socket).await {
            Ok(families) => families,
            Err(e) => {
                socket.close()?;
                return Err(e);
            }
        };

        Ok(Self::from_parts(socket, families))
    }

    /// Open a Generic Netlink session.
    ///
    /// The flow family must register the `ovs_flow` multicast group. With
    /// `follow`, the socket joins that group so flow changes are delivered
    /// to it.
    pub async fn open_generic(follow: bool) -> Result<Self> {
        let mut dpif = Self::open_with_protocol(Protocol::Generic).await?;

        let mut joined = dpif.mcast_group(OvsFamily::Flow, OVS_FLOW_MCGROUP).map(|_| ());
        if joined.is_ok() && follow {
            joined = dpif.set_group_membership(OvsFamily::Flow, OVS_FLOW_MCGROUP, true);
        }

        match joined {
            Ok(()) => Ok(dpif),
            Err(e) => {
                dpif.close()?;
                Err(e)
            }
        }
    }

    pub(crate) fn from_parts(socket: NetlinkSocket, families: Families) -> Self {
        Self {
            socket: Arc::new(socket),
            families,
        }
    }

    /// A copy of the resolved family metadata.
    pub fn families(&self) -> Families {
        self.families.clone()
    }

    /// Open a fresh socket of the same protocol, reusing this session's
    /// family metadata.
    ///
    /// Nothing is re-resolved, so this succeeds even if the families have
    /// since become unavailable. The two sessions share no mutable state.
    /// Must be called from within a tokio runtime.
    pub fn reopen(&self) -> Result<Self> {
        let socket = NetlinkSocket::new(self.socket.protocol())?;
        Ok(Self::from_parts(socket, self.families.clone()))
    }

    /// Look up a multicast group of a resolved family.
    pub fn mcast_group(&self, family: OvsFamily, group: &str) -> Result<u32> {
        self.families.mcast_group(family, group)
    }

    /// Join or leave a multicast group of a resolved family.
    ///
    /// Fails with [`Error::NotSupported`] while flows are being followed on
    /// this session, since the reader task shares the socket.
    pub fn set_group_membership(&mut self, family: OvsFamily, group: &str, join: bool) -> Result<()> {
        let id = self.mcast_group(family, group)?;
        let socket = Arc::get_mut(&mut self.socket).ok_or_else(|| {
            Error::NotSupported("changing group membership of a shared socket".into())
        })?;

        if join {
            socket.add_membership(id)?;
        } else {
            socket.drop_membership(id)?;
        }

        tracing::debug!(%family, group, id, join, "changed multicast membership");
        Ok(())
    }

    /// Close the session and release its socket.
    ///
    /// If a flow reader still holds the socket, it is released when that
    /// reader ends.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.socket) {
            Ok(socket) => socket.close(),
            Err(shared) => {
                tracing::debug!(pid = shared.pid(), "socket still in use, deferring close");
                Ok(())
            }
        }
    }

    /// The underlying socket.
    pub fn socket(&self) -> &NetlinkSocket {
        &self.socket
    }

    pub(crate) fn shared_socket(&self) -> Arc<NetlinkSocket> {
        Arc::clone(&self.socket)
    }

    /// Validate a reply from `family` to a `cmd` request.
    ///
    /// See [`Families::check_reply`].
    pub fn check_reply(
        &self,
        parser: &mut MessageParser<'_>,
        family: OvsFamily,
        cmd: u8,
    ) -> Result<(GenlMsgHdr, OvsHeader)> {
        self.families.check_reply(parser, family, cmd)
    }

    /// Send one request and wait for its reply.
    ///
    /// Returns the reply message, header included. Messages for other
    /// sequence numbers (multicast traffic, stale replies) are skipped.
    pub(crate) async fn transact(
        &self,
        family: OvsFamily,
        cmd: u8,
        dp: DatapathId,
        build: impl FnOnce(&mut MessageBuilder),
    ) -> Result<Vec<u8>> {
        let mut builder = self.families.new_request(family, cmd, NLM_F_REQUEST, dp);
        build(&mut builder);

        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        self.socket.send(&builder.finish()).await?;

        loop {
            let data = self.socket.recv_msg().await?;

            for result in MessageIter::new(&data) {
                let (header, msg) = result?;

                if header.nlmsg_seq != seq {
                    continue;
                }

                if header.is_error() {
                    let err = NlMsgError::from_bytes(&msg[NLMSG_HDRLEN..])?;
                    if err.is_ack() {
                        continue;
                    }
                    return Err(Error::from_errno(err.error));
                }

                if header.is_done() {
                    continue;
                }

                return Ok(msg.to_vec());
            }
        }
    }
}
