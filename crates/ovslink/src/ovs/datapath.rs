//! Datapath lookup and identifier resolution.

use super::dpif::Dpif;
use super::{DatapathId, OvsDpAttr, OvsDpCmd, OvsFamily};
use crate::netlink::attr::{AttrIter, get};
use crate::netlink::{Error, MessageParser, Result};

/// A datapath known to a [`Dpif`] session.
///
/// Borrows the session, so it cannot outlive it.
#[derive(Debug, Clone, Copy)]
pub struct DatapathHandle<'a> {
    dpif: &'a Dpif,
    id: DatapathId,
}

impl<'a> DatapathHandle<'a> {
    pub(crate) fn new(dpif: &'a Dpif, id: DatapathId) -> Self {
        Self { dpif, id }
    }

    /// The datapath's ifindex.
    pub fn id(&self) -> DatapathId {
        self.id
    }

    /// The owning session.
    pub fn dpif(&self) -> &'a Dpif {
        self.dpif
    }
}

/// A resolved datapath and its canonical name.
#[derive(Debug, Clone)]
pub struct Datapath<'a> {
    pub handle: DatapathHandle<'a>,
    pub name: String,
}

impl Dpif {
    /// Look up a datapath by name.
    ///
    /// An unknown name fails with a kernel ENODEV error, for which
    /// [`Error::is_no_such_datapath`] holds.
    pub async fn lookup_datapath(&self, name: &str) -> Result<DatapathHandle<'_>> {
        let cmd = OvsDpCmd::Get as u8;
        let reply = self
            .transact(OvsFamily::Datapath, cmd, DatapathId(0), |b| {
                b.append_attr_str(OvsDpAttr::Name as u16, name);
            })
            .await?;

        let mut parser = MessageParser::new(&reply);
        let (_, ovs) = self.check_reply(&mut parser, OvsFamily::Datapath, cmd)?;

        tracing::trace!(name, id = %ovs.datapath_id(), "found datapath by name");
        Ok(DatapathHandle::new(self, ovs.datapath_id()))
    }

    /// Look up a datapath by ifindex.
    pub async fn lookup_datapath_by_id(&self, id: DatapathId) -> Result<Datapath<'_>> {
        let cmd = OvsDpCmd::Get as u8;
        let reply = self.transact(OvsFamily::Datapath, cmd, id, |_| {}).await?;

        let mut parser = MessageParser::new(&reply);
        let (_, ovs) = self.check_reply(&mut parser, OvsFamily::Datapath, cmd)?;
        let name = datapath_name(parser.remaining())?;

        tracing::trace!(%id, name = %name, "found datapath by id");
        Ok(Datapath {
            handle: DatapathHandle::new(self, ovs.datapath_id()),
            name,
        })
    }

    /// Resolve a datapath by name, falling back to its ifindex.
    ///
    /// See [`resolve_datapath`].
    pub async fn resolve_datapath(&self, identifier: &str) -> Result<Datapath<'_>> {
        let (handle, name) = resolve_datapath(self, identifier).await?;
        Ok(Datapath { handle, name })
    }
}

fn datapath_name(attrs: &[u8]) -> Result<String> {
    AttrIter::new(attrs)
        .find(|(kind, _)| *kind == OvsDpAttr::Name as u16)
        .ok_or_else(|| Error::InvalidMessage("datapath reply without a name".into()))
        .and_then(|(_, payload)| get::string(payload).map(str::to_string))
}

/// Something that can find datapaths by name and by ifindex.
///
/// Both lookups must report a missing datapath with an error for which
/// [`Error::is_no_such_datapath`] holds.
#[allow(async_fn_in_trait)]
pub trait DatapathLookup {
    /// Reference to a found datapath.
    type Handle<'a>
    where
        Self: 'a;

    /// Find a datapath by name.
    async fn lookup_by_name(&self, name: &str) -> Result<Self::Handle<'_>>;

    /// Find a datapath by ifindex, returning it with its name.
    async fn lookup_by_id(&self, id: DatapathId) -> Result<(Self::Handle<'_>, String)>;
}

impl DatapathLookup for Dpif {
    type Handle<'a> = DatapathHandle<'a>;

    async fn lookup_by_name(&self, name: &str) -> Result<DatapathHandle<'_>> {
        self.lookup_datapath(name).await
    }

    async fn lookup_by_id(&self, id: DatapathId) -> Result<(DatapathHandle<'_>, String)> {
        let dp = self.lookup_datapath_by_id(id).await?;
        Ok((dp.handle, dp.name))
    }
}

/// Resolve a user-supplied datapath identifier.
///
/// The identifier is tried as a name first. Only if no datapath has that
/// name, and the identifier is a plain unsigned decimal, is it tried as an
/// ifindex; the datapath's own name is returned in that case. Other lookup
/// errors are returned as they are. If neither lookup finds a datapath the
/// result is [`Error::NoSuchDatapath`], whichever lookup failed last.
pub async fn resolve_datapath<'a, L: DatapathLookup>(
    lookup: &'a L,
    identifier: &str,
) -> Result<(L::Handle<'a>, String)> {
    match lookup.lookup_by_name(identifier).await {
        Ok(handle) => return Ok((handle, identifier.to_string())),
        Err(e) if !e.is_no_such_datapath() => return Err(e),
        Err(_) => {}
    }

    if let Some(id) = parse_datapath_id(identifier) {
        tracing::trace!(identifier, "no datapath by that name, trying ifindex");
        match lookup.lookup_by_id(id).await {
            Ok(found) => return Ok(found),
            Err(e) if !e.is_no_such_datapath() => return Err(e),
            Err(_) => {}
        }
    }

    Err(Error::NoSuchDatapath {
        identifier: identifier.to_string(),
    })
}

/// Parse an ifindex written as plain decimal digits.
fn parse_datapath_id(identifier: &str) -> Option<DatapathId> {
    if identifier.is_empty() || !identifier.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    identifier.parse::<u32>().ok().map(DatapathId)
}
