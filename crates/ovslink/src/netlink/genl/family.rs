//! Generic Netlink family resolution through the control family.

use std::collections::HashMap;

use super::header::{GENL_HDRLEN, GenlMsgHdr};
use super::{CtrlAttr, CtrlAttrMcastGrp, CtrlCmd, GENL_ID_CTRL};
use crate::netlink::attr::{AttrIter, get};
use crate::netlink::builder::MessageBuilder;
use crate::netlink::error::{Error, Result};
use crate::netlink::message::{MessageIter, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgError};
use crate::netlink::socket::NetlinkSocket;

/// Information about a Generic Netlink family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyInfo {
    /// Family name as registered with the control family.
    pub name: String,
    /// Dynamically assigned family ID (used as nlmsg_type).
    pub id: u16,
    /// Family version.
    pub version: u8,
    /// Header size (additional bytes after genlmsghdr).
    pub hdr_size: u32,
    /// Maximum attribute number.
    pub max_attr: u32,
    /// Multicast groups: name -> group ID.
    pub mcast_groups: HashMap<String, u32>,
}

/// Query the kernel for a family by name.
///
/// Fails with [`Error::FamilyNotFound`] when the control family answers
/// ENOENT, which is how the kernel reports an unregistered family.
pub async fn query_family(socket: &NetlinkSocket, name: &str) -> Result<FamilyInfo> {
    let mut builder = MessageBuilder::new(GENL_ID_CTRL, NLM_F_REQUEST);
    builder.append(&GenlMsgHdr::new(CtrlCmd::GetFamily as u8, 1));
    builder.append_attr_str(CtrlAttr::FamilyName as u16, name);

    let seq = socket.next_seq();
    builder.set_seq(seq);
    builder.set_pid(socket.pid());

    socket.send(&builder.finish()).await?;

    // Multicast traffic may be interleaved on a subscribed socket
    loop {
        let response = socket.recv_msg().await?;
        if let Some(info) = parse_family_response(&response, seq, name)? {
            return Ok(info);
        }
    }
}

/// Parse a CTRL_CMD_GETFAMILY response.
///
/// Returns `Ok(None)` if the buffer holds no reply for `seq`.
fn parse_family_response(data: &[u8], seq: u32, name: &str) -> Result<Option<FamilyInfo>> {
    for result in MessageIter::new(data) {
        let (header, msg) = result?;

        if header.nlmsg_seq != seq {
            continue;
        }

        let payload = &msg[NLMSG_HDRLEN..];

        if header.is_error() {
            let err = NlMsgError::from_bytes(payload)?;
            if err.is_ack() {
                continue;
            }
            if err.error == -libc::ENOENT {
                return Err(Error::FamilyNotFound {
                    name: name.to_string(),
                });
            }
            return Err(Error::from_errno(err.error));
        }

        if header.is_done() {
            continue;
        }

        if payload.len() < GENL_HDRLEN {
            return Err(Error::InvalidMessage("GENL header too short".into()));
        }

        return parse_family_attrs(&payload[GENL_HDRLEN..], name).map(Some);
    }

    Ok(None)
}

/// Parse family attributes from a CTRL_CMD_GETFAMILY response.
fn parse_family_attrs(data: &[u8], name: &str) -> Result<FamilyInfo> {
    let mut info = FamilyInfo {
        name: name.to_string(),
        ..Default::default()
    };
    let mut id: Option<u16> = None;

    for (attr_type, payload) in AttrIter::new(data) {
        match attr_type {
            t if t == CtrlAttr::FamilyId as u16 => {
                id = Some(get::u16_ne(payload)?);
            }
            t if t == CtrlAttr::FamilyName as u16 => {
                info.name = get::string(payload)?.to_string();
            }
            t if t == CtrlAttr::Version as u16 => {
                info.version = get::u32_ne(payload)? as u8;
            }
            t if t == CtrlAttr::HdrSize as u16 => {
                info.hdr_size = get::u32_ne(payload)?;
            }
            t if t == CtrlAttr::MaxAttr as u16 => {
                info.max_attr = get::u32_ne(payload)?;
            }
            t if t == CtrlAttr::McastGroups as u16 => {
                info.mcast_groups = parse_mcast_groups(payload)?;
            }
            _ => {}
        }
    }

    info.id = id.ok_or_else(|| Error::InvalidMessage("missing family ID".into()))?;
    Ok(info)
}

/// Parse multicast groups from CTRL_ATTR_MCAST_GROUPS.
fn parse_mcast_groups(data: &[u8]) -> Result<HashMap<String, u32>> {
    let mut groups = HashMap::new();

    // Nested array: one nest per group, indexed from 1
    for (_group_idx, group_payload) in AttrIter::new(data) {
        let mut name: Option<String> = None;
        let mut grp_id: Option<u32> = None;

        for (attr_type, payload) in AttrIter::new(group_payload) {
            match attr_type {
                t if t == CtrlAttrMcastGrp::Name as u16 => {
                    name = Some(get::string(payload)?.to_string());
                }
                t if t == CtrlAttrMcastGrp::Id as u16 => {
                    grp_id = Some(get::u32_ne(payload)?);
                }
                _ => {}
            }
        }

        if let (Some(name), Some(id)) = (name, grp_id) {
            groups.insert(name, id);
        }
    }

    Ok(groups)
}
