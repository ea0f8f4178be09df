//! The datapath-family header and request/reply framing.
//!
//! Every datapath-family message carries `struct ovs_header` right after the
//! GENL header:
//!
//! ```text
//! nlmsghdr | genlmsghdr | ovs_header { dp_ifindex: i32 } | attributes
//! ```

use std::mem;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::family::Families;
use super::{DatapathId, OvsFamily};
use crate::netlink::genl::GenlMsgHdr;
use crate::netlink::message::NLMSG_ALIGNTO;
use crate::netlink::{Error, MessageBuilder, MessageParser, Result};

/// Datapath header (mirrors struct ovs_header).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct OvsHeader {
    /// Datapath ifindex, or 0 when addressing a datapath by name.
    pub dp_ifindex: i32,
}

/// Size of the datapath header in bytes.
pub const OVS_HEADER_LEN: usize = mem::size_of::<OvsHeader>();

impl OvsHeader {
    /// Header addressing datapath `id`.
    pub fn new(id: DatapathId) -> Self {
        // The kernel field is signed; ids travel bit-for-bit.
        Self {
            dp_ifindex: id.0 as i32,
        }
    }

    /// Datapath this header addresses.
    pub fn datapath_id(&self) -> DatapathId {
        DatapathId(self.dp_ifindex as u32)
    }
}

impl MessageBuilder {
    /// Append a datapath header addressing `id`.
    pub fn put_ovs_header(&mut self, id: DatapathId) {
        let header = OvsHeader::new(id);
        let pos = self.align_grow(NLMSG_ALIGNTO, OVS_HEADER_LEN);
        self.region_mut(pos, OVS_HEADER_LEN)
            .copy_from_slice(header.as_bytes());
    }
}

impl MessageParser<'_> {
    /// Consume a datapath header.
    pub fn take_ovs_header(&mut self) -> Result<OvsHeader> {
        let raw = self.take(NLMSG_ALIGNTO, OVS_HEADER_LEN)?;
        OvsHeader::read_from_prefix(raw)
            .map(|(h, _)| h)
            .map_err(|_| Error::Truncated {
                expected: OVS_HEADER_LEN,
                actual: raw.len(),
            })
    }
}

impl Families {
    /// Start a request to `family` addressing datapath `dp`.
    ///
    /// The returned builder holds the netlink, GENL and datapath headers;
    /// attributes are appended after them.
    pub fn new_request(&self, family: OvsFamily, cmd: u8, flags: u16, dp: DatapathId) -> MessageBuilder {
        let info = self.get(family);
        let mut builder = MessageBuilder::new(info.id, flags);
        builder.append(&GenlMsgHdr::new(cmd, family.version()));
        builder.put_ovs_header(dp);
        builder
    }

    /// Validate a reply from `family` to a `cmd` request.
    ///
    /// Consumes the three headers and leaves `parser` at the attributes.
    /// Families with a legacy reply command also accept that command.
    pub fn check_reply(
        &self,
        parser: &mut MessageParser<'_>,
        family: OvsFamily,
        cmd: u8,
    ) -> Result<(GenlMsgHdr, OvsHeader)> {
        let prefix = |e: Error| match e {
            Error::ProtocolMismatch(msg) => Error::ProtocolMismatch(format!("{family}: {msg}")),
            other => other,
        };

        parser.expect_nlmsghdr(self.get(family).id).map_err(prefix)?;
        let genl = parser
            .check_genlmsghdr(cmd, family.legacy_reply_cmd())
            .map_err(prefix)?;
        let ovs = parser.take_ovs_header()?;

        Ok((genl, ovs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::NLMSG_HDRLEN;
    use crate::netlink::genl::GENL_HDRLEN;
    use crate::netlink::message::NLM_F_REQUEST;
    use crate::ovs::family::tests::test_families;
    use crate::ovs::{OvsDpCmd, OvsFlowCmd, OvsPacketCmd, OvsVportCmd};

    fn reply(families: &Families, family: OvsFamily, cmd: u8, dp: DatapathId) -> Vec<u8> {
        families.new_request(family, cmd, 0, dp).finish()
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(OVS_HEADER_LEN, 4);

        let families = test_families();
        let msg = families
            .new_request(OvsFamily::Datapath, OvsDpCmd::Get as u8, NLM_F_REQUEST, DatapathId(7))
            .finish();

        assert_eq!(msg.len(), NLMSG_HDRLEN + GENL_HDRLEN + OVS_HEADER_LEN);
        assert_eq!(u16::from_ne_bytes([msg[4], msg[5]]), 20);
        // cmd, then the datapath family's version
        assert_eq!(&msg[16..18], &[OvsDpCmd::Get as u8, 2]);
        assert_eq!(&msg[20..24], &7i32.to_ne_bytes());
    }

    #[test]
    fn test_ids_round_trip_bit_for_bit() {
        let families = test_families();
        for id in [0, 42, u32::MAX] {
            let msg = reply(&families, OvsFamily::Vport, 3, DatapathId(id));
            let mut parser = MessageParser::new(&msg);
            let (_, ovs) = families
                .check_reply(&mut parser, OvsFamily::Vport, 3)
                .unwrap();
            assert_eq!(ovs.datapath_id(), DatapathId(id));
        }
        assert_eq!(OvsHeader::new(DatapathId(u32::MAX)).dp_ifindex, -1);
    }

    #[test]
    fn test_legacy_reply_accepted() {
        let families = test_families();
        let msg = reply(&families, OvsFamily::Datapath, OvsDpCmd::New as u8, DatapathId(1));

        let mut parser = MessageParser::new(&msg);
        let (genl, _) = families
            .check_reply(&mut parser, OvsFamily::Datapath, OvsDpCmd::Get as u8)
            .unwrap();
        assert_eq!(genl.cmd, OvsDpCmd::New as u8);
        assert!(parser.remaining().is_empty());
    }

    #[test]
    fn test_legacy_reply_per_family() {
        let families = test_families();
        let cases = [
            (OvsFamily::Vport, OvsVportCmd::New as u8, OvsVportCmd::Get as u8, OvsVportCmd::Set as u8),
            (OvsFamily::Flow, OvsFlowCmd::New as u8, OvsFlowCmd::Get as u8, OvsFlowCmd::Set as u8),
        ];

        for (family, new, get, set) in cases {
            let msg = reply(&families, family, new, DatapathId(1));
            let mut parser = MessageParser::new(&msg);
            assert!(families.check_reply(&mut parser, family, get).is_ok(), "{family}");

            let msg = reply(&families, family, set, DatapathId(1));
            let mut parser = MessageParser::new(&msg);
            assert!(families.check_reply(&mut parser, family, get).is_err(), "{family}");
        }

        let msg = reply(&families, OvsFamily::Packet, OvsPacketCmd::Miss as u8, DatapathId(1));
        let mut parser = MessageParser::new(&msg);
        assert!(
            families
                .check_reply(&mut parser, OvsFamily::Packet, OvsPacketCmd::Action as u8)
                .is_err()
        );
    }

    #[test]
    fn test_garbage_reply_rejected() {
        let families = test_families();
        for buf in [&[][..], &[1, 2, 3][..], &[0xff; 16][..], &[0; 24][..]] {
            let mut parser = MessageParser::new(buf);
            assert!(
                families
                    .check_reply(&mut parser, OvsFamily::Datapath, OvsDpCmd::Get as u8)
                    .is_err(),
                "{buf:?}"
            );
        }
    }

    #[test]
    fn test_unexpected_command_rejected() {
        let families = test_families();
        let msg = reply(&families, OvsFamily::Datapath, OvsDpCmd::Set as u8, DatapathId(1));

        let mut parser = MessageParser::new(&msg);
        let err = families
            .check_reply(&mut parser, OvsFamily::Datapath, OvsDpCmd::Get as u8)
            .unwrap_err();
        assert!(
            matches!(err, Error::ProtocolMismatch(ref msg) if msg.starts_with("ovs_datapath:")),
            "{err}"
        );
    }

    #[test]
    fn test_packet_family_has_no_legacy_tolerance() {
        let families = test_families();
        let msg = reply(&families, OvsFamily::Packet, OvsPacketCmd::Miss as u8, DatapathId(1));

        let mut parser = MessageParser::new(&msg);
        assert!(matches!(
            families.check_reply(&mut parser, OvsFamily::Packet, OvsPacketCmd::Execute as u8),
            Err(Error::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn test_wrong_family_rejected() {
        let families = test_families();
        let msg = reply(&families, OvsFamily::Vport, 3, DatapathId(1));

        let mut parser = MessageParser::new(&msg);
        assert!(matches!(
            families.check_reply(&mut parser, OvsFamily::Flow, 3),
            Err(Error::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn test_truncated_reply() {
        let families = test_families();
        let mut msg = reply(&families, OvsFamily::Flow, 3, DatapathId(1));
        // Drop the datapath header but keep nlmsg_len consistent
        msg.truncate(NLMSG_HDRLEN + GENL_HDRLEN);
        let len = msg.len() as u32;
        msg[0..4].copy_from_slice(&len.to_ne_bytes());

        let mut parser = MessageParser::new(&msg);
        assert!(matches!(
            families.check_reply(&mut parser, OvsFamily::Flow, 3),
            Err(Error::Truncated { .. })
        ));
    }
}
