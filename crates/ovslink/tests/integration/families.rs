//! Family resolution and session lifecycle tests.

use ovslink::Result;
use ovslink::ovs::{Dpif, MODULE_AUTOLOAD, OVS_FLOW_MCGROUP, OvsFamily, resolve_family};
use ovslink::{Error, netlink::NetlinkSocket, netlink::Protocol};

#[tokio::test]
async fn test_open_resolves_all_families() -> Result<()> {
    require_openvswitch!();

    let dpif = Dpif::open_generic(false).await?;
    let families = dpif.families();

    for (family, info) in families.iter() {
        assert_eq!(info.name, family.name());
        assert_ne!(info.id, 0);
    }
    assert!(families.mcast_group(OvsFamily::Flow, OVS_FLOW_MCGROUP).is_ok());

    dpif.close()
}

#[tokio::test]
async fn test_reopen_reuses_families() -> Result<()> {
    require_openvswitch!();

    let dpif = Dpif::open_generic(false).await?;
    let reopened = dpif.reopen()?;

    assert_eq!(reopened.families(), dpif.families());
    assert_ne!(reopened.socket().pid(), dpif.socket().pid());

    // Independent sessions: closing one leaves the other usable
    dpif.close()?;
    assert!(reopened.lookup_datapath("ovslink-no-such-dp").await.is_err());
    reopened.close()
}

#[tokio::test]
async fn test_unknown_family_is_unavailable() -> Result<()> {
    require_openvswitch!();

    let socket = NetlinkSocket::new(Protocol::Generic)?;
    let err = resolve_family(&socket, "ovslink_no_such_family")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FamilyUnavailable { .. }), "{err}");
    assert!(MODULE_AUTOLOAD.attempted());

    socket.close()
}

#[tokio::test]
async fn test_join_and_leave_flow_group() -> Result<()> {
    require_openvswitch!();

    let mut dpif = Dpif::open_generic(true).await?;
    dpif.set_group_membership(OvsFamily::Flow, OVS_FLOW_MCGROUP, false)?;

    let err = dpif
        .set_group_membership(OvsFamily::Packet, OVS_FLOW_MCGROUP, true)
        .unwrap_err();
    assert!(matches!(err, Error::NoSuchGroup { .. }));

    dpif.close()
}
