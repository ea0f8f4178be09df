//! Datapath lookup and identifier resolution tests.

use ovslink::Result;
use ovslink::ovs::{DatapathId, Dpif};

use crate::common::TestDatapath;

#[tokio::test]
async fn test_lookup_by_name_and_id() -> Result<()> {
    require_dpctl!();

    let dp = TestDatapath::new("olt")?;
    let ifindex = dp.ifindex()?;
    let dpif = Dpif::open_generic(false).await?;

    let handle = dpif.lookup_datapath(dp.name()).await?;
    assert_eq!(handle.id(), DatapathId(ifindex));

    let found = dpif.lookup_datapath_by_id(DatapathId(ifindex)).await?;
    assert_eq!(found.name, dp.name());
    assert_eq!(found.handle.id(), handle.id());

    dpif.close()
}

#[tokio::test]
async fn test_resolve_numeric_identifier() -> Result<()> {
    require_dpctl!();

    let dp = TestDatapath::new("olt")?;
    let ifindex = dp.ifindex()?;
    let dpif = Dpif::open_generic(false).await?;

    let resolved = dpif.resolve_datapath(&ifindex.to_string()).await?;
    assert_eq!(resolved.name, dp.name());
    assert_eq!(resolved.handle.id(), DatapathId(ifindex));

    dpif.close()
}

#[tokio::test]
async fn test_resolve_missing_datapath() -> Result<()> {
    require_openvswitch!();

    let dpif = Dpif::open_generic(false).await?;

    let err = dpif.lookup_datapath("ovslink-missing").await.unwrap_err();
    assert!(err.is_no_such_datapath(), "{err}");

    let err = dpif.resolve_datapath("nonexistent").await.unwrap_err();
    assert!(err.is_no_such_datapath());
    assert_eq!(err.to_string(), "cannot find datapath \"nonexistent\"");

    dpif.close()
}
