//! Flow following and teardown tests.

use std::time::Duration;

use ovslink::Result;
use ovslink::ovs::{DEFAULT_DATAPATH, Dpif, FollowConfig, follow_flows_with, follow_ovs_flows};

use crate::common::{TestDatapath, datapath_exists};

#[tokio::test]
async fn test_follow_and_stop() -> Result<()> {
    require_openvswitch!();
    if !datapath_exists(DEFAULT_DATAPATH) {
        eprintln!("Skipping test: no {DEFAULT_DATAPATH} datapath");
        return Ok(());
    }

    let (mut events, monitor) = follow_ovs_flows().await?;
    monitor.stop().await?;
    monitor.stop().await?;
    assert!(events.recv().await.is_none());

    // Nothing leaked: a fresh session opens and closes cleanly
    let dpif = Dpif::open_generic(true).await?;
    dpif.close()
}

#[tokio::test]
async fn test_follow_test_datapath() -> Result<()> {
    require_dpctl!();

    let dp = TestDatapath::new("olt")?;
    let config = FollowConfig::default().datapath(dp.name()).channel_capacity(16);
    let (mut events, monitor) = follow_flows_with(&config).await?;

    // A fresh datapath has no flows and nothing installs any
    let quiet = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
    assert!(quiet.is_err());

    monitor.stop().await?;
    assert!(events.recv().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_follow_missing_datapath() -> Result<()> {
    require_openvswitch!();

    let config = FollowConfig::default().datapath("ovslink-missing");
    let err = follow_flows_with(&config).await.unwrap_err();
    assert!(err.is_no_such_datapath(), "{err}");
    assert!(!datapath_exists("ovslink-missing"));

    // The failed attempt closed its session
    let dpif = Dpif::open_generic(true).await?;
    dpif.close()
}
