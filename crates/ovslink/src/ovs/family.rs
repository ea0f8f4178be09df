//! Datapath family resolution.

use super::OvsFamily;
use super::autoload::{MODULE_AUTOLOAD, ModuleAutoload};
use crate::netlink::genl::{FamilyInfo, query_family};
use crate::netlink::{Error, NetlinkSocket, Result};

/// Something that can look up a Generic Netlink family by name.
///
/// Implemented by [`NetlinkSocket`]; lookups must report an unknown family
/// as [`Error::FamilyNotFound`].
#[allow(async_fn_in_trait)]
pub trait FamilyLookup {
    /// Query a family by its registered name.
    async fn lookup_family(&self, name: &str) -> Result<FamilyInfo>;
}

impl FamilyLookup for NetlinkSocket {
    async fn lookup_family(&self, name: &str) -> Result<FamilyInfo> {
        query_family(self, name).await
    }
}

/// Resolve a family, retrying once after the process-wide module autoload.
pub async fn resolve_family<L: FamilyLookup>(lookup: &L, name: &str) -> Result<FamilyInfo> {
    resolve_family_with(lookup, name, &MODULE_AUTOLOAD).await
}

/// Resolve a family using an explicit autoload guard.
///
/// Only [`Error::FamilyNotFound`] triggers the autoload and the retry; every
/// other error is returned from the first attempt unchanged. If the family
/// is still unknown after the retry, fails with [`Error::FamilyUnavailable`].
pub async fn resolve_family_with<L: FamilyLookup>(
    lookup: &L,
    name: &str,
    autoload: &ModuleAutoload,
) -> Result<FamilyInfo> {
    match lookup.lookup_family(name).await {
        Err(e) if e.is_family_not_found() => {}
        other => return other,
    }

    tracing::debug!(family = name, "family not registered, trying module autoload");
    autoload.trigger_in_runtime();

    match lookup.lookup_family(name).await {
        Err(e) if e.is_family_not_found() => Err(Error::FamilyUnavailable {
            name: name.to_string(),
        }),
        other => other,
    }
}

/// Resolved metadata for the four datapath families.
///
/// Either all four are resolved or construction fails; the set never
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Families {
    pub datapath: FamilyInfo,
    pub vport: FamilyInfo,
    pub flow: FamilyInfo,
    pub packet: FamilyInfo,
}

impl Families {
    /// Resolve all four families in order, using the process-wide guard.
    pub async fn resolve<L: FamilyLookup>(lookup: &L) -> Result<Self> {
        Self::resolve_with(lookup, &MODULE_AUTOLOAD).await
    }

    /// Resolve all four families in order with an explicit autoload guard.
    pub async fn resolve_with<L: FamilyLookup>(
        lookup: &L,
        autoload: &ModuleAutoload,
    ) -> Result<Self> {
        let families = Self {
            datapath: resolve_family_with(lookup, OvsFamily::Datapath.name(), autoload).await?,
            vport: resolve_family_with(lookup, OvsFamily::Vport.name(), autoload).await?,
            flow: resolve_family_with(lookup, OvsFamily::Flow.name(), autoload).await?,
            packet: resolve_family_with(lookup, OvsFamily::Packet.name(), autoload).await?,
        };

        tracing::debug!(
            datapath = families.datapath.id,
            vport = families.vport.id,
            flow = families.flow.id,
            packet = families.packet.id,
            "resolved datapath families"
        );

        Ok(families)
    }

    /// Metadata for one family.
    pub fn get(&self, family: OvsFamily) -> &FamilyInfo {
        match family {
            OvsFamily::Datapath => &self.datapath,
            OvsFamily::Vport => &self.vport,
            OvsFamily::Flow => &self.flow,
            OvsFamily::Packet => &self.packet,
        }
    }

    /// Iterate over all families in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (OvsFamily, &FamilyInfo)> {
        OvsFamily::ALL.into_iter().map(|f| (f, self.get(f)))
    }

    /// Look up a multicast group registered by `family`.
    pub fn mcast_group(&self, family: OvsFamily, group: &str) -> Result<u32> {
        self.get(family)
            .mcast_groups
            .get(group)
            .copied()
            .ok_or_else(|| Error::NoSuchGroup {
                group: group.to_string(),
                family: family.name().to_string(),
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub(crate) fn family(name: &str, id: u16) -> FamilyInfo {
        FamilyInfo {
            name: name.to_string(),
            id,
            version: 1,
            ..Default::default()
        }
    }

    pub(crate) fn test_families() -> Families {
        let mut flow = family("ovs_flow", 22);
        flow.mcast_groups = HashMap::from([("ovs_flow".to_string(), 5)]);
        Families {
            datapath: family("ovs_datapath", 20),
            vport: family("ovs_vport", 21),
            flow,
            packet: family("ovs_packet", 23),
        }
    }

    /// Answers from a fixed table, optionally only once `loaded` is set.
    struct FakeLookup {
        loaded: &'static AtomicBool,
        fail_with_errno: Option<i32>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeLookup {
        fn new(loaded: &'static AtomicBool) -> Self {
            Self {
                loaded,
                fail_with_errno: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl FamilyLookup for FakeLookup {
        async fn lookup_family(&self, name: &str) -> Result<FamilyInfo> {
            self.calls.lock().unwrap().push(name.to_string());
            if let Some(errno) = self.fail_with_errno {
                return Err(Error::from_errno(-errno));
            }
            let families = test_families();
            match families.iter().find(|(f, _)| f.name() == name) {
                Some((_, info)) if self.loaded.load(Ordering::SeqCst) => Ok(info.clone()),
                _ => Err(Error::FamilyNotFound {
                    name: name.to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_unknown_family_probes_once_then_unavailable() {
        static LOADED: AtomicBool = AtomicBool::new(false);
        static PROBES: AtomicUsize = AtomicUsize::new(0);
        fn probe() {
            PROBES.fetch_add(1, Ordering::SeqCst);
        }
        static AUTOLOAD: ModuleAutoload = ModuleAutoload::new(probe);

        let lookup = FakeLookup::new(&LOADED);
        for name in ["ovs_datapath", "ovs_vport", "no_such_family"] {
            let err = resolve_family_with(&lookup, name, &AUTOLOAD)
                .await
                .unwrap_err();
            assert!(err.is_family_unavailable(), "{err}");
        }

        assert_eq!(PROBES.load(Ordering::SeqCst), 1);
        // one attempt plus one retry per name
        assert_eq!(lookup.calls().len(), 6);
    }

    #[tokio::test]
    async fn test_autoload_makes_family_available() {
        static LOADED: AtomicBool = AtomicBool::new(false);
        fn load() {
            LOADED.store(true, Ordering::SeqCst);
        }
        static AUTOLOAD: ModuleAutoload = ModuleAutoload::new(load);

        let lookup = FakeLookup::new(&LOADED);
        let families = Families::resolve_with(&lookup, &AUTOLOAD).await.unwrap();

        assert_eq!(families, test_families());
        assert!(AUTOLOAD.attempted());
        assert_eq!(
            lookup.calls(),
            ["ovs_datapath", "ovs_datapath", "ovs_vport", "ovs_flow", "ovs_packet"]
        );
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        static LOADED: AtomicBool = AtomicBool::new(true);
        fn probe() {}
        static AUTOLOAD: ModuleAutoload = ModuleAutoload::new(probe);

        let mut lookup = FakeLookup::new(&LOADED);
        lookup.fail_with_errno = Some(libc::EPERM);

        let err = Families::resolve_with(&lookup, &AUTOLOAD).await.unwrap_err();
        assert!(err.is_permission_denied());
        assert!(!AUTOLOAD.attempted());
        assert_eq!(lookup.calls(), ["ovs_datapath"]);
    }

    #[test]
    fn test_mcast_group() {
        let families = test_families();
        assert_eq!(families.mcast_group(OvsFamily::Flow, "ovs_flow").unwrap(), 5);

        let err = families
            .mcast_group(OvsFamily::Datapath, "ovs_flow")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NoSuchGroup { ref group, ref family }
                if group == "ovs_flow" && family == "ovs_datapath"
        ));
    }

    #[test]
    fn test_get_matches_iter_order() {
        let families = test_families();
        let ids: Vec<_> = families.iter().map(|(_, info)| info.id).collect();
        assert_eq!(ids, [20, 21, 22, 23]);
    }
}
