//! ovs-flows families - show the resolved datapath families.

use clap::Args;
use ovslink::Result;
use ovslink::ovs::Dpif;

#[derive(Args)]
pub struct FamiliesCmd {
    /// Also list multicast groups.
    #[arg(short = 'g', long)]
    groups: bool,
}

impl FamiliesCmd {
    pub async fn run(&self) -> Result<()> {
        let dpif = Dpif::open_generic(false).await?;
        let families = dpif.families();
        dpif.close()?;

        println!("{:<14} {:>5} {:>8} {:>9}", "FAMILY", "ID", "VERSION", "MAXATTR");
        for (family, info) in families.iter() {
            println!(
                "{:<14} {:>5} {:>8} {:>9}",
                family, info.id, info.version, info.max_attr
            );

            if self.groups {
                let mut groups: Vec<_> = info.mcast_groups.iter().collect();
                groups.sort();
                for (name, id) in groups {
                    println!("    group {} id {}", name, id);
                }
            }
        }

        Ok(())
    }
}
