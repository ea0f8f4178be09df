//! ovs-flows show - resolve a datapath identifier.

use clap::Args;
use ovslink::Result;
use ovslink::ovs::{DEFAULT_DATAPATH, Dpif};

#[derive(Args)]
pub struct ShowCmd {
    /// Datapath name or ifindex.
    #[arg(default_value = DEFAULT_DATAPATH)]
    datapath: String,
}

impl ShowCmd {
    pub async fn run(&self) -> Result<()> {
        let dpif = Dpif::open_generic(false).await?;

        let result = dpif.resolve_datapath(&self.datapath).await.map(|dp| {
            println!("{}: ifindex {}", dp.name, dp.handle.id());
        });

        dpif.close()?;
        result
    }
}
