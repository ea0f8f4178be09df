//! ovs-flows follow - print flow-table changes as they happen.

use clap::Args;
use ovslink::Result;
use ovslink::ovs::{
    DEFAULT_CHANNEL_CAPACITY, DEFAULT_DATAPATH, FlowInfo, FollowConfig, follow_flows_with,
};
use tokio_stream::StreamExt;

#[derive(Args)]
pub struct FollowCmd {
    /// Datapath name or ifindex.
    #[arg(short = 'd', long, default_value = DEFAULT_DATAPATH)]
    datapath: String,

    /// Number of undelivered events to buffer.
    #[arg(short = 'c', long, default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    capacity: usize,

    /// Exit after this many events.
    #[arg(short = 'n', long)]
    count: Option<usize>,
}

impl FollowCmd {
    pub async fn run(&self) -> Result<()> {
        let config = FollowConfig::default()
            .datapath(self.datapath.as_str())
            .channel_capacity(self.capacity);

        let (mut events, monitor) = follow_flows_with(&config).await?;
        eprintln!(
            "Following flows in {} (Ctrl+C to stop)...",
            config.datapath
        );

        let mut seen = 0;
        // The reader reports a fatal receive error as its last item
        let mut last_error = None;
        let result = loop {
            if self.count.is_some_and(|n| seen >= n) {
                break Ok(());
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => break Ok(()),
                event = events.next() => match event {
                    Some(Ok(flow)) => {
                        println!("{}", format_flow(&flow));
                        seen += 1;
                        last_error = None;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("{}", e);
                        last_error = (!e.is_overrun()).then_some(e);
                    }
                    None => break last_error.map_or(Ok(()), Err),
                },
            }
        };

        monitor.stop().await?;
        result
    }
}

fn format_flow(flow: &FlowInfo) -> String {
    let mut line = format!("{} dp {}", flow.kind, flow.datapath);

    if let Some(ufid) = &flow.ufid {
        line.push_str(" ufid ");
        line.push_str(&hex(ufid));
    }
    if let Some(stats) = flow.stats {
        line.push_str(&format!(" packets {} bytes {}", stats.packets, stats.bytes));
    }
    if let Some(used) = flow.used {
        line.push_str(&format!(" used {}ms", used));
    }
    if let Some(flags) = flow.tcp_flags {
        line.push_str(&format!(" tcp_flags 0x{:02x}", flags));
    }
    line.push_str(&format!(" key {} attrs", flow.key_attrs().count()));

    line
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovslink::ovs::{DatapathId, FlowChange, FlowStats};

    #[test]
    fn test_format_flow() {
        let flow = FlowInfo {
            kind: FlowChange::Deleted,
            datapath: DatapathId(3),
            key: Vec::new(),
            mask: None,
            actions: None,
            ufid: Some(vec![0xde, 0xad]),
            stats: Some(FlowStats {
                packets: 2,
                bytes: 128,
            }),
            tcp_flags: Some(0x10),
            used: None,
        };

        assert_eq!(
            format_flow(&flow),
            "deleted dp 3 ufid dead packets 2 bytes 128 tcp_flags 0x10 key 0 attrs"
        );
    }
}
