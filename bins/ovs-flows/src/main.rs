//! ovs-flows command - inspect Open vSwitch datapaths and follow flow changes.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ovs-flows", version, about = "Open vSwitch datapath flow monitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the datapath generic netlink families.
    #[command(visible_alias = "fam")]
    Families(commands::families::FamiliesCmd),

    /// Show a datapath, by name or ifindex.
    #[command(visible_alias = "s")]
    Show(commands::show::ShowCmd),

    /// Follow flow-table changes in a datapath.
    #[command(visible_alias = "f")]
    Follow(commands::follow::FollowCmd),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Families(cmd) => cmd.run().await,
        Command::Show(cmd) => cmd.run().await,
        Command::Follow(cmd) => cmd.run().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if e.is_permission_denied() {
            eprintln!("Datapath control needs CAP_NET_ADMIN; try running as root.");
        }
        std::process::exit(1);
    }

    Ok(())
}
