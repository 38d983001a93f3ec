#![forbid(unsafe_code)]

mod store_inspect;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "xtask")]
#[command(about = "Project automation tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print object-store statistics (entry count, total size).
    StoreStats(store_inspect::StatsArgs),
    /// List every object in the store.
    StoreList(store_inspect::ListArgs),
    /// Dump one stored object's bytes to stdout or a file.
    StoreDump(store_inspect::DumpArgs),
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::StoreStats(args) => match store_inspect::stats(args) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("{err}");
                1
            }
        },
        Command::StoreList(args) => match store_inspect::list(args) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("{err}");
                1
            }
        },
        Command::StoreDump(args) => match store_inspect::dump(args) {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("{err}");
                1
            }
        },
    };

    std::process::exit(exit_code);
}
