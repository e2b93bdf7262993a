//! Command surface (§6.1). One `Commands` variant per verb, flags as struct
//! fields, following the same `clap::Parser`/`Subcommand` decomposition as
//! the pack's other standalone CLI crates.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gemsieve", about = "Mines a mailbox for commercial opportunities")]
pub struct Cli {
    /// Overrides $GEMSIEVE_CONFIG / ./config.yaml / the user config dir.
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull new messages and recompute touched threads.
    Ingest {
        #[arg(long)]
        query: Option<String>,
        /// Ignore the stored history cursor and do a full scan.
        #[arg(long)]
        sync: bool,
        /// Accepted for interface parity; upserts are already append-safe.
        #[arg(long)]
        append: bool,
    },
    /// Run one analysis stage over whatever it's still missing rows for.
    Parse {
        #[arg(long)]
        stage: String,
    },
    Classify {
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        retrain: bool,
        #[arg(long)]
        crew: bool,
    },
    Profile,
    Gems {
        #[arg(long)]
        list: bool,
        #[arg(long)]
        top: Option<i64>,
        #[arg(long = "type")]
        gem_type: Option<String>,
        #[arg(long)]
        segment: Option<String>,
        #[arg(long)]
        explain: Option<i64>,
    },
    Override {
        #[arg(long)]
        sender: Option<String>,
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        field: String,
        #[arg(long)]
        value: String,
    },
    Overrides {
        #[arg(long)]
        list: bool,
        #[arg(long)]
        stats: bool,
    },
    Generate {
        #[arg(long)]
        gem: Option<i64>,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(long)]
        top: Option<i64>,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        crew: bool,
    },
    Relationship {
        #[arg(long)]
        sender: String,
        #[arg(long = "type")]
        rel_type: String,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        suppress: bool,
    },
    Relationships {
        #[arg(long)]
        list: bool,
        #[arg(long = "type")]
        rel_type: Option<String>,
        #[arg(long = "auto-detect")]
        auto_detect: bool,
        #[arg(long)]
        apply: bool,
        #[arg(long)]
        import: Option<String>,
    },
    Stats {
        #[arg(long = "by-esp")]
        by_esp: bool,
        #[arg(long = "by-industry")]
        by_industry: bool,
        #[arg(long = "by-segment")]
        by_segment: bool,
        #[arg(long = "gem-summary")]
        gem_summary: bool,
    },
    Export {
        #[arg(long)]
        gems: bool,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        segment: Option<String>,
        #[arg(long)]
        format: Option<String>,
        #[arg(long)]
        output: Option<String>,
    },
    Db {
        #[arg(long)]
        reset: bool,
        #[arg(long)]
        migrate: bool,
        #[arg(long)]
        stats: bool,
    },
    /// Ingest then run every analysis stage in order.
    Run {
        #[arg(long)]
        query: Option<String>,
        #[arg(long = "all-stages")]
        all_stages: bool,
        #[arg(long)]
        crew: bool,
    },
    Web {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        reload: bool,
    },
}
