use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio: a tamper-evident, multiply-signed ledger",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the configured ledgers, countersign entries, seal pages, issue a receipt
    Demo(DemoArgs),
    /// Run the demo, optionally tamper with one stored field, then audit
    Audit(AuditArgs),
    /// Run the periodic warden over the demo ledgers
    Watch(WatchArgs),
    /// Generate a signing key pair
    Keygen(KeygenArgs),
    /// Hash a string with a named algorithm
    Hash(HashArgs),
}

/// Options shared by every command that builds demo ledgers.
#[derive(Args, Clone, Debug)]
pub struct DemoOptions {
    /// TOML file with `[[ledgers]]` and `[warden]` sections
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Entries written to each ledger, after its opening system entry
    #[arg(long, default_value = "16")]
    pub entries: usize,
    /// Senders who must countersign every entry
    #[arg(long, default_value = "2")]
    pub senders: usize,
}

#[derive(Args)]
pub struct DemoArgs {
    #[command(flatten)]
    pub demo: DemoOptions,
}

#[derive(Args)]
pub struct AuditArgs {
    #[command(flatten)]
    pub demo: DemoOptions,
    /// Stored field to corrupt before auditing
    #[arg(long)]
    pub tamper: Option<TamperTarget>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum TamperTarget {
    PageHash,
    MerkleRoot,
    PreviousHash,
    EntryHash,
    Content,
    Signature,
}

#[derive(Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub demo: DemoOptions,
    /// Audit rounds to observe before stopping
    #[arg(long, default_value = "3")]
    pub ticks: u64,
    /// Override the configured audit interval
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

#[derive(Args)]
pub struct KeygenArgs {
    #[arg(long, default_value = "Ed25519")]
    pub algorithm: String,
}

#[derive(Args)]
pub struct HashArgs {
    pub text: String,
    #[arg(long, default_value = "BLAKE3")]
    pub algorithm: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_demo_defaults() {
        let cli = Cli::try_parse_from(["folio", "demo"]).unwrap();
        if let Command::Demo(args) = cli.command {
            assert_eq!(args.demo.entries, 16);
            assert_eq!(args.demo.senders, 2);
            assert!(args.demo.config.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_demo_with_config() {
        let cli = Cli::try_parse_from([
            "folio", "demo", "-c", "folio.toml", "--entries", "9", "--senders", "3",
        ])
        .unwrap();
        if let Command::Demo(args) = cli.command {
            assert_eq!(args.demo.config, Some(PathBuf::from("folio.toml")));
            assert_eq!(args.demo.entries, 9);
            assert_eq!(args.demo.senders, 3);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_audit_tamper() {
        let cli = Cli::try_parse_from(["folio", "audit", "--tamper", "merkle-root"]).unwrap();
        if let Command::Audit(args) = cli.command {
            assert_eq!(args.tamper, Some(TamperTarget::MerkleRoot));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_audit_rejects_unknown_target() {
        assert!(Cli::try_parse_from(["folio", "audit", "--tamper", "everything"]).is_err());
    }

    #[test]
    fn parse_watch() {
        let cli = Cli::try_parse_from(["folio", "watch", "--ticks", "2", "--interval-ms", "50"])
            .unwrap();
        if let Command::Watch(args) = cli.command {
            assert_eq!(args.ticks, 2);
            assert_eq!(args.interval_ms, Some(50));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_keygen_default_algorithm() {
        let cli = Cli::try_parse_from(["folio", "keygen"]).unwrap();
        if let Command::Keygen(args) = cli.command {
            assert_eq!(args.algorithm, "Ed25519");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_hash() {
        let cli = Cli::try_parse_from(["folio", "hash", "hello", "--algorithm", "SHA-256"]).unwrap();
        if let Command::Hash(args) = cli.command {
            assert_eq!(args.text, "hello");
            assert_eq!(args.algorithm, "SHA-256");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from(["folio", "--verbose", "--format", "json", "keygen"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
