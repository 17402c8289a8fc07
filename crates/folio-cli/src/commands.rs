use std::sync::Arc;

use anyhow::{bail, ensure, Context};
use colored::Colorize;
use folio_crypto::{KeyPair, SignatureProvider};
use folio_ledger::{
    CryptoProviders, EntrySignature, InMemoryRepository, Ledger, LedgerReader, LedgerSummary,
    LedgerWriter, Receipt, SystemIdentity,
};
use folio_types::{Digest, EntryId};
use folio_warden::{LedgerWarden, WardenReport, WardenSchedule};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::*;
use crate::config::FolioConfig;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Demo(args) => cmd_demo(args, cli.format),
        Command::Audit(args) => cmd_audit(args, cli.format),
        Command::Watch(args) => cmd_watch(args, cli.format).await,
        Command::Keygen(args) => cmd_keygen(args, cli.format),
        Command::Hash(args) => cmd_hash(args, cli.format),
    }
}

// -- Demo ledgers --

/// Ledgers built by [`build_demo`], all writing through to one repository.
struct DemoRun {
    config: FolioConfig,
    repository: Arc<InMemoryRepository>,
    providers: CryptoProviders,
    ledgers: Vec<Ledger>,
}

/// Open every configured ledger, then have `senders` parties countersign
/// `entries` entries in each.
fn build_demo(options: &DemoOptions) -> anyhow::Result<DemoRun> {
    ensure!(options.senders >= 1, "--senders must be at least 1");
    let config = FolioConfig::load(options.config.as_deref())?;

    let providers = CryptoProviders::standard();
    let signer: &dyn SignatureProvider = providers.signer();
    let identity = Arc::new(SystemIdentity::generate(SystemIdentity::DEFAULT_ID, signer)?);
    let repository = Arc::new(InMemoryRepository::new());

    let parties = (1..=options.senders)
        .map(|n| {
            let key_pair = signer.generate_key_pair(signer.default_algorithm())?;
            Ok((format!("signer-{n}"), key_pair))
        })
        .collect::<anyhow::Result<Vec<(String, KeyPair)>>>()?;
    let sender_ids: Vec<String> = parties.iter().map(|(id, _)| id.clone()).collect();

    let mut ledgers = Vec::with_capacity(config.ledgers.len());
    for ledger_config in &config.ledgers {
        let ledger = Ledger::new(ledger_config.clone(), providers.clone(), Arc::clone(&identity))?
            .attach_repository(repository.clone())?;
        ledger.append_system_entry(format!("ledger {} opened", ledger.name()), vec![])?;

        let mut previous: Option<EntryId> = None;
        for n in 1..=options.entries {
            let related: Vec<EntryId> = previous.into_iter().collect();
            let entry = ledger.create_entry(
                format!("{} record #{n}", ledger.name()),
                sender_ids.clone(),
                vec!["auditor".to_string()],
                &related,
                &[format!("batch-{}", (n - 1) / ledger_config.entries_per_page + 1)],
            )?;
            for (id, key_pair) in &parties {
                let signature = EntrySignature::sign(id.as_str(), &entry.hash, key_pair, signer)?;
                ledger.add_signature(entry.id, signature)?;
            }
            previous = Some(entry.id);
        }

        let summary = ledger.summary()?;
        info!(
            ledger = %summary.name,
            pages = summary.page_count,
            verified = summary.verified,
            "demo ledger ready"
        );
        ledgers.push(ledger);
    }

    Ok(DemoRun {
        config,
        repository,
        providers,
        ledgers,
    })
}

#[derive(Serialize)]
struct PageView {
    number: u64,
    timestamp: String,
    entries: usize,
    merkle_root: String,
    hash: String,
}

#[derive(Serialize)]
struct LedgerView {
    summary: LedgerSummary,
    pages: Vec<PageView>,
}

#[derive(Serialize)]
struct ReceiptView {
    receipt: Receipt,
    valid: bool,
}

#[derive(Serialize)]
struct DemoView {
    ledgers: Vec<LedgerView>,
    receipt: Option<ReceiptView>,
}

fn demo_view(run: &DemoRun) -> anyhow::Result<DemoView> {
    let mut ledgers = Vec::with_capacity(run.ledgers.len());
    for ledger in &run.ledgers {
        let pages = ledger
            .pages()?
            .iter()
            .map(|page| PageView {
                number: page.number,
                timestamp: page.timestamp.to_string(),
                entries: page.entries.len(),
                merkle_root: page.merkle_root.to_hex(),
                hash: page.hash.to_hex(),
            })
            .collect();
        ledgers.push(LedgerView {
            summary: ledger.summary()?,
            pages,
        });
    }

    // Receipt for the newest sealed entry of the first ledger.
    let mut receipt = None;
    if let Some(ledger) = run.ledgers.first() {
        let pages = ledger.pages()?;
        if let Some(entry) = pages.last().and_then(|page| page.entries.last()) {
            let issued = ledger.issue_receipt(entry.id, "auditor")?;
            let valid = ledger.verify_receipt(&issued);
            receipt = Some(ReceiptView {
                receipt: issued,
                valid,
            });
        }
    }

    Ok(DemoView { ledgers, receipt })
}

fn cmd_demo(args: DemoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let run = build_demo(&args.demo)?;
    let view = demo_view(&run)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    for ledger in &view.ledgers {
        let s = &ledger.summary;
        println!(
            "{} Ledger {} ({} per page, {})",
            "✓".green().bold(),
            s.name.cyan(),
            s.entries_per_page,
            s.hash_algorithm
        );
        for page in &ledger.pages {
            println!(
                "  page {:>3}  {} entries  root {}  hash {}",
                page.number,
                page.entries,
                short(&page.merkle_root).dimmed(),
                short(&page.hash)
            );
        }
        if s.verified > 0 || s.pending > 0 {
            println!(
                "  {} verified awaiting seal, {} pending signatures",
                s.verified.to_string().yellow(),
                s.pending.to_string().yellow()
            );
        }
    }

    match &view.receipt {
        Some(r) => {
            let mark = if r.valid { "✓".green().bold() } else { "✗".red().bold() };
            println!(
                "{} Receipt for entry {} on page {} ({} proof steps)",
                mark,
                r.receipt.entry.id.short_id(),
                r.receipt.page_number,
                r.receipt.proof.path.len()
            );
        }
        None => println!("{}", "No sealed pages yet; raise --entries to fill one".yellow()),
    }
    Ok(())
}

// -- Audit --

fn cmd_audit(args: AuditArgs, format: OutputFormat) -> anyhow::Result<()> {
    let run = build_demo(&args.demo)?;

    if let Some(target) = args.tamper {
        let ledger = run
            .ledgers
            .first()
            .map(|l| l.name().to_string())
            .context("no ledgers configured")?;
        let page = inject_tamper(&run.repository, &ledger, target)?;
        if format == OutputFormat::Text {
            println!(
                "{} Tampered {:?} on page {} of {}",
                "!".yellow().bold(),
                target,
                page,
                ledger.cyan()
            );
        }
    }

    let warden = LedgerWarden::new(run.repository.clone(), run.providers.clone());
    let reports = warden.validate_all()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    let flagged = reports.iter().filter(|r| !r.is_ok()).count();
    if flagged > 0 {
        bail!("{flagged} ledger(s) failed audit");
    }
    Ok(())
}

/// Corrupt one stored field through the repository's tamper hook, bypassing
/// every ledger invariant. Returns the page number touched.
fn inject_tamper(
    repository: &InMemoryRepository,
    ledger: &str,
    target: TamperTarget,
) -> anyhow::Result<u64> {
    let count = repository.page_count(ledger)?;
    ensure!(count > 0, "ledger {ledger} has no sealed pages to tamper with");
    let number = match target {
        TamperTarget::PreviousHash => {
            ensure!(count > 1, "ledger {ledger} needs two sealed pages to break the chain");
            1
        }
        _ => 0,
    };
    let mut page = repository
        .read_page(ledger, number)?
        .with_context(|| format!("page {number} of {ledger} is missing"))?;

    match target {
        TamperTarget::PageHash => page.hash = flip_digest(&page.hash),
        TamperTarget::MerkleRoot => page.merkle_root = flip_digest(&page.merkle_root),
        TamperTarget::PreviousHash => {
            page.previous_hash = page.previous_hash.as_ref().map(flip_digest)
        }
        TamperTarget::EntryHash | TamperTarget::Content | TamperTarget::Signature => {
            let entry = page.entries.first_mut().context("page has no entries")?;
            match target {
                TamperTarget::EntryHash => entry.hash = flip_digest(&entry.hash),
                TamperTarget::Content => entry.content.push_str(" (amended)"),
                _ => {
                    let signature = entry
                        .signatures
                        .first_mut()
                        .context("entry has no signatures")?;
                    signature.signature = flip_hex(&signature.signature);
                }
            }
        }
    }

    repository.update_page_for_tamper_evidence_testing(&page)?;
    debug!(ledger, page = number, ?target, "tamper injected");
    Ok(number)
}

fn flip_digest(digest: &Digest) -> Digest {
    let mut bytes = digest.as_bytes().to_vec();
    if let Some(first) = bytes.first_mut() {
        *first ^= 0xff;
    }
    Digest::from_bytes(bytes)
}

/// Change the first hex digit, keeping the string valid hex.
fn flip_hex(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some('0') => format!("1{}", chars.as_str()),
        Some(_) => format!("0{}", chars.as_str()),
        None => "00".to_string(),
    }
}

fn print_report(report: &WardenReport) {
    let range = match (report.first_page, report.last_page) {
        (Some(first), Some(last)) => format!("pages {first}..={last}"),
        _ => "no pages".to_string(),
    };
    if report.is_ok() {
        println!("{} {} {}", "✓".green().bold(), report.ledger.cyan(), range.dimmed());
    } else if let Some(ctx) = &report.context {
        println!(
            "{} {} {}: {}",
            "✗".red().bold(),
            report.ledger.cyan(),
            report.result.to_string().red(),
            ctx.message
        );
    } else {
        println!(
            "{} {} {}: {}",
            "✗".red().bold(),
            report.ledger.cyan(),
            report.result.to_string().red(),
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
}

// -- Watch --

async fn cmd_watch(args: WatchArgs, format: OutputFormat) -> anyhow::Result<()> {
    let run = build_demo(&args.demo)?;
    let mut warden_config = run.config.warden.clone();
    if let Some(interval_ms) = args.interval_ms {
        warden_config.interval_ms = interval_ms;
    }

    let warden = Arc::new(LedgerWarden::new(run.repository.clone(), run.providers.clone()));
    let schedule = WardenSchedule::spawn(warden, warden_config.clone())?;
    let mut rounds = schedule.rounds();

    if format == OutputFormat::Text {
        println!(
            "{} Auditing every {} ms ({} rounds, ctrl-c to stop)",
            "▶".cyan().bold(),
            warden_config.interval_ms,
            args.ticks
        );
    }

    let mut seen = 0;
    while seen < args.ticks {
        tokio::select! {
            changed = rounds.changed() => {
                changed.context("warden schedule stopped unexpectedly")?;
                let round = rounds.borrow_and_update().clone();
                seen += 1;
                if format == OutputFormat::Json {
                    println!(
                        "{}",
                        serde_json::json!({ "round": round.round, "reports": round.reports })
                    );
                } else {
                    println!("{} round {}", "●".cyan(), round.round);
                    for report in &round.reports {
                        print!("  ");
                        print_report(report);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    schedule.shutdown().await?;
    Ok(())
}

// -- Primitives --

fn cmd_keygen(args: KeygenArgs, format: OutputFormat) -> anyhow::Result<()> {
    let providers = CryptoProviders::standard();
    let key_pair = providers.signer().generate_key_pair(&args.algorithm)?;
    let private_hex = hex::encode(key_pair.private_key().as_bytes());

    if format == OutputFormat::Json {
        let out = serde_json::json!({
            "algorithm": key_pair.algorithm(),
            "public_key": key_pair.public_key_hex(),
            "private_key": private_hex,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{} Generated {} key pair", "✓".green().bold(), key_pair.algorithm());
        println!("  public:  {}", key_pair.public_key_hex().cyan());
        println!("  private: {}", private_hex.dimmed());
    }
    Ok(())
}

fn cmd_hash(args: HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    let providers = CryptoProviders::standard();
    let digest = providers.hasher().hash_str(&args.text, &args.algorithm)?;

    if format == OutputFormat::Json {
        let out = serde_json::json!({ "algorithm": args.algorithm, "digest": digest.to_hex() });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}  {}", digest.to_hex(), args.algorithm.dimmed());
    }
    Ok(())
}

fn short(hex: &str) -> &str {
    hex.get(..12).unwrap_or(hex)
}
