//! One handler per verb (§6.1), each opening the store/services it needs and
//! printing a short human-readable summary to stdout. Every handler returns
//! `AppResult<()>`; `main` maps `Err` to a non-zero exit per the contract.

use crate::cli::args::Commands;
use crate::cli::export;
use crate::config::GemsieveConfig;
use crate::domain::enums::{GemType, OverrideScope, RelationshipType, Stage, TriggeredBy};
use crate::domain::profile::RelationshipSource;
use crate::domain::SenderRelationship;
use crate::error::{AppError, AppResult};
use crate::orchestrator::{Orchestrator, StageOptions};
use crate::pipeline::{classify, content, engage, entities, ingest, metadata, profile};
use crate::provider::mail::FixtureMailProvider;
use crate::services::Services;
use crate::store::Store;
use std::str::FromStr;
use std::sync::Arc;

/// `main`'s real-usage `Services` context always goes through
/// `FixtureMailProvider` — real Gmail/OAuth fetch mechanics are out of scope
/// (§1 Non-goals), so the CLI treats ingestion as driven by whatever
/// fixture/import data already populated the mailbox.
fn build_services(config: GemsieveConfig) -> Services {
    Services::new(config, Arc::new(FixtureMailProvider::new(Vec::new())))
}

fn open_store(config: &GemsieveConfig) -> AppResult<Store> {
    Store::open(&config.storage.sqlite_path)
}

pub async fn dispatch(command: Commands, config: GemsieveConfig) -> AppResult<()> {
    match command {
        Commands::Ingest { query, sync, append: _ } => run_ingest(config, query, sync).await,
        Commands::Parse { stage } => run_parse(config, &stage).await,
        Commands::Classify { model, batch_size: _, retrain, crew } => {
            run_classify(config, model, retrain, crew).await
        }
        Commands::Profile => run_profile(config),
        Commands::Gems { list, top, gem_type, segment, explain } => {
            run_gems(config, list, top, gem_type, segment, explain)
        }
        Commands::Override { sender, message, field, value } => {
            run_override(config, sender, message, field, value)
        }
        Commands::Overrides { list, stats } => run_overrides(config, list, stats),
        Commands::Generate { gem, strategy, top, all, crew } => {
            run_generate(config, gem, strategy, top, all, crew).await
        }
        Commands::Relationship { sender, rel_type, note, suppress } => {
            run_relationship(config, sender, rel_type, note, suppress)
        }
        Commands::Relationships { list, rel_type, auto_detect, apply, import } => {
            run_relationships(config, list, rel_type, auto_detect, apply, import)
        }
        Commands::Stats { by_esp, by_industry, by_segment, gem_summary } => {
            run_stats(config, by_esp, by_industry, by_segment, gem_summary)
        }
        Commands::Export { gems, all, segment, format, output } => {
            run_export(config, gems, all, segment, format, output)
        }
        Commands::Db { reset, migrate, stats } => run_db(config, reset, migrate, stats),
        Commands::Run { query, all_stages, crew } => run_pipeline(config, query, all_stages, crew).await,
        Commands::Web { host, port, reload } => crate::web::serve(config, host, port, reload).await,
    }
}

async fn run_ingest(config: GemsieveConfig, query: Option<String>, sync: bool) -> AppResult<()> {
    let store = open_store(&config)?;
    let query = query.unwrap_or_else(|| config.gmail.default_query.clone());
    let services = build_services(config);
    let report = ingest::run(&services, &store, &query, sync).await?;
    println!(
        "ingested {} messages, recomputed {} threads",
        report.messages_ingested, report.threads_recomputed
    );
    Ok(())
}

async fn run_parse(config: GemsieveConfig, stage: &str) -> AppResult<()> {
    let store = open_store(&config)?;
    let services = build_services(config);
    match stage {
        "metadata" => {
            let report = metadata::run(&services, &store)?;
            println!("metadata: {} processed, {} errors", report.items_processed, report.errors.len());
        }
        "content" => {
            let report = content::run(&services, &store)?;
            println!("content: {} processed, {} errors", report.items_processed, report.errors.len());
        }
        "entities" => {
            let report = entities::run(&services, &store).await?;
            println!("entities: {} processed, {} errors", report.items_processed, report.errors.len());
        }
        other => return Err(AppError::config(format!("unknown --stage {other}"))),
    }
    Ok(())
}

async fn run_classify(
    config: GemsieveConfig,
    model: Option<String>,
    retrain: bool,
    crew: bool,
) -> AppResult<()> {
    let store = open_store(&config)?;
    let model = model.unwrap_or_else(|| format!("{}:{}", config.ai.provider, config.ai.model));
    let services = build_services(config);
    let opts = classify::ClassifyOptions { model, retrain, crew };
    let report = classify::run(&services, &store, &opts).await?;
    println!("classify: {} processed, {} errors", report.items_processed, report.errors.len());
    Ok(())
}

fn run_profile(config: GemsieveConfig) -> AppResult<()> {
    let store = open_store(&config)?;
    let services = build_services(config);
    let report = profile::run(&services, &store)?;
    println!("profile: {} domains processed", report.domains_processed);
    Ok(())
}

fn run_gems(
    config: GemsieveConfig,
    _list: bool,
    top: Option<i64>,
    gem_type: Option<String>,
    segment: Option<String>,
    explain: Option<i64>,
) -> AppResult<()> {
    let store = open_store(&config)?;
    let conn = store.conn.lock().unwrap();

    if let Some(id) = explain {
        let gem = crate::store::gem::get(&conn, id)?
            .ok_or_else(|| AppError::invariant(format!("no gem with id {id}")))?;
        println!("{}", serde_json::to_string_pretty(&gem.explanation)?);
        return Ok(());
    }

    let rows = if let Some(n) = top {
        crate::store::gem::list_top(&conn, n)?
    } else if let Some(t) = &gem_type {
        crate::store::gem::list_by_type(&conn, t)?
    } else if let Some(s) = &segment {
        let domains: Vec<String> = crate::store::segment::list_by_segment(&conn, s)?
            .into_iter()
            .map(|row| row.sender_domain)
            .collect();
        let mut out = Vec::new();
        for domain in domains {
            out.extend(crate::store::gem::list_for_domain(&conn, &domain)?);
        }
        out
    } else {
        crate::store::gem::list_all(&conn)?
    };

    for g in &rows {
        println!(
            "#{} [{}] {} score={:.1} {}",
            g.id, g.gem_type, g.sender_domain, g.score, g.explanation.summary
        );
    }
    println!("{} gem(s)", rows.len());
    Ok(())
}

fn run_override(
    config: GemsieveConfig,
    sender: Option<String>,
    message: Option<String>,
    field: String,
    value: String,
) -> AppResult<()> {
    let store = open_store(&config)?;
    let conn = store.conn.lock().unwrap();

    let (scope, sender_domain) = match (&sender, &message) {
        (Some(d), _) => (OverrideScope::Sender, d.clone()),
        (None, Some(msg_id)) => {
            let meta = crate::store::metadata::get(&conn, msg_id)?
                .ok_or_else(|| AppError::invariant(format!("no parsed_metadata for message {msg_id}")))?;
            (OverrideScope::Message, meta.sender_domain)
        }
        (None, None) => return Err(AppError::config("override requires --sender or --message")),
    };

    let id = crate::store::overrides::insert(
        &conn,
        message.as_deref(),
        &sender_domain,
        &field,
        None,
        &value,
        scope,
    )?;
    println!("recorded override #{id} for {sender_domain}.{field} = {value}");
    Ok(())
}

fn run_overrides(config: GemsieveConfig, list: bool, stats: bool) -> AppResult<()> {
    let store = open_store(&config)?;
    let conn = store.conn.lock().unwrap();
    if stats {
        println!("{}", serde_json::to_string_pretty(&crate::store::overrides::stats(&conn)?)?);
    } else if list {
        for o in crate::store::overrides::list_all(&conn)? {
            println!("#{} {}.{}: {:?} -> {}", o.id, o.sender_domain, o.field_name, o.original_value, o.corrected_value);
        }
    }
    Ok(())
}

async fn run_generate(
    config: GemsieveConfig,
    gem: Option<i64>,
    strategy: Option<String>,
    top: Option<i64>,
    all: bool,
    crew: bool,
) -> AppResult<()> {
    let store = open_store(&config)?;
    let model = format!("{}:{}", config.ai.provider, config.ai.model);
    let services = build_services(config);

    if let Some(gem_id) = gem {
        let opts = engage::EngageOptions { model, explicit_gem_id: Some(gem_id), crew };
        let report = engage::run(&services, &store, &opts).await?;
        println!("generated {} draft(s)", report.drafts_generated);
        return Ok(());
    }

    let strategy = strategy.ok_or_else(|| AppError::config("generate requires --gem or --strategy"))?;
    let candidate_ids: Vec<i64> = {
        let conn = store.conn.lock().unwrap();
        let mut matched: Vec<_> = crate::store::gem::list_all(&conn)?
            .into_iter()
            .filter(|g| strategy_for(&g.gem_type) == strategy)
            .collect();
        matched.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        if !all {
            let n = top.ok_or_else(|| AppError::config("--strategy requires --top N or --all"))?;
            matched.truncate(n.max(0) as usize);
        }
        matched.into_iter().map(|g| g.id).collect()
    };

    let mut generated = 0;
    for gem_id in candidate_ids {
        let opts = engage::EngageOptions { model: model.clone(), explicit_gem_id: Some(gem_id), crew };
        let report = engage::run(&services, &store, &opts).await?;
        generated += report.drafts_generated;
    }
    println!("generated {generated} draft(s)");
    Ok(())
}

/// Mirrors `engage::route`'s gem-type-to-strategy table so `--strategy`
/// filtering doesn't need that private function exposed.
fn strategy_for(gem_type: &GemType) -> &'static str {
    match gem_type {
        GemType::DormantWarmThread => "revival",
        GemType::UnansweredAsk => "mirror",
        GemType::WeakMarketingLead => "audit",
        GemType::PartnerProgram => "partner",
        GemType::RenewalLeverage => "renewal_negotiation",
        GemType::DistributionChannel => "distribution_pitch",
        GemType::CoMarketing => "distribution_pitch",
        GemType::IndustryIntel => "industry_report",
        GemType::ProcurementSignal => "audit",
        _ => "mirror",
    }
}

fn run_relationship(
    config: GemsieveConfig,
    sender: String,
    rel_type: String,
    note: Option<String>,
    suppress: bool,
) -> AppResult<()> {
    let store = open_store(&config)?;
    let conn = store.conn.lock().unwrap();
    let relationship = SenderRelationship {
        sender_domain: sender.clone(),
        relationship_type: RelationshipType::from_str(&rel_type).unwrap(),
        note,
        suppress_gems: suppress,
        source: RelationshipSource::Manual,
    };
    crate::store::relationship::upsert(&conn, &relationship)?;
    println!("set {sender} relationship_type={rel_type} suppress_gems={suppress}");
    Ok(())
}

fn run_relationships(
    config: GemsieveConfig,
    list: bool,
    rel_type: Option<String>,
    auto_detect: bool,
    apply: bool,
    import: Option<String>,
) -> AppResult<()> {
    let store = open_store(&config)?;

    if let Some(path) = import {
        let conn = store.conn.lock().unwrap();
        let mut reader = csv::Reader::from_path(&path)?;
        let mut count = 0;
        for record in reader.deserialize::<ImportRow>() {
            let row = record.map_err(|e| AppError::parse(format!("bad row in {path}: {e}")))?;
            let relationship = SenderRelationship {
                sender_domain: row.sender_domain,
                relationship_type: RelationshipType::from_str(&row.relationship_type).unwrap(),
                note: row.note,
                suppress_gems: row.suppress_gems.unwrap_or(false),
                source: RelationshipSource::Manual,
            };
            crate::store::relationship::upsert(&conn, &relationship)?;
            count += 1;
        }
        println!("imported {count} relationship(s)");
        return Ok(());
    }

    if auto_detect {
        let services = Services::fixture(config);
        let conn = store.conn.lock().unwrap();
        let computed = profile::auto_detect_relationships(&conn, &services)?;
        for r in &computed {
            println!("{} -> {}", r.sender_domain, r.relationship_type);
            if apply {
                crate::store::relationship::upsert(&conn, r)?;
            }
        }
        println!("{} domain(s), applied={apply}", computed.len());
        return Ok(());
    }

    if list {
        let conn = store.conn.lock().unwrap();
        let rows = if let Some(t) = &rel_type {
            crate::store::relationship::list_by_type(&conn, RelationshipType::from_str(t).unwrap())?
        } else {
            crate::store::relationship::list_all(&conn)?
        };
        for r in &rows {
            println!("{} {} suppress={}", r.sender_domain, r.relationship_type, r.suppress_gems);
        }
        println!("{} relationship(s)", rows.len());
    }
    Ok(())
}

#[derive(serde::Deserialize)]
struct ImportRow {
    sender_domain: String,
    relationship_type: String,
    note: Option<String>,
    suppress_gems: Option<bool>,
}

fn run_stats(
    config: GemsieveConfig,
    by_esp: bool,
    by_industry: bool,
    by_segment: bool,
    gem_summary: bool,
) -> AppResult<()> {
    let store = open_store(&config)?;
    let conn = store.conn.lock().unwrap();

    if by_esp {
        for (esp, count) in crate::store::metadata::stats_by_esp(&conn)? {
            println!("{}: {count}", esp.unwrap_or_else(|| "(unidentified)".to_string()));
        }
    } else if by_industry {
        for (industry, count) in crate::store::profile::stats_by_industry(&conn)? {
            println!("{}: {count}", industry.unwrap_or_else(|| "(unclassified)".to_string()));
        }
    } else if by_segment {
        for (segment, count) in crate::store::segment::stats_by_segment(&conn)? {
            println!("{segment}: {count}");
        }
    } else if gem_summary {
        for (gem_type, count) in crate::store::gem::count_by_type(&conn)? {
            println!("{gem_type}: {count}");
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&store.stats()?)?);
    }
    Ok(())
}

fn run_export(
    config: GemsieveConfig,
    _gems_flag: bool,
    _all: bool,
    segment: Option<String>,
    format: Option<String>,
    output: Option<String>,
) -> AppResult<()> {
    let store = open_store(&config)?;
    let conn = store.conn.lock().unwrap();

    let rows = if let Some(s) = &segment {
        let domains: Vec<String> = crate::store::segment::list_by_segment(&conn, s)?
            .into_iter()
            .map(|r| r.sender_domain)
            .collect();
        let mut out = Vec::new();
        for domain in domains {
            out.extend(crate::store::gem::list_for_domain(&conn, &domain)?);
        }
        out
    } else {
        crate::store::gem::list_all(&conn)?
    };

    let format = format.as_deref().unwrap_or("csv");
    let output = output.unwrap_or_else(|| format!("gemsieve_export.{}", if format == "excel" { "xlsx" } else { "csv" }));
    let path = std::path::Path::new(&output);
    match format {
        "excel" => export::write_excel(&rows, path)?,
        _ => export::write_csv(&rows, path)?,
    }
    println!("exported {} row(s) to {}", rows.len(), output);
    Ok(())
}

fn run_db(config: GemsieveConfig, reset: bool, migrate: bool, stats: bool) -> AppResult<()> {
    if reset {
        let store = open_store(&config)?;
        store.reset()?;
        println!("store reset");
    } else if migrate {
        let _store = open_store(&config)?;
        println!("migrations applied");
    } else if stats {
        let store = open_store(&config)?;
        println!("{}", serde_json::to_string_pretty(&store.stats()?)?);
    }
    Ok(())
}

async fn run_pipeline(
    config: GemsieveConfig,
    query: Option<String>,
    all_stages: bool,
    crew: bool,
) -> AppResult<()> {
    let store = Arc::new(open_store(&config)?);
    let query = query.unwrap_or_else(|| config.gmail.default_query.clone());
    let services = Arc::new(build_services(config));

    let ingest_report = ingest::run(&services, &store, &query, false).await?;
    println!(
        "ingested {} messages, recomputed {} threads",
        ingest_report.messages_ingested, ingest_report.threads_recomputed
    );

    let orchestrator = Orchestrator::new(Arc::clone(&store), Arc::clone(&services), 2);
    let outcomes = orchestrator.run_all(TriggeredBy::Cli).await?;
    for outcome in &outcomes {
        println!("{}: {} item(s)", outcome.stage, outcome.items_processed);
    }

    if all_stages {
        let opts = StageOptions { retrain: false, crew };
        let outcome = orchestrator.run_stage(Stage::Engage, TriggeredBy::Cli, opts).await;
        match outcome {
            Ok(o) => println!("engage: {} item(s)", o.items_processed),
            Err(e) => println!("engage skipped: {e}"),
        }
    }

    Ok(())
}
