//! End-to-end pipeline tests against an in-memory store, exercising several
//! stages together the way the CLI/web layers actually chain them.

use chrono::Utc;
use gemsieve::config::GemsieveConfig;
use gemsieve::domain::enums::{GemStatus, GemType, OverrideScope, RelationshipType, Stage, TriggeredBy};
use gemsieve::domain::{Gem, GemExplanation, GemSignal, Message};
use gemsieve::orchestrator::{Orchestrator, StageOptions};
use gemsieve::pipeline::{classify, engage, ingest, metadata};
use gemsieve::provider::mail::FixtureMailProvider;
use gemsieve::services::Services;
use gemsieve::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

fn fixture_message(id: &str, thread_id: &str, from_address: &str, subject: &str) -> Message {
    Message {
        message_id: id.to_string(),
        thread_id: thread_id.to_string(),
        date: Utc::now(),
        from_address: from_address.to_string(),
        from_name: None,
        to: vec!["me@example.com".to_string()],
        cc: Vec::new(),
        reply_to: None,
        subject: subject.to_string(),
        raw_headers: HashMap::new(),
        html_body: None,
        text_body: Some("hello there".to_string()),
        labels: Vec::new(),
        size: 128,
        is_sent_by_user: false,
    }
}

fn empty_explanation(gem_type: GemType) -> GemExplanation {
    GemExplanation {
        gem_type,
        summary: "test gem".to_string(),
        signals: vec![GemSignal {
            signal: "test_signal".to_string(),
            evidence: "evidence".to_string(),
            threshold: None,
        }],
        confidence: 0.8,
        estimated_value: gemsieve::domain::enums::EstimatedValue::Medium,
        urgency: gemsieve::domain::enums::Urgency::Medium,
    }
}

#[tokio::test]
async fn ingest_then_metadata_collapses_subdomain_to_organizational_root() {
    let store = Store::open_in_memory().unwrap();
    let mail = FixtureMailProvider::new(vec![fixture_message(
        "m1",
        "t1",
        "billing@notifications.intuit.com",
        "Your invoice",
    )]);
    let services = Services::new(GemsieveConfig::default(), Arc::new(mail));

    let ingest_report = ingest::run(&services, &store, "in:inbox", false).await.unwrap();
    assert_eq!(ingest_report.messages_ingested, 1);

    let meta_report = metadata::run(&services, &store).unwrap();
    assert_eq!(meta_report.items_processed, 1);

    let conn = store.conn.lock().unwrap();
    let parsed = gemsieve::store::metadata::get(&conn, "m1").unwrap().unwrap();
    assert_eq!(parsed.sender_domain, "intuit.com");
    assert_eq!(parsed.sender_subdomain, "notifications.intuit.com");
}

#[tokio::test]
async fn message_scope_override_wins_over_sender_scope() {
    let store = Store::open_in_memory().unwrap();
    let mail = FixtureMailProvider::new(vec![fixture_message(
        "m1",
        "t1",
        "sales@acme.com",
        "Check out our product",
    )]);
    let services = Services::new(GemsieveConfig::default(), Arc::new(mail));

    ingest::run(&services, &store, "in:inbox", false).await.unwrap();
    metadata::run(&services, &store).unwrap();

    {
        let conn = store.conn.lock().unwrap();
        gemsieve::store::overrides::insert(
            &conn,
            None,
            "acme.com",
            "industry",
            None,
            "Finance",
            OverrideScope::Sender,
        )
        .unwrap();
        gemsieve::store::overrides::insert(
            &conn,
            Some("m1"),
            "acme.com",
            "industry",
            None,
            "Software",
            OverrideScope::Message,
        )
        .unwrap();
    }

    let fixture_services = Services::fixture(GemsieveConfig::default());
    let opts = classify::ClassifyOptions {
        model: "ollama:test".to_string(),
        retrain: false,
        crew: false,
    };
    let report = classify::run(&fixture_services, &store, &opts).await.unwrap();
    assert_eq!(report.items_processed, 1);

    let conn = store.conn.lock().unwrap();
    let classification = gemsieve::store::classification::get(&conn, "m1").unwrap().unwrap();
    assert_eq!(classification.industry, "Software");
    assert!(classification.has_override);
}

#[tokio::test]
async fn engagement_cap_stops_drafting_once_max_outreach_reached() {
    let store = Store::open_in_memory().unwrap();
    let mut config = GemsieveConfig::default();
    config.engagement.max_outreach_per_day = 2;
    let services = Services::fixture(config);

    {
        let conn = store.conn.lock().unwrap();
        for i in 0..5 {
            let gem = Gem {
                id: 0,
                gem_type: GemType::UnansweredAsk,
                sender_domain: format!("sender{i}.example.com"),
                thread_id: Some(format!("t{i}")),
                score: 10.0 - i as f64,
                explanation: empty_explanation(GemType::UnansweredAsk),
                recommended_actions: vec!["reply".to_string()],
                source_message_ids: vec![format!("m{i}")],
                status: GemStatus::New,
            };
            gemsieve::store::gem::upsert(&conn, &gem).unwrap();
        }
    }

    let opts = engage::EngageOptions {
        model: "ollama:test".to_string(),
        explicit_gem_id: None,
        crew: false,
    };
    let report = engage::run(&services, &store, &opts).await.unwrap();
    assert_eq!(report.drafts_generated, 2);

    let conn = store.conn.lock().unwrap();
    let drafted = gemsieve::store::draft::count_generated_today(&conn).unwrap();
    assert_eq!(drafted, 2);
}

#[tokio::test]
async fn web_triggered_retrain_classify_run_writes_matching_audit_entries() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let messages: Vec<Message> = (0..3)
        .map(|i| fixture_message(&format!("m{i}"), &format!("t{i}"), &format!("s{i}@acme.com"), "hi"))
        .collect();
    let mail = FixtureMailProvider::new(messages);
    let services = Arc::new(Services::new(GemsieveConfig::default(), Arc::new(mail)));

    ingest::run(&services, &store, "in:inbox", false).await.unwrap();
    metadata::run(&services, &store).unwrap();

    {
        let conn = store.conn.lock().unwrap();
        for i in 0..3 {
            gemsieve::store::overrides::insert(
                &conn,
                Some(&format!("m{i}")),
                "acme.com",
                "industry",
                None,
                "Software",
                OverrideScope::Message,
            )
            .unwrap();
        }
    }

    let orchestrator = Orchestrator::new(Arc::clone(&store), Arc::clone(&services), 2);
    let opts = StageOptions { retrain: true, crew: false };
    let outcome = orchestrator
        .run_stage(Stage::Classify, TriggeredBy::Web, opts)
        .await
        .unwrap();
    assert_eq!(outcome.items_processed, 3);

    let conn = store.conn.lock().unwrap();
    let audit_entries = gemsieve::store::audit::list_for_run(&conn, outcome.run_id).unwrap();
    assert_eq!(audit_entries.len(), 3);
    assert!(audit_entries.iter().all(|e| e.stage == Stage::Classify));
}

#[tokio::test]
async fn cli_triggered_classify_run_writes_no_audit_entries() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let messages: Vec<Message> = (0..2)
        .map(|i| fixture_message(&format!("m{i}"), &format!("t{i}"), &format!("s{i}@acme.com"), "hi"))
        .collect();
    let mail = FixtureMailProvider::new(messages);
    let services = Arc::new(Services::new(GemsieveConfig::default(), Arc::new(mail)));

    ingest::run(&services, &store, "in:inbox", false).await.unwrap();
    metadata::run(&services, &store).unwrap();

    let orchestrator = Orchestrator::new(Arc::clone(&store), Arc::clone(&services), 2);
    let outcome = orchestrator
        .run_stage(Stage::Classify, TriggeredBy::Cli, StageOptions::default())
        .await
        .unwrap();
    assert_eq!(outcome.items_processed, 2);

    let conn = store.conn.lock().unwrap();
    let audit_entries = gemsieve::store::audit::list_for_run(&conn, outcome.run_id).unwrap();
    assert!(audit_entries.is_empty());
}

#[tokio::test]
async fn auto_detect_relationships_is_deterministic_without_llm_access() {
    let store = Store::open_in_memory().unwrap();
    let services = Services::fixture(GemsieveConfig::default());

    {
        let conn = store.conn.lock().unwrap();
        let mut profile = gemsieve::domain::SenderProfile::empty("vendor.example.com");
        profile.has_partner_program = false;
        gemsieve::store::profile::upsert(&conn, &profile).unwrap();
    }

    let conn = store.conn.lock().unwrap();
    let computed = gemsieve::pipeline::profile::auto_detect_relationships(&conn, &services).unwrap();
    assert_eq!(computed.len(), 1);
    assert_eq!(computed[0].sender_domain, "vendor.example.com");
    // Manual overrides always win regardless of computed signals.
    drop(conn);
    let conn = store.conn.lock().unwrap();
    gemsieve::store::relationship::upsert(
        &conn,
        &gemsieve::domain::SenderRelationship {
            sender_domain: "vendor.example.com".to_string(),
            relationship_type: RelationshipType::MyVendor,
            note: None,
            suppress_gems: false,
            source: gemsieve::domain::profile::RelationshipSource::Manual,
        },
    )
    .unwrap();
    let recomputed = gemsieve::pipeline::profile::auto_detect_relationships(&conn, &services).unwrap();
    assert_eq!(recomputed[0].relationship_type, RelationshipType::MyVendor);
}
