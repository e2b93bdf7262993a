//! Additive migrations: `CREATE TABLE IF NOT EXISTS` plus best-effort
//! `ALTER TABLE ... ADD COLUMN`, exactly the teacher's `db.rs::migrate`
//! idiom. New columns land here, never as a destructive rewrite.

use crate::error::AppResult;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sync_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_history_id TEXT,
            last_full_sync TEXT,
            last_incremental_sync TEXT,
            total_synced INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS threads (
            thread_id TEXT PRIMARY KEY,
            normalized_subject TEXT NOT NULL DEFAULT '',
            participant_count INTEGER NOT NULL DEFAULT 0,
            message_count INTEGER NOT NULL DEFAULT 0,
            first_message_date TEXT NOT NULL,
            last_message_date TEXT NOT NULL,
            last_sender TEXT NOT NULL DEFAULT '',
            user_participated INTEGER NOT NULL DEFAULT 0,
            user_last_replied TEXT,
            awaiting_response_from TEXT NOT NULL DEFAULT 'none',
            days_dormant INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS messages (
            message_id TEXT PRIMARY KEY,
            thread_id TEXT NOT NULL REFERENCES threads(thread_id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            from_address TEXT NOT NULL,
            from_name TEXT,
            to_addresses TEXT NOT NULL DEFAULT '[]',
            cc_addresses TEXT NOT NULL DEFAULT '[]',
            reply_to TEXT,
            subject TEXT NOT NULL DEFAULT '',
            raw_headers TEXT NOT NULL DEFAULT '{}',
            html_body TEXT,
            text_body TEXT,
            labels TEXT NOT NULL DEFAULT '[]',
            size INTEGER NOT NULL DEFAULT 0,
            is_sent_by_user INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_messages_from ON messages(from_address);
        CREATE INDEX IF NOT EXISTS idx_messages_date ON messages(date);
        CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id);

        CREATE TABLE IF NOT EXISTS attachments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id TEXT NOT NULL REFERENCES messages(message_id) ON DELETE CASCADE,
            filename TEXT NOT NULL,
            mime_type TEXT NOT NULL DEFAULT 'application/octet-stream',
            size_bytes INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments(message_id);

        CREATE TABLE IF NOT EXISTS parsed_metadata (
            message_id TEXT PRIMARY KEY REFERENCES messages(message_id) ON DELETE CASCADE,
            sender_domain TEXT NOT NULL,
            sender_subdomain TEXT NOT NULL,
            envelope_sender TEXT,
            esp_identified TEXT,
            esp_confidence TEXT,
            dkim_domain TEXT,
            spf_result TEXT,
            dmarc_result TEXT,
            sending_ip TEXT,
            mail_server TEXT,
            x_mailer TEXT,
            precedence TEXT,
            feedback_id TEXT,
            list_unsubscribe_url TEXT,
            list_unsubscribe_email TEXT,
            is_bulk INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_parsed_metadata_domain ON parsed_metadata(sender_domain);

        CREATE TABLE IF NOT EXISTS sender_temporal (
            sender_domain TEXT PRIMARY KEY,
            first_seen TEXT,
            last_seen TEXT,
            total_messages INTEGER NOT NULL DEFAULT 0,
            avg_frequency_days REAL,
            most_common_hour INTEGER,
            most_common_weekday INTEGER
        );

        CREATE TABLE IF NOT EXISTS parsed_content (
            message_id TEXT PRIMARY KEY REFERENCES messages(message_id) ON DELETE CASCADE,
            body_clean TEXT NOT NULL DEFAULT '',
            signature_block TEXT,
            primary_headline TEXT,
            cta_texts TEXT NOT NULL DEFAULT '[]',
            offer_types TEXT NOT NULL DEFAULT '[]',
            has_personalization INTEGER NOT NULL DEFAULT 0,
            personalization_tokens TEXT NOT NULL DEFAULT '[]',
            link_count INTEGER NOT NULL DEFAULT 0,
            tracking_pixel_count INTEGER NOT NULL DEFAULT 0,
            unique_link_domains TEXT NOT NULL DEFAULT '[]',
            link_intents TEXT NOT NULL DEFAULT '{}',
            utm_campaigns TEXT NOT NULL DEFAULT '[]',
            physical_address TEXT,
            social_links TEXT NOT NULL DEFAULT '{}',
            image_count INTEGER NOT NULL DEFAULT 0,
            template_complexity_score INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS extracted_entities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id TEXT NOT NULL REFERENCES messages(message_id) ON DELETE CASCADE,
            entity_type TEXT NOT NULL,
            value TEXT NOT NULL,
            normalized TEXT,
            context TEXT,
            confidence REAL NOT NULL DEFAULT 0,
            source TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_entities_type ON extracted_entities(entity_type);
        CREATE INDEX IF NOT EXISTS idx_entities_message ON extracted_entities(message_id);

        CREATE TABLE IF NOT EXISTS ai_classifications (
            message_id TEXT PRIMARY KEY REFERENCES messages(message_id) ON DELETE CASCADE,
            industry TEXT NOT NULL DEFAULT '',
            company_size_estimate TEXT NOT NULL DEFAULT 'small',
            marketing_sophistication INTEGER NOT NULL DEFAULT 1,
            sender_intent TEXT NOT NULL DEFAULT 'human_1to1',
            product_type TEXT NOT NULL DEFAULT '',
            product_description TEXT NOT NULL DEFAULT '',
            pain_points TEXT NOT NULL DEFAULT '[]',
            target_audience TEXT NOT NULL DEFAULT '',
            partner_program_detected INTEGER NOT NULL DEFAULT 0,
            renewal_signal_detected INTEGER NOT NULL DEFAULT 0,
            ai_confidence REAL NOT NULL DEFAULT 0,
            model_used TEXT NOT NULL DEFAULT '',
            has_override INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS classification_overrides (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id TEXT,
            sender_domain TEXT NOT NULL,
            field_name TEXT NOT NULL,
            original_value TEXT,
            corrected_value TEXT NOT NULL,
            scope TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_overrides_domain ON classification_overrides(sender_domain);

        CREATE TABLE IF NOT EXISTS sender_profiles (
            sender_domain TEXT PRIMARY KEY,
            company_name TEXT,
            primary_email TEXT,
            reply_to_email TEXT,
            industry TEXT,
            company_size TEXT,
            marketing_sophistication_avg REAL NOT NULL DEFAULT 1,
            sophistication_trend TEXT NOT NULL DEFAULT '[]',
            esp_used TEXT,
            product_type TEXT,
            product_description TEXT,
            pain_points TEXT NOT NULL DEFAULT '[]',
            target_audience TEXT,
            known_contacts TEXT NOT NULL DEFAULT '[]',
            total_messages INTEGER NOT NULL DEFAULT 0,
            first_contact TEXT,
            last_contact TEXT,
            avg_frequency_days REAL,
            offer_type_distribution TEXT NOT NULL DEFAULT '{}',
            cta_texts_all TEXT NOT NULL DEFAULT '[]',
            social_links TEXT NOT NULL DEFAULT '{}',
            physical_address TEXT,
            utm_campaign_names TEXT NOT NULL DEFAULT '[]',
            has_personalization INTEGER NOT NULL DEFAULT 0,
            has_partner_program INTEGER NOT NULL DEFAULT 0,
            partner_program_urls TEXT NOT NULL DEFAULT '[]',
            renewal_dates TEXT NOT NULL DEFAULT '[]',
            monetary_signals TEXT NOT NULL DEFAULT '[]',
            authentication_quality TEXT,
            unsubscribe_url TEXT,
            economic_segments TEXT NOT NULL DEFAULT '[]',
            thread_initiation_ratio REAL NOT NULL DEFAULT 0,
            user_reply_rate REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS sender_relationships (
            sender_domain TEXT PRIMARY KEY REFERENCES sender_profiles(sender_domain) ON DELETE CASCADE,
            relationship_type TEXT NOT NULL,
            note TEXT,
            suppress_gems INTEGER NOT NULL DEFAULT 0,
            source TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS gems (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            gem_type TEXT NOT NULL,
            sender_domain TEXT NOT NULL REFERENCES sender_profiles(sender_domain) ON DELETE CASCADE,
            thread_id TEXT,
            score REAL NOT NULL DEFAULT 0,
            explanation TEXT NOT NULL DEFAULT '{}',
            recommended_actions TEXT NOT NULL DEFAULT '[]',
            source_message_ids TEXT NOT NULL DEFAULT '[]',
            status TEXT NOT NULL DEFAULT 'new'
        );
        CREATE INDEX IF NOT EXISTS idx_gems_type ON gems(gem_type);
        CREATE INDEX IF NOT EXISTS idx_gems_score ON gems(score DESC);
        CREATE INDEX IF NOT EXISTS idx_gems_status ON gems(status);

        CREATE TABLE IF NOT EXISTS sender_segments (
            sender_domain TEXT NOT NULL REFERENCES sender_profiles(sender_domain) ON DELETE CASCADE,
            segment TEXT NOT NULL,
            sub_segment TEXT NOT NULL,
            confidence REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (sender_domain, segment, sub_segment)
        );

        CREATE TABLE IF NOT EXISTS engagement_drafts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            gem_id INTEGER NOT NULL REFERENCES gems(id) ON DELETE CASCADE,
            sender_domain TEXT NOT NULL,
            strategy TEXT NOT NULL,
            channel TEXT NOT NULL DEFAULT 'email',
            subject_line TEXT NOT NULL DEFAULT '',
            body_text TEXT NOT NULL DEFAULT '',
            body_html TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            generated_at TEXT NOT NULL,
            sent_at TEXT,
            response_received INTEGER NOT NULL DEFAULT 0,
            response_sentiment TEXT
        );

        CREATE TABLE IF NOT EXISTS pipeline_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            stage TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            started_at TEXT NOT NULL,
            completed_at TEXT,
            items_processed INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            config_snapshot TEXT NOT NULL DEFAULT '{}',
            triggered_by TEXT NOT NULL DEFAULT 'cli'
        );

        CREATE TABLE IF NOT EXISTS ai_audit_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pipeline_run_id INTEGER NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
            stage TEXT NOT NULL,
            sender_domain TEXT,
            prompt_template_id TEXT NOT NULL,
            prompt_rendered TEXT NOT NULL,
            system_prompt TEXT NOT NULL,
            model_used TEXT NOT NULL,
            response_raw TEXT NOT NULL,
            response_parsed TEXT,
            duration_ms INTEGER NOT NULL DEFAULT 0
        );
        ",
    )?;

    // Additive backfills land below as the schema evolves; none yet beyond
    // the initial create, so there is nothing to ALTER TABLE for today.
    // The pattern (idempotent ALTER + .ok()) follows the teacher's db.rs:
    // conn.execute_batch("ALTER TABLE ... ADD COLUMN ...;").ok();

    Ok(())
}

pub fn reset(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS ai_audit_entries;
        DROP TABLE IF EXISTS pipeline_runs;
        DROP TABLE IF EXISTS engagement_drafts;
        DROP TABLE IF EXISTS sender_segments;
        DROP TABLE IF EXISTS gems;
        DROP TABLE IF EXISTS sender_relationships;
        DROP TABLE IF EXISTS sender_profiles;
        DROP TABLE IF EXISTS classification_overrides;
        DROP TABLE IF EXISTS ai_classifications;
        DROP TABLE IF EXISTS extracted_entities;
        DROP TABLE IF EXISTS parsed_content;
        DROP TABLE IF EXISTS sender_temporal;
        DROP TABLE IF EXISTS parsed_metadata;
        DROP TABLE IF EXISTS attachments;
        DROP TABLE IF EXISTS messages;
        DROP TABLE IF EXISTS threads;
        DROP TABLE IF EXISTS sync_state;
        ",
    )?;
    run_migrations(conn)
}

pub fn stats(conn: &Connection) -> AppResult<serde_json::Value> {
    let count = |table: &str| -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap_or(0)
    };
    Ok(serde_json::json!({
        "messages": count("messages"),
        "threads": count("threads"),
        "sender_profiles": count("sender_profiles"),
        "gems": count("gems"),
        "engagement_drafts": count("engagement_drafts"),
        "pipeline_runs": count("pipeline_runs"),
    }))
}
