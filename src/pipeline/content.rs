//! Content parser (§4.4). Cleans the preferred body down to `body_clean`,
//! peels off the signature and marketing footer, and extracts the
//! structured content signals used by the profiler and gem detector.

use crate::domain::{Message, ParsedContent};
use crate::error::AppResult;
use crate::services::Services;
use crate::store::Store;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};

pub struct StageReport {
    pub items_processed: usize,
    pub errors: Vec<String>,
}

pub fn run(_services: &Services, store: &Store) -> AppResult<StageReport> {
    let conn = store.conn.lock().unwrap();
    let missing = crate::store::message::ids_missing_from(&conn, "parsed_content")?;
    let mut processed = 0;
    let mut errors = Vec::new();

    for id in &missing {
        let Some(msg) = crate::store::message::get(&conn, id)? else {
            continue;
        };
        match parse(&msg) {
            Ok(content) => {
                crate::store::content::upsert(&conn, &content)?;
                processed += 1;
            }
            Err(e) => errors.push(format!("{id}: {e}")),
        }
    }

    Ok(StageReport {
        items_processed: processed,
        errors,
    })
}

fn parse(msg: &Message) -> AppResult<ParsedContent> {
    let raw = msg.preferred_body();
    let is_html = msg.html_body.as_deref().map(|h| !h.trim().is_empty()).unwrap_or(false);

    let (text, headline, cta_texts, link_count, tracking_pixel_count, unique_link_domains,
        link_intents, utm_campaigns, image_count, template_complexity_score) = if is_html {
        extract_from_html(raw)
    } else {
        (raw.to_string(), None, Vec::new(), count_plain_links(raw), 0,
            plain_link_domains(raw), plain_link_intents(raw), HashSet::new(), 0, 0)
    };

    let without_quotes = strip_quoted_replies(&text);
    let (without_sig, signature_block) = strip_signature(&without_quotes);
    let (body_clean, _footer) = strip_footer(&without_sig);

    let offer_types = detect_offer_types(&body_clean);
    let (has_personalization, personalization_tokens) = detect_personalization(&body_clean, msg);
    let physical_address = detect_physical_address(&body_clean);
    let social_links = if is_html {
        detect_social_links(raw)
    } else {
        HashMap::new()
    };

    Ok(ParsedContent {
        message_id: msg.message_id.clone(),
        body_clean,
        signature_block,
        primary_headline: headline,
        cta_texts,
        offer_types,
        has_personalization,
        personalization_tokens,
        link_count,
        tracking_pixel_count,
        unique_link_domains,
        link_intents,
        utm_campaigns,
        physical_address,
        social_links,
        image_count,
        template_complexity_score,
    })
}

#[allow(clippy::type_complexity)]
fn extract_from_html(
    html: &str,
) -> (
    String,
    Option<String>,
    Vec<String>,
    i64,
    i64,
    HashSet<String>,
    HashMap<String, Vec<String>>,
    HashSet<String>,
    i64,
    u8,
) {
    let doc = Html::parse_document(html);

    let text = extract_visible_text(&doc);
    let headline = extract_headline(&doc);
    let cta_texts = extract_cta_texts(&doc);
    let (link_count, unique_link_domains, link_intents, utm_campaigns) = extract_links(&doc);
    let (image_count, tracking_pixel_count) = count_images(&doc);
    let template_complexity_score = template_complexity(&doc, image_count);

    (
        text,
        headline,
        cta_texts,
        link_count,
        tracking_pixel_count,
        unique_link_domains,
        link_intents,
        utm_campaigns,
        image_count,
        template_complexity_score,
    )
}

fn selector(s: &str) -> Selector {
    Selector::parse(s).unwrap()
}

fn extract_visible_text(doc: &Html) -> String {
    let body_sel = selector("body");
    let root = doc.select(&body_sel).next();
    let text: String = match root {
        Some(el) => el.text().collect::<Vec<_>>().join("\n"),
        None => doc.root_element().text().collect::<Vec<_>>().join("\n"),
    };
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_headline(doc: &Html) -> Option<String> {
    for tag in ["h1", "h2"] {
        let sel = selector(tag);
        if let Some(el) = doc.select(&sel).next() {
            let t = el.text().collect::<String>().trim().to_string();
            if !t.is_empty() {
                return Some(t);
            }
        }
    }
    None
}

fn extract_cta_texts(doc: &Html) -> Vec<String> {
    let mut out = Vec::new();
    for sel_str in ["a", "button"] {
        let sel = selector(sel_str);
        for el in doc.select(&sel) {
            let text = el.text().collect::<String>().trim().to_string();
            if text.is_empty() || text.len() > 60 {
                continue;
            }
            if CTA_WORDS.iter().any(|w| text.to_lowercase().contains(w)) {
                out.push(text);
            }
        }
    }
    out
}

const CTA_WORDS: &[&str] = &[
    "learn more", "get started", "sign up", "book", "schedule", "demo", "shop now",
    "buy now", "claim", "register", "download", "try", "upgrade", "renew", "apply",
];

#[allow(clippy::type_complexity)]
fn extract_links(
    doc: &Html,
) -> (i64, HashSet<String>, HashMap<String, Vec<String>>, HashSet<String>) {
    let sel = selector("a[href]");
    let mut count = 0i64;
    let mut domains = HashSet::new();
    let mut intents: HashMap<String, Vec<String>> = HashMap::new();
    let mut utms = HashSet::new();

    for el in doc.select(&sel) {
        let Some(href) = el.value().attr("href") else { continue };
        if !href.starts_with("http") {
            continue;
        }
        count += 1;
        if let Ok(url) = url::Url::parse(href) {
            if let Some(host) = url.host_str() {
                domains.insert(host.to_string());
            }
            for (k, v) in url.query_pairs() {
                if k == "utm_campaign" {
                    utms.insert(v.to_string());
                }
            }
        }
        if let Some(intent) = classify_link_intent(href) {
            intents.entry(intent).or_default().push(href.to_string());
        }
    }
    (count, domains, intents, utms)
}

/// §4.4 step 7: ordered substring table, first match wins.
const LINK_INTENT_TABLE: &[(&str, &str)] = &[
    ("pricing", "pricing_page"),
    ("/demo", "demo_booking"),
    ("book-a-demo", "demo_booking"),
    ("partner", "partner_program"),
    ("marketplace", "marketplace_listing"),
    ("/jobs", "job_posting"),
    ("careers", "job_posting"),
    ("case-study", "case_study"),
    ("case-studies", "case_study"),
    ("free-tool", "free_tool"),
    ("free-trial", "free_tool"),
];

fn classify_link_intent(url: &str) -> Option<String> {
    let lower = url.to_lowercase();
    LINK_INTENT_TABLE
        .iter()
        .find(|(substr, _)| lower.contains(substr))
        .map(|(_, intent)| intent.to_string())
}

fn count_images(doc: &Html) -> (i64, i64) {
    let sel = selector("img");
    let mut total = 0i64;
    let mut tracking = 0i64;
    for el in doc.select(&sel) {
        total += 1;
        let width: Option<i64> = el.value().attr("width").and_then(|w| w.parse().ok());
        let height: Option<i64> = el.value().attr("height").and_then(|h| h.parse().ok());
        let src = el.value().attr("src").unwrap_or("");
        let is_pixel = matches!((width, height), (Some(w), Some(h)) if w <= 1 && h <= 1)
            || src.to_lowercase().contains("pixel")
            || src.to_lowercase().contains("beacon")
            || src.to_lowercase().contains("open.gif")
            || src.to_lowercase().contains("track");
        if is_pixel {
            tracking += 1;
        }
    }
    (total, tracking)
}

fn template_complexity(doc: &Html, image_count: i64) -> u8 {
    let table_count = doc.select(&selector("table")).count() as i64;
    let inline_style_count = doc.select(&selector("[style]")).count() as i64;
    let media_query_count = doc
        .select(&selector("style"))
        .map(|el| el.text().collect::<String>().matches("@media").count() as i64)
        .sum::<i64>();
    let score = table_count * 5 + inline_style_count * 2 + media_query_count * 10 + image_count * 3;
    score.clamp(0, 100) as u8
}

fn detect_social_links(html: &str) -> HashMap<String, String> {
    let doc = Html::parse_document(html);
    let sel = selector("a[href]");
    const PLATFORMS: &[&str] = &["twitter.com", "x.com", "linkedin.com", "facebook.com", "instagram.com", "youtube.com"];
    let mut out = HashMap::new();
    for el in doc.select(&sel) {
        let Some(href) = el.value().attr("href") else { continue };
        for platform in PLATFORMS {
            if href.contains(platform) {
                let key = platform.split('.').next().unwrap_or(platform).to_string();
                out.entry(key).or_insert_with(|| href.to_string());
            }
        }
    }
    out
}

fn count_plain_links(text: &str) -> i64 {
    static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
    URL_RE.find_iter(text).count() as i64
}

fn plain_link_domains(text: &str) -> HashSet<String> {
    static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://([a-zA-Z0-9.\-]+)").unwrap());
    URL_RE.captures_iter(text).map(|c| c[1].to_string()).collect()
}

fn plain_link_intents(text: &str) -> HashMap<String, Vec<String>> {
    static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for m in URL_RE.find_iter(text) {
        if let Some(intent) = classify_link_intent(m.as_str()) {
            out.entry(intent).or_default().push(m.as_str().to_string());
        }
    }
    out
}

static QUOTE_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^On .{5,80}wrote:\s*$").unwrap());

/// §4.4 step 2: strip quoted-reply blocks (`On ... wrote:` and `>`-prefixed
/// lines) from the tail of the message onward.
fn strip_quoted_replies(text: &str) -> String {
    if let Some(m) = QUOTE_HEADER_RE.find(text) {
        return text[..m.start()].trim_end().to_string();
    }
    let lines: Vec<&str> = text.lines().collect();
    let mut cut = lines.len();
    for (i, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with('>') {
            cut = i;
            break;
        }
    }
    lines[..cut].join("\n").trim_end().to_string()
}

static SIG_DELIM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^--\s*$").unwrap());
static SIG_HINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(CEO|CTO|CFO|COO|VP|President|Director|Founder|Manager)\b|\+?\d[\d\-\s()]{7,}\d|https?://").unwrap()
});

/// §4.4 step 3: detect a standard `--` delimiter, or fall back to a run of
/// short tail lines containing a name+title or phone/URL.
fn strip_signature(text: &str) -> (String, Option<String>) {
    if let Some(m) = SIG_DELIM_RE.find(text) {
        let body = text[..m.start()].trim_end().to_string();
        let sig = text[m.end()..].trim().to_string();
        return (body, if sig.is_empty() { None } else { Some(sig) });
    }

    let lines: Vec<&str> = text.lines().collect();
    let tail_window = 6.min(lines.len());
    if tail_window == 0 {
        return (text.to_string(), None);
    }
    let tail = &lines[lines.len() - tail_window..];
    let short_run = tail.iter().all(|l| l.trim().len() <= 60);
    let has_hint = tail.iter().any(|l| SIG_HINT_RE.is_match(l));
    if short_run && has_hint {
        let cut = lines.len() - tail_window;
        let body = lines[..cut].join("\n").trim_end().to_string();
        let sig = tail.join("\n").trim().to_string();
        return (body, Some(sig));
    }
    (text.to_string(), None)
}

/// §4.4 step 4: marketing-footer patterns, scanned bottom-up; once one
/// matches, everything from that line onward becomes the footer.
static FOOTER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"unsubscribe",
        r"view (it |this )?in (your )?browser",
        r"©\s*\d{4}",
        r"all rights reserved",
        r"privacy policy",
        r"this email was sent (to|by)",
        r"powered by \w+",
        r"update your preferences",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
    .collect()
});

fn strip_footer(text: &str) -> (String, Option<String>) {
    let lines: Vec<&str> = text.lines().collect();
    for (i, line) in lines.iter().enumerate().rev() {
        if FOOTER_PATTERNS.iter().any(|p| p.is_match(line)) {
            let body = lines[..i].join("\n").trim_end().to_string();
            let footer = lines[i..].join("\n");
            return (body, Some(footer));
        }
    }
    (text.to_string(), None)
}

static OFFER_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("discount", Regex::new(r"(?i)\b(\d+%\s*off|discount|save \d+%)\b").unwrap()),
        ("free_trial", Regex::new(r"(?i)\bfree trial\b").unwrap()),
        ("webinar", Regex::new(r"(?i)\bwebinar\b").unwrap()),
        ("product_launch", Regex::new(r"(?i)\b(introducing|launching|new release)\b").unwrap()),
        ("urgency", Regex::new(r"(?i)\b(limited time|act now|expires (soon|today)|last chance)\b").unwrap()),
        ("social_proof", Regex::new(r"(?i)\b(trusted by|customers love|case study|testimonial)\b").unwrap()),
        ("event", Regex::new(r"(?i)\b(join us|register now|save the date|conference)\b").unwrap()),
        ("newsletter", Regex::new(r"(?i)\b(newsletter|this week in|roundup)\b").unwrap()),
        ("renewal", Regex::new(r"(?i)\b(renew(al|s)?|subscription (ending|expires))\b").unwrap()),
        ("partnership", Regex::new(r"(?i)\b(partner(ship)? (program|opportunity)|become a partner)\b").unwrap()),
        ("procurement", Regex::new(r"(?i)\b(rfp|request for proposal|vendor (evaluation|questionnaire))\b").unwrap()),
    ]
});

fn detect_offer_types(text: &str) -> HashSet<String> {
    OFFER_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(name, _)| name.to_string())
        .collect()
}

static PERSONALIZATION_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{?\s*\w+\s*\}?\}").unwrap());

fn detect_personalization(text: &str, msg: &Message) -> (bool, Vec<String>) {
    let tokens: Vec<String> = PERSONALIZATION_TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    let name_hit = msg
        .from_name
        .as_deref()
        .map(|name| !name.trim().is_empty() && text.to_lowercase().contains(&name.to_lowercase()))
        .unwrap_or(false);
    let addressed_by_name = msg
        .to
        .first()
        .and_then(|t| t.split('@').next())
        .map(|local| text.to_lowercase().contains(&local.to_lowercase()))
        .unwrap_or(false);
    (!tokens.is_empty() || addressed_by_name || name_hit, tokens)
}

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d{1,5}\s+[A-Za-z0-9.\s]{3,40}(?:street|st|avenue|ave|road|rd|blvd|boulevard|suite|ste)\b[^\n]{0,40}").unwrap()
});

fn detect_physical_address(text: &str) -> Option<String> {
    ADDRESS_RE.find(text).map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_quoted_reply_header() {
        let body = "Sure, sounds good.\n\nOn Mon, Jan 5, 2026 at 3:00 PM, Alice wrote:\n> original text";
        assert_eq!(strip_quoted_replies(body), "Sure, sounds good.");
    }

    #[test]
    fn strips_standard_signature_delimiter() {
        let body = "Thanks,\nsee you then.\n--\nAlice Smith\nVP Sales\n555-123-4567";
        let (clean, sig) = strip_signature(body);
        assert_eq!(clean, "Thanks,\nsee you then.");
        assert!(sig.unwrap().contains("VP Sales"));
    }

    #[test]
    fn strips_marketing_footer_from_bottom() {
        let body = "Check out our new feature!\n\nUnsubscribe here\n© 2026 Acme Inc. All rights reserved.";
        let (clean, footer) = strip_footer(body);
        assert_eq!(clean, "Check out our new feature!");
        assert!(footer.unwrap().contains("Unsubscribe"));
    }

    #[test]
    fn detects_multiple_offer_types() {
        let offers = detect_offer_types("Join our webinar next week, plus get 20% off your first month.");
        assert!(offers.contains("webinar"));
        assert!(offers.contains("discount"));
    }

    #[test]
    fn classifies_link_intents_in_order() {
        assert_eq!(classify_link_intent("https://acme.com/pricing"), Some("pricing_page".to_string()));
        assert_eq!(classify_link_intent("https://acme.com/careers/engineer"), Some("job_posting".to_string()));
        assert_eq!(classify_link_intent("https://acme.com/about"), None);
    }
}
