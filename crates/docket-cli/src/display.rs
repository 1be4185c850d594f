//! Plain-text rendering for subscriptions, notifications, and case cards.

use chrono::{DateTime, Utc};
use docket_core::{CaseSnapshot, MonitoredCase, Notification};
use docket_store::StoreStats;

const MAX_LIST_ITEMS: usize = 10;

// ── Tables ──

pub fn print_case_table(cases: &[MonitoredCase]) {
    if cases.is_empty() {
        println!("No monitored cases.");
        return;
    }
    println!(
        "{:<36}  {:<18}  {:<24}  {:<16}  {}",
        "ID", "CASE", "LABEL", "LAST CHECKED", "LAST HEARING"
    );
    for case in cases {
        let last_hearing = case
            .last_snapshot
            .as_ref()
            .and_then(CaseSnapshot::latest_hearing_date)
            .unwrap_or("-");
        println!(
            "{:<36}  {:<18}  {:<24}  {:<16}  {}",
            case.id,
            case.case_number,
            truncate(case.label(), 24),
            format_time(case.last_checked_at),
            last_hearing
        );
    }
}

pub fn print_notifications(notifications: &[Notification], unread: usize) {
    println!("{unread} unread");
    if notifications.is_empty() {
        return;
    }
    println!();
    for n in notifications {
        let marker = if n.read { " " } else { "*" };
        println!(
            "{marker} {}  {}  {:<18}  {}",
            n.id,
            format_time(Some(n.created_at)),
            n.case_number,
            n.message
        );
    }
}

pub fn print_stats(stats: &StoreStats) {
    println!("  {:<26} {}", "active monitored cases", stats.active_monitored_cases);
    println!("  {:<26} {}", "notifications", stats.total_notifications);
    println!("  {:<26} {}", "unread", stats.unread_notifications);
}

// ── Case card ──

/// Print one subscription with its stored snapshot, grouped by section.
pub fn print_case_card(case: &MonitoredCase) {
    println!("=== {} ===", case.case_number);
    if let Some(alias) = &case.alias {
        println!("{alias}");
    }
    println!();

    println!("Subscription");
    field("id", &case.id.to_string());
    field("status", case.status.as_str());
    field("created", &format_time(Some(case.created_at)));
    field("last checked", &format_time(case.last_checked_at));
    println!();

    let Some(snap) = &case.last_snapshot else {
        println!("No snapshot yet.");
        return;
    };

    println!("Identity");
    field("institution", &snap.institution);
    field("legacy number", &snap.legacy_number);
    field("registered on", &snap.registered_on);
    field("stage", &snap.stage);
    field("category", &snap.category);
    field("subject matter", &snap.subject_matter);
    field("department", &snap.department);
    println!();

    print_list(
        "Parties",
        snap.parties.iter().map(|p| format!("{:<40}  {}", p.name, p.role)),
    );
    print_list(
        "Hearings",
        snap.hearings.iter().map(|h| {
            let mut line = format!("{:<10}  {:<5}  {}", dash(&h.date), h.time, h.panel);
            if !h.solution_summary.is_empty() {
                line.push_str(&format!("\n      {}", truncate(&h.solution_summary, 70)));
            }
            line
        }),
    );
    print_list(
        "Appeals",
        snap.appeals.iter().map(|a| {
            format!(
                "{:<10}  {:<20}  {}",
                dash(&a.declaration_date),
                a.appeal_type,
                a.declaring_party
            )
        }),
    );
}

fn print_list(header: &str, items: impl ExactSizeIterator<Item = String>) {
    let len = items.len();
    if len == 0 {
        return;
    }
    println!("{header} ({len})");
    for line in items.take(MAX_LIST_ITEMS) {
        println!("    {line}");
    }
    if len > MAX_LIST_ITEMS {
        println!("    ... and {} more", len - MAX_LIST_ITEMS);
    }
    println!();
}

// ── Helpers ──

fn field(name: &str, value: &str) {
    if !value.is_empty() {
        println!("  {:<26} {}", name, value);
    }
}

fn dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

fn format_time(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string())
}

/// Shorten to `max` characters, marking the cut with `...`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}
