//! Operator information panels: statistics and recent registrations.

use anyhow::Result;

use courier_common::CountryCode;
use courier_store::ParticipantStore;

pub async fn stats_panel(participants: &ParticipantStore) -> Result<String> {
    let total = participants.count().await?;
    if total == 0 {
        return Ok("📊 No participants registered yet.".to_string());
    }

    let mut text = format!("📊 PARTICIPANT STATISTICS\n\n👥 Total: {total}\n\n🌍 By country:\n");
    for row in participants.count_by_country().await? {
        let label = match CountryCode::from_code(&row.country) {
            Some(code) => format!("{} {}", code.flag(), code.name()),
            None => row.country.clone(),
        };
        let share = row.count as f64 / total as f64 * 100.0;
        text.push_str(&format!("• {label}: {} ({share:.1}%)\n", row.count));
    }
    Ok(text)
}

pub async fn recent_panel(participants: &ParticipantStore) -> Result<String> {
    let recent = participants.list_recent(15).await?;
    if recent.is_empty() {
        return Ok("🕒 No participants registered yet.".to_string());
    }

    let mut text = "🕒 RECENT REGISTRATIONS\n\n".to_string();
    for (i, p) in recent.iter().enumerate() {
        text.push_str(&format!(
            "{}. {}\n   {} {} · {} · {}\n   ID: {}\n\n",
            i + 1,
            p.name,
            p.country.flag(),
            p.country.name(),
            p.phone,
            p.registered_at.format("%d/%m/%Y"),
            p.id
        ));
    }
    Ok(text)
}
