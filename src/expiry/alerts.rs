use chrono::NaiveDate;

use super::{classify, days_until};
use crate::models::{ExpiryStatus, PrescriptionAnalysis, TrackedMedicine};

/// One alert per expired or soon-expiring tracked medicine, in input order.
///
/// Medicines that also appear on the prescription get a stronger message.
pub fn synthesize_expiry_alerts(
    analysis: &PrescriptionAnalysis,
    tracked: &[TrackedMedicine],
    today: NaiveDate,
) -> Vec<String> {
    tracked
        .iter()
        .filter_map(|medicine| {
            let name = medicine.name.trim();
            let date = medicine.expiry_date.format("%Y-%m-%d");
            let prescribed = is_prescribed(analysis, name);

            match classify(medicine.expiry_date, today) {
                ExpiryStatus::Expired if prescribed => Some(format!(
                    "{name} expired on {date} and is on this prescription. Get a fresh supply before taking it."
                )),
                ExpiryStatus::Expired => Some(format!("{name} expired on {date}. Do not use it.")),
                ExpiryStatus::Warning => {
                    let days = days_until(medicine.expiry_date, today);
                    let unit = if days == 1 { "day" } else { "days" };
                    let suffix = if prescribed { " It is on this prescription." } else { "" };
                    Some(format!("{name} expires in {days} {unit} ({date}).{suffix}"))
                }
                ExpiryStatus::Safe => None,
            }
        })
        .collect()
}

/// Append alerts not already present (case-insensitive, whitespace-trimmed).
pub fn merge_expiry_alerts(analysis: &mut PrescriptionAnalysis, alerts: Vec<String>) {
    for alert in alerts {
        let key = alert.trim().to_lowercase();
        let duplicate = analysis
            .expiry_alerts
            .iter()
            .any(|existing| existing.trim().to_lowercase() == key);
        if !duplicate && !key.is_empty() {
            analysis.expiry_alerts.push(alert);
        }
    }
}

/// Synthesize and merge in one step.
pub fn apply_expiry_alerts(
    analysis: &mut PrescriptionAnalysis,
    tracked: &[TrackedMedicine],
    today: NaiveDate,
) {
    let alerts = synthesize_expiry_alerts(analysis, tracked, today);
    if !alerts.is_empty() {
        tracing::info!(count = alerts.len(), "Expiry alerts synthesized");
    }
    merge_expiry_alerts(analysis, alerts);
}

/// A tracked name matches a listed one when either name's words appear as a
/// contiguous run of whole words in the other.
fn is_prescribed(analysis: &PrescriptionAnalysis, name: &str) -> bool {
    let tracked = words(name);
    if tracked.is_empty() {
        return false;
    }
    analysis.medicines.iter().any(|m| {
        let listed = words(&m.name);
        !listed.is_empty() && (contains_run(&listed, &tracked) || contains_run(&tracked, &listed))
    })
}

fn words(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}
