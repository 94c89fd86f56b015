//! Short general-wellness tips shown alongside results.

use chrono::{Datelike, NaiveDate};
use rand::seq::SliceRandom;

pub const HEALTH_TIPS: [&str; 7] = [
    "Stay hydrated! Aim for 8 glasses of water a day.",
    "Try to get at least 30 minutes of light exercise today.",
    "Always complete your full course of antibiotics, even if you feel better.",
    "Store medicines in a cool, dry place away from direct sunlight.",
    "Take your medicines at the same time every day to build a habit.",
    "A balanced diet rich in greens boosts your immunity naturally.",
    "Prioritize 7-8 hours of sleep for better physical and mental health.",
];

/// A random tip.
pub fn health_tip() -> &'static str {
    let mut rng = rand::thread_rng();
    HEALTH_TIPS.choose(&mut rng).copied().unwrap_or(HEALTH_TIPS[0])
}

/// The tip of the day: stable for a given date, rotates daily.
pub fn health_tip_for(date: NaiveDate) -> &'static str {
    let day = date.num_days_from_ce().rem_euclid(HEALTH_TIPS.len() as i32);
    HEALTH_TIPS[day as usize]
}
