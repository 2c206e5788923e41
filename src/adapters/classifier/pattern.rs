//! Deterministic pattern classifier.
//!
//! Scores each intent by the fraction of its example tokens present in
//! the lowercased user text, extracts slots with type-tagged patterns,
//! and picks the argmax. The sentinel suffix `(HANG ON)` forces a random
//! intent at confidence 0.3, exercising mis-classification paths.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::flow::{IntentDef, SlotType};
use crate::domain::session::Classification;
use crate::ports::{ClassifierError, IntentClassifier};

const MISCLASSIFY_SENTINEL: &str = "(HANG ON)";
const SENTINEL_CONFIDENCE: f64 = 0.3;

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid pattern"));

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid pattern"));

static US_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").expect("valid pattern"));

static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:next\s+)?\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("valid pattern")
});

static CLOCK_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\s*(am|pm)?\b").expect("valid pattern"));

static HOUR_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\s*(am|pm)\b").expect("valid pattern"));

static CAPITALIZED_BIGRAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+\s+[A-Z][a-z]+)\b").expect("valid pattern"));

static PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(?\d{3}\)?[-.\s]\d{3}[-.\s]?\d{4}|\b\d{3}[-.]\d{4}\b|\b\d{10}\b")
        .expect("valid pattern")
});

/// Deterministic token-overlap intent classifier.
pub struct PatternClassifier;

impl PatternClassifier {
    /// Creates the classifier.
    pub fn new() -> Self {
        Self
    }

    fn score(examples: &[String], text_tokens: &BTreeSet<String>) -> f64 {
        let example_tokens: BTreeSet<String> = examples
            .iter()
            .flat_map(|example| tokenize(example))
            .collect();
        if example_tokens.is_empty() {
            return 0.0;
        }
        let matched = example_tokens
            .iter()
            .filter(|token| text_tokens.contains(*token))
            .count();
        matched as f64 / example_tokens.len() as f64
    }

    fn extract_slots(text: &str, definition: &IntentDef) -> Value {
        let mut slots = Map::new();
        for (name, slot_type) in &definition.slots {
            if let Some(value) = extract_slot(text, *slot_type) {
                slots.insert(name.clone(), value);
            }
        }
        Value::Object(slots)
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentClassifier for PatternClassifier {
    async fn classify(
        &self,
        text: &str,
        intents: &BTreeMap<String, IntentDef>,
        _context: &Value,
    ) -> Result<Classification, ClassifierError> {
        if intents.is_empty() {
            return Ok(Classification::new("unknown", 0.0));
        }

        if text.contains(MISCLASSIFY_SENTINEL) {
            let index = rand::thread_rng().gen_range(0..intents.len());
            let (name, definition) = intents.iter().nth(index).expect("index in range");
            return Ok(Classification::new(name, SENTINEL_CONFIDENCE)
                .with_slots(Self::extract_slots(text, definition)));
        }

        let text_tokens: BTreeSet<String> = tokenize(text).collect();
        let (name, definition, confidence) = intents
            .iter()
            .map(|(name, definition)| {
                (
                    name,
                    definition,
                    Self::score(&definition.examples, &text_tokens),
                )
            })
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
            .expect("intents is non-empty");

        Ok(Classification::new(name, confidence.clamp(0.0, 1.0))
            .with_slots(Self::extract_slots(text, definition)))
    }
}

/// Lowercased tokens with surrounding punctuation trimmed; internal
/// separators (`555-1234`, `7pm`, `2025-05-01`) survive.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
}

fn extract_slot(text: &str, slot_type: SlotType) -> Option<Value> {
    match slot_type {
        SlotType::Number => {
            let raw = NUMBER.find(text)?.as_str();
            raw.parse::<i64>().ok().map(Value::from)
        }
        SlotType::Date => extract_date(&text.to_lowercase()).map(Value::from),
        SlotType::Time => extract_time(&text.to_lowercase()).map(Value::from),
        SlotType::Name => CAPITALIZED_BIGRAM
            .captures(text)
            .map(|caps| Value::from(caps[1].to_string())),
        SlotType::Phone => PHONE
            .find(text)
            .map(|m| Value::from(m.as_str().trim().to_string())),
        SlotType::String => Some(Value::from(text.trim().to_string())),
    }
}

fn extract_date(text: &str) -> Option<String> {
    let today = Utc::now().date_naive();

    if text.contains("today") {
        return Some(today.to_string());
    }
    if text.contains("tomorrow") {
        return Some((today + Duration::days(1)).to_string());
    }
    if let Some(caps) = ISO_DATE.captures(text) {
        return Some(caps[0].to_string());
    }
    if let Some(caps) = US_DATE.captures(text) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).map(|d| d.to_string());
    }
    if let Some(caps) = WEEKDAY.captures(text) {
        let target = parse_weekday(&caps[1])?;
        let today_index = today.weekday().num_days_from_monday() as i64;
        let target_index = target.num_days_from_monday() as i64;
        let mut ahead = (target_index - today_index).rem_euclid(7);
        if ahead == 0 {
            ahead = 7;
        }
        return Some((today + Duration::days(ahead)).to_string());
    }
    None
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn extract_time(text: &str) -> Option<String> {
    if let Some(caps) = CLOCK_TIME.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps[2].parse().ok()?;
        let hour = normalize_hour(hour, caps.get(3).map(|m| m.as_str()))?;
        if minute > 59 {
            return None;
        }
        return Some(format!("{:02}:{:02}", hour, minute));
    }
    if let Some(caps) = HOUR_TIME.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let hour = normalize_hour(hour, Some(&caps[2]))?;
        return Some(format!("{:02}:00", hour));
    }
    None
}

fn normalize_hour(hour: u32, meridiem: Option<&str>) -> Option<u32> {
    match meridiem {
        Some("pm") if hour < 12 => Some(hour + 12),
        Some("am") if hour == 12 => Some(0),
        Some(_) if hour <= 12 => Some(hour % 12 + if meridiem == Some("pm") { 12 } else { 0 }),
        None if hour <= 23 => Some(hour),
        _ => None,
    }
}
