//! Metadata anchors: entities, numbers and dates that survive translation.
//!
//! Anchors supplied by ingestion are normalized and used as-is. Missing
//! categories are extracted from the item's own text, independently per item.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

use crate::models::FeedItem;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid ISO date regex"));

static DMY_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[./](\d{1,2})[./](\d{4})\b").expect("valid day-month-year regex")
});

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d(?:[\d.,]*\d)?").expect("valid number regex"));

static THOUSANDS_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})+$").expect("valid thousands regex"));

static THOUSANDS_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:\.\d{3})+$").expect("valid thousands regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchors {
    pub entities: BTreeSet<String>,
    pub numbers: BTreeSet<String>,
    pub dates: BTreeSet<String>,
}

impl Anchors {
    pub fn for_item(item: &FeedItem) -> Self {
        let text = item.full_text();
        // Dates are blanked out first so their digits are not read as numbers.
        let (extracted_dates, undated) = extract_dates(&text);

        let entities = match &item.entities {
            Some(given) => given.iter().filter_map(|e| normalize_entity(e)).collect(),
            None => extract_entities(&text),
        };
        let numbers = match &item.numbers {
            Some(given) => given.iter().filter_map(|n| normalize_number(n)).collect(),
            None => extract_numbers(&undated),
        };
        let dates = match &item.dates {
            Some(given) => given.iter().filter_map(|d| normalize_date(d)).collect(),
            None => extracted_dates,
        };

        Self {
            entities,
            numbers,
            dates,
        }
    }

    /// Anchors in common, summed over all three categories.
    pub fn shared_count(&self, other: &Anchors) -> usize {
        self.entities.intersection(&other.entities).count()
            + self.numbers.intersection(&other.numbers).count()
            + self.dates.intersection(&other.dates).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.numbers.is_empty() && self.dates.is_empty()
    }
}

fn normalize_entity(raw: &str) -> Option<String> {
    let normalized = raw.trim().nfc().collect::<String>().to_lowercase();
    (!normalized.is_empty()).then_some(normalized)
}

/// Removes thousands separators and turns a decimal comma into a point.
fn normalize_number(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let normalized = if THOUSANDS_COMMA.is_match(raw) {
        raw.replace(',', "")
    } else if THOUSANDS_DOT.is_match(raw) {
        raw.replace('.', "")
    } else {
        match raw.rfind(|c: char| c == '.' || c == ',') {
            Some(pos) => {
                let (int_part, frac_part) = raw.split_at(pos);
                let int_part: String = int_part.chars().filter(char::is_ascii_digit).collect();
                format!("{}.{}", int_part, &frac_part[1..])
            }
            None => raw.to_string(),
        }
    };

    let significant = normalized.chars().filter(char::is_ascii_digit).count();
    (significant >= 2).then_some(normalized)
}

fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Some(caps) = ISO_DATE.captures(raw) {
        return iso_date(&caps[1], &caps[2], &caps[3]);
    }
    if let Some(caps) = DMY_DATE.captures(raw) {
        return iso_date(&caps[3], &caps[2], &caps[1]);
    }
    let normalized = raw.to_lowercase();
    (!normalized.is_empty()).then_some(normalized)
}

fn iso_date(year: &str, month: &str, day: &str) -> Option<String> {
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Returns the dates found and the text with every valid date blanked out.
fn extract_dates(text: &str) -> (BTreeSet<String>, String) {
    let mut dates = BTreeSet::new();
    let mut blanked = text.to_string();

    for (pattern, order) in [(&*ISO_DATE, [1, 2, 3]), (&*DMY_DATE, [3, 2, 1])] {
        let mut spans = Vec::new();
        for caps in pattern.captures_iter(&blanked) {
            if let Some(date) = iso_date(&caps[order[0]], &caps[order[1]], &caps[order[2]]) {
                dates.insert(date);
                if let Some(m) = caps.get(0) {
                    spans.push(m.range());
                }
            }
        }
        for span in spans.into_iter().rev() {
            blanked.replace_range(span.clone(), &" ".repeat(span.len()));
        }
    }

    (dates, blanked)
}

fn extract_numbers(text: &str) -> BTreeSet<String> {
    NUMBER
        .find_iter(text)
        .filter_map(|m| normalize_number(m.as_str()))
        .collect()
}

/// Capitalized words that do not open a sentence, plus acronyms anywhere.
fn extract_entities(text: &str) -> BTreeSet<String> {
    let mut entities = BTreeSet::new();

    for sentence in text.split(|c: char| matches!(c, '.' | '!' | '?' | '\n')) {
        for (position, word) in sentence.split_whitespace().enumerate() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            let letters = word.chars().filter(|c| c.is_alphabetic()).count();
            let Some(first) = word.chars().next() else {
                continue;
            };

            let is_acronym = letters >= 2
                && word.chars().all(|c| !c.is_alphabetic() || c.is_uppercase());
            let is_name = position > 0 && first.is_uppercase() && word.chars().count() >= 3;

            if is_acronym || is_name {
                if let Some(entity) = normalize_entity(word) {
                    entities.insert(entity);
                }
            }
        }
    }

    entities
}
