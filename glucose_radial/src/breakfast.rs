//! Per-day "standard breakfast" flag over a subject's food log.

use std::collections::HashMap;

use crate::food_log::FoodLogEntry;
use crate::wall_clock::format_day;

/// Food names (lower-case) that count as the standardized study breakfast.
pub const BREAKFAST_LEXICON: [&str; 7] = [
    "standard breakfast",
    "std breakfast",
    "frosted flakes",
    "corn flakes",
    "cornflakes",
    "frosted flake",
    "std bfast",
];

/// Exact, case-insensitive lexicon membership. No trimming, no substrings.
pub fn is_standard_breakfast(logged_food: &str) -> bool {
    let lowered = logged_food.to_lowercase();
    BREAKFAST_LEXICON.contains(&lowered.as_str())
}

/// Rows of one subject that share a calendar day.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DayGroup {
    /// `YYYY-MM-DD`, or `Invalid Date` for rows without a begin time.
    pub day: String,
    /// Indices into the entry slice, in file order.
    pub rows: Vec<usize>,
}

/// Group entries by the day of `time_begin`, in order of first appearance.
///
/// Rows without a begin time all land in the single `Invalid Date` group.
pub fn group_by_day(entries: &[FoodLogEntry]) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (idx, entry) in entries.iter().enumerate() {
        let day = format_day(entry.time_begin.as_ref());
        match positions.get(&day) {
            Some(&pos) => groups[pos].rows.push(idx),
            None => {
                positions.insert(day.clone(), groups.len());
                groups.push(DayGroup {
                    day,
                    rows: vec![idx],
                });
            }
        }
    }
    groups
}

/// Stamp every entry with whether its day contains a standard breakfast.
///
/// Pure function of the day grouping and the lexicon, so re-running it is a
/// no-op.
pub fn derive_breakfast_flags(entries: &mut [FoodLogEntry]) {
    for group in group_by_day(entries) {
        let has_breakfast = group
            .rows
            .iter()
            .any(|&idx| is_standard_breakfast(&entries[idx].logged_food));
        for &idx in &group.rows {
            entries[idx].has_standard_breakfast = Some(has_breakfast);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BreakfastDay {
    pub day: String,
    pub entries: usize,
    pub has_standard_breakfast: bool,
}

/// One summary row per day group, computed from the food names directly.
pub fn breakfast_days(entries: &[FoodLogEntry]) -> Vec<BreakfastDay> {
    group_by_day(entries)
        .into_iter()
        .map(|group| BreakfastDay {
            has_standard_breakfast: group
                .rows
                .iter()
                .any(|&idx| is_standard_breakfast(&entries[idx].logged_food)),
            entries: group.rows.len(),
            day: group.day,
        })
        .collect()
}
