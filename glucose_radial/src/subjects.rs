//! Subject identifiers and the fixed study roster.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Every subject id enrolled in the study.
pub const SUBJECT_ID_RANGE: RangeInclusive<u16> = 1..=16;

/// Subjects whose exports are corrupted and never loaded.
pub const EXCLUDED_SUBJECTS: [u16; 5] = [3, 7, 13, 15, 16];

/// Subject rendered when the caller does not pick one.
pub const DEFAULT_SUBJECT: SubjectId = SubjectId(1);

/// Numeric subject id, displayed zero-padded to three digits (`001`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u16);

impl SubjectId {
    /// Key used for the per-subject collections in exported reports (`id_001`).
    pub fn label(&self) -> String {
        format!("id_{}", self)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl From<u16> for SubjectId {
    fn from(value: u16) -> Self {
        SubjectId(value)
    }
}

pub fn is_excluded(id: SubjectId, excluded: &[u16]) -> bool {
    excluded.contains(&id.0)
}

/// Ids in `range` minus the excluded ones, in ascending order.
pub fn study_subjects(range: RangeInclusive<u16>, excluded: &[u16]) -> Vec<SubjectId> {
    range
        .map(SubjectId)
        .filter(|id| !is_excluded(*id, excluded))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roster_skips_corrupted_subjects() {
        let ids: Vec<u16> = study_subjects(SUBJECT_ID_RANGE, &EXCLUDED_SUBJECTS)
            .into_iter()
            .map(|id| id.0)
            .collect();
        assert_eq!(ids, vec![1, 2, 4, 5, 6, 8, 9, 10, 11, 12, 14]);
    }

    #[test]
    fn ids_are_zero_padded() {
        assert_eq!(SubjectId(1).to_string(), "001");
        assert_eq!(SubjectId(14).label(), "id_014");
    }
}
