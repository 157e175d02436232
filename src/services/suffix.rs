use std::collections::BTreeSet;

use crate::errors::ServiceError;
use crate::models::BaseOrderGroup;

/// Section letters already used by the persisted sections of `group`.
pub fn occupied_suffixes(group: &BaseOrderGroup) -> BTreeSet<char> {
    group
        .sections
        .iter()
        .filter_map(|section| section.id.suffix)
        .map(|letter| letter.to_ascii_uppercase())
        .collect()
}

/// First letter from `A` upwards that is not in `occupied`.
pub fn next_suffix(occupied: &BTreeSet<char>) -> Result<char, ServiceError> {
    ('A'..='Z')
        .find(|letter| !occupied.contains(letter))
        .ok_or_else(|| {
            ServiceError::InvalidOperation("all section letters A-Z are in use".to_string())
        })
}
