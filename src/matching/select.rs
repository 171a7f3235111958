use tracing::trace;

use super::{normalize, similarity};
use crate::model::{ContentType, Item};

/// Similarity a candidate must exceed when neither title contains the other.
pub const MATCH_THRESHOLD: f64 = 0.7;

/// Pick the candidate that best matches `target_title`.
///
/// Candidates of `target_type` are preferred; when none has that type the
/// whole list is considered, so a mislabelled but otherwise perfect hit is not
/// thrown away. An exact normalized match wins immediately. Otherwise the
/// highest-similarity candidate among those that either contain / are
/// contained in the target or score above [`MATCH_THRESHOLD`] is returned,
/// first seen winning ties.
#[must_use]
pub fn select_best<'a>(
    items: &'a [Item],
    target_title: &str,
    target_type: ContentType,
) -> Option<&'a Item> {
    let typed: Vec<&Item> = items
        .iter()
        .filter(|item| item.content_type == target_type)
        .collect();
    let candidates: Vec<&Item> = if typed.is_empty() {
        items.iter().collect()
    } else {
        typed
    };

    let target = normalize(target_title);
    let mut best: Option<(&Item, f64)> = None;

    for item in candidates {
        let name = normalize(&item.name);
        if name == target {
            return Some(item);
        }

        let contains = !name.is_empty()
            && !target.is_empty()
            && (name.contains(&target) || target.contains(&name));
        let score = similarity(&name, &target);

        if !(contains || score > MATCH_THRESHOLD) {
            continue;
        }

        trace!(candidate = %item.name, score, contains, "match candidate");
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((item, score));
        }
    }

    best.map(|(item, _)| item)
}
