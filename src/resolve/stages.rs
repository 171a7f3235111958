//! Pure pieces of the resolution cascade.

use std::sync::Arc;

use crate::matching::select_best;
use crate::metadata::slug_title;
use crate::model::{Item, MatchQuery, TitleInfo};
use crate::source::Source;

/// Titles to search for, in order: the catalog title, then the title hidden
/// in the slug when it differs (ignoring case).
pub fn title_variants(info: &TitleInfo) -> Vec<String> {
    let mut variants = vec![info.name.clone()];
    if let Some(alt) = info.slug.as_deref().and_then(slug_title) {
        if alt.to_lowercase() != info.name.to_lowercase() {
            variants.push(alt);
        }
    }
    variants
}

/// Last-resort query: the first word of a short title.
///
/// Titles of more than three words are too specific for a one-word search to
/// land on the right item, and a one-word title was already searched as is.
pub fn simplified_query(title: &str) -> Option<String> {
    let words: Vec<&str> = title.split_whitespace().collect();
    match words.as_slice() {
        [] | [_] => None,
        [first, ..] if words.len() <= 3 => Some((*first).to_string()),
        _ => None,
    }
}

/// Best item for `query`, judged against the canonical title first and the
/// searched variant second. Passing the canonical title as `variant` limits
/// the check to that title.
pub fn pick_match<'a>(items: &'a [Item], query: &MatchQuery, variant: &str) -> Option<&'a Item> {
    select_best(items, &query.title, query.content_type).or_else(|| {
        if variant == query.title {
            None
        } else {
            select_best(items, variant, query.content_type)
        }
    })
}

/// One source's pick for the current title.
#[derive(Clone)]
pub struct Matched {
    pub source: Arc<dyn Source>,
    pub item: Item,
}

impl std::fmt::Debug for Matched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matched")
            .field("source", &self.source.name())
            .field("item", &self.item.id)
            .finish()
    }
}

/// Run the selector over one tier of search results (one entry per source,
/// priority order). Sources without a match are left out.
pub fn match_tier(
    results: Vec<(Arc<dyn Source>, Vec<Item>)>,
    query: &MatchQuery,
    variant: &str,
) -> Vec<Matched> {
    results
        .into_iter()
        .filter_map(|(source, items)| {
            let item = pick_match(&items, query, variant)?.clone();
            Some(Matched { source, item })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentType;
    use crate::source::testing::FakeSource;

    fn info(name: &str, slug: Option<&str>) -> TitleInfo {
        TitleInfo {
            name: name.to_string(),
            release_year: None,
            slug: slug.map(ToString::to_string),
        }
    }

    fn query(title: &str, content_type: ContentType) -> MatchQuery {
        MatchQuery {
            title: title.to_string(),
            content_type,
            year: None,
        }
    }

    #[test]
    fn variants_add_distinct_slug_title() {
        assert_eq!(
            title_variants(&info("Amélie", Some("movie/le-fabuleux-destin-d-amelie-poulain-0211915"))),
            vec!["Amélie", "le fabuleux destin d amelie poulain"]
        );
        assert_eq!(
            title_variants(&info("Inception", Some("movie/inception-1375666"))),
            vec!["Inception"]
        );
        assert_eq!(title_variants(&info("Dark", None)), vec!["Dark"]);
    }

    #[test]
    fn simplified_query_guards_word_count() {
        assert_eq!(simplified_query("Le Fabuleux Destin d'Amélie Poulain"), None);
        assert_eq!(simplified_query("The Dark Knight").as_deref(), Some("The"));
        assert_eq!(simplified_query("Oppenheimer"), None);
        assert_eq!(simplified_query("   "), None);
    }

    #[test]
    fn pick_match_falls_back_to_variant() {
        let items = vec![Item::new("a:movie:1", ContentType::Movie, "Le Voyage de Chihiro")];
        let q = query("Spirited Away", ContentType::Movie);
        assert!(pick_match(&items, &q, "Spirited Away").is_none());
        let hit = pick_match(&items, &q, "le voyage de chihiro").unwrap();
        assert_eq!(hit.id, "a:movie:1");
    }

    #[test]
    fn canonical_only_rejects_word_containment() {
        let items = vec![Item::new("a:movie:9", ContentType::Movie, "The Office")];
        let q = query("The Dark Knight", ContentType::Movie);
        assert!(pick_match(&items, &q, &q.title).is_none());
    }

    #[test]
    fn match_tier_keeps_priority_and_drops_misses() {
        let a: Arc<dyn Source> = Arc::new(FakeSource::new("a"));
        let b: Arc<dyn Source> = Arc::new(FakeSource::new("b"));
        let c: Arc<dyn Source> = Arc::new(FakeSource::new("c"));
        let results = vec![
            (a, vec![Item::new("a:movie:1", ContentType::Movie, "Inception")]),
            (b, vec![Item::new("b:movie:9", ContentType::Movie, "Cars")]),
            (c, vec![Item::new("c:movie:3", ContentType::Movie, "Inception (2010)")]),
        ];
        let matched = match_tier(results, &query("Inception", ContentType::Movie), "Inception");
        let ids: Vec<_> = matched.iter().map(|m| m.item.id.as_str()).collect();
        assert_eq!(ids, vec!["a:movie:1", "c:movie:3"]);
    }
}
