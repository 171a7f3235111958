//! Benchmarks for title matching.
//!
//! Measures normalization, edit-distance similarity and best-match selection
//! over search result pages of realistic size.
//!
//! Run with: `cargo bench --bench matching_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sourcemux::matching::{normalize, select_best, similarity};
use sourcemux::{ContentType, Item};

// ---------------------------------------------------------------------------
// Title datasets
// ---------------------------------------------------------------------------

const TITLES: &[&str] = &[
    "Inception",
    "The Lord of the Rings: The Fellowship of the Ring",
    "Le Fabuleux Destin d'Amélie Poulain",
    "Spider-Man: Across the Spider-Verse",
    "Breaking Bad",
    "Mission: Impossible - Dead Reckoning Part One",
    "L'Attaque des Titans",
    "Æon Flux",
];

/// Pairs that are close but not identical after normalization.
const NEAR_PAIRS: &[(&str, &str)] = &[
    ("the dark knight", "the dark night"),
    ("interstellar", "interstelar"),
    ("la casa de papel", "la casa del papel"),
    ("game of thrones", "games of throne"),
];

fn search_page(size: usize, target_at: Option<usize>) -> Vec<Item> {
    (0..size)
        .map(|i| {
            let name = if Some(i) == target_at {
                "Breaking Bad".to_string()
            } else {
                format!("{} {i}", TITLES[i % TITLES.len()])
            };
            let kind = if i % 3 == 0 || Some(i) == target_at {
                ContentType::Series
            } else {
                ContentType::Movie
            };
            Item::new(format!("bench:{}:{i}", kind.as_str()), kind, name)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize_titles", |b| {
        b.iter(|| {
            for title in TITLES {
                black_box(normalize(black_box(title)));
            }
        });
    });
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");

    group.bench_function("near_pairs", |b| {
        b.iter(|| {
            for (a, b2) in NEAR_PAIRS {
                black_box(similarity(black_box(a), black_box(b2)));
            }
        });
    });

    let long = normalize(TITLES[1]);
    let other = normalize(TITLES[5]);
    group.bench_function("long_titles", |b| {
        b.iter(|| black_box(similarity(black_box(&long), black_box(&other))));
    });

    group.finish();
}

fn bench_select_best(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_best");

    for size in [10usize, 50, 200] {
        let hit = search_page(size, Some(size / 2));
        group.bench_with_input(BenchmarkId::new("hit", size), &hit, |b, items| {
            b.iter(|| {
                black_box(select_best(
                    black_box(items),
                    "Breaking Bad",
                    ContentType::Series,
                ))
            });
        });

        let miss = search_page(size, None);
        group.bench_with_input(BenchmarkId::new("miss", size), &miss, |b, items| {
            b.iter(|| {
                black_box(select_best(
                    black_box(items),
                    "Les Demoiselles de Rochefort",
                    ContentType::Movie,
                ))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_similarity, bench_select_best);
criterion_main!(benches);
