// tests/projection_e2e.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rank_projector::fetch::sources::FixturePageSource;
use rank_projector::fetch::types::PageSource;
use rank_projector::score::PointAward;
use rank_projector::{ContentFetcher, Matchup, Projector, RankExtractor, ScoringCriteria, Winner};
use serde_json::json;

const CUBS: &str = r#"<table>
  <tr><td>Earned Run Average</td><td>3.10 (#5)</td></tr>
  <tr><td>On Base %</td><td>.320 (#10)</td></tr>
  <tr><td>WHIP</td><td>1.20 (#2)</td></tr>
</table>"#;

const METS: &str = r#"<table>
  <tr><td>Earned Run Average</td><td>3.60 (#8)</td></tr>
  <tr><td>On Base %</td><td>.322 (#9)</td></tr>
</table>"#;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn categories() -> Vec<String> {
    vec!["Earned Run Average".into(), "On Base %".into(), "WHIP".into()]
}

fn criteria() -> ScoringCriteria {
    ScoringCriteria::new([("earned run average", 1.0), ("on base", 0.5), ("whip", 0.0)])
}

fn resolver(team: &str) -> String {
    format!("http://stats.test/{}", team.trim().to_lowercase())
}

/// Counts calls per run, delegating to fixtures.
struct CountingSource {
    inner: FixturePageSource,
    calls: AtomicUsize,
}

#[async_trait]
impl PageSource for CountingSource {
    async fn get(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(url).await
    }
    fn name(&self) -> &'static str {
        "counting"
    }
}

fn projector(src: Arc<dyn PageSource>) -> (Projector, Arc<RankExtractor>) {
    let fetcher = ContentFetcher::new(src, 4, Duration::from_secs(1));
    let extractor = Arc::new(RankExtractor::new(fetcher, 16).unwrap());
    (Projector::new(extractor.clone()), extractor)
}

#[tokio::test]
async fn projects_matchup_and_memoizes_teams() {
    let src = Arc::new(CountingSource {
        inner: FixturePageSource::new()
            .with_page("http://stats.test/cubs", CUBS)
            .with_page("http://stats.test/mets", METS),
        calls: AtomicUsize::new(0),
    });
    let (projector, _) = projector(src.clone());
    let games = vec![
        Matchup::new("Cubs", "Mets", d("2024-05-09")),
        Matchup::new("Mets", "cubs", d("2024-05-10")),
    ];

    let out = projector
        .build_projections(&games, &criteria(), &resolver, &categories())
        .await;
    assert_eq!(out.len(), 2);
    assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    assert_eq!(projector.memoized_teams(), 2);

    let first = &out[0];
    // ERA: 5 vs 8 > 1 → home; OBP: 10 vs 9, gap 1 > 0.5 → away; WHIP unavailable for Mets.
    assert_eq!(first.per_category.len(), 2);
    assert_eq!(first.home_total, 1);
    assert_eq!(first.away_total, 1);
    assert_eq!(first.winner, Winner::Tie);
    assert_eq!(first.winner_name(), "Tie");
    let era = first
        .per_category
        .iter()
        .find(|c| c.category == "earned run average")
        .unwrap();
    assert_eq!(era.point_awarded_to, PointAward::Home);

    projector
        .build_projections(&games, &criteria(), &resolver, &categories())
        .await;
    assert_eq!(src.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unreachable_team_skips_its_matchups() {
    let src = Arc::new(FixturePageSource::new().with_page("http://stats.test/cubs", CUBS));
    let (projector, _) = projector(src);
    let games = vec![
        Matchup::new("Cubs", "Mets", d("2024-05-09")),
        Matchup::new("Cubs", "Cubs", d("2024-05-09")),
        Matchup::new("", "Mets", d("2024-05-09")),
    ];
    let out = projector
        .build_projections(&games, &criteria(), &resolver, &categories())
        .await;
    assert!(out.is_empty());
}

#[tokio::test]
async fn no_successful_fetch_yields_nothing() {
    struct Down;
    #[async_trait]
    impl PageSource for Down {
        async fn get(&self, url: &str) -> Result<String> {
            Err(anyhow!("connection refused: {url}"))
        }
        fn name(&self) -> &'static str {
            "down"
        }
    }
    let (projector, extractor) = projector(Arc::new(Down));
    let games = vec![Matchup::new("Cubs", "Mets", d("2024-05-09"))];
    let out = projector
        .build_projections(&games, &criteria(), &resolver, &categories())
        .await;
    assert!(out.is_empty());
    assert_eq!(extractor.parse_count(), 0);
}

#[tokio::test]
async fn no_data_page_is_never_parsed() {
    let src = Arc::new(
        FixturePageSource::new().with_page("http://stats.test/cubs", "No data available"),
    );
    let (_, extractor) = projector(src);
    let ranks = extractor
        .fetch_and_extract("http://stats.test/cubs", "Cubs", &categories())
        .await;
    assert!(ranks.is_empty());
    assert_eq!(extractor.parse_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn identical_pages_fetched_concurrently_parse_once() {
    let src = Arc::new(
        FixturePageSource::new()
            .with_page("http://stats.test/a", CUBS)
            .with_page("http://stats.test/b", CUBS),
    );
    let (_, extractor) = projector(src);
    let cats = categories();
    let (a, b) = tokio::join!(
        extractor.fetch_and_extract("http://stats.test/a", "A", &cats),
        extractor.fetch_and_extract("http://stats.test/b", "B", &cats),
    );
    assert_eq!(a, b);
    assert_eq!(extractor.parse_count(), 1);
}

#[tokio::test]
async fn untyped_boundary_rejects_wrong_shapes() {
    let src = Arc::new(
        FixturePageSource::new()
            .with_page("http://stats.test/cubs", CUBS)
            .with_page("http://stats.test/mets", METS),
    );
    let (projector, _) = projector(src);
    let cats = categories();

    let bad = projector
        .build_projections_from_value(
            &json!({"home": "Cubs"}),
            &json!({"whip": 0.0}),
            &resolver,
            &cats,
            "%Y-%m-%d",
        )
        .await;
    assert!(bad.is_empty());

    let bad_criteria = projector
        .build_projections_from_value(
            &json!([{"home": "Cubs", "away": "Mets", "date": "2024-05-09"}]),
            &json!(["whip"]),
            &resolver,
            &cats,
            "%Y-%m-%d",
        )
        .await;
    assert!(bad_criteria.is_empty());

    let good = projector
        .build_projections_from_value(
            &json!([{"home": "Cubs", "away": "Mets", "date": "2024-05-09"}]),
            &json!({"Earned Run Average": 1.0}),
            &resolver,
            &cats,
            "%Y-%m-%d",
        )
        .await;
    assert_eq!(good.len(), 1);
    assert_eq!(good[0].winner, Winner::Home);
    assert_eq!(good[0].winner_name(), "Cubs");
}

#[tokio::test]
async fn breakdown_keeps_configured_category_order() {
    let src = Arc::new(
        FixturePageSource::new()
            .with_page("http://stats.test/cubs", CUBS)
            .with_page("http://stats.test/mets", METS),
    );
    let (projector, _) = projector(src);
    let games = vec![Matchup::new("Cubs", "Mets", d("2024-05-09"))];
    let cats = vec!["On Base %".to_string(), "Earned Run Average".to_string()];

    let criteria = criteria().ordered_by(&cats);
    let out = projector
        .build_projections(&games, &criteria, &resolver, &cats)
        .await;
    let order: Vec<&str> = out[0].per_category.iter().map(|c| c.category.as_str()).collect();
    assert_eq!(order, vec!["on base", "earned run average"]);

    let out = projector
        .build_projections_from_value(
            &json!([{"home": "Cubs", "away": "Mets", "date": "2024-05-09"}]),
            &json!({"On Base %": 0.5, "Earned Run Average": 1.0}),
            &resolver,
            &cats,
            "%Y-%m-%d",
        )
        .await;
    let order: Vec<&str> = out[0].per_category.iter().map(|c| c.category.as_str()).collect();
    assert_eq!(order, vec!["on base", "earned run average"]);
}

#[tokio::test]
async fn changed_category_list_refetches_teams() {
    let src = Arc::new(CountingSource {
        inner: FixturePageSource::new()
            .with_page("http://stats.test/cubs", CUBS)
            .with_page("http://stats.test/mets", METS),
        calls: AtomicUsize::new(0),
    });
    let (projector, _) = projector(src.clone());
    let games = vec![Matchup::new("Cubs", "Mets", d("2024-05-09"))];

    let era_only = vec!["Earned Run Average".to_string()];
    let out = projector
        .build_projections(&games, &criteria(), &resolver, &era_only)
        .await;
    assert_eq!(out[0].per_category.len(), 1);
    assert_eq!(src.calls.load(Ordering::SeqCst), 2);

    let out = projector
        .build_projections(&games, &criteria(), &resolver, &categories())
        .await;
    assert_eq!(src.calls.load(Ordering::SeqCst), 4);
    assert_eq!(projector.memoized_teams(), 4);
    // ERA and OBP now both scraped for both sides.
    assert_eq!(out[0].per_category.len(), 2);
}
