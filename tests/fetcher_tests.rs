//! End-to-end fetcher behavior over the fixture catalog.

use std::sync::Arc;
use std::time::Duration;

use translation_helps_server::cache::ArchiveKey;
use translation_helps_server::catalog::ResourceKind;
use translation_helps_server::error::ResourceError;
use translation_helps_server::extract::ScriptureOptions;
use translation_helps_server::fetcher::{FetcherSettings, UnifiedFetcher};
use translation_helps_server::resolver::OrgSelector;
use translation_helps_server::testing::fixtures::{self, ORG};
use translation_helps_server::testing::MockCatalog;
use translation_helps_server::trace::{CacheStatus, SpanCollector};

fn fetcher_over(catalog: Arc<MockCatalog>) -> UnifiedFetcher {
    UnifiedFetcher::new(catalog, FetcherSettings::default())
}

fn fixture_fetcher() -> (Arc<MockCatalog>, UnifiedFetcher) {
    let catalog = Arc::new(MockCatalog::door43());
    (catalog.clone(), fetcher_over(catalog))
}

fn with_verses() -> ScriptureOptions {
    ScriptureOptions::default()
}

#[tokio::test]
async fn john_3_16_from_aligned_text() {
    let (_, fetcher) = fixture_fetcher();
    let trace = SpanCollector::new();

    let results = fetcher
        .fetch_scripture("John 3:16", "en", &OrgSelector::All, &[], with_verses(), &trace)
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let ult = &results[0];
    assert_eq!(
        ult.text,
        "16 For God so loved the world, that he gave his One and Only Son."
    );
    assert_eq!(ult.translation, "ULT v86");
    assert_eq!(ult.organization, ORG);
    assert_eq!(ult.reference, "John 3:16");
    assert_eq!(trace.status(), CacheStatus::Miss);
}

#[tokio::test]
async fn verse_numbers_can_be_left_out() {
    let (_, fetcher) = fixture_fetcher();
    let results = fetcher
        .fetch_scripture(
            "John 3:16-17",
            "en",
            &OrgSelector::One(ORG.into()),
            &[],
            ScriptureOptions {
                include_verse_numbers: false,
            },
            &SpanCollector::new(),
        )
        .await
        .unwrap();

    let text = &results[0].text;
    assert!(text.starts_with("For God so loved"));
    assert!(text.ends_with("into the world."));
    assert!(!text.contains("16 "));
}

#[tokio::test]
async fn several_translations_in_one_request() {
    let (_, fetcher) = fixture_fetcher();
    let results = fetcher
        .fetch_scripture(
            "Titus 1:1",
            "en",
            &OrgSelector::All,
            &["ult".to_string(), "ust".to_string()],
            with_verses(),
            &SpanCollector::new(),
        )
        .await
        .unwrap();

    let mut translations: Vec<&str> = results.iter().map(|r| r.translation.as_str()).collect();
    translations.sort_unstable();
    assert_eq!(translations, ["ULT v86", "UST v86"]);
}

#[tokio::test]
async fn invalid_reference_fails_before_any_fetch() {
    let (catalog, fetcher) = fixture_fetcher();
    let err = fetcher
        .fetch_scripture("Hezekiah 1:1", "en", &OrgSelector::All, &[], with_verses(), &SpanCollector::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ResourceError::InvalidReference(_)));
    assert!(catalog.calls().is_empty());
}

#[tokio::test]
async fn book_missing_from_translation_is_not_found() {
    let (_, fetcher) = fixture_fetcher();
    let err = fetcher
        .fetch_scripture("Genesis 1:1", "en", &OrgSelector::All, &[], with_verses(), &SpanCollector::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn notes_include_book_and_chapter_introductions() {
    let (_, fetcher) = fixture_fetcher();
    let rows = fetcher
        .fetch_annotations(
            "Titus 1:1",
            "en",
            &OrgSelector::All,
            ResourceKind::Notes,
            true,
            &SpanCollector::new(),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = rows.iter().filter_map(|r| r.get("ID")).collect();
    assert_eq!(ids, ["m2jr", "c3ab", "rtc9", "zsy2"]);
}

#[tokio::test]
async fn notes_without_introductions() {
    let (_, fetcher) = fixture_fetcher();
    let rows = fetcher
        .fetch_annotations(
            "Titus 1:1-2",
            "en",
            &OrgSelector::All,
            ResourceKind::Notes,
            false,
            &SpanCollector::new(),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = rows.iter().filter_map(|r| r.get("ID")).collect();
    assert_eq!(ids, ["rtc9", "zsy2", "abc1"]);
}

#[tokio::test]
async fn chapter_without_notes_is_an_empty_list() {
    let (_, fetcher) = fixture_fetcher();
    let rows = fetcher
        .fetch_annotations(
            "Titus 3:1",
            "en",
            &OrgSelector::All,
            ResourceKind::Questions,
            false,
            &SpanCollector::new(),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn academy_module_searches_categories_in_order() {
    let (_, fetcher) = fixture_fetcher();
    let article = fetcher
        .fetch_markdown(
            "en",
            &OrgSelector::All,
            ResourceKind::Academy,
            Some("figs-metaphor"),
            &SpanCollector::new(),
        )
        .await
        .unwrap();

    assert_eq!(article.path, "translate/figs-metaphor");
    assert_eq!(article.title.as_deref(), Some(fixtures::TA_METAPHOR_TITLE));
    assert!(article.content.contains("A metaphor is a figure of speech"));
}

#[tokio::test]
async fn academy_rc_link_and_table_of_contents() {
    let (_, fetcher) = fixture_fetcher();
    let by_link = fetcher
        .fetch_markdown(
            "en",
            &OrgSelector::All,
            ResourceKind::Academy,
            Some("rc://*/ta/man/translate/figs-metaphor"),
            &SpanCollector::new(),
        )
        .await
        .unwrap();
    assert_eq!(by_link.path, "translate/figs-metaphor");

    let toc = fetcher
        .fetch_markdown("en", &OrgSelector::All, ResourceKind::Academy, None, &SpanCollector::new())
        .await
        .unwrap();
    assert!(toc.content.starts_with("# Translation Academy"));
    assert!(toc.content.contains("translate/figs-metaphor"));
}

#[tokio::test]
async fn unknown_academy_module_is_not_found() {
    let (_, fetcher) = fixture_fetcher();
    let err = fetcher
        .fetch_markdown(
            "en",
            &OrgSelector::All,
            ResourceKind::Academy,
            Some("figs-nothing"),
            &SpanCollector::new(),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn word_by_term_searches_categories() {
    let (_, fetcher) = fixture_fetcher();
    let words = fetcher
        .fetch_word("God", None, "en", &OrgSelector::All, &SpanCollector::new())
        .await
        .unwrap();

    assert_eq!(words.len(), 1);
    assert_eq!(words[0].term, "god");
    assert_eq!(words[0].organization, ORG);
    assert_eq!(words[0].article.path, "bible/kt/god.md");
    assert_eq!(words[0].article.title.as_deref(), Some("God"));
}

#[tokio::test]
async fn words_for_reference_follow_links_and_merge_traces() {
    let (_, fetcher) = fixture_fetcher();
    let trace = SpanCollector::new();
    let words = fetcher
        .fetch_words_for_reference("Titus 1:1-2", "en", &OrgSelector::All, &trace)
        .await
        .unwrap();

    // eternity is linked but not in the archive; god is linked twice
    let mut terms: Vec<&str> = words.iter().map(|w| w.term.as_str()).collect();
    terms.sort_unstable();
    assert_eq!(terms, ["god", "paul"]);

    let paths: Vec<String> = trace.trace().spans.iter().map(|s| s.url.clone()).collect();
    assert!(paths.iter().any(|p| p.contains("en_twl")), "{paths:?}");
    assert!(paths.iter().any(|p| p.contains("en_tw@") || p.contains("en_tw/")), "{paths:?}");
}

#[tokio::test]
async fn raw_file_serves_an_article_when_the_archive_is_down() {
    let key = ArchiveKey::new(ORG, "en_tw", "master");
    let catalog = Arc::new(
        MockCatalog::new().with_raw_file(key.clone(), "bible/kt/love.md", "# Love\n\nTo love is to care.\n"),
    );
    catalog.set_catalog_down(true);
    let fetcher = fetcher_over(catalog.clone());

    let trace = SpanCollector::new();
    let article = fetcher
        .fetch_markdown(
            "en",
            &OrgSelector::One(ORG.into()),
            ResourceKind::Words,
            Some("bible/kt/love.md"),
            &trace,
        )
        .await
        .unwrap();

    assert_eq!(article.title.as_deref(), Some("Love"));
    assert_eq!(catalog.fetches_for(&key), 1);
    assert!(trace
        .trace()
        .spans
        .iter()
        .any(|s| s.url.contains("/raw/branch/master/bible/kt/love.md")));
}

#[tokio::test(start_paused = true)]
async fn slow_catalog_times_out() {
    let catalog = Arc::new(MockCatalog::door43().with_latency(Duration::from_secs(60)));
    let fetcher = UnifiedFetcher::new(
        catalog,
        FetcherSettings {
            timeout: Duration::from_secs(5),
            ..FetcherSettings::default()
        },
    );

    let err = fetcher
        .fetch_scripture("John 3:16", "en", &OrgSelector::All, &[], with_verses(), &SpanCollector::new())
        .await
        .unwrap_err();
    assert_eq!(err, ResourceError::Timeout(5));
}

#[tokio::test(start_paused = true)]
async fn linked_words_share_one_deadline() {
    // Each phase (link table, then articles) needs two 2s catalog calls.
    let catalog = Arc::new(MockCatalog::door43().with_latency(Duration::from_secs(2)));
    let fetcher = UnifiedFetcher::new(
        catalog,
        FetcherSettings {
            timeout: Duration::from_secs(5),
            ..FetcherSettings::default()
        },
    );

    let err = fetcher
        .fetch_words_for_reference("Titus 1:1-2", "en", &OrgSelector::All, &SpanCollector::new())
        .await
        .unwrap_err();
    assert_eq!(err, ResourceError::Timeout(5));
}

#[tokio::test]
async fn languages_are_listed_with_a_network_span() {
    let (_, fetcher) = fixture_fetcher();
    let trace = SpanCollector::new();
    let languages = fetcher.list_languages(None, &trace).await.unwrap();

    let codes: Vec<&str> = languages.iter().map(|l| l.code.as_str()).collect();
    assert_eq!(codes, ["en", "es-419"]);
    let spans = trace.trace().spans;
    assert_eq!(spans.len(), 1);
    assert!(!spans[0].is_internal());
}
