//! Multi-organization resolution.

use std::sync::Arc;
use std::time::Duration;

use translation_helps_server::cache::{ArchiveCache, ArchiveKey, CachePolicy, CatalogCache};
use translation_helps_server::catalog::ResourceKind;
use translation_helps_server::error::ResourceError;
use translation_helps_server::extract::ScriptureOptions;
use translation_helps_server::fetcher::{FetcherSettings, UnifiedFetcher};
use translation_helps_server::resolver::{OrgSelector, ResolveRequest, Resolver};
use translation_helps_server::testing::fixtures::{JHN_USFM, TIT_USFM};
use translation_helps_server::testing::MockCatalog;
use translation_helps_server::trace::SpanCollector;

fn two_orgs() -> MockCatalog {
    MockCatalog::new()
        .with_repository("Alpha", "en_ult", "Aligned Bible", "v1", &[("44-JHN.usfm", JHN_USFM)])
        .with_repository("Beta", "en_ult", "Aligned Bible", "v2", &[("44-JHN.usfm", JHN_USFM)])
        .with_repository("Beta", "en_glt", "Aligned Bible", "v3", &[("57-TIT.usfm", TIT_USFM)])
}

fn fetcher(catalog: Arc<MockCatalog>) -> UnifiedFetcher {
    UnifiedFetcher::new(catalog, FetcherSettings::default())
}

fn orgs(names: &[&str]) -> OrgSelector {
    OrgSelector::from_names(names.iter().map(|n| n.to_string()))
}

async fn john(fetcher: &UnifiedFetcher, selector: &OrgSelector, variants: &[&str]) -> Result<Vec<String>, ResourceError> {
    let variants: Vec<String> = variants.iter().map(|v| v.to_string()).collect();
    let mut found: Vec<String> = fetcher
        .fetch_scripture(
            "John 3:16",
            "en",
            selector,
            &variants,
            ScriptureOptions::default(),
            &SpanCollector::new(),
        )
        .await?
        .into_iter()
        .map(|r| format!("{} {}", r.organization, r.translation))
        .collect();
    found.sort_unstable();
    Ok(found)
}

#[tokio::test]
async fn absent_organization_is_skipped() {
    let catalog = Arc::new(two_orgs());
    let fetcher = fetcher(catalog);

    let found = john(&fetcher, &orgs(&["Gamma", "Beta"]), &[]).await.unwrap();
    assert_eq!(found, ["Beta ULT v2"]);
}

#[tokio::test]
async fn every_organization_absent_is_not_found() {
    let fetcher = fetcher(Arc::new(two_orgs()));

    let err = john(&fetcher, &orgs(&["Gamma", "Delta"]), &[]).await.unwrap_err();
    assert!(matches!(err, ResourceError::NotFound { .. }), "{err:?}");
    assert!(err.to_string().contains("John 3:16"));
}

#[tokio::test]
async fn all_organizations_fan_out() {
    let fetcher = fetcher(Arc::new(two_orgs()));

    let found = john(&fetcher, &OrgSelector::All, &["ult"]).await.unwrap();
    assert_eq!(found, ["Alpha ULT v1", "Beta ULT v2"]);
}

#[tokio::test]
async fn variant_family_resolves_to_one_translation() {
    let fetcher = fetcher(Arc::new(MockCatalog::door43()));

    let found = john(&fetcher, &OrgSelector::All, &["ult", "glt"]).await.unwrap();
    assert_eq!(found, ["unfoldingWord ULT v86"]);
}

#[tokio::test]
async fn one_failed_archive_does_not_fail_the_request() {
    let catalog = Arc::new(two_orgs());
    catalog.fail_archive(ArchiveKey::new("Alpha", "en_ult", "v1"), 500);
    let fetcher = fetcher(catalog.clone());

    let found = john(&fetcher, &orgs(&["Alpha", "Beta"]), &[]).await.unwrap();
    assert_eq!(found, ["Beta ULT v2"]);
}

#[tokio::test]
async fn every_archive_failing_is_a_fetch_error() {
    let catalog = Arc::new(two_orgs());
    catalog.fail_archive(ArchiveKey::new("Alpha", "en_ult", "v1"), 500);
    catalog.fail_archive(ArchiveKey::new("Beta", "en_ult", "v2"), 503);
    let fetcher = fetcher(catalog);

    let err = john(&fetcher, &orgs(&["Alpha", "Beta"]), &[]).await.unwrap_err();
    assert!(matches!(err, ResourceError::Fetch { .. }), "{err:?}");
}

#[tokio::test]
async fn unreachable_catalog_falls_back_to_conventional_repository() {
    let catalog = Arc::new(MockCatalog::new().with_archive(
        ArchiveKey::new("Alpha", "en_ult", "master"),
        translation_helps_server::testing::zip_archive(&[("en_ult/44-JHN.usfm", JHN_USFM)]),
    ));
    catalog.set_catalog_down(true);
    let fetcher = fetcher(catalog);

    let found = john(&fetcher, &OrgSelector::One("Alpha".into()), &[]).await.unwrap();
    assert_eq!(found, ["Alpha ULT master"]);
}

#[tokio::test]
async fn resolver_keeps_the_first_result_per_key() {
    let catalog = Arc::new(two_orgs());
    let archives = Arc::new(ArchiveCache::new(catalog.clone(), CachePolicy::default()));
    let resolver = Resolver::new(
        archives,
        CatalogCache::new(catalog.clone(), Duration::from_secs(60)),
        "master",
    );
    let request = ResolveRequest {
        language: "en".into(),
        kind: ResourceKind::Scripture,
        variants: vec!["ult".into()],
        organizations: OrgSelector::All,
        identifier: "John".into(),
    };

    let trace = SpanCollector::new();
    let sizes = resolver
        .resolve(
            &request,
            &trace,
            |entry, _| Ok(entry.bytes.len()),
            |_: &usize| "same",
        )
        .await
        .unwrap();

    assert_eq!(sizes.len(), 1);
    assert_eq!(catalog.archive_fetches(), 2);
}
