//! Call-site resolution from outside the crate

use buffered_logger::*;
use std::sync::Arc;

#[inline(never)]
fn current_site(resolver: &LocationResolver) -> Arc<CallSite> {
    resolver.resolve(0).unwrap()
}

#[inline(never)]
fn outer_site(resolver: &LocationResolver) -> Arc<CallSite> {
    nested(resolver)
}

#[inline(never)]
fn nested(resolver: &LocationResolver) -> Arc<CallSite> {
    resolver.resolve(1).unwrap()
}

// Release builds carry function names but no line tables
fn assert_in_this_file(site: &CallSite) {
    if site.has_location() {
        assert_eq!(site.file_name, "location.rs");
    } else {
        assert_eq!(site.file_line(), "");
    }
}

#[test]
fn test_same_site_resolves_once() {
    let resolver = LocationResolver::new();

    let first = current_site(&resolver);
    let second = current_site(&resolver);

    assert_eq!(first, second);
    assert_eq!(resolver.cached_sites(), 1);
    assert_in_this_file(&first);
    assert!(first.function.as_deref().unwrap_or_default().contains("current_site"));
}

#[test]
fn test_skip_walks_past_helpers() {
    let resolver = LocationResolver::new();

    let site = outer_site(&resolver);

    assert_in_this_file(&site);
    assert!(site.function.as_deref().unwrap_or_default().contains("outer_site"));
}

#[test]
fn test_track_caller_sites_share_the_cache() {
    let resolver = Arc::new(LocationResolver::new());

    let sites: Vec<_> = (0..3)
        .map(|_| resolver.resolve_location(std::panic::Location::caller()))
        .collect();

    assert_eq!(resolver.cached_sites(), 1);
    assert!(sites.iter().all(|site| site.file_name == "location.rs"));
}

#[tokio::test]
async fn test_logger_reuses_call_sites() {
    let sink = MemorySink::new();
    let resolver = Arc::new(LocationResolver::new());
    let logger = BufferedLogger::with_resolver(
        BufferedLoggerConfig::default(),
        sink.clone(),
        resolver.clone(),
    )
    .await
    .unwrap();

    for i in 0..10 {
        logger.info(format_args!("tick {i}"));
    }
    logger.flush_all().await.unwrap();

    assert_eq!(resolver.cached_sites(), 1);
    assert_eq!(sink.contents(Level::Info).lines().count(), 10);
}
