//! End-to-end harvest runs with mocked network sources.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use photoclusters_common::CrawlSettings;
use photoclusters_scout::testing::{raw_submission, solid_png_bytes, MockImageSource, MockSource};
use photoclusters_scout::{ClusterConfig, ColorClusterer, FeedCrawler, PhotoFetcher, Pipeline, PipelineSettings};
use photoclusters_store::{PhotoStore, Table};

fn settings(max_retries: u32) -> CrawlSettings {
    CrawlSettings {
        target: 10,
        page_size: 500,
        request_delay: Duration::ZERO,
        max_retries,
        backoff_schedule: vec![Duration::ZERO],
    }
}

fn pipeline(
    store: &PhotoStore,
    source: MockSource,
    images: MockImageSource,
    root: &Path,
    min_photo_bytes: i64,
) -> Pipeline {
    Pipeline::builder()
        .store(store.clone())
        .crawler(FeedCrawler::new(Arc::new(source), store.clone(), settings(1)))
        .fetcher(PhotoFetcher::new(Arc::new(images), root))
        .clusterer(ColorClusterer::new(ClusterConfig {
            sample_size: 500,
            seed: Some(1),
            ..ClusterConfig::default()
        }))
        .settings(PipelineSettings {
            crawl_target: 10,
            min_photo_bytes,
        })
        .build()
}

#[tokio::test]
async fn full_run_crawls_downloads_and_clusters() {
    let root = tempfile::tempdir().unwrap();
    let store = PhotoStore::in_memory().await.unwrap();

    let source = MockSource::new(vec![
        raw_submission("p0", "desert", 90, "https://i.imgur.com/p0.jpg"),
        raw_submission("p1", "desert", 80, "https://i.imgur.com/p1.png"),
        raw_submission("p2", "desert", 70, "https://i.imgur.com/p2.gif"),
        raw_submission("p3", "desert", 60, "https://i.imgur.com/p3.jpg"),
    ]);
    let images = MockImageSource::new()
        .on_url("https://i.imgur.com/p0.jpg", solid_png_bytes(40, 40, [220, 180, 90]))
        .on_url("https://i.imgur.com/p1.png", solid_png_bytes(20, 20, [20, 20, 120]));

    let stats = pipeline(&store, source, images, root.path(), 0)
        .run(&["desert".to_string()])
        .await;

    assert_eq!(stats.submissions_stored, 4);
    assert_eq!(stats.photos_downloaded, 2);
    assert_eq!(stats.download_skips, 1);
    assert_eq!(stats.photos_stored, 2);
    assert_eq!(stats.files_clustered, 2);
    assert!(stats.finished_at.is_some());

    assert!(root.path().join("desert").join("p0.jpg").exists());
    assert!(!root.path().join("desert").join("p3.jpg").exists());

    let p0 = store.cluster_result("p0.jpg").await.unwrap().unwrap();
    assert_eq!(p0.subreddit, "desert");
    assert_eq!(p0.cluster_count(), 1);
    assert_eq!(p0.cluster_weights.to_vec(), vec![500]);
    let p1 = store.cluster_result("p1.png").await.unwrap().unwrap();
    assert_eq!(p1.cluster_weights.to_vec(), vec![400]);
}

#[tokio::test]
async fn undersized_photos_are_pruned_and_large_ones_kept() {
    let root = tempfile::tempdir().unwrap();
    let store = PhotoStore::in_memory().await.unwrap();

    let source = MockSource::new(vec![
        raw_submission("small", "goth", 20, "https://x/small.jpg"),
        raw_submission("large", "goth", 10, "https://x/large.jpg"),
    ]);
    let images = MockImageSource::new()
        .on_url("https://x/small.jpg", vec![0u8; 100])
        .on_url("https://x/large.jpg", vec![0u8; 5000]);

    let stats = pipeline(&store, source, images, root.path(), 3000)
        .run(&["goth".to_string()])
        .await;

    assert_eq!(stats.photos_pruned, 1);
    assert!(store.photo("small").await.unwrap().is_none());
    assert!(!root.path().join("goth").join("small.jpg").exists());
    assert_eq!(store.photo("large").await.unwrap().unwrap().size_bytes, 5000);
    assert!(root.path().join("goth").join("large.jpg").exists());

    // Not an image: clustering skips it and stores nothing.
    assert_eq!(stats.clustering_skips, 1);
    assert_eq!(store.count(Table::Clusters).await.unwrap(), 0);
}

#[tokio::test]
async fn second_run_finds_nothing_new() {
    let root = tempfile::tempdir().unwrap();
    let store = PhotoStore::in_memory().await.unwrap();
    let universe = vec![raw_submission("a", "desert", 5, "https://x/a.png")];
    let bytes = solid_png_bytes(16, 16, [1, 2, 3]);

    let first = pipeline(
        &store,
        MockSource::new(universe.clone()),
        MockImageSource::new().on_url("https://x/a.png", bytes.clone()),
        root.path(),
        0,
    )
    .run(&["desert".to_string()])
    .await;
    assert_eq!(first.files_clustered, 1);

    let second = pipeline(
        &store,
        MockSource::new(universe),
        MockImageSource::new().on_url("https://x/a.png", bytes),
        root.path(),
        0,
    )
    .run(&["desert".to_string()])
    .await;
    assert_eq!(second.submissions_stored, 0);
    assert_eq!(second.photos_stored, 0);
    assert_eq!(second.files_clustered, 0);
    assert_eq!(store.count(Table::Clusters).await.unwrap(), 1);
}

#[tokio::test]
async fn failing_search_is_counted_and_run_completes() {
    let root = tempfile::tempdir().unwrap();
    let store = PhotoStore::in_memory().await.unwrap();

    let stats = pipeline(
        &store,
        MockSource::new(Vec::new()).always_failing(),
        MockImageSource::new(),
        root.path(),
        3000,
    )
    .run(&["desert".to_string(), "goth".to_string()])
    .await;

    assert_eq!(stats.subreddits_crawled, 2);
    assert_eq!(stats.crawls_gave_up, 2);
    assert_eq!(stats.submissions_stored, 0);
    assert!(stats.finished_at.is_some());
}
