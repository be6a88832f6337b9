//! Integration tests for PhotoStore against in-memory and on-disk SQLite.

use ndarray::{array, Array1, Array2};
use photoclusters_common::{ClusterResult, Photo, Submission};
use photoclusters_store::{PhotoStore, Table, PENDING_PHOTO_LIMIT};

fn submission(id: &str, subreddit: &str, url: &str, score: i64) -> Submission {
    Submission {
        id: id.to_string(),
        title: format!("post {id}"),
        url: url.to_string(),
        url_domain: "i.imgur.com".to_string(),
        subreddit: subreddit.to_string(),
        subreddit_id: "t5_test".to_string(),
        permalink: format!("https://www.reddit.com/r/{subreddit}/comments/{id}/"),
        created_at: 1_600_000_000,
        author: "tester".to_string(),
        score,
    }
}

fn photo(id: &str, subreddit: &str, size: i64, path: &str) -> Photo {
    Photo {
        id: id.to_string(),
        filename: format!("{id}.jpg"),
        subreddit: subreddit.to_string(),
        size_bytes: size,
        path: path.to_string(),
    }
}

fn cluster_row(file: &str, subreddit: &str) -> ClusterResult {
    ClusterResult {
        file: file.to_string(),
        subreddit: subreddit.to_string(),
        sampled_pixels: Array2::from_shape_fn((6, 3), |(i, j)| i as f64 * 10.0 + j as f64),
        bandwidth: 12.5,
        labels: array![0, 0, 0, 1, 1, 1],
        cluster_centers: array![[1.0, 2.0, 3.0], [40.0, -5.5, 20.25]],
        cluster_weights: array![3, 3],
    }
}

// =========================================================================
// Submissions
// =========================================================================

#[tokio::test]
async fn existing_ids_are_scoped_to_subreddit() {
    let store = PhotoStore::in_memory().await.unwrap();
    store
        .insert_submissions(&[
            submission("a", "desert", "https://x/a.jpg", 10),
            submission("b", "desert", "https://x/b.jpg", 9),
            submission("c", "goth", "https://x/c.jpg", 8),
        ])
        .await
        .unwrap();

    let ids = store.existing_ids("desert").await.unwrap();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains("a") && ids.contains("b"));
    assert!(store.existing_ids("outrun").await.unwrap().is_empty());
}

#[tokio::test]
async fn subreddit_lookups_ignore_case() {
    let store = PhotoStore::in_memory().await.unwrap();
    store
        .insert_submissions(&[
            submission("a", "Autumn", "https://x/a.jpg", 10),
            submission("b", "Autumn", "https://x/b.png", 9),
        ])
        .await
        .unwrap();

    assert_eq!(store.existing_ids("autumn").await.unwrap().len(), 2);
    assert_eq!(store.existing_ids("AUTUMN").await.unwrap().len(), 2);

    let pending = store.pending_photos("autumn").await.unwrap();
    assert_eq!(pending.len(), 2);
    // The stored spelling is what downloads are filed under.
    assert_eq!(pending[0].subreddit, "Autumn");
}

#[tokio::test]
async fn duplicate_rows_are_skipped_without_aborting_the_batch() {
    let store = PhotoStore::in_memory().await.unwrap();
    store
        .insert_submissions(&[submission("a", "desert", "https://x/a.jpg", 10)])
        .await
        .unwrap();

    let report = store
        .insert_submissions(&[
            submission("a", "desert", "https://x/a.jpg", 10),
            submission("b", "desert", "https://x/b.jpg", 9),
        ])
        .await
        .unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.count(Table::Submissions).await.unwrap(), 2);
}

#[tokio::test]
async fn submission_round_trips() {
    let store = PhotoStore::in_memory().await.unwrap();
    let s = submission("a", "desert", "https://x/a.jpg", 10);
    store.insert_submissions(&[s.clone()]).await.unwrap();

    assert_eq!(store.submission("a").await.unwrap(), Some(s));
    assert_eq!(store.submission("missing").await.unwrap(), None);
}

#[tokio::test]
async fn distinct_subreddits_lists_each_once() {
    let store = PhotoStore::in_memory().await.unwrap();
    store
        .insert_submissions(&[
            submission("a", "goth", "u", 1),
            submission("b", "desert", "u", 1),
            submission("c", "goth", "u", 1),
        ])
        .await
        .unwrap();

    assert_eq!(
        store.distinct_subreddits().await.unwrap(),
        vec!["desert".to_string(), "goth".to_string()]
    );
}

// =========================================================================
// Photos
// =========================================================================

#[tokio::test]
async fn pending_photos_filters_orders_and_excludes_downloaded() {
    let store = PhotoStore::in_memory().await.unwrap();
    store
        .insert_submissions(&[
            submission("low", "desert", "https://x/low.png", 1),
            submission("high", "desert", "https://x/high.jpg", 100),
            submission("gif", "desert", "https://x/anim.gif", 500),
            submission("page", "desert", "https://imgur.com/gallery/abc", 400),
            submission("done", "desert", "https://x/done.jpg", 300),
            submission("other", "goth", "https://x/other.jpg", 1000),
        ])
        .await
        .unwrap();
    store
        .insert_photos(&[photo("done", "desert", 9000, "/p/done.jpg")])
        .await
        .unwrap();

    let pending = store.pending_photos("desert").await.unwrap();
    let ids: Vec<&str> = pending.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["high", "low"]);
    assert_eq!(pending[0].url, "https://x/high.jpg");
    assert_eq!(pending[0].subreddit, "desert");
}

#[tokio::test]
async fn pending_photos_is_bounded() {
    let store = PhotoStore::in_memory().await.unwrap();
    let batch: Vec<Submission> = (0..80)
        .map(|i| submission(&format!("s{i}"), "desert", &format!("https://x/{i}.jpg"), i))
        .collect();
    store.insert_submissions(&batch).await.unwrap();

    let pending = store.pending_photos("desert").await.unwrap();
    assert_eq!(pending.len() as i64, PENDING_PHOTO_LIMIT);
    assert_eq!(pending[0].id, "s79");
}

#[tokio::test]
async fn prune_removes_small_photos_and_keeps_large_ones() {
    let dir = tempfile::tempdir().unwrap();
    let small_path = dir.path().join("small.jpg");
    let large_path = dir.path().join("large.jpg");
    std::fs::write(&small_path, vec![0u8; 100]).unwrap();
    std::fs::write(&large_path, vec![0u8; 5000]).unwrap();

    let store = PhotoStore::in_memory().await.unwrap();
    store
        .insert_photos(&[
            photo("small", "desert", 100, small_path.to_str().unwrap()),
            photo("large", "desert", 5000, large_path.to_str().unwrap()),
        ])
        .await
        .unwrap();

    let report = store.prune_undersized_photos(3000).await.unwrap();
    assert_eq!(report.rows_deleted, 1);
    assert_eq!(report.files_removed, 1);
    assert!(!small_path.exists());
    assert!(large_path.exists());
    assert!(store.photo("small").await.unwrap().is_none());
    assert_eq!(store.photo("large").await.unwrap().unwrap().size_bytes, 5000);
}

#[tokio::test]
async fn prune_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.png");
    std::fs::write(&path, b"removed").unwrap();

    let store = PhotoStore::in_memory().await.unwrap();
    store
        .insert_photos(&[
            photo("tiny", "goth", 7, path.to_str().unwrap()),
            photo("big", "goth", 40_000, "/nonexistent/big.jpg"),
        ])
        .await
        .unwrap();

    let first = store.prune_undersized_photos(3000).await.unwrap();
    assert_eq!(first.rows_deleted, 1);

    let second = store.prune_undersized_photos(3000).await.unwrap();
    assert_eq!(second.rows_deleted, 0);
    assert_eq!(second.files_removed, 0);
    assert!(second.paths.is_empty());
    assert_eq!(store.count(Table::Photos).await.unwrap(), 1);
}

#[tokio::test]
async fn prune_tolerates_missing_files() {
    let store = PhotoStore::in_memory().await.unwrap();
    store
        .insert_photos(&[photo("gone", "goth", 50, "/nonexistent/gone.jpg")])
        .await
        .unwrap();

    let report = store.prune_undersized_photos(3000).await.unwrap();
    assert_eq!(report.rows_deleted, 1);
    assert_eq!(report.files_removed, 0);
}

// =========================================================================
// Clusters
// =========================================================================

#[tokio::test]
async fn cluster_result_round_trips_arrays() {
    let store = PhotoStore::in_memory().await.unwrap();
    let row = cluster_row("a.jpg", "desert");

    let report = store.insert_cluster_result(&row).await.unwrap();
    assert_eq!(report.inserted, 1);

    let back = store.cluster_result("a.jpg").await.unwrap().unwrap();
    assert_eq!(back, row);
    assert_eq!(
        store.cluster_weights("a.jpg").await.unwrap(),
        Some(Array1::from(vec![3i64, 3]))
    );
}

#[tokio::test]
async fn second_cluster_insert_for_same_file_is_skipped() {
    let store = PhotoStore::in_memory().await.unwrap();
    let row = cluster_row("a.jpg", "desert");
    store.insert_cluster_result(&row).await.unwrap();

    let report = store.insert_cluster_result(&row).await.unwrap();
    assert_eq!(report.inserted, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.count(Table::Clusters).await.unwrap(), 1);
}

#[tokio::test]
async fn files_needing_clustering_excludes_clustered_files() {
    let store = PhotoStore::in_memory().await.unwrap();
    store
        .insert_photos(&[
            photo("a", "desert", 9000, "/p/desert/a.jpg"),
            photo("b", "goth", 9000, "/p/goth/b.jpg"),
        ])
        .await
        .unwrap();
    store
        .insert_cluster_result(&cluster_row("a.jpg", "desert"))
        .await
        .unwrap();

    let jobs = store.files_needing_clustering().await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].filename, "b.jpg");
    assert_eq!(jobs[0].path, "/p/goth/b.jpg");
    assert_eq!(jobs[0].subreddit, "goth");
}

#[tokio::test]
async fn cluster_centers_reads_subreddit_rows() {
    let store = PhotoStore::in_memory().await.unwrap();
    for (file, sub) in [("a.jpg", "desert"), ("b.jpg", "desert"), ("c.jpg", "goth")] {
        store.insert_cluster_result(&cluster_row(file, sub)).await.unwrap();
    }

    let centers = store.cluster_centers("desert", 50).await.unwrap();
    assert_eq!(centers.len(), 2);
    assert_eq!(centers[0].shape(), &[2, 3]);
    assert_eq!(store.cluster_centers("desert", 1).await.unwrap().len(), 1);
}

// =========================================================================
// On-disk lifecycle
// =========================================================================

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("PhotoClusters.db").display());

    {
        let store = PhotoStore::connect(&url).await.unwrap();
        store.ensure_schema().await.unwrap();
        store
            .insert_submissions(&[submission("a", "desert", "https://x/a.jpg", 10)])
            .await
            .unwrap();
        store.pool().close().await;
    }

    let reopened = PhotoStore::connect(&url).await.unwrap();
    reopened.ensure_schema().await.unwrap();
    assert!(reopened.existing_ids("desert").await.unwrap().contains("a"));
}
