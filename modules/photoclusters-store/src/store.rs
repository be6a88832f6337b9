//! PhotoStore: SQLite persistence for submissions, photos and cluster results.
//!
//! Every insert batch runs in one transaction. A row that fails (usually a
//! duplicate primary key on a re-run) is logged and skipped; the rest of the
//! batch still commits. A transaction that is dropped without commit rolls back.

use std::collections::HashSet;
use std::str::FromStr;

use ndarray::{Array1, Array2, Ix2};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use photoclusters_common::{ClusterJob, ClusterResult, PendingPhoto, Photo, Submission};

use crate::codec;
use crate::error::{Result, StoreError};
use crate::schema::{Confirmation, Table};

/// Page size for `pending_photos`.
pub const PENDING_PHOTO_LIMIT: i64 = 50;

/// Outcome of one insert batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InsertReport {
    pub inserted: usize,
    pub skipped: usize,
}

impl InsertReport {
    fn record<E: std::fmt::Display>(&mut self, result: std::result::Result<(), E>, key: &str, table: Table) {
        match result {
            Ok(()) => self.inserted += 1,
            Err(e) => {
                warn!(table = table.name(), key, error = %e, "Skipping row that failed to insert");
                self.skipped += 1;
            }
        }
    }
}

/// Outcome of an integrity sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub rows_deleted: u64,
    pub files_removed: usize,
    pub paths: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: String,
    title: Option<String>,
    url: Option<String>,
    url_domain: Option<String>,
    subreddit: Option<String>,
    subreddit_id: Option<String>,
    permalink: Option<String>,
    created_at: Option<i64>,
    author: Option<String>,
    score: Option<i64>,
}

impl From<SubmissionRow> for Submission {
    fn from(r: SubmissionRow) -> Self {
        Submission {
            id: r.id,
            title: r.title.unwrap_or_default(),
            url: r.url.unwrap_or_default(),
            url_domain: r.url_domain.unwrap_or_default(),
            subreddit: r.subreddit.unwrap_or_default(),
            subreddit_id: r.subreddit_id.unwrap_or_default(),
            permalink: r.permalink.unwrap_or_default(),
            created_at: r.created_at.unwrap_or_default(),
            author: r.author.unwrap_or_default(),
            score: r.score.unwrap_or_default(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct PhotoRow {
    id: String,
    filename: String,
    subreddit: String,
    size: i64,
    path: String,
}

impl From<PhotoRow> for Photo {
    fn from(r: PhotoRow) -> Self {
        Photo {
            id: r.id,
            filename: r.filename,
            subreddit: r.subreddit,
            size_bytes: r.size,
            path: r.path,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ClusterRow {
    file: String,
    subreddit: String,
    picture_array: Vec<u8>,
    bandwidth: f64,
    labels: Vec<u8>,
    clusters: Vec<u8>,
    weights: Vec<u8>,
}

impl TryFrom<ClusterRow> for ClusterResult {
    type Error = codec::CodecError;

    fn try_from(r: ClusterRow) -> std::result::Result<Self, Self::Error> {
        Ok(ClusterResult {
            file: r.file,
            subreddit: r.subreddit,
            sampled_pixels: codec::decode(&r.picture_array)?,
            bandwidth: r.bandwidth,
            labels: codec::decode(&r.labels)?,
            cluster_centers: codec::decode(&r.clusters)?,
            cluster_weights: codec::decode(&r.weights)?,
        })
    }
}

/// Owns the embedded database. Clone shares the same connection pool.
#[derive(Clone)]
pub struct PhotoStore {
    pool: SqlitePool,
}

impl PhotoStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `url` on a single connection.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        info!(url, "Opened photo store");
        Ok(Self { pool })
    }

    /// Fresh in-memory store with all tables created.
    pub async fn in_memory() -> Result<Self> {
        let store = Self::connect("sqlite::memory:").await?;
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // --- Schema lifecycle ---

    /// Create any missing tables. Never touches existing data.
    pub async fn ensure_schema(&self) -> Result<()> {
        for table in Table::ALL {
            sqlx::query(table.create_statement())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Drop `table` and recreate it empty.
    pub async fn recreate_table(&self, table: Table, _confirmed: Confirmation) -> Result<()> {
        warn!(table = table.name(), "Dropping and recreating table");

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table.name()))
            .execute(&mut *tx)
            .await?;
        sqlx::query(table.create_statement())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(table = table.name(), "Table recreated");
        Ok(())
    }

    pub async fn count(&self, table: Table) -> Result<i64> {
        let (n,) = sqlx::query_as::<_, (i64,)>(&format!("SELECT COUNT(*) FROM {}", table.name()))
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    // --- Submissions ---

    /// Ids already stored for a subreddit, for crawl-time deduplication.
    ///
    /// Subreddit names compare case-insensitively: the API stores its own
    /// capitalisation, which need not match the configured name.
    pub async fn existing_ids(&self, subreddit: &str) -> Result<HashSet<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT ID FROM submissions WHERE Subreddit = ? COLLATE NOCASE",
        )
        .bind(subreddit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn insert_submissions(&self, batch: &[Submission]) -> Result<InsertReport> {
        let mut report = InsertReport::default();
        let mut tx = self.pool.begin().await?;

        for s in batch {
            let result = sqlx::query(
                r#"
                INSERT INTO submissions
                    (ID, Title, URL, URLDomain, Subreddit, SubredditID,
                     PostURL, PostTime, PostAuthor, PostScore)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&s.id)
            .bind(&s.title)
            .bind(&s.url)
            .bind(&s.url_domain)
            .bind(&s.subreddit)
            .bind(&s.subreddit_id)
            .bind(&s.permalink)
            .bind(s.created_at)
            .bind(&s.author)
            .bind(s.score)
            .execute(&mut *tx)
            .await
            .map(|_| ());
            report.record(result, &s.id, Table::Submissions);
        }

        tx.commit().await?;
        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "Committed submission batch"
        );
        Ok(report)
    }

    pub async fn submission(&self, id: &str) -> Result<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            SELECT ID AS id, Title AS title, URL AS url, URLDomain AS url_domain,
                   Subreddit AS subreddit, SubredditID AS subreddit_id,
                   PostURL AS permalink, PostTime AS created_at,
                   PostAuthor AS author, PostScore AS score
            FROM submissions
            WHERE ID = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Submission::from))
    }

    /// Every subreddit with at least one stored submission.
    pub async fn distinct_subreddits(&self) -> Result<Vec<String>> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT DISTINCT Subreddit FROM submissions WHERE Subreddit IS NOT NULL ORDER BY Subreddit",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    // --- Photos ---

    /// Highest-scoring image submissions of a subreddit with no photo yet.
    pub async fn pending_photos(&self, subreddit: &str) -> Result<Vec<PendingPhoto>> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT ID, URL, Subreddit FROM submissions
            WHERE Subreddit = ? COLLATE NOCASE
              AND (URL LIKE '%.png' OR URL LIKE '%.jpg')
              AND ID NOT IN (SELECT id FROM photos)
            ORDER BY PostScore DESC
            LIMIT ?
            "#,
        )
        .bind(subreddit)
        .bind(PENDING_PHOTO_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, url, subreddit)| PendingPhoto { id, url, subreddit })
            .collect())
    }

    pub async fn insert_photos(&self, batch: &[Photo]) -> Result<InsertReport> {
        let mut report = InsertReport::default();
        let mut tx = self.pool.begin().await?;

        for p in batch {
            let result = sqlx::query(
                "INSERT INTO photos (id, filename, subreddit, size, path) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&p.id)
            .bind(&p.filename)
            .bind(&p.subreddit)
            .bind(p.size_bytes)
            .bind(&p.path)
            .execute(&mut *tx)
            .await
            .map(|_| ());
            report.record(result, &p.id, Table::Photos);
        }

        tx.commit().await?;
        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            "Committed photo batch"
        );
        Ok(report)
    }

    pub async fn photo(&self, id: &str) -> Result<Option<Photo>> {
        let row = sqlx::query_as::<_, PhotoRow>(
            "SELECT id, filename, subreddit, size, path FROM photos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Photo::from))
    }

    /// Delete photos smaller than `min_bytes` along with their files.
    ///
    /// Image hosts serve a tiny "image removed" placeholder for deleted
    /// uploads; those never carry useful colour data.
    pub async fn prune_undersized_photos(&self, min_bytes: i64) -> Result<PruneReport> {
        let mut tx = self.pool.begin().await?;

        let paths: Vec<String> =
            sqlx::query_as::<_, (String,)>("SELECT path FROM photos WHERE size < ?")
                .bind(min_bytes)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .map(|(p,)| p)
                .collect();

        let deleted = sqlx::query("DELETE FROM photos WHERE size < ?")
            .bind(min_bytes)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        let mut files_removed = 0;
        for path in &paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    files_removed += 1;
                    info!(path = path.as_str(), "Removed undersized photo");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = path.as_str(), error = %e, "Failed to remove undersized photo file"),
            }
        }

        if deleted > 0 {
            info!(rows = deleted, files = files_removed, min_bytes, "Pruned undersized photos");
        }

        Ok(PruneReport {
            rows_deleted: deleted,
            files_removed,
            paths,
        })
    }

    // --- Clusters ---

    /// Photos whose file has no cluster result yet.
    pub async fn files_needing_clustering(&self) -> Result<Vec<ClusterJob>> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            r#"
            SELECT path, filename, subreddit FROM photos
            WHERE filename NOT IN (SELECT file FROM clusters)
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(path, filename, subreddit)| ClusterJob {
                path,
                filename,
                subreddit,
            })
            .collect())
    }

    /// Insert one cluster result in its own transaction.
    pub async fn insert_cluster_result(&self, row: &ClusterResult) -> Result<InsertReport> {
        let picture = codec::encode(&row.sampled_pixels);
        let labels = codec::encode(&row.labels);
        let centers = codec::encode(&row.cluster_centers);
        let weights = codec::encode(&row.cluster_weights);

        let mut report = InsertReport::default();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO clusters (file, subreddit, picture_array, bandwidth, labels, clusters, weights)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.file)
        .bind(&row.subreddit)
        .bind(&picture[..])
        .bind(row.bandwidth)
        .bind(&labels[..])
        .bind(&centers[..])
        .bind(&weights[..])
        .execute(&mut *tx)
        .await
        .map(|_| ());
        report.record(result, &row.file, Table::Clusters);

        tx.commit().await?;
        Ok(report)
    }

    pub async fn cluster_result(&self, file: &str) -> Result<Option<ClusterResult>> {
        let row = sqlx::query_as::<_, ClusterRow>(
            r#"
            SELECT file, subreddit, picture_array, bandwidth, labels, clusters, weights
            FROM clusters
            WHERE file = ?
            "#,
        )
        .bind(file)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(ClusterResult::try_from(r)?)),
            None => Ok(None),
        }
    }

    /// Cluster centres for up to `limit` images of a subreddit. Read-only
    /// query used by plotting tools.
    pub async fn cluster_centers(&self, subreddit: &str, limit: i64) -> Result<Vec<Array2<f64>>> {
        let rows = sqlx::query_as::<_, (Vec<u8>,)>(
            "SELECT clusters FROM clusters WHERE subreddit = ? COLLATE NOCASE ORDER BY rowid LIMIT ?",
        )
        .bind(subreddit)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(blob,)| codec::decode::<f64, Ix2>(&blob).map_err(StoreError::from))
            .collect()
    }

    /// Cluster weights for one file, without decoding the sample arrays.
    pub async fn cluster_weights(&self, file: &str) -> Result<Option<Array1<i64>>> {
        let row = sqlx::query_as::<_, (Vec<u8>,)>("SELECT weights FROM clusters WHERE file = ?")
            .bind(file)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some((blob,)) => Ok(Some(codec::decode(&blob)?)),
            None => Ok(None),
        }
    }
}
