//! Postgres implementation of the torrent writer.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use sqlx::query_builder::Separated;
use torsync_core::{
    FieldValue, FileAttributes, FileChange, FileChanges, InfoHash, PersistedTorrent,
    TorrentAttributes, TorrentChange, TorrentId, TorrentRecord, TorrentSnapshot, TorrentStatus,
};
use tracing::debug;

use crate::error::{DataError, Result};
use crate::store::{InsertedTorrent, ShutdownCorrection, TorrentStore};

const PING_SQL: &str = "SELECT 1";

const INSERT_TORRENT_SQL: &str = r"
    INSERT INTO torrents (
        hash,
        status,
        name,
        save_path,
        size,
        progress,
        remaining,
        seeds,
        total_seeds,
        leechers,
        total_leechers
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
    ON CONFLICT (hash) DO NOTHING
    RETURNING id
";

const SELECT_TORRENT_ID_SQL: &str = r"
    SELECT id FROM torrents WHERE hash = $1
";

const INSERT_FILE_SQL: &str = r"
    INSERT INTO torrent_files (torrent_id, file_index, path, size, priority, progress)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (torrent_id, file_index) DO NOTHING
";

const UPSERT_FILE_SQL: &str = r"
    INSERT INTO torrent_files (torrent_id, file_index, path, size, priority, progress)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (torrent_id, file_index) DO UPDATE
    SET
        path = EXCLUDED.path,
        size = EXCLUDED.size,
        priority = EXCLUDED.priority,
        progress = EXCLUDED.progress
";

const SELECT_TORRENTS_BY_HASH_SQL: &str = r"
    SELECT
        id,
        hash,
        status,
        name,
        save_path,
        size,
        progress,
        remaining,
        seeds,
        total_seeds,
        leechers,
        total_leechers
    FROM torrents
    WHERE hash = ANY($1)
";

const SELECT_FILES_BY_TORRENT_SQL: &str = r"
    SELECT torrent_id, file_index, path, size, priority, progress
    FROM torrent_files
    WHERE torrent_id = ANY($1)
";

const LOCK_TORRENT_SQL: &str = r"
    SELECT id FROM torrents WHERE hash = $1 FOR UPDATE
";

const DELETE_FILES_SQL: &str = r"
    DELETE FROM torrent_files WHERE torrent_id = $1
";

const DELETE_TORRENT_SQL: &str = r"
    DELETE FROM torrents WHERE id = $1
";

const UPDATE_SAVE_PATH_SQL: &str = r"
    UPDATE torrents
    SET save_path = $2, name = $3, updated_at = now()
    WHERE id = $1
";

const CORRECT_STATUSES_SQL: &str = r"
    UPDATE torrents
    SET status = $1, updated_at = now()
    WHERE status = ANY($2)
";

const CORRECT_PEERS_SQL: &str = r"
    UPDATE torrents
    SET seeds = 0, total_seeds = 0, leechers = 0, total_leechers = 0, updated_at = now()
    WHERE seeds <> 0 OR total_seeds <> 0 OR leechers <> 0 OR total_leechers <> 0
";

/// Database-backed writer for the torrent projection.
#[derive(Clone)]
pub struct PgTorrentStore {
    pool: PgPool,
}

impl PgTorrentStore {
    /// Initialise the store, applying pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations fail or the database is unreachable.
    pub async fn new(pool: PgPool) -> Result<Self> {
        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator
            .run(&pool)
            .await
            .map_err(|source| DataError::MigrationFailed { source })?;
        Ok(Self { pool })
    }

    /// Access the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct TorrentRow {
    id: i64,
    hash: String,
    status: i16,
    name: String,
    save_path: String,
    size: i64,
    progress: i32,
    remaining: i64,
    seeds: i32,
    total_seeds: i32,
    leechers: i32,
    total_leechers: i32,
}

impl TorrentRow {
    fn into_record(self) -> Result<TorrentRecord> {
        let info_hash = InfoHash::parse(&self.hash).map_err(|source| DataError::CorruptRow {
            operation: "find_torrents",
            column: "hash",
            source,
        })?;
        let status = TorrentStatus::decode(self.status).map_err(|source| DataError::CorruptRow {
            operation: "find_torrents",
            column: "status",
            source,
        })?;
        Ok(TorrentRecord {
            id: TorrentId(self.id),
            info_hash,
            attributes: TorrentAttributes {
                status,
                name: self.name,
                save_path: self.save_path,
                size: u64::try_from(self.size).unwrap_or_default(),
                progress: u16::try_from(self.progress).unwrap_or_default(),
                remaining: u64::try_from(self.remaining).unwrap_or_default(),
                seeds: u32::try_from(self.seeds).unwrap_or_default(),
                total_seeds: u32::try_from(self.total_seeds).unwrap_or_default(),
                leechers: u32::try_from(self.leechers).unwrap_or_default(),
                total_leechers: u32::try_from(self.total_leechers).unwrap_or_default(),
            },
        })
    }
}

#[derive(Debug, FromRow)]
struct FileRow {
    torrent_id: i64,
    file_index: i32,
    path: String,
    size: i64,
    priority: i32,
    progress: i32,
}

impl FileRow {
    fn into_parts(self) -> (TorrentId, u32, FileAttributes) {
        (
            TorrentId(self.torrent_id),
            u32::try_from(self.file_index).unwrap_or_default(),
            FileAttributes {
                path: self.path,
                size: u64::try_from(self.size).unwrap_or_default(),
                priority: u8::try_from(self.priority).unwrap_or_default(),
                progress: u16::try_from(self.progress).unwrap_or_default(),
            },
        )
    }
}

#[async_trait]
impl TorrentStore for PgTorrentStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query(PING_SQL)
            .execute(&self.pool)
            .await
            .map_err(DataError::query("ping"))?;
        Ok(())
    }

    async fn insert_pending(
        &self,
        batch: &[TorrentSnapshot],
    ) -> Result<HashMap<InfoHash, InsertedTorrent>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DataError::query("insert_pending.begin"))?;
        let mut inserted = HashMap::with_capacity(batch.len());

        for snapshot in batch {
            let attributes = &snapshot.attributes;
            let created: Option<i64> = sqlx::query_scalar(INSERT_TORRENT_SQL)
                .bind(snapshot.info_hash.as_str())
                .bind(attributes.status.encode())
                .bind(attributes.name.as_str())
                .bind(attributes.save_path.as_str())
                .bind(clamp_i64(attributes.size))
                .bind(i32::from(attributes.progress))
                .bind(clamp_i64(attributes.remaining))
                .bind(clamp_i32(attributes.seeds))
                .bind(clamp_i32(attributes.total_seeds))
                .bind(clamp_i32(attributes.leechers))
                .bind(clamp_i32(attributes.total_leechers))
                .fetch_optional(&mut *tx)
                .await
                .map_err(DataError::query("insert_pending.torrent"))?;

            let outcome = match created {
                Some(id) => InsertedTorrent {
                    id: TorrentId(id),
                    created: true,
                },
                None => {
                    let id: i64 = sqlx::query_scalar(SELECT_TORRENT_ID_SQL)
                        .bind(snapshot.info_hash.as_str())
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(DataError::query("insert_pending.existing_id"))?;
                    debug!(
                        info_hash = %snapshot.info_hash,
                        torrent_id = id,
                        "torrent already persisted; reusing existing row"
                    );
                    InsertedTorrent {
                        id: TorrentId(id),
                        created: false,
                    }
                }
            };

            for file in &snapshot.files {
                sqlx::query(INSERT_FILE_SQL)
                    .bind(outcome.id.0)
                    .bind(clamp_index(file.index))
                    .bind(file.attributes.path.as_str())
                    .bind(clamp_i64(file.attributes.size))
                    .bind(i32::from(file.attributes.priority))
                    .bind(i32::from(file.attributes.progress))
                    .execute(&mut *tx)
                    .await
                    .map_err(DataError::query("insert_pending.files"))?;
            }

            inserted.insert(snapshot.info_hash.clone(), outcome);
        }

        tx.commit()
            .await
            .map_err(DataError::query("insert_pending.commit"))?;
        Ok(inserted)
    }

    async fn find_torrents(&self, hashes: &[InfoHash]) -> Result<Vec<PersistedTorrent>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = hashes.iter().map(|hash| hash.as_str().to_owned()).collect();
        let rows: Vec<TorrentRow> = sqlx::query_as(SELECT_TORRENTS_BY_HASH_SQL)
            .bind(keys)
            .fetch_all(&self.pool)
            .await
            .map_err(DataError::query("find_torrents"))?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let file_rows: Vec<FileRow> = sqlx::query_as(SELECT_FILES_BY_TORRENT_SQL)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(DataError::query("find_torrents.files"))?;

        let mut files: HashMap<TorrentId, BTreeMap<u32, FileAttributes>> = HashMap::new();
        for row in file_rows {
            let (torrent_id, index, attributes) = row.into_parts();
            files.entry(torrent_id).or_default().insert(index, attributes);
        }

        rows.into_iter()
            .map(|row| {
                let record = row.into_record()?;
                let files = files.remove(&record.id).unwrap_or_default();
                Ok(PersistedTorrent { record, files })
            })
            .collect()
    }

    async fn apply_torrent_changes(&self, id: TorrentId, change: &TorrentChange) -> Result<()> {
        if change.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE torrents SET ");
        {
            let mut assignments = builder.separated(", ");
            for (field, value) in change.iter() {
                assignments.push(format!("{} = ", field.column()));
                push_value(&mut assignments, value);
            }
            assignments.push("updated_at = now()");
        }
        builder.push(" WHERE id = ").push_bind(id.0);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DataError::query("apply_torrent_changes.begin"))?;
        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(DataError::query("apply_torrent_changes"))?;
        tx.commit()
            .await
            .map_err(DataError::query("apply_torrent_changes.commit"))?;
        Ok(())
    }

    async fn apply_file_changes(&self, id: TorrentId, changes: &FileChanges) -> Result<()> {
        if changes.values().all(FileChange::is_empty) {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DataError::query("apply_file_changes.begin"))?;

        for (index, change) in changes {
            if change.is_empty() {
                continue;
            }
            if let Some(attributes) = FileAttributes::from_change(change) {
                sqlx::query(UPSERT_FILE_SQL)
                    .bind(id.0)
                    .bind(clamp_index(*index))
                    .bind(attributes.path.as_str())
                    .bind(clamp_i64(attributes.size))
                    .bind(i32::from(attributes.priority))
                    .bind(i32::from(attributes.progress))
                    .execute(&mut *tx)
                    .await
                    .map_err(DataError::query("apply_file_changes.upsert"))?;
                continue;
            }

            let mut builder = QueryBuilder::<Postgres>::new("UPDATE torrent_files SET ");
            {
                let mut assignments = builder.separated(", ");
                for (field, value) in change.iter() {
                    assignments.push(format!("{} = ", field.column()));
                    push_value(&mut assignments, value);
                }
            }
            builder
                .push(" WHERE torrent_id = ")
                .push_bind(id.0)
                .push(" AND file_index = ")
                .push_bind(clamp_index(*index));
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(DataError::query("apply_file_changes.update"))?;
        }

        tx.commit()
            .await
            .map_err(DataError::query("apply_file_changes.commit"))?;
        Ok(())
    }

    async fn remove(&self, info_hash: &InfoHash) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DataError::query("remove.begin"))?;

        let id: Option<i64> = sqlx::query_scalar(LOCK_TORRENT_SQL)
            .bind(info_hash.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(DataError::query("remove.lookup"))?;
        let Some(id) = id else {
            return Ok(false);
        };

        sqlx::query(DELETE_FILES_SQL)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DataError::query("remove.files"))?;
        sqlx::query(DELETE_TORRENT_SQL)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DataError::query("remove.torrent"))?;
        tx.commit()
            .await
            .map_err(DataError::query("remove.commit"))?;
        Ok(true)
    }

    async fn update_save_path(
        &self,
        id: TorrentId,
        new_path: &str,
        new_name: &str,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DataError::query("update_save_path.begin"))?;
        sqlx::query(UPDATE_SAVE_PATH_SQL)
            .bind(id.0)
            .bind(new_path)
            .bind(new_name)
            .execute(&mut *tx)
            .await
            .map_err(DataError::query("update_save_path"))?;
        tx.commit()
            .await
            .map_err(DataError::query("update_save_path.commit"))?;
        Ok(())
    }

    async fn correct_statuses_on_shutdown(&self) -> Result<ShutdownCorrection> {
        let active: Vec<i16> = TorrentStatus::ACTIVE
            .iter()
            .map(|status| status.encode())
            .collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DataError::query("correct_statuses_on_shutdown.begin"))?;
        let statuses = sqlx::query(CORRECT_STATUSES_SQL)
            .bind(TorrentStatus::Paused.encode())
            .bind(active)
            .execute(&mut *tx)
            .await
            .map_err(DataError::query("correct_statuses_on_shutdown.statuses"))?
            .rows_affected();
        let peers = sqlx::query(CORRECT_PEERS_SQL)
            .execute(&mut *tx)
            .await
            .map_err(DataError::query("correct_statuses_on_shutdown.peers"))?
            .rows_affected();
        tx.commit()
            .await
            .map_err(DataError::query("correct_statuses_on_shutdown.commit"))?;

        Ok(ShutdownCorrection { statuses, peers })
    }
}

fn push_value<Sep: Display>(
    assignments: &mut Separated<'_, '_, Postgres, Sep>,
    value: &FieldValue,
) {
    match value {
        FieldValue::Text(text) => {
            assignments.push_bind_unseparated(text.clone());
        }
        FieldValue::Integer(number) => {
            assignments.push_bind_unseparated(clamp_i64(*number));
        }
        FieldValue::Status(status) => {
            assignments.push_bind_unseparated(status.encode());
        }
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn clamp_index(index: u32) -> i32 {
    clamp_i32(index)
}
