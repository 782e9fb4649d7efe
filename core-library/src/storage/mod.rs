//! # Library Storage
//!
//! [`LibraryStorage`] is the accessor for one transactional context. The
//! transaction is begun lazily on the first statement and stays open until
//! [`LibraryStorage::save_context`] commits it. Dropping a context with
//! pending changes rolls them back.
//!
//! ## Merge policy
//!
//! Every entity read through a context is remembered as loaded. `update`
//! writes only the columns the caller changed since then, so a concurrent
//! context that changed other columns of the same row keeps its changes.
//!
//! ## Failure semantics
//!
//! - Reads log under the entity's topic and return `None` or an empty list
//! - Writes return [`crate::LibraryError`]; corruption is reported as
//!   [`crate::LibraryError::StoreCorrupted`]
//!
//! Contexts are cheap and meant to be short-lived: one per task or sync step,
//! never shared between tasks.

mod artwork;
mod cache;
mod entity;
mod info;
mod playables;
mod playlist;

pub use entity::{RemoteEntity, StoredEntity};

use crate::error::{LibraryError, Result};
use serde_json::{Map, Value};
use sqlx::query::QueryAs;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::collections::HashMap;
use tracing::{debug, error, info};

/// Every table, children before parents.
const ALL_TABLES: &[&str] = &[
    "playlist_items",
    "song_files",
    "player_data",
    "playlists",
    "playables",
    "albums",
    "artists",
    "genres",
    "directories",
    "music_folders",
    "podcasts",
    "artworks",
    "sync_waves",
    "log_entries",
    "user_statistic_counts",
    "user_statistics",
];

type Snapshot = Map<String, Value>;

pub struct LibraryStorage {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
    snapshots: HashMap<(&'static str, i64), Snapshot>,
}

impl LibraryStorage {
    /// Create a new context on the given pool. No connection is taken until
    /// the first statement runs.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tx: None,
            snapshots: HashMap::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether statements have run since the last commit.
    pub fn has_pending_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Connection of the pending transaction, begun on first use.
    pub(crate) async fn conn(&mut self) -> Result<&mut SqliteConnection> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                debug!("Beginning library context transaction");
                self.pool.begin().await?
            }
        };
        Ok(&mut **self.tx.insert(tx))
    }

    /// Commit the pending transaction. A context without pending statements
    /// commits nothing.
    pub async fn save_context(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(|e| {
                let err = LibraryError::from(e);
                error!(error = %err, fatal = err.is_fatal(), "Failed to save library context");
                err
            })?;
            debug!("Library context saved");
        }
        Ok(())
    }

    /// Delete every row of every table in one committed transaction.
    pub async fn clean_storage(&mut self) -> Result<()> {
        let conn = self.conn().await?;
        for table in ALL_TABLES {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *conn)
                .await?;
        }
        self.snapshots.clear();
        self.save_context().await?;

        info!("Library storage cleaned");
        Ok(())
    }

    // =========================================================================
    // Generic entity operations
    // =========================================================================

    /// Insert a row with default values and return it.
    pub async fn create<T: StoredEntity>(&mut self) -> Result<T> {
        let conn = self.conn().await?;
        let pk = sqlx::query(T::INSERT_DEFAULT)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
        let entity = sqlx::query_as::<_, T>(&format!("SELECT * FROM {} WHERE pk = ?", T::VIEW))
            .bind(pk)
            .fetch_one(&mut *conn)
            .await?;

        self.remember(&entity);
        Ok(entity)
    }

    /// Point lookup by remote id. The oldest row wins when duplicates exist.
    pub async fn get<T: RemoteEntity>(&mut self, id: &str) -> Option<T> {
        let sql = format!("SELECT * FROM {} WHERE id = ? ORDER BY pk LIMIT 1", T::VIEW);
        self.load_optional(sqlx::query_as::<_, T>(&sql).bind(id)).await
    }

    pub async fn get_by_pk<T: StoredEntity>(&mut self, pk: i64) -> Option<T> {
        let sql = format!("SELECT * FROM {} WHERE pk = ?", T::VIEW);
        self.load_optional(sqlx::query_as::<_, T>(&sql).bind(pk)).await
    }

    pub async fn list<T: StoredEntity>(&mut self) -> Vec<T> {
        let sql = format!("SELECT * FROM {} ORDER BY {}", T::VIEW, T::ORDER_BY);
        self.load_all(sqlx::query_as::<_, T>(&sql)).await
    }

    pub async fn count<T: StoredEntity>(&mut self) -> i64 {
        let sql = format!("SELECT COUNT(*) FROM {}", T::VIEW);
        self.scalar(T::KIND, sqlx::query_as::<_, (i64,)>(&sql))
            .await
            .unwrap_or(0)
    }

    /// Write the columns changed since the entity was loaded into this
    /// context. An entity this context never loaded is written in full.
    pub async fn update<T: StoredEntity>(&mut self, entity: &T) -> Result<()> {
        let Value::Object(current) = serde_json::to_value(entity)? else {
            return Err(LibraryError::InvalidInput {
                field: T::KIND.to_string(),
                message: "entity does not serialize to columns".to_string(),
            });
        };

        let key = (T::TABLE, entity.pk());
        let changed: Vec<(String, Value)> = match self.snapshots.get(&key) {
            Some(loaded) => current
                .iter()
                .filter(|(column, value)| loaded.get(*column) != Some(*value))
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect(),
            None => current
                .iter()
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect(),
        };

        if changed.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", T::TABLE));
        {
            let mut columns = builder.separated(", ");
            for (column, value) in changed {
                columns.push(format!("{column} = "));
                match value {
                    Value::Null => columns.push_bind_unseparated(Option::<String>::None),
                    Value::Bool(flag) => columns.push_bind_unseparated(flag),
                    Value::Number(number) => match number.as_i64() {
                        Some(integer) => columns.push_bind_unseparated(integer),
                        None => columns.push_bind_unseparated(number.as_f64().unwrap_or_default()),
                    },
                    Value::String(text) => columns.push_bind_unseparated(text),
                    other => columns.push_bind_unseparated(other.to_string()),
                };
            }
        }
        builder.push(" WHERE pk = ").push_bind(entity.pk());

        let conn = self.conn().await?;
        let result = builder.build().execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: T::KIND.to_string(),
                id: entity.pk().to_string(),
            });
        }

        self.snapshots.insert(key, current);
        Ok(())
    }

    /// Delete the entity's row. Owned rows (cached files, playlist items)
    /// go with it; references from other kinds are nulled.
    pub async fn delete<T: StoredEntity>(&mut self, entity: &T) -> Result<()> {
        let conn = self.conn().await?;
        sqlx::query(&format!("DELETE FROM {} WHERE pk = ?", T::TABLE))
            .bind(entity.pk())
            .execute(&mut *conn)
            .await?;

        self.snapshots.remove(&(T::TABLE, entity.pk()));
        Ok(())
    }

    // =========================================================================
    // Read helpers
    // =========================================================================

    pub(crate) fn remember<T: StoredEntity>(&mut self, entity: &T) {
        if let Ok(Value::Object(columns)) = serde_json::to_value(entity) {
            self.snapshots.insert((T::TABLE, entity.pk()), columns);
        }
    }

    pub(crate) async fn load_optional<'q, T: StoredEntity>(
        &mut self,
        query: QueryAs<'q, Sqlite, T, SqliteArguments<'q>>,
    ) -> Option<T> {
        let result = async {
            let conn = self.conn().await?;
            Ok::<_, LibraryError>(query.fetch_optional(conn).await?)
        }
        .await;

        match result {
            Ok(entity) => {
                if let Some(entity) = &entity {
                    self.remember(entity);
                }
                entity
            }
            Err(e) => {
                error!(topic = T::KIND, error = %e, "Failed to fetch entity");
                None
            }
        }
    }

    pub(crate) async fn load_all<'q, T: StoredEntity>(
        &mut self,
        query: QueryAs<'q, Sqlite, T, SqliteArguments<'q>>,
    ) -> Vec<T> {
        let entities = self.load_rows(T::KIND, query).await;
        for entity in &entities {
            self.remember(entity);
        }
        entities
    }

    /// Fetch rows without remembering them as loaded.
    pub(crate) async fn load_rows<'q, R>(
        &mut self,
        topic: &str,
        query: QueryAs<'q, Sqlite, R, SqliteArguments<'q>>,
    ) -> Vec<R>
    where
        R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let result = async {
            let conn = self.conn().await?;
            Ok::<_, LibraryError>(query.fetch_all(conn).await?)
        }
        .await;

        result.unwrap_or_else(|e| {
            error!(topic, error = %e, "Failed to fetch entities");
            Vec::new()
        })
    }

    pub(crate) async fn scalar<'q, R>(
        &mut self,
        topic: &str,
        query: QueryAs<'q, Sqlite, (R,), SqliteArguments<'q>>,
    ) -> Option<R>
    where
        R: Send + Unpin,
        (R,): for<'r> FromRow<'r, SqliteRow>,
    {
        let result = async {
            let conn = self.conn().await?;
            Ok::<_, LibraryError>(query.fetch_optional(conn).await?)
        }
        .await;

        match result {
            Ok(row) => row.map(|(value,)| value),
            Err(e) => {
                error!(topic, error = %e, "Failed to fetch value");
                None
            }
        }
    }
}

impl std::fmt::Debug for LibraryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryStorage")
            .field("pending_transaction", &self.tx.is_some())
            .field("loaded_entities", &self.snapshots.len())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::storage;
    use super::*;
    use crate::models::{Artist, RemoteStatus, Song};

    #[core_async::test]
    async fn test_create_and_get() {
        let (_pool, mut library) = storage().await;

        let mut artist: Artist = library.create().await.unwrap();
        assert!(artist.pk > 0);
        assert_eq!(artist.alphabetic_section_initial, "?");

        artist.id = "ar-1".to_string();
        artist.set_name("Björk");
        library.update(&artist).await.unwrap();

        let fetched: Artist = library.get("ar-1").await.unwrap();
        assert_eq!(fetched, artist);
        assert!(library.get::<Artist>("missing").await.is_none());
    }

    #[core_async::test]
    async fn test_list_is_sorted_by_name_then_id() {
        let (_pool, mut library) = storage().await;

        for (id, name) in [("3", "Beta"), ("2", "Alpha"), ("1", "Beta")] {
            let mut artist: Artist = library.create().await.unwrap();
            artist.id = id.to_string();
            artist.set_name(name);
            library.update(&artist).await.unwrap();
        }

        let ids: Vec<String> = library
            .list::<Artist>()
            .await
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
        assert_eq!(library.count::<Artist>().await, 3);
    }

    #[core_async::test]
    async fn test_unsaved_context_is_rolled_back() {
        let (pool, mut library) = storage().await;

        let mut artist: Artist = library.create().await.unwrap();
        artist.id = "ar-1".to_string();
        library.update(&artist).await.unwrap();
        drop(library);

        let mut library = LibraryStorage::new(pool);
        assert!(library.get::<Artist>("ar-1").await.is_none());
    }

    #[core_async::test]
    async fn test_update_only_writes_changed_columns() {
        let (pool, mut first) = storage().await;

        let mut artist: Artist = first.create().await.unwrap();
        artist.id = "ar-1".to_string();
        artist.set_name("Old Name");
        first.update(&artist).await.unwrap();
        first.save_context().await.unwrap();

        // A second context flags the artist as favorite in the meantime.
        let mut second = LibraryStorage::new(pool.clone());
        let mut concurrent: Artist = second.get("ar-1").await.unwrap();
        concurrent.is_favorite = true;
        second.update(&concurrent).await.unwrap();
        second.save_context().await.unwrap();
        drop(second);

        // The first context still holds its stale copy and renames it.
        artist.set_name("New Name");
        first.update(&artist).await.unwrap();
        first.save_context().await.unwrap();
        drop(first);

        let mut reader = LibraryStorage::new(pool);
        let merged: Artist = reader.get("ar-1").await.unwrap();
        assert_eq!(merged.name, "New Name");
        assert_eq!(merged.alphabetic_section_initial, "N");
        assert!(merged.is_favorite);
    }

    #[core_async::test]
    async fn test_update_of_deleted_row_is_not_found() {
        let (_pool, mut library) = storage().await;

        let mut artist: Artist = library.create().await.unwrap();
        library.delete(&artist).await.unwrap();

        artist.remote_status = RemoteStatus::Deleted;
        let result = library.update(&artist).await;
        assert!(matches!(result, Err(LibraryError::NotFound { .. })));
    }

    #[core_async::test]
    async fn test_songs_and_episodes_share_rows_but_not_views() {
        let (_pool, mut library) = storage().await;

        let song: Song = library.create().await.unwrap();
        assert!(!song.is_cached);
        library.create_podcast_episode().await.unwrap();

        assert_eq!(library.count::<Song>().await, 1);
        assert_eq!(library.list::<Song>().await[0].pk, song.pk);
    }

    #[core_async::test]
    async fn test_clean_storage_keeps_sync_wave_ids_monotonic() {
        let (pool, mut library) = storage().await;

        library.create_sync_wave(0).await.unwrap();
        library.create_sync_wave(0).await.unwrap();
        let mut artist: Artist = library.create().await.unwrap();
        artist.id = "ar-1".to_string();
        library.update(&artist).await.unwrap();
        library.save_context().await.unwrap();

        library.clean_storage().await.unwrap();
        assert!(!library.has_pending_transaction());
        drop(library);

        let mut library = LibraryStorage::new(pool);
        assert_eq!(library.count::<Artist>().await, 0);
        let wave = library.create_sync_wave(0).await.unwrap();
        assert_eq!(wave.id, 2);
    }
}
