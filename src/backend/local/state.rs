use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tokio::fs as async_fs;

const DB_FILE_NAME: &str = "grantdesk.db";
const STORAGE_DIR_NAME: &str = "storage";

/// Database pool and object directory of a local backend.
pub(super) struct LocalState {
    root: PathBuf,
    pool: SqlitePool,
}

impl std::fmt::Debug for LocalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalState")
            .field("root", &self.root)
            .finish()
    }
}

impl LocalState {
    pub(super) async fn open<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        async_fs::create_dir_all(root.join(STORAGE_DIR_NAME))
            .await
            .with_context(|| format!("Failed to create data directory {:?}", root))?;
        let root = async_fs::canonicalize(&root)
            .await
            .with_context(|| format!("Failed to resolve data directory {:?}", root))?;

        let connect_opts = SqliteConnectOptions::new()
            .filename(root.join(DB_FILE_NAME))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_opts)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { root, pool })
    }

    pub(super) fn root(&self) -> &Path {
        &self.root
    }

    pub(super) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Location of `path` inside `bucket`. Rejects paths that would escape
    /// the bucket directory.
    pub(super) fn object_file(&self, bucket: &str, path: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe || bucket.contains(['/', '\\']) || bucket.starts_with('.') {
            anyhow::bail!("Invalid object path: {bucket}/{path}");
        }
        Ok(self.root.join(STORAGE_DIR_NAME).join(bucket).join(relative))
    }

    /// Copy `source` into the object store, returning the stored file's path.
    pub(super) async fn store_object<P: AsRef<Path>>(
        &self,
        bucket: &str,
        path: &str,
        source: P,
    ) -> anyhow::Result<PathBuf> {
        let dest_path = self.object_file(bucket, path)?;
        if let Some(parent) = dest_path.parent() {
            async_fs::create_dir_all(parent).await?;
        }
        async_fs::copy(&source, &dest_path).await.with_context(|| {
            format!(
                "Failed to copy {:?} to {:?}",
                source.as_ref(),
                dest_path
            )
        })?;
        Ok(dest_path)
    }

    pub(super) async fn delete_object(&self, bucket: &str, path: &str) -> anyhow::Result<()> {
        let object_path = self.object_file(bucket, path)?;
        async_fs::remove_file(&object_path)
            .await
            .with_context(|| format!("Failed to delete object {:?}", object_path))?;
        Ok(())
    }
}
