use super::util::get_db_pool;
use crate::prelude::*;
use sqlx::{Executor, SqlitePool};
use std::{collections::HashMap, path::Path};

/// Finished translations for one language pair, kept on disk so a rerun
/// after a failure only pays for the texts still missing.
pub struct Checkpoint {
    pool: SqlitePool,
    source_lang: String,
    target_lang: String,
}

impl Checkpoint {
    pub async fn open(db_path: &Path, source_lang: &str, target_lang: &str) -> Result<Self> {
        let pool = get_db_pool(db_path).await?;
        pool.execute(
            "CREATE TABLE IF NOT EXISTS translations (
                source_lang TEXT NOT NULL,
                target_lang TEXT NOT NULL,
                text TEXT NOT NULL,
                translation TEXT NOT NULL,
                PRIMARY KEY (source_lang, target_lang, text)
            )",
        )
        .await?;
        tracing::info!("Translation checkpoint at {}", db_path.display());

        Ok(Self {
            pool,
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        })
    }

    pub async fn load(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT text, translation FROM translations WHERE source_lang = $1 AND target_lang = $2",
        )
        .bind(&self.source_lang)
        .bind(&self.target_lang)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    pub async fn store(&self, text: &str, translation: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO translations (source_lang, target_lang, text, translation) VALUES ($1, $2, $3, $4)",
        )
        .bind(&self.source_lang)
        .bind(&self.target_lang)
        .bind(text)
        .bind(translation)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn stored_translations_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("checkpoint.sqlite");

        let checkpoint = Checkpoint::open(&path, "en", "tr").await.unwrap();
        checkpoint.store("Brazil", "Brezilya").await.unwrap();
        checkpoint.store("Brazil", "Brezilya Federatif Cumhuriyeti").await.unwrap();
        checkpoint.close().await;

        let checkpoint = Checkpoint::open(&path, "en", "tr").await.unwrap();
        let loaded = checkpoint.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["Brazil"], "Brezilya Federatif Cumhuriyeti");
    }

    #[tokio::test]
    async fn language_pairs_are_kept_apart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.sqlite");

        Checkpoint::open(&path, "en", "tr")
            .await
            .unwrap()
            .store("Chile", "Şili")
            .await
            .unwrap();

        let german = Checkpoint::open(&path, "en", "de").await.unwrap();
        assert!(german.load().await.unwrap().is_empty());
    }
}
