use crate::{models::SqlAnalysis, Db};
use domain::CacheEntry;
use tracing::debug;

const SELECT_ANALYSES: &str = r#"
    SELECT url, summary_focus, summary_length, tone,
           included_image_analysis, included_external_search,
           comment_count, total_score, total_effective_score,
           analysis_text, eli5_text, notable_comments, created_at
    FROM analyses
"#;

impl Db {
    /// The whole cache table in row order.
    pub async fn load_analyses(&self) -> anyhow::Result<Vec<CacheEntry>> {
        let rows: Vec<SqlAnalysis> = sqlx::query_as(&format!("{SELECT_ANALYSES} ORDER BY position"))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(CacheEntry::try_from).collect()
    }

    /// Replaces the stored table with `rows`, atomically.
    pub async fn save_analyses(&self, rows: &[CacheEntry]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM analyses")
            .execute(&mut *tx)
            .await?;

        for (position, row) in rows.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO analyses (
                    position, url, summary_focus, summary_length, tone,
                    included_image_analysis, included_external_search,
                    comment_count, total_score, total_effective_score,
                    analysis_text, eli5_text, notable_comments, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(i64::try_from(position)?)
            .bind(&row.url)
            .bind(&row.summary_focus)
            .bind(row.summary_length.as_str())
            .bind(row.tone.as_str())
            .bind(row.included_image_analysis)
            .bind(row.included_external_search)
            .bind(i64::try_from(row.comment_count)?)
            .bind(row.total_score)
            .bind(row.total_effective_score)
            .bind(&row.analysis_text)
            .bind(&row.eli5_text)
            .bind(&row.notable_comments)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Saved {} cached analyses", rows.len());
        Ok(())
    }

    /// Rows for one thread url, newest first.
    pub async fn list_analyses_for_url(&self, url: &str) -> anyhow::Result<Vec<CacheEntry>> {
        let rows: Vec<SqlAnalysis> = sqlx::query_as(&format!(
            "{SELECT_ANALYSES} WHERE url = ? ORDER BY created_at DESC, position DESC"
        ))
        .bind(url)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CacheEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::Db;
    use domain::{AnalysisParams, CacheEntry, Fingerprint, Tone};

    const URL: &str = "https://www.reddit.com/r/rust/comments/abc123/example/";

    fn entry(url: &str, tone: Tone, text: &str) -> CacheEntry {
        let mut params = AnalysisParams::new(url);
        params.tone = tone;
        let fingerprint = Fingerprint {
            comment_count: 42,
            total_score: -7,
            total_effective_score: 12.5,
        };
        CacheEntry::new(&params, fingerprint, text.to_string(), None, "{}".to_string())
    }

    #[tokio::test]
    async fn empty_database_has_no_rows() {
        let db = Db::in_memory().await.unwrap();
        assert!(db.load_analyses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_keeps_order_and_fields() {
        let db = Db::in_memory().await.unwrap();
        let mut second = entry(URL, Tone::Pompous, "second");
        second.eli5_text = Some("like you're five".into());
        let rows = vec![entry(URL, Tone::Teacher, "first"), second];

        db.save_analyses(&rows).await.unwrap();
        let loaded = db.load_analyses().await.unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].analysis_text, "first");
        assert_eq!(loaded[1].tone, Tone::Pompous);
        assert_eq!(loaded[1].eli5_text.as_deref(), Some("like you're five"));
        assert_eq!(loaded[0].total_score, -7);
        assert_eq!(loaded[0].total_effective_score, 12.5);
    }

    #[tokio::test]
    async fn save_replaces_the_previous_table() {
        let db = Db::in_memory().await.unwrap();
        db.save_analyses(&[entry(URL, Tone::Teacher, "a"), entry(URL, Tone::Teacher, "b")])
            .await
            .unwrap();
        db.save_analyses(&[entry(URL, Tone::Teacher, "c")]).await.unwrap();

        let loaded = db.load_analyses().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].analysis_text, "c");
    }

    #[tokio::test]
    async fn lists_rows_for_one_url() {
        let db = Db::in_memory().await.unwrap();
        let other = "https://www.reddit.com/r/rust/comments/zzz999/other/";
        db.save_analyses(&[entry(URL, Tone::Teacher, "a"), entry(other, Tone::Teacher, "b")])
            .await
            .unwrap();

        let rows = db.list_analyses_for_url(other).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].analysis_text, "b");
    }
}
