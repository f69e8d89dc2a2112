use chrono::{DateTime, Utc};
use domain::CacheEntry;
use sqlx::FromRow;

#[derive(FromRow)]
pub struct SqlAnalysis {
    pub url: String,
    pub summary_focus: String,
    pub summary_length: String,
    pub tone: String,
    pub included_image_analysis: bool,
    pub included_external_search: bool,
    pub comment_count: i64,
    pub total_score: i64,
    pub total_effective_score: f64,
    pub analysis_text: String,
    pub eli5_text: Option<String>,
    pub notable_comments: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SqlAnalysis> for CacheEntry {
    type Error = anyhow::Error;

    fn try_from(sql: SqlAnalysis) -> Result<Self, Self::Error> {
        Ok(CacheEntry {
            summary_length: sql.summary_length.parse()?,
            tone: sql.tone.parse()?,
            comment_count: u64::try_from(sql.comment_count)?,
            url: sql.url,
            summary_focus: sql.summary_focus,
            included_image_analysis: sql.included_image_analysis,
            included_external_search: sql.included_external_search,
            total_score: sql.total_score,
            total_effective_score: sql.total_effective_score,
            analysis_text: sql.analysis_text,
            eli5_text: sql.eli5_text,
            notable_comments: sql.notable_comments,
            created_at: sql.created_at,
        })
    }
}
