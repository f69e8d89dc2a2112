//! Approximate-match lookup over previously computed analyses.
//!
//! A lookup narrows the table in three stages: exact request key, then
//! capabilities (a cached row must have done at least what is asked), then
//! drift tolerance on the thread's comment count and total score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{SubtreeStats, Thread};
use crate::protocol;

pub const DEFAULT_SUMMARY_FOCUS: &str = "General Summary";
pub const MAX_FOCUS_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("not a reddit thread url: {0}")]
    InvalidUrl(String),
    #[error("summary focus is {0} characters long (max 50)")]
    FocusTooLong(usize),
    #[error("unknown summary length: {0}")]
    UnknownLength(String),
    #[error("unknown tone: {0}")]
    UnknownTone(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }
}

impl fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryLength {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            _ => Err(ParamError::UnknownLength(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Teacher,
    Pompous,
    Foulmouthed,
    ClickbaiterYoutuber,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Pompous => "pompous",
            Self::Foulmouthed => "foulmouthed",
            Self::ClickbaiterYoutuber => "clickbaiter_youtuber",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "teacher" => Ok(Self::Teacher),
            "pompous" => Ok(Self::Pompous),
            "foulmouthed" => Ok(Self::Foulmouthed),
            "clickbaiter_youtuber" | "clickbaiter" => Ok(Self::ClickbaiterYoutuber),
            _ => Err(ParamError::UnknownTone(s.to_string())),
        }
    }
}

/// Optional analysis stages a request asks for, or a cached row performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    pub analyze_image: bool,
    pub search_external: bool,
}

impl Capabilities {
    /// True when everything `requested` was also done here.
    pub fn covers(&self, requested: &Capabilities) -> bool {
        (self.analyze_image || !requested.analyze_image)
            && (self.search_external || !requested.search_external)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub url: String,
    pub summary_focus: String,
    pub summary_length: SummaryLength,
    pub tone: Tone,
}

fn default_focus() -> String {
    DEFAULT_SUMMARY_FOCUS.to_string()
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub url: String,
    #[serde(default = "default_focus")]
    pub summary_focus: String,
    #[serde(default)]
    pub summary_length: SummaryLength,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default = "enabled")]
    pub include_eli5: bool,
    #[serde(default = "enabled")]
    pub analyze_image: bool,
    #[serde(default)]
    pub search_external: bool,
}

impl AnalysisParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            summary_focus: default_focus(),
            summary_length: SummaryLength::default(),
            tone: Tone::default(),
            include_eli5: true,
            analyze_image: true,
            search_external: false,
        }
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if !protocol::is_thread_url(&self.url) {
            return Err(ParamError::InvalidUrl(self.url.clone()));
        }
        let focus_len = self.summary_focus.chars().count();
        if focus_len > MAX_FOCUS_CHARS {
            return Err(ParamError::FocusTooLong(focus_len));
        }
        Ok(())
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            url: self.url.clone(),
            summary_focus: self.summary_focus.clone(),
            summary_length: self.summary_length,
            tone: self.tone,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            analyze_image: self.analyze_image,
            search_external: self.search_external,
        }
    }
}

/// Thread statistics stored next to a cached analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub comment_count: u64,
    pub total_score: i64,
    pub total_effective_score: f64,
}

impl From<SubtreeStats> for Fingerprint {
    fn from(s: SubtreeStats) -> Self {
        Self {
            comment_count: s.count,
            total_score: s.total_score,
            total_effective_score: s.total_effective_score,
        }
    }
}

impl Fingerprint {
    pub fn of(thread: &Thread) -> Self {
        thread.stats().into()
    }
}

/// Relative drift allowed between a cached fingerprint and the live thread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub comment_count: f64,
    pub score: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            comment_count: 0.10,
            score: 0.30,
        }
    }
}

impl Tolerance {
    pub fn accepts(&self, cached: &Fingerprint, current: &Fingerprint) -> bool {
        within_band(
            cached.comment_count as f64,
            current.comment_count as f64,
            self.comment_count,
        ) && within_band(cached.total_score as f64, current.total_score as f64, self.score)
    }
}

/// `cached * (1 - ratio) <= current <= cached * (1 + ratio)`, bounds swapped
/// for negative totals.
fn within_band(cached: f64, current: f64, ratio: f64) -> bool {
    let a = cached * (1.0 - ratio);
    let b = cached * (1.0 + ratio);
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    low <= current && current <= high
}

/// One past analysis. Flat on purpose: it maps one-to-one onto a stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub summary_focus: String,
    pub summary_length: SummaryLength,
    pub tone: Tone,
    pub included_image_analysis: bool,
    pub included_external_search: bool,
    pub comment_count: u64,
    pub total_score: i64,
    pub total_effective_score: f64,
    pub analysis_text: String,
    pub eli5_text: Option<String>,
    /// Serialized [`crate::TreeReport`].
    pub notable_comments: String,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(
        params: &AnalysisParams,
        fingerprint: Fingerprint,
        analysis_text: String,
        eli5_text: Option<String>,
        notable_comments: String,
    ) -> Self {
        Self {
            url: params.url.clone(),
            summary_focus: params.summary_focus.clone(),
            summary_length: params.summary_length,
            tone: params.tone,
            included_image_analysis: params.analyze_image,
            included_external_search: params.search_external,
            comment_count: fingerprint.comment_count,
            total_score: fingerprint.total_score,
            total_effective_score: fingerprint.total_effective_score,
            analysis_text,
            eli5_text,
            notable_comments,
            created_at: Utc::now(),
        }
    }

    pub fn matches_key(&self, key: &CacheKey) -> bool {
        self.url == key.url
            && self.summary_focus == key.summary_focus
            && self.summary_length == key.summary_length
            && self.tone == key.tone
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            analyze_image: self.included_image_analysis,
            search_external: self.included_external_search,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            comment_count: self.comment_count,
            total_score: self.total_score,
            total_effective_score: self.total_effective_score,
        }
    }

    pub fn has_eli5(&self) -> bool {
        self.eli5_text.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Outcome of a lookup and the action it calls for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheLookup<'a> {
    /// Reuse `entry`, patching in an ELI5 summary if the request wants one it lacks.
    Hit { index: usize, entry: &'a CacheEntry },
    /// Nothing shares the request key: analyse and append.
    Miss,
    /// Key rows exist but none did the requested stages: analyse and replace `index`.
    CapabilityMiss { index: usize },
    /// Capable rows exist but the thread drifted: analyse and replace `index`.
    ToleranceMiss { index: usize },
}

impl CacheLookup<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hit { .. } => "hit",
            Self::Miss => "miss",
            Self::CapabilityMiss { .. } => "capability_miss",
            Self::ToleranceMiss { .. } => "tolerance_miss",
        }
    }
}

/// Runs the three filter stages over `table` in row order.
pub fn match_fingerprint<'a>(
    table: &'a [CacheEntry],
    key: &CacheKey,
    requested: &Capabilities,
    current: &Fingerprint,
    tolerance: &Tolerance,
) -> CacheLookup<'a> {
    let keyed: Vec<usize> = table
        .iter()
        .enumerate()
        .filter(|(_, row)| row.matches_key(key))
        .map(|(i, _)| i)
        .collect();
    let Some(&first_keyed) = keyed.first() else {
        return CacheLookup::Miss;
    };

    let capable: Vec<usize> = keyed
        .into_iter()
        .filter(|&i| table[i].capabilities().covers(requested))
        .collect();
    let Some(&first_capable) = capable.first() else {
        return CacheLookup::CapabilityMiss { index: first_keyed };
    };

    capable
        .into_iter()
        .find(|&i| tolerance.accepts(&table[i].fingerprint(), current))
        .map(|index| CacheLookup::Hit {
            index,
            entry: &table[index],
        })
        .unwrap_or(CacheLookup::ToleranceMiss {
            index: first_capable,
        })
}

/// Looks up `params` for the live `thread`.
pub fn match_cache<'a>(
    table: &'a [CacheEntry],
    thread: &Thread,
    params: &AnalysisParams,
    tolerance: &Tolerance,
) -> CacheLookup<'a> {
    match_fingerprint(
        table,
        &params.cache_key(),
        &params.capabilities(),
        &Fingerprint::of(thread),
        tolerance,
    )
}

/// In-memory copy of the whole cache table. Rows are never removed, so an
/// index stays valid for the lifetime of the table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheTable {
    rows: Vec<CacheEntry>,
    tolerance: Tolerance,
}

impl CacheTable {
    pub fn new(rows: Vec<CacheEntry>, tolerance: Tolerance) -> Self {
        Self { rows, tolerance }
    }

    pub fn rows(&self) -> &[CacheEntry] {
        &self.rows
    }

    pub fn lookup(&self, thread: &Thread, params: &AnalysisParams) -> CacheLookup<'_> {
        match_cache(&self.rows, thread, params, &self.tolerance)
    }

    pub fn lookup_fingerprint(
        &self,
        params: &AnalysisParams,
        current: &Fingerprint,
    ) -> CacheLookup<'_> {
        match_fingerprint(
            &self.rows,
            &params.cache_key(),
            &params.capabilities(),
            current,
            &self.tolerance,
        )
    }

    /// Index of the new row.
    pub fn append(&mut self, entry: CacheEntry) -> usize {
        self.rows.push(entry);
        self.rows.len() - 1
    }

    /// Returns false when `index` is out of range.
    pub fn replace(&mut self, index: usize, entry: CacheEntry) -> bool {
        match self.rows.get_mut(index) {
            Some(row) => {
                *row = entry;
                true
            }
            None => false,
        }
    }

    /// Field-level update of the ELI5 summary; the rest of the row is kept.
    pub fn patch_eli5(&mut self, index: usize, text: String) -> bool {
        match self.rows.get_mut(index) {
            Some(row) => {
                row.eli5_text = Some(text);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::sample_thread;

    const URL: &str = "https://www.reddit.com/r/rust/comments/abc123/example/";

    fn entry(count: u64, score: i64, image: bool, external: bool) -> CacheEntry {
        let mut params = AnalysisParams::new(URL);
        params.analyze_image = image;
        params.search_external = external;
        CacheEntry::new(
            &params,
            Fingerprint {
                comment_count: count,
                total_score: score,
                total_effective_score: score as f64,
            },
            format!("analysis {}/{}", count, score),
            None,
            "{}".to_string(),
        )
    }

    fn request(image: bool, external: bool) -> AnalysisParams {
        let mut params = AnalysisParams::new(URL);
        params.analyze_image = image;
        params.search_external = external;
        params
    }

    fn current(count: u64, score: i64) -> Fingerprint {
        Fingerprint {
            comment_count: count,
            total_score: score,
            total_effective_score: 0.0,
        }
    }

    fn lookup<'a>(table: &'a [CacheEntry], params: &AnalysisParams, fp: Fingerprint) -> CacheLookup<'a> {
        match_fingerprint(
            table,
            &params.cache_key(),
            &params.capabilities(),
            &fp,
            &Tolerance::default(),
        )
    }

    #[test]
    fn comment_count_band_is_ten_percent() {
        let cached = current(100, 1000);
        let tolerance = Tolerance::default();
        assert!(tolerance.accepts(&cached, &current(109, 1000)));
        assert!(tolerance.accepts(&cached, &current(90, 1000)));
        assert!(!tolerance.accepts(&cached, &current(111, 1000)));
        assert!(!tolerance.accepts(&cached, &current(89, 1000)));
    }

    #[test]
    fn score_band_is_thirty_percent() {
        let cached = current(100, 1000);
        let tolerance = Tolerance::default();
        assert!(tolerance.accepts(&cached, &current(100, 1299)));
        assert!(tolerance.accepts(&cached, &current(100, 700)));
        assert!(!tolerance.accepts(&cached, &current(100, 1301)));
        assert!(!tolerance.accepts(&cached, &current(100, 699)));
    }

    #[test]
    fn negative_score_totals_use_a_symmetric_band() {
        let cached = current(10, -100);
        let tolerance = Tolerance::default();
        assert!(tolerance.accepts(&cached, &current(10, -120)));
        assert!(!tolerance.accepts(&cached, &current(10, -140)));
    }

    #[test]
    fn capability_superset_rules() {
        let cached = Capabilities {
            analyze_image: true,
            search_external: false,
        };
        assert!(cached.covers(&Capabilities::default()));
        assert!(cached.covers(&Capabilities {
            analyze_image: true,
            search_external: false
        }));
        assert!(!cached.covers(&Capabilities {
            analyze_image: false,
            search_external: true
        }));
    }

    #[test]
    fn empty_table_is_a_miss() {
        assert_eq!(lookup(&[], &request(false, false), current(1, 1)), CacheLookup::Miss);
    }

    #[test]
    fn other_key_is_a_miss() {
        let table = vec![entry(100, 1000, true, true)];
        let mut params = request(false, false);
        params.tone = Tone::Pompous;
        assert_eq!(lookup(&table, &params, current(100, 1000)), CacheLookup::Miss);

        let mut params = request(false, false);
        params.summary_focus = "technical breakdown".to_string();
        assert_eq!(lookup(&table, &params, current(100, 1000)), CacheLookup::Miss);
    }

    #[test]
    fn missing_capability_replaces_first_keyed_row() {
        let table = vec![
            entry(5, 5, false, false),
            entry(100, 1000, true, false),
            entry(100, 1000, false, false),
        ];
        let result = lookup(&table, &request(false, true), current(100, 1000));
        assert_eq!(result, CacheLookup::CapabilityMiss { index: 0 });
    }

    #[test]
    fn richer_row_serves_a_poorer_request() {
        let table = vec![entry(100, 1000, true, true)];
        match lookup(&table, &request(false, false), current(105, 1100)) {
            CacheLookup::Hit { index, entry } => {
                assert_eq!(index, 0);
                assert_eq!(entry.comment_count, 100);
            }
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn drift_replaces_first_capable_row() {
        let table = vec![
            entry(100, 1000, false, false),
            entry(10, 100, true, false),
            entry(12, 120, true, false),
        ];
        let result = lookup(&table, &request(true, false), current(500, 5000));
        assert_eq!(result, CacheLookup::ToleranceMiss { index: 1 });
    }

    #[test]
    fn first_row_within_tolerance_wins() {
        let table = vec![
            entry(50, 500, true, false),
            entry(100, 1000, true, false),
            entry(101, 1010, true, false),
        ];
        let result = lookup(&table, &request(true, false), current(102, 1020));
        assert!(matches!(result, CacheLookup::Hit { index: 1, .. }));
    }

    #[test]
    fn match_cache_fingerprints_the_live_thread() {
        let thread = sample_thread();
        let fp = Fingerprint::of(&thread);
        assert_eq!(fp.comment_count, 5);
        assert_eq!(fp.total_score, 10 + 5 + 20 + 1 + 50);

        let table = vec![entry(fp.comment_count, fp.total_score, true, false)];
        let params = request(true, false);
        let result = match_cache(&table, &thread, &params, &Tolerance::default());
        assert!(matches!(result, CacheLookup::Hit { index: 0, .. }));
    }

    #[test]
    fn table_append_replace_and_patch() {
        let mut table = CacheTable::new(vec![entry(10, 10, false, false)], Tolerance::default());
        let params = request(false, false);

        assert!(matches!(
            table.lookup_fingerprint(&params, &current(10, 10)),
            CacheLookup::Hit { index: 0, .. }
        ));
        assert!(!table.rows()[0].has_eli5());

        assert!(table.patch_eli5(0, "like you're five".to_string()));
        assert_eq!(table.rows()[0].eli5_text.as_deref(), Some("like you're five"));
        assert_eq!(table.rows()[0].analysis_text, "analysis 10/10");

        assert!(table.replace(0, entry(20, 20, false, false)));
        assert_eq!(table.rows()[0].comment_count, 20);
        assert!(!table.replace(7, entry(1, 1, false, false)));

        assert_eq!(table.append(entry(30, 30, true, true)), 1);
        assert_eq!(table.rows().len(), 2);
    }

    #[test]
    fn params_parse_and_validate() {
        assert_eq!("Long".parse::<SummaryLength>().unwrap(), SummaryLength::Long);
        assert_eq!(
            "Clickbaiter_Youtuber".parse::<Tone>().unwrap(),
            Tone::ClickbaiterYoutuber
        );
        assert!(matches!("huge".parse::<SummaryLength>(), Err(ParamError::UnknownLength(_))));

        let params: AnalysisParams = serde_json::from_str(&format!(r#"{{"url":"{}"}}"#, URL)).unwrap();
        assert_eq!(params, AnalysisParams::new(URL));
        assert!(params.validate().is_ok());

        let mut bad = params.clone();
        bad.summary_focus = "x".repeat(51);
        assert_eq!(bad.validate(), Err(ParamError::FocusTooLong(51)));

        let bad = AnalysisParams::new("https://example.com/r/rust/comments/abc");
        assert!(matches!(bad.validate(), Err(ParamError::InvalidUrl(_))));
    }
}
