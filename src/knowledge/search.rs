//! Ranked full-text search and filtered browsing over lessons, errors and patterns.
//!
//! [`search`] is the read-side entry point. With text it runs an FTS5 `MATCH` per
//! requested kind and ranks by `bm25()`; without text it lists matching rows newest
//! first. Filters narrow each kind in SQL (pattern version constraints are compared in
//! Rust), the per-kind candidates are merged, truncated to the limit and only then
//! loaded in full.

use std::cmp::Ordering;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SearchLimits;
use crate::db::ConnectionManager;
use crate::error::{Result, StoreError};
use crate::knowledge::entities;
use crate::knowledge::index::spec;
use crate::knowledge::types::{EntityId, ErrorRecord, IndexedKind, Lesson, LessonCategory, Pattern};

/// Which kinds a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    #[default]
    All,
    Lesson,
    #[serde(rename = "error")]
    ErrorRecord,
    Pattern,
}

impl SearchKind {
    pub fn kinds(&self) -> Vec<IndexedKind> {
        match self {
            Self::All => IndexedKind::ALL.to_vec(),
            Self::Lesson => vec![IndexedKind::Lesson],
            Self::ErrorRecord => vec![IndexedKind::ErrorRecord],
            Self::Pattern => vec![IndexedKind::Pattern],
        }
    }
}

impl std::str::FromStr for SearchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "lesson" => Ok(Self::Lesson),
            "error" => Ok(Self::ErrorRecord),
            "pattern" => Ok(Self::Pattern),
            _ => Err(format!("unknown search kind: {s} (expected all, lesson, error or pattern)")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilters {
    pub technology: Option<String>,
    pub category: Option<LessonCategory>,
    /// Entries must carry every one of these tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Keep patterns whose minimum platform version is at most this.
    pub platform_version: Option<String>,
    pub language_version: Option<String>,
}

impl SearchFilters {
    /// Whether entries of `kind` can satisfy every filter that is set.
    fn admits(&self, kind: IndexedKind) -> bool {
        let has_technology = matches!(kind, IndexedKind::Lesson | IndexedKind::ErrorRecord);
        if self.technology.is_some() && !has_technology {
            return false;
        }
        if self.category.is_some() && kind != IndexedKind::Lesson {
            return false;
        }
        let has_versions = kind == IndexedKind::Pattern;
        if (self.platform_version.is_some() || self.language_version.is_some()) && !has_versions {
            return false;
        }
        true
    }

    fn has_versions(&self) -> bool {
        self.platform_version.is_some() || self.language_version.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub kind: SearchKind,
    /// Free text; empty means browse.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub filters: SearchFilters,
    pub limit: Option<usize>,
}

/// Search tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from(&SearchLimits::default())
    }
}

impl From<&SearchLimits> for SearchConfig {
    fn from(limits: &SearchLimits) -> Self {
        Self {
            default_limit: limits.default_limit,
            max_limit: limits.max_limit.max(1),
        }
    }
}

impl SearchConfig {
    /// Requested limit (or the default) clamped into `1..=max_limit`.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

/// A full entry as returned by search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KnowledgeEntry {
    Lesson(Lesson),
    ErrorRecord(ErrorRecord),
    Pattern(Pattern),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub kind: IndexedKind,
    pub id: EntityId,
    /// `-bm25`, higher is better; 0 when browsing.
    pub score: f64,
    pub entry: KnowledgeEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub limit: usize,
    pub count: usize,
    pub results: Vec<SearchHit>,
}

/// Ranked or browsed candidates before hydration.
#[derive(Debug, Clone)]
struct Candidate {
    kind: IndexedKind,
    id: EntityId,
    score: f64,
    /// Error occurrence count when ranking text matches, else 0.
    occurrences: u32,
    created_at: String,
}

/// Run a search request.
pub fn search(
    db: &ConnectionManager,
    request: &SearchRequest,
    config: &SearchConfig,
) -> Result<SearchResponse> {
    let limit = config.clamp_limit(request.limit);
    let text = request.text.trim();
    let fts_query = if text.is_empty() {
        None
    } else {
        Some(escape_fts_query(text).ok_or_else(|| StoreError::MalformedQuery {
            query: request.text.clone(),
            reason: "query contains no searchable words".into(),
        })?)
    };
    let tags = normalize_filter_tags(&request.filters.tags);

    debug!(
        kind = ?request.kind,
        query = text,
        limit,
        tags = tags.len(),
        "searching knowledge"
    );

    // ranking and hydration read one snapshot, so a concurrent delete cannot
    // remove a hit between the two
    let results = db.with_snapshot(|tx| {
        let mut candidates = Vec::new();
        for kind in request.kind.kinds() {
            if !request.filters.admits(kind) {
                continue;
            }
            let found = search_kind(tx, kind, fts_query.as_deref(), &request.filters, &tags, limit)
                .map_err(|err| malformed_if_fts_syntax(err, &request.text))?;
            candidates.extend(found);
        }

        candidates.sort_by(rank_order);
        candidates.truncate(limit);

        candidates
            .into_iter()
            .map(|c| hydrate(tx, c))
            .collect::<Result<Vec<_>>>()
    })?;

    Ok(SearchResponse {
        query: request.text.clone(),
        limit,
        count: results.len(),
        results,
    })
}

/// Score descending, then most frequent error, then newest, then highest id.
fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.occurrences.cmp(&a.occurrences))
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
        .then_with(|| a.kind.cmp(&b.kind))
}

fn search_kind(
    conn: &Connection,
    kind: IndexedKind,
    fts_query: Option<&str>,
    filters: &SearchFilters,
    tags: &[String],
    limit: usize,
) -> Result<Vec<Candidate>> {
    let table = kind.table();
    let versions = if kind == IndexedKind::Pattern {
        "s.platform_version, s.language_version"
    } else {
        "NULL, NULL"
    };

    // equally relevant errors rank by how often they were seen; browsing stays newest first
    let occurrences = if kind == IndexedKind::ErrorRecord && fts_query.is_some() {
        "s.occurrence_count"
    } else {
        "0"
    };

    let mut values: Vec<Value> = Vec::new();
    let mut sql = match fts_query {
        Some(query) => {
            let fts = spec(kind).fts_table;
            values.push(Value::Text(query.to_string()));
            format!(
                "SELECT s.id, s.created_at, -bm25({fts}) AS score, {occurrences} AS occurrences, \
                 {versions} \
                 FROM {fts} JOIN {table} s ON s.id = {fts}.rowid \
                 WHERE {fts} MATCH ?"
            )
        }
        None => format!(
            "SELECT s.id, s.created_at, 0.0 AS score, {occurrences} AS occurrences, {versions} \
             FROM {table} s WHERE 1 = 1"
        ),
    };

    if let Some(technology) = &filters.technology {
        sql.push_str(" AND s.technology = ?");
        values.push(Value::Text(technology.clone()));
    }
    if let Some(category) = filters.category {
        sql.push_str(" AND s.category = ?");
        values.push(Value::Text(category.as_str().to_string()));
    }
    if !tags.is_empty() {
        let placeholders = vec!["?"; tags.len()].join(", ");
        sql.push_str(&format!(
            " AND s.id IN (SELECT et.entity_id FROM entity_tags et \
             JOIN tags t ON t.id = et.tag_id \
             WHERE et.entity_kind = ? AND t.name IN ({placeholders}) \
             GROUP BY et.entity_id HAVING COUNT(DISTINCT t.id) = ?)"
        ));
        values.push(Value::Text(kind.as_str().to_string()));
        values.extend(tags.iter().map(|t| Value::Text(t.clone())));
        values.push(Value::Integer(tags.len() as i64));
    }

    sql.push_str(" ORDER BY score DESC, occurrences DESC, s.created_at DESC, s.id DESC");
    // version constraints are checked after the query, so they cannot use LIMIT
    if !filters.has_versions() {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            Ok((
                Candidate {
                    kind,
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    score: row.get(2)?,
                    occurrences: row.get(3)?,
                },
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .into_iter()
        .filter(|(_, platform, language)| {
            version_satisfies(platform.as_deref(), filters.platform_version.as_deref())
                && version_satisfies(language.as_deref(), filters.language_version.as_deref())
        })
        .map(|(candidate, _, _)| candidate)
        .take(limit)
        .collect())
}

fn hydrate(conn: &Connection, candidate: Candidate) -> Result<SearchHit> {
    let entry = match candidate.kind {
        IndexedKind::Lesson => KnowledgeEntry::Lesson(entities::get_lesson(conn, candidate.id)?),
        IndexedKind::ErrorRecord => {
            KnowledgeEntry::ErrorRecord(entities::get_error_record(conn, candidate.id)?)
        }
        IndexedKind::Pattern => KnowledgeEntry::Pattern(entities::get_pattern(conn, candidate.id)?),
    };
    Ok(SearchHit {
        kind: candidate.kind,
        id: candidate.id,
        score: candidate.score,
        entry,
    })
}

/// Quote every word so FTS5 operators in user text are matched literally.
///
/// Words without any letter or digit are dropped. Returns `None` if nothing is left.
pub fn escape_fts_query(query: &str) -> Option<String> {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|word| word.replace('"', ""))
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .map(|word| format!("\"{word}\""))
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn malformed_if_fts_syntax(err: StoreError, query: &str) -> StoreError {
    match err {
        StoreError::Database(ref db_err) if db_err.to_string().contains("fts5") => {
            StoreError::MalformedQuery {
                query: query.to_string(),
                reason: db_err.to_string(),
            }
        }
        other => other,
    }
}

fn normalize_filter_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !normalized.iter().any(|t| t == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

/// `constraint` is a minimum version; it is satisfied when absent or not above
/// `requested`.
pub fn version_satisfies(constraint: Option<&str>, requested: Option<&str>) -> bool {
    match (constraint, requested) {
        (Some(min), Some(requested)) if !min.trim().is_empty() => {
            compare_versions(min, requested) != Ordering::Greater
        }
        _ => true,
    }
}

/// Dotted comparison: numeric segments compare as numbers, others as text, missing
/// segments count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = a.trim().split('.').collect();
    let right: Vec<&str> = b.trim().split('.').collect();
    for i in 0..left.len().max(right.len()) {
        let x = left.get(i).copied().unwrap_or("0");
        let y = right.get(i).copied().unwrap_or("0");
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
