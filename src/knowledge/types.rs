//! Entity and input type definitions.
//!
//! Defines the stored records ([`Lesson`], [`ErrorRecord`], [`Pattern`], [`Session`]),
//! their kinds ([`EntityKind`], [`IndexedKind`]), the closed [`LessonCategory`] enum,
//! and the field-named inputs accepted by the write path together with their
//! validation rules.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Surrogate identity of a stored row. Assigned monotonically, never reused.
pub type EntityId = i64;

/// Every kind of record the store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Lesson,
    #[serde(rename = "error")]
    ErrorRecord,
    Pattern,
    Session,
    Tag,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lesson => "lesson",
            Self::ErrorRecord => "error",
            Self::Pattern => "pattern",
            Self::Session => "session",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kinds that carry a text index and tag links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexedKind {
    Lesson,
    #[serde(rename = "error")]
    ErrorRecord,
    Pattern,
}

impl IndexedKind {
    pub const ALL: [IndexedKind; 3] = [Self::Lesson, Self::ErrorRecord, Self::Pattern];

    /// Value stored in `entity_tags.entity_kind`.
    pub fn as_str(&self) -> &'static str {
        self.entity_kind().as_str()
    }

    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Self::Lesson => EntityKind::Lesson,
            Self::ErrorRecord => EntityKind::ErrorRecord,
            Self::Pattern => EntityKind::Pattern,
        }
    }

    /// Primary table holding rows of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Lesson => "lessons",
            Self::ErrorRecord => "common_errors",
            Self::Pattern => "patterns",
        }
    }
}

impl std::fmt::Display for IndexedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IndexedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lesson" => Ok(Self::Lesson),
            "error" => Ok(Self::ErrorRecord),
            "pattern" => Ok(Self::Pattern),
            _ => Err(format!("unknown entry kind: {s} (expected lesson, error or pattern)")),
        }
    }
}

/// Closed set of lesson categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonCategory {
    /// A reusable code pattern.
    Pattern,
    /// A best practice.
    Practice,
    /// A common pitfall.
    Gotcha,
    /// An architectural decision.
    Decision,
}

impl LessonCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Practice => "practice",
            Self::Gotcha => "gotcha",
            Self::Decision => "decision",
        }
    }

    /// Parse a caller-supplied category, failing validation on unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        s.parse().map_err(|_| {
            StoreError::validation(
                "category",
                "must be one of: pattern, practice, gotcha, decision",
            )
        })
    }
}

impl std::fmt::Display for LessonCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LessonCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pattern" => Ok(Self::Pattern),
            "practice" => Ok(Self::Practice),
            "gotcha" => Ok(Self::Gotcha),
            "decision" => Ok(Self::Decision),
            _ => Err(format!("unknown lesson category: {s}")),
        }
    }
}

// ── Stored records ────────────────────────────────────────────────────────────

/// A learning captured during development.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: EntityId,
    pub title: String,
    pub content: String,
    pub category: LessonCategory,
    pub technology: Option<String>,
    pub project_context: Option<String>,
    /// Session id or log path this was learned in. Not enforced.
    pub source_session: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A known error message and how to fix it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: EntityId,
    pub technology: String,
    pub error_pattern: String,
    pub root_cause: Option<String>,
    pub solution: String,
    pub code_example: Option<String>,
    /// Starts at 1 and only ever grows.
    pub occurrence_count: u32,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A reusable code pattern with an example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: EntityId,
    pub pattern_name: String,
    pub description: String,
    pub code_example: String,
    pub when_to_use: Option<String>,
    pub when_not_to_use: Option<String>,
    pub related_apis: Vec<String>,
    /// Minimum platform version, e.g. `"17.0"`.
    pub platform_version: Option<String>,
    /// Minimum language version, e.g. `"5.9"`.
    pub language_version: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A development session the knowledge came out of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: EntityId,
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    pub project_name: Option<String>,
    pub log_reference: Option<String>,
    pub summary: Option<String>,
    pub created_at: String,
}

/// A tag and how many entries link to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagUsage {
    #[serde(rename = "tag")]
    pub name: String,
    pub usage_count: u64,
}

// ── Inputs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLesson {
    pub title: String,
    pub content: String,
    pub category: String,
    pub technology: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub project_context: Option<String>,
    pub source_session: Option<String>,
}

impl NewLesson {
    /// Check required fields and the category; returns the parsed category.
    pub fn validate(&self) -> Result<LessonCategory> {
        require("title", &self.title)?;
        require("content", &self.content)?;
        let category = LessonCategory::parse(&self.category)?;
        normalize_tag_names(&self.tags)?;
        Ok(category)
    }
}

/// Partial lesson update. `None` leaves a field alone; `Some("")` clears an
/// optional field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub technology: Option<String>,
    pub project_context: Option<String>,
    pub source_session: Option<String>,
    /// Replaces the whole tag set when present.
    pub tags: Option<Vec<String>>,
}

impl LessonUpdate {
    pub fn validate(&self) -> Result<Option<LessonCategory>> {
        require_if_present("title", self.title.as_deref())?;
        require_if_present("content", self.content.as_deref())?;
        if let Some(tags) = &self.tags {
            normalize_tag_names(tags)?;
        }
        self.category.as_deref().map(LessonCategory::parse).transpose()
    }

    /// Whether the indexed columns change.
    pub fn touches_index(&self) -> bool {
        self.title.is_some() || self.content.is_some() || self.technology.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewErrorRecord {
    pub technology: String,
    pub error_pattern: String,
    pub solution: String,
    pub root_cause: Option<String>,
    pub code_example: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewErrorRecord {
    pub fn validate(&self) -> Result<()> {
        require("technology", &self.technology)?;
        require("error_pattern", &self.error_pattern)?;
        require("solution", &self.solution)?;
        normalize_tag_names(&self.tags)?;
        Ok(())
    }
}

/// Partial error-record update. `occurrence_count` is not updatable here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorRecordUpdate {
    pub technology: Option<String>,
    pub error_pattern: Option<String>,
    pub solution: Option<String>,
    pub root_cause: Option<String>,
    pub code_example: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ErrorRecordUpdate {
    pub fn validate(&self) -> Result<()> {
        require_if_present("technology", self.technology.as_deref())?;
        require_if_present("error_pattern", self.error_pattern.as_deref())?;
        require_if_present("solution", self.solution.as_deref())?;
        if let Some(tags) = &self.tags {
            normalize_tag_names(tags)?;
        }
        Ok(())
    }

    pub fn touches_index(&self) -> bool {
        self.technology.is_some()
            || self.error_pattern.is_some()
            || self.solution.is_some()
            || self.root_cause.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPattern {
    pub pattern_name: String,
    pub description: String,
    pub code_example: String,
    pub when_to_use: Option<String>,
    pub when_not_to_use: Option<String>,
    #[serde(default)]
    pub related_apis: Vec<String>,
    pub platform_version: Option<String>,
    pub language_version: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewPattern {
    pub fn validate(&self) -> Result<()> {
        require("pattern_name", &self.pattern_name)?;
        require("description", &self.description)?;
        require("code_example", &self.code_example)?;
        normalize_tag_names(&self.tags)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternUpdate {
    pub pattern_name: Option<String>,
    pub description: Option<String>,
    pub code_example: Option<String>,
    pub when_to_use: Option<String>,
    pub when_not_to_use: Option<String>,
    pub related_apis: Option<Vec<String>>,
    pub platform_version: Option<String>,
    pub language_version: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl PatternUpdate {
    pub fn validate(&self) -> Result<()> {
        require_if_present("pattern_name", self.pattern_name.as_deref())?;
        require_if_present("description", self.description.as_deref())?;
        require_if_present("code_example", self.code_example.as_deref())?;
        if let Some(tags) = &self.tags {
            normalize_tag_names(tags)?;
        }
        Ok(())
    }

    pub fn touches_index(&self) -> bool {
        self.pattern_name.is_some()
            || self.description.is_some()
            || self.code_example.is_some()
            || self.when_to_use.is_some()
            || self.related_apis.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSession {
    pub date: String,
    pub project_name: Option<String>,
    pub log_reference: Option<String>,
    pub summary: Option<String>,
}

impl NewSession {
    pub fn validate(&self) -> Result<()> {
        validate_date(&self.date)
    }
}

// ── Validation helpers ────────────────────────────────────────────────────────

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(StoreError::validation(field, "is required and must not be empty"));
    }
    Ok(())
}

fn require_if_present(field: &'static str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) => require(field, v),
        None => Ok(()),
    }
}

/// `YYYY-MM-DD`, and a date that exists on the calendar.
pub fn validate_date(date: &str) -> Result<()> {
    let well_formed = date.len() == 10
        && chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok();
    if !well_formed {
        return Err(StoreError::validation(
            "date",
            format!("{date:?} is not a valid YYYY-MM-DD date"),
        ));
    }
    Ok(())
}

/// Trim tag names, reject empty ones and drop repeats (first occurrence wins).
pub fn normalize_tag_names(names: &[String]) -> Result<Vec<String>> {
    let mut seen = std::collections::HashSet::new();
    let mut normalized = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::validation("tags", "tag names must not be empty"));
        }
        if seen.insert(name) {
            normalized.push(name.to_string());
        }
    }
    Ok(normalized)
}

/// Empty strings clear optional columns.
pub(crate) fn optional_text(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Fixed-width UTC timestamp, so text order equals time order.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(title: &str, content: &str, category: &str) -> NewLesson {
        NewLesson {
            title: title.into(),
            content: content.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    #[test]
    fn lesson_validation_reports_offending_field() {
        let err = lesson("", "body", "gotcha").validate().unwrap_err();
        assert!(matches!(err, StoreError::ValidationFailed { field: "title", .. }));

        let err = lesson("title", "   ", "gotcha").validate().unwrap_err();
        assert!(matches!(err, StoreError::ValidationFailed { field: "content", .. }));

        let err = lesson("title", "body", "recipe").validate().unwrap_err();
        assert!(matches!(err, StoreError::ValidationFailed { field: "category", .. }));

        assert_eq!(
            lesson("title", "body", "decision").validate().unwrap(),
            LessonCategory::Decision
        );
    }

    #[test]
    fn update_category_is_validated_only_when_present() {
        assert_eq!(LessonUpdate::default().validate().unwrap(), None);
        let update = LessonUpdate {
            category: Some("nope".into()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn project_context_change_does_not_touch_index() {
        let update = LessonUpdate {
            project_context: Some("billing".into()),
            ..Default::default()
        };
        assert!(!update.touches_index());
        let update = LessonUpdate {
            technology: Some("rust".into()),
            ..Default::default()
        };
        assert!(update.touches_index());
    }

    #[test]
    fn session_dates_must_be_real() {
        assert!(validate_date("2025-03-14").is_ok());
        assert!(validate_date("2025-02-30").is_err());
        assert!(validate_date("2025-3-14").is_err());
        assert!(validate_date("14/03/2025").is_err());
        assert!(validate_date("").is_err());
    }

    #[test]
    fn tag_names_are_trimmed_and_deduplicated() {
        let names = vec![
            "rust".to_string(),
            " async ".to_string(),
            "rust".to_string(),
            "Rust".to_string(),
        ];
        assert_eq!(
            normalize_tag_names(&names).unwrap(),
            vec!["rust", "async", "Rust"]
        );
        assert!(normalize_tag_names(&["  ".to_string()]).is_err());
    }

    #[test]
    fn kinds_round_trip_through_strings() {
        for kind in IndexedKind::ALL {
            assert_eq!(kind.as_str().parse::<IndexedKind>().unwrap(), kind);
        }
        assert_eq!(
            serde_json::to_string(&IndexedKind::ErrorRecord).unwrap(),
            "\"error\""
        );
    }

    #[test]
    fn timestamps_sort_chronologically_as_text() {
        let a = now_timestamp();
        let b = now_timestamp();
        assert_eq!(a.len(), b.len());
        assert!(a <= b);
    }
}
