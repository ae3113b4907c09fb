//! Row normalization: decoded rows in, resolved import candidates out.
//!
//! One [`ParseContext`] lives for exactly one parse pass. It snapshots the
//! course list and the acting user up front and memoizes year-level lookups
//! per course, so every row after the first one for a course is served from
//! memory.

mod columns;

use std::collections::HashMap;
use std::io::Read;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::ImportSettings;
use crate::decode::{self, DecodeError, Decoded, RawRow};
use crate::model::{
    Course, EmploymentType, ImportCandidate, ImportKind, RowIssue, StudentCandidate,
    TeacherCandidate, YearLevel,
};
use crate::store::{CourseStore, CurrentUserProvider, YearLevelStore};

use columns::ColumnMap;
pub use columns::MissingColumns;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9+._%\-]{1,256}@[a-zA-Z0-9][a-zA-Z0-9\-]{0,64}(\.[a-zA-Z0-9][a-zA-Z0-9\-]{0,25})+$",
    )
    .expect("valid email regex")
});

/// Free-text employment classifications, matched after lowercasing.
const EMPLOYMENT_SYNONYMS: &[(&str, EmploymentType)] = &[
    ("full-time", EmploymentType::FullTime),
    ("fulltime", EmploymentType::FullTime),
    ("full time", EmploymentType::FullTime),
    ("full_time", EmploymentType::FullTime),
    ("permanent", EmploymentType::FullTime),
    ("part-time", EmploymentType::PartTime),
    ("parttime", EmploymentType::PartTime),
    ("part time", EmploymentType::PartTime),
    ("part_time", EmploymentType::PartTime),
    ("contract", EmploymentType::Contract),
    ("temporary", EmploymentType::Temporary),
    ("temp", EmploymentType::Temporary),
    ("adjunct", EmploymentType::Adjunct),
    ("visiting", EmploymentType::Visiting),
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Failures that abort a whole parse.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    MissingColumns(#[from] MissingColumns),
}

/// Why a single row was left out of the candidate list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("Row {line}: Missing {id_label}")]
    MissingId { line: usize, id_label: &'static str },

    #[error("Row {line}: Missing {field} for {id_label}: {id}")]
    MissingName {
        line: usize,
        field: &'static str,
        id_label: &'static str,
        id: String,
    },

    #[error("Email is required for {noun} {id} ({first_name} {last_name})")]
    MissingEmail {
        noun: &'static str,
        id: String,
        first_name: String,
        last_name: String,
    },

    #[error("Invalid email format for {noun} {id}: {email}")]
    InvalidEmail {
        noun: &'static str,
        id: String,
        email: String,
    },
}

impl RowError {
    /// Identity-extraction failures, as opposed to validation failures on a
    /// row whose identity was readable.
    pub fn is_extraction(&self) -> bool {
        matches!(self, Self::MissingId { .. } | Self::MissingName { .. })
    }
}

/// The read-only collaborators one parse pass consults.
#[derive(Clone, Copy)]
pub struct ReferenceSources<'a> {
    pub courses: &'a dyn CourseStore,
    pub year_levels: &'a dyn YearLevelStore,
    pub users: &'a dyn CurrentUserProvider,
}

/// Course id to year levels, filled on first use. A failed fetch is cached as
/// an empty list so it is not retried for every row of that course.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    year_levels: HashMap<String, Vec<YearLevel>>,
}

impl ReferenceCache {
    pub fn year_levels(&mut self, store: &dyn YearLevelStore, course_id: &str) -> &[YearLevel] {
        self.year_levels
            .entry(course_id.to_string())
            .or_insert_with(|| match store.list_by_course(course_id) {
                Ok(levels) => levels,
                Err(e) => {
                    warn!(course_id, error = %e, "year level lookup failed");
                    Vec::new()
                }
            })
    }

    pub fn cached_courses(&self) -> usize {
        self.year_levels.len()
    }
}

#[derive(Debug, Clone, Default)]
struct Actor {
    id: String,
    name: String,
}

pub struct ParseContext<'a> {
    kind: ImportKind,
    columns: ColumnMap,
    sources: ReferenceSources<'a>,
    settings: &'a ImportSettings,
    courses: Vec<Course>,
    actor: Actor,
    cache: ReferenceCache,
}

impl<'a> ParseContext<'a> {
    /// Resolve columns and take the per-parse snapshots (course list, actor).
    pub fn new(
        kind: ImportKind,
        headers: &[String],
        sources: ReferenceSources<'a>,
        settings: &'a ImportSettings,
    ) -> Result<Self, MissingColumns> {
        let columns = ColumnMap::resolve(kind, headers)?;
        debug!(?columns, "resolved import columns");

        let courses = sources.courses.list_all().unwrap_or_else(|e| {
            warn!(error = %e, "course list unavailable, name matching disabled");
            Vec::new()
        });
        let actor = match sources.users.current_user() {
            Ok(Some(user)) => Actor {
                name: user.display_name(),
                id: user.id,
            },
            Ok(None) => Actor::default(),
            Err(e) => {
                warn!(error = %e, "current user lookup failed");
                Actor::default()
            }
        };

        Ok(Self {
            kind,
            columns,
            sources,
            settings,
            courses,
            actor,
            cache: ReferenceCache::default(),
        })
    }

    /// Normalize one row. `Ok(None)` is a blank row, skipped without a
    /// diagnostic.
    pub fn normalize(&mut self, row: &RawRow) -> Result<Option<ImportCandidate>, RowError> {
        let Some(identity) = self.extract_identity(row)? else {
            return Ok(None);
        };
        let candidate = match self.kind {
            ImportKind::Students => ImportCandidate::Student(self.student(row, identity)?),
            ImportKind::Teachers => ImportCandidate::Teacher(self.teacher(row, identity)?),
        };
        Ok(Some(candidate))
    }

    pub fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    fn cell(&self, row: &RawRow, column: &Option<String>) -> Option<String> {
        column
            .as_deref()
            .and_then(|c| row.non_blank(c))
            .map(str::to_string)
    }

    fn extract_identity(&self, row: &RawRow) -> Result<Option<Identity>, RowError> {
        let id = row.non_blank(&self.columns.id).unwrap_or_default();
        let first_name = row.non_blank(&self.columns.first_name).unwrap_or_default();
        let last_name = row.non_blank(&self.columns.last_name).unwrap_or_default();
        if id.is_empty() && first_name.is_empty() && last_name.is_empty() {
            return Ok(None);
        }

        let id_label = self.kind.id_label();
        let line = row.line();
        if id.is_empty() {
            return Err(RowError::MissingId { line, id_label });
        }
        let missing_name = |field| RowError::MissingName {
            line,
            field,
            id_label,
            id: id.to_string(),
        };
        if first_name.is_empty() {
            return Err(missing_name("First Name"));
        }
        if last_name.is_empty() {
            return Err(missing_name("Last Name"));
        }

        Ok(Some(Identity {
            id: id.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            middle_name: self.cell(row, &self.columns.middle_name),
        }))
    }

    /// Exact code lookup first, then a case-insensitive name-or-code match
    /// against the snapshot.
    fn resolve_course(&self, raw: &str) -> Option<Course> {
        match self.sources.courses.find_by_code(raw) {
            Ok(Some(course)) => return Some(course),
            Ok(None) => {}
            Err(e) => warn!(code = raw, error = %e, "course code lookup failed"),
        }
        self.courses
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(raw) || c.code.eq_ignore_ascii_case(raw))
            .cloned()
    }

    fn resolve_year_level(&mut self, course_id: &str, raw: &str) -> Option<YearLevel> {
        let levels = self.cache.year_levels(self.sources.year_levels, course_id);
        if let Ok(n) = raw.parse::<i64>() {
            return levels.iter().find(|l| l.level == n).cloned();
        }
        let needle = raw.to_lowercase();
        levels
            .iter()
            .find(|l| {
                let name = l.name.to_lowercase();
                name == needle || name.contains(&needle)
            })
            .cloned()
    }

    fn check_email(
        &self,
        identity: &Identity,
        email: Option<String>,
        required: bool,
    ) -> Result<Option<String>, RowError> {
        let noun = self.kind.noun();
        match email {
            None if required => Err(RowError::MissingEmail {
                noun,
                id: identity.id.clone(),
                first_name: identity.first_name.clone(),
                last_name: identity.last_name.clone(),
            }),
            None => Ok(None),
            Some(email) if !is_valid_email(&email) => Err(RowError::InvalidEmail {
                noun,
                id: identity.id.clone(),
                email,
            }),
            Some(email) => Ok(Some(email)),
        }
    }

    fn student(&mut self, row: &RawRow, identity: Identity) -> Result<StudentCandidate, RowError> {
        let raw_course = self.cell(row, &self.columns.course);
        let raw_level = self.cell(row, &self.columns.year_level);

        let course = raw_course.as_deref().and_then(|c| self.resolve_course(c));
        let year_level = match (&course, raw_level.as_deref()) {
            (Some(course), Some(level)) => self.resolve_year_level(&course.id, level),
            _ => None,
        };

        let email = self.cell(row, &self.columns.email);
        let email = self.check_email(&identity, email, true)?.unwrap_or_default();

        Ok(StudentCandidate {
            email,
            course_id: course.as_ref().map(|c| c.id.clone()).unwrap_or_default(),
            course_name: course.as_ref().map(|c| c.name.clone()).unwrap_or_default(),
            course_code: course
                .as_ref()
                .map(|c| c.code.clone())
                .or(raw_course)
                .unwrap_or_default(),
            year_level_id: year_level.as_ref().map(|l| l.id.clone()).unwrap_or_default(),
            year_level_name: year_level
                .map(|l| l.name)
                .or(raw_level)
                .unwrap_or_default(),
            section: self.cell(row, &self.columns.section),
            enrollment_year: self
                .cell(row, &self.columns.enrollment_year)
                .unwrap_or_else(|| self.settings.default_enrollment_year.clone()),
            phone_number: self.cell(row, &self.columns.phone),
            date_of_birth: self.cell(row, &self.columns.date_of_birth).map(normalize_date),
            address: self.cell(row, &self.columns.address),
            created_by: self.actor.id.clone(),
            created_by_name: self.actor.name.clone(),
            student_id: identity.id,
            first_name: identity.first_name,
            last_name: identity.last_name,
            middle_name: identity.middle_name,
        })
    }

    fn teacher(&mut self, row: &RawRow, identity: Identity) -> Result<TeacherCandidate, RowError> {
        let raw_department = self.cell(row, &self.columns.course);
        let department = raw_department.as_deref().and_then(|c| self.resolve_course(c));

        let email = self.cell(row, &self.columns.email);
        let email = self.check_email(&identity, email, self.settings.require_teacher_email)?;

        let employment_type = employment_type(
            self.cell(row, &self.columns.employment_type).as_deref(),
            self.settings.default_employment_type,
        );

        Ok(TeacherCandidate {
            email,
            department_course_id: department.as_ref().map(|c| c.id.clone()).unwrap_or_default(),
            department_course_name: department
                .as_ref()
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            department_course_code: department
                .map(|c| c.code)
                .or(raw_department)
                .unwrap_or_default(),
            employment_type,
            position: self.cell(row, &self.columns.position),
            specialization: self.cell(row, &self.columns.specialization),
            phone_number: self.cell(row, &self.columns.phone),
            date_of_birth: self.cell(row, &self.columns.date_of_birth).map(normalize_date),
            address: self.cell(row, &self.columns.address),
            date_hired: self.cell(row, &self.columns.date_hired).map(normalize_date),
            employee_number: self.cell(row, &self.columns.employee_number),
            created_by: self.actor.id.clone(),
            created_by_name: self.actor.name.clone(),
            teacher_id: identity.id,
            first_name: identity.first_name,
            last_name: identity.last_name,
            middle_name: identity.middle_name,
        })
    }
}

struct Identity {
    id: String,
    first_name: String,
    last_name: String,
    middle_name: Option<String>,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Map free text through the synonym table; anything unrecognized (or
/// absent) becomes `default`.
pub fn employment_type(raw: Option<&str>, default: EmploymentType) -> EmploymentType {
    let Some(raw) = raw else {
        return default;
    };
    let lower = raw.trim().to_lowercase();
    EMPLOYMENT_SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == lower)
        .map(|(_, t)| *t)
        .unwrap_or(default)
}

/// Dates that parse in a known layout are rewritten as `YYYY-MM-DD`; anything
/// else is kept as written.
pub fn normalize_date(raw: String) -> String {
    // `%Y` also takes one and two digit years; only four-digit years count.
    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(&raw, fmt).ok())
        .find(|d| d.year() >= 1000)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or(raw)
}

/// Result of normalizing one decoded file.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOutcome {
    pub candidates: Vec<ImportCandidate>,
    /// Decode failures and rejected rows, in source order.
    pub skipped: Vec<RowIssue>,
    /// Data rows seen, including blank and rejected ones.
    pub rows_total: usize,
    extracted: usize,
    extraction_failures: Vec<String>,
}

impl NormalizeOutcome {
    /// The whole-file error raised when no row got past identity extraction
    /// but some were rejected there. Lists at most `max_errors` messages.
    pub fn extraction_error(&self, kind: ImportKind, max_errors: usize) -> Option<String> {
        if self.extracted > 0 || self.extraction_failures.is_empty() {
            return None;
        }
        let listed = self
            .extraction_failures
            .iter()
            .take(max_errors)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        Some(format!(
            "Failed to parse any {}. Errors:\n{}",
            kind.plural(),
            listed
        ))
    }
}

pub fn normalize_all(
    decoded: &Decoded,
    kind: ImportKind,
    sources: ReferenceSources<'_>,
    settings: &ImportSettings,
) -> Result<NormalizeOutcome, MissingColumns> {
    let mut ctx = ParseContext::new(kind, &decoded.headers, sources, settings)?;
    let mut outcome = NormalizeOutcome {
        rows_total: decoded.rows.len() + decoded.failures.len(),
        ..NormalizeOutcome::default()
    };

    let mut skipped = decoded
        .failures
        .iter()
        .map(|f| RowIssue {
            line: f.line,
            message: f.message.clone(),
        })
        .collect::<Vec<_>>();
    outcome
        .extraction_failures
        .extend(skipped.iter().map(|s| s.message.clone()));

    for row in &decoded.rows {
        match ctx.normalize(row) {
            Ok(Some(candidate)) => {
                outcome.extracted += 1;
                outcome.candidates.push(candidate);
            }
            Ok(None) => {}
            Err(e) => {
                debug!(line = row.line(), error = %e, "row skipped");
                if e.is_extraction() {
                    outcome.extraction_failures.push(e.to_string());
                } else {
                    outcome.extracted += 1;
                }
                skipped.push(RowIssue {
                    line: row.line(),
                    message: e.to_string(),
                });
            }
        }
    }
    skipped.sort_by_key(|s| s.line);
    outcome.skipped = skipped;

    info!(
        kind = kind.plural(),
        rows = outcome.rows_total,
        candidates = outcome.candidates.len(),
        skipped = outcome.skipped.len(),
        year_level_courses = ctx.cache().cached_courses(),
        "normalized roster file"
    );
    Ok(outcome)
}

/// Decode and normalize in one pass. The reader is released before any
/// reference lookup happens.
pub fn parse_file<R: Read>(
    reader: R,
    file_name: &str,
    kind: ImportKind,
    sources: ReferenceSources<'_>,
    settings: &ImportSettings,
) -> Result<NormalizeOutcome, ParseError> {
    let decoded = decode::decode(reader, file_name)?;
    Ok(normalize_all(&decoded, kind, sources, settings)?)
}
