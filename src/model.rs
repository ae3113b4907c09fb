use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearLevel {
    pub id: String,
    pub course_id: String,
    pub name: String,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub role: String,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Adjunct,
    Visiting,
}

impl EmploymentType {
    pub const ALL: [EmploymentType; 6] = [
        Self::FullTime,
        Self::PartTime,
        Self::Contract,
        Self::Temporary,
        Self::Adjunct,
        Self::Visiting,
    ];

    /// Stable key used in settings and in the database.
    pub fn key(self) -> &'static str {
        match self {
            Self::FullTime => "full_time",
            Self::PartTime => "part_time",
            Self::Contract => "contract",
            Self::Temporary => "temporary",
            Self::Adjunct => "adjunct",
            Self::Visiting => "visiting",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Students,
    Teachers,
}

impl ImportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "students" => Some(Self::Students),
            "teachers" => Some(Self::Teachers),
            _ => None,
        }
    }

    /// Singular noun used in user-facing messages.
    pub fn noun(self) -> &'static str {
        match self {
            Self::Students => "student",
            Self::Teachers => "teacher",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Teachers => "teachers",
        }
    }

    pub fn id_label(self) -> &'static str {
        match self {
            Self::Students => "Student ID",
            Self::Teachers => "Teacher ID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentCandidate {
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub email: String,
    pub course_id: String,
    pub course_name: String,
    pub course_code: String,
    pub year_level_id: String,
    pub year_level_name: String,
    pub section: Option<String>,
    pub enrollment_year: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub created_by: String,
    pub created_by_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherCandidate {
    pub teacher_id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub email: Option<String>,
    pub department_course_id: String,
    pub department_course_name: String,
    pub department_course_code: String,
    pub employment_type: EmploymentType,
    pub position: Option<String>,
    pub specialization: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub date_hired: Option<String>,
    pub employee_number: Option<String>,
    pub created_by: String,
    pub created_by_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImportCandidate {
    Student(StudentCandidate),
    Teacher(TeacherCandidate),
}

impl ImportCandidate {
    pub fn kind(&self) -> ImportKind {
        match self {
            Self::Student(_) => ImportKind::Students,
            Self::Teacher(_) => ImportKind::Teachers,
        }
    }

    pub fn as_student(&self) -> Option<&StudentCandidate> {
        match self {
            Self::Student(s) => Some(s),
            Self::Teacher(_) => None,
        }
    }

    pub fn as_teacher(&self) -> Option<&TeacherCandidate> {
        match self {
            Self::Teacher(t) => Some(t),
            Self::Student(_) => None,
        }
    }
}

/// Outcome of one bulk write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<String>,
}

impl ImportResult {
    pub fn total_processed(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn has_errors(&self) -> bool {
        self.failure_count > 0
    }
}

/// Diagnostic for a row that did not make it into the candidate list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowIssue {
    pub line: usize,
    pub message: String,
}
