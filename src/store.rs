//! Collaborator contracts the import pipeline depends on, and the `SQLite`
//! store that backs them inside a workspace.
//!
//! The pipeline only ever sees the traits; [`SqliteStore`] additionally
//! carries the small catalog surface the IPC layer needs to seed courses,
//! year levels and users.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ImportSettings, IMPORT_SECTION_KEY};
use crate::db;
use crate::model::{
    Course, EmploymentType, ImportResult, StudentCandidate, TeacherCandidate, User, YearLevel,
};

const CURRENT_USER_KEY: &str = "session.currentUserId";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub trait CourseStore: Send + Sync {
    fn list_all(&self) -> Result<Vec<Course>>;

    /// Exact (case-sensitive) code lookup.
    fn find_by_code(&self, code: &str) -> Result<Option<Course>>;
}

pub trait YearLevelStore: Send + Sync {
    fn list_by_course(&self, course_id: &str) -> Result<Vec<YearLevel>>;
}

pub trait CurrentUserProvider: Send + Sync {
    fn current_user(&self) -> Result<Option<User>>;
}

/// Batch persistence with per-record accounting.
///
/// Records are written in chunks of at most `batch_size`. A record that
/// cannot be written (duplicate external id, constraint failure) counts as a
/// failure; it never fails the whole call.
pub trait BulkWriteStore: Send + Sync {
    fn write_students(&self, students: &[StudentCandidate], batch_size: usize)
        -> Result<ImportResult>;

    fn write_teachers(&self, teachers: &[TeacherCandidate], batch_size: usize)
        -> Result<ImportResult>;
}

/// A persisted pre-registration record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub record: T,
    pub is_registered: bool,
    pub created_at: String,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open_db(workspace)?),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self {
            conn: Mutex::new(db::open_in_memory()?),
        })
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    pub fn settings_section(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.lock_conn()?;
        Ok(db::settings_get_json(&conn, key)?)
    }

    pub fn save_settings_section(&self, key: &str, value: &Value) -> Result<()> {
        let conn = self.lock_conn()?;
        db::settings_set_json(&conn, key, value)?;
        Ok(())
    }

    pub fn import_settings(&self) -> Result<ImportSettings> {
        let stored = self.settings_section(IMPORT_SECTION_KEY)?;
        Ok(ImportSettings::from_section(stored.as_ref()))
    }

    pub fn create_course(&self, code: &str, name: &str, description: &str) -> Result<Course> {
        let conn = self.lock_conn()?;
        let course = Course {
            id: Uuid::new_v4().to_string(),
            code: code.trim().to_string(),
            name: name.trim().to_string(),
            description: description.trim().to_string(),
        };
        conn.execute(
            "INSERT INTO courses(id, code, name, description, created_at) VALUES(?, ?, ?, ?, ?)",
            (&course.id, &course.code, &course.name, &course.description, now_iso()),
        )?;
        Ok(course)
    }

    /// `Ok(None)` when the course does not exist.
    pub fn create_year_level(
        &self,
        course_id: &str,
        name: &str,
        level: i64,
    ) -> Result<Option<YearLevel>> {
        let conn = self.lock_conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM courses WHERE id = ?)",
            [course_id],
            |r| r.get(0),
        )?;
        if !exists {
            return Ok(None);
        }
        let year_level = YearLevel {
            id: Uuid::new_v4().to_string(),
            course_id: course_id.to_string(),
            name: name.trim().to_string(),
            level,
        };
        conn.execute(
            "INSERT INTO year_levels(id, course_id, name, level, created_at) VALUES(?, ?, ?, ?, ?)",
            (
                &year_level.id,
                &year_level.course_id,
                &year_level.name,
                year_level.level,
                now_iso(),
            ),
        )?;
        Ok(Some(year_level))
    }

    pub fn create_user(
        &self,
        first_name: &str,
        last_name: &str,
        email: Option<&str>,
        role: &str,
    ) -> Result<User> {
        let conn = self.lock_conn()?;
        let user = User {
            id: Uuid::new_v4().to_string(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email: email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
            role: role.to_string(),
        };
        conn.execute(
            "INSERT INTO users(id, first_name, last_name, email, role, created_at) VALUES(?, ?, ?, ?, ?, ?)",
            (
                &user.id,
                &user.first_name,
                &user.last_name,
                &user.email,
                &user.role,
                now_iso(),
            ),
        )?;
        Ok(user)
    }

    /// Returns `false` when no such user exists.
    pub fn set_current_user(&self, user_id: &str) -> Result<bool> {
        let conn = self.lock_conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)",
            [user_id],
            |r| r.get(0),
        )?;
        if exists {
            db::settings_set_json(&conn, CURRENT_USER_KEY, &Value::String(user_id.to_string()))?;
        }
        Ok(exists)
    }

    pub fn list_students(&self) -> Result<Vec<Stored<StudentCandidate>>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, student_id, first_name, last_name, middle_name, email,
                    course_id, course_name, course_code, year_level_id, year_level_name,
                    section, enrollment_year, phone_number, date_of_birth, address,
                    created_by, created_by_name, is_registered, created_at
             FROM pre_registered_students
             ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok(Stored {
                    id: r.get(0)?,
                    record: StudentCandidate {
                        student_id: r.get(1)?,
                        first_name: r.get(2)?,
                        last_name: r.get(3)?,
                        middle_name: r.get(4)?,
                        email: r.get(5)?,
                        course_id: r.get(6)?,
                        course_name: r.get(7)?,
                        course_code: r.get(8)?,
                        year_level_id: r.get(9)?,
                        year_level_name: r.get(10)?,
                        section: r.get(11)?,
                        enrollment_year: r.get(12)?,
                        phone_number: r.get(13)?,
                        date_of_birth: r.get(14)?,
                        address: r.get(15)?,
                        created_by: r.get(16)?,
                        created_by_name: r.get(17)?,
                    },
                    is_registered: r.get::<_, i64>(18)? != 0,
                    created_at: r.get(19)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_teachers(&self) -> Result<Vec<Stored<TeacherCandidate>>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, teacher_id, first_name, last_name, middle_name, email,
                    department_course_id, department_course_name, department_course_code,
                    employment_type, position, specialization, phone_number, date_of_birth,
                    address, date_hired, employee_number, created_by, created_by_name,
                    is_registered, created_at
             FROM pre_registered_teachers
             ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |r| {
                let employment_key: String = r.get(9)?;
                Ok(Stored {
                    id: r.get(0)?,
                    record: TeacherCandidate {
                        teacher_id: r.get(1)?,
                        first_name: r.get(2)?,
                        last_name: r.get(3)?,
                        middle_name: r.get(4)?,
                        email: r.get(5)?,
                        department_course_id: r.get(6)?,
                        department_course_name: r.get(7)?,
                        department_course_code: r.get(8)?,
                        employment_type: EmploymentType::from_key(&employment_key)
                            .unwrap_or(EmploymentType::FullTime),
                        position: r.get(10)?,
                        specialization: r.get(11)?,
                        phone_number: r.get(12)?,
                        date_of_birth: r.get(13)?,
                        address: r.get(14)?,
                        date_hired: r.get(15)?,
                        employee_number: r.get(16)?,
                        created_by: r.get(17)?,
                        created_by_name: r.get(18)?,
                    },
                    is_registered: r.get::<_, i64>(19)? != 0,
                    created_at: r.get(20)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl CourseStore for SqliteStore {
    fn list_all(&self) -> Result<Vec<Course>> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, code, name, description FROM courses ORDER BY rowid")?;
        let courses = stmt
            .query_map([], |r| {
                Ok(Course {
                    id: r.get(0)?,
                    code: r.get(1)?,
                    name: r.get(2)?,
                    description: r.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(courses)
    }

    fn find_by_code(&self, code: &str) -> Result<Option<Course>> {
        let conn = self.lock_conn()?;
        let course = conn
            .query_row(
                "SELECT id, code, name, description FROM courses WHERE code = ? ORDER BY rowid LIMIT 1",
                [code],
                |r| {
                    Ok(Course {
                        id: r.get(0)?,
                        code: r.get(1)?,
                        name: r.get(2)?,
                        description: r.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(course)
    }
}

impl YearLevelStore for SqliteStore {
    fn list_by_course(&self, course_id: &str) -> Result<Vec<YearLevel>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, course_id, name, level FROM year_levels
             WHERE course_id = ?
             ORDER BY level, rowid",
        )?;
        let levels = stmt
            .query_map([course_id], |r| {
                Ok(YearLevel {
                    id: r.get(0)?,
                    course_id: r.get(1)?,
                    name: r.get(2)?,
                    level: r.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(levels)
    }
}

impl CurrentUserProvider for SqliteStore {
    fn current_user(&self) -> Result<Option<User>> {
        let conn = self.lock_conn()?;
        let Some(Value::String(user_id)) = db::settings_get_json(&conn, CURRENT_USER_KEY)? else {
            return Ok(None);
        };
        let user = conn
            .query_row(
                "SELECT id, first_name, last_name, email, role FROM users WHERE id = ?",
                [&user_id],
                |r| {
                    Ok(User {
                        id: r.get(0)?,
                        first_name: r.get(1)?,
                        last_name: r.get(2)?,
                        email: r.get(3)?,
                        role: r.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }
}

impl BulkWriteStore for SqliteStore {
    fn write_students(
        &self,
        students: &[StudentCandidate],
        batch_size: usize,
    ) -> Result<ImportResult> {
        let mut conn = self.lock_conn()?;
        let now = now_iso();
        let mut result = ImportResult::default();
        for chunk in students.chunks(batch_size.max(1)) {
            let tx = conn.transaction()?;
            for student in chunk {
                match insert_student(&tx, student, &now) {
                    Ok(true) => result.success_count += 1,
                    Ok(false) => {
                        result.failure_count += 1;
                        result
                            .errors
                            .push(format!("Duplicate student ID: {}", student.student_id));
                    }
                    Err(e) => {
                        result.failure_count += 1;
                        result
                            .errors
                            .push(format!("Error adding {}: {}", student.student_id, e));
                    }
                }
            }
            tx.commit()?;
            debug!(chunk = chunk.len(), "committed student batch");
        }
        info!(
            success = result.success_count,
            failed = result.failure_count,
            "bulk student write finished"
        );
        Ok(result)
    }

    fn write_teachers(
        &self,
        teachers: &[TeacherCandidate],
        batch_size: usize,
    ) -> Result<ImportResult> {
        let mut conn = self.lock_conn()?;
        let now = now_iso();
        let mut result = ImportResult::default();
        for chunk in teachers.chunks(batch_size.max(1)) {
            let tx = conn.transaction()?;
            for teacher in chunk {
                match insert_teacher(&tx, teacher, &now) {
                    Ok(true) => result.success_count += 1,
                    Ok(false) => {
                        result.failure_count += 1;
                        result
                            .errors
                            .push(format!("Duplicate teacher ID: {}", teacher.teacher_id));
                    }
                    Err(e) => {
                        result.failure_count += 1;
                        result
                            .errors
                            .push(format!("Error adding {}: {}", teacher.teacher_id, e));
                    }
                }
            }
            tx.commit()?;
            debug!(chunk = chunk.len(), "committed teacher batch");
        }
        info!(
            success = result.success_count,
            failed = result.failure_count,
            "bulk teacher write finished"
        );
        Ok(result)
    }
}

fn insert_student(tx: &Transaction<'_>, s: &StudentCandidate, now: &str) -> rusqlite::Result<bool> {
    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM pre_registered_students WHERE student_id = ?)",
        [&s.student_id],
        |r| r.get(0),
    )?;
    if exists {
        return Ok(false);
    }
    tx.execute(
        "INSERT INTO pre_registered_students(
            id, student_id, first_name, last_name, middle_name, email,
            course_id, course_name, course_code, year_level_id, year_level_name,
            section, enrollment_year, phone_number, date_of_birth, address,
            created_by, created_by_name, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            Uuid::new_v4().to_string(),
            s.student_id,
            s.first_name,
            s.last_name,
            s.middle_name,
            s.email,
            s.course_id,
            s.course_name,
            s.course_code,
            s.year_level_id,
            s.year_level_name,
            s.section,
            s.enrollment_year,
            s.phone_number,
            s.date_of_birth,
            s.address,
            s.created_by,
            s.created_by_name,
            now,
        ],
    )?;
    Ok(true)
}

fn insert_teacher(tx: &Transaction<'_>, t: &TeacherCandidate, now: &str) -> rusqlite::Result<bool> {
    let exists: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM pre_registered_teachers WHERE teacher_id = ?)",
        [&t.teacher_id],
        |r| r.get(0),
    )?;
    if exists {
        return Ok(false);
    }
    tx.execute(
        "INSERT INTO pre_registered_teachers(
            id, teacher_id, first_name, last_name, middle_name, email,
            department_course_id, department_course_name, department_course_code,
            employment_type, position, specialization, phone_number, date_of_birth,
            address, date_hired, employee_number, created_by, created_by_name, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            Uuid::new_v4().to_string(),
            t.teacher_id,
            t.first_name,
            t.last_name,
            t.middle_name,
            t.email,
            t.department_course_id,
            t.department_course_name,
            t.department_course_code,
            t.employment_type.key(),
            t.position,
            t.specialization,
            t.phone_number,
            t.date_of_birth,
            t.address,
            t.date_hired,
            t.employee_number,
            t.created_by,
            t.created_by_name,
            now,
        ],
    )?;
    Ok(true)
}

fn now_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
