//! Header alias tables. Each logical field accepts a handful of spellings;
//! the first alias present in the header row wins.

use crate::model::ImportKind;

const STUDENT_ID: &[&str] = &["student id", "studentid", "id", "student_id"];
const TEACHER_ID: &[&str] = &[
    "teacher id",
    "teacherid",
    "id",
    "employee id",
    "employeeid",
    "teacher_id",
];
const FIRST_NAME: &[&str] = &["first name", "firstname", "first", "given name", "givenname"];
const LAST_NAME: &[&str] = &[
    "last name",
    "lastname",
    "last",
    "surname",
    "family name",
    "familyname",
];
const MIDDLE_NAME: &[&str] = &[
    "middle name",
    "middlename",
    "middle",
    "middle initial",
    "middleinitial",
    "mi",
];
const EMAIL: &[&str] = &["email", "e-mail", "email address", "emailaddress"];
const COURSE: &[&str] = &["course code", "coursecode", "course", "course name", "coursename"];
const YEAR_LEVEL: &[&str] = &[
    "year level",
    "yearlevel",
    "year",
    "level",
    "grade level",
    "gradelevel",
];
const SECTION: &[&str] = &["section", "class", "section name", "sectionname"];
const ENROLLMENT_YEAR: &[&str] = &[
    "enrollment year",
    "enrollmentyear",
    "academic year",
    "academicyear",
    "school year",
    "schoolyear",
];
const PHONE: &[&str] = &[
    "phone number",
    "phonenumber",
    "phone",
    "mobile",
    "contact number",
    "contactnumber",
];
const DATE_OF_BIRTH: &[&str] = &["date of birth", "dateofbirth", "dob", "birthdate", "birth date"];
const ADDRESS: &[&str] = &["address", "home address", "homeaddress", "residence"];
const DEPARTMENT: &[&str] = &["department", "department code", "departmentcode", "course", "dept"];
const EMPLOYMENT_TYPE: &[&str] = &["employment type", "employmenttype", "type", "employment"];
const POSITION: &[&str] = &["position", "rank", "title", "designation"];
const SPECIALIZATION: &[&str] = &["specialization", "specialty", "field", "expertise"];
const DATE_HIRED: &[&str] = &["date hired", "datehired", "hire date", "hiredate", "employed date"];
const EMPLOYEE_NUMBER: &[&str] = &[
    "employee number",
    "employeenumber",
    "emp number",
    "empnumber",
    "employee no",
];

/// Header row lacked one or more identity columns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Missing required columns: {}", .missing.join(", "))]
pub struct MissingColumns {
    pub missing: Vec<&'static str>,
}

/// Resolved header names, one per logical field. `None` means the file does
/// not carry that column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub email: Option<String>,
    /// Course code for students, department for teachers.
    pub course: Option<String>,
    pub year_level: Option<String>,
    pub section: Option<String>,
    pub enrollment_year: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub address: Option<String>,
    pub employment_type: Option<String>,
    pub position: Option<String>,
    pub specialization: Option<String>,
    pub date_hired: Option<String>,
    pub employee_number: Option<String>,
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|alias| {
        headers
            .iter()
            .find(|h| h.eq_ignore_ascii_case(alias))
            .cloned()
    })
}

impl ColumnMap {
    pub fn resolve(kind: ImportKind, headers: &[String]) -> Result<Self, MissingColumns> {
        let id_aliases = match kind {
            ImportKind::Students => STUDENT_ID,
            ImportKind::Teachers => TEACHER_ID,
        };
        let id = find_column(headers, id_aliases);
        let first_name = find_column(headers, FIRST_NAME);
        let last_name = find_column(headers, LAST_NAME);

        let (Some(id), Some(first_name), Some(last_name)) =
            (id.clone(), first_name.clone(), last_name.clone())
        else {
            let mut missing = Vec::new();
            if id.is_none() {
                missing.push(kind.id_label());
            }
            if first_name.is_none() {
                missing.push("First Name");
            }
            if last_name.is_none() {
                missing.push("Last Name");
            }
            return Err(MissingColumns { missing });
        };

        let find = |aliases| find_column(headers, aliases);
        let mut map = Self {
            id,
            first_name,
            last_name,
            middle_name: find(MIDDLE_NAME),
            email: find(EMAIL),
            phone: find(PHONE),
            date_of_birth: find(DATE_OF_BIRTH),
            address: find(ADDRESS),
            ..Self::default()
        };
        match kind {
            ImportKind::Students => {
                map.course = find(COURSE);
                map.year_level = find(YEAR_LEVEL);
                map.section = find(SECTION);
                map.enrollment_year = find(ENROLLMENT_YEAR);
            }
            ImportKind::Teachers => {
                map.course = find(DEPARTMENT);
                map.employment_type = find(EMPLOYMENT_TYPE);
                map.position = find(POSITION);
                map.specialization = find(SPECIALIZATION);
                map.date_hired = find(DATE_HIRED);
                map.employee_number = find(EMPLOYEE_NUMBER);
            }
        }
        Ok(map)
    }
}
