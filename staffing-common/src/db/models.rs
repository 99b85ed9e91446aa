//! Database models
//!
//! Row types map one-to-one onto the tables created in [`super::init`].
//! The `*Detail` types are the joined read views returned by the API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Project pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Active,
    Potential,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "ACTIVE",
            ProjectStatus::Potential => "POTENTIAL",
            ProjectStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(ProjectStatus::Active),
            "POTENTIAL" => Ok(ProjectStatus::Potential),
            "COMPLETED" => Ok(ProjectStatus::Completed),
            other => Err(Error::InvalidInput(format!("Unknown project status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub role_name: String,
    pub default_allocation_percentage: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            role_name: row.try_get("role_name")?,
            default_allocation_percentage: row.try_get("default_allocation_percentage")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub name: String,
    pub title: Option<String>,
    pub role_id: String,
    pub hourly_cost: f64,
    pub hours_quota: f64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub executive_summary: Option<String>,
    /// JSON-encoded list, opaque to the server
    pub skills: Option<String>,
    pub education: Option<String>,
    pub experience: Option<String>,
    pub certifications: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            title: row.try_get("title")?,
            role_id: row.try_get("role_id")?,
            hourly_cost: row.try_get("hourly_cost")?,
            hours_quota: row.try_get("hours_quota")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            bio: row.try_get("bio")?,
            executive_summary: row.try_get("executive_summary")?,
            skills: row.try_get("skills")?,
            education: row.try_get("education")?,
            experience: row.try_get("experience")?,
            certifications: row.try_get("certifications")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub deal_size: f64,
    pub blended_rate: f64,
    /// Always `deal_size / blended_rate` after a write
    pub total_hours: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub period_months: Option<i64>,
    pub enduser_name: Option<String>,
    pub partner_name: Option<String>,
    pub tech_stack: Option<String>,
    pub google_drive_url: Option<String>,
    pub documents: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            status: status.parse()?,
            deal_size: row.try_get("deal_size")?,
            blended_rate: row.try_get("blended_rate")?,
            total_hours: row.try_get("total_hours")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            period_months: row.try_get("period_months")?,
            enduser_name: row.try_get("enduser_name")?,
            partner_name: row.try_get("partner_name")?,
            tech_stack: row.try_get("tech_stack")?,
            google_drive_url: row.try_get("google_drive_url")?,
            documents: row.try_get("documents")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub project_id: String,
    pub staff_id: String,
    pub role_id: String,
    pub allocated_hours: f64,
    pub logged_hours: f64,
    /// Allocated hours were set by hand rather than derived from the role share
    pub manual_allocation: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            staff_id: row.try_get("staff_id")?,
            role_id: row.try_get("role_id")?,
            allocated_hours: row.try_get("allocated_hours")?,
            logged_hours: row.try_get("logged_hours")?,
            manual_allocation: row.try_get("manual_allocation")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Assignment joined with the records it links
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentDetail {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub project: Project,
    pub staff: Staff,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub assignments: Vec<AssignmentDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffDetail {
    #[serde(flatten)]
    pub staff: Staff,
    pub role: Role,
    pub assignments: Vec<AssignmentDetail>,
    pub total_allocated_hours: f64,
    pub total_logged_hours: f64,
}

impl StaffDetail {
    pub fn new(staff: Staff, role: Role, assignments: Vec<AssignmentDetail>) -> Self {
        let total_allocated_hours = assignments.iter().map(|a| a.assignment.allocated_hours).sum();
        let total_logged_hours = assignments.iter().map(|a| a.assignment.logged_hours).sum();
        Self {
            staff,
            role,
            assignments,
            total_allocated_hours,
            total_logged_hours,
        }
    }
}

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
pub fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Resolve a nullable text patch: absent keeps `current`, null or blank clears
pub fn patch_text(current: Option<String>, patch: Option<Option<String>>) -> Option<String> {
    match patch {
        None => current,
        Some(value) => value.filter(|s| !s.trim().is_empty()),
    }
}

/// Resolve a nullable non-text patch: absent keeps `current`, null clears
pub fn patch_value<T>(current: Option<T>, patch: Option<Option<T>>) -> Option<T> {
    match patch {
        None => current,
        Some(value) => value,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewRole {
    pub role_name: String,
    pub default_allocation_percentage: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleUpdate {
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub default_allocation_percentage: Option<f64>,
}

/// Weekly hours quota when none is supplied
pub const DEFAULT_HOURS_QUOTA: f64 = 40.0;

fn default_hours_quota() -> f64 {
    DEFAULT_HOURS_QUOTA
}

/// New staff member; an empty `role_id` selects the default role
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStaff {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub role_id: String,
    pub hourly_cost: f64,
    #[serde(default = "default_hours_quota")]
    pub hours_quota: f64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub executive_summary: Option<String>,
    #[serde(default)]
    pub skills: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub certifications: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaffUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub title: Option<Option<String>>,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub hourly_cost: Option<f64>,
    #[serde(default)]
    pub hours_quota: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub executive_summary: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub skills: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub education: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub experience: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub certifications: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    pub deal_size: f64,
    pub blended_rate: f64,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub period_months: Option<i64>,
    #[serde(default)]
    pub enduser_name: Option<String>,
    #[serde(default)]
    pub partner_name: Option<String>,
    #[serde(default)]
    pub tech_stack: Option<String>,
    #[serde(default)]
    pub google_drive_url: Option<String>,
    #[serde(default)]
    pub documents: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub deal_size: Option<f64>,
    #[serde(default)]
    pub blended_rate: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub period_months: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub enduser_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub partner_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub tech_stack: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub google_drive_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub documents: Option<Option<String>>,
}

/// Upsert payload keyed on the (project, staff, role) triple
///
/// On update, absent hours keep their stored value; on insert they default to 0.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentUpsert {
    pub project_id: String,
    pub staff_id: String,
    pub role_id: String,
    #[serde(default)]
    pub allocated_hours: Option<f64>,
    #[serde(default)]
    pub logged_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentUpdate {
    #[serde(default)]
    pub allocated_hours: Option<f64>,
    #[serde(default)]
    pub logged_hours: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&ProjectStatus::Potential).unwrap(), "\"POTENTIAL\"");
        assert_eq!("completed".parse::<ProjectStatus>().unwrap(), ProjectStatus::Completed);
        assert!("cancelled".parse::<ProjectStatus>().is_err());
    }

    #[test]
    fn test_project_update_distinguishes_null_from_absent() {
        let update: ProjectUpdate =
            serde_json::from_str(r#"{"description": null, "deal_size": 1000}"#).unwrap();
        assert_eq!(update.description, Some(None));
        assert_eq!(update.partner_name, None);
        assert_eq!(update.deal_size, Some(1000.0));
    }

    #[test]
    fn test_patch_text() {
        let current = Some("old".to_string());
        assert_eq!(patch_text(current.clone(), None), current);
        assert_eq!(patch_text(current.clone(), Some(None)), None);
        assert_eq!(patch_text(current.clone(), Some(Some("  ".into()))), None);
        assert_eq!(patch_text(current, Some(Some("new".into()))), Some("new".to_string()));
    }
}
