//! Demo data for an empty database
//!
//! Roles are seeded with percentages that total 100 so that allocation
//! math on the demo projects adds up to each project's total hours.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::info;

use super::assignments::upsert_assignment;
use super::models::{AssignmentUpsert, NewProject, NewRole, NewStaff, ProjectStatus};
use super::projects::insert_project;
use super::roles::insert_role;
use super::staff::insert_staff;
use crate::{Error, Result};

const ROLES: &[(&str, f64)] = &[
    ("Project Manager", 10.0),
    ("Solution Architect", 20.0),
    ("Business Analyst", 25.0),
    ("Software Developer", 35.0),
    ("QA Engineer", 10.0),
];

struct StaffSeed {
    name: &'static str,
    title: &'static str,
    role: usize,
    hourly_cost: f64,
    hours_quota: f64,
    email: &'static str,
    skills: &'static str,
    certifications: &'static str,
}

const STAFF: &[StaffSeed] = &[
    StaffSeed {
        name: "Alice Johnson",
        title: "Senior Project Manager",
        role: 0,
        hourly_cost: 150.0,
        hours_quota: 40.0,
        email: "alice.johnson@company.com",
        skills: r#"["Project Management","Agile/Scrum","Risk Management","Budget Planning"]"#,
        certifications: r#"["PMP","Certified Scrum Master"]"#,
    },
    StaffSeed {
        name: "Bob Smith",
        title: "Lead Solution Architect",
        role: 1,
        hourly_cost: 175.0,
        hours_quota: 45.0,
        email: "bob.smith@company.com",
        skills: r#"["Cloud Architecture","AWS","Microservices","Kubernetes"]"#,
        certifications: r#"["AWS Solutions Architect Professional","TOGAF"]"#,
    },
    StaffSeed {
        name: "Carol Williams",
        title: "Senior Business Analyst",
        role: 2,
        hourly_cost: 125.0,
        hours_quota: 40.0,
        email: "carol.williams@company.com",
        skills: r#"["Requirements Analysis","Process Modeling","SQL"]"#,
        certifications: r#"["CBAP"]"#,
    },
    StaffSeed {
        name: "Dave Brown",
        title: "Senior Full Stack Developer",
        role: 3,
        hourly_cost: 140.0,
        hours_quota: 40.0,
        email: "dave.brown@company.com",
        skills: r#"["React","TypeScript","PostgreSQL","Docker"]"#,
        certifications: r#"["AWS Developer Associate"]"#,
    },
    StaffSeed {
        name: "Eve Davis",
        title: "Software Developer",
        role: 3,
        hourly_cost: 120.0,
        hours_quota: 40.0,
        email: "eve.davis@company.com",
        skills: r#"["Python","Java","REST APIs","Redis"]"#,
        certifications: r#"["Oracle Java SE 11 Developer"]"#,
    },
    StaffSeed {
        name: "Frank Miller",
        title: "QA Lead",
        role: 4,
        hourly_cost: 110.0,
        hours_quota: 40.0,
        email: "frank.miller@company.com",
        skills: r#"["Selenium","Cypress","Performance Testing"]"#,
        certifications: r#"["ISTQB Advanced Level"]"#,
    },
];

struct ProjectSeed {
    name: &'static str,
    description: &'static str,
    deal_size: f64,
    blended_rate: f64,
    dates: (&'static str, &'static str),
    period_months: i64,
    enduser_name: &'static str,
    partner_name: Option<&'static str>,
    tech_stack: &'static str,
}

const PROJECTS: &[ProjectSeed] = &[
    ProjectSeed {
        name: "Corporate Website Redesign",
        description: "Redesign of the corporate website with a modern UI and mobile support.",
        deal_size: 75_000.0,
        blended_rate: 125.0,
        dates: ("2024-01-15", "2024-06-30"),
        period_months: 6,
        enduser_name: "Acme Corporation",
        partner_name: Some("Digital Partners Inc"),
        tech_stack: r#"["React","Next.js","PostgreSQL","AWS"]"#,
    },
    ProjectSeed {
        name: "CRM System Implementation",
        description: "Custom CRM replacing legacy sales tools.",
        deal_size: 150_000.0,
        blended_rate: 140.0,
        dates: ("2024-02-01", "2024-09-30"),
        period_months: 8,
        enduser_name: "Global Sales Inc",
        partner_name: Some("Enterprise Solutions"),
        tech_stack: r#"["Node.js","React","MongoDB","Redis"]"#,
    },
    ProjectSeed {
        name: "Mobile App Development",
        description: "iOS and Android apps for a customer loyalty program.",
        deal_size: 100_000.0,
        blended_rate: 130.0,
        dates: ("2024-03-01", "2024-08-31"),
        period_months: 6,
        enduser_name: "Retail Chain Co",
        partner_name: None,
        tech_stack: r#"["React Native","TypeScript","Firebase"]"#,
    },
];

/// (project, staff, allocated, logged); role is the staff member's own role
const ASSIGNMENTS: &[(usize, usize, f64, f64)] = &[
    (0, 0, 60.0, 35.0),
    (0, 1, 80.0, 50.0),
    (0, 3, 300.0, 180.0),
    (0, 5, 100.0, 45.0),
    (1, 0, 100.0, 40.0),
    (1, 2, 200.0, 85.0),
    (1, 4, 400.0, 150.0),
    (1, 1, 120.0, 60.0),
    (2, 2, 100.0, 30.0),
    (2, 3, 350.0, 100.0),
    (2, 5, 150.0, 35.0),
];

/// Populate demo roles, staff, projects and assignments
///
/// Does nothing if any role already exists. Returns whether data was written.
pub async fn seed_demo_data(pool: &SqlitePool) -> Result<bool> {
    let role_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
        .fetch_one(pool)
        .await?;
    if role_count > 0 {
        info!("Database already has roles, skipping demo seed");
        return Ok(false);
    }

    let mut role_ids = Vec::with_capacity(ROLES.len());
    for (role_name, percentage) in ROLES {
        let role = insert_role(
            pool,
            &NewRole {
                role_name: role_name.to_string(),
                default_allocation_percentage: *percentage,
            },
        )
        .await?;
        role_ids.push(role.id);
    }

    let mut staff = Vec::with_capacity(STAFF.len());
    for seed in STAFF {
        let member = insert_staff(
            pool,
            &NewStaff {
                name: seed.name.to_string(),
                title: Some(seed.title.to_string()),
                role_id: role_ids[seed.role].clone(),
                hourly_cost: seed.hourly_cost,
                hours_quota: seed.hours_quota,
                email: Some(seed.email.to_string()),
                skills: Some(seed.skills.to_string()),
                certifications: Some(seed.certifications.to_string()),
                ..Default::default()
            },
        )
        .await?;
        staff.push(member);
    }

    let mut project_ids = Vec::with_capacity(PROJECTS.len());
    for seed in PROJECTS {
        let project = insert_project(
            pool,
            &NewProject {
                name: seed.name.to_string(),
                description: Some(seed.description.to_string()),
                status: ProjectStatus::Active,
                deal_size: seed.deal_size,
                blended_rate: seed.blended_rate,
                start_date: Some(seed_date(seed.dates.0)?),
                end_date: Some(seed_date(seed.dates.1)?),
                period_months: Some(seed.period_months),
                enduser_name: Some(seed.enduser_name.to_string()),
                partner_name: seed.partner_name.map(str::to_string),
                tech_stack: Some(seed.tech_stack.to_string()),
                ..Default::default()
            },
        )
        .await?;
        project_ids.push(project.id);
    }

    for (project, member, allocated, logged) in ASSIGNMENTS {
        let member = &staff[*member];
        upsert_assignment(
            pool,
            &AssignmentUpsert {
                project_id: project_ids[*project].clone(),
                staff_id: member.id.clone(),
                role_id: member.role_id.clone(),
                allocated_hours: Some(*allocated),
                logged_hours: Some(*logged),
            },
        )
        .await?;
    }

    info!(
        roles = ROLES.len(),
        staff = STAFF.len(),
        projects = PROJECTS.len(),
        assignments = ASSIGNMENTS.len(),
        "Seeded demo data"
    );
    Ok(true)
}

fn seed_date(value: &str) -> Result<NaiveDate> {
    value
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid seed date {:?}: {}", value, e)))
}
