//! Data export
//!
//! Snapshots the full tracker state into portable JSON or CSV text. The
//! caller decides where the bytes go; nothing here touches the filesystem,
//! so exports stay usable from any frontend.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use waypoint_domain::{Application, Milestone, Result, WaypointError};

use crate::tracker::ports::{ApplicationRepository, MilestoneRepository};

const CSV_HEADER: &str =
    "Company Name,Role Title,Job Link,Location,Applied Date,Status,Is Archived,Notes";

/// Full export payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub exported_at: i64,
    pub applications: Vec<ExportApplication>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportApplication {
    pub company_name: String,
    pub role_title: String,
    pub job_link: Option<String>,
    pub location: Option<String>,
    pub applied_date: i64,
    pub notes: Option<String>,
    pub status: String,
    pub is_archived: bool,
    pub milestones: Vec<ExportMilestone>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMilestone {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<i64>,
    pub is_completed: bool,
}

impl ExportApplication {
    fn from_entities(application: Application, milestones: Vec<Milestone>) -> Self {
        Self {
            company_name: application.company_name,
            role_title: application.role_title,
            job_link: application.job_link,
            location: application.location,
            applied_date: application.applied_date,
            notes: application.notes,
            status: application.status.as_str().to_string(),
            is_archived: application.is_archived,
            milestones: milestones
                .into_iter()
                .map(|m| ExportMilestone {
                    title: m.title,
                    description: m.description,
                    due_date: m.due_date,
                    is_completed: m.is_completed,
                })
                .collect(),
        }
    }
}

/// Builds JSON and CSV snapshots of every stored application
pub struct ExportService {
    applications: Arc<dyn ApplicationRepository>,
    milestones: Arc<dyn MilestoneRepository>,
}

impl ExportService {
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        milestones: Arc<dyn MilestoneRepository>,
    ) -> Self {
        Self { applications, milestones }
    }

    /// Snapshot all applications with their milestones
    ///
    /// Applications keep the most-recently-updated-first ordering of the
    /// store; milestones keep their manual sort order.
    pub async fn snapshot(&self, exported_at: i64) -> Result<ExportData> {
        let applications = self.applications.get_all_applications().await?;
        let mut exported = Vec::with_capacity(applications.len());
        for application in applications {
            let milestones =
                self.milestones.get_milestones_for_application(&application.id).await?;
            exported.push(ExportApplication::from_entities(application, milestones));
        }
        Ok(ExportData { exported_at, applications: exported })
    }

    /// Pretty-printed JSON of the full snapshot
    #[instrument(skip(self))]
    pub async fn export_to_json(&self, exported_at: i64) -> Result<String> {
        let data = self.snapshot(exported_at).await?;
        let json = serde_json::to_string_pretty(&data)
            .map_err(|e| WaypointError::Serialization(e.to_string()))?;
        info!(applications = data.applications.len(), "Exported tracker data as JSON");
        Ok(json)
    }

    /// CSV of all applications, one row per application
    ///
    /// Milestones are not flattened into the CSV; use the JSON export for
    /// the full tree.
    #[instrument(skip(self))]
    pub async fn export_to_csv(&self) -> Result<String> {
        let applications = self.applications.get_all_applications().await?;
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for application in &applications {
            let fields = [
                escape_csv(&application.company_name),
                escape_csv(&application.role_title),
                escape_csv(application.job_link.as_deref().unwrap_or("")),
                escape_csv(application.location.as_deref().unwrap_or("")),
                application.applied_date.to_string(),
                application.status.as_str().to_string(),
                application.is_archived.to_string(),
                escape_csv(application.notes.as_deref().unwrap_or("")),
            ];
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        info!(applications = applications.len(), "Exported tracker data as CSV");
        Ok(out)
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
