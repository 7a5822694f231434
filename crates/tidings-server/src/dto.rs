use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tidings_core::models::CycleReport;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Body of `/run`, tagged by `status`.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunResponse {
    Ok {
        posted: usize,
        failed: usize,
        abandoned: usize,
        cycle_id: Uuid,
    },
    Skipped {
        cycle_id: Uuid,
    },
    Error {
        detail: String,
    },
}

impl From<&CycleReport> for RunResponse {
    fn from(report: &CycleReport) -> Self {
        if report.is_skipped() {
            RunResponse::Skipped {
                cycle_id: report.cycle_id,
            }
        } else {
            RunResponse::Ok {
                posted: report.published,
                failed: report.failed,
                abandoned: report.abandoned,
                cycle_id: report.cycle_id,
            }
        }
    }
}
