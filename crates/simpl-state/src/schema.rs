//! Row types for the SurrealDB tables
//!
//! Tables:
//! - scorers: scorer definitions
//! - profiles: named scorer bundles
//! - eval_runs: evaluation runs and their results
//!
//! Rows store identifiers as strings and timestamps as SurrealDB datetimes;
//! conversion to the `storage_traits` records happens at this boundary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage_traits::{EvalRunRecord, ProfileRecord, RunStatus, ScorerRecord, ScorerType};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(raw).map_err(|e| StorageError::Corrupt(format!("{field} {raw:?}: {e}")))
}

/// Row in `scorers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerRow {
    /// SurrealDB record ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub scorer_id: String,
    pub name: String,
    pub description: Option<String>,
    pub scorer_type: String,
    /// JSON text. SurrealDB drops `null` members from stored objects.
    pub configuration: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl From<&ScorerRecord> for ScorerRow {
    fn from(record: &ScorerRecord) -> Self {
        Self {
            id: None,
            scorer_id: record.id.to_string(),
            name: record.name.clone(),
            description: record.description.clone(),
            scorer_type: record.scorer_type.as_str().to_string(),
            configuration: record.configuration.to_string(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl TryFrom<ScorerRow> for ScorerRecord {
    type Error = StorageError;

    fn try_from(row: ScorerRow) -> Result<Self, Self::Error> {
        let configuration = serde_json::from_str(&row.configuration).map_err(|e| {
            StorageError::Corrupt(format!("scorer {} configuration: {e}", row.scorer_id))
        })?;
        Ok(ScorerRecord {
            id: parse_uuid("scorer_id", &row.scorer_id)?,
            name: row.name,
            description: row.description,
            scorer_type: ScorerType::from(row.scorer_type),
            configuration,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row in `profiles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub profile_id: String,
    pub name: String,
    pub description: Option<String>,
    pub scorer_ids: Vec<String>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl From<&ProfileRecord> for ProfileRow {
    fn from(record: &ProfileRecord) -> Self {
        Self {
            id: None,
            profile_id: record.id.to_string(),
            name: record.name.clone(),
            description: record.description.clone(),
            scorer_ids: record.scorer_ids.iter().map(Uuid::to_string).collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl TryFrom<ProfileRow> for ProfileRecord {
    type Error = StorageError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let scorer_ids = row
            .scorer_ids
            .iter()
            .map(|raw| parse_uuid("scorer_ids[]", raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProfileRecord {
            id: parse_uuid("profile_id", &row.profile_id)?,
            name: row.name,
            description: row.description,
            scorer_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row in `eval_runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRunRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<surrealdb::sql::Thing>,
    pub run_id: String,
    pub profile_id: String,
    pub dataset_path: String,
    pub eval_type: Option<String>,
    pub engine_run_id: Option<String>,
    /// "PENDING" | "PROCESSING" | "COMPLETED" | "FAILED"
    pub status: String,
    pub summary_results: Option<BTreeMap<String, f64>>,
    pub row_details_path: Option<String>,
    pub error_message: Option<String>,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl From<&EvalRunRecord> for EvalRunRow {
    fn from(record: &EvalRunRecord) -> Self {
        Self {
            id: None,
            run_id: record.id.to_string(),
            profile_id: record.profile_id.to_string(),
            dataset_path: record.dataset_path.clone(),
            eval_type: record.eval_type.clone(),
            engine_run_id: record.engine_run_id.clone(),
            status: record.status.as_str().to_string(),
            summary_results: record.summary_results.clone(),
            row_details_path: record.row_details_path.clone(),
            error_message: record.error_message.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl TryFrom<EvalRunRow> for EvalRunRecord {
    type Error = StorageError;

    fn try_from(row: EvalRunRow) -> Result<Self, Self::Error> {
        Ok(EvalRunRecord {
            id: parse_uuid("run_id", &row.run_id)?,
            profile_id: parse_uuid("profile_id", &row.profile_id)?,
            dataset_path: row.dataset_path,
            eval_type: row.eval_type,
            engine_run_id: row.engine_run_id,
            status: row.status.parse::<RunStatus>()?,
            summary_results: row.summary_results,
            row_details_path: row.row_details_path,
            error_message: row.error_message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_traits::{NewEvalRun, NewProfile, NewScorer};
    use serde_json::json;

    #[test]
    fn scorer_row_round_trips_unknown_type() {
        let mut record = ScorerRecord::new(NewScorer {
            name: "regex".into(),
            description: None,
            scorer_type: ScorerType::Unknown("regex".into()),
            configuration: json!({"pattern": "a+"}),
        });
        record.updated_at = record.created_at;
        let row = ScorerRow::from(&record);
        assert_eq!(row.scorer_type, "regex");
        let back = ScorerRecord::try_from(row).unwrap();
        assert_eq!(back.scorer_type, ScorerType::Unknown("regex".into()));
        assert_eq!(back.id, record.id);
    }

    #[test]
    fn scorer_configuration_is_stored_as_json_text() {
        let record = ScorerRecord::new(NewScorer {
            name: "judge".into(),
            description: None,
            scorer_type: ScorerType::LlmJudge,
            configuration: json!({"model": null, "nested": {"x": null}}),
        });
        let row = ScorerRow::from(&record);
        assert_eq!(row.configuration, r#"{"model":null,"nested":{"x":null}}"#);
        let back = ScorerRecord::try_from(row).unwrap();
        assert_eq!(back.configuration, record.configuration);
    }

    #[test]
    fn scorer_row_rejects_unparseable_configuration() {
        let record = ScorerRecord::new(NewScorer {
            name: "tox".into(),
            description: None,
            scorer_type: ScorerType::Builtin,
            configuration: json!({}),
        });
        let mut row = ScorerRow::from(&record);
        row.configuration = "{not json".into();
        let err = ScorerRecord::try_from(row).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    #[test]
    fn profile_row_rejects_malformed_scorer_ids() {
        let record = ProfileRecord::new(NewProfile {
            name: "p".into(),
            description: None,
            scorer_ids: vec![Uuid::new_v4()],
        });
        let mut row = ProfileRow::from(&record);
        row.scorer_ids.push("not-a-uuid".into());
        let err = ProfileRecord::try_from(row).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    #[test]
    fn run_row_serializes_status_string() {
        let record = EvalRunRecord::new(NewEvalRun {
            profile_id: Uuid::new_v4(),
            dataset_path: "/data/a.csv".into(),
            eval_type: Some("chatbot".into()),
        });
        let row = EvalRunRow::from(&record);
        let json = serde_json::to_string(&row).expect("serialize");
        assert!(json.contains("\"status\":\"PENDING\""));
        assert!(!json.contains("\"id\""));
        let back = EvalRunRecord::try_from(row).unwrap();
        assert_eq!(back.status, RunStatus::Pending);
        assert_eq!(back.eval_type.as_deref(), Some("chatbot"));
    }
}
