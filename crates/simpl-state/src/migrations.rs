//! SurrealDB schema migrations and initialization
//!
//! Sets up the evaluation tables with their unique and lookup indexes.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all evaluation tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing evaluation schema");

    init_scorers_table(db).await?;
    init_profiles_table(db).await?;
    init_eval_runs_table(db).await?;

    info!("Evaluation schema initialization complete");
    Ok(())
}

/// Initialize `scorers` table
///
/// Schema:
/// ```text
/// TABLE scorers {
///   scorer_id:      STRING (unique)
///   name:           STRING
///   description:    STRING?
///   scorer_type:    STRING (builtin | llm_judge | code | <unknown>)
///   configuration:  STRING (JSON text)
///   created_at:     DATETIME
///   updated_at:     DATETIME
/// }
/// ```
async fn init_scorers_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing scorers table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS scorers SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_scorer_id ON TABLE scorers COLUMNS scorer_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_scorer_created_at ON TABLE scorers COLUMNS created_at;
    "#;

    db.query(sql).await?.check()?;
    Ok(())
}

/// Initialize `profiles` table
///
/// Schema:
/// ```text
/// TABLE profiles {
///   profile_id:   STRING (unique)
///   name:         STRING
///   description:  STRING?
///   scorer_ids:   ARRAY<STRING> (not a foreign key; may dangle)
///   created_at:   DATETIME
///   updated_at:   DATETIME
/// }
/// ```
async fn init_profiles_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing profiles table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS profiles SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_profile_id ON TABLE profiles COLUMNS profile_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_profile_created_at ON TABLE profiles COLUMNS created_at;
    "#;

    db.query(sql).await?.check()?;
    Ok(())
}

/// Initialize `eval_runs` table
///
/// Schema:
/// ```text
/// TABLE eval_runs {
///   run_id:            STRING (unique)
///   profile_id:        STRING (indexed)
///   dataset_path:      STRING
///   eval_type:         STRING?
///   engine_run_id:     STRING?
///   status:            STRING (PENDING | PROCESSING | COMPLETED | FAILED)
///   summary_results:   OBJECT?
///   row_details_path:  STRING?
///   error_message:     STRING?
///   created_at:        DATETIME (indexed)
///   updated_at:        DATETIME
/// }
/// ```
///
/// Status transitions are enforced by the ledger, not the database.
async fn init_eval_runs_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing eval_runs table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS eval_runs SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_run_id ON TABLE eval_runs COLUMNS run_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_run_profile_id ON TABLE eval_runs COLUMNS profile_id;
        DEFINE INDEX IF NOT EXISTS idx_run_created_at ON TABLE eval_runs COLUMNS created_at;
    "#;

    db.query(sql).await?.check()?;
    Ok(())
}
