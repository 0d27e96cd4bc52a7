use super::models::{OptimizationRun, RunOutcome, RunPlacement};
use super::row_ext::{text_enum, OptionalExt};
use super::Database;
use anyhow::Result;
use rusqlite::params;

fn map_run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OptimizationRun> {
    let rejections: Option<String> = row.get(8)?;
    Ok(OptimizationRun {
        id: row.get(0)?,
        created_at: row.get(1)?,
        finished_at: row.get(2)?,
        status: text_enum(row, 3)?,
        max_mappings: row.get::<_, i64>(4)? as u64,
        mappings_found: row.get::<_, i64>(5)? as u64,
        candidates_tried: row.get::<_, i64>(6)? as u64,
        candidates_rejected: row.get::<_, i64>(7)? as u64,
        rejections: rejections.and_then(|s| serde_json::from_str(&s).ok()),
        error_message: row.get(9)?,
    })
}

impl Database {
    /// Create a new run in `running` state.
    pub fn create_run(&self, max_mappings: u64) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO optimization_runs (max_mappings) VALUES (?1)",
            params![max_mappings as i64],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record the final status and counters of a run.
    pub fn finish_run(&self, run_id: i64, outcome: &RunOutcome) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE optimization_runs
             SET status = ?1, mappings_found = ?2, candidates_tried = ?3, \
             candidates_rejected = ?4, rejections = ?5, error_message = ?6, \
             finished_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
             WHERE id = ?7",
            params![
                outcome.status.as_str(),
                outcome.mappings_found as i64,
                outcome.candidates_tried as i64,
                outcome.candidates_rejected as i64,
                outcome.rejections.to_string(),
                outcome.error_message,
                run_id,
            ],
        )?;
        Ok(())
    }

    /// Store the mapping chosen for a run, replacing any previous one.
    pub fn insert_run_placements(&self, run_id: i64, placements: &[RunPlacement]) -> Result<()> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        tx.execute("DELETE FROM run_placements WHERE run_id = ?1", params![run_id])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO run_placements \
                 (run_id, virtual_server, primary_server, secondary_server)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for p in placements {
                stmt.execute(params![
                    run_id,
                    p.virtual_server,
                    p.primary_server,
                    p.secondary_server
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get a run by ID.
    pub fn get_run(&self, run_id: i64) -> Result<Option<OptimizationRun>> {
        let conn = self.conn();
        let run = conn
            .query_row(
                "SELECT id, created_at, finished_at, status, max_mappings, mappings_found, \
                 candidates_tried, candidates_rejected, rejections, error_message
                 FROM optimization_runs WHERE id = ?1",
                params![run_id],
                map_run_row,
            )
            .optional()?;

        Ok(run)
    }

    /// Get the stored mapping of a run, ordered by virtual server.
    pub fn get_run_placements(&self, run_id: i64) -> Result<Vec<RunPlacement>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT virtual_server, primary_server, secondary_server
             FROM run_placements WHERE run_id = ?1 ORDER BY virtual_server",
        )?;

        let placements = stmt
            .query_map(params![run_id], |row| {
                Ok(RunPlacement {
                    virtual_server: row.get(0)?,
                    primary_server: row.get(1)?,
                    secondary_server: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(placements)
    }
}
