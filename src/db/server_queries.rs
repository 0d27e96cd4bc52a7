use super::models::{Disk, Server};
use super::row_ext::{text_enum, unsigned};
use super::Database;
use anyhow::{Context, Result};
use rusqlite::params;
use std::collections::HashMap;

/// Map a row from the servers table into a `Server` without disks.
fn map_server_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, Server)> {
    Ok((
        row.get(0)?,
        Server {
            hostname: row.get(1)?,
            processor_type: text_enum(row, 2)?,
            processor_architecture: text_enum(row, 3)?,
            processor_speed: row.get(4)?,
            processor_cores: row.get(5)?,
            ram: unsigned(row, 6)?,
            disks: Vec::new(),
        },
    ))
}

const SERVER_COLUMNS: &str = "id, hostname, processor_type, processor_architecture, \
                              processor_speed, processor_cores, ram";

impl Database {
    /// Insert or update a server, replacing its disks, in one transaction.
    pub fn upsert_server(&self, server: &Server) -> Result<i64> {
        let ram = i64::try_from(server.ram)
            .with_context(|| format!("RAM of server {} is out of range", server.hostname))?;

        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        let id: i64 = tx
            .query_row(
                "INSERT INTO servers (hostname, processor_type, processor_architecture, \
                 processor_speed, processor_cores, ram, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%Y-%m-%dT%H:%M:%fZ','now'))
                 ON CONFLICT(hostname) DO UPDATE SET
                    processor_type = excluded.processor_type,
                    processor_architecture = excluded.processor_architecture,
                    processor_speed = excluded.processor_speed,
                    processor_cores = excluded.processor_cores,
                    ram = excluded.ram,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 RETURNING id",
                params![
                    server.hostname,
                    server.processor_type.as_str(),
                    server.processor_architecture.as_str(),
                    server.processor_speed,
                    server.processor_cores,
                    ram,
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to upsert server {}", server.hostname))?;

        tx.execute("DELETE FROM server_disks WHERE server_id = ?1", params![id])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO server_disks (server_id, device, disk_type, extents)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for disk in &server.disks {
                let extents = i64::try_from(disk.extents).with_context(|| {
                    format!("Extents of {}:{} are out of range", server.hostname, disk.device)
                })?;
                stmt.execute(params![id, disk.device, disk.disk_type.as_str(), extents])?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    /// Get all servers with their disks, ordered by hostname.
    ///
    /// This order becomes the candidate order of the placement search.
    pub fn get_all_servers(&self) -> Result<Vec<Server>> {
        let conn = self.conn();

        let mut stmt =
            conn.prepare(&format!("SELECT {SERVER_COLUMNS} FROM servers ORDER BY hostname"))?;
        let rows = stmt.query_map([], map_server_row)?.collect::<Result<Vec<_>, _>>()?;

        let mut disk_stmt = conn.prepare(
            "SELECT server_id, device, disk_type, extents FROM server_disks ORDER BY server_id, id",
        )?;
        let mut disks_by_server: HashMap<i64, Vec<Disk>> = HashMap::new();
        let disk_rows = disk_stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                Disk {
                    device: row.get(1)?,
                    disk_type: text_enum(row, 2)?,
                    extents: unsigned(row, 3)?,
                },
            ))
        })?;
        for disk_row in disk_rows {
            let (server_id, disk) = disk_row?;
            disks_by_server.entry(server_id).or_default().push(disk);
        }

        Ok(rows
            .into_iter()
            .map(|(id, mut server)| {
                server.disks = disks_by_server.remove(&id).unwrap_or_default();
                server
            })
            .collect())
    }

    /// Delete a server and its disks. Returns whether it existed.
    pub fn delete_server(&self, hostname: &str) -> Result<bool> {
        let conn = self.conn();
        let deleted = conn.execute("DELETE FROM servers WHERE hostname = ?1", params![hostname])?;
        Ok(deleted > 0)
    }
}
