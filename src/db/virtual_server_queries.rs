use super::models::{VirtualDisk, VirtualServer};
use super::row_ext::{optional_text_enum, text_enum, unsigned};
use super::Database;
use anyhow::{Context, Result};
use rusqlite::params;
use std::collections::HashMap;

/// Map a row from the virtual_servers table into a `VirtualServer` without disks.
fn map_virtual_server_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, VirtualServer)> {
    Ok((
        row.get(0)?,
        VirtualServer {
            hostname: row.get(1)?,
            primary_server: row.get(2)?,
            secondary_server: row.get(3)?,
            minimum_processor_type: optional_text_enum(row, 4)?,
            processor_architecture: optional_text_enum(row, 5)?,
            minimum_processor_speed: row.get(6)?,
            processor_cores: row.get(7)?,
            processor_weight: row.get(8)?,
            primary_ram: unsigned(row, 9)?,
            secondary_ram: unsigned(row, 10)?,
            disks: Vec::new(),
        },
    ))
}

fn map_virtual_disk_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, VirtualDisk)> {
    Ok((
        row.get(0)?,
        VirtualDisk {
            device: row.get(1)?,
            extents: unsigned(row, 2)?,
            primary_disk_type: text_enum(row, 3)?,
            secondary_disk_type: text_enum(row, 4)?,
            primary_weight: row.get(5)?,
            secondary_weight: row.get(6)?,
        },
    ))
}

const VIRTUAL_SERVER_COLUMNS: &str = "id, hostname, primary_server, secondary_server, \
     minimum_processor_type, processor_architecture, minimum_processor_speed, \
     processor_cores, processor_weight, primary_ram, secondary_ram";

impl Database {
    /// Insert or update a virtual server, replacing its virtual disks, in one transaction.
    pub fn upsert_virtual_server(&self, vs: &VirtualServer) -> Result<i64> {
        let out_of_range = || format!("RAM of virtual server {} is out of range", vs.hostname);
        let primary_ram = i64::try_from(vs.primary_ram).with_context(out_of_range)?;
        let secondary_ram = i64::try_from(vs.secondary_ram).with_context(out_of_range)?;

        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;

        let id: i64 = tx
            .query_row(
                "INSERT INTO virtual_servers (hostname, primary_server, secondary_server, \
                 minimum_processor_type, processor_architecture, minimum_processor_speed, \
                 processor_cores, processor_weight, primary_ram, secondary_ram, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
                 strftime('%Y-%m-%dT%H:%M:%fZ','now'))
                 ON CONFLICT(hostname) DO UPDATE SET
                    primary_server = excluded.primary_server,
                    secondary_server = excluded.secondary_server,
                    minimum_processor_type = excluded.minimum_processor_type,
                    processor_architecture = excluded.processor_architecture,
                    minimum_processor_speed = excluded.minimum_processor_speed,
                    processor_cores = excluded.processor_cores,
                    processor_weight = excluded.processor_weight,
                    primary_ram = excluded.primary_ram,
                    secondary_ram = excluded.secondary_ram,
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 RETURNING id",
                params![
                    vs.hostname,
                    vs.primary_server,
                    vs.secondary_server,
                    vs.minimum_processor_type.map(|t| t.as_str()),
                    vs.processor_architecture.map(|a| a.as_str()),
                    vs.minimum_processor_speed,
                    vs.processor_cores,
                    vs.processor_weight,
                    primary_ram,
                    secondary_ram,
                ],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to upsert virtual server {}", vs.hostname))?;

        tx.execute("DELETE FROM virtual_disks WHERE virtual_server_id = ?1", params![id])?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO virtual_disks (virtual_server_id, device, extents, \
                 primary_disk_type, secondary_disk_type, primary_weight, secondary_weight)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for disk in &vs.disks {
                let extents = i64::try_from(disk.extents).with_context(|| {
                    format!("Extents of {}:{} are out of range", vs.hostname, disk.device)
                })?;
                stmt.execute(params![
                    id,
                    disk.device,
                    extents,
                    disk.primary_disk_type.as_str(),
                    disk.secondary_disk_type.as_str(),
                    disk.primary_weight,
                    disk.secondary_weight,
                ])?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    /// Get all virtual servers with their virtual disks, ordered by hostname.
    ///
    /// This order becomes the depth order of the placement search.
    pub fn get_all_virtual_servers(&self) -> Result<Vec<VirtualServer>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(&format!(
            "SELECT {VIRTUAL_SERVER_COLUMNS} FROM virtual_servers ORDER BY hostname"
        ))?;
        let rows = stmt.query_map([], map_virtual_server_row)?.collect::<Result<Vec<_>, _>>()?;

        let mut disk_stmt = conn.prepare(
            "SELECT virtual_server_id, device, extents, primary_disk_type, \
             secondary_disk_type, primary_weight, secondary_weight
             FROM virtual_disks ORDER BY virtual_server_id, id",
        )?;
        let mut disks_by_vs: HashMap<i64, Vec<VirtualDisk>> = HashMap::new();
        for disk_row in disk_stmt.query_map([], map_virtual_disk_row)? {
            let (vs_id, disk) = disk_row?;
            disks_by_vs.entry(vs_id).or_default().push(disk);
        }

        Ok(rows
            .into_iter()
            .map(|(id, mut vs)| {
                vs.disks = disks_by_vs.remove(&id).unwrap_or_default();
                vs
            })
            .collect())
    }

    /// Delete a virtual server and its disks. Returns whether it existed.
    pub fn delete_virtual_server(&self, hostname: &str) -> Result<bool> {
        let conn = self.conn();
        let deleted =
            conn.execute("DELETE FROM virtual_servers WHERE hostname = ?1", params![hostname])?;
        Ok(deleted > 0)
    }
}
