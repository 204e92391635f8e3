use anyhow::{bail, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
    models::Group,
};

fn row_to_group(row: &Row) -> Result<Group> {
    let created_at: String = row.get("created_at")?;

    Ok(Group {
        id: row.get("id")?,
        name: row.get("name")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

impl Database {
    pub async fn create_group(&self, name: String) -> Result<Group> {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("group name must not be empty");
        }

        let group = Group {
            id: Uuid::new_v4().to_string(),
            name,
            created_at: Utc::now(),
        };

        let record = group.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO groups (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![record.id, record.name, format_datetime(&record.created_at)],
            )?;
            Ok(())
        })
        .await?;

        Ok(group)
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Option<Group>> {
        let group_id = group_id.to_string();
        self.execute(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, created_at FROM groups WHERE id = ?1")?;
            let group = stmt
                .query_row(params![group_id], |row| Ok(row_to_group(row)))
                .optional()?
                .transpose()?;
            Ok(group)
        })
        .await
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, created_at FROM groups ORDER BY created_at ASC")?;

            let mut rows = stmt.query([])?;
            let mut groups = Vec::new();
            while let Some(row) = rows.next()? {
                groups.push(row_to_group(row)?);
            }
            Ok(groups)
        })
        .await
    }
}
