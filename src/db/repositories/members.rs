use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_role},
    models::{Member, MemberIdentity, MemberRole},
};

const MEMBER_COLUMNS: &str = "id, name, role, created_at, updated_at";

fn row_to_member(row: &Row) -> Result<MemberIdentity> {
    let role: String = row.get("role")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(MemberIdentity {
        id: row.get("id")?,
        data: Member {
            name: row.get("name")?,
            role: parse_role(&role)?,
            created_at: parse_datetime(&created_at, "created_at")?,
            updated_at: parse_datetime(&updated_at, "updated_at")?,
        },
    })
}

impl Database {
    /// Add a member to a group. A fresh UUID is used when `member_id` is `None`.
    pub async fn add_member(
        &self,
        group_id: &str,
        member_id: Option<String>,
        name: String,
        role: MemberRole,
    ) -> Result<MemberIdentity> {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("member name must not be empty");
        }
        let id = match member_id.map(|id| id.trim().to_string()) {
            Some(id) if id.is_empty() => bail!("member id must not be empty"),
            Some(id) => id,
            None => Uuid::new_v4().to_string(),
        };

        let identity = MemberIdentity {
            id,
            data: Member::new(name, role, Utc::now()),
        };

        let group_id = group_id.to_string();
        let record = identity.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO members (group_id, id, name, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    group_id,
                    record.id,
                    record.data.name,
                    record.data.role.as_str(),
                    format_datetime(&record.data.created_at),
                    format_datetime(&record.data.updated_at),
                ],
            )?;
            Ok(())
        })
        .await?;

        Ok(identity)
    }

    pub async fn get_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<Option<MemberIdentity>> {
        let group_id = group_id.to_string();
        let member_id = member_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMBER_COLUMNS} FROM members WHERE group_id = ?1 AND id = ?2"
            ))?;
            let member = stmt
                .query_row(params![group_id, member_id], |row| Ok(row_to_member(row)))
                .optional()?
                .transpose()?;
            Ok(member)
        })
        .await
    }

    pub async fn list_members(&self, group_id: &str) -> Result<Vec<MemberIdentity>> {
        let group_id = group_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMBER_COLUMNS} FROM members
                 WHERE group_id = ?1
                 ORDER BY name COLLATE NOCASE ASC"
            ))?;

            let mut rows = stmt.query(params![group_id])?;
            let mut members = Vec::new();
            while let Some(row) = rows.next()? {
                members.push(row_to_member(row)?);
            }
            Ok(members)
        })
        .await
    }

    pub async fn rename_member(
        &self,
        group_id: &str,
        member_id: &str,
        name: String,
    ) -> Result<MemberIdentity> {
        let name = name.trim().to_string();
        if name.is_empty() {
            bail!("member name must not be empty");
        }

        let group_id = group_id.to_string();
        let member_id = member_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE members SET name = ?1, updated_at = ?2
                 WHERE group_id = ?3 AND id = ?4",
                params![name, format_datetime(&Utc::now()), group_id, member_id],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("Member not found"));
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMBER_COLUMNS} FROM members WHERE group_id = ?1 AND id = ?2"
            ))?;
            let mut rows = stmt.query(params![group_id, member_id])?;
            match rows.next()? {
                Some(row) => row_to_member(row),
                None => Err(anyhow!("Member not found after update")),
            }
        })
        .await
    }

    /// Remove a member; their activities go with them (ON DELETE CASCADE).
    pub async fn remove_member(&self, group_id: &str, member_id: &str) -> Result<()> {
        let group_id = group_id.to_string();
        let member_id = member_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM members WHERE group_id = ?1 AND id = ?2",
                params![group_id, member_id],
            )?;
            if rows_affected == 0 {
                return Err(anyhow!("Member not found"));
            }
            Ok(())
        })
        .await
    }
}
