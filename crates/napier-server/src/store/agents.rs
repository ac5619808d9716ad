//! Hosted agent configurations and the tools attached to them.

use super::StoreError;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool definition forwarded to the upstream voice service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentRecord {
    pub id: String,
    pub user_id: i64,
    pub name: String,
    pub system_prompt: String,
    /// Agent id on the upstream voice service.
    pub upstream_agent_id: String,
    pub tools: Vec<AgentTool>,
}

/// Parameters for [`create_agent`].
#[derive(Debug, Clone)]
pub struct NewAgent<'a> {
    pub id: &'a str,
    pub user_id: i64,
    pub name: &'a str,
    pub system_prompt: &'a str,
    pub upstream_agent_id: &'a str,
}

pub fn create_agent(conn: &Connection, agent: &NewAgent<'_>) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO agents (id, user_id, name, system_prompt, upstream_agent_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            agent.id,
            agent.user_id,
            agent.name,
            agent.system_prompt,
            agent.upstream_agent_id
        ],
    )?;
    Ok(())
}

/// Attaches a tool to an agent, replacing any tool with the same name.
pub fn put_agent_tool(conn: &Connection, agent_id: &str, tool: &AgentTool) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO agent_tools (agent_id, name, description, parameters_json)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (agent_id, name) DO UPDATE SET
            description = excluded.description,
            parameters_json = excluded.parameters_json",
        params![
            agent_id,
            tool.name,
            tool.description,
            serde_json::to_string(&tool.parameters)?
        ],
    )?;
    Ok(())
}

/// Loads an agent together with its tools, but only if `user_id` owns it.
pub fn find_agent_for_user(
    conn: &Connection,
    agent_id: &str,
    user_id: i64,
) -> Result<Option<AgentRecord>, StoreError> {
    let agent = conn
        .query_row(
            "SELECT id, user_id, name, system_prompt, upstream_agent_id
             FROM agents WHERE id = ?1 AND user_id = ?2",
            params![agent_id, user_id],
            |row| {
                Ok(AgentRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    name: row.get(2)?,
                    system_prompt: row.get(3)?,
                    upstream_agent_id: row.get(4)?,
                    tools: Vec::new(),
                })
            },
        )
        .optional()?;

    let Some(mut agent) = agent else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT name, description, parameters_json FROM agent_tools
         WHERE agent_id = ?1 ORDER BY name",
    )?;
    let rows = stmt.query_map(params![agent.id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    for row in rows {
        let (name, description, parameters_json) = row?;
        agent.tools.push(AgentTool {
            name,
            description,
            parameters: serde_json::from_str(&parameters_json)?,
        });
    }

    Ok(Some(agent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::create_user;
    use serde_json::json;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        napier_db::run_migrations(&conn).unwrap();
        conn
    }

    fn support_agent(user_id: i64) -> NewAgent<'static> {
        NewAgent {
            id: "agent-support",
            user_id,
            name: "Support",
            system_prompt: "Be brief.",
            upstream_agent_id: "upstream-123",
        }
    }

    #[test]
    fn agent_is_scoped_to_its_owner() {
        let conn = conn();
        let owner = create_user(&conn, "owner", None).unwrap();
        let other = create_user(&conn, "other", None).unwrap();
        create_agent(&conn, &support_agent(owner)).unwrap();

        let found = find_agent_for_user(&conn, "agent-support", owner)
            .unwrap()
            .unwrap();
        assert_eq!(found.upstream_agent_id, "upstream-123");
        assert!(found.tools.is_empty());

        assert!(find_agent_for_user(&conn, "agent-support", other)
            .unwrap()
            .is_none());
        assert!(find_agent_for_user(&conn, "missing", owner).unwrap().is_none());
    }

    #[test]
    fn tools_are_loaded_and_replaced_by_name() {
        let conn = conn();
        let owner = create_user(&conn, "owner", None).unwrap();
        create_agent(&conn, &support_agent(owner)).unwrap();

        let mut tool = AgentTool {
            name: "battery".to_string(),
            description: "Read the battery".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        };
        put_agent_tool(&conn, "agent-support", &tool).unwrap();
        tool.description = "Battery level 0..1".to_string();
        put_agent_tool(&conn, "agent-support", &tool).unwrap();

        let found = find_agent_for_user(&conn, "agent-support", owner)
            .unwrap()
            .unwrap();
        assert_eq!(found.tools, vec![tool]);
    }
}
