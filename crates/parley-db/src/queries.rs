use crate::models::{MessageRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, password_hash: &str, language: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, language) VALUES (?1, ?2, ?3)",
                (username, password_hash, language),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn list_usernames(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT username FROM users ORDER BY username")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when no such user exists.
    pub fn update_user_language(&self, username: &str, language: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET language = ?1 WHERE username = ?2",
                (language, username),
            )?;
            Ok(changed > 0)
        })
    }

    /// Deletes the user row only. Their messages are retained.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE username = ?1", [username])?;
            Ok(changed > 0)
        })
    }

    // -- Messages --

    /// Appends one message; SQLite assigns the id and timestamp.
    pub fn insert_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            let row = conn.query_row(
                "INSERT INTO messages (sender_id, recipient_id, content) VALUES (?1, ?2, ?3)
                 RETURNING id, sender_id, recipient_id, content, created_at",
                (sender_id, recipient_id, content),
                map_message_row,
            )?;
            Ok(row)
        })
    }

    /// All messages between the two users, in either direction.
    /// Order is a contract: creation time ascending, then id ascending so
    /// same-second inserts stay in insert order.
    pub fn messages_between(&self, user_a: &str, user_b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, recipient_id, content, created_at
                 FROM messages
                 WHERE (sender_id = ?1 AND recipient_id = ?2)
                    OR (sender_id = ?2 AND recipient_id = ?1)
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map([user_a, user_b], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Distinct usernames this user has sent at least one message to.
    pub fn contacts_of(&self, username: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT recipient_id FROM messages
                 WHERE sender_id = ?1 ORDER BY recipient_id",
            )?;
            let rows = stmt
                .query_map([username], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_message_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT username, password, language, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                username: row.get(0)?,
                password: row.get(1)?,
                language: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn db_with_users(names: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for name in names {
            db.create_user(name, "hash", "en").unwrap();
        }
        db
    }

    #[test]
    fn duplicate_username_is_a_constraint_violation() {
        let db = db_with_users(&["alice"]);
        let err = db.create_user("alice", "other-hash", "en").unwrap_err();
        assert!(crate::is_constraint_violation(&err));
    }

    #[test]
    fn other_store_errors_are_not_constraint_violations() {
        let db = db_with_users(&[]);
        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE users")?;
            Ok(())
        })
        .unwrap();

        let err = db.create_user("alice", "hash", "en").unwrap_err();
        assert!(!crate::is_constraint_violation(&err));
    }

    #[test]
    fn messages_between_is_symmetric_and_ordered() {
        let db = db_with_users(&["alice", "bob", "carol"]);
        db.insert_message("alice", "bob", "one").unwrap();
        db.insert_message("bob", "alice", "two").unwrap();
        db.insert_message("alice", "carol", "unrelated").unwrap();
        db.insert_message("alice", "bob", "three").unwrap();

        let a_b = db.messages_between("alice", "bob").unwrap();
        let b_a = db.messages_between("bob", "alice").unwrap();

        let contents: Vec<&str> = a_b.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert_eq!(
            a_b.iter().map(|m| m.id).collect::<Vec<_>>(),
            b_a.iter().map(|m| m.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn insert_assigns_monotonic_ids() {
        let db = db_with_users(&["alice", "bob"]);
        let first = db.insert_message("alice", "bob", "a").unwrap();
        let second = db.insert_message("alice", "bob", "b").unwrap();
        assert!(second.id > first.id);
        assert!(!first.created_at.is_empty());
    }

    #[test]
    fn deleting_user_retains_their_messages() {
        let db = db_with_users(&["alice", "bob"]);
        db.insert_message("alice", "bob", "kept").unwrap();

        assert!(db.delete_user("alice").unwrap());
        assert!(db.get_user_by_username("alice").unwrap().is_none());

        let messages = db.messages_between("alice", "bob").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "kept");
    }

    #[test]
    fn contacts_are_distinct_recipients_only() {
        let db = db_with_users(&["alice", "bob", "carol"]);
        db.insert_message("alice", "bob", "x").unwrap();
        db.insert_message("alice", "bob", "y").unwrap();
        db.insert_message("alice", "carol", "z").unwrap();
        db.insert_message("bob", "alice", "reply").unwrap();

        assert_eq!(db.contacts_of("alice").unwrap(), ["bob", "carol"]);
        assert_eq!(db.contacts_of("bob").unwrap(), ["alice"]);
    }

    #[test]
    fn update_language_reports_missing_user() {
        let db = db_with_users(&["alice"]);
        assert!(db.update_user_language("alice", "fr").unwrap());
        assert!(!db.update_user_language("ghost", "fr").unwrap());

        let user = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(user.language, "fr");
    }
}
