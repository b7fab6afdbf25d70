//! SQLite-backed user and task storage.

use chrono::Utc;
use rusqlite::{params, types::Type, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::info;

use crate::auth::Role;
use crate::store::models::{NewTask, NewUser, Page, Task, TaskChanges, User};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint on username or email.
    #[error("record already exists")]
    Conflict,

    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    due_date TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    owner_id INTEGER NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner_id);
CREATE INDEX IF NOT EXISTS idx_tasks_deleted_at ON tasks(deleted_at);
";

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

const TASK_WITH_OWNER: &str = "
SELECT t.id, t.title, t.description, t.category, t.due_date, t.completed, t.owner_id,
       t.created_at, t.updated_at,
       u.id, u.username, u.email, u.password_hash, u.role, u.created_at, u.updated_at
FROM tasks t
JOIN users u ON u.id = t.owner_id
WHERE t.deleted_at IS NULL";

/// User and task store on a single SQLite connection.
///
/// The connection is guarded by a mutex; statements are short and never
/// held across an `.await`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database and run migrations. `":memory:"` is accepted.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %path.as_ref().display(), "Database ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:")
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    // ---- users ----

    /// Insert a user; a duplicate username or email yields [`StoreError::Conflict`].
    pub fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let conn = self.conn();

        conn.execute(
            "INSERT INTO users (username, email, password_hash, role, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new_user.username,
                new_user.email,
                new_user.password_hash,
                new_user.role.as_str(),
                now,
                now,
            ],
        )
        .map_err(map_constraint)?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
        Ok(self
            .conn()
            .query_row(&sql, params![email], |row| user_from_row(row, 0))
            .optional()?)
    }

    pub fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        Ok(self
            .conn()
            .query_row(&sql, params![id], |row| user_from_row(row, 0))
            .optional()?)
    }

    pub fn count_admins(&self) -> Result<i64, StoreError> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![Role::Admin.as_str()],
            |row| row.get(0),
        )?)
    }

    // ---- tasks ----

    pub fn create_task(&self, owner_id: i64, new_task: NewTask) -> Result<Task, StoreError> {
        let now = Utc::now();
        let conn = self.conn();

        conn.execute(
            "INSERT INTO tasks (title, description, category, due_date, completed, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)",
            params![
                new_task.title,
                new_task.description,
                new_task.category,
                new_task.due_date,
                owner_id,
                now,
                now,
            ],
        )?;

        fetch_task(&conn, conn.last_insert_rowid())?.ok_or(StoreError::NotFound)
    }

    /// A live (not deleted) task with its owner.
    pub fn get_task(&self, id: i64) -> Result<Option<Task>, StoreError> {
        fetch_task(&self.conn(), id)
    }

    /// Live tasks with owners, ordered by id.
    pub fn list_tasks(&self, page: Page) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn();
        let sql = format!("{} ORDER BY t.id LIMIT ?1 OFFSET ?2", TASK_WITH_OWNER);
        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params![page.limit(), page.offset()], task_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn update_task(&self, id: i64, changes: TaskChanges) -> Result<Task, StoreError> {
        let conn = self.conn();
        let mut task = fetch_task(&conn, id)?.ok_or(StoreError::NotFound)?;

        changes.apply(&mut task);
        task.updated_at = Utc::now();

        conn.execute(
            "UPDATE tasks
             SET title = ?1, description = ?2, category = ?3, due_date = ?4, completed = ?5, updated_at = ?6
             WHERE id = ?7 AND deleted_at IS NULL",
            params![
                task.title,
                task.description,
                task.category,
                task.due_date,
                task.completed,
                task.updated_at,
                id,
            ],
        )?;

        Ok(task)
    }

    /// Soft delete: the row stays, with `deleted_at` set.
    pub fn delete_task(&self, id: i64) -> Result<(), StoreError> {
        let changed = self.conn().execute(
            "UPDATE tasks SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
            params![Utc::now(), id],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn fetch_task(conn: &Connection, id: i64) -> Result<Option<Task>, StoreError> {
    let sql = format!("{} AND t.id = ?1", TASK_WITH_OWNER);
    Ok(conn.query_row(&sql, params![id], task_from_row).optional()?)
}

fn map_constraint(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict
        }
        other => StoreError::Sqlite(other),
    }
}

fn user_from_row(row: &Row<'_>, base: usize) -> rusqlite::Result<User> {
    let role: String = row.get(base + 4)?;
    Ok(User {
        id: row.get(base)?,
        username: row.get(base + 1)?,
        email: row.get(base + 2)?,
        password_hash: row.get(base + 3)?,
        role: Role::parse(&role).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                base + 4,
                Type::Text,
                format!("unknown role '{}'", role).into(),
            )
        })?,
        created_at: row.get(base + 5)?,
        updated_at: row.get(base + 6)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        due_date: row.get(4)?,
        completed: row.get(5)?,
        owner_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        owner: Some(user_from_row(row, 9)?),
    })
}
