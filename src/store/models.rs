//! Persisted records and their inputs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Role;

/// Default page size for task listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound on a single page.
pub const MAX_PAGE_SIZE: u32 = 100;

/// User account
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`crate::store::SqliteStore::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// A task owned by a single user.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub due_date: Option<DateTime<Utc>>,
    pub completed: bool,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
}

/// Input for [`crate::store::SqliteStore::create_task`].
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub category: String,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update. `None` leaves a field untouched; `due_date: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub completed: Option<bool>,
}

impl TaskChanges {
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

/// 1-based pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Page {
    /// Lenient parse of query values: missing, non-numeric or non-positive values
    /// fall back to the defaults, and the size is capped at [`MAX_PAGE_SIZE`].
    pub fn from_query(page: Option<&str>, page_size: Option<&str>) -> Self {
        let positive = |raw: Option<&str>| {
            raw.and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
        };

        Self {
            page: positive(page).unwrap_or(1),
            page_size: positive(page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .min(MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        assert_eq!(Page::from_query(None, None), Page::default());
        assert_eq!(Page::from_query(Some("0"), Some("-5")), Page::default());
        assert_eq!(Page::from_query(Some("abc"), Some("")), Page::default());
    }

    #[test]
    fn test_page_window() {
        let page = Page::from_query(Some("3"), Some("10"));
        assert_eq!(page.limit(), 10);
        assert_eq!(page.offset(), 20);

        let capped = Page::from_query(Some("1"), Some("5000"));
        assert_eq!(capped.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$2b$04$secret".into(),
            role: Role::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
    }

    #[test]
    fn test_changes_apply() {
        let mut task = Task {
            id: 1,
            title: "old".into(),
            description: "d".into(),
            category: "c".into(),
            due_date: Some(Utc::now()),
            completed: false,
            owner_id: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            owner: None,
        };
        TaskChanges {
            title: Some("new".into()),
            due_date: Some(None),
            completed: Some(true),
            ..Default::default()
        }
        .apply(&mut task);

        assert_eq!(task.title, "new");
        assert_eq!(task.description, "d");
        assert!(task.due_date.is_none());
        assert!(task.completed);
    }
}
