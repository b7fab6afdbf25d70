use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status and `{"error": ...}`.
    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },
}

impl SdkError {
    /// HTTP status of an API error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            SdkError::Api { status, .. } => Some(*status),
            SdkError::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub due_date: Option<String>,
    pub completed: bool,
    pub owner_id: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub owner: Option<Owner>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewTask {
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Partial update; unset fields are left alone. `due_date: Some("")` clears it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

pub struct TaskClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl TaskClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<(), SdkError> {
        let body = RegisterBody { username, email, password, role };
        let resp = self.client.post(self.url("/api/register")).json(&body).send().await?;
        check(resp).await.map(|_| ())
    }

    /// Log in and remember the returned token for later calls.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<LoginResponse, SdkError> {
        let resp = self
            .client
            .post(self.url("/api/login"))
            .json(&LoginBody { email, password })
            .send()
            .await?;
        let login: LoginResponse = parse(resp).await?;
        self.token = Some(login.token.clone());
        Ok(login)
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, SdkError> {
        let req = self.authed(self.client.post(self.url("/api/tasks"))).json(task);
        parse(req.send().await?).await
    }

    pub async fn list_tasks(&self, page: Option<u32>, page_size: Option<u32>) -> Result<Vec<Task>, SdkError> {
        let mut query = Vec::new();
        if let Some(page) = page {
            query.push(("page", page.to_string()));
        }
        if let Some(size) = page_size {
            query.push(("page_size", size.to_string()));
        }
        let req = self.authed(self.client.get(self.url("/api/tasks"))).query(&query);
        parse(req.send().await?).await
    }

    pub async fn get_task(&self, id: i64) -> Result<Task, SdkError> {
        let req = self.authed(self.client.get(self.url(&format!("/api/tasks/{}", id))));
        parse(req.send().await?).await
    }

    pub async fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<Task, SdkError> {
        let req = self
            .authed(self.client.put(self.url(&format!("/api/tasks/{}", id))))
            .json(update);
        parse(req.send().await?).await
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), SdkError> {
        let req = self.authed(self.client.delete(self.url(&format!("/api/tasks/{}", id))));
        check(req.send().await?).await.map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

async fn check(resp: Response) -> Result<Response, SdkError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await?;
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(text);

    Err(SdkError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, SdkError> {
    Ok(check(resp).await?.json::<T>().await?)
}
