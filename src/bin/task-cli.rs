use clap::{Parser, Subcommand};
use reqwest::RequestBuilder;
use serde_json::{json, Map, Value};

/// Environment variable consulted when `--token` is not given.
const TOKEN_ENV: &str = "TASK_API_TOKEN";

#[derive(Parser)]
#[command(name = "task-cli")]
#[command(about = "Command line client for the task API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Bearer token (falls back to TASK_API_TOKEN)
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        role: Option<String>,
    },
    /// Log in and print a token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Manage tasks
    #[command(subcommand)]
    Tasks(TaskCommands),
}

#[derive(Subcommand)]
enum TaskCommands {
    /// List tasks
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
    },
    /// Show one task
    Get { id: i64 },
    /// Create a task
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// RFC 3339 timestamp
        #[arg(long)]
        due_date: Option<String>,
    },
    /// Update fields of a task (`--due-date ""` clears it)
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        due_date: Option<String>,
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Delete a task
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/').to_string();
    let token = cli.token.or_else(|| std::env::var(TOKEN_ENV).ok());

    let authed = |req: RequestBuilder| match &token {
        Some(token) => req.bearer_auth(token),
        None => req,
    };

    let request = match cli.command {
        Commands::Register {
            username,
            email,
            password,
            role,
        } => {
            let mut body = json!({ "username": username, "email": email, "password": password });
            if let Some(role) = role {
                body["role"] = Value::String(role);
            }
            client.post(format!("{}/api/register", base)).json(&body)
        }
        Commands::Login { email, password } => client
            .post(format!("{}/api/login", base))
            .json(&json!({ "email": email, "password": password })),
        Commands::Tasks(TaskCommands::List { page, page_size }) => {
            let mut query = Vec::new();
            if let Some(page) = page {
                query.push(("page", page.to_string()));
            }
            if let Some(size) = page_size {
                query.push(("page_size", size.to_string()));
            }
            authed(client.get(format!("{}/api/tasks", base))).query(&query)
        }
        Commands::Tasks(TaskCommands::Get { id }) => {
            authed(client.get(format!("{}/api/tasks/{}", base, id)))
        }
        Commands::Tasks(TaskCommands::Create {
            title,
            description,
            category,
            due_date,
        }) => {
            let mut body = Map::new();
            body.insert("title".into(), Value::String(title));
            insert_opt(&mut body, "description", description.map(Value::String));
            insert_opt(&mut body, "category", category.map(Value::String));
            insert_opt(&mut body, "due_date", due_date.map(Value::String));
            authed(client.post(format!("{}/api/tasks", base))).json(&body)
        }
        Commands::Tasks(TaskCommands::Update {
            id,
            title,
            description,
            category,
            due_date,
            completed,
        }) => {
            let mut body = Map::new();
            insert_opt(&mut body, "title", title.map(Value::String));
            insert_opt(&mut body, "description", description.map(Value::String));
            insert_opt(&mut body, "category", category.map(Value::String));
            insert_opt(&mut body, "due_date", due_date.map(Value::String));
            insert_opt(&mut body, "completed", completed.map(Value::Bool));
            authed(client.put(format!("{}/api/tasks/{}", base, id))).json(&body)
        }
        Commands::Tasks(TaskCommands::Delete { id }) => {
            authed(client.delete(format!("{}/api/tasks/{}", base, id)))
        }
    };

    print_response(request.send().await?).await
}

fn insert_opt(body: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        body.insert(key.to_string(), value);
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
