//! Users Demo
//!
//! Declares a small user-management API with Trellis route groups, binds it
//! against the reference route table and drives it with scripted requests.
//!
//! # Route Groups
//!
//! ```text
//! public    (public=true)                     POST /users/register
//!                                             POST /users/login
//! protected (protected=true, prefix=/api/v1)  GET  /api/v1/users/me
//!                                             GET|PUT|DELETE /api/v1/users/:id
//!                                             POST /api/v1/users/:id/change-password
//!                                             GET  /api/v1/users
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package users-demo -- --log-level debug
//! cargo run --package users-demo -- --routes
//! ```

mod client;
mod requests;
mod routes;
mod service;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use serde_json::{Value, json};
use tracing::{info, warn};
use trellis::runtime::TrellisRuntime;
use trellis::runtime::config::{ConfigLoader, LogLevel, validate_config};

use crate::client::Client;
use crate::service::{InMemoryUserService, UserService};

#[derive(Debug, Parser)]
#[command(name = "users-demo", about = "Trellis user management demo")]
struct Args {
    /// Configuration file to load instead of searching the current directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured log level.
    #[arg(short, long)]
    log_level: Option<LogLevel>,

    /// Print the bound routes as JSON and exit.
    #[arg(long)]
    routes: bool,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_current_dir();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    let mut config = loader.load().context("loading configuration")?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    validate_config(&config)?;

    let runtime = TrellisRuntime::from_config(config);
    runtime.init_logging();

    let users: Arc<dyn UserService> = Arc::new(InMemoryUserService::new());
    service::seed(users.as_ref()).context("seeding sample users")?;

    runtime.register_group(routes::user_routes());
    runtime.bind(&requests::dependencies(Arc::clone(&users)))?;

    if args.routes {
        println!("{}", serde_json::to_string_pretty(&runtime.routes())?);
        return Ok(());
    }

    run_script(&runtime, users).await
}

// ============================================================================
// Scripted Session
// ============================================================================

async fn run_script(runtime: &TrellisRuntime, users: Arc<dyn UserService>) -> Result<()> {
    let mut client = Client::new(runtime, users);

    step(
        &client,
        "POST",
        "/users/register",
        json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "Alice1234",
            "full_name": "Alice Liddell",
            "role": "user",
        }),
    )
    .await;

    // Protected route before logging in.
    step(&client, "GET", "/api/v1/users/me", Value::Null).await;

    let login = step(
        &client,
        "POST",
        "/users/login",
        json!({ "username": "alice", "password": "Alice1234" }),
    )
    .await;
    let token = login.body["token"].as_str().map(str::to_string);
    let id = login.body["user"]["id"]
        .as_u64()
        .context("login response has no user id")?;
    client.set_token(token);

    step(&client, "GET", "/api/v1/users/me", Value::Null).await;
    step(
        &client,
        "PUT",
        &format!("/api/v1/users/{id}"),
        json!({ "full_name": "Alice L." }),
    )
    .await;
    step(
        &client,
        "POST",
        &format!("/api/v1/users/{id}/change-password"),
        json!({ "old_password": "Alice1234", "new_password": "Wonderland1" }),
    )
    .await;
    step(&client, "GET", "/api/v1/users", json!({ "limit": 2 })).await;

    // Someone else's account, an unknown user and an unsupported method.
    step(&client, "DELETE", "/api/v1/users/1", Value::Null).await;
    step(&client, "GET", "/api/v1/users/999", Value::Null).await;
    step(&client, "PATCH", &format!("/api/v1/users/{id}"), Value::Null).await;

    step(&client, "DELETE", &format!("/api/v1/users/{id}"), Value::Null).await;

    info!("Scripted session finished");
    Ok(())
}

async fn step(client: &Client<'_>, method: &str, path: &str, body: Value) -> client::Response {
    println!("→ {method} {path}");
    let response = client.send(method, path, body).await;
    let rendered = serde_json::to_string_pretty(&response.body).unwrap_or_default();
    println!("← {} {rendered}\n", response.status);
    if !response.is_success() {
        warn!(%method, %path, status = response.status, "Request failed");
    }
    response
}
