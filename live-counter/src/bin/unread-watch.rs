use anyhow::{Context, Result};
use clap::Parser;
use live_counter::{HttpCountSource, Id, LiveCounter, SseChannel};
use log::*;
use reqwest::{redirect, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Name of the session id cookie the BFF sets.
const SESSION_COOKIE: &str = "id";

#[derive(Parser)]
#[command(name = "unread-watch")]
#[command(about = "Logs in to the BFF and prints the live unread message count")]
struct Cli {
    /// Base URL of the BFF (e.g., http://localhost:4000)
    #[arg(long, env = "UNREAD_WATCH_BASE_URL", default_value = "http://localhost:4000")]
    base_url: String,

    #[arg(long, env = "UNREAD_WATCH_EMAIL")]
    email: String,

    #[arg(long, env = "UNREAD_WATCH_PASSWORD")]
    password: String,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Serialize)]
struct LoginForm<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct SessionView {
    is_authenticated: bool,
    subject_id: Option<Id>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();

    let base_url = cli.base_url.trim_end_matches('/');

    // Redirects are the BFF's answer to login, so they are inspected, not followed.
    let client = Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()?;

    let session_cookie = login(&client, base_url, &cli.email, &cli.password).await?;
    let subject_id = current_subject(&client, base_url).await?;
    println!("Signed in as {subject_id}");

    let counter = LiveCounter::mount(
        subject_id,
        Arc::new(HttpCountSource::new(client.clone(), base_url)),
        Arc::new(SseChannel::new(
            base_url,
            &format!("{SESSION_COOKIE}={session_cookie}"),
        )),
    );
    let mut count = counter.watch();
    println!("Unread: {}", counter.count());

    loop {
        tokio::select! {
            changed = count.changed() => {
                if changed.is_err() {
                    warn!("Counter stopped");
                    break;
                }
                println!("Unread: {}", *count.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    counter.unmount().await;

    if let Err(e) = client.post(format!("{base_url}/logout")).send().await {
        warn!("Logout failed: {e}");
    }

    Ok(())
}

async fn login(client: &Client, base_url: &str, email: &str, password: &str) -> Result<String> {
    let response = client
        .post(format!("{base_url}/login"))
        .form(&LoginForm { email, password })
        .send()
        .await
        .context("Failed to send login request")?;

    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if response.status() != StatusCode::SEE_OTHER || location.starts_with("/login") {
        anyhow::bail!("Login failed: {} (redirected to {location:?})", response.status());
    }

    debug!("Login redirected to {location}");

    let session_cookie = response
        .cookies()
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .context("No session cookie in response")?
        .value()
        .to_string();

    Ok(session_cookie)
}

async fn current_subject(client: &Client, base_url: &str) -> Result<Id> {
    let session: SessionView = client
        .get(format!("{base_url}/session"))
        .send()
        .await
        .context("Failed to fetch session")?
        .json()
        .await
        .context("Failed to parse session response")?;

    if !session.is_authenticated {
        anyhow::bail!("Session is not authenticated after login");
    }

    session.subject_id.context("Session has no subject id")
}
