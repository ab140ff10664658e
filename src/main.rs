//! tourcache CLI - offline-first cache for motorcycle tour data.
//!
//! Commands work against the local cache whenever possible; only `login`,
//! `sync`, and selection writes need the network.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tourcache::auth::{CredentialStore, Session};
use tourcache::models::{Accommodation, DocumentKind};
use tourcache::utils::format_cost;
use tourcache::{ApiClient, CacheStore, Config, ConnectivityObserver, SyncEngine};

const USAGE: &str = "\
tourcache - offline-first cache for motorcycle tour data

Usage:
  tourcache tour <tour-id> [api-base-url]   select the tour to cache
  tourcache login [username]                sign in and store credentials
  tourcache sync [--force]                  refresh the cache if stale
  tourcache status                          show cache age and sync state
  tourcache riders                          list the cached roster
  tourcache announcements                   list cached announcements
  tourcache selections                      show cached night selections
  tourcache documents                       show cached document uploads
  tourcache signout                         clear session, credentials, cache

Set RUST_LOG (e.g. RUST_LOG=debug) to control log output.";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("status");

    match command {
        "tour" => {
            let tour_id = args.get(2).context("Usage: tourcache tour <tour-id> [api-base-url]")?;
            cmd_tour(tour_id, args.get(3).map(String::as_str))
        }
        "login" => cmd_login(args.get(2).map(String::as_str)).await,
        "sync" => cmd_sync(args.get(2).map(String::as_str) == Some("--force")).await,
        "status" => cmd_status(),
        "riders" => cmd_riders(),
        "announcements" => cmd_announcements(),
        "selections" => cmd_selections(),
        "documents" => cmd_documents(),
        "signout" => cmd_signout(),
        "--help" | "-h" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

fn cmd_tour(tour_id: &str, api_base_url: Option<&str>) -> Result<()> {
    let mut config = Config::load()?;
    config.tour_id = Some(tour_id.to_string());
    if let Some(url) = api_base_url {
        config.api_base_url = Some(url.trim_end_matches('/').to_string());
    }
    config.save()?;
    println!("Tour set to {}", tour_id);
    Ok(())
}

async fn cmd_login(username_arg: Option<&str>) -> Result<()> {
    let mut config = Config::load()?;

    let username = match username_arg.map(str::to_string).or_else(|| config.last_username.clone()) {
        Some(name) => name,
        None => {
            print!("Username: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    if username.is_empty() {
        bail!("Username is required");
    }

    let password = if CredentialStore::has_credentials(&username) {
        info!("Using stored credentials for {}", username);
        CredentialStore::get_password(&username)?
    } else {
        rpassword::prompt_password("Password: ")?
    };

    let client = ApiClient::new(config.api_base_url.as_deref())?;
    let session_data = client.authenticate(&username, &password).await?;

    let mut session = Session::new(config.cache_dir()?);
    session.update(session_data);
    session.save()?;

    CredentialStore::store(&username, &password)?;
    config.last_username = Some(username.clone());
    config.save()?;

    println!("Signed in as {}", username);
    Ok(())
}

async fn cmd_sync(force: bool) -> Result<()> {
    let config = Config::load()?;
    let tour_id = config
        .tour_id
        .clone()
        .context("No tour selected; run `tourcache tour <tour-id>` first")?;

    let mut session = Session::new(config.cache_dir()?);
    if !session.load()? {
        bail!("Not signed in (or session expired); run `tourcache login` first");
    }
    let token = session.token().context("Session has no token")?.to_string();
    let user_id = session.user_id().context("Session has no user id")?.to_string();

    let client = ApiClient::new(config.api_base_url.as_deref())?.with_token(token);
    let observer = ConnectivityObserver::start(client.base_url().to_string()).await?;
    let store = Arc::new(CacheStore::new(config.cache_dir()?)?);
    let engine = SyncEngine::new(client, store, tour_id, Some(user_id), observer.subscribe());

    if force {
        engine.refresh().await?;
        println!("Cache refreshed");
    } else if engine.sync_if_stale().await? {
        println!("Cache refreshed");
    } else if !engine.is_online() {
        println!("Offline; serving cached data ({})", engine.store().load_meta().age_display());
    } else {
        println!("Cache is fresh ({})", engine.store().load_meta().age_display());
    }
    Ok(())
}

fn open_store() -> Result<CacheStore> {
    let config = Config::load()?;
    if config.tour_id.is_none() {
        bail!("No tour selected; run `tourcache tour <tour-id>` first");
    }
    CacheStore::new(config.cache_dir()?)
}

fn cmd_status() -> Result<()> {
    let store = open_store()?;
    let meta = store.load_meta();

    println!("Last sync: {}", meta.age_display());
    if let Some(ref user_id) = meta.user_id {
        println!("User:      {}", user_id);
    }
    println!("Stale:     {}", if meta.is_stale() { "yes" } else { "no" });
    println!(
        "Cached:    {} riders, {} nights, {} announcements",
        store.load_roster().map(|r| r.len()).unwrap_or(0),
        store.load_event_config().map(|c| c.len()).unwrap_or(0),
        store.load_announcements().map(|a| a.len()).unwrap_or(0),
    );
    Ok(())
}

fn cmd_riders() -> Result<()> {
    let store = open_store()?;
    let Some(roster) = store.load_roster() else {
        println!("No cached roster; run `tourcache sync` first");
        return Ok(());
    };

    for rider in &roster {
        println!(
            "{:<24} {:<20} {}",
            rider.display_name(),
            rider.motorcycle_display(),
            rider.phone_display().unwrap_or_default(),
        );
    }
    println!("{} riders", roster.len());
    Ok(())
}

fn cmd_announcements() -> Result<()> {
    let store = open_store()?;
    let Some(announcements) = store.load_announcements() else {
        println!("No cached announcements; run `tourcache sync` first");
        return Ok(());
    };

    for a in &announcements {
        println!("[{}] {} ({})", a.priority, a.title, a.created_at.format("%Y-%m-%d %H:%M"));
        if !a.body.is_empty() {
            println!("    {}", a.body);
        }
    }
    Ok(())
}

fn cmd_selections() -> Result<()> {
    let store = open_store()?;
    let Some(selections) = store.load_user_selections() else {
        println!("No cached selections; run `tourcache sync` first");
        return Ok(());
    };
    let config = store.load_event_config().unwrap_or_default();

    for (night_key, selection) in &selections.nights {
        let night = config.get(night_key);
        let location = night
            .and_then(|n| n.location.as_deref())
            .unwrap_or("unknown location");
        let accommodation = match (selection.accommodation, night) {
            (Some(Accommodation::Hotel), Some(n)) => {
                format!("hotel ({})", format_cost(n.hotel.cost))
            }
            (Some(Accommodation::Hotel), None) => "hotel".to_string(),
            (Some(Accommodation::Camping), Some(n)) => {
                format!("camping ({})", format_cost(n.camping.cost))
            }
            (Some(Accommodation::Camping), None) => "camping".to_string(),
            (None, _) => "own arrangement".to_string(),
        };
        println!(
            "{:<12} {:<24} {:<16} dinner: {:<3} breakfast: {}",
            night_key,
            location,
            accommodation,
            if selection.dinner { "yes" } else { "no" },
            if selection.breakfast { "yes" } else { "no" },
        );
        if let Some(ref roommate) = selection.roommate_preference {
            println!("             roommate: {}", roommate);
        }
    }
    Ok(())
}

fn cmd_documents() -> Result<()> {
    let store = open_store()?;
    let documents = store.load_rider_documents().unwrap_or_default();

    for kind in DocumentKind::ALL {
        match documents.get(&kind) {
            Some(upload) => println!(
                "{:<20} {} (uploaded {})",
                kind.to_string(),
                upload.file_name,
                upload.uploaded_at.format("%Y-%m-%d"),
            ),
            None => println!("{:<20} missing", kind.to_string()),
        }
    }
    Ok(())
}

fn cmd_signout() -> Result<()> {
    let config = Config::load()?;

    let mut session = Session::new(config.cache_dir()?);
    let _ = session.load();
    session.clear()?;

    if let Some(ref username) = config.last_username {
        let _ = CredentialStore::delete(username);
    }

    CacheStore::new(config.cache_dir()?)?.clear_all()?;
    println!("Signed out; cache cleared");
    Ok(())
}
