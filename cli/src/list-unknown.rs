//! Lists the devices of a captured wifi-session snapshot that are in
//! neither registry. Prints the vendor behind each OUI assignment when a
//! vendor database is available, plus a ready-to-paste registry line.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;

use lib_presence::core::engine::PresenceEngine;
use lib_presence::core::locations::LocationResolver;
use lib_presence::registry::master::FileMasterRegistry;
use lib_presence::registry::user::PersistentUserRegistry;

#[derive(Parser)]
#[clap(about = "List unregistered devices from a captured wifi session snapshot", version)]
struct Args {
    /// Path to the curated master registry JSON file.
    #[clap(long, default_value = "masterDb.json")]
    master_file: PathBuf,

    /// Path to the self-service user registry JSON file.
    #[clap(long, default_value = "userDb.json")]
    user_file: PathBuf,

    /// Captured snapshot document (session id -> session JSON).
    #[clap(long)]
    snapshot: PathBuf,

    /// OUI vendor database, one "ABCDEF VendorName" line per assignment.
    #[clap(long, default_value = "macVendorDb.csv")]
    vendor_db: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let master = Arc::new(FileMasterRegistry::load(&args.master_file)?);
    let user = Arc::new(PersistentUserRegistry::load(&args.user_file)?);
    let engine = PresenceEngine::new(LocationResolver::new(Vec::new()), master, user);

    let raw = fs::read(&args.snapshot)
        .with_context(|| format!("unable to read snapshot {}", args.snapshot.display()))?;
    let sessions = engine.parse_snapshot(&raw).context("snapshot did not parse")?;

    let vendors = if args.vendor_db.exists() {
        load_vendor_db(&args.vendor_db)?
    } else {
        HashMap::new()
    };

    for session in engine.unknown_sessions(&sessions) {
        // e.g. "5c:51:4f:..." -> assignment "5C514F"
        let assignment: String = session
            .mac
            .chars()
            .take(8)
            .filter(|c| *c != ':')
            .collect::<String>()
            .to_uppercase();
        let vendor = vendors.get(&assignment).map(String::as_str).unwrap_or("Unknown");

        println!("{} {}", session.mac.blue().bold(), vendor);
        println!("-> {} // {}", session.ip, session.ipv6.join(", "));
        println!(
            "\"{}\":{{\"name\": \"{}\", \"device-type\": \"\", \"visibility\": \"ignore\"}},",
            session.mac, vendor
        );
        println!();
    }

    Ok(())
}

fn load_vendor_db(path: &PathBuf) -> Result<HashMap<String, String>> {
    let mut vendors = HashMap::new();
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read vendor db {}", path.display()))?;
    for line in content.lines() {
        if line.len() > 7 {
            vendors.insert(line[0..6].to_string(), line[7..].to_string());
        }
    }
    Ok(vendors)
}
