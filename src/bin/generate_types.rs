//! Writes the bridge message contract for the browser extension:
//! TypeScript declarations and a JSON Schema bundle.
//!
//! Usage: `generate_types [out_dir]` (default: `bindings/`)

use std::path::PathBuf;

use anyhow::{Context, Result};
use schemars::schema_for;
use ts_rs::TS;

use claimflow::bridge::{
    AutomationStatus, BridgeMessage, FillingStatus, PayloadStored, StorePayload,
};

const TS_FILE: &str = "bridge-messages.ts";
const SCHEMA_FILE: &str = "bridge-messages.schema.json";

fn typescript() -> String {
    let decls = [
        StorePayload::decl(),
        PayloadStored::decl(),
        FillingStatus::decl(),
        BridgeMessage::decl(),
        AutomationStatus::decl(),
    ];

    let mut output = String::from("// Generated by generate_types. Do not edit.\n\n");
    for decl in decls {
        output.push_str("export ");
        output.push_str(&decl);
        output.push_str("\n\n");
    }
    output
}

fn schemas() -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "BridgeMessage": serde_json::to_value(schema_for!(BridgeMessage))?,
        "AutomationStatus": serde_json::to_value(schema_for!(AutomationStatus))?,
    }))
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("bindings"), PathBuf::from);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let ts_path = out_dir.join(TS_FILE);
    std::fs::write(&ts_path, typescript())
        .with_context(|| format!("Failed to write {}", ts_path.display()))?;

    let schema_path = out_dir.join(SCHEMA_FILE);
    std::fs::write(&schema_path, serde_json::to_string_pretty(&schemas()?)?)
        .with_context(|| format!("Failed to write {}", schema_path.display()))?;

    println!("Wrote {}", ts_path.display());
    println!("Wrote {}", schema_path.display());
    Ok(())
}
