//! Replay command - apply an operation script and print change events.
//!
//! A script is a JSON array of operations, applied in order after the
//! library has been grouped:
//!
//! ```json
//! [
//!   { "op": "update", "items": [{ "id": 1, "fields": { "artist": "B" } }] },
//!   { "op": "wait" },
//!   { "op": "remove", "ids": [2] },
//!   { "op": "summary", "enabled": false },
//!   { "op": "reset", "columns": [{ "field": "genre", "name": "Genre" }], "items": [] }
//! ]
//! ```
//!
//! Add, update and reset only queue work; `wait` folds every finished batch
//! in before the next operation. The script always ends with an implicit wait.

use crate::app::App;
use crate::OutputFormat;
use anyhow::{bail, Context};
use serde::Deserialize;
use sift_core::{ChannelObserver, Column, Config, IndexEvent, Item, ItemId, ItemSink};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// One scripted operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Add {
        items: Vec<Item>,
    },
    Update {
        items: Vec<Item>,
    },
    Remove {
        ids: Vec<ItemId>,
    },
    /// Reload everything; without columns the current layout is kept
    Reset {
        #[serde(default)]
        columns: Option<Vec<Column>>,
        items: Vec<Item>,
    },
    RemoveColumn {
        index: usize,
    },
    Summary {
        enabled: bool,
    },
    Decoration {
        id: ItemId,
    },
    Wait,
}

/// Read a script file.
pub fn read_script(path: &Path) -> anyhow::Result<Vec<Operation>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    let script = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid script {}", path.display()))?;
    Ok(script)
}

/// Run the replay command.
pub fn run(config: Config, library: &Path, script: &Path, output: OutputFormat) -> anyhow::Result<()> {
    let operations = read_script(script)?;
    let mut app = App::with_library(config, library)?;

    let (observer, events) = ChannelObserver::new();
    app.engine.subscribe(Arc::new(observer));

    let mut log: Vec<(usize, IndexEvent)> = Vec::new();

    for (step, operation) in operations.into_iter().enumerate() {
        let step = step + 1;
        debug!(step, ?operation, "Replaying operation");
        apply(&mut app, operation)?;
        log.extend(events.try_iter().map(|event| (step, event)));
    }

    if !app.engine.wait_idle(WAIT_TIMEOUT) {
        bail!("Outstanding batches did not finish in time");
    }
    let last = log.last().map(|(step, _)| *step).unwrap_or(0);
    log.extend(events.try_iter().map(|event| (last, event)));

    app.engine.check_consistency()?;

    match output {
        OutputFormat::Text => {
            for (step, event) in &log {
                println!("[{:>3}] {}", step, event);
            }

            eprintln!();
            eprintln!(
                "{} events, {} groups over {} items",
                log.len(),
                app.engine.len(),
                app.engine.item_count()
            );
        }
        OutputFormat::Json => {
            let json_events: Vec<serde_json::Value> = log
                .iter()
                .map(|(step, event)| {
                    serde_json::json!({
                        "step": step,
                        "event": event.to_string(),
                    })
                })
                .collect();

            println!("{}", serde_json::to_string_pretty(&json_events)?);
        }
    }

    Ok(())
}

fn apply(app: &mut App, operation: Operation) -> anyhow::Result<()> {
    let engine = &mut app.engine;

    match operation {
        Operation::Add { items } => engine.items_added(items),
        Operation::Update { items } => engine.items_updated(items),
        Operation::Remove { ids } => engine.items_removed(&ids),
        Operation::Reset {
            columns: Some(columns),
            items,
        } => {
            engine.reset(columns, items);
        }
        Operation::Reset {
            columns: None,
            items,
        } => engine.full_reload(items),
        Operation::RemoveColumn { index } => {
            if !engine.remove_column(index) {
                bail!("No column at index {}", index);
            }
        }
        Operation::Summary { enabled } => engine.set_summary_enabled(enabled),
        Operation::Decoration { id } => {
            engine.decoration_ready(id);
        }
        Operation::Wait => {
            if !engine.wait_idle(WAIT_TIMEOUT) {
                bail!("Outstanding batches did not finish in time");
            }
        }
    }

    Ok(())
}
