//! Application state management.

use anyhow::{bail, Context};
use sift_core::{Config, IndexEngine, Item, ItemId};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// How long a full library grouping may take before we give up.
const LOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Shared application state.
pub struct App {
    /// Configuration
    pub config: Config,

    /// The grouped index
    pub engine: IndexEngine,

    /// Loaded items by id, for showing member details
    pub items: HashMap<ItemId, Item>,
}

impl App {
    /// Create a new application instance with an empty index.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let engine = IndexEngine::from_config(&config)?;

        Ok(App {
            config,
            engine,
            items: HashMap::new(),
        })
    }

    /// Create an application and group the library at `path`.
    pub fn with_library(config: Config, path: &Path) -> anyhow::Result<Self> {
        let mut app = App::new(config)?;
        app.load_library(path)?;
        Ok(app)
    }

    /// Replace the index contents with the library at `path`.
    pub fn load_library(&mut self, path: &Path) -> anyhow::Result<()> {
        let items = read_library(path)?;
        let count = items.len();
        let start = Instant::now();

        self.items = items.iter().map(|item| (item.id, item.clone())).collect();
        self.engine
            .reset(self.config.grouping.columns.clone(), items);

        if !self.engine.wait_idle(LOAD_TIMEOUT) {
            bail!("Grouping {} did not finish in time", path.display());
        }

        info!(
            library = %path.display(),
            items = count,
            groups = self.engine.len(),
            took_ms = start.elapsed().as_millis() as u64,
            "Library grouped"
        );

        Ok(())
    }

    /// Short human-readable description of an item.
    pub fn describe(&self, id: ItemId) -> String {
        match self.items.get(&id) {
            Some(item) => item
                .field("title")
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{}", id)),
            None => format!("#{}", id),
        }
    }
}

/// Read a JSON library file.
pub fn read_library(path: &Path) -> anyhow::Result<Vec<Item>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read library {}", path.display()))?;
    let items: Vec<Item> = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid library file {}", path.display()))?;
    Ok(items)
}
