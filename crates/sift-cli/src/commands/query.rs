//! Query command - filter groups by display value.

use crate::app::App;
use crate::OutputFormat;
use sift_core::{parse_query, Config};
use std::path::Path;
use std::time::Instant;

/// Run the query command.
pub fn run(
    config: Config,
    library: &Path,
    pattern: &str,
    limit: usize,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let app = App::with_library(config, library)?;

    if app.engine.is_empty() {
        eprintln!("Library is empty.");
        return Ok(());
    }

    let query = parse_query(pattern)?;

    let start = Instant::now();
    let results = app.engine.filter(&query);
    let elapsed = start.elapsed();

    match output {
        OutputFormat::Text => {
            for node in results.iter().take(limit) {
                let values: Vec<&str> = (0..app.engine.columns().len())
                    .map(|column| node.column(column))
                    .collect();
                println!("{} ({} items)", values.join(" | "), node.member_count());
            }

            eprintln!();
            eprintln!(
                "Found {} of {} groups in {:.3}ms",
                results.len(),
                app.engine.len(),
                elapsed.as_secs_f64() * 1000.0
            );
        }
        OutputFormat::Json => {
            let json_results: Vec<serde_json::Value> = results
                .iter()
                .take(limit)
                .map(|node| {
                    serde_json::json!({
                        "key": node.key().to_string(),
                        "display": node.display_columns(),
                        "members": node.members(),
                        "row": app.engine.row_of(&sift_core::NodeRef::Group(node.key().clone())),
                    })
                })
                .collect();

            println!("{}", serde_json::to_string_pretty(&json_results)?);
        }
    }

    Ok(())
}
