//! Group command - print every row of a grouped library.

use crate::app::App;
use crate::OutputFormat;
use sift_core::{Config, IndexEngine, RowNode};
use std::path::Path;

/// Run the group command.
pub fn run(config: Config, library: &Path, output: OutputFormat) -> anyhow::Result<()> {
    let app = App::with_library(config, library)?;
    let engine = &app.engine;

    match output {
        OutputFormat::Text => {
            print_header(engine);

            for row in 0..engine.row_count() {
                if let Some(node) = engine.node_at_row(row) {
                    println!("{}", format_row(engine, node));
                }
            }

            let stats = engine.stats();
            eprintln!();
            eprintln!(
                "{} groups over {} items ({} batches applied)",
                stats.node_count, stats.item_count, stats.batches_applied
            );
            if let Some(applied) = stats.last_applied {
                eprintln!("Last applied: {}", applied.format("%Y-%m-%d %H:%M:%S"));
            }
        }
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = (0..engine.row_count())
                .filter_map(|row| engine.node_at_row(row).map(|node| (row, node)))
                .map(|(row, node)| match node {
                    RowNode::Summary(summary) => serde_json::json!({
                        "row": row,
                        "summary": true,
                        "display": summary.labels(),
                        "unique": summary.unique_counts(),
                    }),
                    RowNode::Group(group) => serde_json::json!({
                        "row": row,
                        "key": group.key().to_string(),
                        "display": group.display_columns(),
                        "members": group.members(),
                    }),
                })
                .collect();

            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }

    Ok(())
}

fn print_header(engine: &IndexEngine) {
    let names: Vec<&str> = engine.columns().iter().map(|c| c.name.as_str()).collect();
    println!("{:<48} {:>8}", names.join(" | "), "Items");
    println!("{}", "-".repeat(57));
}

/// One text line for a row: display values joined, then the member count.
pub fn format_row(engine: &IndexEngine, node: RowNode<'_>) -> String {
    let values: Vec<&str> = (0..engine.columns().len())
        .map(|column| node.column(column))
        .collect();

    match node {
        RowNode::Summary(_) => format!("{:<48} {:>8}", values.join(" | "), engine.item_count()),
        RowNode::Group(group) => format!("{:<48} {:>8}", values.join(" | "), group.member_count()),
    }
}
