//! Schema command implementation.

use livesync_codec::{EntityKind, SchemaDescription};
use serde::Serialize;
use std::path::Path;

/// Summary of a schema description.
#[derive(Debug, Serialize)]
pub struct SchemaReport {
    /// Entities in name order.
    pub entities: Vec<EntityReport>,
    /// Number of shared typespace entries.
    pub typespace_len: usize,
}

/// One table or reducer.
#[derive(Debug, Serialize)]
pub struct EntityReport {
    /// Entity name.
    pub name: String,
    /// `table` or `reducer`.
    pub kind: &'static str,
    /// Declared arity.
    pub arity: usize,
    /// Columns or arguments in order.
    pub columns: Vec<ColumnReport>,
}

/// One column.
#[derive(Debug, Serialize)]
pub struct ColumnReport {
    /// Column name, or its position when unnamed.
    pub name: String,
    /// Rendered type descriptor.
    #[serde(rename = "type")]
    pub ty: String,
}

/// Builds the report for a parsed schema.
pub fn describe(schema: &SchemaDescription) -> SchemaReport {
    let entities = schema
        .entities
        .iter()
        .map(|(name, entity)| EntityReport {
            name: name.clone(),
            kind: match entity.kind {
                EntityKind::Table => "table",
                EntityKind::Reducer => "reducer",
            },
            arity: entity.arity,
            columns: entity
                .elements
                .iter()
                .enumerate()
                .map(|(i, element)| ColumnReport {
                    name: element.label(i),
                    ty: element.ty.to_string(),
                })
                .collect(),
        })
        .collect();

    SchemaReport {
        entities,
        typespace_len: schema.typespace.len(),
    }
}

/// Runs the schema command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let schema = super::load_schema(path)?;
    let report = describe(&schema);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    Ok(())
}

fn print_text_output(report: &SchemaReport) {
    println!("Schema");
    println!("======");
    for entity in &report.entities {
        println!();
        println!("{} ({}, arity {})", entity.name, entity.kind, entity.arity);
        for column in &entity.columns {
            println!("  {:<16} {}", column.name, column.ty);
        }
    }
    println!();
    println!("Typespace: {} entries", report.typespace_len);
}
