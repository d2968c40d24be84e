//! Command-line entry point: build a feature matrix from Parquet sources.
//!
//! Usage:
//!   build_matrix <data-root> <registry.json> <variables.json> \
//!                <roster.parquet> <id-col> <date-col> <output.parquet>
//!
//! The data root holds one directory per database, each containing
//! `<table>.parquet` files.

use std::path::Path;

use anyhow::Context;

use cohort_matrix::matrix::Roster;
use cohort_matrix::source::parquet::{read_parquet_table, write_parquet_table};
use cohort_matrix::{ParquetSource, SchemaRegistry, VariableDictionary, build_feature_matrix};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 8 {
        eprintln!(
            "usage: {} <data-root> <registry.json> <variables.json> \
             <roster.parquet> <id-col> <date-col> <output.parquet>",
            args.first().map_or("build_matrix", String::as_str)
        );
        std::process::exit(2);
    }
    let [_, data_root, registry_path, variables_path, roster_path, id_col, date_col, output_path] =
        args.as_slice()
    else {
        unreachable!("argument count checked above");
    };

    let registry = SchemaRegistry::load(Path::new(registry_path))
        .with_context(|| format!("loading schema registry from {registry_path}"))?;
    let dictionary = VariableDictionary::load(Path::new(variables_path))
        .with_context(|| format!("loading variable dictionary from {variables_path}"))?;

    let roster_batch = read_parquet_table(Path::new(roster_path), None, None)
        .with_context(|| format!("reading roster from {roster_path}"))?;
    let roster = Roster::from_batch(&roster_batch, id_col, date_col)
        .context("building roster from id and index-date columns")?;
    log::info!("roster holds {} subject(s)", roster.len());

    let source = ParquetSource::new(data_root);
    let matrix = build_feature_matrix(&source, &registry, &dictionary, &roster)
        .context("building feature matrix")?;

    let batch = matrix.to_record_batch()?;
    write_parquet_table(Path::new(output_path), &batch)
        .with_context(|| format!("writing matrix to {output_path}"))?;
    log::info!(
        "wrote {} row(s) x {} column(s) to {output_path}",
        batch.num_rows(),
        batch.num_columns()
    );
    Ok(())
}
