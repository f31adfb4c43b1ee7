use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

use crate::config::Config;
use crate::models::{Question, QuestionSeed};
use crate::stores::QuestionCatalog;

fn parse_seed(contents: &str) -> Result<Vec<Question>> {
    let seeds: Vec<QuestionSeed> =
        serde_json::from_str(contents).context("Failed to deserialize question seed payload")?;
    Ok(seeds.into_iter().map(QuestionSeed::into_question).collect())
}

/// Loads `catalog.seed_file` into an empty catalog. A catalog that already
/// holds questions is left untouched. Returns the number of inserted questions.
pub async fn bootstrap(config: &Config, catalog: &dyn QuestionCatalog) -> Result<usize> {
    let path = match &config.catalog_seed_file {
        Some(path) => Path::new(path),
        None => {
            tracing::debug!("No catalog seed file configured, skipping bootstrap");
            return Ok(0);
        }
    };

    if !path.exists() {
        tracing::warn!(
            "Catalog seed file {} not found, skipping bootstrap",
            path.display()
        );
        return Ok(0);
    }

    let existing = catalog
        .count()
        .await
        .context("Failed to count catalog questions")?;
    if existing > 0 {
        tracing::info!("Catalog already holds {} questions, seed skipped", existing);
        return Ok(0);
    }

    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read catalog seed file {}", path.display()))?;
    let questions = parse_seed(&contents)?;

    let inserted = catalog
        .insert_many(questions)
        .await
        .context("Failed to insert seed questions")?;
    tracing::info!("Seeded catalog with {} questions from {}", inserted, path.display());
    Ok(inserted)
}
