use tracing::{info, instrument, warn};

use crate::db::{DbError, SeriesRepository};
use crate::importers::{CpiTableImporter, TableImportError};

/// Categories published on the CPI data page, in the order their tables are
/// linked. Pairing is positional.
pub const CATEGORIES: [&str; 4] = [
    "goods_and_services",
    "food_products",
    "non_food_products",
    "services",
];

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("Expected {expected} table links, found {actual}")]
    LinkCountMismatch { expected: usize, actual: usize },

    #[error("Failed to import table: {0}")]
    Import(#[from] TableImportError),

    #[error("Failed to store series: {0}")]
    Db(#[from] DbError),
}

/// Pair each category with its table link positionally. Fewer links than
/// categories would silently drop trailing categories under a plain zip, so
/// that case is a hard error; surplus links are ignored with a warning.
pub fn pair_links(links: &[String]) -> Result<Vec<(&'static str, &str)>, UpdateError> {
    if links.len() < CATEGORIES.len() {
        return Err(UpdateError::LinkCountMismatch {
            expected: CATEGORIES.len(),
            actual: links.len(),
        });
    }
    if links.len() > CATEGORIES.len() {
        warn!(
            "Found {} table links but only {} categories; ignoring the extras",
            links.len(),
            CATEGORIES.len()
        );
    }
    Ok(CATEGORIES
        .iter()
        .copied()
        .zip(links.iter().map(String::as_str))
        .collect())
}

/// Import every category's table and store the resulting series. Fails fast
/// on the first error; returns the total number of stored points.
#[instrument(skip(importer, repo, links), fields(links = links.len()))]
pub async fn update_all(
    importer: &CpiTableImporter,
    repo: &SeriesRepository,
    links: &[String],
) -> Result<u64, UpdateError> {
    let pairs = pair_links(links)?;
    let mut total = 0;
    for (category, link) in pairs {
        info!("Updating CPI series for {}", category);
        let series = importer.fetch_series(link).await?;
        let stored = repo.insert_series(category, &series).await?;
        info!("Stored {} points for {}", stored, category);
        total += stored;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_links_exact() {
        let links: Vec<String> = (0..4).map(|i| format!("https://example/t{i}.xlsx")).collect();
        let pairs = pair_links(&links).unwrap();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0], ("goods_and_services", links[0].as_str()));
        assert_eq!(pairs[3], ("services", links[3].as_str()));
    }

    #[test]
    fn test_pair_links_too_few() {
        let links: Vec<String> = (0..3).map(|i| format!("https://example/t{i}.xlsx")).collect();
        match pair_links(&links) {
            Err(UpdateError::LinkCountMismatch { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected LinkCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_pair_links_ignores_surplus() {
        let links: Vec<String> = (0..6).map(|i| format!("https://example/t{i}.xlsx")).collect();
        let pairs = pair_links(&links).unwrap();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[3], ("services", links[3].as_str()));
    }
}
