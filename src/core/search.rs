use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{AppError, Result};

/// Metadata stored alongside each bank vector
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BankEntry {
    /// Catalog product identifier
    pub product_id: String,
    /// Source image path the vector was computed from
    pub path: String,
    /// Caption text for the image
    pub caption: String,
}

/// On-disk layout of the serialized embedding bank
#[derive(Debug, Deserialize)]
struct BankFile {
    features: Vec<Vec<f32>>,
    entries: Vec<BankEntry>,
}

/// One search result, scored by cosine similarity
#[derive(Debug, Serialize, Clone)]
pub struct SearchHit {
    /// Catalog product identifier
    pub product_id: String,
    /// Source image path
    pub path: String,
    /// Caption text
    pub caption: String,
    /// Catalog title, when the product id resolves
    pub title: Option<String>,
    /// Cosine similarity against the query
    pub score: f32,
}

/// Precomputed embedding bank plus the product catalog.
///
/// Loaded once at startup and never mutated afterwards. Bank vectors are
/// expected to be L2-normalized, so similarity is a plain dot product.
#[derive(Debug)]
pub struct SearchIndex {
    features: Array2<f32>,
    entries: Vec<BankEntry>,
    catalog: HashMap<String, String>,
}

impl SearchIndex {
    /// Build an index from in-memory parts, validating shapes
    pub fn new(
        features: Array2<f32>,
        entries: Vec<BankEntry>,
        catalog: HashMap<String, String>,
    ) -> Result<Self> {
        if features.nrows() != entries.len() {
            return Err(AppError::Validation(format!(
                "embedding bank has {} vectors but {} entries",
                features.nrows(),
                entries.len()
            )));
        }

        Ok(Self {
            features,
            entries,
            catalog,
        })
    }

    /// Load the bank blob and catalog CSV from disk
    pub fn load<P: AsRef<Path>>(bank_path: P, catalog_path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(bank_path.as_ref())?;
        let bank: BankFile = serde_json::from_str(&raw)?;

        let rows = bank.features.len();
        let dim = bank.features.first().map(|v| v.len()).unwrap_or(0);

        let mut flat = Vec::with_capacity(rows * dim);
        for row in &bank.features {
            if row.len() != dim {
                return Err(AppError::Validation(format!(
                    "embedding bank has mixed vector sizes ({} vs {})",
                    row.len(),
                    dim
                )));
            }
            flat.extend_from_slice(row);
        }

        let features = Array2::from_shape_vec((rows, dim), flat)
            .map_err(|e| AppError::Validation(format!("malformed embedding bank: {}", e)))?;

        let catalog = load_catalog(catalog_path.as_ref())?;

        tracing::info!(
            "Loaded embedding bank: {} vectors of dim {}, {} catalog titles",
            rows,
            dim,
            catalog.len()
        );

        Self::new(features, bank.entries, catalog)
    }

    /// Number of vectors in the bank
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the bank holds no vectors
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the top-k entries by cosine similarity against `query`.
    ///
    /// A brute-force scan: one dense matvec, then a sort. k is clamped to
    /// the bank size. Deterministic for a fixed bank and query.
    pub fn search(&self, query: &Array1<f32>, k: usize) -> Vec<SearchHit> {
        if self.entries.is_empty() || k == 0 {
            return Vec::new();
        }

        let scores = self.features.dot(query);

        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k.min(self.entries.len()));

        ranked
            .into_iter()
            .map(|(idx, score)| {
                let entry = &self.entries[idx];
                SearchHit {
                    product_id: entry.product_id.clone(),
                    path: entry.path.clone(),
                    caption: entry.caption.clone(),
                    title: self.catalog.get(&entry.product_id).cloned(),
                    score,
                }
            })
            .collect()
    }
}

/// Render hits as the numbered text block forwarded to the assistant
pub fn format_hits(hits: &[SearchHit]) -> String {
    let mut lines = Vec::new();

    for (i, hit) in hits.iter().enumerate() {
        lines.push(format!("\n{}. Similarity: {:.3}", i + 1, hit.score));
        lines.push(format!("   Image: {}", hit.path));
        lines.push(format!("   pID: {}", hit.product_id));
        lines.push(format!("   Caption: {}", hit.caption));
        lines.push(format!(
            "   Title: {}",
            hit.title.as_deref().unwrap_or("Not found")
        ));
    }

    lines.join("\n")
}

/// Parse the product catalog CSV into an id -> title map.
///
/// Expects a header row, then `product_id,title` records. Titles may be
/// quoted and contain commas.
pub fn load_catalog(path: &Path) -> Result<HashMap<String, String>> {
    let raw = std::fs::read_to_string(path)?;
    let mut catalog = HashMap::new();

    for line in raw.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        if fields.len() < 2 {
            return Err(AppError::Validation(format!(
                "catalog row has {} fields, expected 2: {:?}",
                fields.len(),
                line
            )));
        }
        catalog.insert(fields[0].clone(), fields[1].clone());
    }

    Ok(catalog)
}

/// Split one CSV line, honoring double-quoted fields with `""` escapes
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields
}
