//! Core functionality: embedding extraction, similarity search, asset download

/// One-shot bulk download of the encoder checkpoint, catalog, and bank.
pub mod download;
/// Image embeddings from a pretrained TorchScript encoder.
#[cfg(feature = "embeddings")]
pub mod embeddings;
/// Brute-force nearest-neighbor search over the precomputed bank.
#[cfg(feature = "embeddings")]
pub mod search;
