//! Durable outputs of a pipeline run.
//!
//! # Submodules
//!
//! - [`json`]: writes the processed batch and run metadata as JSON artifacts
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── processed_data.json
//! ├── processed_data.json.dvc   # created by `dvc add`
//! ├── metadata.json
//! └── metadata.json.dvc
//! ```

pub mod json;
