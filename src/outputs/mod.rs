//! Output helpers for the files every job writes.
//!
//! # Submodules
//!
//! - [`json`]: pretty JSON written atomically, plus typed JSON reads
//! - [`archive`]: gzipped page HTML kept next to extracted articles
//!
//! # Output Structure (download job)
//!
//! ```text
//! output_dir/
//! ├── <refId>.json           # extracted article, written last
//! ├── <refId>.html.gz        # page HTML the article came from
//! ├── <refId>.pdf            # PDF links are stored as-is
//! └── _domain_failures.json  # failure counts carried across runs
//! ```

pub mod archive;
pub mod json;
