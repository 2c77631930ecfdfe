//! mdbase - materialize Obsidian Bases into Markdown tables.
//!
//! A Base is a declarative YAML description of tables over a note
//! vault: filters, named formulas, and views. This crate evaluates
//! the JS-flavored expression language those definitions use, builds
//! a per-file scope (file metadata, frontmatter, memoized formulas),
//! applies the and/or/not filter algebra, and renders the selected
//! view as a Markdown table.
//!
//! # Example
//!
//! ```no_run
//! use mdbase::{BaseDef, Vault};
//!
//! let vault = Vault::new("/path/to/vault").unwrap();
//! let base = BaseDef::from_yaml_str("views:\n  - type: table\n    name: All\n").unwrap();
//! let files = vault.load_files(true).unwrap();
//! let result = mdbase::table::materialize(&base, Some("All"), &files).unwrap();
//! for row in &result.rows {
//!     println!("{}", row.join(" | "));
//! }
//! ```

pub mod base;
pub mod cli;
pub mod config;
pub mod duration;
pub mod error;
pub mod expr;
pub mod file;
pub mod filter;
pub mod format;
pub mod globals;
pub mod parser;
pub mod scope;
pub mod table;
pub mod value;
pub mod vault;

// Re-export main types at crate root
pub use base::{BaseDef, FilterNode, ViewDef};
pub use error::{BaseError, Result};
pub use file::FileRecord;
pub use scope::Scope;
pub use value::Value;
pub use vault::Vault;
