//! pal-deck: keyword deck codec.
//!
//! `generate_deck` turns a canonical [`SimRequest`] into deck text in a chosen
//! unit system; `parse_deck_file` / `parse_deck_str` read a deck back, resolving
//! INCLUDE files and converting every value into canonical units.

pub mod format;
pub mod generate;
pub mod interpret;
pub mod keywords;
pub mod lexer;
pub mod raw;

use std::path::{Path, PathBuf};

use pal_core::UnitSystem;
use pal_model::SimRequest;

pub use keywords::Section;
pub use lexer::SourceLocation;
pub use raw::{RawDeck, MAX_INCLUDE_DEPTH};

pub type DeckResult<T> = Result<T, DeckError>;

#[derive(thiserror::Error, Debug)]
pub enum DeckError {
    #[error("{location}: {}{message}", keyword_prefix(.keyword))]
    Structural {
        location: SourceLocation,
        keyword: Option<String>,
        message: String,
    },

    #[error("{location}: cannot read {}: {source}", .path.display())]
    Include {
        path: PathBuf,
        location: SourceLocation,
        source: std::io::Error,
    },

    #[error("cannot generate deck: {what}")]
    Generate { what: String },
}

fn keyword_prefix(keyword: &Option<String>) -> String {
    match keyword {
        Some(k) => format!("{k}: "),
        None => String::new(),
    }
}

impl DeckError {
    pub fn structural(
        location: SourceLocation,
        keyword: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::Structural {
            location,
            keyword: keyword.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn generate(what: impl Into<String>) -> Self {
        Self::Generate { what: what.into() }
    }
}

/// Generation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckOptions {
    /// Unit system of the emitted deck; must have a deck keyword.
    pub unit_system: UnitSystem,
}

impl Default for DeckOptions {
    fn default() -> Self {
        Self {
            unit_system: UnitSystem::Field,
        }
    }
}

pub fn generate_deck(request: &SimRequest, options: &DeckOptions) -> DeckResult<String> {
    generate::generate(request, options)
}

/// Parse a deck from disk. INCLUDE paths resolve relative to the file that
/// contains them.
pub fn parse_deck_file(path: &Path) -> DeckResult<SimRequest> {
    let deck = raw::parse_raw_file(path)?;
    interpret::interpret(&deck)
}

/// Parse deck text held in memory. Relative INCLUDE paths in `text` resolve
/// against `base_dir` (or the working directory when `None`).
pub fn parse_deck_str(text: &str, base_dir: Option<&Path>) -> DeckResult<SimRequest> {
    let deck = raw::parse_raw_str(text, base_dir)?;
    interpret::interpret(&deck)
}
