//! Raw deck structure: sections, keyword blocks and records, with INCLUDE
//! files spliced in. No interpretation of values happens here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::keywords::{self, Section, Shape};
use crate::lexer::{tokenize, SourceLocation, Token, TokenKind};
use crate::{DeckError, DeckResult};

pub const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Value(String),
    Quoted(String),
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub items: Vec<Item>,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawKeyword {
    pub name: String,
    pub section: Section,
    pub loc: SourceLocation,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawDeck {
    pub keywords: Vec<RawKeyword>,
    pub sections: Vec<Section>,
    /// Location of the last token read, used for errors about absent keywords.
    pub end: SourceLocation,
}

impl RawDeck {
    pub fn in_section(&self, section: Section) -> impl Iterator<Item = &RawKeyword> {
        self.keywords.iter().filter(move |k| k.section == section)
    }

    /// Last occurrence of `name` in `section`.
    pub fn find(&self, section: Section, name: &str) -> Option<&RawKeyword> {
        self.keywords
            .iter()
            .rev()
            .find(|k| k.section == section && k.name == name)
    }
}

struct Frame {
    tokens: std::vec::IntoIter<Token>,
    path: Option<PathBuf>,
}

struct TokenStream {
    frames: Vec<Frame>,
    /// Resolution directory for INCLUDE in text that has no file of its own.
    fallback_dir: Option<PathBuf>,
    last_loc: SourceLocation,
}

impl TokenStream {
    fn next(&mut self) -> Option<Token> {
        loop {
            let frame = self.frames.last_mut()?;
            if let Some(token) = frame.tokens.next() {
                self.last_loc = token.loc.clone();
                return Some(token);
            }
            self.frames.pop();
        }
    }

    fn push_file(&mut self, path: &Path, at: &SourceLocation) -> DeckResult<()> {
        let canonical = path.canonicalize().map_err(|source| DeckError::Include {
            path: path.to_path_buf(),
            location: at.clone(),
            source,
        })?;

        if self.frames.len() > MAX_INCLUDE_DEPTH {
            return Err(DeckError::structural(
                at.clone(),
                Some("INCLUDE"),
                format!("INCLUDE nesting deeper than {MAX_INCLUDE_DEPTH} levels"),
            ));
        }
        if self
            .frames
            .iter()
            .any(|f| f.path.as_deref() == Some(canonical.as_path()))
        {
            return Err(DeckError::structural(
                at.clone(),
                Some("INCLUDE"),
                format!("circular INCLUDE of {}", canonical.display()),
            ));
        }

        let text = std::fs::read_to_string(&canonical).map_err(|source| DeckError::Include {
            path: canonical.clone(),
            location: at.clone(),
            source,
        })?;
        let tokens = tokenize(&text, Some(Arc::new(canonical.clone())))?;
        tracing::debug!(path = %canonical.display(), tokens = tokens.len(), "resolved INCLUDE");
        self.frames.push(Frame {
            tokens: tokens.into_iter(),
            path: Some(canonical),
        });
        Ok(())
    }
}

/// Parse a deck file; INCLUDE paths resolve relative to the including file.
pub fn parse_raw_file(path: &Path) -> DeckResult<RawDeck> {
    let mut stream = TokenStream {
        frames: Vec::new(),
        fallback_dir: None,
        last_loc: SourceLocation::new(None, 0),
    };
    stream.push_file(path, &SourceLocation::new(None, 0))?;
    parse_stream(stream)
}

/// Parse in-memory deck text; INCLUDE paths resolve relative to `base_dir`.
pub fn parse_raw_str(text: &str, base_dir: Option<&Path>) -> DeckResult<RawDeck> {
    let tokens = tokenize(text, None)?;
    let stream = TokenStream {
        frames: vec![Frame {
            tokens: tokens.into_iter(),
            path: None,
        }],
        fallback_dir: base_dir.map(Path::to_path_buf),
        last_loc: SourceLocation::new(None, 0),
    };
    parse_stream(stream)
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Word(w) => format!("'{w}'"),
        TokenKind::Quoted(q) => format!("quoted string '{q}'"),
        TokenKind::Default => "default item".to_string(),
        TokenKind::Slash => "'/'".to_string(),
    }
}

fn read_record(stream: &mut TokenStream, keyword: &str, start: &SourceLocation) -> DeckResult<Record> {
    let mut items = Vec::new();
    let mut loc: Option<SourceLocation> = None;
    loop {
        let Some(token) = stream.next() else {
            return Err(DeckError::structural(
                start.clone(),
                Some(keyword),
                "record is not terminated by '/'",
            ));
        };
        let record_loc = loc.get_or_insert_with(|| token.loc.clone());
        match token.kind {
            TokenKind::Slash => {
                return Ok(Record {
                    items,
                    loc: record_loc.clone(),
                });
            }
            TokenKind::Word(w) => items.push(Item::Value(w)),
            TokenKind::Quoted(q) => items.push(Item::Quoted(q)),
            TokenKind::Default => items.push(Item::Default),
        }
    }
}

fn parse_stream(mut stream: TokenStream) -> DeckResult<RawDeck> {
    let mut deck = RawDeck {
        keywords: Vec::new(),
        sections: Vec::new(),
        end: SourceLocation::new(None, 0),
    };
    let mut section: Option<Section> = None;

    while let Some(token) = stream.next() {
        let loc = token.loc.clone();
        let name = match token.kind {
            TokenKind::Word(w) if keywords::looks_like_keyword(&w) => w,
            other => {
                return Err(DeckError::structural(
                    loc,
                    None,
                    format!("expected a keyword, found {}", describe(&other)),
                ));
            }
        };

        if name == "INCLUDE" {
            let record = read_record(&mut stream, &name, &loc)?;
            let target = match record.items.first() {
                Some(Item::Quoted(p)) | Some(Item::Value(p)) => PathBuf::from(p),
                _ => {
                    return Err(DeckError::structural(
                        loc,
                        Some("INCLUDE"),
                        "INCLUDE requires a file path",
                    ));
                }
            };
            let resolved = if target.is_absolute() {
                target
            } else {
                match loc.base_dir().or(stream.fallback_dir.as_deref()) {
                    Some(dir) => dir.join(target),
                    None => target,
                }
            };
            stream.push_file(&resolved, &loc)?;
            continue;
        }

        if let Some(next) = Section::from_keyword(&name) {
            match section {
                None if next != Section::Runspec => {
                    return Err(DeckError::structural(
                        loc,
                        Some(&name),
                        "deck must start with RUNSPEC",
                    ));
                }
                Some(current) if next <= current => {
                    return Err(DeckError::structural(
                        loc,
                        Some(&name),
                        format!("section {next} appears after {current}"),
                    ));
                }
                _ => {}
            }
            section = Some(next);
            deck.sections.push(next);
            continue;
        }

        let Some(current) = section else {
            return Err(DeckError::structural(
                loc,
                Some(&name),
                "keyword appears before RUNSPEC",
            ));
        };

        if name == "END" {
            break;
        }

        let Some(spec) = keywords::lookup(&name, Some(current)) else {
            return Err(DeckError::structural(
                loc,
                Some(&name),
                format!("unsupported keyword in {current}"),
            ));
        };
        if !spec.sections.contains(&current) {
            return Err(DeckError::structural(
                loc,
                Some(&name),
                format!("keyword is not allowed in {current}"),
            ));
        }

        let records = match spec.shape {
            Shape::Flag => Vec::new(),
            Shape::Single => vec![read_record(&mut stream, &name, &loc)?],
            Shape::Multi => {
                let mut records = Vec::new();
                loop {
                    let record = read_record(&mut stream, &name, &loc)?;
                    if record.items.is_empty() {
                        break;
                    }
                    records.push(record);
                }
                records
            }
        };

        deck.keywords.push(RawKeyword {
            name,
            section: current,
            loc,
            records,
        });
    }

    deck.end = stream.last_loc.clone();
    for required in Section::REQUIRED {
        if !deck.sections.contains(&required) {
            return Err(DeckError::structural(
                deck.end.clone(),
                Some(required.keyword()),
                "required section is missing",
            ));
        }
    }

    Ok(deck)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "RUNSPEC\nDIMENS\n 2 1 1 /\nGRID\nPORO\n 2*0.2 /\nPROPS\nSOLUTION\nSCHEDULE\nTSTEP\n 10 /\nEND\n";

    #[test]
    fn sections_and_records_are_collected() {
        let deck = parse_raw_str(MINIMAL, None).unwrap();
        assert_eq!(
            deck.sections,
            vec![
                Section::Runspec,
                Section::Grid,
                Section::Props,
                Section::Solution,
                Section::Schedule
            ]
        );
        let poro = deck.keywords.iter().find(|k| k.name == "PORO").unwrap();
        assert_eq!(poro.records[0].items.len(), 2);
        assert_eq!(poro.section, Section::Grid);
    }

    #[test]
    fn out_of_order_section_is_structural() {
        let text = "RUNSPEC\nPROPS\nGRID\nSOLUTION\nSCHEDULE\n";
        let err = parse_raw_str(text, None).unwrap_err();
        assert!(err.to_string().contains("appears after"), "{err}");
    }

    #[test]
    fn keyword_in_wrong_section_is_structural() {
        let text = "RUNSPEC\nGRID\nEQUIL\n 1 2 3 /\nPROPS\nSOLUTION\nSCHEDULE\n";
        let err = parse_raw_str(text, None).unwrap_err();
        assert!(err.to_string().contains("EQUIL"), "{err}");
    }

    #[test]
    fn unknown_keyword_is_not_skipped() {
        let text = "RUNSPEC\nFOOBAR\nGRID\nPROPS\nSOLUTION\nSCHEDULE\n";
        let err = parse_raw_str(text, None).unwrap_err();
        assert!(err.to_string().contains("FOOBAR"), "{err}");
    }

    #[test]
    fn missing_section_is_reported() {
        let text = "RUNSPEC\nGRID\nPROPS\nSOLUTION\n";
        let err = parse_raw_str(text, None).unwrap_err();
        assert!(err.to_string().contains("SCHEDULE"), "{err}");
    }

    #[test]
    fn multi_record_keyword_stops_at_empty_record() {
        let text = "RUNSPEC\nGRID\nPROPS\nSOLUTION\nSCHEDULE\nWELSPECS\n'P1' 'G' 1 1 1* 'OIL' /\n'P2' 'G' 2 1 1* 'OIL' /\n/\nTSTEP\n1 /\n";
        let deck = parse_raw_str(text, None).unwrap();
        let welspecs = deck.keywords.iter().find(|k| k.name == "WELSPECS").unwrap();
        assert_eq!(welspecs.records.len(), 2);
        assert_eq!(welspecs.records[0].items[4], Item::Default);
    }

    #[test]
    fn unterminated_record_is_structural() {
        let text = "RUNSPEC\nDIMENS\n 1 1 1\n";
        let err = parse_raw_str(text, None).unwrap_err();
        assert!(err.to_string().contains("not terminated"), "{err}");
    }
}
