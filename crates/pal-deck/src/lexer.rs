//! Tokenizer for keyword decks.
//!
//! Handles `--` comments, quoted strings, record terminators, the repeat
//! notation `N*value` and default tokens `N*`. Anything after a `/` on the same
//! line is a comment. The line after a bare `TITLE` keyword is taken verbatim,
//! even when it is blank or holds `--`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{DeckError, DeckResult};

/// Largest repeat count accepted in `N*value`.
const MAX_REPEAT: usize = 50_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Option<Arc<PathBuf>>,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: Option<Arc<PathBuf>>, line: usize) -> Self {
        Self { file, line }
    }

    /// Directory that INCLUDE paths written at this location resolve against.
    pub fn base_dir(&self) -> Option<&Path> {
        self.file.as_deref().and_then(|f| f.parent())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(path) => write!(f, "{}:{}", path.display(), self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Unquoted word: keyword, number or bare identifier.
    Word(String),
    Quoted(String),
    /// Defaulted item, from `1*` (or one of `N*`).
    Default,
    Slash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: SourceLocation,
}

pub fn tokenize(text: &str, file: Option<Arc<PathBuf>>) -> DeckResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut title_pending = false;

    for (idx, raw_line) in text.lines().enumerate() {
        let loc = SourceLocation::new(file.clone(), idx + 1);

        // The whole next line is the title, comment markers and blanks included.
        if title_pending {
            tokens.push(Token {
                kind: TokenKind::Quoted(raw_line.trim().to_string()),
                loc: loc.clone(),
            });
            tokens.push(Token {
                kind: TokenKind::Slash,
                loc,
            });
            title_pending = false;
            continue;
        }

        let before = tokens.len();
        tokenize_line(strip_comment(raw_line), &loc, &mut tokens)?;
        if tokens.len() == before + 1
            && matches!(&tokens[before].kind, TokenKind::Word(w) if w == "TITLE")
        {
            title_pending = true;
        }
    }

    if title_pending {
        return Err(DeckError::structural(
            SourceLocation::new(file, text.lines().count()),
            Some("TITLE"),
            "TITLE keyword is not followed by a title line",
        ));
    }

    Ok(tokens)
}

/// Remove a `--` comment that is not inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quote = false;
    let bytes = line.as_bytes();
    for i in 0..bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'-' if !in_quote && bytes.get(i + 1) == Some(&b'-') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn tokenize_line(line: &str, loc: &SourceLocation, out: &mut Vec<Token>) -> DeckResult<()> {
    let mut chars = line.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c == '/' {
            out.push(Token {
                kind: TokenKind::Slash,
                loc: loc.clone(),
            });
            // Remainder of the line is a comment.
            return Ok(());
        }

        if c == '\'' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            for (_, ch) in chars.by_ref() {
                if ch == '\'' {
                    closed = true;
                    break;
                }
                value.push(ch);
            }
            if !closed {
                return Err(DeckError::structural(
                    loc.clone(),
                    None,
                    "unterminated quoted string",
                ));
            }
            out.push(Token {
                kind: TokenKind::Quoted(value),
                loc: loc.clone(),
            });
            continue;
        }

        let mut end = start;
        while let Some(&(i, ch)) = chars.peek() {
            if ch.is_whitespace() || ch == '/' || ch == '\'' {
                break;
            }
            end = i + ch.len_utf8();
            chars.next();
        }

        // `N*'quoted'` repeats a quoted value.
        let word = &line[start..end];
        if word.ends_with('*')
            && let Some(&(_, '\'')) = chars.peek()
        {
            let count = repeat_count(&word[..word.len() - 1], loc)?;
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            for (_, ch) in chars.by_ref() {
                if ch == '\'' {
                    closed = true;
                    break;
                }
                value.push(ch);
            }
            if !closed {
                return Err(DeckError::structural(
                    loc.clone(),
                    None,
                    "unterminated quoted string",
                ));
            }
            for _ in 0..count {
                out.push(Token {
                    kind: TokenKind::Quoted(value.clone()),
                    loc: loc.clone(),
                });
            }
            continue;
        }

        push_word(word, loc, out)?;
    }

    Ok(())
}

fn repeat_count(text: &str, loc: &SourceLocation) -> DeckResult<usize> {
    let count: usize = text.parse().map_err(|_| {
        DeckError::structural(
            loc.clone(),
            None,
            format!("invalid repeat count '{text}'"),
        )
    })?;
    if count == 0 || count > MAX_REPEAT {
        return Err(DeckError::structural(
            loc.clone(),
            None,
            format!("repeat count {count} outside 1..={MAX_REPEAT}"),
        ));
    }
    Ok(count)
}

fn push_word(word: &str, loc: &SourceLocation, out: &mut Vec<Token>) -> DeckResult<()> {
    // Repeat notation only applies when the prefix is a plain integer.
    if let Some(star) = word.find('*') {
        let prefix = &word[..star];
        if !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit()) {
            let count = repeat_count(prefix, loc)?;
            let value = &word[star + 1..];
            let kind = if value.is_empty() {
                TokenKind::Default
            } else {
                TokenKind::Word(value.to_string())
            };
            for _ in 0..count {
                out.push(Token {
                    kind: kind.clone(),
                    loc: loc.clone(),
                });
            }
            return Ok(());
        }
    }

    out.push(Token {
        kind: TokenKind::Word(word.to_string()),
        loc: loc.clone(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text, None)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn word(s: &str) -> TokenKind {
        TokenKind::Word(s.to_string())
    }

    #[test]
    fn comments_are_stripped() {
        assert_eq!(
            kinds("PORO -- porosity\n 0.2 0.3 / trailing text\n"),
            vec![word("PORO"), word("0.2"), word("0.3"), TokenKind::Slash]
        );
    }

    #[test]
    fn dashes_inside_quotes_are_kept() {
        assert_eq!(
            kinds("'A--B' /"),
            vec![TokenKind::Quoted("A--B".to_string()), TokenKind::Slash]
        );
    }

    #[test]
    fn repeat_and_default_expand() {
        assert_eq!(
            kinds("3*0.25 2* 1* 7 /"),
            vec![
                word("0.25"),
                word("0.25"),
                word("0.25"),
                TokenKind::Default,
                TokenKind::Default,
                TokenKind::Default,
                word("7"),
                TokenKind::Slash,
            ]
        );
    }

    #[test]
    fn repeated_quoted_value_expands() {
        assert_eq!(
            kinds("2*'OPEN' /"),
            vec![
                TokenKind::Quoted("OPEN".to_string()),
                TokenKind::Quoted("OPEN".to_string()),
                TokenKind::Slash,
            ]
        );
    }

    #[test]
    fn title_line_is_taken_verbatim() {
        assert_eq!(
            kinds("TITLE\nMy model / with slash\nDIMENS\n"),
            vec![
                word("TITLE"),
                TokenKind::Quoted("My model / with slash".to_string()),
                TokenKind::Slash,
                word("DIMENS"),
            ]
        );
    }

    #[test]
    fn title_keeps_dashes_and_may_be_blank() {
        assert_eq!(
            kinds("TITLE\nCase A -- tuned\n"),
            vec![word("TITLE"), TokenKind::Quoted("Case A -- tuned".to_string()), TokenKind::Slash]
        );
        assert_eq!(
            kinds("TITLE -- heading\n\nDIMENS\n"),
            vec![word("TITLE"), TokenKind::Quoted(String::new()), TokenKind::Slash, word("DIMENS")]
        );
    }

    #[test]
    fn zero_repeat_is_rejected() {
        let err = tokenize("0*1.0 /", None).unwrap_err();
        assert!(err.to_string().contains("repeat count"));
    }

    #[test]
    fn unterminated_quote_reports_line() {
        let err = tokenize("WELSPECS\n'P1 G1 /\n", None).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
