//! Token stream for a host text that oxc has already accepted.
//!
//! oxc does not expose its tokens, so they are re-scanned here. Regular expression and
//! template spans are ambiguous to a context-free scanner; the lowering pass reports them
//! as atoms and the scanner emits each atom as one token. Comments are skipped, oxc
//! reports them.

use crate::coords::{CoordinateIndex, Range};
use crate::error::HostError;
use crate::node::{Token, TokenKind};

const KEYWORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "export", "extends", "finally", "for", "function", "if", "import", "in",
    "instanceof", "new", "return", "super", "switch", "this", "throw", "try", "typeof", "var",
    "void", "while", "with", "yield",
];

// Longest first so the first hit is the maximal munch.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@", "#",
];

/// A span the scanner must not look inside, with the kind of the single token it becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atom {
    pub range: Range,
    pub kind: TokenKind,
}

/// `atoms` must be sorted by start offset.
pub fn tokenize(text: &str, coords: &CoordinateIndex, atoms: &[Atom]) -> Result<Vec<Token>, HostError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut atoms = atoms.iter().peekable();
    let mut pos = 0;

    while pos < bytes.len() {
        while atoms.next_if(|atom| atom.range.start < pos).is_some() {}
        if let Some(atom) = atoms.next_if(|atom| atom.range.start == pos) {
            tokens.push(token(text, atom.kind, atom.range, coords));
            pos = atom.range.end;
            continue;
        }

        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let rest = &text[pos..];
        if rest.starts_with("//") {
            pos = rest.find('\n').map(|i| pos + i).unwrap_or(text.len());
            continue;
        }
        if rest.starts_with("/*") {
            let close = rest[2..]
                .find("*/")
                .ok_or_else(|| HostError::new("Unterminated comment", pos))?;
            pos += 2 + close + 2;
            continue;
        }

        let start = pos;
        let kind = if c == b'"' || c == b'\'' {
            pos = scan_string(bytes, pos)?;
            TokenKind::String
        } else if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            pos = scan_number(bytes, pos);
            TokenKind::Numeric
        } else if c == b'#' && is_identifier_start(&rest[1..]) {
            pos = scan_identifier(text, pos + 1);
            TokenKind::PrivateIdentifier
        } else if is_identifier_start(rest) {
            pos = scan_identifier(text, pos);
            match &text[start..pos] {
                "true" | "false" => TokenKind::Boolean,
                "null" => TokenKind::Null,
                word if KEYWORDS.contains(&word) => TokenKind::Keyword,
                _ => TokenKind::Identifier,
            }
        } else if let Some(p) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            // `?.5` is a conditional followed by a number.
            if *p == "?." && bytes.get(pos + 2).is_some_and(u8::is_ascii_digit) {
                pos += 1;
            } else {
                pos += p.len();
            }
            TokenKind::Punctuator
        } else {
            let ch = rest.chars().next().unwrap_or('\0');
            return Err(HostError::new(format!("Unexpected character '{}'", ch), pos));
        };
        tokens.push(token(text, kind, Range::new(start, pos), coords));
    }

    Ok(tokens)
}

fn token(text: &str, kind: TokenKind, range: Range, coords: &CoordinateIndex) -> Token {
    Token {
        kind,
        value: text[range.start..range.end].to_string(),
        range,
        loc: coords.location(range),
    }
}

fn is_identifier_start(rest: &str) -> bool {
    rest.chars()
        .next()
        .is_some_and(|c| c == '$' || c == '_' || c == '\\' || c.is_alphabetic())
}

fn scan_identifier(text: &str, start: usize) -> usize {
    let mut end = start;
    for (i, c) in text[start..].char_indices() {
        if c == '$' || c == '_' || c == '\\' || c == '\u{200c}' || c == '\u{200d}' || c.is_alphanumeric() {
            end = start + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

fn scan_string(bytes: &[u8], start: usize) -> Result<usize, HostError> {
    let quote = bytes[start];
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'\n' => break,
            c if c == quote => return Ok(pos + 1),
            _ => pos += 1,
        }
    }
    Err(HostError::new("Unterminated string constant", start))
}

fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut pos = start;
    if bytes[pos] == b'0' && matches!(bytes.get(pos + 1), Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B')) {
        pos += 2;
        while pos < bytes.len() && (bytes[pos].is_ascii_hexdigit() || bytes[pos] == b'_') {
            pos += 1;
        }
        return scan_bigint_suffix(bytes, pos);
    }
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'_') {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'_') {
            pos += 1;
        }
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    scan_bigint_suffix(bytes, pos)
}

fn scan_bigint_suffix(bytes: &[u8], pos: usize) -> usize {
    if bytes.get(pos) == Some(&b'n') {
        pos + 1
    } else {
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex_with(text: &str, atoms: &[Atom]) -> Vec<Token> {
        tokenize(text, &CoordinateIndex::new(text), atoms).unwrap()
    }

    fn values(text: &str) -> Vec<String> {
        lex_with(text, &[]).into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn test_maximal_munch_punctuators() {
        assert_eq!(values("a ??= b?.c"), vec!["a", "??=", "b", "?.", "c"]);
        assert_eq!(values("x=>{...y}"), vec!["x", "=>", "{", "...", "y", "}"]);
        assert_eq!(values("a?.5:1"), vec!["a", "?", ".5", ":", "1"]);
        assert_eq!(values("10n + 0xffn"), vec!["10n", "+", "0xffn"]);
    }

    #[test]
    fn test_token_kinds() {
        let kinds: Vec<TokenKind> = lex_with("if (true) return null; $count 'x' this.#id", &[])
            .iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword,
                TokenKind::Punctuator,
                TokenKind::Boolean,
                TokenKind::Punctuator,
                TokenKind::Keyword,
                TokenKind::Null,
                TokenKind::Punctuator,
                TokenKind::Identifier,
                TokenKind::String,
                TokenKind::Keyword,
                TokenKind::Punctuator,
                TokenKind::PrivateIdentifier,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(values("a // one\n/* two */ b"), vec!["a", "b"]);
    }

    #[test]
    fn test_atoms_become_single_tokens() {
        let text = "x = /a\\/b/g; `s${ y }t`";
        let atoms = [
            Atom { range: Range::new(4, 11), kind: TokenKind::RegularExpression },
            Atom { range: Range::new(13, 17), kind: TokenKind::Template },
            Atom { range: Range::new(20, 23), kind: TokenKind::Template },
        ];
        let tokens = lex_with(text, &atoms);
        let pairs: Vec<(TokenKind, &str)> = tokens.iter().map(|t| (t.kind, t.value.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                (TokenKind::Identifier, "x"),
                (TokenKind::Punctuator, "="),
                (TokenKind::RegularExpression, "/a\\/b/g"),
                (TokenKind::Punctuator, ";"),
                (TokenKind::Template, "`s${"),
                (TokenKind::Identifier, "y"),
                (TokenKind::Template, "}t`"),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_reports_offset() {
        let text = "let s = 'abc";
        let err = tokenize(text, &CoordinateIndex::new(text), &[]).unwrap_err();
        assert_eq!(err.offset, 8);
    }
}
