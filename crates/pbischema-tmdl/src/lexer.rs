//! Line-oriented TMDL tokenizer
//!
//! Every physical line becomes exactly one typed token. Block structure is
//! recovered later by the parser; the lexer only decides what a single line
//! is. Lines inside a ```-fenced region are always plain text.

/// Declaration keywords recognized at the start of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Table,
    Column,
    Measure,
    Partition,
    Relationship,
    Annotation,
}

impl DeclarationKind {
    /// All declaration kinds
    pub const ALL: [DeclarationKind; 6] = [
        Self::Table,
        Self::Column,
        Self::Measure,
        Self::Partition,
        Self::Relationship,
        Self::Annotation,
    ];

    /// Keyword as written in TMDL
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Column => "column",
            Self::Measure => "measure",
            Self::Partition => "partition",
            Self::Relationship => "relationship",
            Self::Annotation => "annotation",
        }
    }

    /// Look up a keyword (case-sensitive)
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.keyword() == word)
    }
}

/// What a single line is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind<'a> {
    /// `<keyword> <header>` for every keyword except `annotation`
    Declaration {
        kind: DeclarationKind,
        header: &'a str,
    },

    /// `annotation <key> = <value>`
    Annotation { key: &'a str, value: &'a str },

    /// `<identifier>: <value>`
    Property { key: &'a str, value: &'a str },

    /// `/// ...` description comment
    DocComment,

    /// Anything else, including fenced content
    Text,

    /// Whitespace only
    Blank,
}

/// One tokenized line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// 1-based line number
    pub number: usize,

    /// Count of leading whitespace characters
    pub indent: usize,

    /// Line without trailing newline
    pub raw: &'a str,

    /// Line with surrounding whitespace removed
    pub text: &'a str,

    /// Classification
    pub token: TokenKind<'a>,
}

const FENCE: &str = "```";

/// Tokenize TMDL source text
pub fn tokenize(source: &str) -> Vec<Line<'_>> {
    let source = source.strip_prefix('\u{FEFF}').unwrap_or(source);
    let mut lines = Vec::new();
    let mut in_fence = false;

    for (idx, raw) in source.lines().enumerate() {
        let text = raw.trim();
        let indent = raw.len() - raw.trim_start().len();
        let fences = text.matches(FENCE).count();

        let token = if in_fence {
            TokenKind::Text
        } else {
            classify(text)
        };

        if fences % 2 == 1 {
            in_fence = !in_fence;
        }

        lines.push(Line {
            number: idx + 1,
            indent: raw[..indent].chars().count(),
            raw,
            text,
            token,
        });
    }

    lines
}

fn classify(text: &str) -> TokenKind<'_> {
    if text.is_empty() {
        return TokenKind::Blank;
    }

    if text.starts_with("///") {
        return TokenKind::DocComment;
    }

    if let Some((word, rest)) = text.split_once(char::is_whitespace) {
        if let Some(kind) = DeclarationKind::from_keyword(word) {
            let rest = rest.trim();
            if kind == DeclarationKind::Annotation {
                if let Some((key, value)) = rest.split_once('=') {
                    let key = key.trim();
                    if !key.is_empty() && !key.contains(char::is_whitespace) {
                        return TokenKind::Annotation {
                            key,
                            value: value.trim(),
                        };
                    }
                }
                return TokenKind::Text;
            }
            if !rest.is_empty() {
                return TokenKind::Declaration { kind, header: rest };
            }
        }
    }

    if let Some((key, value)) = text.split_once(':') {
        let key = key.trim_end();
        if is_identifier(key) {
            return TokenKind::Property {
                key,
                value: value.trim(),
            };
        }
    }

    TokenKind::Text
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
