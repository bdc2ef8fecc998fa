use std::{fmt, iter::Peekable, str::Chars};

use strum::{Display, EnumString, IntoStaticStr};

/// The kind of a lexical token.
///
/// Keyword variants carry their canonical uppercase spelling via strum, so the
/// lexer can classify an uppercased word with a single `from_str` call and
/// error messages can print the surface form with `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
pub(crate) enum TokenKind {
    #[strum(serialize = "HAI")]
    Hai,
    #[strum(serialize = "ME")]
    Me,
    #[strum(serialize = "TEH")]
    Teh,
    #[strum(serialize = "KTHXBAI")]
    Kthxbai,
    #[strum(serialize = "KTHX")]
    Kthx,
    #[strum(serialize = "VARIABLE")]
    Variable,
    #[strum(serialize = "FUNCSHUN")]
    Funcshun,
    #[strum(serialize = "CLAS")]
    Clas,
    #[strum(serialize = "KITTEH")]
    Kitteh,
    #[strum(serialize = "OF")]
    Of,
    #[strum(serialize = "LOCKD")]
    Lockd,
    #[strum(serialize = "SHARD")]
    Shard,
    #[strum(serialize = "ITZ")]
    Itz,
    #[strum(serialize = "WIT")]
    Wit,
    #[strum(serialize = "AN")]
    An,
    #[strum(serialize = "DIS")]
    Dis,
    #[strum(serialize = "EVRYONE")]
    Evryone,
    #[strum(serialize = "MAHSELF")]
    Mahself,
    #[strum(serialize = "IZ")]
    Iz,
    #[strum(serialize = "NOPE")]
    Nope,
    #[strum(serialize = "WHILE")]
    While,
    #[strum(serialize = "GIVEZ")]
    Givez,
    #[strum(serialize = "UP")]
    Up,
    #[strum(serialize = "NEW")]
    New,
    #[strum(serialize = "AS")]
    As,
    #[strum(serialize = "I")]
    I,
    #[strum(serialize = "CAN")]
    Can,
    #[strum(serialize = "HAS")]
    Has,
    #[strum(serialize = "A")]
    A,
    #[strum(serialize = "DO")]
    Do,
    #[strum(serialize = "FROM")]
    From,
    #[strum(serialize = "MAYB")]
    Mayb,
    #[strum(serialize = "OOPSIE")]
    Oopsie,
    #[strum(serialize = "OOPS")]
    Oops,
    #[strum(serialize = "ALWAYZ")]
    Alwayz,
    #[strum(serialize = "MOAR")]
    Moar,
    #[strum(serialize = "LES")]
    Les,
    #[strum(serialize = "TIEMZ")]
    Tiemz,
    #[strum(serialize = "DIVIDEZ")]
    Dividez,
    #[strum(serialize = "BIGGR")]
    Biggr,
    #[strum(serialize = "SMALLR")]
    Smallr,
    #[strum(serialize = "THAN")]
    Than,
    #[strum(serialize = "SAEM")]
    Saem,
    #[strum(serialize = "OR")]
    Or,
    #[strum(serialize = "NOT")]
    Not,
    #[strum(serialize = "BOOL")]
    Bool,
    #[strum(serialize = "INTEGR")]
    Integr,
    #[strum(serialize = "DUBBLE")]
    Dubble,
    #[strum(serialize = "STRIN")]
    Strin,
    #[strum(serialize = "YEZ")]
    Yez,
    #[strum(serialize = "NO")]
    No,
    #[strum(serialize = "NOTHIN")]
    Nothin,
    #[strum(serialize = "BUKKIT")]
    Bukkit,
    #[strum(serialize = "BASKIT")]
    Baskit,

    #[strum(serialize = "identifier")]
    Ident,
    #[strum(serialize = "string literal")]
    StringLit,
    #[strum(serialize = "integer literal")]
    IntLit,
    #[strum(serialize = "double literal")]
    DubbleLit,
    #[strum(serialize = "?")]
    Question,
    #[strum(serialize = "(")]
    LParen,
    #[strum(serialize = ")")]
    RParen,
    #[strum(serialize = "newline")]
    Newline,
    #[strum(serialize = "end of input")]
    Eof,
    #[strum(serialize = "illegal character")]
    Illegal,
}

/// A single lexical token with its source position.
///
/// For identifiers and keywords, `lexeme` is the canonical uppercase spelling.
/// For string literals, `lexeme` holds the unescaped content. Numeric literal
/// lexemes keep their surface form (including a leading `-` or `0x` prefix)
/// and are converted by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }
}

/// A `BTW` comment remembered for documentation capture.
///
/// The parser inspects these when it reaches a declaration and attaches the
/// contiguous block immediately above it as doc lines.
#[derive(Debug, Clone)]
pub(crate) struct Comment {
    pub line: u32,
    pub text: String,
}

/// Error produced when the source cannot be tokenized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
    pub message: String,
    pub line: u32,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for LexError {}

/// Streaming tokenizer for Objective-LOL source text.
///
/// Tokens are produced on demand via [`Lexer::next_token`]. Identifier-shaped
/// words are uppercased before keyword classification, so all downstream name
/// handling works on canonical uppercase text. `BTW` comments never become
/// tokens; they are accumulated in a recent-comments buffer that the parser
/// drains when attaching documentation.
#[derive(Debug)]
pub(crate) struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    column: u32,
    comments: Vec<Comment>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            comments: Vec::new(),
        }
    }

    /// Comments seen since the last [`Lexer::clear_recent_comments`] call.
    pub fn recent_comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn clear_recent_comments(&mut self) {
        self.comments.clear();
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Produces the next token, skipping insignificant whitespace and
    /// capturing comments along the way.
    ///
    /// Newlines are significant and come back as `TokenKind::Newline`. After
    /// the end of input every call returns an `Eof` token.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else {
                return Ok(Token::new(TokenKind::Eof, "", line, column));
            };
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    return Ok(Token::new(TokenKind::Newline, "\n", line, column));
                }
                '?' => {
                    self.bump();
                    return Ok(Token::new(TokenKind::Question, "?", line, column));
                }
                '(' => {
                    self.bump();
                    return Ok(Token::new(TokenKind::LParen, "(", line, column));
                }
                ')' => {
                    self.bump();
                    return Ok(Token::new(TokenKind::RParen, ")", line, column));
                }
                '"' => return self.scan_string(line, column),
                '-' => {
                    self.bump();
                    if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        return self.scan_number(true, line, column);
                    }
                    return Ok(Token::new(TokenKind::Illegal, "-", line, column));
                }
                c if c.is_ascii_digit() => return self.scan_number(false, line, column),
                c if c.is_ascii_alphabetic() || c == '_' => {
                    if let Some(token) = self.scan_word(line, column) {
                        return Ok(token);
                    }
                    // word was a BTW comment, keep scanning
                }
                other => {
                    self.bump();
                    return Ok(Token::new(TokenKind::Illegal, other.to_string(), line, column));
                }
            }
        }
    }

    fn scan_string(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(LexError {
                        message: "unterminated string literal".to_owned(),
                        line,
                    });
                }
                Some('"') => return Ok(Token::new(TokenKind::StringLit, value, line, column)),
                Some('\\') => match self.bump() {
                    Some('"') => value.push('"'),
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some(other) => {
                        return Err(LexError {
                            message: format!("unknown string escape '\\{other}'"),
                            line,
                        });
                    }
                    None => {
                        return Err(LexError {
                            message: "unterminated string literal".to_owned(),
                            line,
                        });
                    }
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn scan_number(&mut self, negative: bool, line: u32, column: u32) -> Result<Token, LexError> {
        let mut text = String::new();
        if negative {
            text.push('-');
        }
        // hex integers: 0x… / -0x…
        if self.peek() == Some('0') {
            text.push('0');
            self.bump();
            if matches!(self.peek(), Some('x' | 'X')) {
                text.push('x');
                self.bump();
                while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                    text.push(self.bump().expect("peeked hex digit"));
                }
                return Ok(Token::new(TokenKind::IntLit, text, line, column));
            }
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.bump().expect("peeked digit"));
        }
        // a dot only turns this into a DUBBLE when digits follow
        let mut lookahead = self.chars.clone();
        if lookahead.next() == Some('.') && lookahead.next().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.bump().expect("peeked dot"));
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.bump().expect("peeked digit"));
            }
            return Ok(Token::new(TokenKind::DubbleLit, text, line, column));
        }
        Ok(Token::new(TokenKind::IntLit, text, line, column))
    }

    /// Scans an identifier-shaped word. Returns `None` when the word opened a
    /// `BTW` comment, which is consumed to end of line and buffered.
    fn scan_word(&mut self, line: u32, column: u32) -> Option<Token> {
        let mut word = String::new();
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            word.push(self.bump().expect("peeked word char"));
        }
        let word = word.to_uppercase();
        if word == "BTW" {
            let mut text = String::new();
            while self.peek().is_some_and(|c| c != '\n') {
                text.push(self.bump().expect("peeked comment char"));
            }
            self.comments.push(Comment {
                line,
                text: text.trim().to_owned(),
            });
            return None;
        }
        let kind = word.parse::<TokenKind>().unwrap_or(TokenKind::Ident);
        Some(Token::new(kind, word, line, column))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            let kind = token.kind;
            out.push(kind);
            if kind == TokenKind::Eof {
                return out;
            }
        }
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("HAI ME TEH FUNCSHUN MAIN"),
            vec![
                TokenKind::Hai,
                TokenKind::Me,
                TokenKind::Teh,
                TokenKind::Funcshun,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn case_insensitive_keywords() {
        let mut lexer = Lexer::new("hai me teh variable counter");
        let first = lexer.next_token().unwrap();
        assert_eq!(first.kind, TokenKind::Hai);
        assert_eq!(first.lexeme, "HAI");
        // skip ME TEH VARIABLE
        for _ in 0..3 {
            lexer.next_token().unwrap();
        }
        let ident = lexer.next_token().unwrap();
        assert_eq!(ident.kind, TokenKind::Ident);
        assert_eq!(ident.lexeme, "COUNTER");
    }

    #[test]
    fn string_escapes() {
        let mut lexer = Lexer::new(r#""a\nb\t\"c\\""#);
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::StringLit);
        assert_eq!(token.lexeme, "a\nb\t\"c\\");
    }

    #[test]
    fn unterminated_string_reports_line() {
        let mut lexer = Lexer::new("\n\"oops");
        lexer.next_token().unwrap(); // newline
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn numbers() {
        let mut lexer = Lexer::new("42 -7 3.25 -0.5 0x1F -0xff 10.");
        let expect = [
            (TokenKind::IntLit, "42"),
            (TokenKind::IntLit, "-7"),
            (TokenKind::DubbleLit, "3.25"),
            (TokenKind::DubbleLit, "-0.5"),
            (TokenKind::IntLit, "0x1F"),
            (TokenKind::IntLit, "-0xff"),
            // trailing dot without digits stays an integer
            (TokenKind::IntLit, "10"),
        ];
        for (kind, lexeme) in expect {
            let token = lexer.next_token().unwrap();
            assert_eq!((token.kind, token.lexeme.as_str()), (kind, lexeme));
        }
    }

    #[test]
    fn comments_are_buffered_not_emitted() {
        let mut lexer = Lexer::new("BTW adds numbers\nBTW carefully\nHAI");
        let mut seen = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::Eof {
                break;
            }
            seen.push(token.kind);
        }
        assert_eq!(
            seen,
            vec![TokenKind::Newline, TokenKind::Newline, TokenKind::Hai]
        );
        let comments = lexer.recent_comments();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text, "adds numbers");
        assert_eq!(comments[0].line, 1);
        assert_eq!(comments[1].text, "carefully");
    }

    #[test]
    fn punctuation_and_illegal() {
        assert_eq!(
            kinds("( ) ? @"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Question,
                TokenKind::Illegal,
                TokenKind::Eof,
            ]
        );
    }
}
