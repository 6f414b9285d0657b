use logos::Logos;

use crate::diag::Diagnostic;
use crate::span::{SourceId, Span};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip(r"[ \t\r\f]+"))]
#[logos(skip(r"#[^\r\n]*", allow_greedy = true))]
pub enum TokenKind {
    #[token("goto")]
    Goto,
    #[token("if")]
    If,
    #[token("unless")]
    Unless,
    #[token("new")]
    New,

    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("=")]
    Eq,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token(".")]
    Dot,
    #[token("%")]
    Percent,
    #[token("**")]
    StarStar,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token(">>>")]
    Lsr,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("~~")]
    TildeTilde,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,

    #[regex(r"\n+")]
    Newline,

    #[regex(r"\.[A-Za-z_][A-Za-z0-9_]*", parse_directive)]
    Directive(String),

    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    String(String),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", parse_text)]
    Float(String),

    #[regex(r"0x[0-9a-fA-F]+|0b[01]+|[0-9]+", parse_int)]
    Int(i64),

    #[regex(r"\$[INSP][0-9]+", parse_text)]
    Register(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", parse_text)]
    Ident(String),
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub fn lex(source_id: SourceId, input: &str) -> Result<Vec<Token>, Vec<Diagnostic>> {
    let mut lexer = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();

    while let Some(next) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(source_id, range.start, range.end);
        match next {
            Ok(kind) => tokens.push(Token { kind, span }),
            Err(_) => {
                let token = format_token_for_message(lexer.slice());
                diagnostics.push(
                    Diagnostic::error(span, format!("unexpected token {token}"))
                        .with_help("remove or fix this token"),
                );
            }
        }
    }

    if diagnostics.is_empty() {
        Ok(tokens)
    } else {
        Err(diagnostics)
    }
}

fn parse_int(lex: &mut logos::Lexer<TokenKind>) -> Option<i64> {
    let slice = lex.slice();
    if let Some(hex) = slice.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(bin) = slice.strip_prefix("0b") {
        return i64::from_str_radix(bin, 2).ok();
    }
    slice.parse::<i64>().ok()
}

fn parse_text(lex: &mut logos::Lexer<TokenKind>) -> String {
    lex.slice().to_string()
}

fn parse_directive(lex: &mut logos::Lexer<TokenKind>) -> String {
    lex.slice()[1..].to_string()
}

fn parse_string(lex: &mut logos::Lexer<TokenKind>) -> String {
    let slice = lex.slice();
    let content = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        if let Some(escaped) = chars.next() {
            out.push(match escaped {
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                '0' => '\0',
                other => other,
            });
        }
    }
    out
}

fn format_token_for_message(token: &str) -> String {
    let escaped: String = token.chars().flat_map(char::escape_default).collect();
    format!("'{escaped}'")
}
