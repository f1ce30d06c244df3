use logos::Logos;


// Token set of the expression language. Strings swallow everything up to
// the first matching quote; escape sequences are decoded later, when the
// literal is evaluated.
#[derive(Logos, Copy, Clone, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("in")]
    In,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("True")]
    True,
    #[token("False")]
    False,
    #[token("None")]
    None,

    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9]+\.[0-9]*|[0-9]*\.[0-9]+|[0-9]+")]
    Number,
    #[regex(r#""[^"]*"|'[^']*'"#)]
    Str,

    #[token("**")]
    DoubleStar,
    #[token("//")]
    DoubleSlash,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("~")]
    Tilde,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<>")]
    LtGt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
}


pub type Span = std::ops::Range<usize>;


// Tokenize a source string. On an unrecognized character the span of the
// offending input is returned instead.
pub fn lex(source: &str) -> Result<Vec<(Token, Span)>, Span> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        match result {
            Ok(tok) => tokens.push((tok, lexer.span())),
            Err(()) => return Err(lexer.span()),
        }
    }

    Ok(tokens)
}
