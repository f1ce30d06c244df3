use std::fmt;

use crate::ast::{Emit, Node};
use crate::lexer::{lex, Span, Token};


// Recursive-descent parser for the expression language.
//
// Grammar, loosest binding first:
//
//   test        := or_test ['if' or_test 'else' test]
//   or_test     := and_test ('or' and_test)*
//   and_test    := not_test ('and' not_test)*
//   not_test    := 'not' not_test | comparison
//   comparison  := arith (cmp_op arith)*          cmp_op: == != <> < <= > >=
//                                                         in, not in
//   arith       := term (('+' | '-') term)*
//   term        := factor (('*' | '/' | '//' | '%') factor)*
//   factor      := ('+' | '-' | '~') factor | power
//   power       := entity ['**' factor]
//   entity      := atom ('.' IDENT | '[' ... ']')*
//   atom        := literal | '(' test ')' | list | comprehension
//                | IDENT '(' args ')' | IDENT
//
// Comparison sequences become a single `cmp` node whose first child is the
// initial operand and whose remaining children carry one comparison emit
// and the right operand each. Attribute/index/slice trailers nest as binary
// nodes and the whole chain is wrapped in an `entity` node.


#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub row: usize,
    pub col: usize,
    pub expecting: String,
}


impl ParseError {
    pub fn new(row: usize, col: usize, expecting: &str) -> ParseError {
        ParseError { row, col, expecting: String::from(expecting) }
    }

    fn at(src: &str, offset: usize, expecting: &str) -> ParseError {
        let (row, col) = position(src, offset);
        ParseError::new(row, col, expecting)
    }
}


impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "parse error at row {}, col {}: expecting {}",
            self.row, self.col, self.expecting
        )
    }
}

impl std::error::Error for ParseError {}


// 1-based row/column of a byte offset.
pub(crate) fn position(src: &str, offset: usize) -> (usize, usize) {
    let before = &src[..offset.min(src.len())];
    let row = before.matches('\n').count() + 1;
    let col = match before.rfind('\n') {
        Some(pos) => before[pos + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (row, col)
}


pub fn parse(src: &str) -> Result<Node, ParseError> {
    let tokens = lex(src).map_err(|span| ParseError::at(src, span.start, "a valid token"))?;

    if tokens.is_empty() {
        return Err(ParseError::at(src, src.len(), "an expression"));
    }

    let mut parser = Parser { src, tokens, pos: 0 };
    let node = parser.test()?;

    if parser.pos < parser.tokens.len() {
        return Err(parser.error("end of input"));
    }

    Ok(node)
}


struct Parser<'a> {
    src: &'a str,
    tokens: Vec<(Token, Span)>,
    pos: usize,
}


impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|(tok, _)| *tok)
    }

    fn current_text(&self) -> &str {
        match self.tokens.get(self.pos) {
            Some((_, span)) => &self.src[span.clone()],
            None => "",
        }
    }

    fn eat(&mut self, tok: Token) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Token, expecting: &str) -> Result<(), ParseError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.error(expecting))
        }
    }

    fn error(&self, expecting: &str) -> ParseError {
        let offset = match self.tokens.get(self.pos) {
            Some((_, span)) => span.start,
            None => self.src.len(),
        };
        ParseError::at(self.src, offset, expecting)
    }

    fn identifier(&mut self) -> Result<Node, ParseError> {
        if self.peek() == Some(Token::Ident) {
            let name = self.current_text().to_string();
            self.pos += 1;
            Ok(Node::leaf(Emit::Identifier, &name))
        } else {
            Err(self.error("an identifier"))
        }
    }

    fn test(&mut self) -> Result<Node, ParseError> {
        let then = self.or_test()?;

        if self.eat(Token::If) {
            let cond = self.or_test()?;
            self.expect(Token::Else, "'else'")?;
            let alt = self.test()?;
            return Ok(Node::branch(Emit::If, vec![then, cond, alt]));
        }

        Ok(then)
    }

    fn or_test(&mut self) -> Result<Node, ParseError> {
        let mut node = self.and_test()?;
        while self.eat(Token::Or) {
            node = Node::branch(Emit::Or, vec![node, self.and_test()?]);
        }
        Ok(node)
    }

    fn and_test(&mut self) -> Result<Node, ParseError> {
        let mut node = self.not_test()?;
        while self.eat(Token::And) {
            node = Node::branch(Emit::And, vec![node, self.not_test()?]);
        }
        Ok(node)
    }

    fn not_test(&mut self) -> Result<Node, ParseError> {
        if self.eat(Token::Not) {
            Ok(Node::branch(Emit::Not, vec![self.not_test()?]))
        } else {
            self.comparison()
        }
    }

    fn comparison(&mut self) -> Result<Node, ParseError> {
        let first = self.arith()?;
        let mut links = Vec::new();

        loop {
            let emit = match self.peek() {
                Some(Token::EqEq) => Emit::Eq,
                Some(Token::BangEq) | Some(Token::LtGt) => Emit::Neq,
                Some(Token::Lt) => Emit::Lt,
                Some(Token::LtEq) => Emit::Lteq,
                Some(Token::Gt) => Emit::Gt,
                Some(Token::GtEq) => Emit::Gteq,
                Some(Token::In) => Emit::In,
                Some(Token::Not) => {
                    // after an operand, `not` can only begin `not in`
                    self.pos += 1;
                    self.expect(Token::In, "'in'")?;
                    links.push(Node::branch(Emit::Outer, vec![self.arith()?]));
                    continue;
                }
                _ => break,
            };

            self.pos += 1;
            links.push(Node::branch(emit, vec![self.arith()?]));
        }

        if links.is_empty() {
            return Ok(first);
        }

        let mut children = vec![first];
        children.extend(links);
        Ok(Node::branch(Emit::Cmp, children))
    }

    fn arith(&mut self) -> Result<Node, ParseError> {
        let mut node = self.term()?;

        loop {
            let emit = match self.peek() {
                Some(Token::Plus) => Emit::Add,
                Some(Token::Minus) => Emit::Sub,
                _ => break,
            };
            self.pos += 1;
            node = Node::branch(emit, vec![node, self.term()?]);
        }

        Ok(node)
    }

    fn term(&mut self) -> Result<Node, ParseError> {
        let mut node = self.factor()?;

        loop {
            let emit = match self.peek() {
                Some(Token::Star) => Emit::Mul,
                Some(Token::Slash) => Emit::Div,
                Some(Token::DoubleSlash) => Emit::Idiv,
                Some(Token::Percent) => Emit::Mod,
                _ => break,
            };
            self.pos += 1;
            node = Node::branch(emit, vec![node, self.factor()?]);
        }

        Ok(node)
    }

    fn factor(&mut self) -> Result<Node, ParseError> {
        let emit = match self.peek() {
            Some(Token::Plus) => Some(Emit::Pos),
            Some(Token::Minus) => Some(Emit::Neg),
            Some(Token::Tilde) => Some(Emit::Invert),
            _ => None,
        };

        if let Some(emit) = emit {
            self.pos += 1;
            Ok(Node::branch(emit, vec![self.factor()?]))
        } else {
            self.power()
        }
    }

    fn power(&mut self) -> Result<Node, ParseError> {
        let base = self.entity()?;

        if self.eat(Token::DoubleStar) {
            // right-associative via factor, so 2 ** -1 parses too
            let exp = self.factor()?;
            return Ok(Node::branch(Emit::Pow, vec![base, exp]));
        }

        Ok(base)
    }

    fn entity(&mut self) -> Result<Node, ParseError> {
        let mut node = self.atom()?;
        let mut chained = false;

        loop {
            if self.eat(Token::Dot) {
                let name = self.identifier()?;
                node = Node::branch(Emit::Attr, vec![node, name]);
                chained = true;
            } else if self.eat(Token::LBracket) {
                node = self.subscript(node)?;
                chained = true;
            } else {
                break;
            }
        }

        if chained {
            node = Node::branch(Emit::Entity, vec![node]);
        }

        Ok(node)
    }

    // The bracketed trailer: an index, or a slice with either bound
    // optional. Missing bounds become None literals so a slice always has
    // exactly [container, start, end] children.
    fn subscript(&mut self, container: Node) -> Result<Node, ParseError> {
        if self.eat(Token::Colon) {
            let end = self.slice_end()?;
            self.expect(Token::RBracket, "']'")?;
            return Ok(Node::branch(Emit::Slice, vec![container, Node::new(Emit::None), end]));
        }

        let start = self.test()?;

        if self.eat(Token::Colon) {
            let end = self.slice_end()?;
            self.expect(Token::RBracket, "']'")?;
            return Ok(Node::branch(Emit::Slice, vec![container, start, end]));
        }

        self.expect(Token::RBracket, "']'")?;
        Ok(Node::branch(Emit::Index, vec![container, start]))
    }

    fn slice_end(&mut self) -> Result<Node, ParseError> {
        if self.peek() == Some(Token::RBracket) {
            Ok(Node::new(Emit::None))
        } else {
            self.test()
        }
    }

    fn atom(&mut self) -> Result<Node, ParseError> {
        match self.peek() {
            Some(Token::True) => {
                self.pos += 1;
                Ok(Node::new(Emit::True))
            }
            Some(Token::False) => {
                self.pos += 1;
                Ok(Node::new(Emit::False))
            }
            Some(Token::None) => {
                self.pos += 1;
                Ok(Node::new(Emit::None))
            }
            Some(Token::Number) => {
                let text = self.current_text().to_string();
                self.pos += 1;
                Ok(Node::leaf(Emit::Number, &text))
            }
            Some(Token::Str) => self.strings(),
            Some(Token::LParen) => {
                self.pos += 1;
                let node = self.test()?;
                self.expect(Token::RParen, "')'")?;
                Ok(node)
            }
            Some(Token::LBracket) => {
                self.pos += 1;
                self.list_or_comprehension()
            }
            Some(Token::Ident) => {
                let name = self.current_text().to_string();
                self.pos += 1;

                if self.eat(Token::LParen) {
                    self.call(&name)
                } else {
                    Ok(Node::branch(Emit::Load, vec![Node::leaf(Emit::Identifier, &name)]))
                }
            }
            _ => Err(self.error("an expression")),
        }
    }

    // Adjacent string literals concatenate.
    fn strings(&mut self) -> Result<Node, ParseError> {
        let mut parts = Vec::new();

        while self.peek() == Some(Token::Str) {
            let text = self.current_text().to_string();
            self.pos += 1;
            parts.push(Node::leaf(Emit::String, &text));
        }

        if parts.len() == 1 {
            Ok(parts.remove(0))
        } else {
            Ok(Node::branch(Emit::Strings, parts))
        }
    }

    fn call(&mut self, name: &str) -> Result<Node, ParseError> {
        let mut children = vec![Node::leaf(Emit::Identifier, name)];

        if !self.eat(Token::RParen) {
            let mut args = vec![self.test()?];
            while self.eat(Token::Comma) {
                args.push(self.test()?);
            }
            self.expect(Token::RParen, "')'")?;
            children.push(Node::branch(Emit::List, args));
        }

        Ok(Node::branch(Emit::Call, children))
    }

    // Past the opening bracket: a list display, or a comprehension when
    // the first element is followed by `for`.
    fn list_or_comprehension(&mut self) -> Result<Node, ParseError> {
        if self.eat(Token::RBracket) {
            return Ok(Node::branch(Emit::List, Vec::new()));
        }

        let first = self.test()?;

        if self.eat(Token::For) {
            let name = self.identifier()?;
            self.expect(Token::In, "'in'")?;
            let iterable = self.or_test()?;

            let mut children = vec![first, name, iterable];
            if self.eat(Token::If) {
                children.push(self.or_test()?);
            }

            self.expect(Token::RBracket, "']'")?;
            return Ok(Node::branch(Emit::Comprehension, children));
        }

        let mut items = vec![first];
        while self.eat(Token::Comma) {
            items.push(self.test()?);
        }
        self.expect(Token::RBracket, "']'")?;

        Ok(Node::branch(Emit::List, items))
    }
}
