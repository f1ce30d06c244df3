use std::fmt::Write;


// The abstract syntax tree shared by the expression parser, the template
// compiler and the interpreter.
//
// A node carries an emit tag drawn from a closed set, an optional matched
// lexeme (literals, identifiers, template text) and an ordered list of
// children. Nodes are built by the front-ends and never mutated during
// evaluation.


// Emit tags dispatched on by the interpreter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Emit {
    // flow: these control their own child traversal
    And,
    Or,
    If,
    Cmp,
    Call,
    Comprehension,

    // comparison links, valid only as children of Cmp
    Eq,
    Neq,
    Lt,
    Lteq,
    Gt,
    Gteq,
    In,
    Outer,

    // literals
    True,
    False,
    None,
    Number,
    String,
    Identifier,

    // lookup and trailers
    Load,
    Vars,
    Attr,
    Index,
    Slice,
    Entity,

    // collections
    List,
    Strings,

    // arithmetic and unary operators
    Add,
    Sub,
    Mul,
    Div,
    Idiv,
    Mod,
    Pow,
    Pos,
    Neg,
    Invert,
    Not,

    // template nodes
    Tstring,
    Tblock,
    Tloop,
}


impl Emit {
    pub fn name(self) -> &'static str {
        match self {
            Emit::And => "and",
            Emit::Or => "or",
            Emit::If => "if",
            Emit::Cmp => "cmp",
            Emit::Call => "call",
            Emit::Comprehension => "comprehension",
            Emit::Eq => "eq",
            Emit::Neq => "neq",
            Emit::Lt => "lt",
            Emit::Lteq => "lteq",
            Emit::Gt => "gt",
            Emit::Gteq => "gteq",
            Emit::In => "in",
            Emit::Outer => "outer",
            Emit::True => "True",
            Emit::False => "False",
            Emit::None => "None",
            Emit::Number => "Number",
            Emit::String => "String",
            Emit::Identifier => "Identifier",
            Emit::Load => "load",
            Emit::Vars => "vars",
            Emit::Attr => "attr",
            Emit::Index => "index",
            Emit::Slice => "slice",
            Emit::Entity => "entity",
            Emit::List => "list",
            Emit::Strings => "strings",
            Emit::Add => "add",
            Emit::Sub => "sub",
            Emit::Mul => "mul",
            Emit::Div => "div",
            Emit::Idiv => "idiv",
            Emit::Mod => "mod",
            Emit::Pow => "pow",
            Emit::Pos => "pos",
            Emit::Neg => "neg",
            Emit::Invert => "invert",
            Emit::Not => "not",
            Emit::Tstring => "tstring",
            Emit::Tblock => "tblock",
            Emit::Tloop => "tloop",
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub emit: Emit,
    pub lexeme: Option<String>,
    pub children: Vec<Node>,
}


impl Node {
    pub fn new(emit: Emit) -> Node {
        Node { emit, lexeme: None, children: Vec::new() }
    }

    pub fn leaf(emit: Emit, lexeme: &str) -> Node {
        Node { emit, lexeme: Some(String::from(lexeme)), children: Vec::new() }
    }

    pub fn branch(emit: Emit, children: Vec<Node>) -> Node {
        Node { emit, lexeme: None, children }
    }

    // The matched lexeme, or "" for nodes that carry none.
    pub fn text(&self) -> &str {
        self.lexeme.as_deref().unwrap_or("")
    }

    // Render the tree one emit per line, children indented below their
    // parent, the lexeme in parentheses where one was matched.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let _ = write!(out, "{:indent$}{}", "", self.emit.name(), indent = depth * 2);
        if let Some(lexeme) = &self.lexeme {
            let _ = write!(out, " ({})", lexeme);
        }
        out.push('\n');

        for child in &self.children {
            child.dump_into(out, depth + 1);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump() {
        let tree = Node::branch(Emit::Add, vec![
            Node::leaf(Emit::Number, "1"),
            Node::branch(Emit::Mul, vec![
                Node::leaf(Emit::Number, "2"),
                Node::leaf(Emit::Number, "3"),
            ]),
        ]);

        assert_eq!(
            tree.dump(),
            "add\n  Number (1)\n  mul\n    Number (2)\n    Number (3)\n"
        );
    }

    #[test]
    fn test_text() {
        assert_eq!(Node::leaf(Emit::Identifier, "foo").text(), "foo");
        assert_eq!(Node::new(Emit::None).text(), "");
    }
}
