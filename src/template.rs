use std::mem;

use crate::ast::{Emit, Node};
use crate::funcs::Builtin;
use crate::parser::{parse, ParseError};
use crate::util::advance_pos;
use crate::value::Value;
use crate::vm::{Env, Error, Interpreter};


// A Mustache-flavored template engine over the expression language.
//
// Literal text interleaves with tags between configurable delimiters.
// Inside a tag, the first character classifies it: `#` opens a block over
// a condition expression, `|` starts an alternative branch (an elif with a
// condition, an else without), `/` closes the innermost block, anything
// else is an inline expression whose value is stringified into the
// output.
//
// The scanner compiles the whole template to a composite AST of tstring /
// tblock / tloop nodes whose expression children are ordinary Language
// subtrees; rendering is one interpreter run over that tree.


pub struct TemplateOptions {
    // what a None value renders as
    pub empty_value: String,
    // rewrite &gt; / &lt; inside tags before parsing them
    pub replace_char_refs: bool,
    pub start_delimiter: String,
    pub end_delimiter: String,
    pub strip_left: String,
    pub strip_right: String,
    pub start_block: String,
    pub alt_block: String,
    pub end_block: String,
}


impl Default for TemplateOptions {
    fn default() -> TemplateOptions {
        TemplateOptions {
            empty_value: String::new(),
            replace_char_refs: false,
            start_delimiter: String::from("{{"),
            end_delimiter: String::from("}}"),
            strip_left: String::from("-"),
            strip_right: String::from("-"),
            start_block: String::from("#"),
            alt_block: String::from("|"),
            end_block: String::from("/"),
        }
    }
}


#[derive(Debug)]
pub struct Template {
    interpreter: Interpreter,
    ast: Node,
}


impl Template {
    pub fn new(source: &str) -> Result<Template, ParseError> {
        Template::with_options(source, TemplateOptions::default())
    }

    pub fn with_options(source: &str, options: TemplateOptions) -> Result<Template, ParseError> {
        let ast = compile(source, &options)?;

        let mut interpreter = Interpreter::new();
        interpreter.empty_value = options.empty_value;

        // generator functions only templates provide
        interpreter.register("htmlInsertImage", Builtin::HtmlInsertImage);
        interpreter.register("formatCurrency", Builtin::Currency);

        Ok(Template { interpreter, ast })
    }

    pub fn ast(&self) -> &Node {
        &self.ast
    }

    pub fn add_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Option<Value> + 'static,
    {
        self.interpreter.add_function(name, f);
    }

    pub fn render(&self, env: &mut Env) -> Result<String, Error> {
        Ok(self.interpreter.run(&self.ast, env)?.to_string())
    }
}


// One open block during scanning: the surrounding block, the branch
// conditions collected so far (None marks the else branch), and the
// finished branch bodies.
struct OpenBlock {
    parent: Node,
    conditions: Vec<Option<Node>>,
    bodies: Vec<Node>,
}


fn compile(source: &str, options: &TemplateOptions) -> Result<Node, ParseError> {
    let sd = options.start_delimiter.as_str();
    let ed = options.end_delimiter.as_str();
    let sl = options.strip_left.as_str();
    let sr = options.strip_right.as_str();

    let mut s = source;
    let (mut row, mut col) = (1, 1);

    let mut block = Node::new(Emit::Tblock);
    let mut open: Vec<OpenBlock> = Vec::new();

    loop {
        let start = match s.find(sd) {
            Some(i) => i,
            None => break,
        };

        let mut estart = start + sd.len();
        let tag_end = match s[estart..].find(ed) {
            Some(i) => estart + i,
            None => break,
        };

        // a strip marker before the closing delimiter swallows the
        // whitespace after the tag
        let mut eend = tag_end;
        let mut end = tag_end + ed.len();
        if tag_end >= estart + sr.len() && s.get(tag_end - sr.len()..tag_end) == Some(sr) {
            eend = tag_end - sr.len();
            end += s[end..].len() - s[end..].trim_start().len();
        }

        if start > 0 {
            let mut prefix = &s[..start];

            // a strip marker after the opening delimiter trims the
            // preceding literal
            if s[estart..].starts_with(sl) {
                estart += sl.len();
                prefix = prefix.trim_end();
            }

            let (r, c) = advance_pos(&s[..start], row, col);
            row = r;
            col = c;

            block.children.push(Node::leaf(Emit::Tstring, prefix));
        }

        let mut expr = String::from(&s[estart..eend]);
        if options.replace_char_refs {
            expr = expr.replace("&gt;", ">").replace("&lt;", "<");
        }

        if let Some(condition) = expr.strip_prefix(options.start_block.as_str()) {
            let (r, c) = advance_pos(sd, row, col);
            row = r;
            col = c;

            let condition = parse_embedded(condition, row, col)?;
            open.push(OpenBlock {
                parent: mem::replace(&mut block, Node::new(Emit::Tblock)),
                conditions: vec![Some(condition)],
                bodies: Vec::new(),
            });
        } else if let Some(rest) = expr.strip_prefix(options.alt_block.as_str()) {
            let top = match open.last_mut() {
                Some(top) => top,
                None => {
                    return Err(ParseError::new(
                        row,
                        col,
                        "alternative block without an opening block",
                    ))
                }
            };

            let (r, c) = advance_pos(options.alt_block.as_str(), row, col);
            row = r;
            col = c;

            let rest = rest.trim();
            if !rest.is_empty() {
                let condition = parse_embedded(rest, row, col)?;
                top.conditions.push(Some(condition));
            } else if top.conditions.last() == Some(&None) {
                return Err(ParseError::new(
                    row,
                    col,
                    "multiple alternative blocks without a condition are not allowed",
                ));
            } else {
                top.conditions.push(None);
            }

            top.bodies.push(mem::replace(&mut block, Node::new(Emit::Tblock)));

            let (r, c) = advance_pos(rest, row, col);
            row = r;
            col = c;
        } else if expr.starts_with(options.end_block.as_str()) {
            let mut top = match open.pop() {
                Some(top) => top,
                None => {
                    return Err(ParseError::new(
                        row,
                        col,
                        "closing block without an opening block",
                    ))
                }
            };

            let (r, c) = advance_pos(&format!("{}{}", sd, expr), row, col);
            row = r;
            col = c;

            top.bodies.push(mem::replace(&mut block, Node::new(Emit::Tblock)));

            // fold the branches back to front: each condition wraps its
            // body and whatever chain was folded so far into a tloop
            let mut folded: Option<Node> = None;
            for (condition, body) in top.conditions.into_iter().zip(top.bodies).rev() {
                folded = Some(match condition {
                    None => body,
                    Some(condition) => {
                        let mut children = vec![condition, body];
                        if let Some(chain) = folded {
                            children.push(chain);
                        }
                        Node::branch(Emit::Tloop, children)
                    }
                });
            }

            block = top.parent;
            if let Some(folded) = folded {
                block.children.push(folded);
            }
        } else {
            let (r, c) = advance_pos(sd, row, col);
            row = r;
            col = c;

            let node = parse_embedded(&expr, row, col)?;

            let (r, c) = advance_pos(&expr, row, col);
            row = r;
            col = c;

            block.children.push(node);
        }

        let (r, c) = advance_pos(ed, row, col);
        row = r;
        col = c;

        s = &s[end..];
    }

    if !open.is_empty() {
        let closer = format!("{}{}{}", sd, options.end_block, ed);
        return Err(ParseError::new(
            row,
            col,
            &format!("{} blocks are still open, expecting {}", open.len(), closer.repeat(open.len())),
        ));
    }

    if !s.is_empty() {
        block.children.push(Node::leaf(Emit::Tstring, s));
    }

    Ok(block)
}


// Parse a tag expression, shifting its error position into template
// coordinates.
fn parse_embedded(expr: &str, row: usize, col: usize) -> Result<Node, ParseError> {
    parse(expr).map_err(|e| ParseError::new(row + e.row - 1, col + e.col - 1, &e.expecting))
}


#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::value::{Dict, Key};

    fn s(v: &str) -> Value {
        Value::Str(Rc::new(String::from(v)))
    }

    fn dict(entries: &[(&str, Value)]) -> Value {
        Value::dict(
            entries.iter().map(|(k, v)| (Key::str(k), v.clone())).collect::<Dict>(),
        )
    }

    fn render(template: &str, env: &mut Env) -> String {
        Template::new(template).unwrap().render(env).unwrap()
    }

    fn render_empty(template: &str) -> String {
        render(template, &mut Env::new())
    }

    #[test]
    fn test_literal_only() {
        assert_eq!(render_empty("plain text"), "plain text");
        assert_eq!(render_empty(""), "");
    }

    #[test]
    fn test_inline_expressions() {
        let mut env = Env::new();
        env.insert(String::from("name"), s("Jan"));

        assert_eq!(render("Hello {{name}}!", &mut env), "Hello Jan!");
        assert_eq!(render("{{1 + 2}}", &mut env), "3");
        assert_eq!(render("{{upper(name)}}", &mut env), "JAN");
        // a missing variable renders as the empty value
        assert_eq!(render("[{{missing}}]", &mut env), "[]");
    }

    #[test]
    fn test_empty_value_option() {
        let mut options = TemplateOptions::default();
        options.empty_value = String::from("n/a");

        let template = Template::with_options("[{{missing}}]", options).unwrap();
        assert_eq!(template.render(&mut Env::new()).unwrap(), "[n/a]");
    }

    #[test]
    fn test_loop_over_dicts() {
        let mut env = Env::new();
        env.insert(String::from("name"), s("Jan"));
        env.insert(
            String::from("persons"),
            Value::list(vec![
                dict(&[("name", s("John")), ("age", Value::Int(33))]),
                dict(&[("name", s("Doreen")), ("age", Value::Int(25))]),
            ]),
        );

        let out = render(
            "Hello {{name}},\n{{#persons}}{{name}} is {{age * 365}} days old\n{{/}}",
            &mut env,
        );
        assert_eq!(out, "Hello Jan,\nJohn is 12045 days old\nDoreen is 9125 days old\n");

        // the environment is unchanged after the render
        assert_eq!(env.get("name"), Some(&s("Jan")));
        assert!(!env.contains_key("age"));
        assert!(!env.contains_key("loop"));
    }

    #[test]
    fn test_loop_context() {
        let mut env = Env::new();
        env.insert(
            String::from("xs"),
            Value::list(vec![s("a"), s("b"), s("c")]),
        );

        let out = render(
            "{{#xs}}{{loop.index}}/{{loop.length}}:{{loop.item}} {{/}}",
            &mut env,
        );
        assert_eq!(out, "1/3:a 2/3:b 3/3:c ");

        let out = render(
            "{{#xs}}{{\"first \" if loop.first else \"\"}}{{\"last\" if loop.last else \"\"}}{{/}}",
            &mut env,
        );
        assert_eq!(out, "first last");
    }

    #[test]
    fn test_nested_loop_parent() {
        let mut env = Env::new();
        env.insert(
            String::from("rows"),
            Value::list(vec![
                Value::list(vec![s("a"), s("b")]),
                Value::list(vec![s("c")]),
            ]),
        );

        let out = render(
            "{{#rows}}{{#loop.item}}{{loop.parent.index}}.{{loop.index}}:{{loop.item}} {{/}}{{/}}",
            &mut env,
        );
        assert_eq!(out, "1.1:a 1.2:b 2.1:c ");
    }

    #[test]
    fn test_empty_list_else() {
        let mut env = Env::new();
        env.insert(String::from("xs"), Value::list(vec![]));

        assert_eq!(render("{{#xs}}item{{|}}nothing{{/}}", &mut env), "nothing");
        assert_eq!(render("{{#xs}}item{{/}}", &mut env), "");
    }

    #[test]
    fn test_conditional_blocks() {
        let template = "{{#n == 1}}one{{|n == 2}}two{{|}}many{{/}}";

        let mut env = Env::new();
        env.insert(String::from("n"), Value::Int(1));
        assert_eq!(render(template, &mut env), "one");

        env.insert(String::from("n"), Value::Int(2));
        assert_eq!(render(template, &mut env), "two");

        env.insert(String::from("n"), Value::Int(7));
        assert_eq!(render(template, &mut env), "many");
    }

    #[test]
    fn test_dict_condition_merges_keys() {
        let mut env = Env::new();
        env.insert(String::from("user"), dict(&[("nick", s("jdoe"))]));

        assert_eq!(render("{{#user}}~{{nick}}{{/}}", &mut env), "~jdoe");
        assert!(!env.contains_key("nick"));
    }

    #[test]
    fn test_scalar_condition() {
        let mut env = Env::new();
        env.insert(String::from("on"), Value::Bool(true));

        assert_eq!(render("{{#on}}yes{{/}}", &mut env), "yes");

        env.insert(String::from("on"), Value::Int(0));
        assert_eq!(render("{{#on}}yes{{/}}", &mut env), "");
    }

    #[test]
    fn test_strip_markers() {
        assert_eq!(render_empty("a   {{- \"b\" }}"), "ab");
        assert_eq!(render_empty("{{ \"a\" -}}   b"), "ab");
        assert_eq!(render_empty("x {{- \"y\" -}} z"), "xyz");
    }

    #[test]
    fn test_loop_iteration_cap() {
        let mut env = Env::new();
        env.insert(
            String::from("xs"),
            Value::list(vec![Value::Int(1); 10000]),
        );

        let out = render("{{#xs}}.{{/}}", &mut env);
        assert_eq!(out.len(), crate::vm::MAX_FOR_ITERATIONS);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Template::new("{{#x}}unclosed").is_err());
        assert!(Template::new("{{|}}stray").is_err());
        assert!(Template::new("{{/}}stray").is_err());
        assert!(Template::new("{{#x}}a{{|}}b{{|}}c{{/}}").is_err());
        assert!(Template::new("{{ 1 + }}").is_err());

        let err = Template::new("line\n{{#x}}open").unwrap_err();
        assert!(err.expecting.contains("still open"));
    }

    #[test]
    fn test_error_positions() {
        let err = Template::new("ab\ncd{{ 1 + }}").unwrap_err();
        assert_eq!(err.row, 2);
    }

    #[test]
    fn test_template_functions() {
        let mut env = Env::new();
        env.insert(String::from("total"), Value::Float(1234.5));

        assert_eq!(
            render("{{formatCurrency(total)}}", &mut env),
            "1.234,50 €"
        );
        assert_eq!(
            render("{{htmlInsertImage(\"/logo.png\", 32)}}", &mut env),
            "<img src=\"/logo.png\" width=\"32\">"
        );
    }

    #[test]
    fn test_custom_function() {
        let mut template = Template::new("{{shout(\"hi\")}}").unwrap();
        template.add_function("shout", |args| {
            Some(Value::string(format!("{}!", args.get(0)?)))
        });

        assert_eq!(template.render(&mut Env::new()).unwrap(), "hi!");
    }

    #[test]
    fn test_char_refs_option() {
        let mut options = TemplateOptions::default();
        options.replace_char_refs = true;

        let template = Template::with_options("{{1 &lt; 2}}", options).unwrap();
        assert_eq!(template.render(&mut Env::new()).unwrap(), "True");
    }

    #[test]
    fn test_dump_shape() {
        let template = Template::new("a{{#xs}}b{{/}}").unwrap();
        let dump = template.ast().dump();
        assert!(dump.starts_with("tblock\n"));
        assert!(dump.contains("tloop"));
        assert!(dump.contains("tstring (a)"));
    }
}
