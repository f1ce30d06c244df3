use std::fmt;

use indexmap::IndexMap;

use crate::ast::{Emit, Node};
use crate::funcs::{registry, Builtin, Function};
use crate::value::{parse_float, parse_int, unescape, Dict, Key, Value};


// A tree-walking interpreter for the expression language.
//
// This system is optimized for short-running business-rule expressions
// evaluated against a caller-supplied environment.
//
// *Execution Model*
//
// Evaluation walks the AST with an explicit stack of values. Flow emits
// (and/or, if, cmp, call, comprehension, tloop) control their own child
// traversal and must never be reached by the default walk; every other
// emit is applied post-order, after its children have pushed their values.
//
// A finished evaluation leaves exactly one value on the stack (the
// result), or none for an empty program.
//
// *The Environment*
//
// The environment is a name-to-value map owned by the caller. The
// interpreter never keeps references to it past `run`. Comprehensions and
// template iterations shadow bindings and restore them on every exit
// path, including the iteration cap.
//
// *Validity*
//
// Runtime value errors (division by zero, the string cap, bad calls) are
// sentinel strings in the value plane and do not stop evaluation. The
// errors in this file are reserved for broken ASTs: an emit outside its
// valid position fail-stops the whole evaluation.


// Upper bound on the elements any single comprehension or template
// iteration will consume.
pub const MAX_FOR_ITERATIONS: usize = 4 * 1024;


pub type Env = IndexMap<String, Value>;

pub type Result<T> = core::result::Result<T, Error>;


#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    NotImplemented(&'static str),
    Underflow,
}


impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotImplemented(emit) => write!(f, "emit `{}` is not implemented", emit),
            Error::Underflow => write!(f, "value stack underflow"),
        }
    }
}

impl std::error::Error for Error {}


struct Stack(Vec<Value>);

impl Stack {
    fn new() -> Stack {
        Stack(Vec::new())
    }

    fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    fn pop(&mut self) -> Result<Value> {
        self.0.pop().ok_or(Error::Underflow)
    }
}


#[derive(Debug)]
pub struct Interpreter {
    pub(crate) functions: IndexMap<String, Function>,
    // what a None renders as inside template output
    pub(crate) empty_value: String,
}


impl Interpreter {
    pub fn new() -> Interpreter {
        Interpreter { functions: registry(), empty_value: String::new() }
    }

    // Register a host function. Returning None maps to the invalid-call
    // sentinel. Only meaningful before the first evaluation.
    pub fn add_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[Value]) -> Option<Value> + 'static,
    {
        self.functions.insert(String::from(name), Function::Native(Box::new(f)));
    }

    pub(crate) fn register(&mut self, name: &str, builtin: Builtin) {
        self.functions.insert(String::from(name), Function::Builtin(builtin));
    }

    // Evaluate a tree against an environment.
    pub fn run(&self, node: &Node, env: &mut Env) -> Result<Value> {
        let mut stack = Stack::new();
        self.eval(node, &mut stack, env)?;

        trace!("run: final stack depth {}", stack.0.len());
        Ok(stack.0.pop().unwrap_or(Value::None))
    }

    fn eval(&self, node: &Node, stack: &mut Stack, env: &mut Env) -> Result<()> {
        // Flow emits evaluate their children on demand.
        match node.emit {
            Emit::And | Emit::Or => {
                self.eval(&node.children[0], stack, env)?;
                let left = stack.pop()?;

                // or keeps a truthy left operand, and keeps a falsy one
                let keep = if node.emit == Emit::Or { left.truthy() } else { !left.truthy() };
                if keep {
                    stack.push(left);
                } else {
                    self.eval(&node.children[1], stack, env)?;
                }
                return Ok(());
            }

            Emit::If => {
                // children are [then, cond, else]
                self.eval(&node.children[1], stack, env)?;
                let cond = stack.pop()?.truthy();
                self.eval(&node.children[if cond { 0 } else { 2 }], stack, env)?;
                return Ok(());
            }

            Emit::Cmp => return self.eval_cmp(node, stack, env),
            Emit::Call => return self.eval_call(node, stack, env),
            Emit::Comprehension => return self.eval_comprehension(node, stack, env),
            Emit::Tloop => return self.eval_tloop(node, stack, env),

            _ => {}
        }

        // Everything else walks its children first.
        for child in &node.children {
            self.eval(child, stack, env)?;
        }

        match node.emit {
            Emit::True => stack.push(Value::Bool(true)),
            Emit::False => stack.push(Value::Bool(false)),
            Emit::None => stack.push(Value::None),

            Emit::Number => {
                let text = node.text();
                if text.contains('.') {
                    stack.push(Value::float(parse_float(text).unwrap_or(0.0)));
                } else {
                    stack.push(Value::Int(parse_int(text).unwrap_or(0)));
                }
            }

            Emit::String => {
                // cut the surrounding quotes, then decode escapes
                let text = node.text();
                let body = if text.len() >= 2 { &text[1..text.len() - 1] } else { "" };
                stack.push(Value::optimized(&unescape(body)));
            }

            Emit::Identifier => stack.push(Value::string(String::from(node.text()))),

            Emit::Load => {
                let name = stack.pop()?.to_string();
                if name == "vars" {
                    stack.push(env_dict(env));
                } else {
                    stack.push(env.get(&name).cloned().unwrap_or(Value::None));
                }
            }

            Emit::Vars => stack.push(env_dict(env)),

            Emit::Attr | Emit::Index => {
                let idx = stack.pop()?;
                let container = stack.pop()?;
                stack.push(container.index(&idx));
            }

            Emit::Slice => {
                let end = stack.pop()?;
                let start = stack.pop()?;
                let container = stack.pop()?;
                stack.push(container.slice(&start, &end));
            }

            Emit::List => {
                let mut items = Vec::with_capacity(node.children.len());
                for _ in 0..node.children.len() {
                    items.push(stack.pop()?);
                }
                items.reverse();
                stack.push(Value::list(items));
            }

            Emit::Strings => {
                let mut parts = Vec::with_capacity(node.children.len());
                for _ in 0..node.children.len() {
                    parts.push(stack.pop()?);
                }
                let joined: String =
                    parts.iter().rev().map(Value::to_string).collect::<Vec<_>>().concat();
                stack.push(Value::optimized(&joined));
            }

            Emit::Add => self.op2(stack, Value::add)?,
            Emit::Sub => self.op2(stack, Value::sub)?,
            Emit::Mul => self.op2(stack, Value::mul)?,
            Emit::Div => self.op2(stack, Value::div)?,
            Emit::Idiv => self.op2(stack, Value::idiv)?,
            Emit::Mod => self.op2(stack, Value::modulo)?,
            Emit::Pow => self.op2(stack, Value::pow)?,

            Emit::Pos => self.op1(stack, Value::pos)?,
            Emit::Neg => self.op1(stack, Value::neg)?,
            Emit::Invert => self.op1(stack, Value::invert)?,
            Emit::Not => {
                let value = stack.pop()?;
                stack.push(Value::Bool(!value.truthy()));
            }

            // the chain below already left its value on the stack
            Emit::Entity => {}

            Emit::Tstring => stack.push(Value::text(String::from(node.text()))),

            Emit::Tblock => {
                let mut parts = Vec::with_capacity(node.children.len());
                for _ in 0..node.children.len() {
                    parts.push(stack.pop()?);
                }

                let mut txt = String::new();
                for value in parts.into_iter().rev() {
                    match value {
                        Value::None => txt.push_str(&self.empty_value),
                        value => txt.push_str(&value.to_string()),
                    }
                }
                stack.push(Value::text(txt));
            }

            // anything left over is a flow emit out of position
            other => return Err(Error::NotImplemented(other.name())),
        }

        Ok(())
    }

    fn op1(&self, stack: &mut Stack, op: fn(&Value) -> Value) -> Result<()> {
        let a = stack.pop()?;
        stack.push(op(&a));
        Ok(())
    }

    fn op2(&self, stack: &mut Stack, op: fn(&Value, &Value) -> Value) -> Result<()> {
        let b = stack.pop()?;
        let a = stack.pop()?;
        stack.push(op(&a, &b));
        Ok(())
    }

    // Chained comparison: the previous right operand becomes the next left
    // operand; the first failing link settles the whole chain.
    fn eval_cmp(&self, node: &Node, stack: &mut Stack, env: &mut Env) -> Result<()> {
        self.eval(&node.children[0], stack, env)?;
        let mut left = stack.pop()?;

        for link in &node.children[1..] {
            self.eval(&link.children[0], stack, env)?;
            let right = stack.pop()?;

            let holds = match link.emit {
                Emit::Eq => left.value_eq(&right),
                Emit::Neq => !left.value_eq(&right),
                Emit::Lt => left.lt(&right),
                Emit::Lteq => left.lte(&right),
                Emit::Gt => left.gt(&right),
                Emit::Gteq => left.gte(&right),
                Emit::In => right.contains(&left),
                Emit::Outer => !right.contains(&left),
                other => return Err(Error::NotImplemented(other.name())),
            };

            if !holds {
                stack.push(Value::Bool(false));
                return Ok(());
            }

            left = right;
        }

        stack.push(Value::Bool(true));
        Ok(())
    }

    fn eval_call(&self, node: &Node, stack: &mut Stack, env: &mut Env) -> Result<()> {
        let name = node.children[0].text();

        let args: Vec<Value> = if node.children.len() > 1 {
            self.eval(&node.children[1], stack, env)?;
            stack.pop()?.projected_list()
        } else {
            Vec::new()
        };

        if let Some(function) = self.functions.get(name) {
            match function.invoke(&args) {
                Some(value) => stack.push(value),
                None => {
                    stack.push(Value::string(format!("#ERR:Invalid call to {}()", name)))
                }
            }
        } else if name == "vars" {
            // the environment accessor is a special form, not a registry
            // entry
            match args.len() {
                0 => stack.push(env_dict(env)),
                1 => stack.push(
                    env.get(&args[0].to_string()).cloned().unwrap_or(Value::None),
                ),
                _ => stack.push(Value::string(String::from("#ERR:Invalid call to vars()"))),
            }
        } else {
            stack.push(Value::string(format!("#ERR:Call to unknown function {}()", name)));
        }

        Ok(())
    }

    // children are [each, name, iterable, optional test]
    fn eval_comprehension(&self, node: &Node, stack: &mut Stack, env: &mut Env) -> Result<()> {
        self.eval(&node.children[2], stack, env)?;
        let items = stack.pop()?.iterate();

        let name = String::from(node.children[1].text());
        let previous = env.get(&name).cloned();
        let test = node.children.get(3);

        let mut collected = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            if i >= MAX_FOR_ITERATIONS {
                break;
            }

            env.insert(name.clone(), item);

            if let Some(test) = test {
                self.eval(test, stack, env)?;
                if !stack.pop()?.truthy() {
                    continue;
                }
            }

            self.eval(&node.children[0], stack, env)?;
            collected.push(stack.pop()?);
        }

        match previous {
            Some(value) => {
                env.insert(name, value);
            }
            None => {
                env.shift_remove(&name);
            }
        }

        stack.push(Value::list(collected));
        Ok(())
    }

    // Template block: children are [condition, then-block, optional else].
    // A list condition iterates the block with a `loop` context, a dict
    // merges its keys, anything else renders on truthiness. The else slot
    // holds either a block or the next elif in the chain.
    fn eval_tloop(&self, node: &Node, stack: &mut Stack, env: &mut Env) -> Result<()> {
        self.eval(&node.children[0], stack, env)?;
        let value = stack.pop()?;

        let mut out = String::new();

        match &value {
            Value::List(items) if !items.is_empty() => {
                let saved_loop = env.get("loop").cloned();
                let parent = match &saved_loop {
                    Some(v) if matches!(v, Value::Dict(_)) => v.clone(),
                    _ => Value::None,
                };

                // pre-loop values of everything a dict element shadowed,
                // first write wins
                let mut shadowed: IndexMap<String, Option<Value>> = IndexMap::new();
                // keys of the last dict element that did not exist before
                let mut round_keys: Vec<String> = Vec::new();

                let total = items.len();
                for (idx, item) in items.iter().enumerate() {
                    if idx >= MAX_FOR_ITERATIONS {
                        break;
                    }

                    let mut ctx = Dict::new();
                    ctx.insert(Key::str("length"), Value::Int(total as i64));
                    ctx.insert(Key::str("index"), Value::Int(idx as i64 + 1));
                    ctx.insert(Key::str("index0"), Value::Int(idx as i64));
                    ctx.insert(Key::str("first"), Value::Bool(idx == 0));
                    ctx.insert(Key::str("last"), Value::Bool(idx == total - 1));
                    ctx.insert(Key::str("item"), item.clone());
                    ctx.insert(Key::str("parent"), parent.clone());
                    env.insert(String::from("loop"), Value::dict(ctx));

                    if let Value::Dict(entries) = item {
                        for key in round_keys.drain(..) {
                            env.shift_remove(&key);
                        }

                        for (key, value) in entries.iter() {
                            let binding = key.to_value().to_string();
                            if binding == "loop" {
                                continue;
                            }

                            let prev = env.insert(binding.clone(), value.clone());
                            let pre = shadowed.entry(binding.clone()).or_insert(prev);
                            if pre.is_none() {
                                round_keys.push(binding);
                            }
                        }
                    }

                    self.eval(&node.children[1], stack, env)?;
                    out.push_str(&stack.pop()?.to_string());
                }

                for (binding, pre) in shadowed {
                    match pre {
                        Some(value) => {
                            env.insert(binding, value);
                        }
                        None => {
                            env.shift_remove(&binding);
                        }
                    }
                }
                match saved_loop {
                    Some(value) => {
                        env.insert(String::from("loop"), value);
                    }
                    None => {
                        env.shift_remove("loop");
                    }
                }
            }

            Value::List(_) => {
                // empty list renders the else branch, if any
                if let Some(alt) = node.children.get(2) {
                    self.eval(alt, stack, env)?;
                    out.push_str(&stack.pop()?.to_string());
                }
            }

            Value::Dict(entries) if value.truthy() => {
                // merge keys that are not already bound, restore after
                let mut merged: Vec<String> = Vec::new();
                for (key, value) in entries.iter() {
                    let binding = key.to_value().to_string();
                    if env.contains_key(&binding) {
                        continue;
                    }
                    env.insert(binding.clone(), value.clone());
                    merged.push(binding);
                }

                self.eval(&node.children[1], stack, env)?;
                out = stack.pop()?.to_string();

                for binding in merged {
                    env.shift_remove(&binding);
                }
            }

            other if other.truthy() => {
                self.eval(&node.children[1], stack, env)?;
                out = stack.pop()?.to_string();
            }

            _ => {
                if let Some(alt) = node.children.get(2) {
                    self.eval(alt, stack, env)?;
                    out.push_str(&stack.pop()?.to_string());
                }
            }
        }

        stack.push(Value::text(out));
        Ok(())
    }
}


fn env_dict(env: &Env) -> Value {
    let entries: Dict =
        env.iter().map(|(name, value)| (Key::str(name), value.clone())).collect();
    Value::dict(entries)
}


#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::parser::parse;

    fn s(v: &str) -> Value {
        Value::Str(Rc::new(String::from(v)))
    }

    fn eval(src: &str) -> Value {
        eval_with(src, &mut Env::new())
    }

    fn eval_with(src: &str, env: &mut Env) -> Value {
        let ast = parse(src).unwrap();
        trace!("{}", ast.dump());
        Interpreter::new().run(&ast, env).unwrap()
    }

    fn assert_evaluates_to(src: &str, expected: Value) {
        assert_eq!(eval(src), expected);
    }

    #[test]
    fn test_arithmetic() {
        assert_evaluates_to("1 + 2 * 3", Value::Int(7));
        assert_evaluates_to("(1 + 2) * 3", Value::Int(9));
        assert_evaluates_to("7 / 2", Value::Float(3.5));
        assert_evaluates_to("7 // 2", Value::Int(3));
        assert_evaluates_to("7 % 3", Value::Int(1));
        assert_evaluates_to("2 ** 10", Value::Int(1024));
        assert_evaluates_to("-3 + +2", Value::Int(-1));
        assert_evaluates_to("~0", Value::Int(-1));
    }

    #[test]
    fn test_string_operations() {
        assert_evaluates_to("\"hello\" * 3", s("hellohellohello"));
        assert_evaluates_to("\"he\" + \"llo\"", s("hello"));
        assert_evaluates_to("\"4\" + \"2\"", Value::Int(42));
        assert_evaluates_to("\"a\" \"b\" \"c\"", s("abc"));
    }

    #[test]
    fn test_string_literal_normalization() {
        // string literals run through the same normalization as any value
        assert_evaluates_to("\"4112\"", Value::Int(4112));
        assert_evaluates_to("\"12.5\"", Value::Float(12.5));
        assert_evaluates_to("str(4112)", s("4112"));
    }

    #[test]
    fn test_escapes() {
        assert_evaluates_to("\"a\\tb\"", s("a\tb"));
        assert_evaluates_to("'\\x41\\u0042'", s("AB"));
    }

    #[test]
    fn test_sentinels() {
        assert_evaluates_to("1 / 0", s("#ERR:division by zero"));
        assert_evaluates_to("1 // 0", s("#ERR:division by zero"));
        assert_evaluates_to("1 % 0", s("#ERR:modulo by zero"));
        assert_evaluates_to("\"x\" * 40000", s("#ERR limit of 32768 reached"));
    }

    #[test]
    fn test_comparisons() {
        assert_evaluates_to("1 < 2 < 3", Value::Bool(true));
        assert_evaluates_to("1 < 2 < 3 < 2", Value::Bool(false));
        assert_evaluates_to("3 > 2 == 2", Value::Bool(true));
        assert_evaluates_to("1 == 1.0", Value::Bool(true));
        assert_evaluates_to("\"a\" != \"b\"", Value::Bool(true));
        assert_evaluates_to("\"a\" <> \"b\"", Value::Bool(true));
        // incomparable operands order as false, they do not fail
        assert_evaluates_to("1 < \"a\"", Value::Bool(false));
    }

    #[test]
    fn test_membership() {
        assert_evaluates_to("2 in [1, 2, 3]", Value::Bool(true));
        assert_evaluates_to("4 not in [1, 2, 3]", Value::Bool(true));
        assert_evaluates_to("\"ell\" in \"hello\"", Value::Bool(true));
        assert_evaluates_to("\"x\" in [1, 2]", Value::Bool(false));
    }

    #[test]
    fn test_short_circuit() {
        assert_evaluates_to("0 or \"fallback\"", s("fallback"));
        assert_evaluates_to("1 or 2", Value::Int(1));
        assert_evaluates_to("0 and 2", Value::Int(0));
        assert_evaluates_to("1 and 2", Value::Int(2));
        assert_evaluates_to("not 0", Value::Bool(true));
    }

    #[test]
    fn test_short_circuit_skips_right_operand() {
        let calls = Rc::new(RefCell::new(0));

        let mut interpreter = Interpreter::new();
        let seen = calls.clone();
        interpreter.add_function("probe", move |_args| {
            *seen.borrow_mut() += 1;
            Some(Value::Bool(true))
        });

        let run = |interp: &Interpreter, src: &str| {
            interp.run(&parse(src).unwrap(), &mut Env::new()).unwrap()
        };

        assert_eq!(run(&interpreter, "False and probe()"), Value::Bool(false));
        assert_eq!(*calls.borrow(), 0);

        assert_eq!(run(&interpreter, "True or probe()"), Value::Bool(true));
        assert_eq!(*calls.borrow(), 0);

        assert_eq!(run(&interpreter, "True and probe()"), Value::Bool(true));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_ternary() {
        assert_evaluates_to("\"yes\" if 1 else \"no\"", s("yes"));
        assert_evaluates_to("\"yes\" if 0 else \"no\"", s("no"));
    }

    #[test]
    fn test_variables() {
        let mut env = Env::new();
        env.insert(String::from("a"), Value::Int(4));
        env.insert(String::from("b"), Value::Int(2));

        assert_eq!(eval_with("a * 10 + b", &mut env), Value::Int(42));
        assert_eq!(eval_with("missing", &mut env), Value::None);
    }

    #[test]
    fn test_vars_accessor() {
        assert_evaluates_to("vars(\"missing\")", Value::None);

        let mut env = Env::new();
        env.insert(String::from("a"), Value::Int(1));
        assert_eq!(eval_with("vars(\"a\")", &mut env), Value::Int(1));
        assert_eq!(eval_with("vars()", &mut env).to_string(), "{\"a\": 1}");
        assert_eq!(eval_with("vars", &mut env).to_string(), "{\"a\": 1}");
    }

    #[test]
    fn test_calls() {
        assert_evaluates_to("len(\"hello\")", Value::Int(5));
        assert_evaluates_to("upper(\"abc\")", s("ABC"));
        assert_evaluates_to("sum([1, 2, 3])", Value::Int(6));
        assert_evaluates_to(
            "nosuch(1)",
            s("#ERR:Call to unknown function nosuch()"),
        );
        assert_evaluates_to("len(1, 2)", s("#ERR:Invalid call to len()"));
        // a failed call does not abort its siblings
        assert_evaluates_to("[len(1, 2), 42]", Value::list(vec![
            s("#ERR:Invalid call to len()"),
            Value::Int(42),
        ]));
    }

    #[test]
    fn test_entity_chains() {
        let mut env = Env::new();
        let mut inner = Dict::new();
        inner.insert(Key::str("name"), s("deep"));
        env.insert(
            String::from("data"),
            Value::list(vec![Value::dict(inner)]),
        );

        assert_eq!(eval_with("data[0].name", &mut env), s("deep"));
        assert_eq!(eval_with("data[0].name[1:3]", &mut env), s("ee"));
        assert_eq!(eval_with("data[1].name", &mut env), Value::None);
        assert_eq!(eval_with("split(\"a,b,c\", \",\")[1]", &mut env), s("b"));
    }

    #[test]
    fn test_comprehension() {
        assert_evaluates_to(
            "[x * x for x in range(5)]",
            Value::list(vec![
                Value::Int(0),
                Value::Int(1),
                Value::Int(4),
                Value::Int(9),
                Value::Int(16),
            ]),
        );
        assert_evaluates_to(
            "[x for x in range(10) if x % 2 == 0]",
            Value::list((0..10).step_by(2).map(Value::Int).collect()),
        );
        // iterating a scalar yields the scalar itself
        assert_evaluates_to("[x for x in 5]", Value::list(vec![Value::Int(5)]));
    }

    #[test]
    fn test_comprehension_scoping() {
        let mut env = Env::new();
        env.insert(String::from("x"), s("outer"));

        assert_eq!(
            eval_with("[x for x in range(3)]", &mut env),
            Value::list(vec![Value::Int(0), Value::Int(1), Value::Int(2)])
        );
        // the loop variable is restored after the comprehension
        assert_eq!(env.get("x"), Some(&s("outer")));

        eval_with("[y for y in range(3)]", &mut env);
        assert!(!env.contains_key("y"));
    }

    #[test]
    fn test_comprehension_iteration_cap() {
        let result = eval("[x for x in range(10000)]");
        match result {
            Value::List(items) => assert_eq!(items.len(), MAX_FOR_ITERATIONS),
            other => panic!("expected a list, got {:?}", other),
        }
    }

    #[test]
    fn test_slice_and_index() {
        assert_evaluates_to("[1, 2, 3][1]", Value::Int(2));
        assert_evaluates_to("[1, 2, 3][-1]", Value::Int(3));
        assert_evaluates_to("[1, 2, 3][5]", Value::None);
        assert_evaluates_to("\"hello\"[1:3]", s("el"));
        assert_evaluates_to("\"hello\"[:2]", s("he"));
        assert_evaluates_to("\"hello\"[2:]", s("llo"));
    }

    #[test]
    fn test_stray_link_emit_is_fatal() {
        // a comparison link outside a cmp node is a broken AST
        let node = Node::branch(Emit::Eq, vec![Node::leaf(Emit::Number, "1")]);
        let result = Interpreter::new().run(&node, &mut Env::new());
        assert_eq!(result, Err(Error::NotImplemented("eq")));
    }

    #[test]
    fn test_vars_emit_alias() {
        let mut env = Env::new();
        env.insert(String::from("a"), Value::Int(1));

        let node = Node::new(Emit::Vars);
        let result = Interpreter::new().run(&node, &mut env).unwrap();
        assert_eq!(result.to_string(), "{\"a\": 1}");
    }

    #[test]
    fn test_empty_stack_yields_none() {
        // an entity wrapper with no children produces nothing
        let node = Node::new(Emit::Entity);
        assert_eq!(Interpreter::new().run(&node, &mut Env::new()), Ok(Value::None));
    }
}
