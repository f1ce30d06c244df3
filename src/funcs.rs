use indexmap::IndexMap;

use crate::value::{parse_int, Key, Value};


// The built-in function library.
//
// The registry is a closed enum; every entry parses its own arguments so a
// wrong arity or an unusable argument comes back as None, which the caller
// turns into the invalid-call sentinel. Host code can add its own entries
// through Interpreter::add_function.


pub enum Function {
    Builtin(Builtin),
    Native(Box<dyn Fn(&[Value]) -> Option<Value>>),
}


impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Function::Builtin(builtin) => f.debug_tuple("Builtin").field(builtin).finish(),
            Function::Native(_) => f.debug_tuple("Native").field(&"<closure>").finish(),
        }
    }
}


impl Function {
    pub fn invoke(&self, args: &[Value]) -> Option<Value> {
        match self {
            Function::Builtin(builtin) => builtin.invoke(args),
            Function::Native(f) => f(args),
        }
    }
}


#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Builtin {
    Bool,
    Int,
    Float,
    Str,
    Len,
    Upper,
    Lower,
    Strip,
    Lstrip,
    Rstrip,
    Lfill,
    Rfill,
    Replace,
    Split,
    Join,
    Startswith,
    Endswith,
    Keys,
    Values,
    Min,
    Max,
    Sum,
    Round,
    Range,
    Currency,
    HtmlInsertImage,
}


// The core registry. The template engine registers a few more entries on
// top of these.
pub fn registry() -> IndexMap<String, Function> {
    let entries = [
        ("bool", Builtin::Bool),
        ("currency", Builtin::Currency),
        ("endswith", Builtin::Endswith),
        ("float", Builtin::Float),
        ("int", Builtin::Int),
        ("join", Builtin::Join),
        ("keys", Builtin::Keys),
        ("len", Builtin::Len),
        ("lfill", Builtin::Lfill),
        ("lower", Builtin::Lower),
        ("lstrip", Builtin::Lstrip),
        ("max", Builtin::Max),
        ("min", Builtin::Min),
        ("range", Builtin::Range),
        ("replace", Builtin::Replace),
        ("rfill", Builtin::Rfill),
        ("round", Builtin::Round),
        ("rstrip", Builtin::Rstrip),
        ("split", Builtin::Split),
        ("startswith", Builtin::Startswith),
        ("str", Builtin::Str),
        ("strip", Builtin::Strip),
        ("sum", Builtin::Sum),
        ("upper", Builtin::Upper),
        ("values", Builtin::Values),
    ];

    let mut map = IndexMap::new();
    for (name, builtin) in entries.iter() {
        map.insert(String::from(*name), Function::Builtin(*builtin));
    }
    map
}


const STRIP_CHARS: &str = " \t\r\n";


fn arity(args: &[Value], min: usize, max: usize) -> Option<()> {
    if args.len() >= min && args.len() <= max {
        Some(())
    } else {
        None
    }
}


// Optional string argument with a default.
fn str_or(args: &[Value], i: usize, default: &str) -> String {
    args.get(i).map(Value::to_string).unwrap_or_else(|| String::from(default))
}


// A fill must be exactly one character.
fn fill_char(args: &[Value], i: usize) -> Option<String> {
    let fill = str_or(args, i, " ");
    if fill.chars().count() == 1 {
        Some(fill)
    } else {
        None
    }
}


impl Builtin {
    pub fn invoke(&self, args: &[Value]) -> Option<Value> {
        match self {
            Builtin::Bool => {
                arity(args, 1, 1)?;
                Some(Value::Bool(args[0].truthy()))
            }
            Builtin::Int => {
                arity(args, 1, 1)?;
                Some(Value::Int(args[0].as_int()))
            }
            Builtin::Float => {
                arity(args, 1, 1)?;
                Some(Value::float(args[0].as_float()))
            }
            // the one non-normalizing entry: str("4112") stays a string
            Builtin::Str => {
                arity(args, 1, 1)?;
                Some(Value::string(args[0].to_string()))
            }
            Builtin::Len => {
                arity(args, 1, 1)?;
                Some(Value::Int(args[0].len() as i64))
            }
            Builtin::Upper => {
                arity(args, 1, 1)?;
                Some(Value::optimized(&args[0].to_string().to_uppercase()))
            }
            Builtin::Lower => {
                arity(args, 1, 1)?;
                Some(Value::optimized(&args[0].to_string().to_lowercase()))
            }
            Builtin::Strip | Builtin::Lstrip | Builtin::Rstrip => {
                arity(args, 1, 2)?;
                let s = args[0].to_string();
                let chars = str_or(args, 1, STRIP_CHARS);
                let pat = |c: char| chars.contains(c);

                let stripped = match self {
                    Builtin::Lstrip => s.trim_start_matches(pat),
                    Builtin::Rstrip => s.trim_end_matches(pat),
                    _ => s.trim_matches(pat),
                };
                Some(Value::optimized(stripped))
            }
            Builtin::Lfill | Builtin::Rfill => {
                arity(args, 2, 3)?;
                let s = args[0].to_string();
                let width = args[1].as_int().max(0) as usize;
                let fill = fill_char(args, 2)?;

                let missing = width.saturating_sub(s.chars().count());
                let pad = fill.repeat(missing);

                let filled = if *self == Builtin::Lfill {
                    format!("{}{}", pad, s)
                } else {
                    format!("{}{}", s, pad)
                };
                Some(Value::optimized(&filled))
            }
            Builtin::Replace => {
                arity(args, 1, 3)?;
                let mut s = args[0].to_string();
                let repl = str_or(args, 2, "");

                // a list of patterns applies each in order
                let patterns = match args.get(1) {
                    Some(Value::List(items)) => {
                        items.iter().map(Value::to_string).collect::<Vec<_>>()
                    }
                    Some(find) => vec![find.to_string()],
                    None => vec![String::from(" ")],
                };

                for find in patterns {
                    s = s.replace(&find, &repl);
                }
                Some(Value::optimized(&s))
            }
            Builtin::Split => {
                arity(args, 1, 2)?;
                let s = args[0].to_string();
                let sep = str_or(args, 1, ",");
                if sep.is_empty() {
                    return None;
                }
                Some(Value::list(
                    s.split(sep.as_str()).map(|part| Value::string(String::from(part))).collect(),
                ))
            }
            Builtin::Join => {
                arity(args, 1, 2)?;
                let sep = str_or(args, 1, ", ");
                let parts: Vec<String> =
                    args[0].projected_list().iter().map(Value::to_string).collect();
                Some(Value::optimized(&parts.join(&sep)))
            }
            Builtin::Startswith => {
                arity(args, 2, 2)?;
                Some(Value::Bool(args[0].to_string().starts_with(&args[1].to_string())))
            }
            Builtin::Endswith => {
                arity(args, 2, 2)?;
                Some(Value::Bool(args[0].to_string().ends_with(&args[1].to_string())))
            }
            Builtin::Keys => {
                arity(args, 1, 1)?;
                Some(Value::list(args[0].projected_dict().keys().map(Key::to_value).collect()))
            }
            Builtin::Values => {
                arity(args, 1, 1)?;
                Some(Value::list(args[0].projected_dict().values().cloned().collect()))
            }
            Builtin::Min | Builtin::Max => {
                arity(args, 1, 1)?;
                let want_max = *self == Builtin::Max;
                let mut best: Option<Value> = None;

                for item in args[0].iterate() {
                    best = match best {
                        None => Some(item),
                        Some(current) => {
                            if (want_max && item.gt(&current)) || (!want_max && item.lt(&current)) {
                                Some(item)
                            } else {
                                Some(current)
                            }
                        }
                    };
                }
                Some(best.unwrap_or(Value::None))
            }
            Builtin::Sum => {
                arity(args, 1, 1)?;
                let mut acc = Value::Int(0);

                for item in args[0].iterate() {
                    // non-numeric entries coerce through the parse helpers
                    let term = match &item {
                        Value::Bool(_) | Value::Int(_) | Value::Float(_) => item.clone(),
                        Value::Str(s) => Value::Int(parse_int(s).unwrap_or(0)),
                        _ => Value::Int(0),
                    };
                    acc = acc.add(&term);
                }
                Some(acc)
            }
            Builtin::Round => {
                arity(args, 1, 2)?;
                let value = args[0].as_float();
                let digits = args.get(1).map(Value::as_int).unwrap_or(0);

                let scale = 10f64.powi(digits as i32);
                Some(Value::float((value * scale).round_ties_even() / scale))
            }
            Builtin::Range => {
                arity(args, 1, 3)?;
                let (start, end, step) = match args.len() {
                    1 => (0, args[0].as_int(), 1),
                    2 => (args[0].as_int(), args[1].as_int(), 1),
                    _ => (args[0].as_int(), args[1].as_int(), args[2].as_int()),
                };

                if step == 0 {
                    return None;
                }

                let mut items = Vec::new();
                let mut i = start;
                while (step > 0 && i < end) || (step < 0 && i > end) {
                    items.push(Value::Int(i));
                    i = match i.checked_add(step) {
                        Some(next) => next,
                        None => break,
                    };
                }
                Some(Value::list(items))
            }
            Builtin::Currency => {
                arity(args, 1, 4)?;
                let value = args[0].as_float();
                let decimal = str_or(args, 1, ",");
                let thousands = str_or(args, 2, ".");
                let symbol = str_or(args, 3, "\u{20ac}");

                let fixed = format!("{:.2}", value);
                let (before, behind) = match fixed.split_once('.') {
                    Some(parts) => parts,
                    None => (fixed.as_str(), "00"),
                };

                // group every three digits from the right
                let mut grouped = String::new();
                for (i, ch) in before.chars().rev().enumerate() {
                    if i > 0 && i % 3 == 0 {
                        grouped = format!("{}{}{}", ch, thousands, grouped);
                    } else {
                        grouped = format!("{}{}", ch, grouped);
                    }
                }

                let mut out = format!("{}{}{}", grouped, decimal, behind);
                if !symbol.is_empty() {
                    out = format!("{} {}", out, symbol);
                }
                Some(Value::optimized(out.trim()))
            }
            Builtin::HtmlInsertImage => {
                arity(args, 1, 4)?;
                Some(html_insert_image(
                    args.get(0).unwrap_or(&Value::None),
                    args.get(1).unwrap_or(&Value::None),
                    args.get(2).unwrap_or(&Value::None),
                    args.get(3).unwrap_or(&Value::None),
                ))
            }
        }
    }
}


// Builds an <img> tag from either an image-info dict carrying
// `servingurl`/`dlkey` keys or a plain URL string. Serving URLs get a size
// suffix; everything else a width attribute when a size is given.
fn html_insert_image(info: &Value, size: &Value, fallback: &Value, flip: &Value) -> Value {
    let size = parse_int(&size.to_string()).unwrap_or(0);
    let info = if info.truthy() { info } else { fallback };

    let mut attrs: Vec<(&str, String)> = Vec::new();
    let mut serving_url = false;

    if matches!(flip, Value::Bool(true)) {
        attrs.push(("style", String::from("transform: scaleX(-1);")));
    }

    let src = match info {
        Value::Dict(entries)
            if entries.contains_key(&Key::str("dlkey"))
                && entries.contains_key(&Key::str("servingurl")) =>
        {
            let mut img = entries
                .get(&Key::str("servingurl"))
                .map(Value::to_string)
                .unwrap_or_default();

            let title = entries
                .get(&Key::str("title"))
                .or_else(|| entries.get(&Key::str("name")))
                .cloned()
                .unwrap_or(Value::None);
            if title.truthy() {
                attrs.push(("title", title.to_string()));
            }

            if img.is_empty() {
                img = format!(
                    "/file/download/{}",
                    entries.get(&Key::str("dlkey")).map(Value::to_string).unwrap_or_default()
                );
            } else if !img.starts_with("/_ah/img/") {
                serving_url = true;
                img = format!("{}=s{}", img, size);
            }
            img
        }
        other if other.truthy() => other.to_string(),
        _ => return Value::string(String::new()),
    };

    attrs.push(("src", src));
    if !serving_url && size > 0 {
        attrs.push(("width", size.to_string()));
    }

    let rendered: Vec<String> =
        attrs.iter().map(|(k, v)| format!("{}=\"{}\"", k, v)).collect();
    Value::string(format!("<img {}>", rendered.join(" ")))
}


#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::value::Dict;

    fn s(v: &str) -> Value {
        Value::Str(Rc::new(String::from(v)))
    }

    fn call(builtin: Builtin, args: &[Value]) -> Value {
        builtin.invoke(args).expect("call failed")
    }

    fn invalid(builtin: Builtin, args: &[Value]) {
        assert_eq!(builtin.invoke(args), None);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(call(Builtin::Bool, &[Value::Int(0)]), Value::Bool(false));
        assert_eq!(call(Builtin::Int, &[s("12.9")]), Value::Int(12));
        assert_eq!(call(Builtin::Int, &[Value::Float(-12.9)]), Value::Int(-12));
        assert_eq!(call(Builtin::Float, &[s("1.5x")]), Value::Float(1.5));
        // float() of an integral value collapses like any construction
        assert_eq!(call(Builtin::Float, &[s("4")]), Value::Int(4));
        assert_eq!(call(Builtin::Str, &[Value::Int(4112)]), s("4112"));
        invalid(Builtin::Int, &[]);
        invalid(Builtin::Int, &[Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_len() {
        assert_eq!(call(Builtin::Len, &[s("hello")]), Value::Int(5));
        assert_eq!(call(Builtin::Len, &[Value::Int(123)]), Value::Int(3));
    }

    #[test]
    fn test_case() {
        assert_eq!(call(Builtin::Upper, &[s("héllo")]), s("HÉLLO"));
        assert_eq!(call(Builtin::Lower, &[s("ABC")]), s("abc"));
    }

    #[test]
    fn test_strip() {
        assert_eq!(call(Builtin::Strip, &[s("  hi \t")]), s("hi"));
        assert_eq!(call(Builtin::Lstrip, &[s("  hi ")]), s("hi "));
        assert_eq!(call(Builtin::Rstrip, &[s("  hi ")]), s("  hi"));
        assert_eq!(call(Builtin::Strip, &[s("xxhixx"), s("x")]), s("hi"));
    }

    #[test]
    fn test_fill() {
        assert_eq!(call(Builtin::Lfill, &[s("7"), Value::Int(3), s("0")]), s("007"));
        assert_eq!(call(Builtin::Rfill, &[s("ab"), Value::Int(4)]), s("ab  "));
        assert_eq!(call(Builtin::Lfill, &[s("abc"), Value::Int(2)]), s("abc"));
        invalid(Builtin::Lfill, &[s("x"), Value::Int(3), s("ab")]);
    }

    #[test]
    fn test_replace() {
        assert_eq!(call(Builtin::Replace, &[s("a-b-c"), s("-"), s("+")]), s("a+b+c"));
        assert_eq!(call(Builtin::Replace, &[s("a b")]), s("ab"));
        assert_eq!(
            call(
                Builtin::Replace,
                &[s("a-b_c"), Value::list(vec![s("-"), s("_")]), s("")]
            ),
            s("abc")
        );
    }

    #[test]
    fn test_split_join() {
        assert_eq!(
            call(Builtin::Split, &[s("a,b,c")]),
            Value::list(vec![s("a"), s("b"), s("c")])
        );
        assert_eq!(
            call(Builtin::Split, &[s("a - b"), s(" - ")]),
            Value::list(vec![s("a"), s("b")])
        );
        invalid(Builtin::Split, &[s("abc"), s("")]);

        assert_eq!(
            call(Builtin::Join, &[Value::list(vec![s("a"), s("b")]), s("+")]),
            s("a+b")
        );
        assert_eq!(
            call(Builtin::Join, &[Value::list(vec![Value::Int(1), Value::Int(2)])]),
            s("1, 2")
        );
    }

    #[test]
    fn test_affix_tests() {
        assert_eq!(call(Builtin::Startswith, &[s("hello"), s("he")]), Value::Bool(true));
        assert_eq!(call(Builtin::Endswith, &[s("hello"), s("lo")]), Value::Bool(true));
        assert_eq!(call(Builtin::Endswith, &[s("hello"), s("he")]), Value::Bool(false));
    }

    #[test]
    fn test_keys_values() {
        let mut entries = Dict::new();
        entries.insert(Key::str("a"), Value::Int(1));
        entries.insert(Key::str("b"), Value::Int(2));
        let dict = Value::dict(entries);

        assert_eq!(call(Builtin::Keys, &[dict.clone()]), Value::list(vec![s("a"), s("b")]));
        assert_eq!(
            call(Builtin::Values, &[dict]),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        );

        // non-dicts project their elements onto themselves
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            call(Builtin::Keys, &[list]),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_min_max_sum() {
        let list = Value::list(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        assert_eq!(call(Builtin::Min, &[list.clone()]), Value::Int(1));
        assert_eq!(call(Builtin::Max, &[list.clone()]), Value::Int(3));
        assert_eq!(call(Builtin::Sum, &[list]), Value::Int(6));

        assert_eq!(call(Builtin::Min, &[Value::list(vec![])]), Value::None);

        // non-numeric entries coerce via the parse helpers
        let mixed = Value::list(vec![Value::Int(1), s("abc"), Value::Float(0.5), s("2x")]);
        assert_eq!(call(Builtin::Sum, &[mixed]), Value::Float(3.5));
    }

    #[test]
    fn test_round() {
        // ties round to even
        assert_eq!(call(Builtin::Round, &[Value::Float(2.5)]), Value::Int(2));
        assert_eq!(call(Builtin::Round, &[Value::Float(3.5)]), Value::Int(4));
        assert_eq!(call(Builtin::Round, &[s("7.4")]), Value::Int(7));
        assert_eq!(
            call(Builtin::Round, &[Value::Float(12.3456), Value::Int(2)]),
            Value::Float(12.35)
        );
    }

    #[test]
    fn test_range() {
        assert_eq!(
            call(Builtin::Range, &[Value::Int(5)]),
            Value::list((0..5).map(Value::Int).collect())
        );
        assert_eq!(
            call(Builtin::Range, &[Value::Int(2), Value::Int(5)]),
            Value::list(vec![Value::Int(2), Value::Int(3), Value::Int(4)])
        );
        assert_eq!(
            call(Builtin::Range, &[Value::Int(5), Value::Int(0), Value::Int(-2)]),
            Value::list(vec![Value::Int(5), Value::Int(3), Value::Int(1)])
        );
        invalid(Builtin::Range, &[Value::Int(1), Value::Int(5), Value::Int(0)]);
    }

    #[test]
    fn test_currency() {
        assert_eq!(call(Builtin::Currency, &[Value::Int(1000)]), s("1.000,00 €"));
        assert_eq!(
            call(Builtin::Currency, &[Value::Float(-1234.5)]),
            s("-1.234,50 €")
        );
        assert_eq!(
            call(
                Builtin::Currency,
                &[Value::Float(1234.56), s("."), s(","), s("$")]
            ),
            s("1,234.56 $")
        );
    }

    #[test]
    fn test_html_insert_image_url() {
        assert_eq!(
            call(Builtin::HtmlInsertImage, &[s("/img/logo.png")]),
            s("<img src=\"/img/logo.png\">")
        );
        assert_eq!(
            call(Builtin::HtmlInsertImage, &[s("/img/logo.png"), Value::Int(100)]),
            s("<img src=\"/img/logo.png\" width=\"100\">")
        );
        assert_eq!(call(Builtin::HtmlInsertImage, &[Value::None]), s(""));
        assert_eq!(
            call(Builtin::HtmlInsertImage, &[Value::None, Value::None, s("/fallback.png")]),
            s("<img src=\"/fallback.png\">")
        );
    }

    #[test]
    fn test_html_insert_image_info() {
        let mut info = Dict::new();
        info.insert(Key::str("servingurl"), s("https://img.example/x"));
        info.insert(Key::str("dlkey"), s("abc123"));
        info.insert(Key::str("title"), s("Logo"));

        assert_eq!(
            call(Builtin::HtmlInsertImage, &[Value::dict(info.clone()), Value::Int(64)]),
            s("<img title=\"Logo\" src=\"https://img.example/x=s64\">")
        );

        info.insert(Key::str("servingurl"), s(""));
        assert_eq!(
            call(Builtin::HtmlInsertImage, &[Value::dict(info), Value::Int(64)]),
            s("<img title=\"Logo\" src=\"/file/download/abc123\" width=\"64\">")
        );
    }

    #[test]
    fn test_registry_names() {
        let registry = registry();
        for name in ["bool", "int", "float", "str", "len", "range", "currency"] {
            assert!(registry.contains_key(name), "missing {}", name);
        }
        assert!(!registry.contains_key("htmlInsertImage"));
    }
}
