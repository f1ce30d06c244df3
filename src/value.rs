use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use indexmap::IndexMap;
use regex::{Captures, Regex};


// The weakly-typed value model of the expression language.
//
// Values are immutable under operators: every operation returns a fresh
// Value. Mixed-type operands are promoted in a single place (`promote`)
// instead of per-operator, and every string produced by an operator is
// re-normalized, so "4" + "2" yields Int(42) while "he" + "llo" stays a
// string.
//
// Runtime value errors never escape as host errors. Division by zero, the
// string length cap and friends come back as sentinel strings starting with
// "#ERR", which flow through subsequent operators like any other string.


pub const MAX_STRING_LENGTH: usize = 32 * 1024;

const ERR_MAX_STRING_LENGTH: &str = "#ERR limit of 32768 reached";
const ERR_DIVISION_BY_ZERO: &str = "#ERR:division by zero";
const ERR_MODULO_BY_ZERO: &str = "#ERR:modulo by zero";


pub type Dict = IndexMap<Key, Value>;


#[derive(Clone, Debug)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<String>),
    List(Rc<Vec<Value>>),
    Dict(Rc<Dict>),
}


// Dict keys are values restricted to the scalar variants.
#[derive(Clone, Debug)]
pub enum Key {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<String>),
}


// Parses the longest leading signed digit run of a string, JavaScript
// style. Everything after the prefix is discarded; no digits means no
// number.
pub fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let mut prefix = String::new();
    let mut digits = 0;

    for (i, ch) in s.chars().enumerate() {
        match ch {
            '+' | '-' if i == 0 => prefix.push(ch),
            '0'..='9' => {
                digits += 1;
                prefix.push(ch);
            }
            _ => break,
        }
    }

    if digits == 0 {
        return None;
    }

    match prefix.parse::<i64>() {
        Ok(value) => Some(value),
        // Longer digit runs than i64 can hold saturate.
        Err(_) => Some(if prefix.starts_with('-') { i64::MIN } else { i64::MAX }),
    }
}


// Float variant of parse_int: the leading run may contain one dot.
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let mut prefix = String::new();
    let mut digits = 0;
    let mut dot = false;

    for (i, ch) in s.chars().enumerate() {
        match ch {
            '+' | '-' if i == 0 => prefix.push(ch),
            '.' if !dot => {
                dot = true;
                prefix.push(ch);
            }
            '0'..='9' => {
                digits += 1;
                prefix.push(ch);
            }
            _ => break,
        }
    }

    if digits == 0 {
        return None;
    }

    prefix.parse::<f64>().ok()
}


lazy_static! {
    static ref ESCAPE: Regex =
        Regex::new(r"\\(x[0-9A-Fa-f]{2}|u[0-9A-Fa-f]{4}|U[0-9A-Fa-f]{8}|.)").unwrap();
}


// Replaces escape sequences in a string literal body by their characters.
//
// Unknown sequences lose the backslash; malformed hex sequences and hex
// values outside the Unicode range pass through unchanged.
pub fn unescape(s: &str) -> String {
    ESCAPE
        .replace_all(s, |caps: &Captures| {
            let seq = &caps[1];

            if seq.len() > 1 {
                return match u32::from_str_radix(&seq[1..], 16).ok().and_then(char::from_u32) {
                    Some(ch) => ch.to_string(),
                    None => caps[0].to_string(),
                };
            }

            match seq.chars().next() {
                Some('a') => "\x07".to_string(),
                Some('b') => "\x08".to_string(),
                Some('f') => "\x0c".to_string(),
                Some('n') => "\n".to_string(),
                Some('r') => "\r".to_string(),
                Some('t') => "\t".to_string(),
                Some('v') => "\x0b".to_string(),
                // a bare x/u/U means the hex digits did not match
                Some('x') | Some('u') | Some('U') => caps[0].to_string(),
                _ => seq.to_string(),
            }
        })
        .into_owned()
}


// Python-style float rendering: integral floats keep a trailing ".0" so
// they stay distinguishable from ints in output.
fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return String::from("nan");
    }
    if f.is_infinite() {
        return String::from(if f < 0.0 { "-inf" } else { "inf" });
    }

    let mut s = f.to_string();
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}


fn over_cap(s: &str) -> bool {
    s.len() > MAX_STRING_LENGTH && s.chars().count() > MAX_STRING_LENGTH
}


// Numeric promotion for binary operators; the one place where mixed
// operand types are reconciled.
enum Operands {
    Floats(f64, f64),
    Ints(i64, i64),
}


impl Value {
    // Constructors. Operator and builtin results are built through these so
    // the normalization invariants hold everywhere.

    // A string operand result: subject to the length cap, not re-parsed.
    pub fn string(s: String) -> Value {
        if over_cap(&s) {
            return Value::Str(Rc::new(String::from(ERR_MAX_STRING_LENGTH)));
        }
        Value::Str(Rc::new(s))
    }

    // A normalizing string constructor: "4112" becomes Int(4112), "12.5"
    // becomes Float(12.5), anything that does not re-stringify to the
    // original stays a string.
    pub fn optimized(s: &str) -> Value {
        if over_cap(s) {
            return Value::Str(Rc::new(String::from(ERR_MAX_STRING_LENGTH)));
        }

        if let Some(f) = parse_float(s) {
            if float_repr(f) == s {
                return Value::float(f);
            }
        }
        if let Some(i) = parse_int(s) {
            if i.to_string() == s {
                return Value::Int(i);
            }
        }

        Value::Str(Rc::new(String::from(s)))
    }

    // Template output: not an operand, so neither capped nor re-parsed.
    pub fn text(s: String) -> Value {
        Value::Str(Rc::new(s))
    }

    // A float that equals its truncated integer counterpart collapses.
    pub fn float(f: f64) -> Value {
        if f.is_finite() && f.trunc() == f && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
            return Value::Int(f as i64);
        }
        Value::Float(f)
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    pub fn dict(entries: Dict) -> Value {
        Value::Dict(Rc::new(entries))
    }

    fn zero_division() -> Value {
        Value::Str(Rc::new(String::from(ERR_DIVISION_BY_ZERO)))
    }

    fn zero_modulo() -> Value {
        Value::Str(Rc::new(String::from(ERR_MODULO_BY_ZERO)))
    }

    // Projections ---------------------------------------------------------

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.is_empty(),
        }
    }

    pub fn as_int(&self) -> i64 {
        match self {
            Value::None => 0,
            Value::Bool(b) => *b as i64,
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::Str(s) => parse_int(s).unwrap_or(0),
            Value::List(_) | Value::Dict(_) => 0,
        }
    }

    pub fn as_float(&self) -> f64 {
        match self {
            Value::None => 0.0,
            Value::Bool(b) => *b as i64 as f64,
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Str(s) => parse_float(s).unwrap_or(0.0),
            Value::List(_) | Value::Dict(_) => 0.0,
        }
    }

    fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Bool(_) | Value::Int(_) | Value::Float(_))
    }

    // Str, List and Dict use their natural length; everything else the
    // length of its string rendering.
    pub fn len(&self) -> usize {
        match self {
            Value::Str(s) => s.chars().count(),
            Value::List(items) => items.len(),
            Value::Dict(entries) => entries.len(),
            other => other.to_string().chars().count(),
        }
    }

    // A List yields its elements, a Dict its keys, anything else a
    // single-element sequence containing itself.
    pub fn iterate(&self) -> Vec<Value> {
        match self {
            Value::List(items) => items.as_ref().clone(),
            Value::Dict(entries) => entries.keys().map(Key::to_value).collect(),
            other => vec![other.clone()],
        }
    }

    // A non-list becomes a single-element list.
    pub fn projected_list(&self) -> Vec<Value> {
        match self {
            Value::List(items) => items.as_ref().clone(),
            other => vec![other.clone()],
        }
    }

    // A non-dict becomes a mapping of its elements onto themselves.
    // Elements that cannot serve as keys are skipped.
    pub fn projected_dict(&self) -> Dict {
        match self {
            Value::Dict(entries) => entries.as_ref().clone(),
            other => {
                let mut entries = Dict::new();
                for item in other.projected_list() {
                    if let Some(key) = Key::from_value(&item) {
                        entries.insert(key, item);
                    }
                }
                entries
            }
        }
    }

    // Comparison ----------------------------------------------------------

    pub fn value_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.value_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).map_or(false, |w| v.value_eq(w)))
            }
            (a, b) if a.is_numeric() && b.is_numeric() => {
                if a.is_float() || b.is_float() {
                    a.as_float() == b.as_float()
                } else {
                    a.as_int() == b.as_int()
                }
            }
            _ => false,
        }
    }

    // Ordering over the underlying payloads. Incomparable types yield no
    // ordering, which every relational operator reads as false.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.value_eq(y) {
                        return x.compare(y);
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (a, b) if a.is_numeric() && b.is_numeric() => {
                if a.is_float() || b.is_float() {
                    a.as_float().partial_cmp(&b.as_float())
                } else {
                    Some(a.as_int().cmp(&b.as_int()))
                }
            }
            _ => None,
        }
    }

    pub fn lt(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Less)
    }

    pub fn lte(&self, other: &Value) -> bool {
        matches!(self.compare(other), Some(Ordering::Less | Ordering::Equal))
    }

    pub fn gt(&self, other: &Value) -> bool {
        self.compare(other) == Some(Ordering::Greater)
    }

    pub fn gte(&self, other: &Value) -> bool {
        matches!(self.compare(other), Some(Ordering::Greater | Ordering::Equal))
    }

    // Lists and dicts test element/key equality; everything else tests
    // substring containment of the stringified probe.
    pub fn contains(&self, probe: &Value) -> bool {
        match self {
            Value::List(items) => items.iter().any(|item| item.value_eq(probe)),
            Value::Dict(entries) => {
                Key::from_value(probe).map_or(false, |key| entries.contains_key(&key))
            }
            _ => self.to_string().contains(&probe.to_string()),
        }
    }

    // Arithmetic ----------------------------------------------------------

    fn promote(&self, other: &Value) -> Operands {
        if self.is_float() || other.is_float() {
            Operands::Floats(self.as_float(), other.as_float())
        } else {
            Operands::Ints(self.as_int(), other.as_int())
        }
    }

    pub fn add(&self, other: &Value) -> Value {
        if self.is_str() || other.is_str() {
            return Value::optimized(&format!("{}{}", self, other));
        }

        match self.promote(other) {
            Operands::Floats(a, b) => Value::float(a + b),
            Operands::Ints(a, b) => match a.checked_add(b) {
                Some(v) => Value::Int(v),
                None => Value::float(a as f64 + b as f64),
            },
        }
    }

    pub fn sub(&self, other: &Value) -> Value {
        match self.promote(other) {
            Operands::Floats(a, b) => Value::float(a - b),
            Operands::Ints(a, b) => match a.checked_sub(b) {
                Some(v) => Value::Int(v),
                None => Value::float(a as f64 - b as f64),
            },
        }
    }

    pub fn mul(&self, other: &Value) -> Value {
        if self.is_str() || other.is_str() {
            let (pattern, count) = if self.is_str() {
                (self.to_string(), other.as_int())
            } else {
                (other.to_string(), self.as_int())
            };

            if count <= 0 {
                return Value::string(String::new());
            }
            if count as i128 * pattern.chars().count() as i128 > MAX_STRING_LENGTH as i128 {
                return Value::Str(Rc::new(String::from(ERR_MAX_STRING_LENGTH)));
            }

            return Value::optimized(&pattern.repeat(count as usize));
        }

        match self.promote(other) {
            Operands::Floats(a, b) => Value::float(a * b),
            Operands::Ints(a, b) => match a.checked_mul(b) {
                Some(v) => Value::Int(v),
                None => Value::float(a as f64 * b as f64),
            },
        }
    }

    pub fn div(&self, other: &Value) -> Value {
        match self.promote(other) {
            Operands::Floats(a, b) => {
                if b == 0.0 {
                    Value::zero_division()
                } else {
                    Value::float(a / b)
                }
            }
            Operands::Ints(a, b) => {
                if b == 0 {
                    Value::zero_division()
                } else if let (Some(q), Some(0)) = (a.checked_div(b), a.checked_rem(b)) {
                    Value::Int(q)
                } else {
                    Value::float(a as f64 / b as f64)
                }
            }
        }
    }

    // Floor division is always integer.
    pub fn idiv(&self, other: &Value) -> Value {
        let a = self.as_int();
        let b = other.as_int();

        if b == 0 {
            return Value::zero_division();
        }

        match a.checked_div(b) {
            Some(q) => {
                if a.checked_rem(b) != Some(0) && (a < 0) != (b < 0) {
                    Value::Int(q - 1)
                } else {
                    Value::Int(q)
                }
            }
            None => Value::float(a as f64 / b as f64),
        }
    }

    // Modulo with the sign of the divisor.
    pub fn modulo(&self, other: &Value) -> Value {
        match self.promote(other) {
            Operands::Floats(a, b) => {
                if b == 0.0 {
                    return Value::zero_modulo();
                }
                let r = a % b;
                if r != 0.0 && (r < 0.0) != (b < 0.0) {
                    Value::float(r + b)
                } else {
                    Value::float(r)
                }
            }
            Operands::Ints(a, b) => {
                if b == 0 {
                    return Value::zero_modulo();
                }
                let r = a.checked_rem(b).unwrap_or(0);
                if r != 0 && (r < 0) != (b < 0) {
                    Value::Int(r + b)
                } else {
                    Value::Int(r)
                }
            }
        }
    }

    pub fn pow(&self, other: &Value) -> Value {
        match self.promote(other) {
            Operands::Floats(a, b) => Value::float(a.powf(b)),
            Operands::Ints(a, b) => {
                if b < 0 || b > u32::MAX as i64 {
                    return Value::float((a as f64).powf(b as f64));
                }
                match a.checked_pow(b as u32) {
                    Some(v) => Value::Int(v),
                    None => Value::float((a as f64).powf(b as f64)),
                }
            }
        }
    }

    pub fn pos(&self) -> Value {
        if self.is_float() {
            Value::float(self.as_float())
        } else {
            Value::Int(self.as_int())
        }
    }

    pub fn neg(&self) -> Value {
        if self.is_float() {
            Value::float(-self.as_float())
        } else {
            let a = self.as_int();
            match a.checked_neg() {
                Some(v) => Value::Int(v),
                None => Value::float(-(a as f64)),
            }
        }
    }

    pub fn invert(&self) -> Value {
        Value::Int(!self.as_int())
    }

    // Indexing and slicing ------------------------------------------------

    // Dict: value for the key or None. List: element by (possibly
    // negative) integer index. Anything else indexes its rendering.
    // Out-of-range and invalid indices yield None.
    pub fn index(&self, idx: &Value) -> Value {
        match self {
            Value::Dict(entries) => Key::from_value(idx)
                .and_then(|key| entries.get(&key).cloned())
                .unwrap_or(Value::None),
            Value::List(items) => int_index(idx)
                .and_then(|i| normalize_index(i, items.len()))
                .map(|i| items[i].clone())
                .unwrap_or(Value::None),
            other => {
                let chars: Vec<char> = other.to_string().chars().collect();
                int_index(idx)
                    .and_then(|i| normalize_index(i, chars.len()))
                    .map(|i| Value::optimized(&chars[i].to_string()))
                    .unwrap_or(Value::None)
            }
        }
    }

    // The subsequence between two bounds. Dicts cannot be sliced; scalars
    // slice their rendering. Invalid bounds yield None.
    pub fn slice(&self, start: &Value, end: &Value) -> Value {
        let (start, end) = match (slice_bound(start), slice_bound(end)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Value::None,
        };

        match self {
            Value::Dict(_) => Value::None,
            Value::List(items) => {
                let (a, b) = slice_range(start, end, items.len());
                Value::List(Rc::new(items[a..b].to_vec()))
            }
            other => {
                let chars: Vec<char> = other.to_string().chars().collect();
                let (a, b) = slice_range(start, end, chars.len());
                Value::optimized(&chars[a..b].iter().collect::<String>())
            }
        }
    }

    // Rendering -----------------------------------------------------------

    // Deterministic representation: strings double-quoted with backslash
    // escapes, containers rendered recursively.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Dict(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.to_value().repr(), v.repr()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            other => other.to_string(),
        }
    }
}


fn int_index(idx: &Value) -> Option<i64> {
    match idx {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(*b as i64),
        _ => None,
    }
}


fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let i = if i < 0 { i + len as i64 } else { i };
    if i >= 0 && (i as usize) < len {
        Some(i as usize)
    } else {
        None
    }
}


fn slice_bound(v: &Value) -> Option<Option<i64>> {
    match v {
        Value::None => Some(None),
        Value::Int(i) => Some(Some(*i)),
        Value::Bool(b) => Some(Some(*b as i64)),
        _ => None,
    }
}


fn slice_range(start: Option<i64>, end: Option<i64>, len: usize) -> (usize, usize) {
    let len = len as i64;
    let clamp = |i: i64| {
        let i = if i < 0 { i + len } else { i };
        i.max(0).min(len)
    };

    let a = clamp(start.unwrap_or(0));
    let b = clamp(end.unwrap_or(len));
    (a as usize, b.max(a) as usize)
}


impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => f.write_str(&float_repr(*x)),
            Value::Str(s) => f.write_str(s),
            Value::List(_) | Value::Dict(_) => f.write_str(&self.repr()),
        }
    }
}


impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.value_eq(other)
    }
}


impl Key {
    pub fn str(s: &str) -> Key {
        Key::Str(Rc::new(String::from(s)))
    }

    pub fn from_value(v: &Value) -> Option<Key> {
        match v {
            Value::None => Some(Key::None),
            Value::Bool(b) => Some(Key::Bool(*b)),
            Value::Int(i) => Some(Key::Int(*i)),
            Value::Float(f) => Some(Key::Float(*f)),
            Value::Str(s) => Some(Key::Str(s.clone())),
            Value::List(_) | Value::Dict(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::None => Value::None,
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Float(f) => Value::Float(*f),
            Key::Str(s) => Value::Str(s.clone()),
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Key::Bool(b) => Some(*b as i64),
            Key::Int(i) => Some(*i),
            _ => None,
        }
    }
}


impl PartialEq for Key {
    fn eq(&self, other: &Key) -> bool {
        match (self, other) {
            (Key::None, Key::None) => true,
            (Key::Str(a), Key::Str(b)) => a == b,
            (Key::Float(a), Key::Float(b)) => a.to_bits() == b.to_bits(),
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Key::None => 0u8.hash(state),
            // bools hash like their integer counterparts
            Key::Bool(b) => {
                1u8.hash(state);
                (*b as i64).hash(state);
            }
            Key::Int(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Key::Float(f) => {
                2u8.hash(state);
                f.to_bits().hash(state);
            }
            Key::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
        }
    }
}
