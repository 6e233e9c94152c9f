//! Map keys.
//!
//! Keys are ordered so that map iteration in `range` is deterministic:
//! booleans sort first, then numbers by value regardless of their kind,
//! then strings.

use std::cmp::Ordering;
use std::fmt;

use super::{format::format_float, Value};

/// Key of a [`Value::Map`].
#[derive(Clone, Debug)]
pub enum Key {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
}

impl Key {
    /// Key for a scalar value; `None` for values that cannot key a map.
    pub fn from_value(value: &Value) -> Option<Key> {
        Some(match value {
            Value::Bool(b) => Key::Bool(*b),
            Value::Int(n) => Key::Int(*n),
            Value::Uint(n) => Key::Uint(*n),
            Value::Float(n) => Key::Float(*n),
            Value::Str(s) => Key::Str(s.to_string()),
            Value::Some(inner) => return Key::from_value(inner),
            _ => return None,
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(n) => Value::Int(*n),
            Key::Uint(n) => Value::Uint(*n),
            Key::Float(n) => Value::Float(*n),
            Key::Str(s) => Value::string(s.as_str()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            _ => None,
        }
    }

    fn class(&self) -> u8 {
        match self {
            Key::Bool(_) => 0,
            Key::Int(_) | Key::Uint(_) | Key::Float(_) => 1,
            Key::Str(_) => 2,
        }
    }

    fn numeric_rank(&self) -> u8 {
        match self {
            Key::Int(_) => 0,
            Key::Uint(_) => 1,
            _ => 2,
        }
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "mixed int/float keys compare approximately, ties break on kind"
)]
fn compare_numbers(a: &Key, b: &Key) -> Ordering {
    let by_value = match (a, b) {
        (Key::Int(x), Key::Int(y)) => x.cmp(y),
        (Key::Uint(x), Key::Uint(y)) => x.cmp(y),
        (Key::Float(x), Key::Float(y)) => x.total_cmp(y),
        (Key::Int(x), Key::Uint(y)) => match u64::try_from(*x) {
            Ok(x) => x.cmp(y),
            Err(_) => Ordering::Less,
        },
        (Key::Uint(x), Key::Int(y)) => match u64::try_from(*y) {
            Ok(y) => x.cmp(&y),
            Err(_) => Ordering::Greater,
        },
        (Key::Int(x), Key::Float(y)) => (*x as f64).total_cmp(y),
        (Key::Uint(x), Key::Float(y)) => (*x as f64).total_cmp(y),
        (Key::Float(x), Key::Int(y)) => x.total_cmp(&(*y as f64)),
        (Key::Float(x), Key::Uint(y)) => x.total_cmp(&(*y as f64)),
        _ => Ordering::Equal,
    };
    by_value.then_with(|| a.numeric_rank().cmp(&b.numeric_rank()))
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Bool(a), Key::Bool(b)) => a.cmp(b),
            (Key::Str(a), Key::Str(b)) => a.cmp(b),
            _ if self.class() == 1 && other.class() == 1 => compare_numbers(self, other),
            _ => self.class().cmp(&other.class()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{b}"),
            Key::Int(n) => write!(f, "{n}"),
            Key::Uint(n) => write!(f, "{n}"),
            Key::Float(n) => f.write_str(&format_float(*n)),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Str(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Str(s)
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Int(n)
    }
}

impl From<u64> for Key {
    fn from(n: u64) -> Self {
        Key::Uint(n)
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}
