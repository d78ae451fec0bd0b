//! Rendering host values as interpreter source literals

use crate::builder::Handle;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

/// A value interpolated into remote source text
///
/// Literals render to source that evaluates back to an equal value; handles
/// render to their remote variable name and [`Arg::Raw`] is pasted verbatim.
#[derive(Debug, Clone)]
pub enum Arg {
    /// `None`
    Null,
    /// `True` / `False`
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
    /// `[a,b]`
    List(Vec<Arg>),
    /// `(a,)` / `(a,b)`
    Tuple(Vec<Arg>),
    /// `{k: v}`, in the given order
    Map(Vec<(Arg, Arg)>),
    /// Reference to another remote value
    Handle(Handle),
    /// Source text pasted as is
    Raw(String),
}

impl Arg {
    /// Source text pasted without quoting
    pub fn raw(source: impl Into<String>) -> Self {
        Arg::Raw(source.into())
    }

    /// Tuple of the given elements
    pub fn tuple<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Arg>,
    {
        Arg::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Map of the given entries, keeping their order
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Arg>,
        V: Into<Arg>,
    {
        Arg::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Render as interpreter source
    ///
    /// ```
    /// use hopi::Arg;
    ///
    /// assert_eq!(Arg::from(vec![1, 2]).render(), "[1,2]");
    /// assert_eq!(Arg::from("say \"hi\"\n").render(), r#""say \"hi\"\n""#);
    /// assert_eq!(Arg::tuple([1.0]).render(), "(1.0,)");
    /// ```
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    pub(crate) fn render_into(&self, out: &mut String) {
        match self {
            Arg::Null => out.push_str("None"),
            Arg::Bool(true) => out.push_str("True"),
            Arg::Bool(false) => out.push_str("False"),
            Arg::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Arg::Float(f) => push_float(out, *f),
            Arg::Str(s) => push_quoted(out, s),
            Arg::List(items) => {
                out.push('[');
                push_joined(out, items);
                out.push(']');
            }
            Arg::Tuple(items) => {
                out.push('(');
                push_joined(out, items);
                if items.len() == 1 {
                    out.push(',');
                }
                out.push(')');
            }
            Arg::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    key.render_into(out);
                    out.push_str(": ");
                    value.render_into(out);
                }
                out.push('}');
            }
            Arg::Handle(handle) => out.push_str(handle.name()),
            Arg::Raw(source) => out.push_str(source),
        }
    }

    /// Visit every handle inside this argument, depth first
    pub(crate) fn for_each_handle<'a>(&'a self, visit: &mut impl FnMut(&'a Handle)) {
        match self {
            Arg::Handle(handle) => visit(handle),
            Arg::List(items) | Arg::Tuple(items) => {
                for item in items {
                    item.for_each_handle(visit);
                }
            }
            Arg::Map(entries) => {
                for (key, value) in entries {
                    key.for_each_handle(visit);
                    value.for_each_handle(visit);
                }
            }
            _ => {}
        }
    }
}

fn push_joined(out: &mut String, items: &[Arg]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        item.render_into(out);
    }
}

fn push_float(out: &mut String, f: f64) {
    if f.is_nan() {
        out.push_str("float('nan')");
    } else if f.is_infinite() {
        out.push_str(if f > 0.0 { "float('inf')" } else { "-float('inf')" });
    } else {
        // Debug keeps a fractional part or exponent, so the literal stays a float
        let _ = write!(out, "{f:?}");
    }
}

/// Double-quoted literal that never spans lines
pub(crate) fn push_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            '\u{2028}' | '\u{2029}' => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Quote `s` as a string literal
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    push_quoted(&mut out, s);
    out
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

// Python integers are unbounded; values past i64 are rendered as raw decimals
macro_rules! impl_from_wide_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    i64::try_from(value)
                        .map(Arg::Int)
                        .unwrap_or_else(|_| Arg::Raw(value.to_string()))
                }
            }
        )*
    };
}

impl_from_wide_int!(u64, usize, isize, i128, u128);

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<f64> for Arg {
    fn from(f: f64) -> Self {
        Arg::Float(f)
    }
}

impl From<f32> for Arg {
    fn from(f: f32) -> Self {
        Arg::Float(f64::from(f))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<&String> for Arg {
    fn from(s: &String) -> Self {
        Arg::Str(s.clone())
    }
}

impl From<char> for Arg {
    fn from(c: char) -> Self {
        Arg::Str(c.to_string())
    }
}

impl From<Handle> for Arg {
    fn from(handle: Handle) -> Self {
        Arg::Handle(handle)
    }
}

impl From<&Handle> for Arg {
    fn from(handle: &Handle) -> Self {
        Arg::Handle(handle.clone())
    }
}

impl From<()> for Arg {
    fn from(_: ()) -> Self {
        Arg::Null
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Null, Into::into)
    }
}

impl<T: Into<Arg>> From<Vec<T>> for Arg {
    fn from(items: Vec<T>) -> Self {
        Arg::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Arg>, const N: usize> From<[T; N]> for Arg {
    fn from(items: [T; N]) -> Self {
        Arg::List(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<Arg>, V: Into<Arg>> From<BTreeMap<K, V>> for Arg {
    fn from(map: BTreeMap<K, V>) -> Self {
        Arg::map(map)
    }
}

impl<K: Into<Arg>, V: Into<Arg>, S> From<HashMap<K, V, S>> for Arg {
    fn from(map: HashMap<K, V, S>) -> Self {
        Arg::map(map)
    }
}

impl<A: Into<Arg>> From<(A,)> for Arg {
    fn from((a,): (A,)) -> Self {
        Arg::Tuple(vec![a.into()])
    }
}

impl<A: Into<Arg>, B: Into<Arg>> From<(A, B)> for Arg {
    fn from((a, b): (A, B)) -> Self {
        Arg::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Arg>, B: Into<Arg>, C: Into<Arg>> From<(A, B, C)> for Arg {
    fn from((a, b, c): (A, B, C)) -> Self {
        Arg::Tuple(vec![a.into(), b.into(), c.into()])
    }
}
