//! Call arguments

use crate::builder::Handle;
use crate::codec::Arg;

/// Keyword arguments of a call, in order
#[derive(Debug, Clone, Default)]
pub struct Kwargs(Vec<(String, Arg)>);

impl Kwargs {
    /// No keyword arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name=value`
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.push(name, value);
        self
    }

    /// Add `name=value` in place
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Arg>) {
        self.0.push((name.into(), value.into()));
    }

    /// Number of keyword arguments
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no keyword arguments
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arg)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Arg>> FromIterator<(K, V)> for Kwargs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One argument of [`Handle::call`]
///
/// Keyword arguments must come last.
#[derive(Debug, Clone)]
pub enum CallArg {
    /// A positional argument
    Positional(Arg),
    /// A group of keyword arguments
    Keywords(Kwargs),
}

impl CallArg {
    /// Positional argument from anything renderable
    pub fn positional(value: impl Into<Arg>) -> Self {
        CallArg::Positional(value.into())
    }
}

impl From<Arg> for CallArg {
    fn from(arg: Arg) -> Self {
        CallArg::Positional(arg)
    }
}

impl From<Handle> for CallArg {
    fn from(handle: Handle) -> Self {
        CallArg::Positional(Arg::Handle(handle))
    }
}

impl From<&Handle> for CallArg {
    fn from(handle: &Handle) -> Self {
        CallArg::Positional(Arg::Handle(handle.clone()))
    }
}

impl From<Kwargs> for CallArg {
    fn from(kwargs: Kwargs) -> Self {
        CallArg::Keywords(kwargs)
    }
}

/// Build [`Kwargs`] from `name = value` pairs
///
/// ```
/// let kwargs = hopi::kwargs! { sep = ", ", end = "" };
/// assert_eq!(kwargs.len(), 2);
/// ```
#[macro_export]
macro_rules! kwargs {
    ($($name:ident = $value:expr),* $(,)?) => {
        $crate::Kwargs::new()$(.with(stringify!($name), $value))*
    };
}

/// Build call arguments: positional values, then `;` and keyword pairs
///
/// ```
/// use hopi::CallArg;
///
/// let args = hopi::args![1, "two"; sep = ","];
/// assert_eq!(args.len(), 3);
/// assert!(matches!(args[2], CallArg::Keywords(_)));
/// ```
#[macro_export]
macro_rules! args {
    ($($value:expr),* $(; $($name:ident = $kw:expr),+)?) => {{
        #[allow(unused_mut)]
        let mut args: ::std::vec::Vec<$crate::CallArg> = ::std::vec::Vec::new();
        $( args.push($crate::CallArg::positional($value)); )*
        $( args.push($crate::CallArg::Keywords($crate::kwargs! { $($name = $kw),+ })); )?
        args
    }};
}
