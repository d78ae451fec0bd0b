//! Lazy expression builder
//!
//! A [`Session`] turns source fragments and arguments into [`Handle`]s. Each
//! handle is bound to a fresh remote variable in the background once the
//! handles it refers to are bound, so arbitrarily deep expressions can be
//! built without waiting on the interpreter. Nothing is evaluated until a
//! handle is forced.
//!
//! ```no_run
//! use hopi::{Session, SessionConfig};
//!
//! # async fn example() -> hopi::Result<()> {
//! let session = Session::start(SessionConfig::default()).await?;
//! let json = session.import("json").await?;
//! let text = json.attr("dumps")?.call(hopi::args![vec![1, 2]; indent = ()])?;
//! assert_eq!(text.force().await?.as_str(), Some("[1, 2]"));
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod handle;
mod ops;
pub mod session;
pub mod state;
mod template;

pub use call::{CallArg, Kwargs};
pub use handle::Handle;
pub use session::Session;
pub use state::HandleState;

use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Failed to compile identifier regex")
});

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Whether `name` is an ASCII identifier
pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Whether `name` is a reserved word of the interpreter language
pub(crate) fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}
