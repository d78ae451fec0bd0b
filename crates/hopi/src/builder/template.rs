//! Placeholder templates: `{}`, `{0}` and `{name}`, with `{{` / `}}` escapes

use crate::codec::Arg;
use crate::error::{HopiError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Next,
    Index(usize),
    Name(String),
}

/// A parsed template: `slots.len() + 1` literal fragments around the slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Template {
    fragments: Vec<String>,
    slots: Vec<Slot>,
}

impl Template {
    pub(crate) fn parse(template: &str) -> Result<Self> {
        let mut fragments = Vec::new();
        let mut slots = Vec::new();
        let mut current = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    current.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    current.push('}');
                }
                '{' => {
                    let mut placeholder = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => placeholder.push(c),
                            None => {
                                return Err(HopiError::usage(format!(
                                    "unclosed placeholder in template {template:?}"
                                )));
                            }
                        }
                    }
                    slots.push(parse_slot(placeholder.trim(), template)?);
                    fragments.push(std::mem::take(&mut current));
                }
                '}' => {
                    return Err(HopiError::usage(format!(
                        "unmatched '}}' in template {template:?}"
                    )));
                }
                c => current.push(c),
            }
        }
        fragments.push(current);

        Ok(Self { fragments, slots })
    }

    /// Fill `{}` and `{n}` slots; every argument must be used
    pub(crate) fn bind_positional(self, args: Vec<Arg>) -> Result<(Vec<String>, Vec<Arg>)> {
        let has_next = self.slots.iter().any(|s| *s == Slot::Next);
        let has_index = self.slots.iter().any(|s| matches!(s, Slot::Index(_)));
        if has_next && has_index {
            return Err(HopiError::usage(
                "cannot mix automatic '{}' and numbered '{n}' placeholders",
            ));
        }

        let mut used = vec![false; args.len()];
        let mut bound = Vec::with_capacity(self.slots.len());
        let mut next = 0;
        for slot in &self.slots {
            let index = match slot {
                Slot::Next => {
                    next += 1;
                    next - 1
                }
                Slot::Index(i) => *i,
                Slot::Name(name) => {
                    return Err(HopiError::usage(format!(
                        "named placeholder {{{name}}} needs named arguments"
                    )));
                }
            };
            let arg = args.get(index).ok_or_else(|| {
                HopiError::usage(format!(
                    "placeholder {index} has no argument ({} given)",
                    args.len()
                ))
            })?;
            used[index] = true;
            bound.push(arg.clone());
        }

        if let Some(unused) = used.iter().position(|u| !u) {
            return Err(HopiError::usage(format!("argument {unused} is never used")));
        }
        Ok((self.fragments, bound))
    }

    /// Fill `{name}` slots; every argument must be used
    pub(crate) fn bind_named(self, args: HashMap<String, Arg>) -> Result<(Vec<String>, Vec<Arg>)> {
        let mut bound = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let Slot::Name(name) = slot else {
                return Err(HopiError::usage(
                    "positional placeholders need positional arguments",
                ));
            };
            let arg = args
                .get(name)
                .ok_or_else(|| HopiError::usage(format!("no argument named {name:?}")))?;
            bound.push(arg.clone());
        }

        if let Some(unused) = args.keys().find(|name| {
            !self.slots.iter().any(|s| matches!(s, Slot::Name(n) if n == *name))
        }) {
            return Err(HopiError::usage(format!("argument {unused:?} is never used")));
        }
        Ok((self.fragments, bound))
    }
}

fn parse_slot(placeholder: &str, template: &str) -> Result<Slot> {
    if placeholder.is_empty() {
        return Ok(Slot::Next);
    }
    if placeholder.bytes().all(|b| b.is_ascii_digit()) {
        return placeholder
            .parse()
            .map(Slot::Index)
            .map_err(|_| HopiError::usage(format!("placeholder index {placeholder} is too large")));
    }
    if super::is_identifier(placeholder) {
        return Ok(Slot::Name(placeholder.to_string()));
    }
    Err(HopiError::usage(format!(
        "invalid placeholder {{{placeholder}}} in template {template:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn fragments(template: &str) -> Vec<String> {
        Template::parse(template).unwrap().fragments
    }

    #[rstest]
    #[case("no slots", vec!["no slots"])]
    #[case("{}+{}", vec!["", "+", ""])]
    #[case("{{literal}} {}", vec!["{literal} ", ""])]
    #[case("f({a}, b={b})", vec!["f(", ", b=", ")"])]
    #[case("{0}[{ 1 }]", vec!["", "[", "]"])]
    fn test_fragments(#[case] template: &str, #[case] expected: Vec<&str>) {
        assert_eq!(fragments(template), expected);
    }

    #[rstest]
    #[case("{")]
    #[case("}")]
    #[case("{a-b}")]
    #[case("x {1.5}")]
    fn test_invalid_templates(#[case] template: &str) {
        assert!(matches!(Template::parse(template), Err(HopiError::Usage(_))));
    }

    #[test]
    fn test_numbered_slots_may_repeat() {
        let (fragments, args) = Template::parse("{0} * {0} + {1}")
            .unwrap()
            .bind_positional(vec![Arg::from(3), Arg::from(4)])
            .unwrap();
        assert_eq!(fragments, vec!["", " * ", " + ", ""]);
        let rendered: Vec<_> = args.iter().map(Arg::render).collect();
        assert_eq!(rendered, vec!["3", "3", "4"]);
    }

    #[rstest]
    #[case("{} {0}", 1)]
    #[case("{} {}", 1)]
    #[case("{}", 2)]
    #[case("{a}", 1)]
    fn test_positional_binding_errors(#[case] template: &str, #[case] argc: usize) {
        let args = (0..argc).map(|i| Arg::from(i as i64)).collect();
        let result = Template::parse(template).unwrap().bind_positional(args);
        assert!(matches!(result, Err(HopiError::Usage(_))));
    }

    #[test]
    fn test_named_binding() {
        let mut args = HashMap::new();
        args.insert("a".to_string(), Arg::from(1));
        args.insert("b".to_string(), Arg::from(2));

        let (fragments, bound) = Template::parse("{a}+{b}")
            .unwrap()
            .bind_named(args.clone())
            .unwrap();
        assert_eq!(fragments, vec!["", "+", ""]);
        assert_eq!(bound.len(), 2);

        let unused = Template::parse("{a}").unwrap().bind_named(args);
        assert!(matches!(unused, Err(HopiError::Usage(_))));
    }
}
