//! Placeholder translation
//!
//! Statements are authored with `?` for every bound parameter. Before execution
//! each `?` outside a quoted literal (`'..'`, `".."` or `` `..` ``) is rewritten to
//! the driver's native style.

use std::borrow::Cow;
use std::fmt;

/// Native placeholder style of a driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placeholder {
    /// `?` (left untouched)
    QuestionMark,
    /// `%s`, with literal `%` doubled (format-style drivers)
    #[default]
    Format,
    /// `$1`, `$2`, ...
    Numbered,
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuestionMark => write!(f, "qmark"),
            Self::Format => write!(f, "format"),
            Self::Numbered => write!(f, "numeric"),
        }
    }
}

/// Rewritten statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten<'a> {
    /// SQL in the native style
    pub sql: Cow<'a, str>,
    /// Number of placeholders found
    pub placeholders: usize,
}

/// Rewrite `?` placeholders in `sql` to `style`
pub fn rewrite(sql: &str, style: Placeholder) -> Rewritten<'_> {
    let needs_escape = style == Placeholder::Format && sql.contains('%');
    let mut out = String::with_capacity(sql.len() + 8);
    let mut placeholders = 0;
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' && q != '`' {
                    // Backslash escapes the next character inside string literals
                    if let Some(next) = chars.next() {
                        push_escaped(&mut out, next, needs_escape);
                    }
                } else if c == q {
                    if chars.peek() == Some(&q) {
                        // Doubled quote stays inside the literal
                        out.push(q);
                        chars.next();
                    } else {
                        quote = None;
                    }
                } else if c == '%' && needs_escape {
                    out.push('%');
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    placeholders += 1;
                    match style {
                        Placeholder::QuestionMark => out.push('?'),
                        Placeholder::Format => out.push_str("%s"),
                        Placeholder::Numbered => {
                            out.push('$');
                            out.push_str(&placeholders.to_string());
                        }
                    }
                }
                _ => push_escaped(&mut out, c, needs_escape),
            },
        }
    }

    let sql = if out == sql {
        Cow::Borrowed(sql)
    } else {
        Cow::Owned(out)
    };
    Rewritten { sql, placeholders }
}

fn push_escaped(out: &mut String, c: char, escape_percent: bool) {
    out.push(c);
    if c == '%' && escape_percent {
        out.push('%');
    }
}

/// Quote an identifier with backticks, doubling embedded backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
