//! Delimited row encoding.
//!
//! Backslash, the delimiter and newline are escaped with a backslash inside
//! a column. [`tokenize`] is the exact inverse of joining [`encode_value`]
//! columns with the delimiter.

/// Escapes one column value
pub fn encode_value(value: &str, delimiter: char) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Splits a row on unescaped delimiters and unescapes every column
pub fn tokenize(line: &str, delimiter: char) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => current.push('\n'),
                Some(escaped) => current.push(escaped),
                None => current.push('\\'),
            }
        } else if c == delimiter {
            tokens.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }

    tokens.push(current);
    tokens
}

/// Directory part of a `/` separated path
pub fn dirname(path: &str) -> &str {
    path.rfind('/').map_or("", |idx| &path[..idx])
}

/// Expresses `target` relative to the directory `base`
///
/// Both are `/` separated paths relative to the same root.
pub fn relative_path(target: &str, base: &str) -> String {
    let components = |p: &str| -> Vec<String> {
        p.split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .map(str::to_string)
            .collect()
    };

    let target = components(target);
    let base = components(base);

    let common = target
        .iter()
        .zip(base.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    parts.extend(std::iter::repeat("..").take(base.len() - common));
    parts.extend(target[common..].iter().map(String::as_str));

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
