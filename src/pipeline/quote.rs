//! Python literal rendering for generated scripts.
//!
//! Every user-supplied value that ends up in a script goes through
//! [`py_str`]. The result is a double-quoted literal that never spans a
//! line, so it is also safe inside `#` comments.

/// Render `value` as a double-quoted Python string literal.
pub fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' | '\u{2029}' | '\u{85}' => {
                out.push_str(&format!("\\u{:04x}", u32::from(ch)));
            }
            c if c.is_control() => {
                out.push_str(&format!("\\x{:02x}", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a list of strings as a Python list literal.
pub fn py_str_list<S: AsRef<str>>(values: &[S]) -> String {
    let items: Vec<String> = values.iter().map(|v| py_str(v.as_ref())).collect();
    format!("[{}]", items.join(", "))
}

/// Render a float so Python reads back the same value.
pub fn py_float(value: f64) -> String {
    format!("{value:?}")
}

pub fn py_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}
