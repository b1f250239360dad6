use crate::runtime::Runtime;

/// Splits `text` into flags using shell-like quoting.
///
/// Whitespace separates flags. A `'` or `"` starts a quoted region that lasts
/// until the same quote character. A backslash takes the next character
/// literally, both inside and outside quotes. An unterminated quote runs to
/// the end of the input.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut buffer = String::new();

    let mut escaped = false;
    let mut quote: Option<char> = None;

    for c in text.chars() {
        if escaped {
            buffer.push(c);
            escaped = false;
        } else if let Some(q) = quote {
            match c {
                '\\' => escaped = true,
                c if c == q => quote = None,
                c => buffer.push(c),
            }
        } else {
            match c {
                '\'' | '"' => quote = Some(c),
                '\\' => escaped = true,
                c if c.is_whitespace() => {
                    if !buffer.is_empty() {
                        result.push(core::mem::take(&mut buffer));
                    }
                }
                c => buffer.push(c),
            }
        }
    }

    if !buffer.is_empty() {
        result.push(buffer);
    }

    result
}

/// Flags from the environment variable `name`, empty when it is unset.
pub fn env_flags(runtime: &dyn Runtime, name: &str) -> Vec<String> {
    runtime
        .get_env(name)
        .map(|value| tokenize(&value))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeRuntime, strings};

    #[test]
    fn test_whitespace_splitting() {
        assert_eq!(tokenize("-I/usr foo"), strings(&["-I/usr", "foo"]));
        assert_eq!(tokenize("  -O2\t-g \n -Wall  "), strings(&["-O2", "-g", "-Wall"]));
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_quotes() {
        assert_eq!(tokenize("'a b' c"), strings(&["a b", "c"]));
        assert_eq!(tokenize(r#""-DMSG=hello world" -g"#), strings(&["-DMSG=hello world", "-g"]));
        assert_eq!(tokenize(r#"-D'X="1"'"#), strings(&[r#"-DX="1""#]));
        assert_eq!(tokenize(r#"pre"fix suf"fix"#), strings(&["prefix suffix"]));
    }

    #[test]
    fn test_backslash_escapes() {
        assert_eq!(tokenize("a\\ b"), strings(&["a b"]));
        assert_eq!(tokenize(r#""a\"b" c"#), strings(&["a\"b", "c"]));
        assert_eq!(tokenize(r"'it\'s'"), strings(&["it's"]));
        assert_eq!(tokenize(r"a\\b"), strings(&[r"a\b"]));
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        assert_eq!(tokenize("x 'a b c"), strings(&["x", "a b c"]));
    }

    #[test]
    fn test_empty_quotes_produce_nothing() {
        assert_eq!(tokenize("'' a"), strings(&["a"]));
    }

    #[test]
    fn test_env_flags() {
        let rt = FakeRuntime::new().env("CFLAGS", "-O2 '-DNAME=a b'");
        assert_eq!(env_flags(&rt, "CFLAGS"), strings(&["-O2", "-DNAME=a b"]));
        assert!(env_flags(&rt, "CXXFLAGS").is_empty());
    }
}
