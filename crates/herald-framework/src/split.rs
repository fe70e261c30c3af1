/// Shell-like argument splitting for command text.
///
/// Handles:
/// - Whitespace-separated arguments
/// - Quoted strings (single and double quotes)
/// - Backslash escapes inside double quotes
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut quoted = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_double_quote => {
                escape_next = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                quoted = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                quoted = true;
            }
            c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
                if !current.is_empty() || quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_split_simple() {
        assert_eq!(shell_split("deploy api prod"), vec!["deploy", "api", "prod"]);
    }

    #[test]
    fn test_shell_split_quoted() {
        let args = shell_split(r#"say "hello world" twice"#);
        assert_eq!(args, vec!["say", "hello world", "twice"]);
    }

    #[test]
    fn test_shell_split_single_quoted() {
        let args = shell_split("say 'hello world' twice");
        assert_eq!(args, vec!["say", "hello world", "twice"]);
    }

    #[test]
    fn test_shell_split_mixed_quotes() {
        let args = shell_split(r#"cmd "double's quote" 'single"s quote'"#);
        assert_eq!(args, vec!["cmd", "double's quote", r#"single"s quote"#]);
    }

    #[test]
    fn test_shell_split_empty_quotes_kept() {
        assert_eq!(shell_split(r#"set name """#), vec!["set", "name", ""]);
    }

    #[test]
    fn test_shell_split_whitespace_only() {
        assert!(shell_split("   \t \n ").is_empty());
    }
}
