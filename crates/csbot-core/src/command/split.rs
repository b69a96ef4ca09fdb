use crate::error::CommandError;

/// Shell-like argument splitting for a command's argument tail.
///
/// Handles:
/// - Whitespace-separated arguments
/// - Quoted strings (single and double quotes), which keep their whitespace
/// - Quotes inside a word (`don't`), which are literal characters
/// - Backslash escapes within double quotes
///
/// An opening quote without its closing partner is rejected with
/// [`CommandError::UnmatchedQuote`].
pub fn shell_split(input: &str) -> Result<Vec<String>, CommandError> {
    let mut args = Vec::new();
    let mut current = String::new();
    // A quoted empty string ("") is still an argument.
    let mut has_token = false;
    let mut in_single_quote = false;
    let mut in_double_quote = false;
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
            '\'' if in_single_quote => in_single_quote = false,
            '"' if in_double_quote => in_double_quote = false,
            // A quote only opens at the start of a token.
            '\'' | '"' if !in_single_quote && !in_double_quote && !has_token => {
                if ch == '\'' {
                    in_single_quote = true;
                } else {
                    in_double_quote = true;
                }
                has_token = true;
            }
            c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            _ => {
                current.push(ch);
                has_token = true;
            }
        }
    }

    if in_single_quote || in_double_quote || escape_next {
        return Err(CommandError::UnmatchedQuote);
    }

    if has_token {
        args.push(current);
    }

    Ok(args)
}
