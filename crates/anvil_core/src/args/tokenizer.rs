//! Splits the text after a command label into positional tokens and flags.

use super::ArgumentSpec;

/// One token of a command's argument string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Positional(String),
    Flag {
        name: String,
        /// Written as `-x` rather than `--name`
        short: bool,
        value: Option<String>,
    },
}

impl Token {
    pub fn flag(name: impl Into<String>, value: Option<&str>) -> Self {
        Self::Flag {
            name: name.into(),
            short: false,
            value: value.map(str::to_string),
        }
    }

    pub fn short(name: char) -> Self {
        Self::Flag {
            name: name.to_string(),
            short: true,
            value: None,
        }
    }

    pub fn positional(value: impl Into<String>) -> Self {
        Self::Positional(value.into())
    }
}

#[derive(Debug)]
struct Word {
    text: String,
    /// The whole word was wrapped in quotes, so it can never be a flag
    quoted: bool,
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '`')
}

/// Split on whitespace, honouring quotes.
///
/// A quote opens only at the start of a word or right after `=`. An
/// unterminated quote swallows the rest of the input.
fn lex(input: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut text = String::new();
        let mut quoted = false;

        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            if is_quote(c) && (text.is_empty() || text.ends_with('=')) {
                let whole = text.is_empty();
                chars.next();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == c {
                        closed = true;
                        break;
                    }
                    text.push(next);
                }
                quoted |= whole;
                if !closed {
                    break;
                }
                continue;
            }
            text.push(c);
            chars.next();
        }

        words.push(Word { text, quoted });
    }

    words
}

fn find_long<'a>(schema: &'a [ArgumentSpec], name: &str) -> Option<&'a ArgumentSpec> {
    schema.iter().find(|spec| spec.name == name)
}

fn find_short(schema: &[ArgumentSpec], name: char) -> Option<&ArgumentSpec> {
    schema.iter().find(|spec| spec.short == Some(name))
}

fn looks_like_flag(word: &Word) -> bool {
    !word.quoted && word.text.starts_with('-') && !is_negative_number(&word.text)
}

fn is_negative_number(text: &str) -> bool {
    text.strip_prefix('-')
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit() || c == '.')
}

/// Tokenize `input` against the command's declared arguments.
///
/// The schema only decides whether `--name value` consumes `value` and
/// whether `-xyz` may be split into single-letter flags; undeclared flags are
/// treated as boolean.
pub fn tokenize(input: &str, schema: &[ArgumentSpec]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut words = lex(input).into_iter().peekable();
    let mut flags_done = false;

    while let Some(word) = words.next() {
        if word.quoted || flags_done || is_negative_number(&word.text) {
            tokens.push(Token::Positional(word.text));
            continue;
        }

        if word.text == "--" {
            flags_done = true;
            continue;
        }

        if let Some(long) = word.text.strip_prefix("--") {
            if let Some((name, value)) = long.split_once('=') {
                tokens.push(Token::flag(name, Some(value)));
                continue;
            }
            let takes_value = find_long(schema, long).is_some_and(|s| s.kind.takes_value());
            let value = if takes_value && words.peek().is_some_and(|w| !looks_like_flag(w)) {
                words.next().map(|w| w.text)
            } else {
                None
            };
            tokens.push(Token::Flag {
                name: long.to_string(),
                short: false,
                value,
            });
            continue;
        }

        if let Some(short) = word.text.strip_prefix('-') {
            if short.is_empty() {
                tokens.push(Token::Positional(word.text));
                continue;
            }
            if let Some((name, value)) = short.split_once('=') {
                tokens.push(Token::Flag {
                    name: name.to_string(),
                    short: true,
                    value: Some(value.to_string()),
                });
                continue;
            }

            let letters: Vec<char> = short.chars().collect();
            if letters.len() > 1
                && letters
                    .iter()
                    .all(|c| find_short(schema, *c).is_some_and(|s| !s.kind.takes_value()))
            {
                tokens.extend(letters.into_iter().map(Token::short));
                continue;
            }

            let takes_value = letters.len() == 1
                && find_short(schema, letters[0]).is_some_and(|s| s.kind.takes_value());
            let value = if takes_value && words.peek().is_some_and(|w| !looks_like_flag(w)) {
                words.next().map(|w| w.text)
            } else {
                None
            };
            tokens.push(Token::Flag {
                name: short.to_string(),
                short: true,
                value,
            });
            continue;
        }

        tokens.push(Token::Positional(word.text));
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ArgType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quoted_flag_value_keeps_spaces() {
        let tokens = tokenize(r#"--help="hello world""#, &[]);
        assert_eq!(tokens, vec![Token::flag("help", Some("hello world"))]);
    }

    #[test]
    fn test_mixed_flags() {
        let tokens = tokenize("arg -h -q --hello=world --world=hello", &[]);
        assert_eq!(
            tokens,
            vec![
                Token::positional("arg"),
                Token::short('h'),
                Token::short('q'),
                Token::flag("hello", Some("world")),
                Token::flag("world", Some("hello")),
            ]
        );
    }

    #[test]
    fn test_multiple_quoted_values() {
        let tokens = tokenize(
            r#"arg -h -q --hello="world hello" --world="hello world""#,
            &[],
        );
        assert_eq!(
            tokens,
            vec![
                Token::positional("arg"),
                Token::short('h'),
                Token::short('q'),
                Token::flag("hello", Some("world hello")),
                Token::flag("world", Some("hello world")),
            ]
        );
    }

    #[test]
    fn test_long_flag_takes_value_only_when_declared() {
        let schema = vec![
            ArgumentSpec::new("reason", ArgType::Text),
            ArgumentSpec::new("silent", ArgType::Boolean),
        ];

        let tokens = tokenize("--reason spam --silent target", &schema);
        assert_eq!(
            tokens,
            vec![
                Token::flag("reason", Some("spam")),
                Token::flag("silent", None),
                Token::positional("target"),
            ]
        );

        let tokens = tokenize("--undeclared value", &schema);
        assert_eq!(
            tokens,
            vec![Token::flag("undeclared", None), Token::positional("value")]
        );
    }

    #[test]
    fn test_valued_flag_does_not_swallow_next_flag() {
        let schema = vec![ArgumentSpec::new("reason", ArgType::Text)];
        let tokens = tokenize("--reason --other", &schema);
        assert_eq!(
            tokens,
            vec![Token::flag("reason", None), Token::flag("other", None)]
        );
    }

    #[test]
    fn test_grouped_short_flags_require_declared_booleans() {
        let schema = vec![
            ArgumentSpec::new("all", ArgType::Boolean).with_short('a'),
            ArgumentSpec::new("verbose", ArgType::Boolean).with_short('v'),
            ArgumentSpec::new("count", ArgType::Integer).with_short('c'),
        ];

        assert_eq!(
            tokenize("-av", &schema),
            vec![Token::short('a'), Token::short('v')]
        );

        // `c` takes a value, so the group stays one flag
        assert_eq!(
            tokenize("-ac", &schema),
            vec![Token::Flag {
                name: "ac".to_string(),
                short: true,
                value: None,
            }]
        );

        assert_eq!(
            tokenize("-c 3", &schema),
            vec![Token::Flag {
                name: "c".to_string(),
                short: true,
                value: Some("3".to_string()),
            }]
        );
    }

    #[test]
    fn test_unterminated_quote_takes_remainder() {
        let tokens = tokenize(r#"first "second third  fourth"#, &[]);
        assert_eq!(
            tokens,
            vec![
                Token::positional("first"),
                Token::positional("second third  fourth"),
            ]
        );
    }

    #[test]
    fn test_quoted_dash_is_positional() {
        let tokens = tokenize(r#""-h" '--x'"#, &[]);
        assert_eq!(
            tokens,
            vec![Token::positional("-h"), Token::positional("--x")]
        );
    }

    #[test]
    fn test_negative_numbers_and_terminator() {
        let tokens = tokenize("-5 -0.5 -- -h --all", &[]);
        assert_eq!(
            tokens,
            vec![
                Token::positional("-5"),
                Token::positional("-0.5"),
                Token::positional("-h"),
                Token::positional("--all"),
            ]
        );
    }

    #[test]
    fn test_tokenize_is_pure() {
        let input = r#"a "b c" --d=e -f"#;
        assert_eq!(tokenize(input, &[]), tokenize(input, &[]));
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("   ", &[]).is_empty());
    }
}
