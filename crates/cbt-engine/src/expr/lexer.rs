//! Tokenizer for directive expressions

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

/// Longest operators first so `===` wins over `==`
const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "+=", "-=", "=", "<", ">", "+", "-",
    "*", "/", "%", "!", "?", ":", ".", ",", "(", ")", "[", "]", "{", "}", ";",
];

/// Split `source` into tokens, ending with [`Token::Eof`]
pub fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(pos + 1).map_or(false, char::is_ascii_digit))
        {
            let (number, next) = read_number(&chars, pos)?;
            tokens.push(Token::Number(number));
            pos = next;
            continue;
        }

        if c == '"' || c == '\'' {
            let (string, next) = read_string(&chars, pos)?;
            tokens.push(Token::Str(string));
            pos = next;
            continue;
        }

        if is_ident_start(c) {
            let start = pos;
            while pos < chars.len() && is_ident_part(chars[pos]) {
                pos += 1;
            }
            tokens.push(Token::Ident(chars[start..pos].iter().collect()));
            continue;
        }

        match PUNCTUATION.iter().find(|p| matches_at(&chars, pos, p)) {
            Some(&punct) => {
                tokens.push(Token::Punct(punct));
                pos += punct.len();
            }
            None => return Err(format!("unexpected character `{}`", c)),
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn matches_at(chars: &[char], pos: usize, punct: &str) -> bool {
    punct
        .chars()
        .enumerate()
        .all(|(i, p)| chars.get(pos + i) == Some(&p))
}

fn read_number(chars: &[char], start: usize) -> Result<(f64, usize), String> {
    let mut pos = start;
    while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
        pos += 1;
    }
    if pos < chars.len() && (chars[pos] == 'e' || chars[pos] == 'E') {
        let mut exp = pos + 1;
        if exp < chars.len() && (chars[exp] == '+' || chars[exp] == '-') {
            exp += 1;
        }
        if exp < chars.len() && chars[exp].is_ascii_digit() {
            pos = exp;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }

    let text: String = chars[start..pos].iter().collect();
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok((n, pos)),
        _ => Err(format!("invalid number `{}`", text)),
    }
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut pos = start + 1;
    let mut out = String::new();

    while pos < chars.len() {
        let c = chars[pos];
        if c == quote {
            return Ok((out, pos + 1));
        }
        if c == '\\' {
            pos += 1;
            let escaped = chars.get(pos).ok_or("unterminated string")?;
            match escaped {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                '0' => out.push('\0'),
                'u' => {
                    let hex: String = chars.iter().skip(pos + 1).take(4).collect();
                    let code = u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| format!("invalid unicode escape `\\u{}`", hex))?;
                    out.push(code);
                    pos += 4;
                }
                other => out.push(*other),
            }
            pos += 1;
            continue;
        }
        out.push(c);
        pos += 1;
    }

    Err("unterminated string".to_string())
}
