use super::FormulaError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    /// `{column name}`
    ColumnRef(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

const OPERATORS: [&str; 15] = [
    "==", "!=", "<>", "<=", ">=", "=", "<", ">", "+", "-", "*", "/", "%", "^", "!",
];

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = if c.is_ascii_digit() || c == '.' {
            let mut end = pos;
            let mut seen_dot = false;
            while let Some(&(i, d)) = chars.peek() {
                if d.is_ascii_digit() || (d == '.' && !seen_dot) {
                    seen_dot |= d == '.';
                    end = i + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let text = &input[pos..end];
            let n = text
                .parse::<f64>()
                .map_err(|_| FormulaError::syntax(pos, format!("invalid number '{text}'")))?;
            Token::Number(n)
        } else if c == '"' || c == '\'' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some((_, d)) = chars.next() {
                match d {
                    '\\' => match chars.next() {
                        Some((_, 'n')) => s.push('\n'),
                        Some((_, 't')) => s.push('\t'),
                        Some((_, e)) => s.push(e),
                        None => break,
                    },
                    d if d == c => {
                        closed = true;
                        break;
                    }
                    d => s.push(d),
                }
            }
            if !closed {
                return Err(FormulaError::syntax(pos, "unterminated string"));
            }
            Token::Str(s)
        } else if c == '{' {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            for (_, d) in chars.by_ref() {
                if d == '}' {
                    closed = true;
                    break;
                }
                name.push(d);
            }
            if !closed {
                return Err(FormulaError::syntax(pos, "unterminated column reference"));
            }
            let name = name.trim();
            if name.is_empty() {
                return Err(FormulaError::syntax(pos, "empty column reference"));
            }
            Token::ColumnRef(name.to_string())
        } else if c.is_alphabetic() || c == '_' {
            let mut end = pos;
            while let Some(&(i, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    end = i + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            Token::Ident(input[pos..end].to_string())
        } else if c == '(' {
            chars.next();
            Token::LParen
        } else if c == ')' {
            chars.next();
            Token::RParen
        } else if c == ',' {
            chars.next();
            Token::Comma
        } else {
            let rest = &input[pos..];
            let op = OPERATORS
                .into_iter()
                .find(|op| rest.starts_with(*op))
                .ok_or_else(|| FormulaError::syntax(pos, format!("unexpected character '{c}'")))?;
            for _ in 0..op.len() {
                chars.next();
            }
            Token::Op(op)
        };

        tokens.push(Spanned { token, pos });
    }

    Ok(tokens)
}
