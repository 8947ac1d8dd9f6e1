//! Restricted arithmetic evaluator.
//!
//! Accepts numbers, `+ - * / ^`, parentheses, commas between function
//! arguments and a fixed whitelist of functions. There are no variables: any
//! identifier that survived earlier stages is removed by [`sanitize`] so it
//! can never evaluate to something unexpected.

use crate::error::MathError;

/// Function names the evaluator understands.
pub const ALLOWED_FUNCTIONS: [&str; 16] = [
    "round", "floor", "ceil", "abs", "min", "max", "sqrt", "pow", "log", "log10", "sin", "cos",
    "tan", "sum", "mean", "median",
];

pub fn is_allowed_function(name: &str) -> bool {
    ALLOWED_FUNCTIONS.contains(&name)
}

/// Keep digits, operators, parentheses, commas and whitelisted function
/// names. Every other identifier and symbol becomes a space; whitespace is
/// collapsed. Scientific literals like `2.5e-3` are kept intact.
pub fn sanitize(expr: &str) -> String {
    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let end = scan_number(&chars, i);
            out.extend(&chars[i..end]);
            i = end;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if is_allowed_function(&word.to_lowercase()) {
                out.push_str(&word.to_lowercase());
            } else {
                out.push(' ');
            }
        } else {
            if matches!(c, '+' | '-' | '*' | '/' | '^' | '.' | ',' | '(' | ')' | ' ') {
                out.push(c);
            } else {
                out.push(' ');
            }
            i += 1;
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// End index of a numeric literal starting at `start` (digits, one dot, optional exponent)
fn scan_number(chars: &[char], start: usize) -> usize {
    let mut i = start;
    let mut seen_dot = false;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            i += 1;
        } else if c == '.' && !seen_dot && chars.get(i + 1) != Some(&'.') {
            seen_dot = true;
            i += 1;
        } else {
            break;
        }
    }
    // Exponent only when digits follow, so "2e" stays a number plus a word
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, MathError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '0'..='9' | '.' => {
                let end = scan_number(&chars, i);
                if end == i {
                    return Err(MathError::UnexpectedChar(c));
                }
                let literal: String = chars[i..end].iter().collect();
                let n = literal.parse::<f64>().map_err(|_| MathError::UnexpectedChar(c))?;
                tokens.push(Token::Number(n));
                i = end;
            }
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(MathError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

/// Nesting allowed through parentheses, calls and `^` chains.
pub const MAX_NESTING: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<(), MathError> {
        match self.next() {
            Some(tok) if tok == expected => Ok(()),
            Some(_) => Err(MathError::UnexpectedToken(self.pos - 1)),
            None => Err(MathError::UnexpectedEnd),
        }
    }

    fn descend(&mut self) -> Result<(), MathError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(MathError::TooDeep);
        }
        Ok(())
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, MathError> {
        self.descend()?;
        let value = self.sum();
        self.depth -= 1;
        value
    }

    fn sum(&mut self) -> Result<f64, MathError> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, MathError> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = if op == '*' { value * rhs } else { value / rhs };
        }
        Ok(value)
    }

    // unary := ('-' | '+')* power
    fn unary(&mut self) -> Result<f64, MathError> {
        let mut negate = false;
        while let Some(Token::Op(sign @ ('-' | '+'))) = self.peek().cloned() {
            self.pos += 1;
            if sign == '-' {
                negate = !negate;
            }
        }
        let value = self.power()?;
        Ok(if negate { -value } else { value })
    }

    // power := primary ('^' unary)?, right associative
    fn power(&mut self) -> Result<f64, MathError> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            self.descend()?;
            let exponent = self.unary();
            self.depth -= 1;
            return Ok(base.powf(exponent?));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, MathError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                self.expect(Token::LParen)?;
                let mut args = Vec::new();
                if let Some(Token::RParen) = self.peek() {
                    self.pos += 1;
                } else {
                    loop {
                        args.push(self.expr()?);
                        match self.next() {
                            Some(Token::Comma) => continue,
                            Some(Token::RParen) => break,
                            Some(_) => return Err(MathError::UnexpectedToken(self.pos - 1)),
                            None => return Err(MathError::UnexpectedEnd),
                        }
                    }
                }
                call(&name, &args)
            }
            Some(_) => Err(MathError::UnexpectedToken(self.pos - 1)),
            None => Err(MathError::UnexpectedEnd),
        }
    }
}

fn arity(name: &str, expected: &str, got: usize) -> MathError {
    MathError::Arity { name: name.to_string(), expected: expected.to_string(), got }
}

fn call(name: &str, args: &[f64]) -> Result<f64, MathError> {
    let unary = |f: fn(f64) -> f64| match args {
        [x] => Ok(f(*x)),
        _ => Err(arity(name, "1", args.len())),
    };

    match name {
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "abs" => unary(f64::abs),
        "sqrt" => unary(f64::sqrt),
        "log10" => unary(f64::log10),
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "round" => match args {
            [x] => Ok(x.round()),
            [x, places] => {
                let scale = 10f64.powi(*places as i32);
                Ok((x * scale).round() / scale)
            }
            _ => Err(arity(name, "1 or 2", args.len())),
        },
        "log" => match args {
            [x] => Ok(x.ln()),
            [x, base] => Ok(x.ln() / base.ln()),
            _ => Err(arity(name, "1 or 2", args.len())),
        },
        "pow" => match args {
            [a, b] => Ok(a.powf(*b)),
            _ => Err(arity(name, "2", args.len())),
        },
        "min" | "max" | "sum" | "mean" | "median" if args.is_empty() => {
            Err(arity(name, "at least 1", 0))
        }
        "min" => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        "sum" => Ok(args.iter().sum()),
        "mean" => Ok(args.iter().sum::<f64>() / args.len() as f64),
        "median" => {
            let mut sorted = args.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
            } else {
                Ok(sorted[mid])
            }
        }
        other => Err(MathError::UnknownFunction(other.to_string())),
    }
}

/// Evaluate a sanitized expression to a single finite number.
pub fn evaluate(expr: &str) -> Result<f64, MathError> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err(MathError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(MathError::UnexpectedToken(parser.pos));
    }
    if !value.is_finite() {
        return Err(MathError::NonFinite);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(evaluate("2 + 3 * 4"), Ok(14.0));
        assert_eq!(evaluate("(2 + 3) * 4"), Ok(20.0));
        assert_eq!(evaluate("2 ^ 3 ^ 2"), Ok(512.0));
        assert_eq!(evaluate("-2 ^ 2"), Ok(-4.0));
        assert_eq!(evaluate("2 ^ -1"), Ok(0.5));
        assert_eq!(evaluate("10 - 4 - 3"), Ok(3.0));
    }

    #[test]
    fn test_functions() {
        assert_eq!(evaluate("sqrt(16)"), Ok(4.0));
        assert_eq!(evaluate("max(1, 7, 3)"), Ok(7.0));
        assert_eq!(evaluate("round(2.456, 2)"), Ok(2.46));
        assert_eq!(evaluate("median(5, 1, 3, 2)"), Ok(2.5));
        assert!((evaluate("log10(1000)").unwrap() - 3.0).abs() < 1e-12);
        assert_eq!(evaluate("min(max(15, 0), 10)"), Ok(10.0));
        assert!(matches!(evaluate("pow(2)"), Err(MathError::Arity { .. })));
        assert!(matches!(evaluate("foo(2)"), Err(MathError::UnknownFunction(_))));
    }

    #[test]
    fn test_failures() {
        assert_eq!(evaluate(""), Err(MathError::Empty));
        assert_eq!(evaluate("1 / 0"), Err(MathError::NonFinite));
        assert!(evaluate("2 3").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("1 +").is_err());
    }

    #[test]
    fn test_sanitize_keeps_whitelist_only() {
        assert_eq!(sanitize("sqrt(16) + apples"), "sqrt(16) +");
        assert_eq!(sanitize("1500 g"), "1500");
        assert_eq!(sanitize("log10(100) * 2"), "log10(100) * 2");
        assert_eq!(sanitize("2 ^ 3 & 4"), "2 ^ 3 4");
        assert_eq!(sanitize("2.5e-3 * 4"), "2.5e-3 * 4");
        assert_eq!(sanitize("hello world"), "");
    }

    #[test]
    fn test_sign_runs_and_deep_chains_on_small_stack() {
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                assert_eq!(evaluate(&format!("{}1", "-".repeat(9_998))), Ok(1.0));
                assert_eq!(evaluate(&format!("{}1", "-".repeat(9_999))), Ok(-1.0));
                assert_eq!(evaluate("--+-2"), Ok(-2.0));
                let chain = format!("2{}", "^-1".repeat(3_300));
                assert_eq!(evaluate(&chain), Err(MathError::TooDeep));
                let nested = format!("{}1{}", "(".repeat(300), ")".repeat(300));
                assert_eq!(evaluate(&nested), Err(MathError::TooDeep));
                assert_eq!(evaluate(&format!("2{}", "^1".repeat(100))), Ok(2.0));
            })
            .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_scientific_literals() {
        assert_eq!(evaluate("1e3 + 1"), Ok(1001.0));
        assert_eq!(evaluate("2.5e-1"), Ok(0.25));
    }
}
