//! Calculator tool — evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, parentheses, decimals, and unary negation.

use async_trait::async_trait;
use ironhive_core::error::ToolError;
use ironhive_core::tool::Tool;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports +, -, *, /, parentheses, and decimal numbers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let expression = arguments["expression"].as_str().ok_or_else(|| {
            ToolError::BadArguments {
                tool: "calculator".into(),
                reason: "missing 'expression' argument".into(),
            }
        })?;

        let value = evaluate(expression).map_err(|reason| ToolError::ExecutionFailed {
            tool: "calculator".into(),
            reason,
        })?;

        // Integers print without a trailing .0
        if value.fract() == 0.0 && value.abs() < 1e15 {
            Ok(format!("{}", value as i64))
        } else {
            Ok(format!("{value}"))
        }
    }
}

/// Evaluate an arithmetic expression string.
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let mut parser = ExprParser {
        chars: expression.chars().collect(),
        pos: 0,
    };
    let value = parser.expr()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(format!(
            "unexpected character '{}' at position {}",
            parser.chars[parser.pos], parser.pos
        ));
    }
    Ok(value)
}

struct ExprParser {
    chars: Vec<char>,
    pos: usize,
}

impl ExprParser {
    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut acc = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                '+' => {
                    self.bump();
                    acc += self.term()?;
                }
                '-' => {
                    self.bump();
                    acc -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<f64, String> {
        let mut acc = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                '*' => {
                    self.bump();
                    acc *= self.factor()?;
                }
                '/' => {
                    self.bump();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err("division by zero".into());
                    }
                    acc /= divisor;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    // factor := '-' factor | '(' expr ')' | NUMBER
    fn factor(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.bump();
                Ok(-self.factor()?)
            }
            Some('(') => {
                self.bump();
                let value = self.expr()?;
                match self.bump() {
                    Some(')') => Ok(value),
                    _ => Err("expected closing parenthesis".into()),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(format!("unexpected character '{c}'")),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn number(&mut self) -> Result<f64, String> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.chars.len()
            && (self.chars[self.pos].is_ascii_digit() || self.chars[self.pos] == '.')
        {
            self.pos += 1;
        }
        let literal: String = self.chars[start..self.pos].iter().collect();
        literal
            .parse()
            .map_err(|_| format!("invalid number: {literal}"))
    }
}
