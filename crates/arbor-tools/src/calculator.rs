use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::registry::Tool;

/// Arithmetic expression evaluator: `+ - * / ^`, parentheses, unary minus.
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a basic arithmetic expression. Supports +, -, *, /, ^ and parentheses."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expr": {
                    "type": "string",
                    "description": "The arithmetic expression to evaluate, e.g. \"(2 + 3) * 4\""
                }
            },
            "required": ["expr"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        let expr = args
            .get("expr")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("calculator: missing `expr` argument"))?;

        let result = evaluate(expr)?;
        Ok(json!({ "expr": expr, "result": result }))
    }
}

pub fn evaluate(expr: &str) -> Result<f64> {
    let mut parser = Parser {
        input: expr.as_bytes(),
        pos: 0,
    };
    let value = parser.expression()?;
    parser.skip_ws();
    if parser.pos != parser.input.len() {
        return Err(anyhow!(
            "Unexpected trailing input at offset {}: {:?}",
            parser.pos,
            expr
        ));
    }
    Ok(value)
}

/// Recursive-descent parser over the usual precedence ladder:
/// expression (+ -) > term (* /) > factor (unary -, ^) > primary.
struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.input.get(self.pos).copied()
    }

    fn expression(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.factor()?;
        loop {
            match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Some(b'/') => {
                    self.pos += 1;
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(anyhow!("Division by zero"));
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> Result<f64> {
        if self.peek() == Some(b'-') {
            self.pos += 1;
            return Ok(-self.factor()?);
        }

        let base = self.primary()?;
        // Right-associative exponentiation.
        if self.peek() == Some(b'^') {
            self.pos += 1;
            let exponent = self.factor()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.expression()?;
                if self.peek() != Some(b')') {
                    return Err(anyhow!("Expected closing parenthesis"));
                }
                self.pos += 1;
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => {
                let start = self.pos;
                while self
                    .input
                    .get(self.pos)
                    .is_some_and(|b| b.is_ascii_digit() || *b == b'.')
                {
                    self.pos += 1;
                }
                let literal = std::str::from_utf8(&self.input[start..self.pos])?;
                literal
                    .parse::<f64>()
                    .map_err(|_| anyhow!("Invalid number literal: {}", literal))
            }
            other => Err(anyhow!("Unexpected token: {:?}", other.map(char::from))),
        }
    }
}
