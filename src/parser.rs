use tracing::trace;

use crate::ast::{Expression, Modifier, Node, Variable};
use crate::error::{ParseError, ParseErrorKind};
use crate::operator::OperatorRegistry;

type ParseResult<T> = Result<T, ParseError>;

/// A raw fragment produced by the tokenizer: literal text, or the inside of
/// a `{...}` run.
#[derive(Debug, PartialEq, Eq)]
enum RawToken<'a> {
    Literal(&'a str),
    Expression(&'a str),
}

/// Splits a template into literal and expression fragments.
///
/// An expression is a brace-delimited run with at least one character and
/// no `}` inside. Anything else — including unpaired or empty braces — is
/// passed through as literal text.
fn tokenize(input: &str) -> Vec<RawToken<'_>> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut literal_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] == b'{' {
            if let Some(close) = input[pos + 1..].find('}') {
                if close > 0 {
                    if literal_start < pos {
                        tokens.push(RawToken::Literal(&input[literal_start..pos]));
                    }
                    tokens.push(RawToken::Expression(&input[pos + 1..pos + 1 + close]));
                    pos += close + 2;
                    literal_start = pos;
                    continue;
                }
            }
        }
        pos += 1;
    }

    if literal_start < bytes.len() {
        tokens.push(RawToken::Literal(&input[literal_start..]));
    }

    tokens
}

/// Names may contain letters, digits, underscore, dot, or `%XX` triples.
fn is_valid_varname(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let bytes = name.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' => pos += 1,
            b'%' if pos + 2 < bytes.len()
                && bytes[pos + 1].is_ascii_hexdigit()
                && bytes[pos + 2].is_ascii_hexdigit() =>
            {
                pos += 3;
            }
            _ => return false,
        }
    }
    true
}

/// Turns template strings into node sequences.
///
/// The registry is an explicit dependency so operator resolution stays a
/// pure lookup with no hidden state.
pub(crate) struct Parser<'r> {
    registry: &'r OperatorRegistry,
}

impl<'r> Parser<'r> {
    pub(crate) fn new(registry: &'r OperatorRegistry) -> Self {
        Self { registry }
    }

    pub(crate) fn parse(&self, template: &str) -> ParseResult<Vec<Node>> {
        let mut nodes = Vec::new();
        for token in tokenize(template) {
            match token {
                RawToken::Literal(text) => nodes.push(Node::Literal {
                    text: text.to_string(),
                }),
                RawToken::Expression(token) => nodes.push(self.parse_expression(token)?),
            }
        }

        link_forward_lookups(&mut nodes);
        trace!(template, nodes = nodes.len(), "parsed template");

        Ok(nodes)
    }

    fn parse_expression(&self, raw: &str) -> ParseResult<Node> {
        // Tokenizer guarantees at least one character between the braces.
        let first = raw.chars().next().unwrap_or_default();

        let (operator, token) = if self.registry.is_operator(first) {
            let operator = self
                .registry
                .resolve(&first.to_string())
                .map_err(|error| ParseError {
                    token: raw.to_string(),
                    kind: error.kind,
                })?;
            (operator, &raw[first.len_utf8()..])
        } else {
            // No operator prefix: the first character must begin a valid
            // variable name, otherwise it is a stray operator.
            if !first.is_ascii_alphanumeric() && first != '_' && first != '.' && first != '%' {
                return Err(ParseError {
                    token: raw.to_string(),
                    kind: ParseErrorKind::InvalidOperator {
                        found: first.to_string(),
                    },
                });
            }
            (self.registry.default_operator(), raw)
        };

        if token.is_empty() {
            return Err(ParseError {
                token: raw.to_string(),
                kind: ParseErrorKind::EmptyExpression,
            });
        }

        let variables = token
            .split(',')
            .map(|var| self.parse_variable(raw, var))
            .collect::<ParseResult<Vec<_>>>()?;

        Ok(Node::Expression(Expression::new(
            raw.to_string(),
            operator,
            variables,
        )))
    }

    fn parse_variable(&self, expression: &str, raw: &str) -> ParseResult<Variable> {
        let var = raw.trim();

        let (name, modifier) = if let Some((base, length)) = var.split_once(':') {
            if base.ends_with('*')
                || base.ends_with('%')
                || length.ends_with('*')
                || length.ends_with('%')
            {
                return Err(ParseError {
                    token: expression.to_string(),
                    kind: ParseErrorKind::MultipleModifiers {
                        variable: var.to_string(),
                    },
                });
            }
            let parsed = length.parse::<u32>().map_err(|_| ParseError {
                token: expression.to_string(),
                kind: ParseErrorKind::NonNumericLength {
                    variable: base.to_string(),
                    found: length.to_string(),
                },
            })?;
            (base, Modifier::Truncate(parsed))
        } else if let Some(base) = var.strip_suffix('*') {
            if base.ends_with('*') || base.ends_with('%') {
                return Err(ParseError {
                    token: expression.to_string(),
                    kind: ParseErrorKind::MultipleModifiers {
                        variable: var.to_string(),
                    },
                });
            }
            (base, Modifier::Explode)
        } else if let Some(base) = var.strip_suffix('%') {
            if base.ends_with('*') {
                return Err(ParseError {
                    token: expression.to_string(),
                    kind: ParseErrorKind::MultipleModifiers {
                        variable: var.to_string(),
                    },
                });
            }
            (base, Modifier::AssocExplode)
        } else {
            (var, Modifier::None)
        };

        if !is_valid_varname(name) {
            return Err(ParseError {
                token: expression.to_string(),
                kind: ParseErrorKind::InvalidVariableName {
                    name: name.to_string(),
                },
            });
        }

        Ok(Variable {
            name: name.to_string(),
            modifier,
        })
    }
}

/// Second pass over a freshly built node list: when a `.`-operator
/// expression follows an unnamed-operator expression, the earlier node's
/// greedy match must stop before the first `.` of the later one.
fn link_forward_lookups(nodes: &mut [Node]) {
    for current in 1..nodes.len() {
        let followed_by_dot = matches!(
            &nodes[current],
            Node::Expression(expression) if expression.operator.id == "."
        );
        if !followed_by_dot {
            continue;
        }

        if let Node::Expression(previous) = &mut nodes[current - 1] {
            if !previous.operator.named {
                previous.set_forward_lookup('.');
            }
        }
    }
}
