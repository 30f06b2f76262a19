use regex::Regex;
use tracing::debug;

use crate::error::UrilateResult;
use crate::interface::Context;
use crate::operator::Operator;

/// Modifier attached to one variable reference. At most one per variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Modifier {
    None,
    /// `*` — serialize each element of a collection as a separate item.
    Explode,
    /// `%` — non-standard extension: bracketed-key query serialization for
    /// map-valued variables. Only meaningful with named operators.
    AssocExplode,
    /// `:N` — limit a scalar to its first N characters before encoding.
    Truncate(u32),
}

impl Modifier {
    /// Rank used to order variables before matching: plain and prefix
    /// variables bind before exploded ones, so a greedy explode regex
    /// cannot swallow input a more specific variable still needs.
    pub(crate) fn match_rank(self) -> u8 {
        match self {
            Self::None | Self::Truncate(_) => 0,
            Self::Explode | Self::AssocExplode => 1,
        }
    }
}

/// One variable reference inside an expression, e.g. `term:1` or `list*`.
/// `name` excludes the modifier suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Variable {
    pub(crate) name: String,
    pub(crate) modifier: Modifier,
}

/// A parsed template node: either literal text copied through verbatim, or
/// a brace-delimited expression.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Node {
    /// Never empty; the parser discards zero-length fragments.
    Literal { text: String },
    Expression(Expression),
}

impl Node {
    pub(crate) fn expand(&self, context: &Context) -> Option<String> {
        match self {
            Self::Literal { text } => Some(text.clone()),
            Self::Expression(expression) => expression.expand(context),
        }
    }

    /// Matches this node against the start of `uri`, returning the
    /// remaining input on success and collecting bindings into `params`.
    ///
    /// `Ok(None)` signals a strict-mode mismatch that aborts extraction.
    pub(crate) fn match_uri(
        &self,
        uri: &str,
        params: &mut Context,
        strict: bool,
    ) -> UrilateResult<Option<String>> {
        match self {
            Self::Literal { text } => {
                if let Some(rest) = uri.strip_prefix(text.as_str()) {
                    Ok(Some(rest.to_string()))
                } else if strict {
                    Ok(None)
                } else {
                    Ok(Some(uri.to_string()))
                }
            }
            Self::Expression(expression) => expression.match_uri(uri, params, strict),
        }
    }
}

/// A `{...}` expression: one operator applied to an ordered variable list.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Expression {
    /// The raw expression token, braces stripped.
    token: String,
    pub(crate) operator: &'static Operator,
    pub(crate) variables: Vec<Variable>,
    /// Boundary character for greedy matches, set when the next node's
    /// operator is `.` and this node's operator is unnamed.
    forward_lookup: Option<char>,
}

impl Expression {
    pub(crate) fn new(token: String, operator: &'static Operator, variables: Vec<Variable>) -> Self {
        Self {
            token,
            operator,
            variables,
            forward_lookup: None,
        }
    }

    pub(crate) fn set_forward_lookup(&mut self, separator: char) {
        self.forward_lookup = Some(separator);
    }

    #[cfg(test)]
    pub(crate) fn forward_lookup(&self) -> Option<char> {
        self.forward_lookup
    }

    /// Expands every variable in declaration order, dropping absent ones.
    /// An expression whose variables are all absent contributes nothing,
    /// not even its operator prefix.
    fn expand(&self, context: &Context) -> Option<String> {
        let results: Vec<String> = self
            .variables
            .iter()
            .filter_map(|var| self.operator.expand(var, context))
            .collect();

        if results.is_empty() {
            return None;
        }

        let mut out = String::new();
        if let Some(prefix) = self.operator.prefix {
            out.push(prefix);
        }
        out.push_str(&results.join(&self.operator.sep.to_string()));
        Some(out)
    }

    fn match_uri(
        &self,
        uri: &str,
        params: &mut Context,
        strict: bool,
    ) -> UrilateResult<Option<String>> {
        // The operator boundary is optional: consume it when present, but
        // its absence is not itself a mismatch.
        let mut uri = match self.operator.prefix {
            Some(prefix) => uri.strip_prefix(prefix).unwrap_or(uri).to_string(),
            None => uri.to_string(),
        };

        for var in self.sorted_variables() {
            let fragment = self.operator.to_regex(var)?;
            let regex = Regex::new(&fragment).map_err(|error| {
                crate::error::UrilateError::InvalidPattern {
                    pattern: fragment.clone(),
                    message: error.to_string(),
                }
            })?;

            // Bound the searched region so a greedy match cannot run past
            // the separator that introduces the next node.
            let (searched, suffix) = match self.forward_lookup {
                Some(separator) => match uri.find(separator) {
                    Some(at) => (&uri[..at], &uri[at..]),
                    None => ("", uri.as_str()),
                },
                None => (uri.as_str(), ""),
            };

            if let Some(found) = regex.find(searched) {
                let value = self.operator.extract(var, found.as_str());
                let mut rest = String::with_capacity(uri.len());
                rest.push_str(&searched[..found.start()]);
                rest.push_str(&searched[found.end()..]);
                rest.push_str(suffix);
                params.insert(&var.name, value);
                uri = rest;
            } else if strict {
                debug!(expression = %self.token, variable = %var.name, "no match for variable");
                return Ok(None);
            }
            // Non-strict: the variable stays absent and the input is left
            // untouched for the remaining variables.
        }

        Ok(Some(uri))
    }

    /// Stable order: plain/prefix variables first, exploded last, ties kept
    /// in declaration order.
    fn sorted_variables(&self) -> Vec<&Variable> {
        let mut vars: Vec<&Variable> = self.variables.iter().collect();
        vars.sort_by_key(|var| var.modifier.match_rank());
        vars
    }
}
