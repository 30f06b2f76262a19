use tracing::debug;

use crate::ast::Node;
use crate::error::UrilateResult;
use crate::interface::Context;
use crate::operator::OperatorRegistry;
use crate::parser::Parser;

/// A parsed URI Template that can be expanded with bindings or matched
/// against a concrete URI to recover them.
///
/// Templates are immutable after parsing; the same instance can be reused
/// for any number of expand and extract calls.
///
/// # Example
///
/// ```rust
/// use urilate::{Context, Template};
///
/// let template = Template::new("/users/{user}{?page}").unwrap();
///
/// let mut context = Context::new();
/// context.insert("user", "fred");
/// context.insert("page", "2");
///
/// assert_eq!(template.expand(&context), "/users/fred?page=2");
/// ```
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parses `template` into an immutable node sequence.
    ///
    /// # Errors
    ///
    /// Returns a `UrilateError::Parse` if an expression uses an unknown
    /// operator, an invalid variable name, or a malformed modifier.
    pub fn new<T: AsRef<str>>(template: T) -> UrilateResult<Self> {
        let registry = OperatorRegistry::new();
        let nodes = Parser::new(&registry).parse(template.as_ref())?;
        Ok(Self { nodes })
    }

    /// Expands the template with the given bindings.
    ///
    /// Absent variables are omitted from the output per RFC 6570; expansion
    /// itself never fails.
    pub fn expand(&self, context: &Context) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            if let Some(fragment) = node.expand(context) {
                out.push_str(&fragment);
            }
        }
        out
    }

    /// Matches `uri` against the template, recovering variable bindings.
    ///
    /// In strict mode the whole URI must be consumed: a literal mismatch,
    /// an unmatched variable, input exhausted early, or trailing input all
    /// yield `Ok(None)`. Non-strict mode is best-effort and always yields a
    /// (possibly partial) binding map.
    ///
    /// # Errors
    ///
    /// Returns `UrilateError::UnsupportedModifier` when an unnamed
    /// expression carries the `%` modifier; a no-match is not an error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use urilate::{Template, Value};
    ///
    /// let template = Template::new("/users/{user}").unwrap();
    /// let params = template.extract("/users/fred", true).unwrap().unwrap();
    /// assert_eq!(params.get("user"), Some(&Value::from("fred")));
    ///
    /// assert_eq!(template.extract("/posts/fred", true).unwrap(), None);
    /// ```
    pub fn extract(&self, uri: &str, strict: bool) -> UrilateResult<Option<Context>> {
        let mut params = Context::new();
        let mut remaining = uri.to_string();

        for node in &self.nodes {
            if strict && remaining.is_empty() {
                debug!(uri, "input exhausted before all template nodes matched");
                return Ok(None);
            }

            match node.match_uri(&remaining, &mut params, strict)? {
                Some(rest) => remaining = rest,
                None => return Ok(None),
            }
        }

        if strict && !remaining.is_empty() {
            debug!(uri, remaining = %remaining, "unconsumed input after final template node");
            return Ok(None);
        }

        Ok(Some(params))
    }

    /// Variable names referenced by the template, in declaration order,
    /// without duplicates.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for node in &self.nodes {
            if let Node::Expression(expression) = node {
                for var in &expression.variables {
                    if !names.contains(&var.name.as_str()) {
                        names.push(&var.name);
                    }
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ntest::timeout(100)]
    fn test_expand_concatenates_nodes_in_order() {
        let template = Template::new("/{a}/{b}").unwrap();
        let context = Context::new().insert("a", "1").insert("b", "2").to_owned();
        assert_eq!(template.expand(&context), "/1/2");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_empty_template_extracts_empty_bindings() {
        let template = Template::new("").unwrap();
        let params = template.extract("", true).unwrap().unwrap();
        assert!(params.is_empty());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_strict_rejects_exhausted_input() {
        let template = Template::new("/a{?q}").unwrap();
        assert_eq!(template.extract("/a", true).unwrap(), None);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_strict_rejects_trailing_input() {
        let template = Template::new("/a/{id}").unwrap();
        assert_eq!(template.extract("/a/5/extra", true).unwrap(), None);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_variables_in_declaration_order() {
        let template = Template::new("/{b}/{a}{?b,c}").unwrap();
        assert_eq!(template.variables(), vec!["b", "a", "c"]);
    }
}
