use crate::error::UrilateResult;
use crate::interface::Context;
use crate::template::Template;

/// `UrilateEngine` is the primary entry point for URI Template work: it
/// owns an optional base URI prepended to every expansion and a set of
/// default bindings merged beneath the per-call context.
///
/// For repeated use of a single template, parse it once with
/// [`Template::new`] instead.
///
/// # Examples
///
/// ```
/// use urilate::{Context, UrilateEngine};
///
/// let engine = UrilateEngine::new().with_base_uri("https://api.example.com");
///
/// let mut context = Context::new();
/// context.insert("user", "fred");
///
/// let uri = engine.expand("/users/{user}", &context).unwrap();
/// assert_eq!(uri, "https://api.example.com/users/fred");
/// ```
#[derive(Debug, Clone, Default)]
pub struct UrilateEngine {
    base_uri: String,
    defaults: Context,
}

impl UrilateEngine {
    /// Creates an engine with no base URI and no default bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URI prepended to every `expand` call.
    #[must_use]
    pub fn with_base_uri<T: Into<String>>(mut self, base_uri: T) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    /// Sets default bindings used when the call context does not provide a
    /// variable. Call-site bindings always win.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Context) -> Self {
        self.defaults = defaults;
        self
    }

    /// Expands `uri` (prefixed with the engine's base URI) using `context`.
    ///
    /// When the combined string contains no `{` it is returned unchanged
    /// without parsing. Absent variables are omitted from the output, never
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns a `UrilateError::Parse` if the template is malformed.
    pub fn expand(&self, uri: &str, context: &Context) -> UrilateResult<String> {
        let uri = format!("{}{}", self.base_uri, uri);

        // Fast path: nothing to substitute.
        if !uri.contains('{') {
            return Ok(uri);
        }

        let template = Template::new(&uri)?;
        Ok(template.expand(&self.merged(context)))
    }

    /// Matches `uri` against `template` and recovers variable bindings.
    ///
    /// `Ok(None)` means the URI does not fit the template (strict mode
    /// only); malformed templates are reported as errors instead.
    ///
    /// # Errors
    ///
    /// Returns a `UrilateError::Parse` if the template is malformed, or
    /// `UrilateError::UnsupportedModifier` for `%` on an unnamed operator.
    ///
    /// # Examples
    ///
    /// ```
    /// use urilate::{UrilateEngine, Value};
    ///
    /// let engine = UrilateEngine::new();
    /// let params = engine
    ///     .extract("/users/{user}", "/users/fred", true)
    ///     .unwrap()
    ///     .unwrap();
    /// assert_eq!(params.get("user"), Some(&Value::from("fred")));
    /// ```
    pub fn extract(&self, template: &str, uri: &str, strict: bool) -> UrilateResult<Option<Context>> {
        Template::new(template)?.extract(uri, strict)
    }

    fn merged(&self, context: &Context) -> Context {
        if self.defaults.is_empty() {
            return context.clone();
        }

        let mut merged = context.clone();
        for (name, value) in self.defaults.iter() {
            if !merged.contains(name) {
                merged.insert(name, value.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::Value;

    #[test]
    #[ntest::timeout(100)]
    fn test_literal_template_fast_path() {
        let engine = UrilateEngine::new().with_base_uri("https://example.com");
        let uri = engine.expand("/a/b?c=1", &Context::new()).unwrap();
        assert_eq!(uri, "https://example.com/a/b?c=1");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_defaults_fill_missing_variables() {
        let defaults = Context::new().insert("format", "json").to_owned();
        let engine = UrilateEngine::new().with_defaults(defaults);

        let context = Context::new().insert("id", "7").to_owned();
        let uri = engine.expand("/items/{id}.{format}", &context).unwrap();
        assert_eq!(uri, "/items/7.json");

        // Call-site bindings override defaults.
        let context = context.clone().insert("format", "xml").to_owned();
        let uri = engine.expand("/items/{id}.{format}", &context).unwrap();
        assert_eq!(uri, "/items/7.xml");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_extract_round_trips_engine_expand() {
        let engine = UrilateEngine::new();
        let context = Context::new().insert("user", "fred").to_owned();

        let uri = engine.expand("/users/{user}", &context).unwrap();
        let params = engine.extract("/users/{user}", &uri, true).unwrap().unwrap();
        assert_eq!(params.get("user"), Some(&Value::from("fred")));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_malformed_template_is_an_error_not_a_no_match() {
        let engine = UrilateEngine::new();
        assert!(engine.extract("{!bad}", "/whatever", false).is_err());
    }
}
