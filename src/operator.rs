use std::collections::BTreeMap;

use crate::ast::{Modifier, Variable};
use crate::error::{ParseError, ParseErrorKind, UrilateError, UrilateResult};
use crate::interface::{Context, Value};

/// Percent-escapes restored after encoding when an operator is `reserved`.
///
/// RFC 6570 reserved expansion (`+`, `#`) leaves the RFC 3986 reserved set
/// untouched; everything is encoded first and this fixed table substitutes
/// the escapes back.
const RESERVED_CHARS: [(&str, &str); 18] = [
    ("%3A", ":"),
    ("%2F", "/"),
    ("%3F", "?"),
    ("%23", "#"),
    ("%5B", "["),
    ("%5D", "]"),
    ("%40", "@"),
    ("%21", "!"),
    ("%24", "$"),
    ("%26", "&"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
    ("%2B", "+"),
    ("%2C", ","),
    ("%3B", ";"),
    ("%3D", "="),
];

/// Characters a matched value may contain inside a path segment.
const PATH_CLASS: &str = r"[a-zA-Z0-9\-._~!$&'()*+,;=%:@]";

/// Characters a matched value may contain inside a query component. Allows
/// `/` and `?` but not `&`, which separates query parameters.
const QUERY_CLASS: &str = r"[a-zA-Z0-9\-._~!$'()*+,;=%:@/?]";

/// One of the eight RFC 6570 operator profiles.
///
/// Profiles are fully immutable and shared for the lifetime of the process;
/// all behavior differences between operators reduce to these fields plus
/// the `named`/unnamed family split.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Operator {
    /// Operator id as written in the template; empty for simple expansion.
    pub(crate) id: &'static str,
    /// Separator joining multiple values within one expression.
    pub(crate) sep: char,
    /// Named operators emit `name=value` pairs; unnamed emit bare values.
    pub(crate) named: bool,
    /// Marker appended when a named variable's value is the empty string.
    pub(crate) empty: &'static str,
    /// Reserved operators leave RFC 3986 reserved characters unescaped.
    pub(crate) reserved: bool,
    /// Literal character preceding the whole expansion, if any.
    pub(crate) prefix: Option<char>,
}

static OPERATORS: [Operator; 8] = [
    Operator { id: "", sep: ',', named: false, empty: "", reserved: false, prefix: None },
    Operator { id: "+", sep: ',', named: false, empty: "", reserved: true, prefix: None },
    Operator { id: ".", sep: '.', named: false, empty: "", reserved: false, prefix: Some('.') },
    Operator { id: "/", sep: '/', named: false, empty: "", reserved: false, prefix: Some('/') },
    Operator { id: ";", sep: ';', named: true, empty: "", reserved: false, prefix: Some(';') },
    Operator { id: "?", sep: '&', named: true, empty: "=", reserved: false, prefix: Some('?') },
    Operator { id: "&", sep: '&', named: true, empty: "=", reserved: false, prefix: Some('&') },
    Operator { id: "#", sep: ',', named: false, empty: "", reserved: true, prefix: Some('#') },
];

/// Resolves operator ids to their shared profiles.
///
/// The profile table is `'static` and immutable, so the registry itself is
/// a zero-sized handle; it exists to make operator resolution an explicit
/// dependency of the parser rather than hidden global state.
#[derive(Debug, Default)]
pub(crate) struct OperatorRegistry;

impl OperatorRegistry {
    pub(crate) fn new() -> Self {
        Self
    }

    /// Looks up the profile for `id`.
    ///
    /// # Errors
    /// - `ParseErrorKind::InvalidOperator` if `id` is not one of the eight
    ///   recognized operator ids.
    pub(crate) fn resolve(&self, id: &str) -> Result<&'static Operator, ParseError> {
        OPERATORS.iter().find(|op| op.id == id).ok_or_else(|| ParseError {
            token: id.to_string(),
            kind: ParseErrorKind::InvalidOperator {
                found: id.to_string(),
            },
        })
    }

    pub(crate) fn is_operator(&self, c: char) -> bool {
        matches!(c, '+' | '.' | '/' | ';' | '?' | '&' | '#')
    }

    /// The default (empty-id) operator used for plain `{var}` expressions.
    pub(crate) fn default_operator(&self) -> &'static Operator {
        &OPERATORS[0]
    }
}

impl Operator {
    /// Expands a single variable against the bindings.
    ///
    /// Returns `None` when the variable is absent or bound to an empty
    /// collection, which omits it from the expression output entirely.
    pub(crate) fn expand(&self, var: &Variable, context: &Context) -> Option<String> {
        let value = context.get(&var.name)?;
        match value {
            Value::Scalar(s) => Some(self.expand_scalar(var, s)),
            Value::List(items) => self.expand_list(var, items),
            Value::Map(map) => self.expand_map(var, map),
        }
    }

    fn expand_scalar(&self, var: &Variable, raw: &str) -> String {
        let truncated = match var.modifier {
            Modifier::Truncate(n) => raw.chars().take(n as usize).collect(),
            Modifier::None | Modifier::Explode | Modifier::AssocExplode => raw.to_string(),
        };

        if !self.named {
            return self.encode(&truncated);
        }

        let mut out = self.encode(&var.name);
        if truncated.is_empty() {
            out.push_str(self.empty);
        } else {
            out.push('=');
            out.push_str(&self.encode(&truncated));
        }
        out
    }

    fn expand_list(&self, var: &Variable, items: &[String]) -> Option<String> {
        if items.is_empty() {
            return None;
        }

        match var.modifier {
            Modifier::None | Modifier::Truncate(_) => {
                let joined = items
                    .iter()
                    .map(|item| self.encode(item))
                    .collect::<Vec<_>>()
                    .join(",");
                if self.named {
                    Some(format!("{}={}", self.encode(&var.name), joined))
                } else {
                    Some(joined)
                }
            }
            Modifier::Explode | Modifier::AssocExplode => {
                let sep = self.sep.to_string();
                if !self.named {
                    return Some(
                        items
                            .iter()
                            .map(|item| self.encode(item))
                            .collect::<Vec<_>>()
                            .join(&sep),
                    );
                }

                let name = self.encode(&var.name);
                let pairs: Vec<String> = if var.modifier == Modifier::AssocExplode {
                    // Query-string style with the numeric index elided: name[]=v
                    items
                        .iter()
                        .map(|item| format!("{}%5B%5D={}", name, self.encode(item)))
                        .collect()
                } else {
                    items
                        .iter()
                        .map(|item| format!("{}={}", name, self.encode(item)))
                        .collect()
                };
                Some(pairs.join(&sep))
            }
        }
    }

    fn expand_map(&self, var: &Variable, map: &BTreeMap<String, String>) -> Option<String> {
        if map.is_empty() {
            return None;
        }

        match var.modifier {
            Modifier::None | Modifier::Truncate(_) => {
                // Non-exploded maps flatten to key,value,key,value.
                let flat = map
                    .iter()
                    .flat_map(|(k, v)| [self.encode(k), self.encode(v)])
                    .collect::<Vec<_>>()
                    .join(",");
                if self.named {
                    Some(format!("{}={}", self.encode(&var.name), flat))
                } else {
                    Some(flat)
                }
            }
            Modifier::Explode => {
                let pairs: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}={}", self.encode(k), self.encode(v)))
                    .collect();
                Some(pairs.join(&self.sep.to_string()))
            }
            Modifier::AssocExplode => {
                if self.named {
                    let name = self.encode(&var.name);
                    let pairs: Vec<String> = map
                        .iter()
                        .map(|(k, v)| format!("{}%5B{}%5D={}", name, self.encode(k), self.encode(v)))
                        .collect();
                    Some(pairs.join(&self.sep.to_string()))
                } else {
                    let pairs: Vec<String> = map
                        .iter()
                        .map(|(k, v)| format!("{}={}", self.encode(k), self.encode(v)))
                        .collect();
                    Some(pairs.join(&self.sep.to_string()))
                }
            }
        }
    }

    /// Builds the regex fragment that matches one variable of this operator
    /// during extraction.
    ///
    /// # Errors
    /// - `UrilateError::UnsupportedModifier` for `%` on an unnamed operator.
    pub(crate) fn to_regex(&self, var: &Variable) -> UrilateResult<String> {
        let value = self.value_class();
        let sep = regex::escape(&self.sep.to_string());

        if !self.named {
            return match var.modifier {
                Modifier::None => Ok(format!("{value}*(?:,{value}+)*")),
                Modifier::Explode => Ok(format!("{value}+(?:{sep}{value}+)*")),
                Modifier::Truncate(n) => Ok(format!("{value}{{0,{n}}}")),
                Modifier::AssocExplode => Err(UrilateError::UnsupportedModifier {
                    variable: var.name.clone(),
                    operator: self.id.to_string(),
                }),
            };
        }

        let name = regex::escape(&var.name);
        let fragment = match var.modifier {
            Modifier::None => format!("{name}=(?:{value}+(?:,{value}+)*)*"),
            // Value lists keyed either by the variable's own name or by
            // arbitrary keys (the map form).
            Modifier::Explode => format!(
                "{name}+=(?:{value}+(?:{sep}{name}+={value}*)*)|{value}+=(?:{value}+(?:{sep}{value}+={value}*)*)"
            ),
            Modifier::Truncate(n) => format!("{value}{{0,{n}}}"),
            Modifier::AssocExplode => {
                let key = format!("{name}+(?:%5B|\\[)[^=]*=");
                format!("{key}(?:{value}+(?:{sep}{key}{value}*)*)")
            }
        };

        // Tolerate the operator's own join separator left over from a
        // previously matched variable.
        Ok(format!("(?:&)?(?:{fragment})"))
    }

    /// Inverse of [`expand`](Self::expand) for one matched fragment.
    pub(crate) fn extract(&self, var: &Variable, matched: &str) -> Value {
        if self.named {
            self.extract_named(var, matched)
        } else {
            self.extract_unnamed(var, matched)
        }
    }

    fn extract_unnamed(&self, var: &Variable, matched: &str) -> Value {
        match var.modifier {
            // Prefix matches are returned verbatim, no decomposition.
            Modifier::Truncate(_) => Value::Scalar(pct_decode(matched)),
            Modifier::Explode | Modifier::AssocExplode => {
                let mut items = Vec::new();
                let mut map = BTreeMap::new();
                for piece in matched.split(self.sep).filter(|p| !p.is_empty()) {
                    match piece.split_once('=') {
                        Some((key, value)) => {
                            map.insert(pct_decode(key), pct_decode(value));
                        }
                        None => items.push(pct_decode(piece)),
                    }
                }
                if map.is_empty() {
                    Value::List(items)
                } else {
                    Value::Map(map)
                }
            }
            Modifier::None => {
                if matched.contains(self.sep) {
                    Value::List(
                        matched
                            .split(self.sep)
                            .filter(|p| !p.is_empty())
                            .map(pct_decode)
                            .collect(),
                    )
                } else {
                    Value::Scalar(pct_decode(matched))
                }
            }
        }
    }

    fn extract_named(&self, var: &Variable, matched: &str) -> Value {
        let matched = matched.strip_prefix('&').unwrap_or(matched);
        match var.modifier {
            Modifier::Truncate(_) => Value::Scalar(pct_decode(matched)),
            Modifier::AssocExplode => {
                let mut items = Vec::new();
                let mut map = BTreeMap::new();
                for piece in matched.split(self.sep) {
                    let Some((key, value)) = piece.split_once('=') else {
                        continue;
                    };
                    let key = pct_decode(key);
                    let Some(bracketed) = key.strip_prefix(var.name.as_str()) else {
                        continue;
                    };
                    let Some(inner) = bracketed
                        .strip_prefix('[')
                        .and_then(|k| k.strip_suffix(']'))
                    else {
                        continue;
                    };
                    if inner.is_empty() {
                        items.push(pct_decode(value));
                    } else {
                        map.insert(inner.to_string(), pct_decode(value));
                    }
                }
                if map.is_empty() {
                    Value::List(items)
                } else {
                    Value::Map(map)
                }
            }
            Modifier::Explode => {
                let mut items = Vec::new();
                let mut map = BTreeMap::new();
                for piece in matched.split(self.sep) {
                    let Some((key, value)) = piece.split_once('=') else {
                        continue;
                    };
                    if pct_decode(key) == var.name {
                        items.push(pct_decode(value));
                    } else {
                        map.insert(pct_decode(key), pct_decode(value));
                    }
                }
                if map.is_empty() {
                    Value::List(items)
                } else {
                    Value::Map(map)
                }
            }
            Modifier::None => {
                let stripped = matched.replace(&format!("{}=", var.name), "");
                if stripped.contains(',') {
                    Value::List(stripped.split(',').map(pct_decode).collect())
                } else {
                    Value::Scalar(pct_decode(&stripped))
                }
            }
        }
    }

    /// Percent-encodes a component, restoring reserved characters afterwards
    /// when this operator allows them through unescaped.
    pub(crate) fn encode(&self, raw: &str) -> String {
        let encoded = urlencoding::encode(raw);
        if self.reserved {
            restore_reserved(&encoded)
        } else {
            encoded.into_owned()
        }
    }

    fn value_class(&self) -> &'static str {
        match self.id {
            "?" | "&" | "#" => QUERY_CLASS,
            _ => PATH_CLASS,
        }
    }
}

fn restore_reserved(encoded: &str) -> String {
    let mut out = encoded.to_string();
    for (escaped, literal) in RESERVED_CHARS {
        if out.contains(escaped) {
            out = out.replace(escaped, literal);
        }
    }
    out
}

/// Percent-decodes a matched fragment. Malformed escapes are left as-is
/// rather than failing, matching the tolerance of raw URL decoding.
pub(crate) fn pct_decode<S: AsRef<str>>(raw: S) -> String {
    let raw = raw.as_ref();
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, modifier: Modifier) -> Variable {
        Variable {
            name: name.to_string(),
            modifier,
        }
    }

    fn op(id: &str) -> &'static Operator {
        OperatorRegistry::new().resolve(id).unwrap()
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_resolve_known_and_unknown() {
        let registry = OperatorRegistry::new();
        for id in ["", "+", ".", "/", ";", "?", "&", "#"] {
            assert_eq!(registry.resolve(id).unwrap().id, id);
        }

        let err = registry.resolve("!").unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidOperator { .. }));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_encode_escapes_everything_for_plain_operators() {
        assert_eq!(op("").encode("Hello World!"), "Hello%20World%21");
        assert_eq!(op("").encode("a/b?c"), "a%2Fb%3Fc");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_encode_restores_reserved_set() {
        assert_eq!(op("+").encode("/foo/bar"), "/foo/bar");
        assert_eq!(op("#").encode("a?b#c"), "a?b#c");
        // Percent itself stays escaped even for reserved operators.
        assert_eq!(op("+").encode("50%"), "50%25");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_decode_inverts_encode() {
        for raw in ["hello", "Hello World!", "a/b?c#d", "50%", ":/?#[]@!$&'()*+,;="] {
            assert_eq!(pct_decode(op("").encode(raw)), raw);
            assert_eq!(pct_decode(op("+").encode(raw)), raw);
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_expand_scalar_named() {
        let context = Context::new()
            .insert("x", "1024")
            .insert("empty", "")
            .to_owned();

        // The operator expands the bare pair; the node adds the `;` prefix.
        assert_eq!(
            op(";").expand(&var("x", Modifier::None), &context),
            Some("x=1024".to_string())
        );
        // Named empty values use the operator's empty marker.
        assert_eq!(
            op(";").expand(&var("empty", Modifier::None), &context),
            Some("empty".to_string())
        );
        assert_eq!(
            op("?").expand(&var("empty", Modifier::None), &context),
            Some("empty=".to_string())
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_expand_absent_and_empty_collections() {
        let context = Context::new()
            .insert("none", Value::List(vec![]))
            .to_owned();

        assert_eq!(op("").expand(&var("missing", Modifier::None), &context), None);
        assert_eq!(op("").expand(&var("none", Modifier::None), &context), None);
        assert_eq!(op("?").expand(&var("none", Modifier::Explode), &context), None);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_expand_list_flat_and_exploded() {
        let context = Context::new()
            .insert("list", vec!["red", "green", "blue"])
            .to_owned();

        assert_eq!(
            op("").expand(&var("list", Modifier::None), &context),
            Some("red,green,blue".to_string())
        );
        assert_eq!(
            op("/").expand(&var("list", Modifier::Explode), &context),
            Some("red/green/blue".to_string())
        );
        assert_eq!(
            op("?").expand(&var("list", Modifier::Explode), &context),
            Some("list=red&list=green&list=blue".to_string())
        );
        assert_eq!(
            op("?").expand(&var("list", Modifier::AssocExplode), &context),
            Some("list%5B%5D=red&list%5B%5D=green&list%5B%5D=blue".to_string())
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_expand_map_forms() {
        let context = Context::new()
            .insert("keys", [("semi", ";"), ("dot", ".")])
            .to_owned();

        assert_eq!(
            op("").expand(&var("keys", Modifier::None), &context),
            Some("dot,.,semi,%3B".to_string())
        );
        assert_eq!(
            op("?").expand(&var("keys", Modifier::Explode), &context),
            Some("dot=.&semi=%3B".to_string())
        );
        assert_eq!(
            op("&").expand(&var("keys", Modifier::AssocExplode), &context),
            Some("keys%5Bdot%5D=.&keys%5Bsemi%5D=%3B".to_string())
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_to_regex_rejects_assoc_on_unnamed() {
        let err = op("/").to_regex(&var("x", Modifier::AssocExplode)).unwrap_err();
        assert!(matches!(err, UrilateError::UnsupportedModifier { .. }));

        assert!(op("?").to_regex(&var("x", Modifier::AssocExplode)).is_ok());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_to_regex_fragments_compile() {
        for id in ["", "+", ".", "/", ";", "?", "&", "#"] {
            for modifier in [Modifier::None, Modifier::Explode, Modifier::Truncate(3)] {
                let fragment = op(id).to_regex(&var("x", modifier)).unwrap();
                assert!(regex::Regex::new(&fragment).is_ok(), "bad fragment: {fragment}");
            }
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_extract_scalar_vs_list() {
        assert_eq!(
            op("").extract(&var("x", Modifier::None), "value"),
            Value::Scalar("value".to_string())
        );
        assert_eq!(
            op("").extract(&var("x", Modifier::None), "a,b"),
            Value::List(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_extract_named_explode_routes_lists_and_maps() {
        // Pairs keyed by the variable name form a list.
        assert_eq!(
            op("?").extract(&var("x", Modifier::Explode), "x=a&x=b"),
            Value::List(vec!["a".to_string(), "b".to_string()])
        );
        // Arbitrary keys form a map.
        let extracted = op("?").extract(&var("x", Modifier::Explode), "a=1&b=2");
        let map = extracted.as_map().unwrap();
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_extract_assoc_bracket_forms() {
        assert_eq!(
            op("?").extract(&var("x", Modifier::AssocExplode), "x%5B%5D=a&x%5B%5D=b"),
            Value::List(vec!["a".to_string(), "b".to_string()])
        );
        let extracted = op("?").extract(&var("x", Modifier::AssocExplode), "x%5Bk%5D=v");
        assert_eq!(
            extracted.as_map().and_then(|m| m.get("k")).map(String::as_str),
            Some("v")
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_extract_named_flat_strips_name() {
        assert_eq!(
            op("?").extract(&var("x", Modifier::None), "x=a"),
            Value::Scalar("a".to_string())
        );
        assert_eq!(
            op("?").extract(&var("x", Modifier::None), "&x=a,b"),
            Value::List(vec!["a".to_string(), "b".to_string()])
        );
    }
}
