pub type UrilateResult<T> = std::result::Result<T, UrilateError>;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    /// The leading character of an expression is neither a known operator
    /// nor the start of a valid variable name.
    InvalidOperator {
        found: String,
    },
    InvalidVariableName {
        name: String,
    },
    /// The `:` prefix modifier was followed by something other than an
    /// unsigned integer, e.g. `{var:abc}`.
    NonNumericLength {
        variable: String,
        found: String,
    },
    MultipleModifiers {
        variable: String,
    },
    EmptyExpression,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidOperator { found } => {
                write!(f, "Invalid operator [{}]", found)
            }
            Self::InvalidVariableName { name } => {
                write!(f, "Invalid variable name [{}]", name)
            }
            Self::NonNumericLength { variable, found } => {
                write!(
                    f,
                    "Value for `:` modifier must be numeric [{}:{}]",
                    variable, found
                )
            }
            Self::MultipleModifiers { variable } => {
                write!(
                    f,
                    "Multiple modifiers per variable are not allowed [{}]",
                    variable
                )
            }
            Self::EmptyExpression => {
                write!(f, "Expression contains no variables")
            }
        }
    }
}

impl std::error::Error for ParseErrorKind {}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseError {
    /// The expression token being parsed when the error occurred.
    pub token: String,
    pub kind: ParseErrorKind,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error in `{{{}}}`: {}", self.token, self.kind)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UrilateError {
    Parse(ParseError),
    /// The associative-explode modifier (`%`) only works with named
    /// operators (`;`, `?`, `&`); matching an unnamed expression that
    /// carries it is an error.
    UnsupportedModifier {
        variable: String,
        operator: String,
    },
    /// A generated match pattern was rejected by the regex engine, e.g. a
    /// prefix modifier with an absurdly large length.
    InvalidPattern {
        pattern: String,
        message: String,
    },
}

impl std::fmt::Display for UrilateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(parse_error) => {
                write!(f, "{}", parse_error)
            }
            Self::UnsupportedModifier { variable, operator } => {
                write!(
                    f,
                    "% (assoc) modifier on [{}] only works with named operators, not [{}]",
                    variable, operator
                )
            }
            Self::InvalidPattern { pattern, message } => {
                write!(
                    f,
                    "Could not compile match pattern `{}`: {}",
                    pattern, message
                )
            }
        }
    }
}

impl std::error::Error for UrilateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(parse_error) => Some(parse_error),
            Self::UnsupportedModifier { .. } | Self::InvalidPattern { .. } => None,
        }
    }
}

impl From<ParseError> for UrilateError {
    fn from(error: ParseError) -> Self {
        Self::Parse(error)
    }
}
