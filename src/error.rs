use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolventError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Malformed atom: {0}")]
    MalformedAtom(String),
    #[error("Cyclic expansion: {0}")]
    CyclicExpansion(String),
    #[error("Ambiguous rule conclusion: rule {rule} concludes {types:?}")]
    AmbiguousRuleConclusion { rule: String, types: Vec<String> },
    #[error("Missing parent: {0}")]
    MissingParent(String),
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Expansion budget exceeded after {steps} steps")]
    ExpansionBudgetExceeded { steps: usize },
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, ResolventError>;

// Helper conversions
impl From<config::ConfigError> for ResolventError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}

impl<R: pest::RuleType> From<pest::error::Error<R>> for ResolventError {
    fn from(e: pest::error::Error<R>) -> Self {
        let (line, col) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        Self::Parse { message: e.variant.message().to_string(), line: Some(line), col: Some(col) }
    }
}
