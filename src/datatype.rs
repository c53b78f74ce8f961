// used for decimal numbers
use bigdecimal::BigDecimal;
// used for regex predicates
use regex::Regex;

// used when parsing a string to a BigDecimal
use std::str::FromStr;
// used to print out readable forms of a value
use std::fmt;

// ------------- Literal -------------
/// A constant appearing in a pattern or stored against a concept.
///
/// Numbers are kept as [`BigDecimal`] so that `10`, `10.0` and `10.00`
/// compare (and hash) as the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    Number(BigDecimal),
    Str(String),
}

impl Literal {
    pub fn string(s: impl Into<String>) -> Self {
        Literal::Str(s.into())
    }
    pub fn number(n: i64) -> Self {
        Literal::Number(BigDecimal::from(n))
    }
    /// Parses a numeric literal, falling back to a string.
    pub fn parse(raw: &str) -> Self {
        match BigDecimal::from_str(raw) {
            Ok(n) => Literal::Number(n.normalized()),
            Err(_) => Literal::Str(raw.to_owned()),
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            Literal::Number(_) => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n.normalized()),
            Literal::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        }
    }
}

// ------------- Comparator -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Comparator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    Regex,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::Neq => "!=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Contains => "contains",
            Comparator::Regex => "like",
        }
    }
}

// ------------- Predicate -------------
/// A constraint on the value (or the concept id) bound to a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Predicate {
    Id(String),
    Value(Comparator, Literal),
}

impl Predicate {
    pub fn eq(literal: Literal) -> Self {
        Predicate::Value(Comparator::Eq, literal)
    }
    pub fn is_id(&self) -> bool {
        matches!(self, Predicate::Id(_))
    }
    /// Tests a stored value against this predicate. Numbers only compare
    /// with numbers and strings with strings; an id predicate never matches
    /// a value.
    pub fn test(&self, value: &Literal) -> bool {
        let (comparator, literal) = match self {
            Predicate::Id(_) => return false,
            Predicate::Value(c, l) => (c, l),
        };
        match (comparator, value, literal) {
            (Comparator::Contains, Literal::Str(v), Literal::Str(l)) => v.contains(l.as_str()),
            (Comparator::Regex, Literal::Str(v), Literal::Str(l)) => {
                Regex::new(l).map(|re| re.is_match(v)).unwrap_or(false)
            }
            (Comparator::Contains | Comparator::Regex, _, _) => false,
            (Comparator::Eq, v, l) => v == l,
            (Comparator::Neq, v, l) => v != l,
            (c, Literal::Number(v), Literal::Number(l)) => order(*c, v.cmp(l)),
            (c, Literal::Str(v), Literal::Str(l)) => order(*c, v.cmp(l)),
            _ => false,
        }
    }
}

fn order(comparator: Comparator, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match comparator {
        Comparator::Lt => ordering == Less,
        Comparator::Lte => ordering != Greater,
        Comparator::Gt => ordering == Greater,
        Comparator::Gte => ordering != Less,
        _ => false,
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Predicate::Id(id) => write!(f, "id '{}'", id),
            Predicate::Value(Comparator::Eq, l) => write!(f, "{}", l),
            Predicate::Value(Comparator::Regex, Literal::Str(s)) => write!(f, "/{}/", s.replace('/', "\\/")),
            Predicate::Value(Comparator::Contains, l) => write!(f, "contains {}", l),
            Predicate::Value(c, l) => write!(f, "{}{}", c.symbol(), l),
        }
    }
}
