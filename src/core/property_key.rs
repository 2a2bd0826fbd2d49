use crate::core::value::{SymbolData, number_to_string};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Clone, Debug)]
pub enum PropertyKey {
    String(Rc<str>),
    Symbol(Rc<SymbolData>),
}

impl PropertyKey {
    /// The array index this key denotes, if it is a canonical index string.
    pub fn array_index(&self) -> Option<u32> {
        match self {
            PropertyKey::String(s) => parse_array_index(s),
            PropertyKey::Symbol(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyKey::String(s) => Some(s),
            PropertyKey::Symbol(_) => None,
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }

    /// Name used when this key names a function (`SetFunctionName`).
    pub fn function_name(&self) -> Rc<str> {
        match self {
            PropertyKey::String(s) => s.clone(),
            PropertyKey::Symbol(sym) => match &sym.description {
                Some(d) => format!("[{d}]").into(),
                None => "".into(),
            },
        }
    }
}

pub fn parse_array_index(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 10 || (s.len() > 1 && s.starts_with('0')) || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = s.parse().ok()?;
    if n < u32::MAX as u64 { Some(n as u32) } else { None }
}

impl PartialEq for PropertyKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropertyKey::String(a), PropertyKey::String(b)) => a == b,
            (PropertyKey::Symbol(a), PropertyKey::Symbol(b)) => a.id == b.id,
            _ => false,
        }
    }
}

impl Eq for PropertyKey {}

impl Hash for PropertyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            PropertyKey::String(s) => {
                0u8.hash(state);
                s.hash(state);
            }
            PropertyKey::Symbol(sym) => {
                1u8.hash(state);
                sym.id.hash(state);
            }
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{s}"),
            PropertyKey::Symbol(sym) => write!(f, "Symbol({})", sym.description.as_deref().unwrap_or("")),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        PropertyKey::String(Rc::from(s))
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::String(Rc::from(s))
    }
}

impl From<Rc<str>> for PropertyKey {
    fn from(s: Rc<str>) -> Self {
        PropertyKey::String(s)
    }
}

impl From<usize> for PropertyKey {
    fn from(n: usize) -> Self {
        PropertyKey::String(Rc::from(n.to_string()))
    }
}

impl From<u32> for PropertyKey {
    fn from(n: u32) -> Self {
        PropertyKey::String(Rc::from(n.to_string()))
    }
}

impl From<f64> for PropertyKey {
    fn from(n: f64) -> Self {
        PropertyKey::String(Rc::from(number_to_string(n)))
    }
}

impl From<&Rc<SymbolData>> for PropertyKey {
    fn from(sym: &Rc<SymbolData>) -> Self {
        PropertyKey::Symbol(sym.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_array_indices() {
        assert_eq!(parse_array_index("0"), Some(0));
        assert_eq!(parse_array_index("42"), Some(42));
        assert_eq!(parse_array_index("042"), None);
        assert_eq!(parse_array_index("4294967295"), None);
        assert_eq!(parse_array_index("-1"), None);
        assert_eq!(PropertyKey::from(1.5).as_str(), Some("1.5"));
    }
}
