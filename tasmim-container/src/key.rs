//! Parameter identification keys.
//!
//! A constructor parameter can be configured either by its declared
//! name or by its zero-based position. [`ParamKey`] carries either form.

use std::fmt;

/// Identifies a constructor parameter in configuration and overrides.
///
/// # Examples
/// ```
/// use tasmim_container::key::ParamKey;
///
/// let by_name = ParamKey::from("host");
/// let by_position = ParamKey::from(0);
///
/// assert_eq!(by_name.name(), Some("host"));
/// assert_eq!(by_position.position(), Some(0));
/// assert_ne!(by_name, by_position);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    /// Zero-based position in the constructor signature
    Position(usize),
    /// Declared parameter name
    Name(String),
}

impl ParamKey {
    /// Returns the position for positional keys.
    #[inline]
    pub fn position(&self) -> Option<usize> {
        match self {
            ParamKey::Position(pos) => Some(*pos),
            ParamKey::Name(_) => None,
        }
    }

    /// Returns the name for named keys.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        match self {
            ParamKey::Position(_) => None,
            ParamKey::Name(name) => Some(name),
        }
    }
}

impl From<usize> for ParamKey {
    fn from(pos: usize) -> Self {
        ParamKey::Position(pos)
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        ParamKey::Name(name.to_string())
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        ParamKey::Name(name)
    }
}

impl fmt::Debug for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Position(pos) => write!(f, "ParamKey(#{pos})"),
            ParamKey::Name(name) => write!(f, "ParamKey(${name})"),
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Position(pos) => write!(f, "#{pos}"),
            ParamKey::Name(name) => write!(f, "${name}"),
        }
    }
}
