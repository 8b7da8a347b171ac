use std::{borrow::Cow, fmt::Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i32),
    Text(String),
}

impl Value {
    /// The value a bare declaration starts with.
    pub fn zero(ty: ValueType) -> Self {
        match ty {
            ValueType::Integer => Value::Integer(0),
            ValueType::Text => Value::Text(String::new()),
        }
    }

    pub fn ty(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::Text(_) => ValueType::Text,
        }
    }

    /// Unquoted text form, used when concatenating.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Value::Integer(n) => Cow::Owned(n.to_string()),
            Value::Text(s) => Cow::Borrowed(s),
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Integer => write!(f, "INT"),
            ValueType::Text => write!(f, "STRING"),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values() {
        assert_eq!(Value::zero(ValueType::Integer), Value::Integer(0));
        assert_eq!(Value::zero(ValueType::Text), Value::Text(String::new()));
    }

    #[test]
    fn display_quotes_text_but_render_does_not() {
        let text = Value::Text("hi".into());
        assert_eq!(text.to_string(), "\"hi\"");
        assert_eq!(text.render(), "hi");
        assert_eq!(Value::Integer(-4).render(), "-4");
    }
}
