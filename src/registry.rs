use std::{collections::HashMap, fmt::Display, ops::RangeInclusive};

use miette::Diagnostic;
use thiserror::Error;

/// Code returned for an absent lexeme.
pub const NO_CODE: i32 = -1;

pub const DEFAULT_KEYWORDS: &[&str] = &["int", "string", "body", "remove", "clear", "if", "while"];
pub const DEFAULT_OPERATORS: &[&str] = &["=", "+", "-", "*", "/", "(", ")", ";", "==", "["];

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid {category} range {start}..={end}")]
    #[diagnostic(
        code(registry::invalid_range),
        help("a range needs `start <= end`")
    )]
    InvalidRange {
        category: Category,
        start: i32,
        end: i32,
    },

    #[error("out of {category} codes (limit {end})")]
    #[diagnostic(
        code(registry::range_exhausted),
        help("widen the {category} range in the encoding config")
    )]
    RangeExhausted { category: Category, end: i32 },

    #[error("{category} `{lexeme}` is already registered")]
    #[diagnostic(code(registry::duplicate_lexeme))]
    DuplicateLexeme { category: Category, lexeme: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Keyword,
    Operator,
    Symbol,
    Literal,
    Unknown,
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Keyword => write!(f, "keyword"),
            Category::Operator => write!(f, "operator"),
            Category::Symbol => write!(f, "symbol"),
            Category::Literal => write!(f, "literal"),
            Category::Unknown => write!(f, "unknown"),
        }
    }
}

/// Inclusive code ranges, one per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingConfig {
    keywords: RangeInclusive<i32>,
    operators: RangeInclusive<i32>,
    symbols: RangeInclusive<i32>,
    literals: RangeInclusive<i32>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        EncodingConfig {
            keywords: 100..=199,
            operators: 200..=299,
            symbols: 300..=699,
            literals: 700..=999,
        }
    }
}

impl EncodingConfig {
    /// Ranges are given as `(start, end)`, both ends inclusive.
    pub fn new(
        keywords: (i32, i32),
        operators: (i32, i32),
        symbols: (i32, i32),
        literals: (i32, i32),
    ) -> Result<Self, RegistryError> {
        let checked = |category, (start, end): (i32, i32)| {
            if start <= end {
                Ok(start..=end)
            } else {
                Err(RegistryError::InvalidRange {
                    category,
                    start,
                    end,
                })
            }
        };
        Ok(EncodingConfig {
            keywords: checked(Category::Keyword, keywords)?,
            operators: checked(Category::Operator, operators)?,
            symbols: checked(Category::Symbol, symbols)?,
            literals: checked(Category::Literal, literals)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedToken {
    pub lexeme: String,
    pub category: Category,
    pub code: i32,
}

impl EncodedToken {
    fn unknown() -> Self {
        EncodedToken {
            lexeme: String::new(),
            category: Category::Unknown,
            code: NO_CODE,
        }
    }
}

impl Display for EncodedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {} #{}", self.lexeme, self.category, self.code)
    }
}

/// A `lexeme -> code` table that remembers insertion order.
#[derive(Debug, Default)]
pub struct CodeTable {
    order: Vec<String>,
    codes: HashMap<String, i32>,
}

impl CodeTable {
    pub fn get(&self, lexeme: &str) -> Option<i32> {
        self.codes.get(lexeme).copied()
    }

    pub fn contains(&self, lexeme: &str) -> bool {
        self.codes.contains_key(lexeme)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.order
            .iter()
            .map(|lexeme| (lexeme.as_str(), self.codes[lexeme]))
    }

    fn insert(&mut self, lexeme: &str, code: i32) {
        self.order.push(lexeme.to_string());
        self.codes.insert(lexeme.to_string(), code);
    }
}

/// Assigns every lexeme a stable code inside its category's range.
#[derive(Debug)]
pub struct Registry {
    config: EncodingConfig,
    keywords: CodeTable,
    operators: CodeTable,
    symbols: CodeTable,
    literals: CodeTable,
    lexemes: HashMap<i32, String>,
    categories: HashMap<i32, Category>,
    /// `None` once the cursor has passed `i32::MAX`.
    next_symbol: Option<i32>,
    next_literal: Option<i32>,
}

impl Registry {
    pub fn new(config: EncodingConfig) -> Self {
        let next_symbol = Some(*config.symbols.start());
        let next_literal = Some(*config.literals.start());
        Registry {
            config,
            keywords: CodeTable::default(),
            operators: CodeTable::default(),
            symbols: CodeTable::default(),
            literals: CodeTable::default(),
            lexemes: HashMap::new(),
            categories: HashMap::new(),
            next_symbol,
            next_literal,
        }
    }

    /// Default ranges with the standard keyword and operator lexicon.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        Self::with_lexicon(EncodingConfig::default())
    }

    /// `config` with the standard keyword and operator lexicon.
    pub fn with_lexicon(config: EncodingConfig) -> Result<Self, RegistryError> {
        let mut registry = Registry::new(config);
        registry.register_keywords(DEFAULT_KEYWORDS.iter().copied())?;
        registry.register_operators(DEFAULT_OPERATORS.iter().copied())?;
        Ok(registry)
    }

    pub fn config(&self) -> &EncodingConfig {
        &self.config
    }

    pub fn register_keywords<'a>(
        &mut self,
        lexemes: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), RegistryError> {
        self.register_fixed(Category::Keyword, lexemes)
    }

    pub fn register_operators<'a>(
        &mut self,
        lexemes: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), RegistryError> {
        self.register_fixed(Category::Operator, lexemes)
    }

    fn register_fixed<'a>(
        &mut self,
        category: Category,
        lexemes: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), RegistryError> {
        let (start, end) = match category {
            Category::Keyword => (*self.config.keywords.start(), *self.config.keywords.end()),
            _ => (*self.config.operators.start(), *self.config.operators.end()),
        };
        for lexeme in lexemes {
            let table = self.table(category);
            if table.contains(lexeme) {
                return Err(RegistryError::DuplicateLexeme {
                    category,
                    lexeme: lexeme.to_string(),
                });
            }
            let code = i32::try_from(table.len())
                .ok()
                .and_then(|offset| start.checked_add(offset))
                .filter(|&code| code <= end)
                .ok_or(RegistryError::RangeExhausted { category, end })?;
            self.put(category, lexeme, code);
        }
        Ok(())
    }

    /// Encodes `lexeme`, allocating a literal or symbol code on first sight.
    pub fn encode(&mut self, lexeme: &str) -> Result<EncodedToken, RegistryError> {
        if lexeme.is_empty() {
            return Ok(EncodedToken::unknown());
        }

        let found = |category, code| EncodedToken {
            lexeme: lexeme.to_string(),
            category,
            code,
        };

        if let Some(code) = self.keywords.get(lexeme) {
            return Ok(found(Category::Keyword, code));
        }
        if let Some(code) = self.operators.get(lexeme) {
            return Ok(found(Category::Operator, code));
        }

        let category = if is_numeric(lexeme) {
            Category::Literal
        } else {
            Category::Symbol
        };
        if let Some(code) = self.table(category).get(lexeme) {
            return Ok(found(category, code));
        }

        let code = self.allocate(category)?;
        self.put(category, lexeme, code);
        tracing::trace!(lexeme, %category, code, "allocated code");
        Ok(found(category, code))
    }

    pub fn decode(&self, code: i32) -> Option<&str> {
        self.lexemes.get(&code).map(String::as_str)
    }

    pub fn category_of(&self, code: i32) -> Option<Category> {
        self.categories.get(&code).copied()
    }

    pub fn keywords(&self) -> &CodeTable {
        &self.keywords
    }

    pub fn operators(&self) -> &CodeTable {
        &self.operators
    }

    pub fn symbols(&self) -> &CodeTable {
        &self.symbols
    }

    pub fn literals(&self) -> &CodeTable {
        &self.literals
    }

    fn allocate(&mut self, category: Category) -> Result<i32, RegistryError> {
        let (cursor, end) = match category {
            Category::Literal => (&mut self.next_literal, *self.config.literals.end()),
            _ => (&mut self.next_symbol, *self.config.symbols.end()),
        };
        let Some(code) = cursor.filter(|&code| code <= end) else {
            return Err(RegistryError::RangeExhausted { category, end });
        };
        *cursor = code.checked_add(1);
        Ok(code)
    }

    fn table(&self, category: Category) -> &CodeTable {
        match category {
            Category::Keyword => &self.keywords,
            Category::Operator => &self.operators,
            Category::Literal => &self.literals,
            _ => &self.symbols,
        }
    }

    fn put(&mut self, category: Category, lexeme: &str, code: i32) {
        let table = match category {
            Category::Keyword => &mut self.keywords,
            Category::Operator => &mut self.operators,
            Category::Literal => &mut self.literals,
            _ => &mut self.symbols,
        };
        table.insert(lexeme, code);
        self.lexemes.insert(code, lexeme.to_string());
        self.categories.insert(code, category);
    }
}

/// `digits` optionally followed by `.digits`. No sign, no exponent.
fn is_numeric(lexeme: &str) -> bool {
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match lexeme.split_once('.') {
        Some((whole, fraction)) => all_digits(whole) && all_digits(fraction),
        None => all_digits(lexeme),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn small() -> Registry {
        let config = EncodingConfig::new((1, 2), (10, 12), (20, 21), (30, 31)).unwrap();
        Registry::new(config)
    }

    #[test]
    fn numeric_pattern() {
        assert!(is_numeric("0"));
        assert!(is_numeric("42"));
        assert!(is_numeric("3.14"));
        assert!(!is_numeric("3."));
        assert!(!is_numeric(".5"));
        assert!(!is_numeric("-1"));
        assert!(!is_numeric("1e5"));
        assert!(!is_numeric("1.2.3"));
        assert!(!is_numeric("x1"));
    }

    #[test]
    fn fixed_codes_are_sequential() {
        let mut reg = small();
        reg.register_keywords(["int"]).unwrap();
        reg.register_keywords(["string"]).unwrap();
        reg.register_operators(["=", "+", ";"]).unwrap();

        let keywords: Vec<_> = reg.keywords().iter().collect();
        assert_eq!(keywords, vec![("int", 1), ("string", 2)]);
        let operators: Vec<_> = reg.operators().iter().collect();
        assert_eq!(operators, vec![("=", 10), ("+", 11), (";", 12)]);
    }

    #[test]
    fn fixed_range_exhaustion() {
        let mut reg = small();
        let err = reg.register_keywords(["a", "b", "c"]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::RangeExhausted {
                category: Category::Keyword,
                end: 2
            }
        );
        let err = reg.register_operators(["+", "-", "*", "/"]).unwrap_err();
        assert!(matches!(err, RegistryError::RangeExhausted { category: Category::Operator, .. }));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = small();
        reg.register_keywords(["int"]).unwrap();
        let err = reg.register_keywords(["int"]).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateLexeme { .. }));
        assert_eq!(reg.keywords().len(), 1);
    }

    #[test]
    fn encode_lookup_order() {
        let mut reg = small();
        reg.register_keywords(["int"]).unwrap();
        reg.register_operators(["+"]).unwrap();

        assert_eq!(reg.encode("int").unwrap().category, Category::Keyword);
        assert_eq!(reg.encode("+").unwrap().category, Category::Operator);
        assert_eq!(reg.encode("12").unwrap().category, Category::Literal);
        assert_eq!(reg.encode("1.5").unwrap().category, Category::Literal);
        assert_eq!(reg.encode("x").unwrap().category, Category::Symbol);
    }

    #[test]
    fn encode_is_idempotent_and_decodes() {
        let mut reg = small();
        let first = reg.encode("x").unwrap();
        let second = reg.encode("x").unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.decode(first.code), Some("x"));
        assert_eq!(reg.category_of(first.code), Some(Category::Symbol));
        assert_eq!(reg.symbols().len(), 1);
    }

    #[test]
    fn empty_lexeme_is_unknown() {
        let mut reg = small();
        let token = reg.encode("").unwrap();
        assert_eq!(token.category, Category::Unknown);
        assert_eq!(token.code, NO_CODE);
        assert_eq!(reg.decode(NO_CODE), None);
        assert_eq!(reg.category_of(NO_CODE), None);
    }

    #[test]
    fn dynamic_range_exhaustion() {
        let mut reg = small();
        assert_eq!(reg.encode("a").unwrap().code, 20);
        assert_eq!(reg.encode("b").unwrap().code, 21);
        assert!(matches!(
            reg.encode("c"),
            Err(RegistryError::RangeExhausted { category: Category::Symbol, end: 21 })
        ));
        // cached lexemes still encode
        assert_eq!(reg.encode("a").unwrap().code, 20);

        assert_eq!(reg.encode("1").unwrap().code, 30);
        assert_eq!(reg.encode("2").unwrap().code, 31);
        assert!(matches!(
            reg.encode("3"),
            Err(RegistryError::RangeExhausted { category: Category::Literal, .. })
        ));
    }

    #[test]
    fn ranges_ending_at_i32_max() {
        let config =
            EncodingConfig::new((i32::MAX - 1, i32::MAX), (0, 9), (i32::MAX, i32::MAX), (20, 29))
                .unwrap();
        let mut reg = Registry::new(config);

        assert!(matches!(
            reg.register_keywords(["a", "b", "c"]),
            Err(RegistryError::RangeExhausted { category: Category::Keyword, end: i32::MAX })
        ));
        let keywords: Vec<_> = reg.keywords().iter().collect();
        assert_eq!(keywords, vec![("a", i32::MAX - 1), ("b", i32::MAX)]);

        assert_eq!(reg.encode("x").unwrap().code, i32::MAX);
        for _ in 0..2 {
            assert_eq!(
                reg.encode("y"),
                Err(RegistryError::RangeExhausted {
                    category: Category::Symbol,
                    end: i32::MAX
                })
            );
        }
        assert_eq!(reg.decode(i32::MIN), None);
        assert_eq!(reg.symbols().len(), 1);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = EncodingConfig::new((5, 1), (10, 12), (20, 21), (30, 31)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::InvalidRange {
                category: Category::Keyword,
                start: 5,
                end: 1
            }
        );
    }

    #[test]
    fn default_lexicon_fits_default_ranges() {
        let reg = Registry::with_defaults().unwrap();
        assert_eq!(reg.keywords().get("int"), Some(100));
        assert_eq!(reg.keywords().get("string"), Some(101));
        assert_eq!(reg.operators().get("="), Some(200));
        assert_eq!(reg.operators().len(), DEFAULT_OPERATORS.len());
    }
}
