use std::collections::{BTreeMap, HashMap};

use miette::Diagnostic;
use thiserror::Error;

use crate::{
    registry::{Category, CodeTable, EncodedToken, Registry, RegistryError},
    value::{Value, ValueType},
};

/// Everything that can reject a single statement.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum StatementError {
    #[error("{message} near '{near}'")]
    #[diagnostic(code(statement::syntax))]
    Syntax { message: &'static str, near: String },

    #[error("Undeclared identifier '{name}'")]
    #[diagnostic(
        code(statement::undeclared),
        help("declare it first, e.g. `int {name} ;`")
    )]
    UndeclaredIdentifier { name: String },

    #[error("Redeclaration of '{name}'")]
    #[diagnostic(code(statement::redeclaration), help("assign with `{name} = ...` instead"))]
    Redeclaration { name: String },

    #[error("Type mismatch for '{name}': expected {expected}, found {found}")]
    #[diagnostic(code(statement::type_mismatch))]
    TypeMismatch {
        name: String,
        expected: ValueType,
        found: ValueType,
    },

    #[error("Mismatched parenthesis near '{near}'")]
    #[diagnostic(code(statement::parenthesis))]
    MismatchedParenthesis { near: String },

    #[error("Empty expression near '{near}'")]
    #[diagnostic(code(statement::empty_expression))]
    EmptyExpression { near: String },

    #[error("Missing operand near '{near}'")]
    #[diagnostic(code(statement::missing_operand))]
    MissingOperand { near: String },

    #[error("Not an int: '{lexeme}'")]
    #[diagnostic(
        code(statement::not_a_number),
        help("only 32-bit integers without a fraction are supported")
    )]
    NotANumber { lexeme: String },

    #[error("Division by zero near '{near}'")]
    #[diagnostic(code(statement::division_by_zero))]
    DivisionByZero { near: String },

    #[error("No tokens in statement")]
    #[diagnostic(code(statement::no_tokens))]
    NoTokens,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Registry(#[from] RegistryError),
}

impl StatementError {
    fn syntax(message: &'static str, token: &EncodedToken) -> Self {
        StatementError::Syntax {
            message,
            near: token.lexeme.clone(),
        }
    }
}

/// How an accepted token sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every statement was closed by `;`.
    Complete,
    /// The trailing `;` was missing but the pending expression still committed.
    Recovered,
    /// The sequence stopped mid-statement and nothing was committed for it.
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    KwInt,
    KwString,
    Symbol,
    Literal,
    Eq,
    Plus,
    Minus,
    Mult,
    Div,
    LParen,
    RParen,
    Semi,
    Other,
}

/// Codes of the lexemes the recognizer depends on. `None` when a lexeme was
/// never registered, so it can never match a real code.
#[derive(Debug)]
struct SpecialCodes {
    int: Option<i32>,
    string: Option<i32>,
    eq: Option<i32>,
    plus: Option<i32>,
    minus: Option<i32>,
    mult: Option<i32>,
    div: Option<i32>,
    lparen: Option<i32>,
    rparen: Option<i32>,
    semi: Option<i32>,
}

impl SpecialCodes {
    fn resolve(keywords: &CodeTable, operators: &CodeTable) -> Self {
        SpecialCodes {
            int: keywords.get("int"),
            string: keywords.get("string"),
            eq: operators.get("="),
            plus: operators.get("+"),
            minus: operators.get("-"),
            mult: operators.get("*"),
            div: operators.get("/"),
            lparen: operators.get("("),
            rparen: operators.get(")"),
            semi: operators.get(";"),
        }
    }

    fn classify(&self, token: &EncodedToken) -> Column {
        let code = Some(token.code);
        let special = [
            (self.int, Column::KwInt),
            (self.string, Column::KwString),
            (self.eq, Column::Eq),
            (self.plus, Column::Plus),
            (self.minus, Column::Minus),
            (self.mult, Column::Mult),
            (self.div, Column::Div),
            (self.lparen, Column::LParen),
            (self.rparen, Column::RParen),
            (self.semi, Column::Semi),
        ];
        if let Some(&(_, column)) = special.iter().find(|(special, _)| *special == code) {
            return column;
        }
        match token.category {
            Category::Symbol if is_quoted(&token.lexeme) => Column::Literal,
            Category::Symbol => Column::Symbol,
            Category::Literal => Column::Literal,
            _ => Column::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn from_column(column: Column) -> Option<Self> {
        match column {
            Column::Plus => Some(BinaryOp::Add),
            Column::Minus => Some(BinaryOp::Sub),
            Column::Mult => Some(BinaryOp::Mul),
            Column::Div => Some(BinaryOp::Div),
            _ => None,
        }
    }

    /// Integers combine natively; any text operand turns the result into the
    /// concatenation of both renderings, whatever the operator.
    fn apply(self, lhs: Value, rhs: Value, symbol: &str) -> Result<Value, StatementError> {
        match (lhs, rhs) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(match self {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div => {
                    if b == 0 {
                        return Err(StatementError::DivisionByZero {
                            near: symbol.to_string(),
                        });
                    }
                    a.wrapping_div(b)
                }
            })),
            (lhs, rhs) => Ok(Value::Text(format!("{}{}", lhs.render(), rhs.render()))),
        }
    }
}

/// Binding weights. Only `+` carries an explicit weight and the fallback
/// equals it, so every operator groups left to right.
#[derive(Debug)]
struct Precedence {
    weights: HashMap<BinaryOp, u8>,
    fallback: u8,
}

impl Default for Precedence {
    fn default() -> Self {
        Precedence {
            weights: HashMap::from([(BinaryOp::Add, 10)]),
            fallback: 10,
        }
    }
}

impl Precedence {
    fn of(&self, op: BinaryOp) -> u8 {
        self.weights.get(&op).copied().unwrap_or(self.fallback)
    }
}

/// Operators keep the lexeme they were written as, for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Paren,
    Op(BinaryOp, String),
}

/// Operand and operator stacks for one right-hand side.
#[derive(Debug, Default)]
struct Expression {
    operands: Vec<Value>,
    operators: Vec<Pending>,
}

impl Expression {
    fn is_empty(&self) -> bool {
        self.operands.is_empty() && self.operators.is_empty()
    }

    fn push_literal(&mut self, lexeme: &str) -> Result<(), StatementError> {
        let value = if is_quoted(lexeme) {
            Value::Text(lexeme[1..lexeme.len() - 1].to_string())
        } else {
            Value::Integer(lexeme.parse().map_err(|_| StatementError::NotANumber {
                lexeme: lexeme.to_string(),
            })?)
        };
        self.operands.push(value);
        Ok(())
    }

    fn push_symbol(
        &mut self,
        symbols: &BTreeMap<String, Value>,
        name: &str,
    ) -> Result<(), StatementError> {
        let value = symbols
            .get(name)
            .ok_or_else(|| StatementError::UndeclaredIdentifier {
                name: name.to_string(),
            })?;
        self.operands.push(value.clone());
        Ok(())
    }

    fn push_operator(
        &mut self,
        op: BinaryOp,
        precedence: &Precedence,
        near: &str,
    ) -> Result<(), StatementError> {
        while let Some(Pending::Op(top, _)) = self.operators.last() {
            if precedence.of(*top) < precedence.of(op) {
                break;
            }
            if let Some(Pending::Op(top, symbol)) = self.operators.pop() {
                self.apply(top, &symbol, near)?;
            }
        }
        self.operators.push(Pending::Op(op, near.to_string()));
        Ok(())
    }

    fn open(&mut self) {
        self.operators.push(Pending::Paren);
    }

    fn close(&mut self, near: &str) -> Result<(), StatementError> {
        loop {
            match self.operators.pop() {
                Some(Pending::Op(op, symbol)) => self.apply(op, &symbol, near)?,
                Some(Pending::Paren) => return Ok(()),
                None => {
                    return Err(StatementError::MismatchedParenthesis {
                        near: near.to_string(),
                    });
                }
            }
        }
    }

    /// Reduces everything left and yields the top operand.
    fn finish(&mut self, near: &str) -> Result<Value, StatementError> {
        while let Some(pending) = self.operators.pop() {
            match pending {
                Pending::Op(op, symbol) => self.apply(op, &symbol, near)?,
                Pending::Paren => {
                    return Err(StatementError::MismatchedParenthesis {
                        near: near.to_string(),
                    });
                }
            }
        }
        self.operands
            .pop()
            .ok_or_else(|| StatementError::EmptyExpression {
                near: near.to_string(),
            })
    }

    /// Pops two operands and applies `op`, written as `symbol` in the source.
    /// `near` is the lexeme that triggered the reduction.
    fn apply(&mut self, op: BinaryOp, symbol: &str, near: &str) -> Result<(), StatementError> {
        let missing = || StatementError::MissingOperand {
            near: near.to_string(),
        };
        let rhs = self.operands.pop().ok_or_else(missing)?;
        let lhs = self.operands.pop().ok_or_else(missing)?;
        tracing::trace!(?op, %lhs, %rhs, "apply");
        self.operands.push(op.apply(lhs, rhs, symbol)?);
        Ok(())
    }
}

#[derive(Debug)]
enum Target {
    Declare(ValueType, String),
    Assign(String),
}

#[derive(Debug)]
enum State {
    Start,
    DeclType(ValueType),
    DeclName(ValueType, String),
    AssignLhs(String),
    AfterEq(Target),
}

pub struct Interpreter<'s> {
    registry: Registry,
    codes: SpecialCodes,
    precedence: Precedence,
    symbols: BTreeMap<String, Value>,
    sink: Box<dyn FnMut(&str) + 's>,
}

impl<'s> Interpreter<'s> {
    /// Builds an interpreter over `registry`; trace lines go to `sink`.
    ///
    /// The codes for `int`, `string`, `=`, `+`, `-`, `*`, `/`, `(`, `)` and
    /// `;` are resolved here, so they must already be registered.
    pub fn new(registry: Registry, sink: impl FnMut(&str) + 's) -> Self {
        let codes = SpecialCodes::resolve(registry.keywords(), registry.operators());
        Interpreter {
            registry,
            codes,
            precedence: Precedence::default(),
            symbols: BTreeMap::new(),
            sink: Box::new(sink),
        }
    }

    pub fn silent(registry: Registry) -> Self {
        Self::new(registry, |_| {})
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn symbols(&self) -> &BTreeMap<String, Value> {
        &self.symbols
    }

    pub fn dump_symbols(&self) -> String {
        let entries = self
            .symbols
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>();
        format!("Symbols: {}", entries.join(", "))
    }

    /// Runs one statement and reports only whether it was accepted.
    pub fn execute<S: AsRef<str>>(&mut self, tokens: &[S]) -> bool {
        self.run(tokens).is_ok()
    }

    /// Runs one statement. A rejected statement is logged and leaves the
    /// symbol table as it was before the statement began.
    #[tracing::instrument(level = "debug", skip_all, fields(tokens = tokens.len()))]
    pub fn run<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<Completion, StatementError> {
        let result = self.recognize(tokens);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "statement rejected");
            self.log(&format!("!   {e}"));
        }
        result
    }

    fn recognize<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<Completion, StatementError> {
        let tokens = tokens
            .iter()
            .map(|lexeme| lexeme.as_ref())
            .filter(|lexeme| !lexeme.is_empty())
            .map(|lexeme| self.registry.encode(lexeme))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(last) = tokens.last() else {
            return Err(StatementError::NoTokens);
        };

        let mut state = State::Start;
        let mut expr = Expression::default();

        for token in &tokens {
            let column = self.codes.classify(token);
            tracing::trace!(lexeme = %token.lexeme, ?column, ?state, "step");
            let lexeme = token.lexeme.as_str();

            state = match state {
                State::Start => match column {
                    Column::KwInt => State::DeclType(ValueType::Integer),
                    Column::KwString => State::DeclType(ValueType::Text),
                    Column::Symbol => State::AssignLhs(lexeme.to_string()),
                    Column::Semi => State::Start,
                    _ => {
                        return Err(StatementError::syntax(
                            "Expected declaration or assignment",
                            token,
                        ));
                    }
                },
                State::DeclType(ty) => match column {
                    Column::Symbol => State::DeclName(ty, lexeme.to_string()),
                    _ => return Err(StatementError::syntax("Expected name after type", token)),
                },
                State::DeclName(ty, name) => match column {
                    Column::Semi => {
                        self.declare(ty, name, Value::zero(ty), "decl")?;
                        State::Start
                    }
                    Column::Eq => {
                        expr = Expression::default();
                        State::AfterEq(Target::Declare(ty, name))
                    }
                    _ => {
                        return Err(StatementError::syntax(
                            "Expected '=' or ';' after name",
                            token,
                        ));
                    }
                },
                State::AssignLhs(name) => match column {
                    Column::Eq => {
                        expr = Expression::default();
                        State::AfterEq(Target::Assign(name))
                    }
                    _ => {
                        return Err(StatementError::syntax(
                            "Expected '=' after identifier",
                            token,
                        ));
                    }
                },
                State::AfterEq(target) if column == Column::Semi => {
                    let value = expr.finish(lexeme)?;
                    self.commit(target, value)?;
                    State::Start
                }
                State::AfterEq(target) => {
                    match column {
                        Column::Literal => expr.push_literal(lexeme)?,
                        Column::Symbol => expr.push_symbol(&self.symbols, lexeme)?,
                        Column::LParen => expr.open(),
                        Column::RParen => expr.close(lexeme)?,
                        column => match BinaryOp::from_column(column) {
                            Some(op) => expr.push_operator(op, &self.precedence, lexeme)?,
                            None => {
                                return Err(StatementError::syntax(
                                    "Unexpected token in expression",
                                    token,
                                ));
                            }
                        },
                    }
                    State::AfterEq(target)
                }
            };
        }

        Ok(self.end_of_tokens(state, expr, &last.lexeme))
    }

    /// The sequence ran out before a closing `;`.
    fn end_of_tokens(&mut self, state: State, mut expr: Expression, last: &str) -> Completion {
        match state {
            State::Start => Completion::Complete,
            State::AfterEq(target) if !expr.is_empty() => {
                match expr.finish(last).and_then(|value| self.commit(target, value)) {
                    Ok(()) => Completion::Recovered,
                    Err(e) => {
                        tracing::debug!(error = %e, "recovery failed");
                        self.log("!   Incomplete statement (missing ';')");
                        Completion::Incomplete
                    }
                }
            }
            _ => {
                self.log("!   Incomplete statement (missing ';')");
                Completion::Incomplete
            }
        }
    }

    fn commit(&mut self, target: Target, value: Value) -> Result<(), StatementError> {
        match target {
            Target::Declare(ty, name) => self.declare(ty, name, value, "decl-init"),
            Target::Assign(name) => self.assign(name, value),
        }
    }

    fn declare(
        &mut self,
        ty: ValueType,
        name: String,
        value: Value,
        action: &str,
    ) -> Result<(), StatementError> {
        if value.ty() != ty {
            return Err(StatementError::TypeMismatch {
                name,
                expected: ty,
                found: value.ty(),
            });
        }
        if self.symbols.contains_key(&name) {
            return Err(StatementError::Redeclaration { name });
        }
        tracing::debug!(%name, %value, action, "declare");
        self.log(&format!("    {action} {name}:{ty} = {value}"));
        self.symbols.insert(name, value);
        Ok(())
    }

    fn assign(&mut self, name: String, value: Value) -> Result<(), StatementError> {
        let Some(old) = self.symbols.get(&name) else {
            return Err(StatementError::UndeclaredIdentifier { name });
        };
        if old.ty() != value.ty() {
            return Err(StatementError::TypeMismatch {
                expected: old.ty(),
                found: value.ty(),
                name,
            });
        }
        tracing::debug!(%name, %value, "assign");
        self.log(&format!("    assign {name} = {value}"));
        self.symbols.insert(name, value);
        Ok(())
    }

    fn log(&mut self, line: &str) {
        (self.sink)(line);
    }
}

fn is_quoted(lexeme: &str) -> bool {
    lexeme.len() >= 2 && lexeme.starts_with('"') && lexeme.ends_with('"')
}
