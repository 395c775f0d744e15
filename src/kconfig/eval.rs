#![allow(dead_code)]

//! Tristate expression evaluation.
//!
//! Mirrors kconfiglib's own evaluation rules: `&&`/`||` are min/max over the
//! three-valued `n < m < y` ordering, `!` inverts `n`/`y` and leaves `m`
//! alone, and comparisons fall back to either numeric or lexical string
//! comparison of both sides' string values.

use std::fmt;

use crate::ast::Expr;
use crate::kconfig::symbols::SymbolTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tristate {
    N,
    M,
    Y,
}

impl Tristate {
    pub fn as_str(self) -> &'static str {
        match self {
            Tristate::N => "n",
            Tristate::M => "m",
            Tristate::Y => "y",
        }
    }

    pub fn from_str(s: &str) -> Option<Tristate> {
        match s {
            "n" => Some(Tristate::N),
            "m" => Some(Tristate::M),
            "y" => Some(Tristate::Y),
            _ => None,
        }
    }

    pub fn not(self) -> Tristate {
        match self {
            Tristate::N => Tristate::Y,
            Tristate::M => Tristate::M,
            Tristate::Y => Tristate::N,
        }
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Tristate(Tristate),
    Str(String),
}

impl Value {
    pub fn as_tristate(&self) -> Tristate {
        match self {
            Value::Tristate(t) => *t,
            Value::Str(s) => {
                if s.is_empty() {
                    Tristate::N
                } else {
                    Tristate::Y
                }
            }
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            Value::Tristate(t) => t.as_str().to_string(),
            Value::Str(s) => s.clone(),
        }
    }
}

/// Evaluate an expression to a tristate value against `table`'s current
/// symbol values. Bare `y`/`m`/`n` literals are looked up as pseudo-symbols
/// first, matching how the lexer/parser hand them back as plain
/// `Expr::Symbol`.
pub fn eval_tristate(expr: &Expr, table: &SymbolTable) -> Tristate {
    match expr {
        Expr::Symbol(name, _) => {
            if let Some(t) = Tristate::from_str(name) {
                return t;
            }
            table.value_of(name).as_tristate()
        }
        Expr::StringLit(s, _) => {
            if s.is_empty() {
                Tristate::N
            } else {
                Tristate::Y
            }
        }
        Expr::Not(e) => eval_tristate(e, table).not(),
        Expr::Paren(e) => eval_tristate(e, table),
        Expr::And(a, b) => eval_tristate(a, table).min(eval_tristate(b, table)),
        Expr::Or(a, b) => eval_tristate(a, table).max(eval_tristate(b, table)),
        Expr::Eq(a, b) => bool_to_tristate(compare(a, b, table) == std::cmp::Ordering::Equal),
        Expr::NotEq(a, b) => bool_to_tristate(compare(a, b, table) != std::cmp::Ordering::Equal),
        Expr::Less(a, b) => bool_to_tristate(compare(a, b, table) == std::cmp::Ordering::Less),
        Expr::LessEq(a, b) => {
            bool_to_tristate(compare(a, b, table) != std::cmp::Ordering::Greater)
        }
        Expr::Greater(a, b) => {
            bool_to_tristate(compare(a, b, table) == std::cmp::Ordering::Greater)
        }
        Expr::GreaterEq(a, b) => bool_to_tristate(compare(a, b, table) != std::cmp::Ordering::Less),
    }
}

fn bool_to_tristate(b: bool) -> Tristate {
    if b {
        Tristate::Y
    } else {
        Tristate::N
    }
}

/// Evaluate an expression to its string value — used for `default`/`range`
/// bodies of `string`/`int`/`hex` symbols, where the expression is really
/// just a symbol reference or a literal rather than a logical formula.
pub fn eval_string(expr: &Expr, table: &SymbolTable) -> String {
    match expr {
        Expr::Symbol(name, _) => {
            if let Some(t) = Tristate::from_str(name) {
                return t.as_str().to_string();
            }
            table.value_of(name).as_string()
        }
        Expr::StringLit(s, _) => s.clone(),
        Expr::Paren(e) => eval_string(e, table),
        Expr::Not(e) => eval_tristate(e, table).not().as_str().to_string(),
        other => eval_tristate(other, table).as_str().to_string(),
    }
}

fn compare(a: &Expr, b: &Expr, table: &SymbolTable) -> std::cmp::Ordering {
    let sa = eval_string(a, table);
    let sb = eval_string(b, table);
    if let (Some(na), Some(nb)) = (parse_numeric(&sa), parse_numeric(&sb)) {
        na.cmp(&nb)
    } else {
        sa.cmp(&sb)
    }
}

/// Parse a decimal or `0x`-prefixed hex literal the way Kconfig's numeric
/// comparisons do; non-numeric strings fall back to lexical comparison.
fn parse_numeric(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        s.parse::<i64>().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kconfig::symbols::SymbolTable;

    #[test]
    fn literal_tristates_evaluate_directly() {
        let table = SymbolTable::empty();
        let y = Expr::Symbol("y".into(), Default::default());
        let n = Expr::Symbol("n".into(), Default::default());
        assert_eq!(eval_tristate(&y, &table), Tristate::Y);
        assert_eq!(eval_tristate(&n, &table), Tristate::N);
    }

    #[test]
    fn and_or_not_follow_three_valued_logic() {
        let table = SymbolTable::empty();
        let y = Expr::Symbol("y".into(), Default::default());
        let m = Expr::Symbol("m".into(), Default::default());
        let and = Expr::And(Box::new(y.clone()), Box::new(m.clone()));
        assert_eq!(eval_tristate(&and, &table), Tristate::M);
        let not_m = Expr::Not(Box::new(m));
        assert_eq!(eval_tristate(&not_m, &table), Tristate::M);
        let or = Expr::Or(Box::new(Expr::Symbol("n".into(), Default::default())), Box::new(y));
        assert_eq!(eval_tristate(&or, &table), Tristate::Y);
    }

    #[test]
    fn numeric_comparison_uses_value_not_lexical_order() {
        let table = SymbolTable::empty();
        let a = Expr::StringLit("9".into(), Default::default());
        let b = Expr::StringLit("10".into(), Default::default());
        let less = Expr::Less(Box::new(a), Box::new(b));
        assert_eq!(eval_tristate(&less, &table), Tristate::Y);
    }
}
