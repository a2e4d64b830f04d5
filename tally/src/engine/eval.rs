//! The bundled tree-walking expression engine

use super::env::Environment;
use super::funcs;
use super::value::Value;
use crate::ast::{BinOp, Expr, Spanned, UnOp};
use crate::error::{CalcError, Result};
use crate::lexer::tokenize;
use crate::parser;
use crate::util::{find_similar_name, format_suggestion_hint};
use std::collections::HashMap;

/// Maximum expression nesting depth
const MAX_EVAL_DEPTH: usize = 512;

/// Stack growth parameters for deeply nested expressions
const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

/// Builtin function type
pub type BuiltinFn = fn(&[Value]) -> Result<Value>;

/// Compiled form of one line
#[derive(Debug, Clone)]
pub struct Executable {
    ast: Spanned<Expr>,
    /// Pre-folded value when the whole expression is a bare literal
    constant: Option<Value>,
    trivial: bool,
}

impl Executable {
    /// True for forms whose echoed result adds nothing: a bare literal, or
    /// an assignment of a bare literal. The renderer mutes these.
    pub fn is_trivial(&self) -> bool {
        self.trivial
    }
}

/// The default arithmetic engine
pub struct MathEngine {
    builtins: HashMap<String, BuiltinFn>,
}

impl MathEngine {
    pub fn new() -> Self {
        let mut engine = MathEngine {
            builtins: HashMap::new(),
        };
        engine.register_builtins();
        engine
    }

    /// Register built-in functions
    fn register_builtins(&mut self) {
        self.builtins.insert("abs".to_string(), builtin_abs);
        self.builtins.insert("min".to_string(), builtin_min);
        self.builtins.insert("max".to_string(), builtin_max);
        self.builtins.insert("sqrt".to_string(), builtin_sqrt);
        self.builtins.insert("floor".to_string(), builtin_floor);
        self.builtins.insert("ceil".to_string(), builtin_ceil);
        self.builtins.insert("round".to_string(), builtin_round);
        self.builtins.insert("ln".to_string(), builtin_ln);
        self.builtins.insert("log10".to_string(), builtin_log10);
        self.builtins.insert("exp".to_string(), builtin_exp);
        self.builtins.insert("pow".to_string(), builtin_pow);
        self.builtins.insert("sin".to_string(), builtin_sin);
        self.builtins.insert("cos".to_string(), builtin_cos);
        self.builtins.insert("tan".to_string(), builtin_tan);

        // Loan arithmetic
        self.builtins.insert("payment".to_string(), funcs::builtin_payment);
        self.builtins
            .insert("credit_total".to_string(), funcs::builtin_credit_total);
        self.builtins
            .insert("credit_interest".to_string(), funcs::builtin_credit_interest);
        self.builtins
            .insert("terms_for".to_string(), funcs::builtin_terms_for);
    }

    fn eval_expr(
        &self,
        expr: &Spanned<Expr>,
        env: &mut Environment,
        depth: usize,
    ) -> Result<Value> {
        if depth > MAX_EVAL_DEPTH {
            return Err(CalcError::eval("expression too deeply nested"));
        }
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.eval_inner(expr, env, depth)
        })
    }

    fn eval_inner(
        &self,
        expr: &Spanned<Expr>,
        env: &mut Environment,
        depth: usize,
    ) -> Result<Value> {
        match &expr.node {
            Expr::IntLit(n) => Ok(Value::Int(*n)),
            Expr::FloatLit(x) => Ok(Value::Float(*x)),
            Expr::BoolLit(b) => Ok(Value::Bool(*b)),
            Expr::StrLit(s) => Ok(Value::Str(s.clone())),

            Expr::Var(name) => env.get(name).ok_or_else(|| {
                let known: Vec<&str> = env.bindings().keys().map(String::as_str).collect();
                let hint = format_suggestion_hint(find_similar_name(name, &known, 2));
                CalcError::undefined_variable(name, &hint)
            }),

            Expr::Assign { name, value } => {
                let value = self.eval_expr(value, env, depth + 1)?;
                env.define(name.clone(), value.clone());
                Ok(value)
            }

            Expr::Binary { left, op, right } => {
                let left = self.eval_expr(left, env, depth + 1)?;
                let right = self.eval_expr(right, env, depth + 1)?;
                eval_binary(*op, left, right)
            }

            Expr::Unary { op, expr } => {
                let value = self.eval_expr(expr, env, depth + 1)?;
                match op {
                    UnOp::Neg => match value {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(x) => Ok(Value::Float(-x)),
                        other => Err(CalcError::type_error("numeric", other.type_name())),
                    },
                }
            }

            Expr::Call { func, args } => {
                let builtin = self.builtins.get(func).ok_or_else(|| {
                    let known: Vec<&str> = self.builtins.keys().map(String::as_str).collect();
                    let hint = format_suggestion_hint(find_similar_name(func, &known, 2));
                    CalcError::undefined_function(func, &hint)
                })?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expr(arg, env, depth + 1)?);
                }
                builtin(&values)
            }
        }
    }
}

impl Default for MathEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Engine for MathEngine {
    type Ast = Spanned<Expr>;
    type Exec = Executable;

    fn parse(&self, text: &str) -> Result<Spanned<Expr>> {
        parser::parse(tokenize(text)?)
    }

    fn compile(&self, ast: &Spanned<Expr>) -> Result<Executable> {
        let constant = match &ast.node {
            Expr::IntLit(n) => Some(Value::Int(*n)),
            Expr::FloatLit(x) => Some(Value::Float(*x)),
            Expr::BoolLit(b) => Some(Value::Bool(*b)),
            Expr::StrLit(s) => Some(Value::Str(s.clone())),
            _ => None,
        };
        let trivial = constant.is_some()
            || matches!(&ast.node, Expr::Assign { value, .. } if value.node.is_literal());
        Ok(Executable {
            ast: ast.clone(),
            constant,
            trivial,
        })
    }

    fn evaluate(&self, exec: &Executable, env: &mut Environment) -> Result<Value> {
        if let Some(value) = &exec.constant {
            return Ok(value.clone());
        }
        self.eval_expr(&exec.ast, env, 0)
    }

    fn add(&self, left: &Value, right: &Value) -> Result<Value> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => Err(CalcError::aggregation(format!(
                "cannot add {} to a {} total",
                right.type_name(),
                left.type_name()
            ))),
        }
    }

    fn is_trivial(&self, exec: &Executable) -> bool {
        exec.is_trivial()
    }
}

fn eval_binary(op: BinOp, left: Value, right: Value) -> Result<Value> {
    match op {
        // Arithmetic
        BinOp::Add => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => Err(CalcError::type_error(
                "numeric or string",
                &format!("{} + {}", left.type_name(), right.type_name()),
            )),
        },
        BinOp::Sub => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 - b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a - *b as f64)),
            _ => Err(CalcError::type_error(
                "numeric",
                &format!("{} - {}", left.type_name(), right.type_name()),
            )),
        },
        BinOp::Mul => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 * b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a * *b as f64)),
            _ => Err(CalcError::type_error(
                "numeric",
                &format!("{} * {}", left.type_name(), right.type_name()),
            )),
        },
        // Division yields an int only when exact: 1/2 is 0.5, not 0
        BinOp::Div => match (&left, &right) {
            (Value::Int(_), Value::Int(0)) => Err(CalcError::division_by_zero()),
            (Value::Int(a), Value::Int(b)) if a % b == 0 => Ok(Value::Int(a / b)),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Float(*a as f64 / *b as f64)),
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
            (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 / b)),
            (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a / *b as f64)),
            _ => Err(CalcError::type_error(
                "numeric",
                &format!("{} / {}", left.type_name(), right.type_name()),
            )),
        },
        BinOp::Mod => match (&left, &right) {
            (Value::Int(_), Value::Int(0)) => Err(CalcError::division_by_zero()),
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a % b)),
            _ => Err(CalcError::type_error("int", left.type_name())),
        },
        BinOp::Pow => pow_values(&left, &right),

        // Comparison
        BinOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => match (left.as_float(), right.as_float()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => {
                        return Err(CalcError::type_error(
                            "comparable operands",
                            &format!("{} and {}", left.type_name(), right.type_name()),
                        ));
                    }
                },
            };
            let ordering = ordering
                .ok_or_else(|| CalcError::eval("cannot order NaN"))?;
            let result = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Gt => ordering.is_gt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Bool(result))
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if left.is_numeric() && right.is_numeric() {
        return left.as_float() == right.as_float();
    }
    left == right
}

fn pow_values(left: &Value, right: &Value) -> Result<Value> {
    if let (Value::Int(a), Value::Int(b)) = (left, right)
        && *b >= 0
        && let Some(n) = u32::try_from(*b).ok().and_then(|e| a.checked_pow(e))
    {
        return Ok(Value::Int(n));
    }
    match (left.as_float(), right.as_float()) {
        (Some(a), Some(b)) => Ok(Value::Float(a.powf(b))),
        _ => Err(CalcError::type_error(
            "numeric",
            &format!("{} ^ {}", left.type_name(), right.type_name()),
        )),
    }
}

fn expect_arity(name: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(CalcError::arity_mismatch(name, &count.to_string(), args.len()));
    }
    Ok(())
}

pub(super) fn float_arg(name: &str, args: &[Value], index: usize) -> Result<f64> {
    args[index].as_float().ok_or_else(|| {
        CalcError::type_error(
            &format!("numeric argument for {name}"),
            args[index].type_name(),
        )
    })
}

fn builtin_abs(args: &[Value]) -> Result<Value> {
    expect_arity("abs", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(n.abs())),
        Value::Float(x) => Ok(Value::Float(x.abs())),
        other => Err(CalcError::type_error("numeric", other.type_name())),
    }
}

fn builtin_min(args: &[Value]) -> Result<Value> {
    expect_arity("min", args, 2)?;
    let a = float_arg("min", args, 0)?;
    let b = float_arg("min", args, 1)?;
    Ok(if a <= b { args[0].clone() } else { args[1].clone() })
}

fn builtin_max(args: &[Value]) -> Result<Value> {
    expect_arity("max", args, 2)?;
    let a = float_arg("max", args, 0)?;
    let b = float_arg("max", args, 1)?;
    Ok(if a >= b { args[0].clone() } else { args[1].clone() })
}

fn builtin_sqrt(args: &[Value]) -> Result<Value> {
    expect_arity("sqrt", args, 1)?;
    let x = float_arg("sqrt", args, 0)?;
    if x < 0.0 {
        return Err(CalcError::domain_error("sqrt of a negative number"));
    }
    Ok(Value::Float(x.sqrt()))
}

fn builtin_floor(args: &[Value]) -> Result<Value> {
    expect_arity("floor", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(x) => Ok(Value::Float(x.floor())),
        other => Err(CalcError::type_error("numeric", other.type_name())),
    }
}

fn builtin_ceil(args: &[Value]) -> Result<Value> {
    expect_arity("ceil", args, 1)?;
    match &args[0] {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(x) => Ok(Value::Float(x.ceil())),
        other => Err(CalcError::type_error("numeric", other.type_name())),
    }
}

fn builtin_round(args: &[Value]) -> Result<Value> {
    if args.len() != 1 && args.len() != 2 {
        return Err(CalcError::arity_mismatch("round", "1 or 2", args.len()));
    }
    if args.len() == 1 {
        return match &args[0] {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::Float(x) => Ok(Value::Float(x.round())),
            other => Err(CalcError::type_error("numeric", other.type_name())),
        };
    }
    let x = float_arg("round", args, 0)?;
    let digits = match &args[1] {
        Value::Int(n) if (0..=15).contains(n) => *n as i32,
        other => {
            return Err(CalcError::domain_error(format!(
                "round digits must be an int in 0..=15, got {other}"
            )));
        }
    };
    let factor = 10f64.powi(digits);
    Ok(Value::Float((x * factor).round() / factor))
}

fn builtin_ln(args: &[Value]) -> Result<Value> {
    expect_arity("ln", args, 1)?;
    let x = float_arg("ln", args, 0)?;
    if x <= 0.0 {
        return Err(CalcError::domain_error("ln of a non-positive number"));
    }
    Ok(Value::Float(x.ln()))
}

fn builtin_log10(args: &[Value]) -> Result<Value> {
    expect_arity("log10", args, 1)?;
    let x = float_arg("log10", args, 0)?;
    if x <= 0.0 {
        return Err(CalcError::domain_error("log10 of a non-positive number"));
    }
    Ok(Value::Float(x.log10()))
}

fn builtin_exp(args: &[Value]) -> Result<Value> {
    expect_arity("exp", args, 1)?;
    Ok(Value::Float(float_arg("exp", args, 0)?.exp()))
}

fn builtin_pow(args: &[Value]) -> Result<Value> {
    expect_arity("pow", args, 2)?;
    pow_values(&args[0], &args[1])
}

fn builtin_sin(args: &[Value]) -> Result<Value> {
    expect_arity("sin", args, 1)?;
    Ok(Value::Float(float_arg("sin", args, 0)?.sin()))
}

fn builtin_cos(args: &[Value]) -> Result<Value> {
    expect_arity("cos", args, 1)?;
    Ok(Value::Float(float_arg("cos", args, 0)?.cos()))
}

fn builtin_tan(args: &[Value]) -> Result<Value> {
    expect_arity("tan", args, 1)?;
    Ok(Value::Float(float_arg("tan", args, 0)?.tan()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;

    fn eval_str(source: &str) -> Result<Value> {
        let engine = MathEngine::new();
        let mut env = Environment::for_pass();
        let ast = engine.parse(source)?;
        let exec = engine.compile(&ast)?;
        engine.evaluate(&exec, &mut env)
    }

    #[test]
    fn test_eval_integer_arithmetic() {
        assert_eq!(eval_str("1 + 2 * 3").unwrap(), Value::Int(7));
        assert_eq!(eval_str("10 - 4").unwrap(), Value::Int(6));
        assert_eq!(eval_str("10 % 3").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_eval_mixed_promotes_to_float() {
        assert_eq!(eval_str("1 + 0.5").unwrap(), Value::Float(1.5));
        assert_eq!(eval_str("2 * 1.5").unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_eval_division_exact_stays_int() {
        assert_eq!(eval_str("42 / 6").unwrap(), Value::Int(7));
    }

    #[test]
    fn test_eval_division_inexact_gives_float() {
        assert_eq!(eval_str("1 / 2").unwrap(), Value::Float(0.5));
    }

    #[test]
    fn test_eval_division_by_zero() {
        let err = eval_str("1 / 0").unwrap_err();
        assert_eq!(err.message(), "division by zero");
    }

    #[test]
    fn test_eval_power() {
        assert_eq!(eval_str("2 ^ 10").unwrap(), Value::Int(1024));
        assert_eq!(eval_str("2 ^ -1").unwrap(), Value::Float(0.5));
        assert_eq!(eval_str("-2 ^ 2").unwrap(), Value::Int(-4));
    }

    #[test]
    fn test_eval_string_concat() {
        assert_eq!(
            eval_str(r#""foo" + "bar""#).unwrap(),
            Value::Str("foobar".into())
        );
    }

    #[test]
    fn test_eval_string_plus_number_is_type_error() {
        let err = eval_str(r#""foo" + 1"#).unwrap_err();
        assert!(err.message().contains("type error"));
    }

    #[test]
    fn test_eval_comparisons() {
        assert_eq!(eval_str("1 < 2").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("2 <= 2").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("1 == 1.0").unwrap(), Value::Bool(true));
        assert_eq!(eval_str("1 != 2").unwrap(), Value::Bool(true));
        assert_eq!(eval_str(r#""a" < "b""#).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_eval_assignment_binds() {
        let engine = MathEngine::new();
        let mut env = Environment::for_pass();
        let exec = engine.compile(&engine.parse("x = 5 * 4").unwrap()).unwrap();
        assert_eq!(engine.evaluate(&exec, &mut env).unwrap(), Value::Int(20));
        assert_eq!(env.get("x"), Some(Value::Int(20)));
    }

    #[test]
    fn test_eval_undefined_variable_with_hint() {
        let engine = MathEngine::new();
        let mut env = Environment::for_pass();
        env.define("total".to_string(), Value::Int(1));
        let exec = engine.compile(&engine.parse("totl + 1").unwrap()).unwrap();
        let err = engine.evaluate(&exec, &mut env).unwrap_err();
        assert!(err.message().contains("undefined variable: totl"));
        assert!(err.message().contains("did you mean `total`?"));
    }

    #[test]
    fn test_eval_undefined_function_with_hint() {
        let err = eval_str("sqqt(4)").unwrap_err();
        assert!(err.message().contains("undefined function: sqqt"));
        assert!(err.message().contains("did you mean `sqrt`?"));
    }

    #[test]
    fn test_eval_constants() {
        match eval_str("pi").unwrap() {
            Value::Float(x) => assert!((x - std::f64::consts::PI).abs() < f64::EPSILON),
            other => panic!("expected Float, got {:?}", other),
        }
    }

    #[test]
    fn test_eval_builtin_arity_mismatch() {
        let err = eval_str("min(1)").unwrap_err();
        assert!(err.message().contains("expects 2 argument(s), got 1"));
    }

    #[test]
    fn test_eval_builtins() {
        assert_eq!(eval_str("abs(-3)").unwrap(), Value::Int(3));
        assert_eq!(eval_str("min(3, 5)").unwrap(), Value::Int(3));
        assert_eq!(eval_str("max(3, 5)").unwrap(), Value::Int(5));
        assert_eq!(eval_str("sqrt(9)").unwrap(), Value::Float(3.0));
        assert_eq!(eval_str("floor(1.7)").unwrap(), Value::Float(1.0));
        assert_eq!(eval_str("ceil(1.2)").unwrap(), Value::Float(2.0));
        assert_eq!(eval_str("round(1.5)").unwrap(), Value::Float(2.0));
        assert_eq!(eval_str("round(1.2345, 2)").unwrap(), Value::Float(1.23));
        assert_eq!(eval_str("pow(2, 8)").unwrap(), Value::Int(256));
    }

    #[test]
    fn test_eval_sqrt_negative_is_domain_error() {
        let err = eval_str("sqrt(-1)").unwrap_err();
        assert!(err.message().contains("sqrt of a negative number"));
    }

    #[test]
    fn test_eval_ln_domain() {
        assert!(eval_str("ln(0)").is_err());
        assert_eq!(eval_str("ln(1)").unwrap(), Value::Float(0.0));
    }

    #[test]
    fn test_compile_folds_literals() {
        let engine = MathEngine::new();
        let exec = engine.compile(&engine.parse("42").unwrap()).unwrap();
        assert!(exec.is_trivial());
        let exec = engine.compile(&engine.parse("x = 42").unwrap()).unwrap();
        assert!(exec.is_trivial());
        let exec = engine.compile(&engine.parse("1 + 2").unwrap()).unwrap();
        assert!(!exec.is_trivial());
    }

    #[test]
    fn test_add_aggregation() {
        let engine = MathEngine::new();
        assert_eq!(
            engine.add(&Value::Int(1), &Value::Int(2)).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            engine.add(&Value::Int(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        let err = engine.add(&Value::Int(0), &Value::Str("x".into())).unwrap_err();
        assert!(matches!(err, CalcError::Aggregation { .. }));
    }

    #[test]
    fn test_eval_deep_nesting_is_capped() {
        let deep = format!("{}1", "-".repeat(600));
        let err = eval_str(&deep).unwrap_err();
        assert!(err.message().contains("too deeply nested"));
    }
}
