//! Arithmetic expressions for formula transformers
//!
//! Expressions use minijinja expression syntax with the input bound as
//! `value`, plus the numeric helpers `round`, `floor`, `ceil`, `abs`, `min`
//! and `max`. A `Math.` prefix on a helper is accepted and stripped.
//!
//! Each expression is compiled once, when its transformer is built, and
//! evaluated against a single numeric input.

use minijinja::value::Rest;
use minijinja::{context, Environment, Expression, UndefinedBehavior};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{TransformError, TransformResult};

fn environment() -> &'static Environment<'static> {
    static ENV: OnceLock<Environment<'static>> = OnceLock::new();
    ENV.get_or_init(|| {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        // half rounds up, like Math.round
        env.add_function("round", |v: f64| (v + 0.5).floor());
        env.add_function("floor", |v: f64| v.floor());
        env.add_function("ceil", |v: f64| v.ceil());
        env.add_function("abs", |v: f64| v.abs());
        env.add_function("min", |values: Rest<f64>| {
            values.iter().copied().fold(f64::INFINITY, f64::min)
        });
        env.add_function("max", |values: Rest<f64>| {
            values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        });
        env
    })
}

/// A compiled arithmetic expression over `value`
#[derive(Clone)]
pub struct Formula {
    source: String,
    expr: Arc<Expression<'static, 'static>>,
}

impl Formula {
    /// Compile an expression
    pub fn parse(source: &str) -> TransformResult<Self> {
        let expr = environment()
            .compile_expression_owned(source.replace("Math.", ""))
            .map_err(|err| TransformError::FormulaParse {
                expression: source.to_string(),
                reason: err.to_string(),
            })?;

        Ok(Self {
            source: source.to_string(),
            expr: Arc::new(expr),
        })
    }

    /// Evaluate against an input value
    ///
    /// Evaluation errors and non-numeric results yield NaN.
    pub fn eval(&self, value: f64) -> f64 {
        self.expr
            .eval(context! { value => value })
            .ok()
            .and_then(|result| f64::try_from(result).ok())
            .unwrap_or(f64::NAN)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Formula").field(&self.source).finish()
    }
}
