//! Tree-walking interpreter for parsed scripts.

use std::collections::HashMap;
use std::sync::Arc;

use super::cache::{CacheStats, ParseCache};
use super::error::{ScriptError, ScriptResult};
use super::numeric::{round_to, LIBRARY_NAME};
use super::ops::{self, MAX_GENERATED_LEN};
use super::parser::{parse_script, BinaryOp, Expr, MAX_NESTING};
use super::value::{Builtin, Value};
use super::{Bindings, EvalResult, Evaluator, ARGS_BINDING};

/// Built-in evaluator for Python-flavoured expressions.
///
/// ```text
/// sum(args[0]) / len(args[0])
/// [a * 2 if a > 0 else 0 for a in args[0]]
/// [[x, y] for x, y in zip(args[0], args[1])]
/// numpy.round(numpy.mean(args[0]), 2)
/// ```
pub struct ExpressionEvaluator {
    cache: ParseCache,
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        ExpressionEvaluator {
            cache: ParseCache::default(),
        }
    }

    /// Keep up to `capacity` parse trees; 0 disables the cache.
    pub fn with_cache_capacity(capacity: usize) -> Self {
        ExpressionEvaluator {
            cache: ParseCache::new(capacity),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn parse(&self, script: &str) -> ScriptResult<Arc<Expr>> {
        if let Some(expr) = self.cache.get(script) {
            return Ok(expr);
        }
        let expr = Arc::new(parse_script(script)?);
        self.cache.insert(script, Arc::clone(&expr));
        Ok(expr)
    }
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for ExpressionEvaluator {
    fn evaluate(&self, script: &str, bindings: &Bindings) -> ScriptResult<EvalResult> {
        let expr = self.parse(script)?;
        Interpreter::new(bindings).eval(&expr)?.into_eval_result()
    }
}

/// Evaluation state for one run.
struct Interpreter<'a> {
    bindings: &'a Bindings,
    args: Value,
    /// Comprehension variables, innermost last
    scopes: Vec<HashMap<String, Value>>,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    fn new(bindings: &'a Bindings) -> Self {
        Interpreter {
            bindings,
            args: Value::list(bindings.args().iter().map(Value::from).collect()),
            scopes: Vec::new(),
            depth: 0,
        }
    }

    fn eval(&mut self, expr: &Expr) -> ScriptResult<Value> {
        if self.depth >= MAX_NESTING {
            return Err(ScriptError::value_error(format!(
                "expression nested deeper than {MAX_NESTING} levels"
            )));
        }
        self.depth += 1;
        let result = self.eval_node(expr);
        self.depth -= 1;
        result
    }

    fn eval_node(&mut self, expr: &Expr) -> ScriptResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::None => Ok(Value::None),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => Ok(Value::list(self.eval_all(items)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(items)?)),
            Expr::ListComp {
                element,
                targets,
                iter,
                condition,
            } => self.comprehension(element, targets, iter, condition.as_deref()),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                ops::unary(*op, &value)
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                ops::binary(*op, &l, &r)
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                if let [(op, right)] = rest.as_slice() {
                    let right = self.eval(right)?;
                    return ops::compare(*op, &left, &right);
                }
                for (op, right) in rest {
                    let right = self.eval(right)?;
                    if !ops::compare(*op, &left, &right)?.is_truthy() {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(left, right) => {
                let l = self.eval(left)?;
                if l.is_truthy() {
                    self.eval(right)
                } else {
                    Ok(l)
                }
            }
            Expr::Or(left, right) => {
                let l = self.eval(left)?;
                if l.is_truthy() {
                    Ok(l)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee)?;
                let args = self.eval_all(args)?;
                self.call(&callee, &args)
            }
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(&target, &index)
            }
            Expr::Slice { target, start, end } => {
                let target = self.eval(target)?;
                let start = self.eval_bound(start.as_deref())?;
                let end = self.eval_bound(end.as_deref())?;
                slice_value(&target, start, end)
            }
            Expr::Attribute { target, name } => {
                let target = self.eval(target)?;
                match target {
                    Value::Module(_) => {
                        self.bindings
                            .numpy()
                            .attribute(name)
                            .ok_or_else(|| ScriptError::Attribute {
                                target: LIBRARY_NAME.to_string(),
                                name: name.clone(),
                            })
                    }
                    other => Err(ScriptError::Attribute {
                        target: other.type_name().to_string(),
                        name: name.clone(),
                    }),
                }
            }
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> ScriptResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_bound(&mut self, bound: Option<&Expr>) -> ScriptResult<Option<i64>> {
        match bound {
            None => Ok(None),
            Some(expr) => match self.eval(expr)? {
                Value::None => Ok(None),
                value => integer(&value, "slice indices").map(Some),
            },
        }
    }

    fn lookup(&self, name: &str) -> ScriptResult<Value> {
        if let Some(value) = self.scopes.iter().rev().find_map(|scope| scope.get(name)) {
            return Ok(value.clone());
        }
        if name == ARGS_BINDING {
            return Ok(self.args.clone());
        }
        if name == LIBRARY_NAME {
            return Ok(Value::Module(LIBRARY_NAME));
        }
        Builtin::from_name(name)
            .map(Value::Builtin)
            .ok_or_else(|| ScriptError::Name {
                name: name.to_string(),
            })
    }

    fn comprehension(
        &mut self,
        element: &Expr,
        targets: &[String],
        iter: &Expr,
        condition: Option<&Expr>,
    ) -> ScriptResult<Value> {
        let items = self.eval(iter)?.items()?;
        self.scopes.push(HashMap::new());
        let result = self.comprehension_body(element, targets, &items, condition);
        self.scopes.pop();
        result.map(Value::list)
    }

    fn comprehension_body(
        &mut self,
        element: &Expr,
        targets: &[String],
        items: &[Value],
        condition: Option<&Expr>,
    ) -> ScriptResult<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            self.bind_targets(targets, item)?;
            if let Some(condition) = condition {
                if !self.eval(condition)?.is_truthy() {
                    continue;
                }
            }
            out.push(self.eval(element)?);
        }
        Ok(out)
    }

    fn bind_targets(&mut self, targets: &[String], item: &Value) -> ScriptResult<()> {
        let values = if let [_] = targets {
            vec![item.clone()]
        } else {
            let values = item.items()?;
            if values.len() != targets.len() {
                return Err(ScriptError::value_error(format!(
                    "expected {} values to unpack, got {}",
                    targets.len(),
                    values.len()
                )));
            }
            values
        };
        if let Some(scope) = self.scopes.last_mut() {
            for (name, value) in targets.iter().zip(values) {
                scope.insert(name.clone(), value);
            }
        }
        Ok(())
    }

    fn call(&self, callee: &Value, args: &[Value]) -> ScriptResult<Value> {
        match callee {
            Value::Builtin(builtin) => call_builtin(*builtin, args),
            Value::LibraryFn(name) => self.bindings.numpy().call(name, args),
            other => Err(ScriptError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }
}

/// Integral value of a number, for indices and counts.
fn integer(value: &Value, what: &str) -> ScriptResult<i64> {
    match value.as_number() {
        Some(n) if n.fract() == 0.0 && n.is_finite() => Ok(n as i64),
        _ => Err(ScriptError::type_error(format!(
            "{what} must be integers, not '{}'",
            value.type_name()
        ))),
    }
}

fn index_value(target: &Value, index: &Value) -> ScriptResult<Value> {
    let i = integer(index, "indices")?;
    let resolve = |len: usize| -> ScriptResult<usize> {
        let len = len as i64;
        let resolved = if i < 0 { i + len } else { i };
        if resolved < 0 || resolved >= len {
            return Err(ScriptError::index_error(format!(
                "{} index out of range",
                target.type_name()
            )));
        }
        Ok(resolved as usize)
    };
    match target {
        Value::List(items) | Value::Tuple(items) => Ok(items[resolve(items.len())?].clone()),
        Value::Str(s) => {
            let at = resolve(s.chars().count())?;
            Ok(Value::Str(s.chars().skip(at).take(1).collect()))
        }
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn slice_value(target: &Value, start: Option<i64>, end: Option<i64>) -> ScriptResult<Value> {
    match target {
        Value::List(items) => {
            let (from, to) = slice_bounds(start, end, items.len());
            Ok(Value::list(items[from..to].to_vec()))
        }
        Value::Tuple(items) => {
            let (from, to) = slice_bounds(start, end, items.len());
            Ok(Value::tuple(items[from..to].to_vec()))
        }
        Value::Str(s) => {
            let (from, to) = slice_bounds(start, end, s.chars().count());
            Ok(Value::Str(s.chars().skip(from).take(to - from).collect()))
        }
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// Clamped `from..to` with Python's negative-index rules; empty when reversed.
fn slice_bounds(start: Option<i64>, end: Option<i64>, len: usize) -> (usize, usize) {
    let clamp = |bound: i64| -> usize {
        let resolved = if bound < 0 { bound + len as i64 } else { bound };
        resolved.clamp(0, len as i64) as usize
    };
    let from = start.map_or(0, clamp);
    let to = end.map_or(len, clamp).max(from);
    (from, to)
}

fn expect_args(args: &[Value], builtin: Builtin, min: usize, max: usize) -> ScriptResult<()> {
    if args.len() < min || args.len() > max {
        return Err(ScriptError::type_error(format!(
            "{}() takes {} arguments ({} given)",
            builtin.name(),
            if min == max {
                min.to_string()
            } else {
                format!("{min} to {max}")
            },
            args.len()
        )));
    }
    Ok(())
}

fn call_builtin(builtin: Builtin, args: &[Value]) -> ScriptResult<Value> {
    match builtin {
        Builtin::Len => {
            expect_args(args, builtin, 1, 1)?;
            match &args[0] {
                Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
                Value::List(items) | Value::Tuple(items) => Ok(Value::Number(items.len() as f64)),
                other => Err(ScriptError::type_error(format!(
                    "object of type '{}' has no len()",
                    other.type_name()
                ))),
            }
        }
        Builtin::Sum => {
            expect_args(args, builtin, 1, 2)?;
            let start = args.get(1).cloned().unwrap_or(Value::Number(0.0));
            if matches!(start, Value::Str(_)) {
                return Err(ScriptError::type_error(
                    "sum() can't sum strings, use ''.join(seq) instead",
                ));
            }
            args[0]
                .items()?
                .iter()
                .try_fold(start, |acc, item| ops::binary(BinaryOp::Add, &acc, item))
        }
        Builtin::Min | Builtin::Max => {
            expect_args(args, builtin, 1, usize::MAX)?;
            let items = if let [single] = args {
                single.items()?
            } else {
                args.to_vec()
            };
            let wanted = if builtin == Builtin::Min {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            };
            let mut iter = items.into_iter();
            let mut best = iter.next().ok_or_else(|| {
                ScriptError::value_error(format!("{}() arg is an empty sequence", builtin.name()))
            })?;
            for item in iter {
                if ops::order(&item, &best)? == Some(wanted) {
                    best = item;
                }
            }
            Ok(best)
        }
        Builtin::Abs => {
            expect_args(args, builtin, 1, 1)?;
            ops::map_elements(&args[0], &|v| Ok(Value::Number(v.expect_number("abs()")?.abs())))
        }
        Builtin::Round => {
            expect_args(args, builtin, 1, 2)?;
            let digits = match args.get(1) {
                Some(Value::None) | None => 0,
                Some(d) => integer(d, "round() digits")? as i32,
            };
            ops::map_elements(&args[0], &|v| {
                Ok(Value::Number(round_to(v.expect_number("round()")?, digits)))
            })
        }
        Builtin::Str => {
            expect_args(args, builtin, 0, 1)?;
            Ok(Value::Str(args.first().map(ToString::to_string).unwrap_or_default()))
        }
        Builtin::Float => {
            expect_args(args, builtin, 0, 1)?;
            match args.first() {
                None => Ok(Value::Number(0.0)),
                Some(Value::Str(s)) => s.trim().parse::<f64>().map(Value::Number).map_err(|_| {
                    ScriptError::value_error(format!("could not convert string to float: '{s}'"))
                }),
                Some(v) => v.expect_number("float()").map(Value::Number),
            }
        }
        Builtin::Int => {
            expect_args(args, builtin, 0, 1)?;
            match args.first() {
                None => Ok(Value::Number(0.0)),
                Some(Value::Str(s)) => s
                    .trim()
                    .parse::<i64>()
                    .map(|i| Value::Number(i as f64))
                    .map_err(|_| {
                        ScriptError::value_error(format!(
                            "invalid literal for int() with base 10: '{s}'"
                        ))
                    }),
                Some(v) => {
                    let n = v.expect_number("int()")?;
                    if !n.is_finite() {
                        return Err(ScriptError::value_error(format!(
                            "cannot convert float {} to integer",
                            Value::Number(n)
                        )));
                    }
                    Ok(Value::Number(n.trunc()))
                }
            }
        }
        Builtin::Bool => {
            expect_args(args, builtin, 0, 1)?;
            Ok(Value::Bool(args.first().is_some_and(Value::is_truthy)))
        }
        Builtin::List => {
            expect_args(args, builtin, 0, 1)?;
            match args.first() {
                None => Ok(Value::list(Vec::new())),
                Some(v) => Ok(Value::list(v.items()?)),
            }
        }
        Builtin::Zip => {
            let columns = args
                .iter()
                .map(Value::items)
                .collect::<ScriptResult<Vec<_>>>()?;
            let shortest = columns.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::list(
                (0..shortest)
                    .map(|i| Value::tuple(columns.iter().map(|c| c[i].clone()).collect()))
                    .collect(),
            ))
        }
        Builtin::Range => {
            expect_args(args, builtin, 1, 3)?;
            let bounds = args
                .iter()
                .map(|a| integer(a, "range() arguments"))
                .collect::<ScriptResult<Vec<_>>>()?;
            let (start, stop, step) = match bounds.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step] => (*start, *stop, *step),
                _ => return Err(ScriptError::type_error("range() takes 1 to 3 arguments")),
            };
            if step == 0 {
                return Err(ScriptError::value_error("range() arg 3 must not be zero"));
            }
            let (start, stop, step) = (i128::from(start), i128::from(stop), i128::from(step));
            let span = if step > 0 { stop - start } else { start - stop };
            let count = if span <= 0 {
                0
            } else {
                (span + step.abs() - 1) / step.abs()
            };
            if count > MAX_GENERATED_LEN as i128 {
                return Err(ScriptError::value_error("range() result is too large"));
            }
            Ok(Value::list(
                (0..count)
                    .map(|i| Value::Number((start + i * step) as f64))
                    .collect(),
            ))
        }
        Builtin::Sorted => {
            expect_args(args, builtin, 1, 1)?;
            let mut items = args[0].items()?;
            if items.iter().all(|v| matches!(v, Value::Str(_))) {
                items.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
            } else {
                let mut numbers = items
                    .iter()
                    .map(|v| v.expect_number("sorted()"))
                    .collect::<ScriptResult<Vec<_>>>()?;
                numbers.sort_by(f64::total_cmp);
                items = numbers.into_iter().map(Value::Number).collect();
            }
            Ok(Value::list(items))
        }
    }
}
