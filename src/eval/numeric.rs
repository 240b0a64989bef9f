//! Numeric library bound to scripts as `numpy`.
//!
//! A small array toolkit over lists of numbers. Reductions flatten nested
//! lists; element-wise functions keep the input shape.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::error::{ScriptError, ScriptResult};
use super::ops::{self, ZeroDivision, MAX_GENERATED_LEN};
use super::parser::BinaryOp;
use super::value::Value;

/// Signature of a library function.
pub type LibraryFn = fn(&[Value]) -> ScriptResult<Value>;

/// Name the library is bound under.
pub const LIBRARY_NAME: &str = "numpy";

/// Function table of the numeric library.
pub struct NumericLibrary {
    functions: HashMap<&'static str, LibraryFn>,
}

impl NumericLibrary {
    pub fn new() -> Self {
        let entries: [(&'static str, LibraryFn); 33] = [
            ("array", array),
            ("asarray", array),
            ("sum", sum),
            ("mean", mean),
            ("median", median),
            ("std", std_dev),
            ("var", variance),
            ("min", min),
            ("max", max),
            ("prod", prod),
            ("cumsum", cumsum),
            ("abs", |a| unary_math(a, "abs", f64::abs)),
            ("sqrt", |a| unary_math(a, "sqrt", f64::sqrt)),
            ("exp", |a| unary_math(a, "exp", f64::exp)),
            ("log", |a| unary_math(a, "log", f64::ln)),
            ("log10", |a| unary_math(a, "log10", f64::log10)),
            ("floor", |a| unary_math(a, "floor", f64::floor)),
            ("ceil", |a| unary_math(a, "ceil", f64::ceil)),
            ("round", round),
            ("add", |a| elementwise(a, "add", BinaryOp::Add)),
            ("subtract", |a| elementwise(a, "subtract", BinaryOp::Sub)),
            ("multiply", |a| elementwise(a, "multiply", BinaryOp::Mul)),
            ("divide", |a| elementwise(a, "divide", BinaryOp::Div)),
            ("power", |a| elementwise(a, "power", BinaryOp::Pow)),
            ("argmin", argmin),
            ("argmax", argmax),
            ("sort", sort),
            ("arange", arange),
            ("zeros", |a| filled(a, "zeros", 0.0)),
            ("ones", |a| filled(a, "ones", 1.0)),
            ("dot", dot),
            ("clip", clip),
            ("where", select),
        ];
        NumericLibrary {
            functions: entries.into_iter().collect(),
        }
    }

    /// Resolve an attribute: a function or one of the constants.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "pi" => Some(Value::Number(std::f64::consts::PI)),
            "e" => Some(Value::Number(std::f64::consts::E)),
            "nan" => Some(Value::Number(f64::NAN)),
            "inf" => Some(Value::Number(f64::INFINITY)),
            _ => self
                .functions
                .get_key_value(name)
                .map(|(key, _)| Value::LibraryFn(*key)),
        }
    }

    pub fn call(&self, name: &str, args: &[Value]) -> ScriptResult<Value> {
        let function = self.functions.get(name).ok_or_else(|| ScriptError::Attribute {
            target: LIBRARY_NAME.to_string(),
            name: name.to_string(),
        })?;
        function(args)
    }

    pub fn function_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for NumericLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NumericLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumericLibrary")
            .field("functions", &self.functions.len())
            .finish()
    }
}

fn arity(args: &[Value], name: &str, min: usize, max: usize) -> ScriptResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Err(ScriptError::type_error(format!(
            "{name}() takes {expected} arguments ({} given)",
            args.len()
        )));
    }
    Ok(())
}

/// All numbers of a value, nested lists flattened.
pub fn flatten_numbers(value: &Value, name: &str) -> ScriptResult<Vec<f64>> {
    let mut out = Vec::new();
    collect_numbers(value, name, &mut out)?;
    Ok(out)
}

fn collect_numbers(value: &Value, name: &str, out: &mut Vec<f64>) -> ScriptResult<()> {
    if value.is_sequence() {
        for item in value.items()? {
            collect_numbers(&item, name, out)?;
        }
        Ok(())
    } else {
        out.push(value.expect_number(name)?);
        Ok(())
    }
}

fn reduce_input(args: &[Value], name: &str) -> ScriptResult<Vec<f64>> {
    arity(args, name, 1, 1)?;
    flatten_numbers(&args[0], name)
}

fn array(args: &[Value]) -> ScriptResult<Value> {
    arity(args, "array", 1, 1)?;
    match &args[0] {
        Value::List(_) | Value::Tuple(_) => Ok(Value::list(args[0].items()?)),
        v @ (Value::Number(_) | Value::Bool(_) | Value::Str(_)) => Ok(v.clone()),
        other => Err(ScriptError::type_error(format!(
            "cannot build an array from '{}'",
            other.type_name()
        ))),
    }
}

fn sum(args: &[Value]) -> ScriptResult<Value> {
    Ok(Value::Number(reduce_input(args, "sum")?.iter().sum()))
}

fn prod(args: &[Value]) -> ScriptResult<Value> {
    Ok(Value::Number(reduce_input(args, "prod")?.iter().product()))
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn mean(args: &[Value]) -> ScriptResult<Value> {
    Ok(Value::Number(mean_of(&reduce_input(args, "mean")?)))
}

fn median(args: &[Value]) -> ScriptResult<Value> {
    let mut values = reduce_input(args, "median")?;
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return Ok(Value::Number(f64::NAN));
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    let result = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    Ok(Value::Number(result))
}

/// Population variance, or with `ddof` as the optional second argument.
fn variance_of(args: &[Value], name: &str) -> ScriptResult<f64> {
    arity(args, name, 1, 2)?;
    let values = flatten_numbers(&args[0], name)?;
    let ddof = match args.get(1) {
        Some(v) => v.expect_number(name)?,
        None => 0.0,
    };
    let n = values.len() as f64;
    if n - ddof <= 0.0 {
        return Ok(f64::NAN);
    }
    let m = mean_of(&values);
    Ok(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - ddof))
}

fn variance(args: &[Value]) -> ScriptResult<Value> {
    variance_of(args, "var").map(Value::Number)
}

fn std_dev(args: &[Value]) -> ScriptResult<Value> {
    variance_of(args, "std").map(|v| Value::Number(v.sqrt()))
}

fn extreme(args: &[Value], name: &str, wanted: Ordering) -> ScriptResult<(usize, f64)> {
    let values = reduce_input(args, name)?;
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        // NaN propagates.
        if v.is_nan() {
            return Ok((i, v));
        }
        match best {
            Some((_, b)) if v.partial_cmp(&b) != Some(wanted) => {}
            _ => best = Some((i, v)),
        }
    }
    best.ok_or_else(|| {
        ScriptError::value_error(format!(
            "zero-size array to reduction operation {name} which has no identity"
        ))
    })
}

fn min(args: &[Value]) -> ScriptResult<Value> {
    extreme(args, "min", Ordering::Less).map(|(_, v)| Value::Number(v))
}

fn max(args: &[Value]) -> ScriptResult<Value> {
    extreme(args, "max", Ordering::Greater).map(|(_, v)| Value::Number(v))
}

fn argmin(args: &[Value]) -> ScriptResult<Value> {
    extreme(args, "argmin", Ordering::Less).map(|(i, _)| Value::Number(i as f64))
}

fn argmax(args: &[Value]) -> ScriptResult<Value> {
    extreme(args, "argmax", Ordering::Greater).map(|(i, _)| Value::Number(i as f64))
}

fn cumsum(args: &[Value]) -> ScriptResult<Value> {
    let values = reduce_input(args, "cumsum")?;
    let mut total = 0.0;
    Ok(Value::list(
        values
            .into_iter()
            .map(|v| {
                total += v;
                Value::Number(total)
            })
            .collect(),
    ))
}

fn sort(args: &[Value]) -> ScriptResult<Value> {
    let mut values = reduce_input(args, "sort")?;
    // NaN sorts last.
    values.sort_by(|a, b| match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.total_cmp(b),
    });
    Ok(Value::numbers(&values))
}

fn unary_math(args: &[Value], name: &str, f: fn(f64) -> f64) -> ScriptResult<Value> {
    arity(args, name, 1, 1)?;
    ops::map_elements(&args[0], &|v| Ok(Value::Number(f(v.expect_number(name)?))))
}

/// Round half to even, like the array library does.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if decimals == 0 {
        return value.round_ties_even();
    }
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(decimals);
    let scaled = value * scale;
    if !scaled.is_finite() {
        // Already exact at that many decimals.
        return value;
    }
    if scale == 0.0 {
        return 0.0f64.copysign(value);
    }
    scaled.round_ties_even() / scale
}

fn round(args: &[Value]) -> ScriptResult<Value> {
    arity(args, "round", 1, 2)?;
    let decimals = match args.get(1) {
        Some(d) => d.expect_number("round")? as i32,
        None => 0,
    };
    ops::map_elements(&args[0], &|v| {
        Ok(Value::Number(round_to(v.expect_number("round")?, decimals)))
    })
}

fn elementwise(args: &[Value], name: &str, op: BinaryOp) -> ScriptResult<Value> {
    arity(args, name, 2, 2)?;
    ops::binary_with(op, &args[0], &args[1], ZeroDivision::Ieee)
}

fn arange(args: &[Value]) -> ScriptResult<Value> {
    arity(args, "arange", 1, 3)?;
    let nums = args
        .iter()
        .map(|a| a.expect_number("arange"))
        .collect::<ScriptResult<Vec<_>>>()?;
    let (start, stop, step) = match nums.as_slice() {
        [stop] => (0.0, *stop, 1.0),
        [start, stop] => (*start, *stop, 1.0),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(ScriptError::type_error("arange() takes 1 to 3 arguments")),
    };
    if step == 0.0 {
        return Err(ScriptError::value_error("arange() step must not be zero"));
    }
    let count = ((stop - start) / step).ceil();
    let count = if count.is_nan() || count < 0.0 { 0.0 } else { count };
    if count > MAX_GENERATED_LEN as f64 {
        return Err(ScriptError::value_error("arange() result is too large"));
    }
    let values: Vec<f64> = (0..count as usize)
        .map(|i| start + i as f64 * step)
        .collect();
    Ok(Value::numbers(&values))
}

fn filled(args: &[Value], name: &str, fill: f64) -> ScriptResult<Value> {
    arity(args, name, 1, 1)?;
    let n = args[0].expect_number(name)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(ScriptError::value_error(format!(
            "{name}() size must be a non-negative integer"
        )));
    }
    if n > MAX_GENERATED_LEN as f64 {
        return Err(ScriptError::value_error(format!("{name}() result is too large")));
    }
    Ok(Value::numbers(&vec![fill; n as usize]))
}

fn dot(args: &[Value]) -> ScriptResult<Value> {
    arity(args, "dot", 2, 2)?;
    let product = ops::binary_with(BinaryOp::Mul, &args[0], &args[1], ZeroDivision::Ieee)?;
    if product.is_sequence() {
        sum(&[product])
    } else {
        Ok(product)
    }
}

fn clip(args: &[Value]) -> ScriptResult<Value> {
    arity(args, "clip", 3, 3)?;
    let lo = args[1].expect_number("clip")?;
    let hi = args[2].expect_number("clip")?;
    ops::map_elements(&args[0], &|v| {
        Ok(Value::Number(v.expect_number("clip")?.max(lo).min(hi)))
    })
}

/// `where(cond, x, y)`: pick from `x` where `cond` holds, else from `y`.
fn select(args: &[Value]) -> ScriptResult<Value> {
    arity(args, "where", 3, 3)?;
    let (cond, then, otherwise) = (&args[0], &args[1], &args[2]);
    if !cond.is_sequence() {
        return Ok(if cond.is_truthy() {
            then.clone()
        } else {
            otherwise.clone()
        });
    }
    let conditions = cond.items()?;
    let spread = |branch: &Value| -> ScriptResult<Option<Vec<Value>>> {
        if !branch.is_sequence() {
            return Ok(None);
        }
        let items = branch.items()?;
        if items.len() != conditions.len() {
            return Err(ScriptError::value_error(format!(
                "operands could not be broadcast together with lengths {} and {}",
                conditions.len(),
                items.len()
            )));
        }
        Ok(Some(items))
    };
    let (then_items, otherwise_items) = (spread(then)?, spread(otherwise)?);
    let pick = |branch: &Value, items: &Option<Vec<Value>>, i: usize| match items {
        Some(items) => items[i].clone(),
        None => branch.clone(),
    };
    Ok(Value::list(
        conditions
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if c.is_truthy() {
                    pick(then, &then_items, i)
                } else {
                    pick(otherwise, &otherwise_items, i)
                }
            })
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> ScriptResult<Value> {
        NumericLibrary::new().call(name, args)
    }

    fn number(value: ScriptResult<Value>) -> f64 {
        value.unwrap().as_number().unwrap()
    }

    #[test]
    fn test_reductions() {
        let xs = Value::numbers(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(number(call("sum", &[xs.clone()])), 10.0);
        assert_eq!(number(call("mean", &[xs.clone()])), 2.5);
        assert_eq!(number(call("median", &[xs.clone()])), 2.5);
        assert_eq!(number(call("prod", &[xs.clone()])), 24.0);
        assert_eq!(number(call("var", &[xs.clone()])), 1.25);
        assert_eq!(number(call("argmax", &[xs])), 3.0);
    }

    #[test]
    fn test_std_with_ddof() {
        let xs = Value::numbers(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(number(call("std", &[xs.clone()])), 2.0);
        let sample = number(call("std", &[xs, Value::Number(1.0)]));
        assert!((sample - 2.138_089_935).abs() < 1e-6);
    }

    #[test]
    fn test_min_of_empty_fails() {
        let err = call("min", &[Value::list(vec![])]).unwrap_err();
        assert!(matches!(err, ScriptError::Value { .. }));
    }

    #[test]
    fn test_mean_of_empty_is_nan() {
        assert!(number(call("mean", &[Value::list(vec![])])).is_nan());
    }

    #[test]
    fn test_round_half_even() {
        let result = call("round", &[Value::numbers(&[0.5, 1.5, 2.5])]).unwrap();
        assert!(result.equals(&Value::numbers(&[0.0, 2.0, 2.0])));
        assert_eq!(round_to(1.2345, 2), 1.23);
    }

    #[test]
    fn test_round_beyond_float_precision_keeps_value() {
        let result = call("round", &[Value::Number(1.5), Value::Number(400.0)]);
        assert_eq!(number(result), 1.5);
        assert_eq!(round_to(1e300, 20), 1e300);
        assert_eq!(round_to(0.0, 400), 0.0);
        assert_eq!(round_to(123.0, -400), 0.0);
        assert!(round_to(f64::NAN, 3).is_nan());
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_arange() {
        let result = call("arange", &[Value::Number(1.0), Value::Number(2.0), Value::Number(0.5)])
            .unwrap();
        assert!(result.equals(&Value::numbers(&[1.0, 1.5])));
        assert!(call("arange", &[Value::Number(1.0), Value::Number(1.0), Value::Number(0.0)])
            .is_err());
    }

    #[test]
    fn test_divide_is_ieee() {
        assert!(number(call("divide", &[Value::Number(1.0), Value::Number(0.0)])).is_infinite());
    }

    #[test]
    fn test_where_picks_elementwise() {
        let cond = Value::list(vec![Value::Bool(true), Value::Bool(false)]);
        let result = call(
            "where",
            &[cond, Value::numbers(&[1.0, 2.0]), Value::Number(0.0)],
        )
        .unwrap();
        assert!(result.equals(&Value::numbers(&[1.0, 0.0])));
    }

    #[test]
    fn test_where_rejects_mismatched_branch() {
        let cond = Value::list(vec![Value::Bool(true), Value::Bool(true)]);
        let err = call(
            "where",
            &[cond, Value::numbers(&[1.0, 2.0]), Value::numbers(&[0.0])],
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::Value { .. }));
    }

    #[test]
    fn test_dot_and_clip() {
        let a = Value::numbers(&[1.0, 2.0]);
        let b = Value::numbers(&[3.0, 4.0]);
        assert_eq!(number(call("dot", &[a, b])), 11.0);
        let clipped = call(
            "clip",
            &[Value::numbers(&[-1.0, 5.0]), Value::Number(0.0), Value::Number(3.0)],
        )
        .unwrap();
        assert!(clipped.equals(&Value::numbers(&[0.0, 3.0])));
    }

    #[test]
    fn test_strings_are_rejected() {
        let err = call("sum", &[Value::strings(&["a".to_string()])]).unwrap_err();
        assert!(matches!(err, ScriptError::Type { .. }));
    }

    #[test]
    fn test_attribute_constants_and_unknown() {
        let lib = NumericLibrary::new();
        assert!(lib.attribute("pi").is_some());
        assert!(matches!(lib.attribute("sum"), Some(Value::LibraryFn("sum"))));
        assert!(lib.attribute("fft").is_none());
        assert_eq!(lib.function_names().len(), 33);
    }
}
