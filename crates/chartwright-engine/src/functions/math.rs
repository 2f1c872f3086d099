//! Arithmetic, rounding, conversion and integer sequences
//!
//! Integer inputs give integer results whenever the exact result is whole;
//! any float input (or a fractional quotient) gives a float. The `*f`
//! variants always yield floats. Integer division wraps like Go's, so
//! `div` of the minimum int64 by -1 is the minimum again.

use rand::Rng;

use super::{FuncError, FuncResult, Registry, arg_int, arg_str};
use crate::value::Value;

pub(super) fn register(r: &mut Registry) {
    r.variadic("add", 0, add);
    r.fixed("add1", 1, |a| add(&[a[0].clone(), Value::Int(1)]));
    r.fixed("sub", 2, sub);
    r.variadic("mul", 1, mul);
    r.fixed("div", 2, div);
    r.fixed("mod", 2, modulo);
    r.variadic("max", 1, |a| Ok(extreme(a, true)));
    r.variadic("biggest", 1, |a| Ok(extreme(a, true)));
    r.variadic("min", 1, |a| Ok(extreme(a, false)));

    r.variadic("addf", 0, |a| Ok(Value::Float(floats(a).sum())));
    r.fixed("add1f", 1, |a| Ok(Value::Float(a[0].to_f64() + 1.0)));
    r.variadic("subf", 1, |a| {
        let rest = floats(&a[1..]);
        Ok(Value::Float(rest.fold(a[0].to_f64(), |acc, x| acc - x)))
    });
    r.variadic("mulf", 1, |a| Ok(Value::Float(floats(a).product())));
    r.variadic("divf", 1, divf);
    r.variadic("maxf", 1, |a| {
        Ok(Value::Float(floats(a).fold(f64::NEG_INFINITY, f64::max)))
    });
    r.variadic("minf", 1, |a| {
        Ok(Value::Float(floats(a).fold(f64::INFINITY, f64::min)))
    });

    r.fixed("ceil", 1, |a| Ok(Value::Float(a[0].to_f64().ceil())));
    r.fixed("floor", 1, |a| Ok(Value::Float(a[0].to_f64().floor())));
    r.variadic("round", 2, round);

    r.fixed("int", 1, |a| Ok(Value::Int(a[0].to_i64())));
    r.fixed("int64", 1, |a| Ok(Value::Int(a[0].to_i64())));
    r.fixed("float64", 1, |a| Ok(Value::Float(a[0].to_f64())));
    r.fixed("atoi", 1, |a| Ok(Value::Int(arg_str(a, 0)?.parse().unwrap_or(0))));
    r.fixed("toDecimal", 1, |a| {
        let text = a[0].to_display_string();
        Ok(Value::Int(i64::from_str_radix(&text, 8).unwrap_or(0)))
    });

    r.variadic("seq", 0, seq);
    r.fixed("until", 1, |a| {
        let count = arg_int(a, 0)?;
        let step = if count < 0 { -1 } else { 1 };
        Ok(int_list(until_step(0, count.into(), step)?))
    });
    r.fixed("untilStep", 3, |a| {
        let (start, stop, step) = (arg_int(a, 0)?, arg_int(a, 1)?, arg_int(a, 2)?);
        Ok(int_list(until_step(start.into(), stop.into(), step.into())?))
    });
    r.fixed("randInt", 2, |a| {
        let (min, max) = (a[0].to_i64(), a[1].to_i64());
        if max <= min {
            return Err(FuncError::new("invalid argument to Intn"));
        }
        Ok(Value::Int(rand::rng().random_range(min..max)))
    });
}

fn floats(values: &[Value]) -> impl Iterator<Item = f64> + '_ {
    values.iter().map(Value::to_f64)
}

fn all_integral(values: &[Value]) -> bool {
    values.iter().all(Value::is_integral)
}

fn add(a: &[Value]) -> FuncResult {
    if all_integral(a) {
        let sum = a.iter().try_fold(0i64, |acc, v| acc.checked_add(v.to_i64()));
        if let Some(sum) = sum {
            return Ok(Value::Int(sum));
        }
    }
    Ok(Value::Float(floats(a).sum()))
}

fn sub(a: &[Value]) -> FuncResult {
    if all_integral(a)
        && let Some(diff) = a[0].to_i64().checked_sub(a[1].to_i64())
    {
        return Ok(Value::Int(diff));
    }
    Ok(Value::Float(a[0].to_f64() - a[1].to_f64()))
}

fn mul(a: &[Value]) -> FuncResult {
    if all_integral(a) {
        let product = a.iter().try_fold(1i64, |acc, v| acc.checked_mul(v.to_i64()));
        if let Some(product) = product {
            return Ok(Value::Int(product));
        }
    }
    Ok(Value::Float(floats(a).product()))
}

fn div(a: &[Value]) -> FuncResult {
    if all_integral(a) {
        let (x, y) = (a[0].to_i64(), a[1].to_i64());
        if y == 0 {
            return Err(FuncError::new("runtime error: integer divide by zero"));
        }
        if x.wrapping_rem(y) == 0 {
            return Ok(Value::Int(x.wrapping_div(y)));
        }
        return Ok(Value::Float(x as f64 / y as f64));
    }
    Ok(Value::Float(a[0].to_f64() / a[1].to_f64()))
}

fn modulo(a: &[Value]) -> FuncResult {
    if all_integral(a) {
        let (x, y) = (a[0].to_i64(), a[1].to_i64());
        if y == 0 {
            return Err(FuncError::new("runtime error: integer divide by zero"));
        }
        return Ok(Value::Int(x.wrapping_rem(y)));
    }
    Ok(Value::Float(a[0].to_f64() % a[1].to_f64()))
}

fn extreme(a: &[Value], biggest: bool) -> Value {
    if all_integral(a) {
        let ints = a.iter().map(Value::to_i64);
        let pick = if biggest { ints.max() } else { ints.min() };
        return Value::Int(pick.unwrap_or(0));
    }
    let fold = if biggest { f64::max } else { f64::min };
    let start = a[0].to_f64();
    Value::Float(floats(&a[1..]).fold(start, fold))
}

fn divf(a: &[Value]) -> FuncResult {
    let mut acc = a[0].to_f64();
    for x in floats(&a[1..]) {
        if x == 0.0 {
            return Err(FuncError::new("decimal division by zero"));
        }
        acc /= x;
    }
    Ok(Value::Float(acc))
}

/// Round to `places` decimals; the fraction at which to round up defaults to .5
fn round(a: &[Value]) -> FuncResult {
    if a.len() > 3 {
        return Err(FuncError::new(format!(
            "wrong number of args for round: want 3 got {}",
            a.len()
        )));
    }
    let value = a[0].to_f64();
    let places = arg_int(a, 1)?;
    let round_on = a.get(2).map(Value::to_f64).unwrap_or(0.5);
    let pow = 10f64.powi(places as i32);
    let digit = pow * value;
    let rounded = if digit.fract() >= round_on {
        digit.ceil()
    } else {
        digit.floor()
    };
    Ok(Value::Float(rounded / pow))
}

/// Longest list `until`, `untilStep` and `seq` build
const MAX_SEQUENCE: i128 = 1 << 20;

/// Integers from `start` towards `stop` (exclusive) in increments of `step`
///
/// Bounds are wide so a caller can push an inclusive int64 end one past
/// the last representable value.
fn until_step(start: i128, stop: i128, step: i128) -> Result<Vec<i64>, FuncError> {
    let distance = stop - start;
    if step == 0 || distance == 0 || (distance > 0) != (step > 0) {
        return Ok(Vec::new());
    }
    let count = (distance.abs() + step.abs() - 1) / step.abs();
    if count > MAX_SEQUENCE {
        return Err(FuncError::new(format!(
            "sequence of {} elements exceeds the limit of {}",
            count, MAX_SEQUENCE
        )));
    }
    Ok((0..count)
        .filter_map(|k| i64::try_from(start + k * step).ok())
        .collect())
}

fn int_list(items: Vec<i64>) -> Value {
    Value::from_list(items.into_iter().map(Value::Int).collect())
}

fn seq(a: &[Value]) -> FuncResult {
    let params = (0..a.len())
        .map(|i| arg_int(a, i).map(i128::from))
        .collect::<Result<Vec<_>, _>>()?;
    let items = match params.as_slice() {
        [end] => {
            let step = if *end < 1 { -1 } else { 1 };
            until_step(1, end + step, step)?
        }
        [start, end] => {
            let step = if end < start { -1 } else { 1 };
            until_step(*start, end + step, step)?
        }
        [start, step, end] => {
            let increment = if end < start {
                if *step > 0 {
                    return Ok(Value::from(""));
                }
                -1
            } else {
                1
            };
            until_step(*start, end + increment, *step)?
        }
        _ => Vec::new(),
    };
    let text: Vec<String> = items.iter().map(i64::to_string).collect();
    Ok(Value::from(text.join(" ")))
}
