//! Functions bound in the global frame before a program starts.
//!
//! Each builtin checks its own arguments. The statistics helpers accept a
//! single array of numbers; `min` and `max` also take two or more numbers
//! directly.

use std::collections::{hash_map::Entry, HashMap};

use unicode_segmentation::UnicodeSegmentation;

use crate::{
    ast::BinaryOperator,
    common::Error,
    interpreter::Interpreter,
    ops,
    value::{NativeFunction, Value},
};

type Builtin = fn(&mut Interpreter, Vec<Value>) -> Result<Value, Error>;

const BUILTINS: &[(&str, Builtin)] = &[
    ("sqrt", sqrt),
    ("pow", pow),
    ("abs", abs),
    ("floor", floor),
    ("ceil", ceil),
    ("round", round),
    ("sum", sum),
    ("mean", mean),
    ("median", median),
    ("mode", mode),
    ("stdev", stdev),
    ("variance", variance),
    ("min", min),
    ("max", max),
    ("len", len),
    ("print", print),
    ("range", range),
];

const ALIASES: &[(&str, &str)] = &[("μ", "mean"), ("σ", "stdev"), ("Σ", "sum")];

/// Every builtin paired with the name it is bound under, aliases included.
pub fn all() -> Vec<(&'static str, NativeFunction)> {
    let mut bindings: Vec<_> = BUILTINS
        .iter()
        .map(|&(name, func)| (name, NativeFunction::new(name, func)))
        .collect();

    for &(alias, target) in ALIASES {
        if let Some(&(name, func)) = BUILTINS.iter().find(|(name, _)| *name == target) {
            bindings.push((alias, NativeFunction::new(name, func)));
        }
    }

    bindings
}

fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<(), Error> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(Error::type_error(format!(
            "{}() takes exactly {} argument{} ({} given)",
            name,
            expected,
            if expected == 1 { "" } else { "s" },
            args.len()
        )))
    }
}

fn expect_number(name: &str, value: &Value) -> Result<f64, Error> {
    value.as_f64().ok_or_else(|| {
        Error::type_error(format!(
            "{}() expects a number, found '{}'",
            name,
            value.type_name()
        ))
    })
}

fn expect_array<'a>(name: &str, args: &'a [Value]) -> Result<&'a [Value], Error> {
    expect_arity(name, args, 1)?;
    match &args[0] {
        Value::Array(values) => Ok(values),
        other => Err(Error::type_error(format!(
            "{}() expects an array, found '{}'",
            name,
            other.type_name()
        ))),
    }
}

fn expect_numbers(name: &str, args: &[Value]) -> Result<Vec<f64>, Error> {
    expect_array(name, args)?
        .iter()
        .map(|value| expect_number(name, value))
        .collect()
}

fn float_to_int(name: &str, number: f64) -> Result<Value, Error> {
    if number.is_finite() && number >= i64::MIN as f64 && number < i64::MAX as f64 {
        Ok(Value::Int(number as i64))
    } else {
        Err(Error::value(format!(
            "{}() cannot convert {} to an integer",
            name,
            crate::value::format_float(number)
        )))
    }
}

fn count(len: usize) -> Value {
    Value::Int(i64::try_from(len).unwrap_or(i64::MAX))
}

fn sqrt(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    expect_arity("sqrt", &args, 1)?;
    let number = expect_number("sqrt", &args[0])?;
    if number < 0.0 {
        return Err(Error::value("math domain error in sqrt()"));
    }
    Ok(Value::Float(number.sqrt()))
}

fn pow(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    expect_arity("pow", &args, 2)?;
    ops::binary(BinaryOperator::Pow, &args[0], &args[1])
}

fn abs(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    expect_arity("abs", &args, 1)?;
    match &args[0] {
        Value::Int(number) => number
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| Error::value("integer overflow in abs()")),
        Value::Float(number) => Ok(Value::Float(number.abs())),
        other => Err(Error::type_error(format!(
            "abs() expects a number, found '{}'",
            other.type_name()
        ))),
    }
}

fn rounding(name: &str, args: &[Value], round: fn(f64) -> f64) -> Result<Value, Error> {
    expect_arity(name, args, 1)?;
    match &args[0] {
        Value::Int(number) => Ok(Value::Int(*number)),
        other => float_to_int(name, round(expect_number(name, other)?)),
    }
}

fn floor(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    rounding("floor", &args, f64::floor)
}

fn ceil(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    rounding("ceil", &args, f64::ceil)
}

/// Halfway cases go to the even neighbour.
fn round(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    rounding("round", &args, f64::round_ties_even)
}

fn sum(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    let values = expect_array("sum", &args)?;

    let mut total = Value::Int(0);
    for value in values {
        expect_number("sum", value)?;
        total = ops::binary(BinaryOperator::Add, &total, value)?;
    }
    Ok(total)
}

fn mean_of(numbers: &[f64]) -> f64 {
    numbers.iter().sum::<f64>() / numbers.len() as f64
}

fn mean(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    let numbers = expect_numbers("mean", &args)?;
    if numbers.is_empty() {
        return Err(Error::value("mean() requires at least one data point"));
    }
    Ok(Value::Float(mean_of(&numbers)))
}

fn median(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    let values = expect_array("median", &args)?;
    if values.is_empty() {
        return Err(Error::value("median() requires at least one data point"));
    }

    let mut sorted = values
        .iter()
        .map(|value| expect_number("median", value).map(|number| (number, value)))
        .collect::<Result<Vec<_>, _>>()?;
    sorted.sort_by(|(a, _), (b, _)| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Ok(sorted[mid].1.clone())
    } else {
        Ok(Value::Float((sorted[mid - 1].0 + sorted[mid].0) / 2.0))
    }
}

/// Hashable stand-in for the values `==` can match without a deep walk.
/// Integral floats share a bucket with the equal Int.
#[derive(PartialEq, Eq, Hash)]
enum Bucket<'a> {
    None,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(&'a str),
}

impl<'a> Bucket<'a> {
    fn of(value: &'a Value) -> Option<Self> {
        match value {
            Value::None => Some(Bucket::None),
            Value::Bool(b) => Some(Bucket::Bool(*b)),
            Value::Int(n) => Some(Bucket::Int(*n)),
            Value::Str(s) => Some(Bucket::Str(s)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
                Some(Bucket::Int(*f as i64))
            }
            Value::Float(f) => Some(Bucket::Float(f.to_bits())),
            Value::Array(_) | Value::Function(_) | Value::Native(_) => None,
        }
    }
}

fn mode(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    let values = expect_array("mode", &args)?;
    if values.is_empty() {
        return Err(Error::value("mode() requires at least one data point"));
    }

    // counts stay in first-seen order
    let mut counts: Vec<(&Value, usize)> = Vec::new();
    let mut buckets: HashMap<Bucket, usize> = HashMap::new();
    let mut unhashed: Vec<usize> = Vec::new();
    for value in values {
        let seen = match Bucket::of(value) {
            Some(bucket) => match buckets.entry(bucket) {
                Entry::Occupied(slot) => Some(*slot.get()),
                Entry::Vacant(slot) => {
                    slot.insert(counts.len());
                    None
                }
            },
            // NaN equals nothing, not even another NaN
            None if matches!(value, Value::Float(_)) => None,
            None => {
                let found = unhashed.iter().copied().find(|&i| counts[i].0 == value);
                if found.is_none() {
                    unhashed.push(counts.len());
                }
                found
            }
        };
        match seen {
            Some(i) => counts[i].1 += 1,
            None => counts.push((value, 1)),
        }
    }

    let highest = counts.iter().map(|&(_, n)| n).max().unwrap_or(0);
    let mut winners = counts.iter().filter(|&&(_, n)| n == highest);
    match (winners.next(), winners.count()) {
        (Some(&(value, _)), 0) => Ok(value.clone()),
        (_, others) => Err(Error::aggregation(format!(
            "no unique mode; found {} equally common values",
            others + 1
        ))),
    }
}

/// Sample variance; fewer than two points give 0.
fn sample_variance(name: &str, args: &[Value]) -> Result<Option<f64>, Error> {
    let numbers = expect_numbers(name, args)?;
    if numbers.len() < 2 {
        return Ok(None);
    }

    let mean = mean_of(&numbers);
    let squares: f64 = numbers.iter().map(|x| (x - mean) * (x - mean)).sum();
    Ok(Some(squares / (numbers.len() - 1) as f64))
}

fn variance(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    Ok(sample_variance("variance", &args)?.map_or(Value::Int(0), Value::Float))
}

fn stdev(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    Ok(sample_variance("stdev", &args)?.map_or(Value::Int(0), |v| Value::Float(v.sqrt())))
}

fn extreme(name: &str, args: &[Value], op: BinaryOperator) -> Result<Value, Error> {
    let candidates = match args {
        [] => return Err(Error::type_error(format!("{}() expects at least 1 argument (0 given)", name))),
        [Value::Array(values)] => values.as_slice(),
        [other] => {
            return Err(Error::type_error(format!(
                "{}() expects an array or several values, found '{}'",
                name,
                other.type_name()
            )))
        }
        several => several,
    };

    let mut iter = candidates.iter();
    let mut best = iter
        .next()
        .ok_or_else(|| Error::value(format!("{}() arg is an empty sequence", name)))?;
    for candidate in iter {
        if ops::binary(op, candidate, best)?.is_truthy() {
            best = candidate;
        }
    }
    Ok(best.clone())
}

fn min(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    extreme("min", &args, BinaryOperator::Lt)
}

fn max(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    extreme("max", &args, BinaryOperator::Gt)
}

fn len(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    expect_arity("len", &args, 1)?;
    match &args[0] {
        Value::Array(values) => Ok(count(values.len())),
        Value::Str(string) => Ok(count(string.graphemes(true).count())),
        other => Err(Error::type_error(format!(
            "object of type '{}' has no len()",
            other.type_name()
        ))),
    }
}

fn print(interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    let line = args
        .iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    interpreter.write_line(&line)?;
    Ok(Value::None)
}

fn range(_: &mut Interpreter, args: Vec<Value>) -> Result<Value, Error> {
    let (start, end) = match args.as_slice() {
        [Value::Int(end)] => (0, *end),
        [Value::Int(start), Value::Int(end)] => (*start, *end),
        [_] | [_, _] => {
            return Err(Error::type_error(format!(
                "range() expects integers, found {}",
                args.iter()
                    .map(|arg| format!("'{}'", arg.type_name()))
                    .collect::<Vec<_>>()
                    .join(" and ")
            )))
        }
        _ => {
            return Err(Error::type_error(format!(
                "range() takes 1 or 2 arguments ({} given)",
                args.len()
            )))
        }
    };

    Ok(Value::Array((start..end).map(Value::Int).collect()))
}
