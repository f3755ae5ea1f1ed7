//! The transform registry: a process-wide, read-only name-to-function table.
//!
//! Per spec §4.2, each entry is a pure function of one argument mapping that
//! operates on already-resolved values and returns a single value or fails.
//! Unknown function names fail at node construction (a [`DagError::Declaration`]),
//! not at evaluation time.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::{Map, Value};

use crate::error::DagError;

/// Signature every registered transform function implements.
pub type TransformFn = fn(&Map<String, Value>) -> Result<Value, DagError>;

/// Look up a transform by name. Fails with [`DagError::Declaration`] — the
/// spec places "unknown transform function" in the declaration-error family,
/// raised at node construction — if no such function is registered.
pub fn lookup(name: &str) -> Result<TransformFn, DagError> {
    REGISTRY
        .get(name)
        .copied()
        .ok_or_else(|| DagError::Declaration(format!("unknown transform function '{name}'")))
}

static REGISTRY: LazyLock<HashMap<&'static str, TransformFn>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, TransformFn> = HashMap::new();
    m.insert("add", add);
    m.insert("sub", sub);
    m.insert("mult", mult);
    m.insert("div", div);
    m.insert("addFactor", add_factor);
    m.insert("subFactor", sub_factor);
    m.insert("round", round);
    m.insert("ceil", ceil);
    m.insert("floor", floor);
    m.insert("min", min);
    m.insert("max", max);
    m.insert("clamp", clamp);
    m.insert("roundCurrency", round_currency);
    m.insert("gt", gt);
    m.insert("lt", lt);
    m.insert("gte", gte);
    m.insert("lte", lte);
    m.insert("eq", eq);
    m.insert("not", not);
    m.insert("andN", and_n);
    m.insert("orN", or_n);
    m.insert("addN", add_n);
    m.insert("concat", concat);
    m.insert("concatArrays", concat_arrays);
    m.insert("filter", filter);
    m.insert("filterNot", filter_not);
    m.insert("find", find);
    m.insert("map", map);
    m.insert("vectorOp", vector_op);
    m.insert("pick", pick);
    m.insert("omit", omit);
    m.insert("merge", merge);
    m.insert("box", box_value);
    m.insert("addProp", add_prop);
    m.insert("isNonEmptyString", is_non_empty_string);
    m.insert("isNull", is_null);
    m.insert("ternary", ternary);
    m.insert("includes", includes);
    m
});

fn transform_err(msg: impl Into<String>) -> DagError {
    DagError::Transform(msg.into())
}

fn arg<'a>(params: &'a Map<String, Value>, name: &str) -> Result<&'a Value, DagError> {
    params
        .get(name)
        .ok_or_else(|| transform_err(format!("missing argument '{name}'")))
}

fn as_f64(v: &Value, name: &str) -> Result<f64, DagError> {
    v.as_f64()
        .ok_or_else(|| transform_err(format!("argument '{name}' is not a number")))
}

fn as_array<'a>(v: &'a Value, name: &str) -> Result<&'a Vec<Value>, DagError> {
    v.as_array()
        .ok_or_else(|| transform_err(format!("argument '{name}' is not an array")))
}

fn num(f: f64) -> Result<Value, DagError> {
    crate::value::finite_number(f).ok_or_else(|| transform_err("result is not a finite number"))
}

// ---------------------------------------------------------------------------
// Arithmetic — all take {amt, factor} unless noted.
// ---------------------------------------------------------------------------

fn add(params: &Map<String, Value>) -> Result<Value, DagError> {
    num(as_f64(arg(params, "amt")?, "amt")? + as_f64(arg(params, "factor")?, "factor")?)
}

fn sub(params: &Map<String, Value>) -> Result<Value, DagError> {
    num(as_f64(arg(params, "amt")?, "amt")? - as_f64(arg(params, "factor")?, "factor")?)
}

fn mult(params: &Map<String, Value>) -> Result<Value, DagError> {
    num(as_f64(arg(params, "amt")?, "amt")? * as_f64(arg(params, "factor")?, "factor")?)
}

fn div(params: &Map<String, Value>) -> Result<Value, DagError> {
    num(as_f64(arg(params, "amt")?, "amt")? / as_f64(arg(params, "factor")?, "factor")?)
}

fn add_factor(params: &Map<String, Value>) -> Result<Value, DagError> {
    let amt = as_f64(arg(params, "amt")?, "amt")?;
    let factor = as_f64(arg(params, "factor")?, "factor")?;
    num(amt + amt * factor)
}

fn sub_factor(params: &Map<String, Value>) -> Result<Value, DagError> {
    let amt = as_f64(arg(params, "amt")?, "amt")?;
    let factor = as_f64(arg(params, "factor")?, "factor")?;
    num(amt - amt * factor)
}

fn round(params: &Map<String, Value>) -> Result<Value, DagError> {
    num(as_f64(arg(params, "amt")?, "amt")?.round())
}

fn ceil(params: &Map<String, Value>) -> Result<Value, DagError> {
    num(as_f64(arg(params, "amt")?, "amt")?.ceil())
}

fn floor(params: &Map<String, Value>) -> Result<Value, DagError> {
    num(as_f64(arg(params, "amt")?, "amt")?.floor())
}

fn min(params: &Map<String, Value>) -> Result<Value, DagError> {
    num(as_f64(arg(params, "amt")?, "amt")?.min(as_f64(arg(params, "factor")?, "factor")?))
}

fn max(params: &Map<String, Value>) -> Result<Value, DagError> {
    num(as_f64(arg(params, "amt")?, "amt")?.max(as_f64(arg(params, "factor")?, "factor")?))
}

fn clamp(params: &Map<String, Value>) -> Result<Value, DagError> {
    let amt = as_f64(arg(params, "amt")?, "amt")?;
    let lo = as_f64(arg(params, "min")?, "min")?;
    let hi = as_f64(arg(params, "max")?, "max")?;
    num(amt.clamp(lo, hi))
}

fn round_currency(params: &Map<String, Value>) -> Result<Value, DagError> {
    num((as_f64(arg(params, "amt")?, "amt")? * 100.0).round() / 100.0)
}

// ---------------------------------------------------------------------------
// Comparison / boolean
// ---------------------------------------------------------------------------

fn gt(params: &Map<String, Value>) -> Result<Value, DagError> {
    Ok(Value::Bool(
        as_f64(arg(params, "amt")?, "amt")? > as_f64(arg(params, "factor")?, "factor")?,
    ))
}

fn lt(params: &Map<String, Value>) -> Result<Value, DagError> {
    Ok(Value::Bool(
        as_f64(arg(params, "amt")?, "amt")? < as_f64(arg(params, "factor")?, "factor")?,
    ))
}

fn gte(params: &Map<String, Value>) -> Result<Value, DagError> {
    Ok(Value::Bool(
        as_f64(arg(params, "amt")?, "amt")? >= as_f64(arg(params, "factor")?, "factor")?,
    ))
}

fn lte(params: &Map<String, Value>) -> Result<Value, DagError> {
    Ok(Value::Bool(
        as_f64(arg(params, "amt")?, "amt")? <= as_f64(arg(params, "factor")?, "factor")?,
    ))
}

fn eq(params: &Map<String, Value>) -> Result<Value, DagError> {
    Ok(Value::Bool(arg(params, "amt")? == arg(params, "factor")?))
}

fn not(params: &Map<String, Value>) -> Result<Value, DagError> {
    let v = arg(params, "value")?;
    Ok(Value::Bool(!v.as_bool().unwrap_or(!v.is_null())))
}

fn and_n(params: &Map<String, Value>) -> Result<Value, DagError> {
    Ok(Value::Bool(params.values().all(truthy)))
}

fn or_n(params: &Map<String, Value>) -> Result<Value, DagError> {
    Ok(Value::Bool(params.values().any(truthy)))
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Reduction
//
// These fold over every resolved param value in declaration order rather
// than a single named array argument: the typical calling shape for a
// reduction is a `pathDef` given as a bare sequence of paths (spec §3's
// "sequence of path strings, key = path"), e.g.
// `params: ['staticNode', 'inputs.stringValue']` for `concat` — there is no
// natural single key to hang an array argument off of in that shape, so
// the resolved map's *values*, in the pathDef's declared order, are the
// operands. `serde_json`'s `preserve_order` feature is what makes that
// order well-defined.
// ---------------------------------------------------------------------------

fn add_n(params: &Map<String, Value>) -> Result<Value, DagError> {
    let mut total = 0.0;
    for v in params.values() {
        total += as_f64(v, "params[]")?;
    }
    num(total)
}

fn concat(params: &Map<String, Value>) -> Result<Value, DagError> {
    let mut out = String::new();
    for v in params.values() {
        match v {
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
    }
    Ok(Value::String(out))
}

fn concat_arrays(params: &Map<String, Value>) -> Result<Value, DagError> {
    let mut out = Vec::new();
    for a in params.values() {
        out.extend(as_array(a, "params[]")?.clone());
    }
    Ok(Value::Array(out))
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

fn predicate_fn(params: &Map<String, Value>) -> Result<TransformFn, DagError> {
    let name = arg(params, "predicate")?
        .as_str()
        .ok_or_else(|| transform_err("'predicate' must be a function name"))?;
    lookup(name)
}

fn filter(params: &Map<String, Value>) -> Result<Value, DagError> {
    let items = as_array(arg(params, "items")?, "items")?;
    let pred = predicate_fn(params)?;
    let mut out = Vec::new();
    for item in items {
        let mut args = Map::new();
        args.insert("value".to_string(), item.clone());
        if truthy(&pred(&args)?) {
            out.push(item.clone());
        }
    }
    Ok(Value::Array(out))
}

fn filter_not(params: &Map<String, Value>) -> Result<Value, DagError> {
    let Value::Array(kept) = filter(params)? else {
        unreachable!("filter always returns an array")
    };
    let items = as_array(arg(params, "items")?, "items")?;
    Ok(Value::Array(
        items.iter().filter(|i| !kept.contains(i)).cloned().collect(),
    ))
}

fn find(params: &Map<String, Value>) -> Result<Value, DagError> {
    let items = as_array(arg(params, "items")?, "items")?;
    let pred = predicate_fn(params)?;
    for item in items {
        let mut args = Map::new();
        args.insert("value".to_string(), item.clone());
        if truthy(&pred(&args)?) {
            return Ok(item.clone());
        }
    }
    Ok(Value::Null)
}

fn map(params: &Map<String, Value>) -> Result<Value, DagError> {
    let items = as_array(arg(params, "items")?, "items")?;
    let name = arg(params, "fn")?
        .as_str()
        .ok_or_else(|| transform_err("'fn' must be a function name"))?;
    let f = lookup(name)?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let mut args = Map::new();
        args.insert("value".to_string(), item.clone());
        out.push(f(&args)?);
    }
    Ok(Value::Array(out))
}

/// `vectorOp` requires two equal-length sequences and a named inner op;
/// fails otherwise (per spec §4.2).
fn vector_op(params: &Map<String, Value>) -> Result<Value, DagError> {
    let a = as_array(arg(params, "a")?, "a")?;
    let b = as_array(arg(params, "b")?, "b")?;
    if a.len() != b.len() {
        return Err(transform_err(format!(
            "vectorOp: mismatched lengths ({} vs {})",
            a.len(),
            b.len()
        )));
    }
    let name = arg(params, "op")?
        .as_str()
        .ok_or_else(|| transform_err("'op' must be a function name"))?;
    let f = lookup(name)?;
    let mut out = Vec::with_capacity(a.len());
    for (av, bv) in a.iter().zip(b.iter()) {
        let mut args = Map::new();
        args.insert("amt".to_string(), av.clone());
        args.insert("factor".to_string(), bv.clone());
        out.push(f(&args)?);
    }
    Ok(Value::Array(out))
}

fn pick(params: &Map<String, Value>) -> Result<Value, DagError> {
    let obj = arg(params, "object")?
        .as_object()
        .ok_or_else(|| transform_err("'object' must be a mapping"))?;
    let keys = as_array(arg(params, "keys")?, "keys")?;
    let mut out = Map::new();
    for k in keys {
        if let Some(key) = k.as_str() {
            if let Some(v) = obj.get(key) {
                out.insert(key.to_string(), v.clone());
            }
        }
    }
    Ok(Value::Object(out))
}

fn omit(params: &Map<String, Value>) -> Result<Value, DagError> {
    let obj = arg(params, "object")?
        .as_object()
        .ok_or_else(|| transform_err("'object' must be a mapping"))?;
    let keys: Vec<&str> = as_array(arg(params, "keys")?, "keys")?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    let out: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok(Value::Object(out))
}

fn merge(params: &Map<String, Value>) -> Result<Value, DagError> {
    let objects = as_array(arg(params, "objects")?, "objects")?;
    let mut out = Map::new();
    for o in objects {
        let obj = o
            .as_object()
            .ok_or_else(|| transform_err("'objects[]' must be a mapping"))?;
        for (k, v) in obj {
            out.insert(k.clone(), v.clone());
        }
    }
    Ok(Value::Object(out))
}

fn box_value(params: &Map<String, Value>) -> Result<Value, DagError> {
    Ok(arg(params, "value")?.clone())
}

fn add_prop(params: &Map<String, Value>) -> Result<Value, DagError> {
    let mut obj = arg(params, "object")?
        .as_object()
        .ok_or_else(|| transform_err("'object' must be a mapping"))?
        .clone();
    let key = arg(params, "key")?
        .as_str()
        .ok_or_else(|| transform_err("'key' must be a string"))?;
    obj.insert(key.to_string(), arg(params, "value")?.clone());
    Ok(Value::Object(obj))
}

// ---------------------------------------------------------------------------
// Sentinel
// ---------------------------------------------------------------------------

fn is_non_empty_string(params: &Map<String, Value>) -> Result<Value, DagError> {
    Ok(Value::Bool(matches!(
        arg(params, "value")?,
        Value::String(s) if !s.is_empty()
    )))
}

fn is_null(params: &Map<String, Value>) -> Result<Value, DagError> {
    Ok(Value::Bool(arg(params, "value")?.is_null()))
}

fn ternary(params: &Map<String, Value>) -> Result<Value, DagError> {
    if truthy(arg(params, "test")?) {
        Ok(arg(params, "ifTrue")?.clone())
    } else {
        Ok(arg(params, "ifFalse")?.clone())
    }
}

fn includes(params: &Map<String, Value>) -> Result<Value, DagError> {
    let items = as_array(arg(params, "items")?, "items")?;
    let needle = arg(params, "value")?;
    Ok(Value::Bool(items.contains(needle)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, params: Value) -> Value {
        let f = lookup(name).unwrap();
        let Value::Object(map) = params else {
            panic!("params must be an object")
        };
        f(&map).unwrap()
    }

    #[test]
    fn unknown_function_fails() {
        assert!(lookup("nope").is_err());
    }

    #[test]
    fn mult_example() {
        assert_eq!(call("mult", json!({"amt": 4, "factor": 3})), json!(12.0));
    }

    #[test]
    fn concat_example() {
        // pathDef-array shape: resolved param map is keyed by path text,
        // concat folds over the values in declared order.
        assert_eq!(
            call("concat", json!({"staticNode": "hello, ", "inputs.stringValue": "world"})),
            json!("hello, world")
        );
    }

    #[test]
    fn vector_op_length_mismatch_fails() {
        let mut params = Map::new();
        params.insert("a".into(), json!([1, 2]));
        params.insert("b".into(), json!([1]));
        params.insert("op".into(), json!("add"));
        assert!(vector_op(&params).is_err());
    }

    #[test]
    fn ternary_picks_branch() {
        assert_eq!(
            call("ternary", json!({"test": true, "ifTrue": 1, "ifFalse": 2})),
            json!(1)
        );
    }

    #[test]
    fn div_by_zero_is_absent_not_a_panic() {
        let mut params = Map::new();
        params.insert("amt".into(), json!(1));
        params.insert("factor".into(), json!(0));
        assert!(div(&params).is_err());
    }
}
