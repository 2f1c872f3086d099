//! Dictionary and list functions
//!
//! Dictionaries are shared: `set`, `unset` and the merge family edit the map
//! they are given and return it. List functions always build a new list.

use std::cell::RefCell;
use std::rc::Rc;

use super::{FuncError, FuncResult, Registry, arg_int, arg_map, arg_str, soft, strval};
use crate::value::{Map, Value};

pub(super) fn register(r: &mut Registry) {
    r.variadic("list", 0, |a| Ok(Value::from_list(a.to_vec())));
    r.variadic("tuple", 0, |a| Ok(Value::from_list(a.to_vec())));
    r.variadic("dict", 0, dict);
    r.fixed("get", 2, |a| {
        let map = arg_map(a, 0)?;
        let key = arg_str(a, 1)?;
        Ok(map.borrow().get(key).cloned().unwrap_or_else(|| Value::from("")))
    });
    r.fixed("set", 3, |a| {
        let map = arg_map(a, 0)?;
        map.borrow_mut().insert(arg_str(a, 1)?.to_string(), a[2].clone());
        Ok(a[0].clone())
    });
    r.fixed("unset", 2, |a| {
        let map = arg_map(a, 0)?;
        map.borrow_mut().remove(arg_str(a, 1)?);
        Ok(a[0].clone())
    });
    r.fixed("hasKey", 2, |a| Ok(arg_map(a, 0)?.borrow().contains_key(arg_str(a, 1)?).into()));
    r.variadic("pluck", 1, pluck);
    r.variadic("keys", 0, keys);
    r.fixed("values", 1, |a| {
        let values: Vec<Value> = arg_map(a, 0)?.borrow().values().cloned().collect();
        Ok(Value::from_list(values))
    });
    r.variadic("pick", 1, |a| select_keys(a, true));
    r.variadic("omit", 1, |a| select_keys(a, false));
    r.variadic("dig", 3, dig);
    r.variadic("merge", 1, |a| soft(merge(a, false), a[0].clone()));
    r.variadic("mustMerge", 1, |a| merge(a, false));
    r.variadic("mergeOverwrite", 1, |a| soft(merge(a, true), a[0].clone()));
    r.variadic("mustMergeOverwrite", 1, |a| merge(a, true));
    r.fixed("deepCopy", 1, |a| Ok(a[0].deep_copy()));
    r.fixed("mustDeepCopy", 1, |a| Ok(a[0].deep_copy()));

    r.fixed("append", 2, |a| soft(append(a), empty_list()));
    r.fixed("push", 2, |a| soft(append(a), empty_list()));
    r.fixed("mustAppend", 2, append);
    r.fixed("mustPush", 2, append);
    r.fixed("prepend", 2, |a| soft(prepend(a), empty_list()));
    r.fixed("mustPrepend", 2, prepend);
    r.variadic("concat", 0, |a| {
        let mut out = Vec::new();
        for list in a.iter().filter_map(Value::as_list) {
            out.extend(list.iter().cloned());
        }
        Ok(Value::from_list(out))
    });
    r.fixed("first", 1, |a| soft(first(a), Value::Nil));
    r.fixed("mustFirst", 1, first);
    r.fixed("rest", 1, |a| soft(rest(a), Value::Nil));
    r.fixed("mustRest", 1, rest);
    r.fixed("last", 1, |a| soft(last(a), Value::Nil));
    r.fixed("mustLast", 1, last);
    r.fixed("initial", 1, |a| soft(initial(a), Value::Nil));
    r.fixed("mustInitial", 1, initial);
    r.fixed("reverse", 1, |a| soft(reverse(a), empty_list()));
    r.fixed("mustReverse", 1, reverse);
    r.fixed("uniq", 1, |a| soft(uniq(a), empty_list()));
    r.fixed("mustUniq", 1, uniq);
    r.variadic("without", 1, |a| soft(without(a), empty_list()));
    r.variadic("mustWithout", 1, without);
    r.fixed("has", 2, |a| soft(has(a), Value::Bool(false)));
    r.fixed("mustHas", 2, has);
    r.fixed("compact", 1, |a| soft(compact(a), empty_list()));
    r.fixed("mustCompact", 1, compact);
    r.fixed("chunk", 2, |a| soft(chunk(a), empty_list()));
    r.fixed("mustChunk", 2, chunk);
    r.variadic("slice", 1, |a| soft(slice(a), Value::Nil));
    r.variadic("mustSlice", 1, slice);
}

fn empty_list() -> Value {
    Value::from_list(Vec::new())
}

/// The list argument at `i`; nil counts as an empty list
fn list_arg<'a>(a: &'a [Value], i: usize, op: &str) -> Result<&'a [Value], FuncError> {
    match &a[i] {
        Value::List(items) => Ok(items),
        Value::Nil => Ok(&[]),
        other => Err(FuncError::new(format!(
            "Cannot {} on type {}",
            op,
            other.type_name()
        ))),
    }
}

fn dict(a: &[Value]) -> FuncResult {
    let mut map = Map::new();
    for pair in a.chunks(2) {
        let value = pair.get(1).cloned().unwrap_or_else(|| Value::from(""));
        map.insert(strval(&pair[0]), value);
    }
    Ok(Value::from_map(map))
}

fn pluck(a: &[Value]) -> FuncResult {
    let key = arg_str(a, 0)?;
    let mut out = Vec::new();
    for i in 1..a.len() {
        if let Some(value) = arg_map(a, i)?.borrow().get(key) {
            out.push(value.clone());
        }
    }
    Ok(Value::from_list(out))
}

fn keys(a: &[Value]) -> FuncResult {
    let mut out = Vec::new();
    for i in 0..a.len() {
        out.extend(arg_map(a, i)?.borrow().keys().map(|k| Value::from(k.as_str())));
    }
    Ok(Value::from_list(out))
}

fn select_keys(a: &[Value], keep: bool) -> FuncResult {
    let map = arg_map(a, 0)?;
    let wanted = (1..a.len()).map(|i| arg_str(a, i)).collect::<Result<Vec<_>, _>>()?;
    let selected: Map = map
        .borrow()
        .iter()
        .filter(|(k, _)| wanted.contains(&k.as_str()) == keep)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Ok(Value::from_map(selected))
}

/// `dig "a" "b" default $dict`: walk nested maps, falling back to the default
fn dig(a: &[Value]) -> FuncResult {
    let n = a.len();
    let mut current = arg_map(a, n - 1)?.clone();
    let default = &a[n - 2];
    let path = (0..n - 2).map(|i| arg_str(a, i)).collect::<Result<Vec<_>, _>>()?;
    for (i, key) in path.iter().enumerate() {
        let step = match current.borrow().get(*key) {
            Some(step) => step.clone(),
            None => return Ok(default.clone()),
        };
        if i == path.len() - 1 {
            return Ok(step);
        }
        match step {
            Value::Map(next) => current = next,
            _ => return Ok(default.clone()),
        }
    }
    Ok(default.clone())
}

fn merge(a: &[Value], overwrite: bool) -> FuncResult {
    let dst = arg_map(a, 0)?;
    for (i, src) in a.iter().enumerate().skip(1) {
        let Value::Map(src) = src else {
            return Err(FuncError::new(format!(
                "src and dst must be of same type (argument {} is {})",
                i,
                src.type_name()
            )));
        };
        if Rc::ptr_eq(src, dst) {
            continue;
        }
        merge_maps(dst, &src.borrow(), overwrite);
    }
    Ok(a[0].clone())
}

/// Without overwrite, a destination key is filled only when missing or empty;
/// nested maps on both sides are merged recursively either way
fn merge_maps(dst: &Rc<RefCell<Map>>, src: &Map, overwrite: bool) {
    for (key, value) in src {
        let existing = dst.borrow().get(key).cloned();
        match (existing, value) {
            (Some(Value::Map(d)), Value::Map(s)) if !Rc::ptr_eq(&d, s) => {
                merge_maps(&d, &s.borrow(), overwrite);
            }
            (Some(current), _) if current.is_truthy() => {
                if overwrite && !value.is_nil() {
                    dst.borrow_mut().insert(key.clone(), value.clone());
                }
            }
            _ => {
                dst.borrow_mut().insert(key.clone(), value.clone());
            }
        }
    }
}

fn append(a: &[Value]) -> FuncResult {
    let mut items = list_arg(a, 0, "push")?.to_vec();
    items.push(a[1].clone());
    Ok(Value::from_list(items))
}

fn prepend(a: &[Value]) -> FuncResult {
    let list = list_arg(a, 0, "prepend")?;
    let mut items = Vec::with_capacity(list.len() + 1);
    items.push(a[1].clone());
    items.extend(list.iter().cloned());
    Ok(Value::from_list(items))
}

fn first(a: &[Value]) -> FuncResult {
    Ok(list_arg(a, 0, "find first")?.first().cloned().unwrap_or_default())
}

fn last(a: &[Value]) -> FuncResult {
    Ok(list_arg(a, 0, "find last")?.last().cloned().unwrap_or_default())
}

fn rest(a: &[Value]) -> FuncResult {
    let list = list_arg(a, 0, "find rest")?;
    if list.is_empty() {
        return Ok(Value::Nil);
    }
    Ok(Value::from_list(list[1..].to_vec()))
}

fn initial(a: &[Value]) -> FuncResult {
    let list = list_arg(a, 0, "find initial")?;
    if list.is_empty() {
        return Ok(Value::Nil);
    }
    Ok(Value::from_list(list[..list.len() - 1].to_vec()))
}

fn reverse(a: &[Value]) -> FuncResult {
    let mut items = list_arg(a, 0, "find reverse")?.to_vec();
    items.reverse();
    Ok(Value::from_list(items))
}

fn uniq(a: &[Value]) -> FuncResult {
    let mut out: Vec<Value> = Vec::new();
    for item in list_arg(a, 0, "find uniq")? {
        if !out.iter().any(|seen| seen.deep_equal(item)) {
            out.push(item.clone());
        }
    }
    Ok(Value::from_list(out))
}

fn without(a: &[Value]) -> FuncResult {
    let omit = &a[1..];
    let items = list_arg(a, 0, "find without")?
        .iter()
        .filter(|item| !omit.iter().any(|o| o.deep_equal(item)))
        .cloned()
        .collect();
    Ok(Value::from_list(items))
}

fn has(a: &[Value]) -> FuncResult {
    let haystack = list_arg(a, 1, "find has")?;
    Ok(Value::Bool(haystack.iter().any(|item| item.deep_equal(&a[0]))))
}

fn compact(a: &[Value]) -> FuncResult {
    let items = list_arg(a, 0, "compact")?
        .iter()
        .filter(|item| item.is_truthy())
        .cloned()
        .collect();
    Ok(Value::from_list(items))
}

fn chunk(a: &[Value]) -> FuncResult {
    let size = arg_int(a, 0)?;
    let list = list_arg(a, 1, "chunk")?;
    if size <= 0 {
        return Err(FuncError::new(format!("chunk size must be positive, got {}", size)));
    }
    let chunks = list
        .chunks(size as usize)
        .map(|c| Value::from_list(c.to_vec()))
        .collect();
    Ok(Value::from_list(chunks))
}

/// `slice x 1 3` is `x[1:3]` for lists and strings
fn slice(a: &[Value]) -> FuncResult {
    let len = match &a[0] {
        Value::List(items) => items.len(),
        Value::String(s) => s.len(),
        Value::Nil => 0,
        other => {
            return Err(FuncError::new(format!(
                "Cannot slice on type {}",
                other.type_name()
            )));
        }
    };
    let indices: Vec<i64> = a[1..].iter().map(Value::to_i64).collect();
    let (start, end) = match indices.as_slice() {
        [] => (0, len as i64),
        [start] => (*start, len as i64),
        [start, end, ..] => (*start, *end),
    };
    if start < 0 || end < start || end as usize > len {
        return Err(FuncError::new(format!(
            "slice bounds out of range [{}:{}] with capacity {}",
            start, end, len
        )));
    }
    let (start, end) = (start as usize, end as usize);
    match &a[0] {
        Value::List(items) => Ok(Value::from_list(items[start..end].to_vec())),
        Value::String(s) => match s.get(start..end) {
            Some(sub) => Ok(Value::from(sub)),
            None => Err(FuncError::new("slice bounds split a character")),
        },
        _ => Ok(Value::Nil),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{Callable, lookup};

    fn call(name: &str, args: &[Value]) -> FuncResult {
        match lookup(name).map(|f| f.callable) {
            Some(Callable::Pure(f)) => f(args),
            _ => panic!("{name} is not a pure function"),
        }
    }

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    fn list(items: &[i64]) -> Value {
        Value::from_list(items.iter().map(|i| Value::Int(*i)).collect())
    }

    fn shown(name: &str, args: &[Value]) -> String {
        call(name, args).unwrap().to_string()
    }

    #[test]
    fn test_dict_and_accessors() {
        let d = call("dict", &[s("b"), Value::Int(2), s("a"), Value::Int(1), s("odd")]).unwrap();
        assert_eq!(d.to_string(), "map[a:1 b:2 odd:]");
        assert_eq!(shown("get", &[d.clone(), s("b")]), "2");
        assert_eq!(shown("get", &[d.clone(), s("zz")]), "");
        assert_eq!(shown("hasKey", &[d.clone(), s("a")]), "true");
        call("set", &[d.clone(), s("c"), Value::Bool(true)]).unwrap();
        call("unset", &[d.clone(), s("odd")]).unwrap();
        assert_eq!(d.to_string(), "map[a:1 b:2 c:true]");
        assert_eq!(shown("keys", &[d.clone()]), "[a b c]");
        assert_eq!(shown("pick", &[d.clone(), s("a"), s("c")]), "map[a:1 c:true]");
        assert_eq!(shown("omit", &[d, s("a"), s("c")]), "map[b:2]");
    }

    #[test]
    fn test_dig() {
        let inner = call("dict", &[s("b"), s("found")]).unwrap();
        let outer = call("dict", &[s("a"), inner]).unwrap();
        assert_eq!(shown("dig", &[s("a"), s("b"), s("dflt"), outer.clone()]), "found");
        assert_eq!(shown("dig", &[s("a"), s("x"), s("dflt"), outer.clone()]), "dflt");
        assert_eq!(shown("dig", &[s("a"), s("b"), s("c"), s("dflt"), outer]), "dflt");
    }

    #[test]
    fn test_merge_fills_missing_and_empty() {
        let dst = call("dict", &[s("keep"), s("dst"), s("blank"), s("")]).unwrap();
        let src =
            call("dict", &[s("keep"), s("src"), s("blank"), s("filled"), s("new"), Value::Int(1)])
                .unwrap();
        call("merge", &[dst.clone(), src]).unwrap();
        assert_eq!(dst.to_string(), "map[blank:filled keep:dst new:1]");
    }

    #[test]
    fn test_merge_overwrite_and_nested() {
        let dst_inner = call("dict", &[s("x"), Value::Int(1), s("y"), Value::Int(2)]).unwrap();
        let src_inner = call("dict", &[s("y"), Value::Int(3)]).unwrap();
        let dst = call("dict", &[s("n"), dst_inner, s("flag"), Value::Bool(true)]).unwrap();
        let src = call("dict", &[s("n"), src_inner, s("flag"), Value::Bool(false)]).unwrap();
        call("mergeOverwrite", &[dst.clone(), src]).unwrap();
        assert_eq!(dst.to_string(), "map[flag:false n:map[x:1 y:3]]");
    }

    #[test]
    fn test_list_functions() {
        let l = list(&[1, 2, 2, 3]);
        assert_eq!(shown("append", &[l.clone(), Value::Int(4)]), "[1 2 2 3 4]");
        assert_eq!(shown("prepend", &[l.clone(), Value::Int(0)]), "[0 1 2 2 3]");
        assert_eq!(shown("first", &[l.clone()]), "1");
        assert_eq!(shown("last", &[l.clone()]), "3");
        assert_eq!(shown("rest", &[l.clone()]), "[2 2 3]");
        assert_eq!(shown("initial", &[l.clone()]), "[1 2 2]");
        assert_eq!(shown("reverse", &[l.clone()]), "[3 2 2 1]");
        assert_eq!(shown("uniq", &[l.clone()]), "[1 2 3]");
        assert_eq!(shown("without", &[l.clone(), Value::Int(2)]), "[1 3]");
        assert_eq!(shown("has", &[Value::Int(3), l.clone()]), "true");
        assert_eq!(shown("chunk", &[Value::Int(3), l.clone()]), "[[1 2 2] [3]]");
        assert_eq!(shown("concat", &[l, list(&[9])]), "[1 2 2 3 9]");
        let mixed = Value::from_list(vec![Value::Int(0), s("a"), s(""), Value::Nil]);
        assert_eq!(shown("compact", &[mixed]), "[a]");
    }

    #[test]
    fn test_soft_and_must_variants() {
        assert_eq!(shown("first", &[s("text")]), "<nil>");
        let err = call("mustFirst", &[s("text")]).unwrap_err();
        assert!(matches!(
            err,
            FuncError::Call { ref message, .. } if message == "Cannot find first on type string"
        ));
        assert_eq!(shown("first", &[list(&[])]), "<nil>");
    }

    #[test]
    fn test_slice() {
        let l = list(&[1, 2, 3, 4]);
        assert_eq!(shown("slice", &[l.clone(), Value::Int(1), Value::Int(3)]), "[2 3]");
        assert_eq!(shown("slice", &[l.clone(), Value::Int(2)]), "[3 4]");
        assert_eq!(shown("slice", &[s("hello"), Value::Int(1), Value::Int(3)]), "el");
        assert_eq!(shown("slice", &[l.clone(), Value::Int(3), Value::Int(9)]), "<nil>");
        assert!(call("mustSlice", &[l, Value::Int(3), Value::Int(9)]).is_err());
    }
}
