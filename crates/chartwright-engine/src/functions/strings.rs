//! String functions: case, trimming, splitting, padding, random text, regex

use rand::Rng;
use rand::seq::SliceRandom;
use regex::Regex;

use super::{FuncError, FuncResult, Registry, arg_int, arg_str, soft, string_list, strslice, strval};
use crate::format::quote;
use crate::value::{Map, Value};

pub(super) fn register(r: &mut Registry) {
    r.fixed("trim", 1, |a| Ok(arg_str(a, 0)?.trim().into()));
    r.fixed("trimAll", 2, |a| {
        let cutset = arg_str(a, 0)?;
        Ok(arg_str(a, 1)?.trim_matches(|c| cutset.contains(c)).into())
    });
    r.fixed("trimPrefix", 2, |a| {
        let prefix = arg_str(a, 0)?;
        let s = arg_str(a, 1)?;
        Ok(s.strip_prefix(prefix).unwrap_or(s).into())
    });
    r.fixed("trimSuffix", 2, |a| {
        let suffix = arg_str(a, 0)?;
        let s = arg_str(a, 1)?;
        Ok(s.strip_suffix(suffix).unwrap_or(s).into())
    });
    r.fixed("upper", 1, |a| Ok(arg_str(a, 0)?.to_uppercase().into()));
    r.fixed("lower", 1, |a| Ok(arg_str(a, 0)?.to_lowercase().into()));
    r.fixed("title", 1, |a| Ok(title(arg_str(a, 0)?).into()));
    r.fixed("untitle", 1, |a| Ok(untitle(arg_str(a, 0)?).into()));
    r.fixed("swapcase", 1, |a| Ok(swapcase(arg_str(a, 0)?).into()));
    r.fixed("camelcase", 1, |a| Ok(camelcase(arg_str(a, 0)?).into()));
    r.fixed("snakecase", 1, |a| Ok(words(arg_str(a, 0)?).join("_").into()));
    r.fixed("kebabcase", 1, |a| Ok(words(arg_str(a, 0)?).join("-").into()));
    r.fixed("initials", 1, |a| Ok(initials(arg_str(a, 0)?).into()));
    r.fixed("nospace", 1, |a| {
        Ok(arg_str(a, 0)?.chars().filter(|c| !c.is_whitespace()).collect::<String>().into())
    });
    r.fixed("shuffle", 1, |a| {
        let mut chars: Vec<char> = arg_str(a, 0)?.chars().collect();
        chars.shuffle(&mut rand::rng());
        Ok(chars.into_iter().collect::<String>().into())
    });
    r.fixed("repeat", 2, |a| {
        let count = arg_int(a, 0)?;
        if count < 0 {
            return Err(FuncError::new("strings: negative Repeat count"));
        }
        Ok(arg_str(a, 1)?.repeat(count as usize).into())
    });
    r.fixed("substr", 3, substr);
    r.fixed("trunc", 2, trunc);
    r.fixed("abbrev", 2, |a| {
        let width = arg_int(a, 0)?;
        let s = arg_str(a, 1)?;
        if width < 4 {
            return Ok(s.into());
        }
        Ok(abbreviate(s, 0, width as usize).into())
    });
    r.fixed("abbrevboth", 3, |a| {
        let left = arg_int(a, 0)?;
        let right = arg_int(a, 1)?;
        let s = arg_str(a, 2)?;
        if right < 4 || (left > 0 && right < 7) {
            return Ok(s.into());
        }
        Ok(abbreviate(s, left.max(0) as usize, right as usize).into())
    });
    r.fixed("wrap", 2, |a| Ok(wrap(arg_str(a, 1)?, arg_int(a, 0)?, "\n").into()));
    r.fixed("wrapWith", 3, |a| {
        Ok(wrap(arg_str(a, 2)?, arg_int(a, 0)?, arg_str(a, 1)?).into())
    });
    r.fixed("contains", 2, |a| Ok(arg_str(a, 1)?.contains(arg_str(a, 0)?).into()));
    r.fixed("hasPrefix", 2, |a| Ok(arg_str(a, 1)?.starts_with(arg_str(a, 0)?).into()));
    r.fixed("hasSuffix", 2, |a| Ok(arg_str(a, 1)?.ends_with(arg_str(a, 0)?).into()));
    r.variadic("quote", 0, |a| Ok(quote_each(a, |s| quote(s)).into()));
    r.variadic("squote", 0, |a| Ok(quote_each(a, |s| format!("'{}'", s)).into()));
    r.variadic("cat", 0, |a| {
        let parts: Vec<String> = a.iter().filter(|v| !v.is_nil()).map(strval).collect();
        Ok(parts.join(" ").into())
    });
    r.fixed("indent", 2, |a| Ok(indent(arg_int(a, 0)?, arg_str(a, 1)?).into()));
    r.fixed("nindent", 2, |a| {
        Ok(format!("\n{}", indent(arg_int(a, 0)?, arg_str(a, 1)?)).into())
    });
    r.fixed("replace", 3, |a| {
        Ok(arg_str(a, 2)?.replace(arg_str(a, 0)?, arg_str(a, 1)?).into())
    });
    r.fixed("plural", 3, |a| {
        let pick = if arg_int(a, 2)? == 1 { arg_str(a, 0)? } else { arg_str(a, 1)? };
        Ok(pick.into())
    });

    r.fixed("split", 2, |a| {
        let parts = arg_str(a, 1)?.split(arg_str(a, 0)?).map(str::to_string).collect();
        Ok(indexed_map(parts))
    });
    r.fixed("splitn", 3, |a| {
        let sep = arg_str(a, 0)?;
        let n = arg_int(a, 1)?;
        let s = arg_str(a, 2)?;
        let parts = match n {
            0 => Vec::new(),
            n if n < 0 => s.split(sep).map(str::to_string).collect(),
            n => s.splitn(n as usize, sep).map(str::to_string).collect(),
        };
        Ok(indexed_map(parts))
    });
    r.fixed("splitList", 2, |a| {
        Ok(string_list(arg_str(a, 1)?.split(arg_str(a, 0)?).map(str::to_string).collect()))
    });
    r.fixed("join", 2, |a| Ok(strslice(&a[1]).join(arg_str(a, 0)?).into()));
    r.fixed("sortAlpha", 1, |a| {
        let mut items = match &a[0] {
            Value::List(_) => strslice(&a[0]),
            other => vec![strval(other)],
        };
        items.sort();
        Ok(string_list(items))
    });
    r.fixed("toString", 1, |a| Ok(strval(&a[0]).into()));
    r.fixed("toStrings", 1, |a| Ok(string_list(strslice(&a[0]))));

    r.fixed("randAlphaNum", 1, |a| random_from(a, ALPHANUMERIC));
    r.fixed("randAlpha", 1, |a| random_from(a, ALPHA));
    r.fixed("randNumeric", 1, |a| random_from(a, NUMERIC));
    r.fixed("randAscii", 1, |a| random_from(a, ASCII));

    r.fixed("regexMatch", 2, |a| soft(regex_match(a), false.into()));
    r.fixed("mustRegexMatch", 2, regex_match);
    r.fixed("regexFind", 2, |a| soft(regex_find(a), "".into()));
    r.fixed("mustRegexFind", 2, regex_find);
    r.fixed("regexFindAll", 3, |a| soft(regex_find_all(a), Value::from_list(Vec::new())));
    r.fixed("mustRegexFindAll", 3, regex_find_all);
    r.fixed("regexReplaceAll", 3, |a| soft(regex_replace(a, true), a[1].clone()));
    r.fixed("mustRegexReplaceAll", 3, |a| regex_replace(a, true));
    r.fixed("regexReplaceAllLiteral", 3, |a| soft(regex_replace(a, false), a[1].clone()));
    r.fixed("mustRegexReplaceAllLiteral", 3, |a| regex_replace(a, false));
    r.fixed("regexSplit", 3, |a| soft(regex_split(a), Value::from_list(Vec::new())));
    r.fixed("mustRegexSplit", 3, regex_split);
    r.fixed("regexQuoteMeta", 1, |a| Ok(quote_meta(arg_str(a, 0)?).into()));
}

fn title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_letter = false;
    for c in s.chars() {
        if !prev_letter {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_letter = c.is_alphanumeric() || c == '_';
    }
    out
}

fn untitle(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start && !c.is_whitespace() {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    out
}

fn swapcase(s: &str) -> String {
    s.chars()
        .flat_map(|c| {
            let swapped: Vec<char> = if c.is_uppercase() {
                c.to_lowercase().collect()
            } else if c.is_lowercase() {
                c.to_uppercase().collect()
            } else {
                vec![c]
            };
            swapped
        })
        .collect()
}

/// Lowercase words split at separators and lower-to-upper transitions
fn words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn camelcase(s: &str) -> String {
    s.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn initials(s: &str) -> String {
    s.split_whitespace().filter_map(|w| w.chars().next()).collect()
}

fn substr(a: &[Value]) -> FuncResult {
    let start = arg_int(a, 0)?;
    let end = arg_int(a, 1)?;
    let s = arg_str(a, 2)?.as_bytes();
    let len = s.len() as i64;
    let (from, to) = if start < 0 {
        (0, end)
    } else if end < 0 || end > len {
        (start, len)
    } else {
        (start, end)
    };
    if from < 0 || to < 0 || from > to || to > len {
        return Err(FuncError::new(format!(
            "runtime error: slice bounds out of range [{}:{}]",
            from, to
        )));
    }
    Ok(String::from_utf8_lossy(&s[from as usize..to as usize]).into_owned().into())
}

fn trunc(a: &[Value]) -> FuncResult {
    let c = arg_int(a, 0)?;
    let s = arg_str(a, 1)?;
    let bytes = s.as_bytes();
    let len = bytes.len() as i64;
    let out = if c < 0 && len + c > 0 {
        &bytes[(len + c) as usize..]
    } else if c >= 0 && len > c {
        &bytes[..c as usize]
    } else {
        bytes
    };
    Ok(String::from_utf8_lossy(out).into_owned().into())
}

/// Abbreviate with `...`, keeping at most `width` bytes starting near `offset`
fn abbreviate(s: &str, offset: usize, width: usize) -> String {
    const MARKER: &str = "...";
    if s.len() <= width {
        return s.to_string();
    }
    let lossy = |b: &[u8]| String::from_utf8_lossy(b).into_owned();
    let bytes = s.as_bytes();
    let mut offset = offset.min(bytes.len());
    if bytes.len() - offset < width - 3 {
        offset = bytes.len() - (width - 3);
    }
    if offset <= 4 {
        return format!("{}{}", lossy(&bytes[..width - 3]), MARKER);
    }
    if offset + width - 3 < bytes.len() {
        return format!("{}{}", MARKER, abbreviate(&lossy(&bytes[offset..]), 0, width - 3));
    }
    format!("{}{}", MARKER, lossy(&bytes[bytes.len() - (width - 3)..]))
}

/// Word wrap at spaces; words longer than the limit stay whole
fn wrap(s: &str, limit: i64, newline: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let limit = limit.max(1) as usize;
    let bytes = s.as_bytes();
    let lossy = |b: &[u8]| String::from_utf8_lossy(b).into_owned();
    let mut out = String::new();
    let mut offset = 0;
    while bytes.len() - offset > limit {
        if bytes[offset] == b' ' {
            offset += 1;
            continue;
        }
        let end = (limit + offset + 1).min(bytes.len());
        match bytes[offset..end].iter().rposition(|&b| b == b' ') {
            Some(space) => {
                out.push_str(&lossy(&bytes[offset..offset + space]));
                out.push_str(newline);
                offset += space + 1;
            }
            None => {
                let end = limit + offset;
                match bytes[end..].iter().position(|&b| b == b' ') {
                    Some(space) => {
                        out.push_str(&lossy(&bytes[offset..end + space]));
                        out.push_str(newline);
                        offset = end + space + 1;
                    }
                    None => {
                        out.push_str(&lossy(&bytes[offset..]));
                        offset = bytes.len();
                    }
                }
            }
        }
    }
    out.push_str(&lossy(&bytes[offset..]));
    out
}

fn quote_each(args: &[Value], f: impl Fn(&str) -> String) -> String {
    let parts: Vec<String> = args
        .iter()
        .filter(|v| !v.is_nil())
        .map(|v| f(&strval(v)))
        .collect();
    parts.join(" ")
}

pub(crate) fn indent(spaces: i64, s: &str) -> String {
    let pad = " ".repeat(spaces.max(0) as usize);
    format!("{}{}", pad, s.replace('\n', &format!("\n{}", pad)))
}

/// `_0`, `_1`, ... keyed map, as `split` returns
fn indexed_map(parts: Vec<String>) -> Value {
    let map: Map = parts
        .into_iter()
        .enumerate()
        .map(|(i, p)| (format!("_{}", i), Value::from(p)))
        .collect();
    Value::from_map(map)
}

const ALPHA: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const NUMERIC: &str = "0123456789";
const ALPHANUMERIC: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const ASCII: &str = " !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

fn random_from(a: &[Value], charset: &str) -> FuncResult {
    let count = arg_int(a, 0)?;
    if count < 0 {
        return Err(FuncError::new("count must be non-negative"));
    }
    let chars: Vec<char> = charset.chars().collect();
    let mut rng = rand::rng();
    let out: String = (0..count)
        .map(|_| chars[rng.random_range(0..chars.len())])
        .collect();
    Ok(out.into())
}

fn compile(pattern: &str) -> Result<Regex, FuncError> {
    Regex::new(pattern).map_err(|e| FuncError::new(format!("error parsing regexp: {}", e)))
}

fn regex_match(a: &[Value]) -> FuncResult {
    let re = compile(arg_str(a, 0)?)?;
    Ok(re.is_match(arg_str(a, 1)?).into())
}

fn regex_find(a: &[Value]) -> FuncResult {
    let re = compile(arg_str(a, 0)?)?;
    let found = re.find(arg_str(a, 1)?).map(|m| m.as_str()).unwrap_or("");
    Ok(found.into())
}

fn regex_find_all(a: &[Value]) -> FuncResult {
    let re = compile(arg_str(a, 0)?)?;
    let s = arg_str(a, 1)?;
    let n = arg_int(a, 2)?;
    let found = re.find_iter(s).map(|m| m.as_str().to_string());
    let found: Vec<String> = if n < 0 { found.collect() } else { found.take(n as usize).collect() };
    Ok(string_list(found))
}

fn regex_replace(a: &[Value], expand: bool) -> FuncResult {
    let re = compile(arg_str(a, 0)?)?;
    let s = arg_str(a, 1)?;
    let repl = arg_str(a, 2)?;
    let out = if expand {
        re.replace_all(s, repl)
    } else {
        re.replace_all(s, regex::NoExpand(repl))
    };
    Ok(out.into_owned().into())
}

fn regex_split(a: &[Value]) -> FuncResult {
    let re = compile(arg_str(a, 0)?)?;
    let s = arg_str(a, 1)?;
    let n = arg_int(a, 2)?;
    let parts: Vec<String> = match n {
        0 => Vec::new(),
        n if n < 0 => re.split(s).map(str::to_string).collect(),
        n => re.splitn(s, n as usize).map(str::to_string).collect(),
    };
    Ok(string_list(parts))
}

fn quote_meta(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::lookup;

    fn call(name: &str, args: &[Value]) -> FuncResult {
        match lookup(name).map(|f| f.callable) {
            Some(crate::functions::Callable::Pure(f)) => f(args),
            _ => panic!("{name} is not a pure function"),
        }
    }

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    fn text(name: &str, args: &[Value]) -> String {
        call(name, args).unwrap().to_display_string()
    }

    #[test]
    fn test_case_functions() {
        assert_eq!(text("title", &[s("hello world-wide")]), "Hello World-Wide");
        assert_eq!(text("untitle", &[s("Hello World")]), "hello world");
        assert_eq!(text("snakecase", &[s("FirstName")]), "first_name");
        assert_eq!(text("kebabcase", &[s("HTTPServer")]), "http-server");
        assert_eq!(text("camelcase", &[s("http_server")]), "HttpServer");
        assert_eq!(text("swapcase", &[s("Hello")]), "hELLO");
    }

    #[test]
    fn test_trunc_and_abbrev() {
        assert_eq!(text("trunc", &[Value::Int(5), s("hello world")]), "hello");
        assert_eq!(text("trunc", &[Value::Int(-5), s("hello world")]), "world");
        assert_eq!(text("abbrev", &[Value::Int(5), s("hello world")]), "he...");
        assert_eq!(
            text("abbrevboth", &[Value::Int(5), Value::Int(10), s("1234 5678 9123")]),
            "...5678..."
        );
        assert_eq!(text("substr", &[Value::Int(0), Value::Int(5), s("hello world")]), "hello");
    }

    #[test]
    fn test_indent_and_nindent() {
        assert_eq!(text("indent", &[Value::Int(2), s("a\nb")]), "  a\n  b");
        assert_eq!(text("nindent", &[Value::Int(2), s("a")]), "\n  a");
    }

    #[test]
    fn test_quote_skips_nil() {
        assert_eq!(text("quote", &[s("a"), Value::Nil, Value::Int(2)]), "\"a\" \"2\"");
        assert_eq!(text("squote", &[s("a")]), "'a'");
    }

    #[test]
    fn test_split_family() {
        let parts = call("split", &[s("$"), s("foo$bar$baz")]).unwrap();
        assert_eq!(parts.get("_1").unwrap().as_str(), Some("bar"));
        let list = call("splitList", &[s(","), s("a,b")]).unwrap();
        assert_eq!(list.to_string(), "[a b]");
        assert_eq!(text("join", &[s("-"), Value::from_list(vec![s("a"), Value::Int(1)])]), "a-1");
    }

    #[test]
    fn test_wrap() {
        assert_eq!(
            text("wrap", &[Value::Int(10), s("the quick brown fox")]),
            "the quick\nbrown fox"
        );
    }

    #[test]
    fn test_regex_functions() {
        assert!(call("regexMatch", &[s("^[a-z]+$"), s("abc")]).unwrap().is_truthy());
        assert_eq!(text("regexReplaceAll", &[s("a(x*)b"), s("-ab-axxb-"), s("${1}W")]), "-W-xxW-");
        assert_eq!(text("regexReplaceAllLiteral", &[s("a(x*)b"), s("-ab-"), s("${1}")]), "-${1}-");
        let found = call("regexFindAll", &[s("a."), s("abacad"), Value::Int(-1)]).unwrap();
        assert_eq!(found.to_string(), "[ab ac ad]");
        assert!(!call("regexMatch", &[s("("), s("x")]).unwrap().is_truthy());
        assert!(call("mustRegexMatch", &[s("("), s("x")]).is_err());
        assert_eq!(text("regexQuoteMeta", &[s("1.2+")]), "1\\.2\\+");
    }

    #[test]
    fn test_random_strings() {
        let out = text("randAlphaNum", &[Value::Int(12)]);
        assert_eq!(out.len(), 12);
        assert!(out.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_string_param_rejects_int() {
        assert!(matches!(call("upper", &[Value::Int(1)]), Err(FuncError::Arg(_))));
    }
}
