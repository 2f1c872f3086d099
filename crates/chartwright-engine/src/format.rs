//! Go `fmt` compatible formatting
//!
//! `print`, `println` and `printf` must produce exactly what Go's `fmt`
//! package produces, including the `%!verb(type=value)` markers for bad
//! verbs and missing arguments.

use crate::value::Value;

/// `fmt.Sprint`: spaces between operands when neither side is a string
pub fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 && !matches!(arg, Value::String(_)) && !matches!(args[i - 1], Value::String(_)) {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

/// `fmt.Sprintln`: always space separated, newline terminated
pub fn sprintln(args: &[Value]) -> String {
    let mut out = args
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    out.push('\n');
    out
}

#[derive(Debug, Default, Clone, Copy)]
struct Directive {
    plus: bool,
    minus: bool,
    sharp: bool,
    space: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// `fmt.Sprintf`
pub fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::new();
    let chars: Vec<char> = format.chars().collect();
    let mut i = 0;
    let mut arg_index = 0;
    let mut reordered = false;

    while i < chars.len() {
        let c = chars[i];
        if c != '%' {
            out.push(c);
            i += 1;
            continue;
        }
        i += 1;
        if i >= chars.len() {
            out.push_str("%!(NOVERB)");
            break;
        }

        let mut directive = Directive::default();
        while i < chars.len() {
            match chars[i] {
                '+' => directive.plus = true,
                '-' => directive.minus = true,
                '#' => directive.sharp = true,
                ' ' => directive.space = true,
                '0' => directive.zero = true,
                _ => break,
            }
            i += 1;
        }

        if let Some((index, next)) = parse_arg_index(&chars, i) {
            arg_index = index;
            i = next;
            reordered = true;
        }

        if i < chars.len() && chars[i] == '*' {
            i += 1;
            match args.get(arg_index) {
                Some(Value::Int(w)) => {
                    if *w < 0 {
                        directive.minus = true;
                    }
                    directive.width = Some(w.unsigned_abs() as usize);
                }
                _ => out.push_str("%!(BADWIDTH)"),
            }
            arg_index += 1;
        } else {
            let (width, next) = parse_number(&chars, i);
            directive.width = width;
            i = next;
        }

        if i < chars.len() && chars[i] == '.' {
            i += 1;
            if i < chars.len() && chars[i] == '*' {
                i += 1;
                match args.get(arg_index) {
                    Some(Value::Int(p)) if *p >= 0 => directive.precision = Some(*p as usize),
                    _ => out.push_str("%!(BADPREC)"),
                }
                arg_index += 1;
            } else {
                let (precision, next) = parse_number(&chars, i);
                directive.precision = Some(precision.unwrap_or(0));
                i = next;
            }
        }

        if let Some((index, next)) = parse_arg_index(&chars, i) {
            arg_index = index;
            i = next;
            reordered = true;
        }

        if i >= chars.len() {
            out.push_str("%!(NOVERB)");
            break;
        }
        let verb = chars[i];
        i += 1;

        if verb == '%' {
            out.push('%');
            continue;
        }

        match args.get(arg_index) {
            Some(arg) => {
                out.push_str(&format_arg(arg, verb, &directive));
                arg_index += 1;
            }
            None => out.push_str(&format!("%!{}(MISSING)", verb)),
        }
    }

    if !reordered && arg_index < args.len() {
        out.push_str("%!(EXTRA ");
        let extra: Vec<String> = args[arg_index..]
            .iter()
            .map(|a| match a {
                Value::Nil => "<nil>".to_string(),
                other => format!("{}={}", other.type_name(), other),
            })
            .collect();
        out.push_str(&extra.join(", "));
        out.push(')');
    }

    out
}

fn parse_number(chars: &[char], mut i: usize) -> (Option<usize>, usize) {
    let start = i;
    let mut n = 0usize;
    while i < chars.len() && chars[i].is_ascii_digit() {
        n = n.saturating_mul(10).saturating_add(chars[i] as usize - '0' as usize);
        i += 1;
    }
    if i == start { (None, i) } else { (Some(n), i) }
}

/// `[n]` explicit argument index, 1-based
fn parse_arg_index(chars: &[char], i: usize) -> Option<(usize, usize)> {
    if chars.get(i) != Some(&'[') {
        return None;
    }
    let (n, next) = parse_number(chars, i + 1);
    match (n, chars.get(next)) {
        (Some(n), Some(']')) if n >= 1 => Some((n - 1, next + 1)),
        _ => None,
    }
}

fn bad_verb(arg: &Value, verb: char) -> String {
    match arg {
        Value::Nil => format!("%!{}(<nil>)", verb),
        other => format!("%!{}({}={})", verb, other.type_name(), other),
    }
}

fn format_arg(arg: &Value, verb: char, directive: &Directive) -> String {
    match verb {
        'T' => return pad(arg.type_name().to_string(), directive, false),
        'v' if directive.sharp => return pad(go_syntax(arg), directive, false),
        _ => {}
    }

    match arg {
        Value::List(items) => {
            // verbs apply element-wise, width included
            let elem = Directive { width: directive.width, ..Directive::default() };
            let inner: Vec<String> = items.iter().map(|v| format_arg(v, verb, &elem)).collect();
            format!("[{}]", inner.join(" "))
        }
        Value::Map(map) => {
            let elem = Directive { width: directive.width, ..Directive::default() };
            let inner: Vec<String> = map
                .borrow()
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{}:{}",
                        format_arg(&Value::from(k.as_str()), verb, &elem),
                        format_arg(v, verb, &elem)
                    )
                })
                .collect();
            format!("map[{}]", inner.join(" "))
        }
        Value::Nil => match verb {
            'v' => pad("<nil>".to_string(), directive, false),
            _ => bad_verb(arg, verb),
        },
        Value::Bool(b) => match verb {
            'v' | 't' => pad(b.to_string(), directive, false),
            _ => bad_verb(arg, verb),
        },
        Value::Int(n) => format_int(*n, verb, directive).unwrap_or_else(|| bad_verb(arg, verb)),
        Value::Float(f) => {
            format_float_verb(*f, verb, directive).unwrap_or_else(|| bad_verb(arg, verb))
        }
        Value::String(s) => {
            format_string(s, verb, directive).unwrap_or_else(|| bad_verb(arg, verb))
        }
    }
}

/// `%#v` Go-syntax representation
fn go_syntax(arg: &Value) -> String {
    match arg {
        Value::Nil => "<nil>".to_string(),
        Value::String(s) => quote(s),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(go_syntax_elem).collect();
            format!("[]interface {{}}{{{}}}", inner.join(", "))
        }
        Value::Map(map) => {
            let inner: Vec<String> = map
                .borrow()
                .iter()
                .map(|(k, v)| format!("{}:{}", quote(k), go_syntax_elem(v)))
                .collect();
            format!("map[string]interface {{}}{{{}}}", inner.join(", "))
        }
        other => other.to_string(),
    }
}

fn go_syntax_elem(arg: &Value) -> String {
    match arg {
        Value::Nil => "interface {}(nil)".to_string(),
        other => go_syntax(other),
    }
}

fn format_int(n: i64, verb: char, directive: &Directive) -> Option<String> {
    let magnitude = n.unsigned_abs();
    let digits = match verb {
        'v' | 'd' => magnitude.to_string(),
        'b' => format!("{:b}", magnitude),
        'o' | 'O' => format!("{:o}", magnitude),
        'x' => format!("{:x}", magnitude),
        'X' => format!("{:X}", magnitude),
        'c' => {
            let c = u32::try_from(n).ok().and_then(char::from_u32).unwrap_or('\u{FFFD}');
            return Some(pad(c.to_string(), directive, false));
        }
        'q' => {
            let c = u32::try_from(n).ok().and_then(char::from_u32).unwrap_or('\u{FFFD}');
            return Some(pad(quote_rune(c), directive, false));
        }
        'U' => {
            let hex = format!("U+{:04X}", magnitude);
            return Some(pad(hex, directive, false));
        }
        'e' | 'E' | 'f' | 'F' | 'g' | 'G' => return None,
        _ => return None,
    };

    let mut digits = digits;
    if let Some(p) = directive.precision {
        while digits.len() < p {
            digits.insert(0, '0');
        }
        if p == 0 && n == 0 {
            digits.clear();
        }
    }

    let prefix = match verb {
        'O' => "0o",
        'b' if directive.sharp => "0b",
        'o' if directive.sharp => "0",
        'x' if directive.sharp => "0x",
        'X' if directive.sharp => "0X",
        _ => "",
    };
    let sign = if n < 0 {
        "-"
    } else if directive.plus {
        "+"
    } else if directive.space {
        " "
    } else {
        ""
    };
    Some(pad_number(sign, &format!("{}{}", prefix, digits), directive))
}

fn format_float_verb(f: f64, verb: char, directive: &Directive) -> Option<String> {
    let fmt = match verb {
        'v' => 'g',
        'e' | 'E' | 'f' | 'F' | 'g' | 'G' => verb,
        _ => return None,
    };
    let text = format_float(f, fmt, directive.precision, directive.sharp);
    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => match text.strip_prefix('+') {
            Some(rest) => ("+", rest.to_string()),
            None if directive.plus => ("+", text),
            None if directive.space => (" ", text),
            None => ("", text),
        },
    };
    if !f.is_finite() {
        return Some(pad(format!("{}{}", sign, body), directive, false));
    }
    Some(pad_number(sign, &body, directive))
}

fn format_string(s: &str, verb: char, directive: &Directive) -> Option<String> {
    let truncated: String = match directive.precision {
        Some(p) => s.chars().take(p).collect(),
        None => s.to_string(),
    };
    match verb {
        'v' | 's' => Some(pad(truncated, directive, true)),
        'q' => Some(pad(quote(&truncated), directive, false)),
        'x' => Some(pad(hex::encode(truncated.as_bytes()), directive, false)),
        'X' => Some(pad(hex::encode_upper(truncated.as_bytes()), directive, false)),
        _ => None,
    }
}

fn pad(text: String, directive: &Directive, zero_allowed: bool) -> String {
    let width = match directive.width {
        Some(w) => w,
        None => return text,
    };
    let len = text.chars().count();
    if len >= width {
        return text;
    }
    let fill = width - len;
    if directive.minus {
        format!("{}{}", text, " ".repeat(fill))
    } else if directive.zero && zero_allowed {
        format!("{}{}", "0".repeat(fill), text)
    } else {
        format!("{}{}", " ".repeat(fill), text)
    }
}

fn pad_number(sign: &str, digits: &str, directive: &Directive) -> String {
    let len = sign.len() + digits.chars().count();
    match directive.width {
        Some(w) if w > len => {
            let fill = w - len;
            if directive.minus {
                format!("{}{}{}", sign, digits, " ".repeat(fill))
            } else if directive.zero && directive.precision.is_none_or(|_| digits.contains('.')) {
                format!("{}{}{}", sign, "0".repeat(fill), digits)
            } else {
                format!("{}{}{}", " ".repeat(fill), sign, digits)
            }
        }
        _ => format!("{}{}", sign, digits),
    }
}

/// Decimal digits and decimal-point position of `|f|`
///
/// `significant` rounds to that many digits, `None` gives the shortest
/// representation that round-trips. Trailing zeros are trimmed.
fn decimal_digits(f: f64, significant: Option<usize>) -> (String, i32) {
    let text = match significant {
        Some(p) => format!("{:.*e}", p.saturating_sub(1), f.abs()),
        None => format!("{:e}", f.abs()),
    };
    let (mantissa, exp) = text.split_once('e').unwrap_or((&text, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let mut digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }
    (digits, exp + 1)
}

fn exponent_suffix(exp: i32, upper: bool) -> String {
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{}{}{:02}", e, sign, exp.abs())
}

/// Format a float with a Go verb (`e`, `E`, `f`, `F`, `g`, `G`)
pub fn format_float(f: f64, verb: char, precision: Option<usize>, sharp: bool) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+Inf".to_string() } else { "-Inf".to_string() };
    }
    let sign = if f.is_sign_negative() { "-" } else { "" };
    let body = match verb {
        'e' | 'E' => {
            let p = precision.unwrap_or(6);
            let text = format!("{:.*e}", p, f.abs());
            let (mantissa, exp) = text.split_once('e').unwrap_or((&text, "0"));
            let exp: i32 = exp.parse().unwrap_or(0);
            format!("{}{}", mantissa, exponent_suffix(exp, verb == 'E'))
        }
        'f' | 'F' => format!("{:.*}", precision.unwrap_or(6), f.abs()),
        _ => format_g(f.abs(), precision, sharp, verb == 'G'),
    };
    format!("{}{}", sign, body)
}

fn format_g(f: f64, precision: Option<usize>, sharp: bool, upper: bool) -> String {
    let significant = precision.map(|p| p.max(1));
    let (digits, dp) = decimal_digits(f, significant);
    let nd = digits.len() as i32;

    let mut eprec = match significant {
        Some(p) => {
            let p = p as i32;
            if p > nd && nd >= dp { nd } else { p }
        }
        None => 6,
    };
    if sharp && significant.is_none() {
        eprec = 6;
    }

    let exp = dp - 1;
    if exp < -4 || exp >= eprec {
        let mut mantissa = digits.clone();
        if sharp {
            let want = significant.unwrap_or(6);
            while mantissa.len() < want {
                mantissa.push('0');
            }
        }
        let mut out = String::new();
        out.push_str(&mantissa[..1]);
        if mantissa.len() > 1 {
            out.push('.');
            out.push_str(&mantissa[1..]);
        }
        out.push_str(&exponent_suffix(exp, upper));
        return out;
    }

    let mut out = String::new();
    if dp <= 0 {
        out.push_str("0.");
        for _ in 0..(-dp) {
            out.push('0');
        }
        out.push_str(&digits);
    } else {
        let dp = dp as usize;
        if digits.len() <= dp {
            out.push_str(&digits);
            for _ in digits.len()..dp {
                out.push('0');
            }
        } else {
            out.push_str(&digits[..dp]);
            out.push('.');
            out.push_str(&digits[dp..]);
        }
    }
    if digits == "0" {
        out = "0".to_string();
    }
    out
}

/// `strconv.Quote`
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        push_escaped(&mut out, c, '"');
    }
    out.push('"');
    out
}

fn quote_rune(c: char) -> String {
    let mut out = String::from("'");
    push_escaped(&mut out, c, '\'');
    out.push('\'');
    out
}

fn push_escaped(out: &mut String, c: char, quote: char) {
    match c {
        '\x07' => out.push_str("\\a"),
        '\x08' => out.push_str("\\b"),
        '\x0c' => out.push_str("\\f"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        '\x0b' => out.push_str("\\v"),
        '\\' => out.push_str("\\\\"),
        c if c == quote => {
            out.push('\\');
            out.push(c);
        }
        c if (c as u32) < 0x20 || c as u32 == 0x7f => out.push_str(&format!("\\x{:02x}", c as u32)),
        c if c.is_control() => {
            if (c as u32) < 0x10000 {
                out.push_str(&format!("\\u{:04x}", c as u32));
            } else {
                out.push_str(&format!("\\U{:08x}", c as u32));
            }
        }
        c => out.push(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn test_sprintf_basic_verbs() {
        assert_eq!(sprintf("%s-%d", &[s("web"), Value::Int(3)]), "web-3");
        assert_eq!(sprintf("%q", &[s("a\"b")]), "\"a\\\"b\"");
        assert_eq!(sprintf("%v|%T", &[Value::Float(1.5), Value::Int(1)]), "1.5|int");
        assert_eq!(
            sprintf("%5.2f|%-4d|%04d", &[Value::Float(3.14159), Value::Int(7), Value::Int(42)]),
            " 3.14|7   |0042"
        );
        let ints = [Value::Int(255), Value::Int(255), Value::Int(8), Value::Int(5)];
        assert_eq!(sprintf("%x %X %o %b", &ints), "ff FF 10 101");
        assert_eq!(sprintf("100%%", &[]), "100%");
    }

    #[test]
    fn test_sprintf_bad_and_missing() {
        assert_eq!(sprintf("%d", &[s("x")]), "%!d(string=x)");
        assert_eq!(sprintf("%s %s", &[s("a")]), "a %!s(MISSING)");
        assert_eq!(sprintf("%s", &[s("a"), Value::Int(1)]), "a%!(EXTRA int=1)");
        assert_eq!(sprintf("%s", &[Value::Int(5)]), "%!s(int=5)");
        assert_eq!(sprintf("%d", &[Value::Nil]), "%!d(<nil>)");
    }

    #[test]
    fn test_sprintf_collections() {
        let list = Value::from_list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(sprintf("%d", &[list.clone()]), "[1 2]");
        assert_eq!(sprintf("%v", &[list]), "[1 2]");
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(100000.0, 'g', None, false), "100000");
        assert_eq!(format_float(1000000.0, 'g', None, false), "1e+06");
        assert_eq!(format_float(0.0001, 'g', None, false), "0.0001");
        assert_eq!(format_float(0.00001, 'g', None, false), "1e-05");
        assert_eq!(format_float(-2.5, 'g', None, false), "-2.5");
        assert_eq!(format_float(0.0, 'g', None, false), "0");
        assert_eq!(format_float(123456.0, 'g', Some(3), false), "1.23e+05");
        assert_eq!(format_float(1234.5678, 'e', Some(2), false), "1.23e+03");
        assert_eq!(format_float(2.0, 'f', None, false), "2.000000");
    }

    #[test]
    fn test_sprint_spacing() {
        assert_eq!(sprint(&[s("a"), Value::Int(1), Value::Int(2), s("b")]), "a1 2b");
        assert_eq!(sprintln(&[s("a"), Value::Int(1)]), "a 1\n");
    }
}
