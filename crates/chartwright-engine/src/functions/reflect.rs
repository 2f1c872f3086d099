//! Type inspection

use super::{Registry, arg_str};
use crate::value::Value;

pub(super) fn register(r: &mut Registry) {
    r.fixed("typeOf", 1, |a| Ok(a[0].type_name().into()));
    r.fixed("kindOf", 1, |a| Ok(a[0].kind_name().into()));
    r.fixed("typeIs", 2, |a| Ok((arg_str(a, 0)? == a[1].type_name()).into()));
    r.fixed("typeIsLike", 2, |a| {
        let target = arg_str(a, 0)?;
        let actual = a[1].type_name();
        Ok((target == actual || target.strip_prefix('*') == Some(actual)).into())
    });
    r.fixed("kindIs", 2, |a| Ok((arg_str(a, 0)? == a[1].kind_name()).into()));
    r.fixed("deepEqual", 2, |a| Ok(Value::Bool(a[0].deep_equal(&a[1]))));
}
