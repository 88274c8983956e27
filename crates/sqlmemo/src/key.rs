//! Cache keys for memoized calls.
//!
//! A call's arguments are captured as [`Args`]: positional values plus a
//! sorted keyword map, each remembered with its Rust type name. A
//! [`KeyFunction`] turns them into the key parts stored after the function
//! identity.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CacheError, Result};

/// One captured argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub value: Value,
    pub type_name: &'static str,
}

impl Arg {
    fn new<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self {
            value: serde_json::to_value(value).map_err(|e| CacheError::codec("encode", e))?,
            type_name: type_name_of::<T>(),
        })
    }
}

/// Arguments of a memoized call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Arg>,
    keyword: BTreeMap<String, Arg>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.push(value)?;
        Ok(self)
    }

    /// Set a keyword argument.
    pub fn kwarg<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Result<Self> {
        self.keyword.insert(name.into(), Arg::new(value)?);
        Ok(self)
    }

    /// Append a positional argument in place.
    pub fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.positional.push(Arg::new(value)?);
        Ok(())
    }

    pub fn positional(&self) -> &[Arg] {
        &self.positional
    }

    /// Keyword arguments, sorted by name.
    pub fn keyword(&self) -> &BTreeMap<String, Arg> {
        &self.keyword
    }

    /// Type names of positional and keyword arguments (keywords by name).
    pub fn type_names(&self) -> (Vec<&'static str>, Vec<&'static str>) {
        (
            self.positional.iter().map(|a| a.type_name).collect(),
            self.keyword.values().map(|a| a.type_name).collect(),
        )
    }
}

/// Conversion of call arguments into [`Args`].
///
/// Implemented for `()`, tuples of up to eight serializable values, and
/// [`Args`] itself for calls with keyword arguments.
pub trait IntoArgs {
    fn to_args(&self) -> Result<Args>;
}

impl IntoArgs for Args {
    fn to_args(&self) -> Result<Args> {
        Ok(self.clone())
    }
}

impl IntoArgs for () {
    fn to_args(&self) -> Result<Args> {
        Ok(Args::new())
    }
}

impl<T: IntoArgs + ?Sized> IntoArgs for &T {
    fn to_args(&self) -> Result<Args> {
        (**self).to_args()
    }
}

macro_rules! impl_into_args_for_tuple {
    ($($name:ident),+) => {
        impl<$($name: Serialize),+> IntoArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_args(&self) -> Result<Args> {
                let ($($name,)+) = self;
                let mut args = Args::new();
                $(args.push($name)?;)+
                Ok(args)
            }
        }
    };
}

impl_into_args_for_tuple!(A);
impl_into_args_for_tuple!(A, B);
impl_into_args_for_tuple!(A, B, C);
impl_into_args_for_tuple!(A, B, C, D);
impl_into_args_for_tuple!(A, B, C, D, E);
impl_into_args_for_tuple!(A, B, C, D, E, F);
impl_into_args_for_tuple!(A, B, C, D, E, F, G);
impl_into_args_for_tuple!(A, B, C, D, E, F, G, H);

/// Builds key parts from call arguments.
pub trait KeyFunction: Send + Sync {
    fn make_key(&self, args: &Args) -> Vec<Value>;
}

impl<F> KeyFunction for F
where
    F: Fn(&Args) -> Vec<Value> + Send + Sync,
{
    fn make_key(&self, args: &Args) -> Vec<Value> {
        self(args)
    }
}

/// Value-based key: see [`make_key`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKey;

impl KeyFunction for DefaultKey {
    fn make_key(&self, args: &Args) -> Vec<Value> {
        make_key(args)
    }
}

/// Default key parts for a call.
///
/// Positional values alone when there are no keyword arguments, otherwise
/// `[[positional...], name1, value1, name2, value2, ...]` with names
/// sorted. Numbers are compared by value, so `1` and `1.0` give the same
/// key.
pub fn make_key(args: &Args) -> Vec<Value> {
    let positional = args
        .positional
        .iter()
        .map(|a| normalize(a.value.clone()));

    if args.keyword.is_empty() {
        return positional.collect();
    }

    let mut key = vec![Value::Array(positional.collect())];
    for (name, arg) in &args.keyword {
        key.push(Value::String(name.clone()));
        key.push(normalize(arg.value.clone()));
    }
    key
}

/// Key parts appended for type-differentiated caches.
pub fn type_key(args: &Args) -> Vec<Value> {
    let (positional, keyword) = args.type_names();
    vec![
        Value::from(positional),
        Value::from(keyword),
    ]
}

/// Collapse integral floats to integers, recursively.
fn normalize(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f)
                if n.is_f64()
                    && f.fract() == 0.0
                    && f >= i64::MIN as f64
                    && f < i64::MAX as f64 =>
            {
                Value::from(f as i64)
            }
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, normalize(v))).collect())
        }
        other => other,
    }
}

/// Type name used in typed keys.
pub fn type_name_of<T: ?Sized>() -> &'static str {
    std::any::type_name::<T>()
}

/// Identity of a function used as the first key part.
///
/// Function items give their full path. Closures all render as
/// `...::{{closure}}` within one function, so give those an explicit name.
pub fn function_name<F: ?Sized>() -> &'static str {
    std::any::type_name::<F>()
}
