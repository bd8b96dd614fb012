use super::wildcard::wildcard_match;
use super::Expression;
use crate::context::Context;
use crate::error::{Error, ErrorContext, ErrorKind, Result};
use crate::types::Type;
use crate::value::{AttributeValue, StringSet};
use regex::Regex;
use std::sync::Arc;

/// Function implementation picked by the registry for concrete argument
/// types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// equal(String, String)
    StringEqual,
    /// equal(Integer, Integer)
    IntegerEqual,
    /// equal(Float, Float)
    FloatEqual,
    /// equal(List of Strings, List of Strings)
    ListOfStringsEqual,
    /// equal(Set of Strings, Set of Strings)
    SetOfStringsEqual,
    /// greater(Integer, Integer)
    IntegerGreater,
    /// greater(Float, Float)
    FloatGreater,
    /// add(Integer, Integer)
    IntegerAdd,
    /// add(Float, Float)
    FloatAdd,
    /// subtract(Integer, Integer)
    IntegerSubtract,
    /// subtract(Float, Float)
    FloatSubtract,
    /// multiply(Integer, Integer)
    IntegerMultiply,
    /// multiply(Float, Float)
    FloatMultiply,
    /// divide(Integer, Integer)
    IntegerDivide,
    /// divide(Float, Float)
    FloatDivide,
    /// contains(String, String)
    StringContains,
    /// contains(List of Strings, String)
    ListOfStringsContains,
    /// contains(Network, Address)
    NetworkContainsAddress,
    /// contains(Set of Strings, String)
    SetOfStringsContains,
    /// contains(Set of Networks, Address)
    SetOfNetworksContainsAddress,
    /// contains(Set of Domains, Domain)
    SetOfDomainsContains,
    /// not(Boolean)
    BooleanNot,
    /// or(Boolean, Boolean, ...)
    BooleanOr,
    /// and(Boolean, Boolean, ...)
    BooleanAnd,
    /// range(Integer, Integer, Integer)
    IntegerRange,
    /// range(Float, Float, Float)
    FloatRange,
    /// "list of strings"(String | Set of Strings | List of Strings)
    ListOfStrings,
    /// intersect(List of Strings, List of Strings)
    ListOfStringsIntersect,
    /// intersect(Set of Strings, Set of Strings)
    SetOfStringsIntersect,
    /// len(List of Strings)
    ListOfStringsLen,
    /// len(Set of Strings)
    SetOfStringsLen,
    /// concat(String | Set of Strings | List of Strings, ...)
    Concat,
    /// try(T, T, ...)
    Try,
    /// regex-match(String, String)
    RegexMatch,
    /// wildcard-match(String, String)
    WildcardMatch,
    /// regex-any-match over patterns or strings
    RegexAnyMatch,
    /// regex-all-match over patterns or strings
    RegexAllMatch,
    /// wildcard-any-match over patterns or strings
    WildcardAnyMatch,
    /// wildcard-all-match over patterns or strings
    WildcardAllMatch,
}

impl FunctionKind {
    /// Function name as used in policies.
    pub fn name(&self) -> &'static str {
        use FunctionKind::*;
        match self {
            StringEqual | IntegerEqual | FloatEqual | ListOfStringsEqual | SetOfStringsEqual => {
                "equal"
            }
            IntegerGreater | FloatGreater => "greater",
            IntegerAdd | FloatAdd => "add",
            IntegerSubtract | FloatSubtract => "subtract",
            IntegerMultiply | FloatMultiply => "multiply",
            IntegerDivide | FloatDivide => "divide",
            StringContains
            | ListOfStringsContains
            | NetworkContainsAddress
            | SetOfStringsContains
            | SetOfNetworksContainsAddress
            | SetOfDomainsContains => "contains",
            BooleanNot => "not",
            BooleanOr => "or",
            BooleanAnd => "and",
            IntegerRange | FloatRange => "range",
            ListOfStrings => "list of strings",
            ListOfStringsIntersect | SetOfStringsIntersect => "intersect",
            ListOfStringsLen | SetOfStringsLen => "len",
            Concat => "concat",
            Try => "try",
            RegexMatch => "regex-match",
            WildcardMatch => "wildcard-match",
            RegexAnyMatch => "regex-any-match",
            RegexAllMatch => "regex-all-match",
            WildcardAnyMatch => "wildcard-any-match",
            WildcardAllMatch => "wildcard-all-match",
        }
    }

    /// Result type for the given argument types.
    pub fn result_type(&self, args: &[Type]) -> Type {
        use FunctionKind::*;
        match self {
            IntegerAdd | IntegerSubtract | IntegerMultiply | IntegerDivide => Type::Integer,
            FloatAdd | FloatSubtract | FloatMultiply | FloatDivide => Type::Float,
            IntegerRange | FloatRange => Type::String,
            ListOfStrings | ListOfStringsIntersect | Concat => Type::ListOfStrings,
            SetOfStringsIntersect => Type::SetOfStrings,
            ListOfStringsLen | SetOfStringsLen => Type::Integer,
            Try => args.first().cloned().unwrap_or(Type::Undefined),
            _ => Type::Boolean,
        }
    }
}

/// Function bound to its argument expressions.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    kind: FunctionKind,
    args: Vec<Expression>,
    result: Type,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| {
        Error::new(ErrorKind::InvalidRegexPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
    })
}

fn regex_match(pattern: &str, s: &str) -> Result<bool> {
    Ok(compile(pattern)?.is_match(s))
}

fn strings_of(v: &AttributeValue) -> Result<Vec<String>> {
    match v {
        AttributeValue::String(s) => Ok(vec![s.clone()]),
        AttributeValue::SetOfStrings(s) => Ok(s
            .iter_sorted_by_insertion()
            .into_iter()
            .map(str::to_string)
            .collect()),
        AttributeValue::ListOfStrings(l) => Ok(l.as_ref().clone()),
        v => Err(Error::attribute_value_type(Type::ListOfStrings, v.get_result_type())
            .bind(v.describe())),
    }
}

fn collection_items(v: &AttributeValue) -> Result<Vec<&str>> {
    match v {
        AttributeValue::SetOfStrings(s) => Ok(s.iter_by_key().collect()),
        AttributeValue::ListOfStrings(l) => Ok(l.iter().map(String::as_str).collect()),
        v => Err(Error::attribute_value_type(Type::ListOfStrings, v.get_result_type())
            .bind(v.describe())),
    }
}

impl FunctionCall {
    pub(crate) fn new(kind: FunctionKind, args: Vec<Expression>) -> Self {
        let types: Vec<Type> = args.iter().map(Expression::get_result_type).collect();
        let result = kind.result_type(&types);
        Self { kind, args, result }
    }

    /// Implementation of the call.
    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// Argument expressions.
    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    /// Result type.
    pub fn get_result_type(&self) -> &Type {
        &self.result
    }

    /// Calculate the call. Errors are bound to the argument and then to the
    /// function name.
    pub fn calculate(&self, ctx: &Context) -> Result<AttributeValue> {
        self.calculate_inner(ctx).bind(self.kind.name())
    }

    fn pair(&self, ctx: &Context) -> Result<(AttributeValue, AttributeValue)> {
        let first = self.args[0].calculate_arg(ctx, "first argument")?;
        let second = self.args[1].calculate_arg(ctx, "second argument")?;
        Ok((first, second))
    }

    fn calculate_inner(&self, ctx: &Context) -> Result<AttributeValue> {
        use FunctionKind::*;
        let first = "first argument";
        let second = "second argument";

        match self.kind {
            StringEqual => {
                let (a, b) = self.pair(ctx)?;
                Ok(AttributeValue::Boolean(a.str().bind(first)? == b.str().bind(second)?))
            }
            IntegerEqual => {
                let (a, b) = self.pair(ctx)?;
                Ok(AttributeValue::Boolean(
                    a.integer().bind(first)? == b.integer().bind(second)?,
                ))
            }
            FloatEqual => {
                let (a, b) = self.pair(ctx)?;
                Ok(AttributeValue::Boolean(a.float().bind(first)? == b.float().bind(second)?))
            }
            ListOfStringsEqual => {
                let (a, b) = self.pair(ctx)?;
                Ok(AttributeValue::Boolean(
                    a.list_of_strings_value().bind(first)? == b.list_of_strings_value().bind(second)?,
                ))
            }
            SetOfStringsEqual => {
                let (a, b) = self.pair(ctx)?;
                let a = a.set_of_strings_value().bind(first)?;
                let b = b.set_of_strings_value().bind(second)?;
                Ok(AttributeValue::Boolean(
                    a.len() == b.len() && a.iter_by_key().all(|s| b.contains(s)),
                ))
            }

            IntegerGreater => {
                let (a, b) = self.pair(ctx)?;
                Ok(AttributeValue::Boolean(a.integer().bind(first)? > b.integer().bind(second)?))
            }
            FloatGreater => {
                let (a, b) = self.pair(ctx)?;
                Ok(AttributeValue::Boolean(a.float().bind(first)? > b.float().bind(second)?))
            }

            IntegerAdd | IntegerSubtract | IntegerMultiply | IntegerDivide => {
                let (a, b) = self.pair(ctx)?;
                let a = a.integer().bind(first)?;
                let b = b.integer().bind(second)?;
                let r = match self.kind {
                    IntegerAdd => a.wrapping_add(b),
                    IntegerSubtract => a.wrapping_sub(b),
                    IntegerMultiply => a.wrapping_mul(b),
                    _ => {
                        if b == 0 {
                            return Err(Error::new(ErrorKind::IntegerDivideByZero));
                        }
                        a.wrapping_div(b)
                    }
                };
                Ok(AttributeValue::Integer(r))
            }
            FloatAdd | FloatSubtract | FloatMultiply | FloatDivide => {
                let (a, b) = self.pair(ctx)?;
                let a = a.float().bind(first)?;
                let b = b.float().bind(second)?;
                let r = match self.kind {
                    FloatAdd => a + b,
                    FloatSubtract => a - b,
                    FloatMultiply => a * b,
                    _ => a / b,
                };
                Ok(AttributeValue::Float(r))
            }

            StringContains => {
                let (a, b) = self.pair(ctx)?;
                Ok(AttributeValue::Boolean(
                    a.str().bind(first)?.contains(b.str().bind(second)?),
                ))
            }
            ListOfStringsContains => {
                let (a, b) = self.pair(ctx)?;
                let b = b.str().bind(second)?;
                Ok(AttributeValue::Boolean(
                    a.list_of_strings_value().bind(first)?.iter().any(|s| s == b),
                ))
            }
            NetworkContainsAddress => {
                let (a, b) = self.pair(ctx)?;
                Ok(AttributeValue::Boolean(
                    a.network().bind(first)?.contains(&b.address().bind(second)?),
                ))
            }
            SetOfStringsContains => {
                let (a, b) = self.pair(ctx)?;
                Ok(AttributeValue::Boolean(
                    a.set_of_strings_value().bind(first)?.contains(b.str().bind(second)?),
                ))
            }
            SetOfNetworksContainsAddress => {
                let (a, b) = self.pair(ctx)?;
                let addr = b.address().bind(second)?;
                Ok(AttributeValue::Boolean(
                    a.set_of_networks_value().bind(first)?.get_by_addr(&addr).is_some(),
                ))
            }
            SetOfDomainsContains => {
                let (a, b) = self.pair(ctx)?;
                let d = b.domain().bind(second)?;
                Ok(AttributeValue::Boolean(
                    a.set_of_domains_value().bind(first)?.get(d).is_some(),
                ))
            }

            BooleanNot => {
                let v = self.args[0].calculate_arg(ctx, "argument")?;
                Ok(AttributeValue::Boolean(!v.boolean().bind("argument")?))
            }
            BooleanOr | BooleanAnd => {
                let stop = self.kind == BooleanOr;
                for (i, arg) in self.args.iter().enumerate() {
                    let name = format!("argument {}", i);
                    let v = arg.calculate_arg(ctx, &name)?;
                    if v.boolean().bind(name)? == stop {
                        return Ok(AttributeValue::Boolean(stop));
                    }
                }
                Ok(AttributeValue::Boolean(!stop))
            }

            IntegerRange => {
                let min = self.args[0].calculate_arg(ctx, "min argument")?;
                let max = self.args[1].calculate_arg(ctx, "max argument")?;
                let val = self.args[2].calculate_arg(ctx, "val argument")?;
                Ok(range(
                    min.integer().bind("min argument")?,
                    max.integer().bind("max argument")?,
                    val.integer().bind("val argument")?,
                ))
            }
            FloatRange => {
                let min = self.args[0].calculate_arg(ctx, "min argument")?;
                let max = self.args[1].calculate_arg(ctx, "max argument")?;
                let val = self.args[2].calculate_arg(ctx, "val argument")?;
                Ok(range(
                    min.float().bind("min argument")?,
                    max.float().bind("max argument")?,
                    val.float().bind("val argument")?,
                ))
            }

            ListOfStrings => {
                let v = self.args[0].calculate_arg(ctx, "argument")?;
                Ok(AttributeValue::list_of_strings(strings_of(&v).bind("argument")?))
            }
            ListOfStringsIntersect => {
                let (a, b) = self.pair(ctx)?;
                let b = b.list_of_strings_value().bind(second)?;
                let items = a
                    .list_of_strings_value()
                    .bind(first)?
                    .iter()
                    .filter(|s| b.contains(s))
                    .cloned();
                Ok(AttributeValue::list_of_strings(items))
            }
            SetOfStringsIntersect => {
                let (a, b) = self.pair(ctx)?;
                let b = b.set_of_strings_value().bind(second)?;
                let items: StringSet = a
                    .set_of_strings_value()
                    .bind(first)?
                    .iter_by_key()
                    .filter(|s| b.contains(s))
                    .collect();
                Ok(AttributeValue::SetOfStrings(Arc::new(items)))
            }
            ListOfStringsLen => {
                let v = self.args[0].calculate_arg(ctx, "argument")?;
                Ok(AttributeValue::Integer(
                    v.list_of_strings_value().bind("argument")?.len() as i64,
                ))
            }
            SetOfStringsLen => {
                let v = self.args[0].calculate_arg(ctx, "argument")?;
                Ok(AttributeValue::Integer(
                    v.set_of_strings_value().bind("argument")?.len() as i64,
                ))
            }
            Concat => {
                let mut out = Vec::new();
                for (i, arg) in self.args.iter().enumerate() {
                    let name = format!("argument {}", i);
                    let v = arg.calculate_arg(ctx, &name)?;
                    out.extend(strings_of(&v).bind(name)?);
                }
                Ok(AttributeValue::list_of_strings(out))
            }
            Try => {
                let mut errs = Vec::with_capacity(self.args.len());
                for (i, arg) in self.args.iter().enumerate() {
                    match arg.calculate(ctx) {
                        Ok(v) => return Ok(v),
                        Err(e) => errs.push(e.bind(format!("argument {}", i))),
                    }
                }
                Err(Error::multi(errs))
            }

            RegexMatch | WildcardMatch => {
                let p = self.args[0].calculate_arg(ctx, "pattern")?;
                let s = self.args[1].calculate_arg(ctx, "string")?;
                let p = p.str().bind("pattern")?;
                let s = s.str().bind("string")?;
                let ok = if self.kind == RegexMatch {
                    regex_match(p, s)?
                } else {
                    wildcard_match(p, s)?
                };
                Ok(AttributeValue::Boolean(ok))
            }
            RegexAnyMatch | RegexAllMatch | WildcardAnyMatch | WildcardAllMatch => {
                let all = matches!(self.kind, RegexAllMatch | WildcardAllMatch);
                let wildcard = matches!(self.kind, WildcardAnyMatch | WildcardAllMatch);
                let matcher = |p: &str, s: &str| {
                    if wildcard {
                        wildcard_match(p, s)
                    } else {
                        regex_match(p, s)
                    }
                };

                let pairs: Vec<(String, String)> = if self.args[0].get_result_type() == Type::String
                {
                    let p = self.args[0].calculate_arg(ctx, "pattern")?;
                    let ss = self.args[1].calculate_arg(ctx, "strings")?;
                    let p = p.str().bind("pattern")?;
                    collection_items(&ss)
                        .bind("strings")?
                        .into_iter()
                        .map(|s| (p.to_string(), s.to_string()))
                        .collect()
                } else {
                    let ps = self.args[0].calculate_arg(ctx, "patterns")?;
                    let s = self.args[1].calculate_arg(ctx, "string")?;
                    let s = s.str().bind("string")?;
                    collection_items(&ps)
                        .bind("patterns")?
                        .into_iter()
                        .map(|p| (p.to_string(), s.to_string()))
                        .collect()
                };

                for (p, s) in &pairs {
                    if matcher(p, s)? != all {
                        return Ok(AttributeValue::Boolean(!all));
                    }
                }
                Ok(AttributeValue::Boolean(all))
            }
        }
    }
}

fn range<T: PartialOrd>(min: T, max: T, val: T) -> AttributeValue {
    let s = if val < min {
        "Below"
    } else if max < val {
        "Above"
    } else {
        "Within"
    };
    AttributeValue::String(s.to_string())
}
