use super::function::{FunctionCall, FunctionKind};
use super::Expression;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{describe_types, Type};
use std::collections::HashMap;
use std::sync::Arc;

/// Picks a function implementation for the static argument types or
/// returns `None` if it doesn't accept them.
pub type ArgumentChecker = fn(&[Type]) -> Option<FunctionKind>;

/// Functions which may appear in a target match, as (name, first argument,
/// second argument) triples.
const TARGET_COMPATIBLE: [(&str, Type, Type); 6] = [
    ("equal", Type::String, Type::String),
    ("contains", Type::String, Type::String),
    ("contains", Type::Network, Type::Address),
    ("contains", Type::SetOfStrings, Type::String),
    ("contains", Type::SetOfNetworks, Type::Address),
    ("contains", Type::SetOfDomains, Type::Domain),
];

fn binary(args: &[Type], first: Type, second: Type, kind: FunctionKind) -> Option<FunctionKind> {
    match args {
        [a, b] if *a == first && *b == second => Some(kind),
        _ => None,
    }
}

fn all_of(args: &[Type], min: usize, t: Type, kind: FunctionKind) -> Option<FunctionKind> {
    if args.len() >= min && args.iter().all(|a| *a == t) {
        Some(kind)
    } else {
        None
    }
}

fn is_strings(t: &Type) -> bool {
    matches!(t, Type::String | Type::SetOfStrings | Type::ListOfStrings)
}

fn is_string_collection(t: &Type) -> bool {
    matches!(t, Type::SetOfStrings | Type::ListOfStrings)
}

fn pattern_pair(args: &[Type], kind: FunctionKind) -> Option<FunctionKind> {
    match args {
        [p, s] if is_string_collection(p) && *s == Type::String => Some(kind),
        [p, s] if *p == Type::String && is_string_collection(s) => Some(kind),
        _ => None,
    }
}

/// Registry of functions keyed by name.
///
/// Each name maps to an ordered list of argument checkers. The first checker
/// accepting the argument types picks the implementation.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Vec<ArgumentChecker>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Add a checker for the function name. Checkers registered earlier
    /// take precedence.
    pub fn register(&mut self, name: impl Into<String>, checker: ArgumentChecker) {
        self.functions.entry(name.into()).or_default().push(checker);
    }

    /// Check if any checker is registered for the name.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Names of registered functions.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Bind the function to the argument expressions.
    pub fn make(&self, name: &str, args: Vec<Expression>) -> Result<Expression> {
        let types: Vec<Type> = args.iter().map(Expression::get_result_type).collect();
        let kind = self
            .functions
            .get(name)
            .and_then(|checkers| checkers.iter().find_map(|check| check(&types)))
            .ok_or_else(|| {
                Error::new(ErrorKind::FunctionCast {
                    name: name.to_string(),
                    arguments: describe_types(&types),
                })
            })?;

        Ok(Expression::Function(Arc::new(FunctionCall::new(kind, args))))
    }

    /// Bind a function usable in a target match.
    pub fn make_match(&self, name: &str, first: Expression, second: Expression) -> Result<Expression> {
        let a = first.get_result_type();
        let b = second.get_result_type();
        let compatible = TARGET_COMPATIBLE
            .iter()
            .any(|(n, x, y)| *n == name && *x == a && *y == b);
        if !compatible {
            return Err(Error::new(ErrorKind::MatchFunctionCast {
                name: name.to_string(),
                first: a.name().to_string(),
                second: b.name().to_string(),
            }));
        }

        self.make(name, vec![first, second])
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        use FunctionKind::*;

        let mut r = Self::empty();

        r.register("equal", |a| binary(a, Type::String, Type::String, StringEqual));
        r.register("equal", |a| binary(a, Type::Integer, Type::Integer, IntegerEqual));
        r.register("equal", |a| binary(a, Type::Float, Type::Float, FloatEqual));
        r.register("equal", |a| {
            binary(a, Type::ListOfStrings, Type::ListOfStrings, ListOfStringsEqual)
        });
        r.register("equal", |a| {
            binary(a, Type::SetOfStrings, Type::SetOfStrings, SetOfStringsEqual)
        });

        r.register("greater", |a| binary(a, Type::Integer, Type::Integer, IntegerGreater));
        r.register("greater", |a| binary(a, Type::Float, Type::Float, FloatGreater));

        r.register("add", |a| binary(a, Type::Integer, Type::Integer, IntegerAdd));
        r.register("add", |a| binary(a, Type::Float, Type::Float, FloatAdd));
        r.register("subtract", |a| binary(a, Type::Integer, Type::Integer, IntegerSubtract));
        r.register("subtract", |a| binary(a, Type::Float, Type::Float, FloatSubtract));
        r.register("multiply", |a| binary(a, Type::Integer, Type::Integer, IntegerMultiply));
        r.register("multiply", |a| binary(a, Type::Float, Type::Float, FloatMultiply));
        r.register("divide", |a| binary(a, Type::Integer, Type::Integer, IntegerDivide));
        r.register("divide", |a| binary(a, Type::Float, Type::Float, FloatDivide));

        r.register("contains", |a| binary(a, Type::String, Type::String, StringContains));
        r.register("contains", |a| {
            binary(a, Type::ListOfStrings, Type::String, ListOfStringsContains)
        });
        r.register("contains", |a| {
            binary(a, Type::Network, Type::Address, NetworkContainsAddress)
        });
        r.register("contains", |a| {
            binary(a, Type::SetOfStrings, Type::String, SetOfStringsContains)
        });
        r.register("contains", |a| {
            binary(a, Type::SetOfNetworks, Type::Address, SetOfNetworksContainsAddress)
        });
        r.register("contains", |a| {
            binary(a, Type::SetOfDomains, Type::Domain, SetOfDomainsContains)
        });

        r.register("not", |a| match a {
            [Type::Boolean] => Some(BooleanNot),
            _ => None,
        });
        r.register("or", |a| all_of(a, 2, Type::Boolean, BooleanOr));
        r.register("and", |a| all_of(a, 2, Type::Boolean, BooleanAnd));

        r.register("range", |a| all_of(a, 3, Type::Integer, IntegerRange).filter(|_| a.len() == 3));
        r.register("range", |a| all_of(a, 3, Type::Float, FloatRange).filter(|_| a.len() == 3));

        r.register("list of strings", |a| match a {
            [t] if is_strings(t) => Some(ListOfStrings),
            _ => None,
        });
        r.register("intersect", |a| {
            binary(a, Type::ListOfStrings, Type::ListOfStrings, ListOfStringsIntersect)
        });
        r.register("intersect", |a| {
            binary(a, Type::SetOfStrings, Type::SetOfStrings, SetOfStringsIntersect)
        });
        r.register("len", |a| match a {
            [Type::ListOfStrings] => Some(ListOfStringsLen),
            [Type::SetOfStrings] => Some(SetOfStringsLen),
            _ => None,
        });
        r.register("concat", |a| {
            if !a.is_empty() && a.iter().all(is_strings) {
                Some(Concat)
            } else {
                None
            }
        });
        r.register("try", |a| match a.split_first() {
            Some((first, rest)) if rest.iter().all(|t| t.matches(first)) => Some(Try),
            _ => None,
        });

        r.register("regex-match", |a| binary(a, Type::String, Type::String, RegexMatch));
        r.register("wildcard-match", |a| {
            binary(a, Type::String, Type::String, WildcardMatch)
        });
        r.register("regex-any-match", |a| pattern_pair(a, RegexAnyMatch));
        r.register("regex-all-match", |a| pattern_pair(a, RegexAllMatch));
        r.register("wildcard-any-match", |a| pattern_pair(a, WildcardAnyMatch));
        r.register("wildcard-all-match", |a| pattern_pair(a, WildcardAllMatch));

        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::value::{AttributeValue, DomainName, Network};

    fn lit(v: AttributeValue) -> Expression {
        Expression::Value(v)
    }

    fn s(v: &str) -> Expression {
        lit(AttributeValue::String(v.to_string()))
    }

    fn int(n: i64) -> Expression {
        lit(AttributeValue::Integer(n))
    }

    fn eval(r: &FunctionRegistry, name: &str, args: Vec<Expression>) -> Result<AttributeValue> {
        let ctx = Context::empty();
        r.make(name, args)?.calculate(&ctx)
    }

    #[test]
    fn test_function_cast() {
        let r = FunctionRegistry::default();
        let err = r.make("equal", vec![s("a"), int(1)]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "#23: Can't find function equal which takes String, Integer"
        );
        assert!(r.make("unknown", vec![]).is_err());
        assert!(r.make("and", vec![lit(AttributeValue::Boolean(true))]).is_err());
    }

    #[test]
    fn test_arithmetic() {
        let r = FunctionRegistry::default();
        assert_eq!(eval(&r, "add", vec![int(2), int(3)]).unwrap().integer().unwrap(), 5);
        assert_eq!(
            eval(&r, "add", vec![int(i64::MAX), int(1)]).unwrap().integer().unwrap(),
            i64::MIN
        );
        assert_eq!(eval(&r, "divide", vec![int(7), int(2)]).unwrap().integer().unwrap(), 3);

        let err = eval(&r, "divide", vec![int(1), int(0)]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IntegerDivideByZero));
        assert_eq!(err.path(), &["divide".to_string()]);

        let f = |x: f64| lit(AttributeValue::Float(x));
        assert_eq!(eval(&r, "divide", vec![f(1.0), f(4.0)]).unwrap().float().unwrap(), 0.25);
        assert!(eval(&r, "greater", vec![f(2.0), f(1.0)]).unwrap().boolean().unwrap());
    }

    #[test]
    fn test_range() {
        let r = FunctionRegistry::default();
        let range = |v| eval(&r, "range", vec![int(1), int(10), int(v)]).unwrap();
        assert_eq!(range(0).str().unwrap(), "Below");
        assert_eq!(range(5).str().unwrap(), "Within");
        assert_eq!(range(10).str().unwrap(), "Within");
        assert_eq!(range(11).str().unwrap(), "Above");
        assert!(r.make("range", vec![int(1), int(2)]).is_err());
    }

    #[test]
    fn test_logical_short_circuit() {
        let r = FunctionRegistry::default();
        let t = lit(AttributeValue::Boolean(true));
        let f = lit(AttributeValue::Boolean(false));
        let missing = Expression::designator("missing", Type::Boolean);

        assert!(eval(&r, "or", vec![t.clone(), missing.clone()]).unwrap().boolean().unwrap());
        assert!(!eval(&r, "and", vec![f.clone(), missing.clone()]).unwrap().boolean().unwrap());

        let err = eval(&r, "and", vec![t.clone(), missing]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "#02 (and>argument 1>attr(missing.Boolean)): Missing attribute"
        );
        assert!(!eval(&r, "not", vec![t]).unwrap().boolean().unwrap());
    }

    #[test]
    fn test_equal_and_contains() {
        let r = FunctionRegistry::default();
        assert!(eval(&r, "equal", vec![s("x"), s("x")]).unwrap().boolean().unwrap());
        assert!(eval(&r, "contains", vec![s("foobar"), s("oba")]).unwrap().boolean().unwrap());

        let list = lit(AttributeValue::list_of_strings(["a", "b"]));
        assert!(eval(&r, "contains", vec![list.clone(), s("b")]).unwrap().boolean().unwrap());
        assert!(!eval(&r, "contains", vec![list, s("c")]).unwrap().boolean().unwrap());

        let set_a = lit(AttributeValue::set_of_strings(["a", "b"]));
        let set_b = lit(AttributeValue::set_of_strings(["b", "a"]));
        assert!(eval(&r, "equal", vec![set_a, set_b]).unwrap().boolean().unwrap());

        let nets: Vec<Network> = vec!["10.0.0.0/8".parse().unwrap()];
        let addr = |a: &str| lit(AttributeValue::Address(a.parse().unwrap()));
        let set = lit(AttributeValue::set_of_networks(&nets));
        assert!(eval(&r, "contains", vec![set.clone(), addr("10.2.3.4")]).unwrap().boolean().unwrap());
        assert!(!eval(&r, "contains", vec![set, addr("11.2.3.4")]).unwrap().boolean().unwrap());

        let zones = vec![DomainName::new("example.com").unwrap()];
        let domains = lit(AttributeValue::set_of_domains(&zones));
        let host = lit(AttributeValue::Domain(DomainName::new("www.example.com").unwrap()));
        assert!(eval(&r, "contains", vec![domains, host]).unwrap().boolean().unwrap());
    }

    #[test]
    fn test_collections() {
        let r = FunctionRegistry::default();
        let set = lit(AttributeValue::set_of_strings(["z", "a"]));
        let list = lit(AttributeValue::list_of_strings(["q", "a", "z"]));

        let v = eval(&r, "list of strings", vec![set.clone()]).unwrap();
        assert_eq!(v.list_of_strings_value().unwrap(), &["z".to_string(), "a".to_string()]);

        let v = eval(&r, "concat", vec![s("x"), set.clone(), list.clone()]).unwrap();
        assert_eq!(v.serialize().unwrap(), "\"x\",\"z\",\"a\",\"q\",\"a\",\"z\"");

        let other = lit(AttributeValue::list_of_strings(["z", "q"]));
        let v = eval(&r, "intersect", vec![list.clone(), other]).unwrap();
        assert_eq!(v.serialize().unwrap(), "\"q\",\"z\"");

        assert_eq!(eval(&r, "len", vec![list]).unwrap().integer().unwrap(), 3);
        assert_eq!(eval(&r, "len", vec![set]).unwrap().integer().unwrap(), 2);
    }

    #[test]
    fn test_try() {
        let r = FunctionRegistry::default();
        let missing = Expression::designator("missing", Type::String);

        let v = eval(&r, "try", vec![missing.clone(), s("fallback")]).unwrap();
        assert_eq!(v.str().unwrap(), "fallback");

        let err = eval(&r, "try", vec![missing.clone(), missing]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Multi(errs) if errs.len() == 2));
        assert_eq!(err.path(), &["try".to_string()]);
        assert!(r.make("try", vec![s("a"), int(1)]).is_err());
    }

    #[test]
    fn test_pattern_functions() {
        let r = FunctionRegistry::default();
        assert!(eval(&r, "regex-match", vec![s("^ab+c$"), s("abbc")]).unwrap().boolean().unwrap());
        assert!(eval(&r, "wildcard-match", vec![s("a*c"), s("abbc")]).unwrap().boolean().unwrap());

        let err = eval(&r, "regex-match", vec![s("("), s("x")]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidRegexPattern { .. }));

        let patterns = lit(AttributeValue::list_of_strings(["^x", "b$"]));
        assert!(eval(&r, "regex-any-match", vec![patterns.clone(), s("ab")]).unwrap().boolean().unwrap());
        assert!(!eval(&r, "regex-all-match", vec![patterns, s("ab")]).unwrap().boolean().unwrap());

        let strings = lit(AttributeValue::set_of_strings(["www.a.com", "mail.a.com"]));
        assert!(eval(&r, "wildcard-all-match", vec![s("*.a.com"), strings.clone()]).unwrap().boolean().unwrap());
        assert!(!eval(&r, "wildcard-any-match", vec![s("ftp.*"), strings]).unwrap().boolean().unwrap());
    }

    #[test]
    fn test_make_match() {
        let r = FunctionRegistry::default();
        let attr = Expression::designator("s", Type::String);
        assert!(r.make_match("equal", attr.clone(), s("x")).is_ok());

        let list = Expression::designator("l", Type::ListOfStrings);
        let err = r.make_match("contains", list, s("x")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MatchFunctionCast { .. }));
        assert!(r.make_match("greater", int(1), int(2)).is_err());
    }
}
