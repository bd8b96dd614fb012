use pdp_engine::content::{ContentItem, ContentSubItem, LocalContent, LocalContentStorage};
use pdp_engine::core::{BasicAlgorithm, CombiningAlgorithm, Mapper, MapperOrder};
use pdp_engine::policy::{AllOf, AnyOf, Match, Target};
use pdp_engine::selector::LocalSelector;
use pdp_engine::{
    AttributeAssignment, AttributeValue, Context, Effect, Expression, FunctionRegistry, Policy,
    PolicySet, Response, Rule, Type,
};
use std::sync::Arc;

fn s(v: &str) -> AttributeValue {
    AttributeValue::String(v.into())
}

fn tagged(id: &str, effect: Effect) -> Rule {
    Rule::builder(id)
        .effect(effect)
        .obligation(AttributeAssignment::with_value("o", s(id)))
        .build()
        .unwrap()
}

fn equal(id: &str, v: &str) -> Match {
    Match::make(
        &FunctionRegistry::default(),
        "equal",
        Expression::designator(id, Type::String),
        Expression::value(s(v)),
    )
    .unwrap()
}

fn obligations(r: &Response, ctx: &Context) -> Vec<String> {
    r.obligations
        .iter()
        .map(|o| o.calculate(ctx).unwrap().str().unwrap().to_string())
        .collect()
}

fn mapper_policy(order: MapperOrder) -> Policy {
    Policy::builder("mapper")
        .algorithm(CombiningAlgorithm::Mapper(
            Mapper::new(Expression::designator("ids", Type::ListOfStrings))
                .algorithm(BasicAlgorithm::FirstApplicableEffect)
                .order(order),
        ))
        .rule(tagged("first", Effect::Permit))
        .rule(tagged("second", Effect::Permit))
        .rule(tagged("third", Effect::Permit))
        .build()
        .unwrap()
}

#[test]
fn test_mapper_ordering() {
    let ctx = Context::from_values(
        None,
        [("ids", AttributeValue::list_of_strings(["third", "first", "second"]))],
    )
    .unwrap();

    let r = mapper_policy(MapperOrder::Internal).calculate(&ctx);
    assert_eq!(r.effect, Effect::Permit);
    assert_eq!(obligations(&r, &ctx), ["first"]);

    let r = mapper_policy(MapperOrder::External).calculate(&ctx);
    assert_eq!(r.effect, Effect::Permit);
    assert_eq!(obligations(&r, &ctx), ["third"]);
}

#[test]
fn test_deny_overrides_keeps_deciding_obligations() {
    let p = Policy::builder("p")
        .algorithm(BasicAlgorithm::DenyOverrides)
        .rule(tagged("p1", Effect::Permit))
        .rule(tagged("d1", Effect::Deny))
        .rule(tagged("p2", Effect::Permit))
        .rule(tagged("d2", Effect::Deny))
        .build()
        .unwrap();

    let ctx = Context::empty();
    let r = p.calculate(&ctx);
    assert_eq!(r.effect, Effect::Deny);
    assert_eq!(obligations(&r, &ctx), ["d1"]);
}

#[test]
fn test_deny_overrides_indeterminate_mix() {
    let broken_deny = Rule::builder("broken")
        .effect(Effect::Deny)
        .condition(Expression::designator("flag", Type::Boolean))
        .build()
        .unwrap();

    let p = Policy::builder("p")
        .algorithm(BasicAlgorithm::DenyOverrides)
        .rule(broken_deny)
        .rule(tagged("permit", Effect::Permit))
        .build()
        .unwrap();

    let r = p.calculate(&Context::empty());
    assert_eq!(r.effect, Effect::IndeterminateDP);
    assert!(r.obligations.is_empty());
    assert!(r.status.is_some());
}

#[test]
fn test_target_short_circuit() {
    let target = Target::new(vec![AnyOf::new(vec![
        AllOf::new(vec![equal("s", "a")]),
        AllOf::new(vec![equal("missing", "x")]),
    ])]);
    let rule = Rule::builder("r")
        .target(target)
        .effect(Effect::Permit)
        .build()
        .unwrap();

    let ctx = Context::from_values(None, [("s", s("a"))]).unwrap();
    let r = rule.calculate(&ctx);
    assert_eq!(r.effect, Effect::Permit);
    assert!(r.status.is_none());

    let ctx = Context::from_values(None, [("s", s("b"))]).unwrap();
    let r = rule.calculate(&ctx);
    assert_eq!(r.effect, Effect::IndeterminateP);
    assert!(r.status.unwrap().to_string().contains("Missing attribute"));
}

#[test]
fn test_policy_set_obligations_only_for_decisive_effect() {
    let set = PolicySet::builder("set")
        .algorithm(BasicAlgorithm::FirstApplicableEffect)
        .obligation(AttributeAssignment::with_value("o", s("set")))
        .policy(
            Policy::builder("p")
                .target(Target::new(vec![AnyOf::new(vec![AllOf::new(vec![equal(
                    "s", "go",
                )])])]))
                .rule(tagged("r", Effect::Permit))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let ctx = Context::from_values(None, [("s", s("go"))]).unwrap();
    let r = set.calculate(&ctx);
    assert_eq!(r.effect, Effect::Permit);
    assert_eq!(obligations(&r, &ctx), ["r", "set"]);

    let ctx = Context::from_values(None, [("s", s("stop"))]).unwrap();
    let r = set.calculate(&ctx);
    assert_eq!(r.effect, Effect::NotApplicable);
    assert!(r.obligations.is_empty());
}

#[test]
fn test_selector_condition() {
    let registry = FunctionRegistry::default();
    let role = LocalSelector::new(
        "acl",
        "roles",
        vec![Expression::designator("user", Type::String)],
        Type::String,
    );
    let condition = registry
        .make(
            "equal",
            vec![
                Expression::LocalSelector(Arc::new(role)),
                Expression::value(s("admin")),
            ],
        )
        .unwrap();

    let rule = Rule::builder("admins")
        .condition(condition)
        .effect(Effect::Permit)
        .build()
        .unwrap();

    let item = ContentItem::new(
        Type::String,
        vec![Type::String],
        ContentSubItem::string_map([
            ("alice", ContentSubItem::value(s("admin"))),
            ("bob", ContentSubItem::value(s("guest"))),
        ]),
    )
    .unwrap();
    let content = Arc::new(LocalContentStorage::new([LocalContent::new(
        "acl",
        None,
        [("roles", item)],
    )]));

    let ctx = |user: &str| Context::from_values(Some(content.clone()), [("user", s(user))]).unwrap();

    assert_eq!(rule.calculate(&ctx("alice")).effect, Effect::Permit);
    assert_eq!(rule.calculate(&ctx("bob")).effect, Effect::NotApplicable);

    let r = rule.calculate(&ctx("eve"));
    assert_eq!(r.effect, Effect::IndeterminateP);
    assert!(r.status.unwrap().to_string().contains("Missing value"));
}
