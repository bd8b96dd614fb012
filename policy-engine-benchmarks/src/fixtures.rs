//! Sample policies, content and requests shared by the adapters and the
//! criterion benches.

use pdp_engine::content::{ContentItem, ContentSubItem, LocalContent, LocalContentStorage};
use pdp_engine::core::BasicAlgorithm;
use pdp_engine::policy::{AllOf, AnyOf, Match, Target};
use pdp_engine::selector::LocalSelector;
use pdp_engine::storage::PolicyStorage;
use pdp_engine::trie::NetworkTree;
use pdp_engine::value::Network;
use pdp_engine::wire::marshal_request;
use pdp_engine::{
    Attribute, AttributeAssignment, AttributeValue, Effect, Expression, FunctionRegistry,
    PdpEngine, Policy, PolicySet, Result, Rule, Type,
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use uuid::Uuid;

/// Id of the sample content.
pub const CONTENT_ID: &str = "acl";

fn user_target(registry: &FunctionRegistry, user: &str) -> Result<Target> {
    let m = Match::make(
        registry,
        "equal",
        Expression::designator("user", Type::String),
        Expression::value(AttributeValue::String(user.into())),
    )?;
    Ok(Target::new(vec![AnyOf::new(vec![AllOf::new(vec![m])])]))
}

fn network_condition(registry: &FunctionRegistry) -> Result<Expression> {
    let nets = [
        Network::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0)), 8)?,
        Network::new(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 0)), 16)?,
    ];
    registry.make(
        "contains",
        vec![
            Expression::value(AttributeValue::set_of_networks(&nets)),
            Expression::designator("addr", Type::Address),
        ],
    )
}

/// Policy set with one policy per user plus a catch-all deny.
///
/// Every user policy permits requests from private networks and returns
/// the user's role from local content as an obligation.
pub fn sample_policies(users: usize, tag: Option<Uuid>) -> Result<PolicyStorage> {
    let registry = FunctionRegistry::default();

    let mut root = PolicySet::builder("root").algorithm(BasicAlgorithm::FirstApplicableEffect);
    for i in 0..users {
        let role = LocalSelector::new(
            CONTENT_ID,
            "roles",
            vec![Expression::designator("user", Type::String)],
            Type::String,
        );

        let policy = Policy::builder(format!("user-{i}"))
            .target(user_target(&registry, &format!("user-{i}"))?)
            .algorithm(BasicAlgorithm::DenyOverrides)
            .rule(
                Rule::builder("private")
                    .condition(network_condition(&registry)?)
                    .effect(Effect::Permit)
                    .obligation(AttributeAssignment::new(
                        Attribute::new("role", Type::String),
                        Expression::LocalSelector(Arc::new(role)),
                    ))
                    .build()?,
            )
            .build()?;
        root = root.policy(policy);
    }

    let root = root
        .policy(
            Policy::builder("default")
                .rule(Rule::builder("deny").effect(Effect::Deny).build()?)
                .build()?,
        )
        .build()?;

    let mut attrs = HashMap::new();
    attrs.insert("user".to_string(), Attribute::new("user", Type::String));
    attrs.insert("addr".to_string(), Attribute::new("addr", Type::Address));
    Ok(PolicyStorage::new(Some(root.into()), attrs, tag))
}

/// Content with a role for every user.
pub fn sample_content(users: usize, tag: Option<Uuid>) -> Result<LocalContentStorage> {
    let roles = ContentItem::new(
        Type::String,
        vec![Type::String],
        ContentSubItem::string_map((0..users).map(|i| {
            let role = if i % 2 == 0 { "admin" } else { "developer" };
            (
                format!("user-{i}"),
                ContentSubItem::value(AttributeValue::String(role.into())),
            )
        })),
    )?;

    Ok(LocalContentStorage::new([LocalContent::new(
        CONTENT_ID,
        tag,
        [("roles", roles)],
    )]))
}

/// Engine serving the sample policies and content.
pub fn sample_engine(users: usize) -> Result<PdpEngine> {
    PdpEngine::builder()
        .with_policies(sample_policies(users, Some(Uuid::new_v4()))?)
        .with_content(sample_content(users, None)?)
        .build()
}

/// Attributes of a request from the user.
pub fn sample_attributes(user: usize) -> Vec<(String, AttributeValue)> {
    vec![
        ("user".to_string(), AttributeValue::String(format!("user-{user}"))),
        (
            "addr".to_string(),
            AttributeValue::Address(IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))),
        ),
        ("port".to_string(), AttributeValue::Integer(443)),
        ("tls".to_string(), AttributeValue::Boolean(true)),
    ]
}

/// Marshalled request from the user.
pub fn sample_request(user: usize) -> Result<Vec<u8>> {
    marshal_request(&sample_attributes(user))
}

/// Network tree with `count` /24 IPv4 networks.
pub fn sample_networks(count: usize) -> Result<NetworkTree<usize>> {
    let mut tree = NetworkTree::new();
    for i in 0..count {
        let [_, a, b, _] = (i as u32).to_be_bytes();
        let net = Network::new(IpAddr::V4(Ipv4Addr::new(10, a, b, 0)), 24)?;
        tree = tree.insert_net(&net, i);
    }
    Ok(tree)
}
