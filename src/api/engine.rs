//! Decision point facade.

use crate::config::Config;
use crate::content::{ContentTransaction, LocalContentStorage};
use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::policy::{Effect, Response};
use crate::selector::{CachingPipClient, PipClient};
use crate::storage::{PolicyStorage, PolicyStorageTransaction};
use crate::telemetry::{Telemetry, TelemetryMetrics};
use crate::value::AttributeValue;
use crate::wire::{marshal_response, unmarshal_request};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Decision point serving one policy storage and one content storage.
///
/// Readers evaluate against whatever storages are published at the moment
/// of the call. Commits replace them atomically, so a request never sees a
/// half-applied update.
pub struct PdpEngine {
    /// Published policies
    policies: ArcSwap<PolicyStorage>,
    /// Published content
    content: ArcSwap<LocalContentStorage>,
    /// Serializes commits
    commit: Mutex<()>,
    /// Telemetry instance
    telemetry: Option<Telemetry>,
    /// Configuration
    config: Config,
}

impl PdpEngine {
    /// Create an engine builder.
    pub fn builder() -> PdpEngineBuilder {
        PdpEngineBuilder::new()
    }

    /// Create an engine with empty storages.
    pub fn new(config: Config) -> Self {
        Self {
            policies: ArcSwap::from_pointee(PolicyStorage::default()),
            content: ArcSwap::from_pointee(LocalContentStorage::default()),
            commit: Mutex::new(()),
            telemetry: None,
            config,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Currently published policy storage.
    pub fn policies(&self) -> Arc<PolicyStorage> {
        self.policies.load_full()
    }

    /// Currently published content storage.
    pub fn content(&self) -> Arc<LocalContentStorage> {
        self.content.load_full()
    }

    /// Tag of the published policy storage.
    pub fn policy_tag(&self) -> Option<Uuid> {
        self.policies.load().tag()
    }

    /// Build a request context bound to the published content.
    pub fn context<I, S>(&self, values: I) -> Result<Context>
    where
        I: IntoIterator<Item = (S, AttributeValue)>,
        S: Into<String>,
    {
        Context::from_values(Some(self.content.load_full()), values)
    }

    /// Evaluate the published policies. Without a root policy the result
    /// is NotApplicable.
    pub fn evaluate(&self, ctx: &Context) -> Response {
        let policies = self.policies.load();
        let r = match policies.root() {
            Some(root) => root.calculate(ctx),
            None => Response::not_applicable(),
        };

        debug!(
            effect = %r.effect,
            status = ?r.status.as_ref().map(|e| e.to_string()),
            obligations = r.obligations.len(),
            "Evaluated request"
        );
        r
    }

    /// Decide on a marshalled request and marshal the response into `out`.
    ///
    /// A broken request produces an Indeterminate response carrying the
    /// error as its status. Only a response buffer too small even for that
    /// is reported as an error.
    #[instrument(skip_all, fields(request_len = request.len()))]
    pub fn decide(&self, request: &[u8], out: &mut [u8]) -> Result<usize> {
        let start = Instant::now();

        let (effect, obligations, errs) = match self.request_context(request) {
            Ok(ctx) => {
                let r = self.evaluate(&ctx);
                let (obligations, errs) = self.obligations(&r, &ctx);
                (r.effect, obligations, errs)
            }
            Err(err) => {
                warn!(error = %err, "Can't read request");
                self.record(|t| t.record_wire_error());
                (Effect::Indeterminate, Vec::new(), vec![err])
            }
        };

        let n = marshal_response(out, effect, &obligations, &errs).map_err(|err| {
            self.record(|t| t.record_wire_error());
            err
        })?;

        self.record(|t| t.record_decision(effect, start.elapsed()));
        Ok(n)
    }

    /// Decide into a buffer of the configured response size.
    pub fn decide_to_vec(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0; self.config.engine.max_response_size];
        let n = self.decide(request, &mut out)?;
        out.truncate(n);
        Ok(out)
    }

    fn request_context(&self, request: &[u8]) -> Result<Context> {
        let limit = self.config.engine.max_request_size;
        if request.len() > limit {
            return Err(Error::new(ErrorKind::RequestTooLarge {
                size: request.len(),
                limit,
            }));
        }

        let attrs = unmarshal_request(request)?;
        self.context(attrs)
    }

    /// Calculate obligations of a response. The response status and every
    /// failed obligation go to the error list.
    fn obligations(&self, r: &Response, ctx: &Context) -> (Vec<(String, AttributeValue)>, Vec<Error>) {
        let mut errs: Vec<Error> = r.status.iter().cloned().collect();

        let limit = self.config.engine.max_obligations;
        if r.obligations.len() > limit {
            warn!(
                count = r.obligations.len(),
                limit, "Dropping obligations over the limit"
            );
        }

        let mut out = Vec::with_capacity(r.obligations.len().min(limit));
        for o in r.obligations.iter().take(limit) {
            match o.calculate(ctx) {
                Ok(v) => out.push((o.attribute().id().to_string(), v)),
                Err(err) => errs.push(err),
            }
        }

        (out, errs)
    }

    /// Open a transaction against the published policies.
    pub fn policy_transaction(&self, tag: Option<Uuid>) -> Result<PolicyStorageTransaction> {
        self.policies.load().new_transaction(tag)
    }

    /// Publish the result of a policy transaction.
    ///
    /// Fails with [`ErrorKind::PolicyTagsNotMatch`] if the published
    /// storage moved past the tag the transaction was opened against.
    #[instrument(skip_all, fields(base = %tx.base_tag(), tag = %tx.tag()))]
    pub fn commit_policy(&self, tx: PolicyStorageTransaction) -> Result<()> {
        let _guard = self.commit.lock();

        let current = self.policies.load();
        if current.tag() != Some(tx.base_tag()) {
            return Err(Error::new(ErrorKind::PolicyTagsNotMatch {
                current: tag_name(current.tag()),
                requested: tx.base_tag().to_string(),
            }));
        }

        let storage = tx.commit()?;
        info!(from = %tag_name(current.tag()), to = %tag_name(storage.tag()), "Published policies");
        self.policies.store(Arc::new(storage));
        self.record(|t| t.record_policy_commit());
        Ok(())
    }

    /// Replace the published policies unconditionally.
    pub fn set_policies(&self, storage: PolicyStorage) {
        let _guard = self.commit.lock();
        info!(tag = %tag_name(storage.tag()), "Loaded policies");
        self.policies.store(Arc::new(storage));
    }

    /// Open a transaction against a published content.
    pub fn content_transaction(&self, id: &str, tag: Option<Uuid>) -> Result<ContentTransaction> {
        self.content.load().new_transaction(id, tag)
    }

    /// Publish the result of a content transaction.
    ///
    /// Fails with [`ErrorKind::ContentTagsNotMatch`] if the content moved
    /// past the tag the transaction was opened against.
    #[instrument(skip_all, fields(content = %tx.content_id(), tag = %tx.tag()))]
    pub fn commit_content(&self, tx: ContentTransaction) -> Result<()> {
        let _guard = self.commit.lock();

        let storage = self.content.load_full();
        let current = storage.get_content(tx.content_id())?.tag();
        if current != Some(tx.base_tag()) {
            return Err(Error::new(ErrorKind::ContentTagsNotMatch {
                id: tx.content_id().to_string(),
                current: tag_name(current),
                requested: tx.base_tag().to_string(),
            }));
        }

        let id = tx.content_id().to_string();
        let to = tx.tag();
        let next = tx.commit(&storage)?;
        info!(content = %id, from = %tag_name(current), to = %to, "Published content");
        self.content.store(Arc::new(next));
        self.record(|t| t.record_content_commit());
        Ok(())
    }

    /// Replace the published content unconditionally.
    pub fn set_content(&self, storage: LocalContentStorage) {
        let _guard = self.commit.lock();
        info!(contents = storage.len(), "Loaded content");
        self.content.store(Arc::new(storage));
    }

    /// Wrap an information point client with the configured cache.
    pub fn pip_client(&self, client: Arc<dyn PipClient>) -> Arc<dyn PipClient> {
        let pip = &self.config.pip;
        if !pip.cache_enabled {
            return client;
        }

        Arc::new(CachingPipClient::new(
            client,
            pip.cache_max_entries,
            Duration::from_secs(pip.cache_ttl_secs),
        ))
    }

    /// Get engine metrics.
    pub fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            policy_tag: self.policy_tag(),
            content_count: self.content.load().len(),
            telemetry: self.telemetry.as_ref().map(Telemetry::metrics),
        }
    }

    fn record(&self, f: impl FnOnce(&Telemetry)) {
        if let Some(t) = self.telemetry.as_ref().filter(|t| t.is_enabled()) {
            f(t);
        }
    }
}

impl std::fmt::Debug for PdpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdpEngine")
            .field("policy_tag", &self.policy_tag())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn tag_name(tag: Option<Uuid>) -> String {
    tag.map_or_else(|| "none".to_string(), |t| t.to_string())
}

/// Builder for creating a [`PdpEngine`].
#[derive(Debug, Default)]
pub struct PdpEngineBuilder {
    config: Option<Config>,
    policies: Option<PolicyStorage>,
    content: Option<LocalContentStorage>,
    telemetry_enabled: bool,
    max_obligations: Option<usize>,
}

impl PdpEngineBuilder {
    /// Create a new engine builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the initial policies.
    pub fn with_policies(mut self, storage: PolicyStorage) -> Self {
        self.policies = Some(storage);
        self
    }

    /// Set the initial content.
    pub fn with_content(mut self, storage: LocalContentStorage) -> Self {
        self.content = Some(storage);
        self
    }

    /// Enable or disable telemetry.
    pub fn with_telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = enabled;
        self
    }

    /// Set the obligation limit.
    pub fn with_max_obligations(mut self, max: usize) -> Self {
        self.max_obligations = Some(max);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<PdpEngine> {
        let mut config = self.config.unwrap_or_default();
        if let Some(max) = self.max_obligations {
            config.engine.max_obligations = max;
        }
        config.validate()?;

        let mut engine = PdpEngine::new(config);
        if self.telemetry_enabled {
            engine.telemetry = Some(Telemetry::new(&engine.config.telemetry));
        }

        if let Some(storage) = self.policies {
            engine.policies.store(Arc::new(storage));
        }

        if let Some(storage) = self.content {
            engine.content.store(Arc::new(storage));
        }

        Ok(engine)
    }
}

/// Engine metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMetrics {
    /// Tag of the published policies
    pub policy_tag: Option<Uuid>,
    /// Number of published contents
    pub content_count: usize,
    /// Decision counters (if telemetry is enabled)
    pub telemetry: Option<TelemetryMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentEntity, ContentItem, ContentSubItem, ContentUpdate, LocalContent};
    use crate::core::BasicAlgorithm;
    use crate::expression::{Attribute, AttributeAssignment, Expression, FunctionRegistry};
    use crate::policy::{AllOf, AnyOf, Match, Policy, Rule, Target};
    use crate::selector::LocalSelector;
    use crate::storage::{PolicyUpdate, UpdateOp};
    use crate::types::Type;
    use crate::wire::{marshal_request, unmarshal_response, unmarshal_request};
    use std::collections::HashMap;

    fn s(v: &str) -> AttributeValue {
        AttributeValue::String(v.into())
    }

    fn user_target(user: &str) -> Target {
        Target::new(vec![AnyOf::new(vec![AllOf::new(vec![Match::make(
            &FunctionRegistry::default(),
            "equal",
            Expression::designator("user", Type::String),
            Expression::value(s(user)),
        )
        .unwrap()])])])
    }

    fn policies(tag: Option<Uuid>) -> PolicyStorage {
        let role = LocalSelector::new(
            "acl",
            "roles",
            vec![Expression::designator("user", Type::String)],
            Type::String,
        );

        let root = Policy::builder("root")
            .algorithm(BasicAlgorithm::DenyOverrides)
            .rule(
                Rule::builder("mallory")
                    .target(user_target("mallory"))
                    .effect(Effect::Deny)
                    .obligation(AttributeAssignment::with_value("reason", s("banned")))
                    .build()
                    .unwrap(),
            )
            .rule(
                Rule::builder("any")
                    .effect(Effect::Permit)
                    .obligation(AttributeAssignment::new(
                        Attribute::new("role", Type::String),
                        Expression::LocalSelector(Arc::new(role)),
                    ))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let mut attrs = HashMap::new();
        attrs.insert("user".to_string(), Attribute::new("user", Type::String));
        PolicyStorage::new(Some(root.into()), attrs, tag)
    }

    fn roles(alice: &str) -> ContentItem {
        ContentItem::new(
            Type::String,
            vec![Type::String],
            ContentSubItem::string_map([("alice", ContentSubItem::value(s(alice)))]),
        )
        .unwrap()
    }

    fn content(tag: Option<Uuid>) -> LocalContentStorage {
        LocalContentStorage::new([LocalContent::new("acl", tag, [("roles", roles("admin"))])])
    }

    fn engine(policy_tag: Option<Uuid>, content_tag: Option<Uuid>) -> PdpEngine {
        PdpEngine::builder()
            .with_policies(policies(policy_tag))
            .with_content(content(content_tag))
            .with_telemetry_enabled(true)
            .build()
            .unwrap()
    }

    fn decide(engine: &PdpEngine, user: &str) -> Result<(Effect, Vec<(String, AttributeValue)>)> {
        let req = marshal_request(&[("user", s(user))]).unwrap();
        let out = engine.decide_to_vec(&req).unwrap();
        unmarshal_response(&out)
    }

    #[test]
    fn test_empty_engine() {
        let engine = PdpEngine::builder().build().unwrap();
        let r = engine.evaluate(&Context::empty());
        assert_eq!(r.effect, Effect::NotApplicable);
        assert!(engine.policy_tag().is_none());
    }

    #[test]
    fn test_decide() {
        let engine = engine(None, None);

        let (effect, obligations) = decide(&engine, "alice").unwrap();
        assert_eq!(effect, Effect::Permit);
        assert_eq!(obligations.len(), 1);
        assert_eq!(obligations[0].0, "role");
        assert!(matches!(&obligations[0].1, AttributeValue::String(v) if v == "admin"));

        let (effect, obligations) = decide(&engine, "mallory").unwrap();
        assert_eq!(effect, Effect::Deny);
        assert_eq!(obligations[0].0, "reason");

        let metrics = engine.metrics();
        let telemetry = metrics.telemetry.unwrap();
        assert_eq!(telemetry.total_decisions, 2);
        assert_eq!(telemetry.decisions["Deny"], 1);
    }

    #[test]
    fn test_decide_failed_obligation() {
        let engine = engine(None, None);

        let err = decide(&engine, "bob").unwrap_err();
        match err.kind() {
            ErrorKind::ResponseServerError { status } => {
                assert!(status.contains("assignment to \"role\""), "{status}");
            }
            kind => panic!("unexpected error {kind:?}"),
        }
    }

    #[test]
    fn test_decide_broken_request() {
        let engine = engine(None, None);

        let out = engine.decide_to_vec(&[2, 0, 0, 0]).unwrap();
        let err = unmarshal_response(&out).unwrap_err();
        assert_eq!(
            err.to_string(),
            "#5f: Server error: #4f: Expected request version 1 but got 2"
        );
        assert_eq!(engine.metrics().telemetry.unwrap().wire_errors, 1);
        assert_eq!(out[2], Effect::Indeterminate.code());

        let big = vec![0; engine.config().engine.max_request_size + 1];
        let out = engine.decide_to_vec(&big).unwrap();
        assert!(unmarshal_response(&out).is_err());

        let mut tiny = [0u8; 3];
        let req = marshal_request(&[("user", s("alice"))]).unwrap();
        assert!(engine.decide(&req, &mut tiny).is_err());
    }

    #[test]
    fn test_decide_unmarshallable_obligation() {
        let root = Policy::builder("root")
            .rule(
                Rule::builder("big")
                    .effect(Effect::Permit)
                    .obligation(AttributeAssignment::with_value("big", s(&"x".repeat(70000))))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        let engine = PdpEngine::builder()
            .with_policies(PolicyStorage::new(Some(root.into()), HashMap::new(), None))
            .build()
            .unwrap();

        let req = marshal_request::<&str>(&[]).unwrap();
        let out = engine.decide_to_vec(&req).unwrap();
        assert_eq!(out[2], Effect::Permit.code());
        let err = unmarshal_response(&out).unwrap_err();
        assert_eq!(
            err.to_string(),
            "#5f: Server error: #52 (big): Expected string value no longer than 65535 bytes but got 70000 bytes"
        );
    }

    #[test]
    fn test_obligation_limit() {
        let engine = PdpEngine::builder()
            .with_policies(policies(None))
            .with_content(content(None))
            .with_max_obligations(0)
            .build()
            .unwrap();

        let (effect, obligations) = decide(&engine, "alice").unwrap();
        assert_eq!(effect, Effect::Permit);
        assert!(obligations.is_empty());
    }

    #[test]
    fn test_commit_policy() {
        let t0 = Uuid::new_v4();
        let t1 = Uuid::new_v4();
        let engine = engine(Some(t0), None);
        let before = engine.policies();

        let mut u = PolicyUpdate::new(t0, t1);
        u.append(
            UpdateOp::Add,
            vec!["root".to_string()],
            Some(
                Rule::builder("alice")
                    .target(user_target("alice"))
                    .effect(Effect::Deny)
                    .build()
                    .unwrap()
                    .into(),
            ),
        );

        let mut tx = engine.policy_transaction(Some(t0)).unwrap();
        tx.apply(&u).unwrap();

        let stale = engine.policy_transaction(Some(t0)).unwrap();

        engine.commit_policy(tx).unwrap();
        assert_eq!(engine.policy_tag(), Some(t1));
        assert_eq!(decide(&engine, "alice").unwrap().0, Effect::Deny);
        assert_eq!(before.tag(), Some(t0));

        let err = engine.commit_policy(stale).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::PolicyTagsNotMatch { .. }));
        assert_eq!(engine.metrics().telemetry.unwrap().policy_commits, 1);
    }

    #[test]
    fn test_commit_content() {
        let t0 = Uuid::new_v4();
        let t1 = Uuid::new_v4();
        let engine = engine(None, Some(t0));

        let mut u = ContentUpdate::new("acl", t0, t1);
        u.append(
            UpdateOp::Add,
            vec!["roles".to_string()],
            Some(ContentEntity::Item(roles("guest"))),
        );

        let mut tx = engine.content_transaction("acl", Some(t0)).unwrap();
        let stale = engine.content_transaction("acl", Some(t0)).unwrap();
        tx.apply(&u).unwrap();
        engine.commit_content(tx).unwrap();

        let (_, obligations) = decide(&engine, "alice").unwrap();
        assert!(matches!(&obligations[0].1, AttributeValue::String(v) if v == "guest"));

        let err = engine.commit_content(stale).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ContentTagsNotMatch { .. }));

        let err = engine.content_transaction("acl", None).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingContentTag));
    }

    #[test]
    fn test_request_round_trip_through_context() {
        let engine = engine(None, None);
        let req = marshal_request(&[("user", s("alice")), ("n", AttributeValue::Integer(3))]).unwrap();
        let ctx = engine.context(unmarshal_request(&req).unwrap()).unwrap();
        assert_eq!(ctx.len(), 2);
        assert_eq!(engine.evaluate(&ctx).effect, Effect::Permit);
    }

    #[test]
    fn test_pip_client_cache() {
        #[derive(Debug)]
        struct Nothing;

        impl PipClient for Nothing {
            fn query(
                &self,
                _: &str,
                _: &str,
                _: &[crate::selector::PipAttribute],
            ) -> Result<Vec<crate::selector::PipAttribute>> {
                Ok(Vec::new())
            }
        }

        let engine = PdpEngine::builder().build().unwrap();
        let client = engine.pip_client(Arc::new(Nothing));
        assert!(format!("{client:?}").starts_with("Nothing"));

        let mut config = Config::default();
        config.pip.cache_enabled = true;
        let engine = PdpEngine::builder().with_config(config).build().unwrap();
        let client = engine.pip_client(Arc::new(Nothing));
        assert!(format!("{client:?}").starts_with("CachingPipClient"));
    }
}
