use crate::context::Context;
use crate::error::{Error, ErrorContext, ErrorKind, Result};
use crate::expression::Expression;
use crate::types::Type;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Attribute exchanged with an information point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipAttribute {
    /// Attribute id
    pub id: String,
    /// Type key
    #[serde(rename = "type")]
    pub type_key: String,
    /// Serialized value
    pub value: String,
}

impl PipAttribute {
    /// Create an attribute.
    pub fn new(
        id: impl Into<String>,
        type_key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            type_key: type_key.into(),
            value: value.into(),
        }
    }

    /// Serialize a calculated value as an attribute.
    pub fn from_value(id: impl Into<String>, v: &AttributeValue) -> Result<Self> {
        Ok(Self::new(id, v.get_result_type().key(), v.serialize()?))
    }
}

/// Client of an external policy information point.
pub trait PipClient: Send + Sync + fmt::Debug {
    /// Ask the service for the item of the content with given arguments.
    fn query(&self, content: &str, item: &str, args: &[PipAttribute]) -> Result<Vec<PipAttribute>>;
}

/// Lookup through an external information point.
#[derive(Debug, Clone)]
pub struct PipSelector {
    service: String,
    content: String,
    item: String,
    path: Vec<Expression>,
    t: Type,
    client: Arc<dyn PipClient>,
}

impl PipSelector {
    /// Create a selector bound to the client.
    pub fn new(
        service: impl Into<String>,
        content: impl Into<String>,
        item: impl Into<String>,
        path: Vec<Expression>,
        t: Type,
        client: Arc<dyn PipClient>,
    ) -> Self {
        Self {
            service: service.into(),
            content: content.into(),
            item: item.into(),
            path,
            t,
            client,
        }
    }

    /// Service name the client was registered under.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Type of the value the service answers with.
    pub fn get_result_type(&self) -> &Type {
        &self.t
    }

    /// Short description for error paths.
    pub fn describe(&self) -> String {
        format!("pip({}/{}.{})", self.service, self.content, self.item)
    }

    /// Query the service with the evaluated path.
    pub fn calculate(&self, ctx: &Context) -> Result<AttributeValue> {
        self.query(ctx).bind_with(|| self.describe())
    }

    fn query(&self, ctx: &Context) -> Result<AttributeValue> {
        let args = self
            .path
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let v = e.calculate_arg(ctx, &format!("argument {i}"))?;
                PipAttribute::from_value(i.to_string(), &v)
            })
            .collect::<Result<Vec<_>>>()?;

        trace!(
            service = %self.service,
            content = %self.content,
            item = %self.item,
            args = args.len(),
            "Querying information point"
        );
        let mut res = self.client.query(&self.content, &self.item, &args)?;
        if res.len() != 1 {
            return Err(Error::new(ErrorKind::PipResponseCount { count: res.len() }));
        }

        let attr = res.remove(0);
        if attr.type_key != self.t.key() {
            return Err(Error::invalid_content_item_type(
                self.t.name(),
                Type::from_key(&attr.type_key)
                    .map(|t| t.name().to_string())
                    .unwrap_or(attr.type_key),
            ));
        }

        match &self.t {
            Type::ListOfStrings => Ok(AttributeValue::list_of_strings(
                attr.value.split(',').map(str::to_string),
            )),
            t => AttributeValue::from_string(t, &attr.value),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Information point answering from a fixed table.
    #[derive(Debug, Default)]
    pub(crate) struct TablePip {
        pub(crate) answers: HashMap<String, Vec<PipAttribute>>,
        pub(crate) calls: Mutex<usize>,
    }

    impl PipClient for TablePip {
        fn query(
            &self,
            _content: &str,
            _item: &str,
            args: &[PipAttribute],
        ) -> Result<Vec<PipAttribute>> {
            *self.calls.lock() += 1;
            let key = args
                .first()
                .map(|a| a.value.clone())
                .unwrap_or_default();
            Ok(self.answers.get(&key).cloned().unwrap_or_default())
        }
    }

    fn client() -> Arc<dyn PipClient> {
        let mut answers = HashMap::new();
        answers.insert(
            "example.com".to_string(),
            vec![PipAttribute::new("r", "string", "good")],
        );
        answers.insert(
            "list.com".to_string(),
            vec![PipAttribute::new("r", "list of strings", "a,b")],
        );
        answers.insert(
            "two.com".to_string(),
            vec![
                PipAttribute::new("r", "string", "a"),
                PipAttribute::new("r", "string", "b"),
            ],
        );
        Arc::new(TablePip {
            answers,
            ..Default::default()
        })
    }

    fn selector(t: Type) -> PipSelector {
        PipSelector::new(
            "rep",
            "reputation",
            "score",
            vec![Expression::designator("d", Type::String)],
            t,
            client(),
        )
    }

    fn ctx(d: &str) -> Context {
        Context::from_values(None, [("d", AttributeValue::String(d.into()))]).unwrap()
    }

    #[test]
    fn test_pip_selector() {
        let v = selector(Type::String).calculate(&ctx("example.com")).unwrap();
        assert_eq!(v.str().unwrap(), "good");

        let v = selector(Type::ListOfStrings)
            .calculate(&ctx("list.com"))
            .unwrap();
        assert_eq!(v.list_of_strings_value().unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_pip_selector_errors() {
        let err = selector(Type::String)
            .calculate(&ctx("two.com"))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::PipResponseCount { count: 2 }));
        assert_eq!(err.path(), ["pip(rep/reputation.score)"]);

        let err = selector(Type::String)
            .calculate(&ctx("nothing.com"))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::PipResponseCount { count: 0 }));

        let err = selector(Type::Integer)
            .calculate(&ctx("example.com"))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidContentItemType { .. }));
    }
}
