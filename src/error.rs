//! Error types for the decision engine.
//!
//! Every failure is an [`ErrorKind`] wrapped in a bound [`Error`]. Binding
//! prepends a description of the construct the error travelled through, so a
//! status surfaced at the top of the policy tree reads like
//! `#03 (policy set "root">rule "r1">condition>attr(x.String)): Missing value`.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

const SOURCE_PATH_SEPARATOR: &str = ">";

/// Every error condition the engine can report.
#[derive(Error, Debug, Clone)]
pub enum ErrorKind {
    /// Error produced outside of the engine
    #[error("{0}")]
    External(Arc<dyn std::error::Error + Send + Sync>),

    /// Several errors collected from sibling evaluations
    #[error("multiple errors: {}", join_errors(.0))]
    Multi(Vec<Error>),

    // Evaluation errors.
    /// Attribute isn't present in request context
    #[error("Missing attribute")]
    MissingAttribute,

    /// Content or map lookup found nothing for the key
    #[error("Missing value")]
    MissingValue,

    /// Value has different type than expected
    #[error("Expected {expected} value but got {actual}")]
    AttributeValueType {
        /// Expected type name
        expected: String,
        /// Actual type name
        actual: String,
    },

    /// Mapper argument can't be converted to list of identifiers
    #[error("Expected String, Set of Strings, List of Strings or Flags as argument but got {actual}")]
    MapperArgumentType {
        /// Actual type name
        actual: String,
    },

    /// Content isn't present in storage
    #[error("Missing content")]
    MissingContent,

    /// Content item isn't present in content
    #[error("Missing content item")]
    MissingContentItem,

    /// Content item or selector result has unexpected type
    #[error("Invalid content item type. Expected \"{expected}\" but got \"{actual}\"")]
    InvalidContentItemType {
        /// Expected type name
        expected: String,
        /// Actual type name
        actual: String,
    },

    /// Selector path doesn't fit content item keys
    #[error("Invalid selector path. Expected {expected} path but got {actual}")]
    InvalidSelectorPath {
        /// Key types of content item
        expected: String,
        /// Result types of path expressions
        actual: String,
    },

    /// Path continues past a final value
    #[error("Not a map of the content")]
    MapContentSubitem,

    /// Path ends at a map instead of a value
    #[error("Not a final value of the content")]
    FinalContentSubitem,

    /// Content map can't be keyed by the type
    #[error("Can't use {actual} as content key type")]
    InvalidContentKeyType {
        /// Actual type name
        actual: String,
    },

    /// Request contains the same attribute twice
    #[error("Duplicate attribute \"{id}\" of type {type_name} ({first} and {second})")]
    DuplicateAttributeValue {
        /// Attribute id
        id: String,
        /// Attribute type name
        type_name: String,
        /// Description of first value
        first: String,
        /// Description of second value
        second: String,
    },

    /// Integer division by zero
    #[error("Integer divide by zero")]
    IntegerDivideByZero,

    /// Malformed wildcard pattern
    #[error("Invalid wildcard pattern {pattern:?}")]
    InvalidWildcardPattern {
        /// Offending pattern
        pattern: String,
    },

    /// Malformed regular expression
    #[error("Invalid regular expression {pattern:?}: {message}")]
    InvalidRegexPattern {
        /// Offending pattern
        pattern: String,
        /// Compiler message
        message: String,
    },

    /// Obligation expression calculated value of wrong type
    #[error("Expected {expected} value for \"{id}\" but got {actual}")]
    AssignmentTypeMismatch {
        /// Attribute id
        id: String,
        /// Declared type name
        expected: String,
        /// Actual type name
        actual: String,
    },

    /// External information point returned unexpected number of attributes
    #[error("Expected exactly one attribute from information point but got {count}")]
    PipResponseCount {
        /// Number of returned attributes
        count: usize,
    },

    // Value and type errors.
    /// String can't be converted to value of the type
    #[error("Can't convert string to value of {type_name} type")]
    InvalidTypeStringCast {
        /// Type name
        type_name: String,
    },

    /// Conversion from string isn't implemented for the type
    #[error("Conversion from string to value of {type_name} type hasn't been implemented")]
    NotImplementedStringCast {
        /// Type name
        type_name: String,
    },

    /// Type key isn't known to registry
    #[error("Can't convert string to value of unknown type {key:?}")]
    UnknownTypeStringCast {
        /// Type key
        key: String,
    },

    /// String isn't a boolean
    #[error("Can't treat {value:?} as boolean")]
    InvalidBooleanStringCast {
        /// Input
        value: String,
    },

    /// String isn't an integer
    #[error("Can't treat {value:?} as integer: {message}")]
    InvalidIntegerStringCast {
        /// Input
        value: String,
        /// Parser message
        message: String,
    },

    /// String isn't a float
    #[error("Can't treat {value:?} as float: {message}")]
    InvalidFloatStringCast {
        /// Input
        value: String,
        /// Parser message
        message: String,
    },

    /// String isn't an IP address
    #[error("Can't treat {value:?} as IP address")]
    InvalidAddressStringCast {
        /// Input
        value: String,
    },

    /// String isn't an IP network
    #[error("Can't treat {value:?} as network address: {message}")]
    InvalidNetworkStringCast {
        /// Input
        value: String,
        /// Parser message
        message: String,
    },

    /// String isn't a domain name
    #[error("Can't treat {value:?} as domain name: {message}")]
    InvalidDomainStringCast {
        /// Input
        value: String,
        /// Validation message
        message: String,
    },

    /// Value of the type can't be serialized
    #[error("Can't serialize value of {type_name} type")]
    InvalidTypeSerialization {
        /// Type name
        type_name: String,
    },

    /// Flags type name collides with builtin type
    #[error("Can't create flags type {name:?} because it duplicates builtin type")]
    DuplicatesBuiltinType {
        /// Type name
        name: String,
    },

    /// Flags type without flags
    #[error("Can't create flags type {name:?} without flags")]
    NoTypedFlags {
        /// Type name
        name: String,
    },

    /// Flags type with more than 64 flags
    #[error("Can't create flags type {name:?} with {count} flags (expected no more than 64 flags)")]
    TooManyFlags {
        /// Type name
        name: String,
        /// Requested number of flags
        count: usize,
    },

    /// Flags type with repeated flag name
    #[error("Can't create flags type {name:?} with duplicate flag {flag:?}")]
    DuplicateFlagName {
        /// Type name
        name: String,
        /// Duplicate flag
        flag: String,
    },

    /// Flag isn't defined by the type
    #[error("Type {name:?} has no flag {flag:?}")]
    UnknownFlagName {
        /// Type name
        name: String,
        /// Missing flag
        flag: String,
    },

    /// Trie key prefix length exceeds key width
    #[error("Number of significant bits {bits} is out of range (expected 0 <= n <= {width})")]
    KeyBitsOutOfRange {
        /// Requested number of bits
        bits: usize,
        /// Key width
        width: usize,
    },

    // Configuration (load time) errors.
    /// No function with the name accepts given arguments
    #[error("Can't find function {name} which takes {arguments}")]
    FunctionCast {
        /// Function name
        name: String,
        /// Argument type names
        arguments: String,
    },

    /// Function can't be used in target match with the arguments
    #[error("Can't find match function {name} which takes {first} and {second}")]
    MatchFunctionCast {
        /// Function name
        name: String,
        /// First argument type name
        first: String,
        /// Second argument type name
        second: String,
    },

    /// Condition must be a boolean expression
    #[error("Expected Boolean condition but got {actual}")]
    ConditionType {
        /// Actual type name
        actual: String,
    },

    /// Mapper default rule isn't among policy rules
    #[error("No rule with id {id:?} to use as default rule")]
    MissingDefaultRule {
        /// Rule id
        id: String,
    },

    /// Mapper error rule isn't among policy rules
    #[error("No rule with id {id:?} to use as error rule")]
    MissingErrorRule {
        /// Rule id
        id: String,
    },

    /// Mapper default policy isn't among policy set children
    #[error("No policy with id {id:?} to use as default policy")]
    MissingDefaultPolicy {
        /// Policy id
        id: String,
    },

    /// Mapper error policy isn't among policy set children
    #[error("No policy with id {id:?} to use as error policy")]
    MissingErrorPolicy {
        /// Policy id
        id: String,
    },

    /// Selector URI scheme isn't registered
    #[error("Unsupported selector scheme {scheme:?}")]
    UnsupportedSelectorScheme {
        /// Scheme
        scheme: String,
    },

    /// Selector URI can't be split into location parts
    #[error("Expected selector location as {expected} but got {uri:?}")]
    InvalidSelectorUri {
        /// Location template
        expected: String,
        /// Given URI
        uri: String,
    },

    /// Information point service isn't registered
    #[error("Unknown information point service {service:?}")]
    UnknownPipService {
        /// Service name
        service: String,
    },

    /// Invalid engine configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Detailed message
        message: String,
    },

    // Structural errors.
    /// Hidden policy can't be modified
    #[error("Can't modify hidden policy")]
    HiddenPolicyModification,

    /// Hidden policy set can't be modified
    #[error("Can't modify hidden policy set")]
    HiddenPolicySetModification,

    /// Path goes below policy rules
    #[error("Trailing path \"{path}\" for policy modification")]
    TooLongPathPolicyModification {
        /// Remaining path
        path: String,
    },

    /// Path stops at policy
    #[error("Missing path for policy modification")]
    TooShortPathPolicyModification,

    /// Path stops at policy set
    #[error("Missing path for policy set modification")]
    TooShortPathPolicySetModification,

    /// Only rules can be appended to policy
    #[error("Expected rule to append but got {item}")]
    InvalidPolicyItemType {
        /// Description of given item
        item: String,
    },

    /// Only policies and policy sets can be appended to policy set
    #[error("Expected policy or policy set to append but got {item}")]
    InvalidPolicySetItemType {
        /// Description of given item
        item: String,
    },

    /// Hidden rule can't be appended
    #[error("Can't append hidden rule to policy")]
    HiddenRuleAppend,

    /// Hidden policy can't be appended
    #[error("Can't append hidden policy to policy set")]
    HiddenPolicyAppend,

    /// Policy doesn't have the rule
    #[error("Policy has no rule {id:?}")]
    MissingPolicyChild {
        /// Rule id
        id: String,
    },

    /// Policy set doesn't have the policy
    #[error("Policy set has no policy {id:?}")]
    MissingPolicySetChild {
        /// Policy id
        id: String,
    },

    // Storage errors.
    /// Storage without tag can't be modified
    #[error("Can't modify policies with no tag")]
    UntaggedPolicyModification,

    /// Update requires a tag
    #[error("Update has no previous policy tag")]
    MissingPolicyTag,

    /// Update tag doesn't match current tag
    #[error("Update tag {requested} doesn't match policies tag {current}")]
    PolicyTagsNotMatch {
        /// Tag of storage
        current: String,
        /// Tag of update
        requested: String,
    },

    /// Root must be a policy or policy set
    #[error("Expected policy or policy set as new root policy but got {item}")]
    InvalidRootPolicyItemType {
        /// Description of given item
        item: String,
    },

    /// Root can't be hidden
    #[error("Can't make hidden policy as new root policy")]
    HiddenRootPolicyAppend,

    /// Path doesn't start at root
    #[error("Root policy is {actual:?} but got {requested:?} as first path element")]
    InvalidRootPolicy {
        /// Root id
        actual: String,
        /// First path element
        requested: String,
    },

    /// Storage has no root to descend into
    #[error("Storage has no root policy")]
    MissingRootPolicy,

    /// Delete requires a path
    #[error("Can't modify items by empty path")]
    EmptyPathModification,

    /// Transaction is poisoned by earlier failure
    #[error("Can't apply update to transaction which failed at {cause}")]
    FailedPolicyTransaction {
        /// Error which poisoned the transaction
        cause: Box<Error>,
    },

    /// Update operation name isn't known
    #[error("Unknown policy update operation {op:?}")]
    UnknownPolicyUpdateOperation {
        /// Operation name
        op: String,
    },

    /// Query starts from missing or hidden root
    #[error("Invalid root id or hidden root")]
    InvalidRootQuery,

    /// Intermediate element of query path not found
    #[error("Queried element {id:?} is not found")]
    QueriedElementNotFound {
        /// Element id
        id: String,
    },

    /// Last element of query path not found
    #[error("Queried rule {id:?} is not found")]
    QueriedRuleNotFound {
        /// Rule id
        id: String,
    },

    /// Search found nothing
    #[error("Element {id:?} not found")]
    ElementNotFound {
        /// Element id
        id: String,
    },

    /// Content without tag can't be modified
    #[error("Can't modify content {id:?} with no tag")]
    UntaggedContentModification {
        /// Content id
        id: String,
    },

    /// Content update requires a tag
    #[error("Update has no previous content tag")]
    MissingContentTag,

    /// Content update tag doesn't match
    #[error("Update tag {requested} doesn't match content {id:?} tag {current}")]
    ContentTagsNotMatch {
        /// Content id
        id: String,
        /// Tag of content
        current: String,
        /// Tag of update
        requested: String,
    },

    /// Content transaction is poisoned by earlier failure
    #[error("Can't apply update to content transaction which failed at {cause}")]
    FailedContentTransaction {
        /// Error which poisoned the transaction
        cause: Box<Error>,
    },

    /// Content update entity doesn't fit the path
    #[error("Expected {expected} as content update entity but got {actual}")]
    InvalidContentUpdateEntity {
        /// Expected entity
        expected: String,
        /// Given entity
        actual: String,
    },

    /// Content update path is longer than item keys
    #[error("Content item has {keys} keys but update path has {len} elements")]
    TooLongContentUpdatePath {
        /// Number of keys
        keys: usize,
        /// Length of path after item id
        len: usize,
    },

    // Wire errors.
    /// Output buffer too small
    #[error("Output buffer is too small")]
    RequestBufferOverflow,

    /// Input buffer ends too early
    #[error("Input buffer is too short")]
    RequestBufferUnderflow,

    /// Unsupported protocol version
    #[error("Expected request version {expected} but got {actual}")]
    RequestVersion {
        /// Version from buffer
        actual: u16,
        /// Supported version
        expected: u16,
    },

    /// Attribute count doesn't fit in 16 bits
    #[error("Expected no more than 65535 attributes but got {count}")]
    RequestTooManyAttributes {
        /// Number of attributes
        count: usize,
    },

    /// Attribute name doesn't fit in 255 bytes
    #[error("Expected attribute name no longer than 255 bytes but got {len} bytes")]
    RequestTooLongAttributeName {
        /// Name length
        len: usize,
    },

    /// String doesn't fit in 65535 bytes
    #[error("Expected string value no longer than 65535 bytes but got {len} bytes")]
    RequestTooLongStringValue {
        /// String length
        len: usize,
    },

    /// Collection has more than 65535 items
    #[error("Expected no more than 65535 items of {type_name} but got {count}")]
    RequestTooLongCollectionValue {
        /// Collection type name
        type_name: String,
        /// Number of items
        count: usize,
    },

    /// Value type has no wire representation
    #[error("Marshalling for type {type_name} hasn't been implemented")]
    RequestAttributeMarshallingNotImplemented {
        /// Type name
        type_name: String,
    },

    /// Unknown wire type tag
    #[error("Unknown attribute type {wire_type}")]
    RequestAttributeUnmarshallingType {
        /// Wire type tag
        wire_type: u8,
    },

    /// Wire type is reserved but can't be decoded
    #[error("Unmarshalling for type {type_name} hasn't been implemented")]
    RequestAttributeUnmarshallingNotImplemented {
        /// Wire type name
        type_name: String,
    },

    /// IPv4 mask longer than 32
    #[error("Invalid IPv4 network mask /{mask}")]
    RequestIPv4InvalidMask {
        /// Mask length
        mask: u8,
    },

    /// IPv6 mask longer than 128
    #[error("Invalid IPv6 network mask /{mask}")]
    RequestIPv6InvalidMask {
        /// Mask length
        mask: u8,
    },

    /// Output array is too small for decoded attributes
    #[error("Expected no more than {capacity} attributes but got {count}")]
    RequestAssignmentsOverflow {
        /// Number of attributes in buffer
        count: usize,
        /// Capacity of output
        capacity: usize,
    },

    /// Reflection target can't hold the value
    #[error("Can't set {value} value to {target} field")]
    FieldTypeMismatch {
        /// Value type name
        value: String,
        /// Target field kind
        target: String,
    },

    /// Integer exceeds target maximum
    #[error("Integer {value} overflows {target}")]
    IntegerOverflow {
        /// Value
        value: i128,
        /// Target type
        target: String,
    },

    /// Integer below target minimum
    #[error("Integer {value} underflows {target}")]
    IntegerUnderflow {
        /// Value
        value: i128,
        /// Target type
        target: String,
    },

    /// Unknown effect code
    #[error("Unknown effect {effect}")]
    ResponseEffect {
        /// Effect code
        effect: u8,
    },

    /// Unknown effect name
    #[error("Unknown effect name {name:?}")]
    InvalidEffectName {
        /// Effect name
        name: String,
    },

    /// Server reported error in response status
    #[error("Server error: {status}")]
    ResponseServerError {
        /// Status message
        status: String,
    },

    /// Request exceeds the configured limit
    #[error("Expected request no longer than {limit} bytes but got {size} bytes")]
    RequestTooLarge {
        /// Size of the request
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// Name or string payload isn't valid UTF-8
    #[error("Expected UTF-8 encoded string but got invalid byte at {offset}")]
    RequestInvalidUtf8 {
        /// Offset of the first invalid byte
        offset: usize,
    },
}

fn join_errors(errs: &[Error]) -> String {
    errs.iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ErrorKind {
    /// Get the stable numeric id of the error.
    pub fn id(&self) -> u8 {
        use ErrorKind::*;
        match self {
            External(_) => 0x00,
            Multi(_) => 0x01,
            MissingAttribute => 0x02,
            MissingValue => 0x03,
            AttributeValueType { .. } => 0x04,
            MapperArgumentType { .. } => 0x05,
            MissingContent => 0x06,
            MissingContentItem => 0x07,
            InvalidContentItemType { .. } => 0x08,
            InvalidSelectorPath { .. } => 0x09,
            MapContentSubitem => 0x0a,
            FinalContentSubitem => 0x0b,
            InvalidContentKeyType { .. } => 0x0c,
            DuplicateAttributeValue { .. } => 0x0d,
            IntegerDivideByZero => 0x0e,
            InvalidWildcardPattern { .. } => 0x0f,
            InvalidRegexPattern { .. } => 0x10,
            AssignmentTypeMismatch { .. } => 0x11,
            PipResponseCount { .. } => 0x12,
            InvalidTypeStringCast { .. } => 0x13,
            NotImplementedStringCast { .. } => 0x14,
            UnknownTypeStringCast { .. } => 0x15,
            InvalidBooleanStringCast { .. } => 0x16,
            InvalidIntegerStringCast { .. } => 0x17,
            InvalidFloatStringCast { .. } => 0x18,
            InvalidAddressStringCast { .. } => 0x19,
            InvalidNetworkStringCast { .. } => 0x1a,
            InvalidDomainStringCast { .. } => 0x1b,
            InvalidTypeSerialization { .. } => 0x1c,
            DuplicatesBuiltinType { .. } => 0x1d,
            NoTypedFlags { .. } => 0x1e,
            TooManyFlags { .. } => 0x1f,
            DuplicateFlagName { .. } => 0x20,
            UnknownFlagName { .. } => 0x21,
            KeyBitsOutOfRange { .. } => 0x22,
            FunctionCast { .. } => 0x23,
            MatchFunctionCast { .. } => 0x24,
            ConditionType { .. } => 0x25,
            MissingDefaultRule { .. } => 0x26,
            MissingErrorRule { .. } => 0x27,
            MissingDefaultPolicy { .. } => 0x28,
            MissingErrorPolicy { .. } => 0x29,
            UnsupportedSelectorScheme { .. } => 0x2a,
            InvalidSelectorUri { .. } => 0x2b,
            UnknownPipService { .. } => 0x2c,
            Config { .. } => 0x2d,
            HiddenPolicyModification => 0x2e,
            HiddenPolicySetModification => 0x2f,
            TooLongPathPolicyModification { .. } => 0x30,
            TooShortPathPolicyModification => 0x31,
            TooShortPathPolicySetModification => 0x32,
            InvalidPolicyItemType { .. } => 0x33,
            InvalidPolicySetItemType { .. } => 0x34,
            HiddenRuleAppend => 0x35,
            HiddenPolicyAppend => 0x36,
            MissingPolicyChild { .. } => 0x37,
            MissingPolicySetChild { .. } => 0x38,
            UntaggedPolicyModification => 0x39,
            MissingPolicyTag => 0x3a,
            PolicyTagsNotMatch { .. } => 0x3b,
            InvalidRootPolicyItemType { .. } => 0x3c,
            HiddenRootPolicyAppend => 0x3d,
            InvalidRootPolicy { .. } => 0x3e,
            MissingRootPolicy => 0x3f,
            EmptyPathModification => 0x40,
            FailedPolicyTransaction { .. } => 0x41,
            UnknownPolicyUpdateOperation { .. } => 0x42,
            InvalidRootQuery => 0x43,
            QueriedElementNotFound { .. } => 0x44,
            QueriedRuleNotFound { .. } => 0x45,
            ElementNotFound { .. } => 0x46,
            UntaggedContentModification { .. } => 0x47,
            MissingContentTag => 0x48,
            ContentTagsNotMatch { .. } => 0x49,
            FailedContentTransaction { .. } => 0x4a,
            InvalidContentUpdateEntity { .. } => 0x4b,
            TooLongContentUpdatePath { .. } => 0x4c,
            RequestBufferOverflow => 0x4d,
            RequestBufferUnderflow => 0x4e,
            RequestVersion { .. } => 0x4f,
            RequestTooManyAttributes { .. } => 0x50,
            RequestTooLongAttributeName { .. } => 0x51,
            RequestTooLongStringValue { .. } => 0x52,
            RequestTooLongCollectionValue { .. } => 0x53,
            RequestAttributeMarshallingNotImplemented { .. } => 0x54,
            RequestAttributeUnmarshallingType { .. } => 0x55,
            RequestAttributeUnmarshallingNotImplemented { .. } => 0x56,
            RequestIPv4InvalidMask { .. } => 0x57,
            RequestIPv6InvalidMask { .. } => 0x58,
            RequestAssignmentsOverflow { .. } => 0x59,
            FieldTypeMismatch { .. } => 0x5a,
            IntegerOverflow { .. } => 0x5b,
            IntegerUnderflow { .. } => 0x5c,
            ResponseEffect { .. } => 0x5d,
            InvalidEffectName { .. } => 0x5e,
            ResponseServerError { .. } => 0x5f,
            RequestTooLarge { .. } => 0x60,
            RequestInvalidUtf8 { .. } => 0x61,
        }
    }

    /// Get the error category for metrics.
    pub fn category(&self) -> &'static str {
        match self.id() {
            0x00 => "external",
            0x01..=0x12 => "evaluation",
            0x13..=0x22 => "value",
            0x23..=0x2d => "configuration",
            0x2e..=0x38 => "structural",
            0x39..=0x46 => "storage",
            0x47..=0x4c => "content",
            _ => "wire",
        }
    }
}

/// Error bound to the chain of constructs it propagated through.
#[derive(Debug, Clone)]
pub struct Error {
    kind: Box<ErrorKind>,
    path: Vec<String>,
}

impl Error {
    /// Create an error of the given kind with empty source path.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
            path: Vec::new(),
        }
    }

    /// Wrap a foreign error.
    pub fn external<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(ErrorKind::External(Arc::new(err)))
    }

    /// Collect several errors into one.
    pub fn multi(errs: Vec<Error>) -> Self {
        Self::new(ErrorKind::Multi(errs))
    }

    /// Create a missing attribute error.
    pub fn missing_attribute() -> Self {
        Self::new(ErrorKind::MissingAttribute)
    }

    /// Create a missing value error.
    pub fn missing_value() -> Self {
        Self::new(ErrorKind::MissingValue)
    }

    /// Create a value type mismatch error.
    pub fn attribute_value_type(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::new(ErrorKind::AttributeValueType {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }

    /// Create a content item type mismatch error.
    pub fn invalid_content_item_type(
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        Self::new(ErrorKind::InvalidContentItemType {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config {
            message: message.into(),
        })
    }

    /// Add a source to the front of the error path.
    pub fn bind(mut self, src: impl Into<String>) -> Self {
        self.path.insert(0, src.into());
        self
    }

    /// Get the kind of the error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Get the source path, outermost construct first.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Get the stable numeric id of the error.
    pub fn id(&self) -> u8 {
        self.kind.id()
    }

    /// Get the error category for metrics.
    pub fn category(&self) -> &'static str {
        self.kind.category()
    }

    /// Check if the error is an evaluation error which resolves to an
    /// indeterminate effect rather than failing the caller.
    pub fn is_recoverable(&self) -> bool {
        self.category() == "evaluation"
    }

    /// Check if the error is a missing value error.
    pub fn is_missing_value(&self) -> bool {
        matches!(*self.kind, ErrorKind::MissingValue)
    }

    /// Get the message without id and path.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return write!(f, "#{:02x}: {}", self.kind.id(), self.kind);
        }

        write!(
            f,
            "#{:02x} ({}): {}",
            self.kind.id(),
            self.path.join(SOURCE_PATH_SEPARATOR),
            self.kind
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind.as_ref() {
            ErrorKind::External(err) => Some(err.as_ref()),
            ErrorKind::FailedPolicyTransaction { cause }
            | ErrorKind::FailedContentTransaction { cause } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

/// Extension trait for binding errors to a source.
pub trait ErrorContext<T> {
    /// Bind the error (if any) to the given source.
    fn bind(self, src: impl Into<String>) -> Result<T>;

    /// Bind the error (if any) to a lazily described source.
    fn bind_with<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn bind(self, src: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.bind(src))
    }

    fn bind_with<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.bind(f()))
    }
}
