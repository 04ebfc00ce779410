//! Whitelisted live operations: `(kind, method name) -> handler`.
//!
//! Every method is registered up front with a parameter schema. Arguments
//! are validated against the schema on the calling thread, before anything
//! is queued on the bridge, so malformed requests never cost a trip to the
//! simulation thread.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use simgate_types::{KeyId, ObjectKey, ObjectKind};
use uuid::Uuid;

use crate::error::SimError;
use crate::identity::{IdentityRegistry, LiveKind};

// ---------------------------------------------------------------------------
// Parameter schema
// ---------------------------------------------------------------------------

/// Accepted JSON type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// A JSON string.
    String,
    /// A JSON integer.
    Integer,
    /// Any JSON number.
    Number,
    /// A JSON boolean.
    Bool,
    /// A string holding a hyphenated UUID.
    Uuid,
    /// Anything.
    Any,
}

impl ParamType {
    /// Whether `value` has this type.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Uuid => value
                .as_str()
                .is_some_and(|raw| KeyId::parse_uuid(raw).is_ok()),
            Self::Any => true,
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Accepted type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Whether the parameter may be omitted.
    #[serde(default)]
    pub optional: bool,
}

impl ParamSpec {
    /// A required parameter.
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: false,
        }
    }

    /// An optional parameter.
    pub fn optional(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            optional: true,
        }
    }
}

/// Check that a schema is well formed: unique names and no required
/// parameter after an optional one.
pub fn check_schema(params: &[ParamSpec]) -> Result<(), SimError> {
    let mut seen = BTreeSet::new();
    let mut optional_seen = false;
    for param in params {
        if param.name.is_empty() {
            return Err(SimError::invalid("parameter name must not be empty"));
        }
        if !seen.insert(param.name.as_str()) {
            return Err(SimError::invalid(format!(
                "duplicate parameter '{}'",
                param.name
            )));
        }
        if param.optional {
            optional_seen = true;
        } else if optional_seen {
            return Err(SimError::invalid(format!(
                "required parameter '{}' follows an optional one",
                param.name
            )));
        }
    }
    Ok(())
}

/// Validate named arguments against a schema.
///
/// # Errors
///
/// [`SimError::InvalidArgument`] for unknown, missing or mistyped
/// arguments.
pub fn validate_args(params: &[ParamSpec], raw: &Map<String, Value>) -> Result<Args, SimError> {
    if let Some(unknown) = raw
        .keys()
        .find(|key| !params.iter().any(|param| &param.name == *key))
    {
        return Err(SimError::invalid(format!("unknown parameter '{unknown}'")));
    }
    for param in params {
        match raw.get(&param.name) {
            None | Some(Value::Null) if param.optional => {}
            None | Some(Value::Null) => {
                return Err(SimError::invalid(format!(
                    "missing required parameter '{}'",
                    param.name
                )));
            }
            Some(value) if !param.param_type.accepts(value) => {
                return Err(SimError::invalid(format!(
                    "parameter '{}' must be of type {:?}",
                    param.name, param.param_type
                )));
            }
            Some(_) => {}
        }
    }
    Ok(Args {
        values: raw.clone(),
    })
}

/// Validated arguments of a method call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Map<String, Value>,
}

impl Args {
    /// Raw value of a parameter.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|value| !value.is_null())
    }

    /// A required string parameter.
    pub fn str(&self, name: &str) -> Result<&str, SimError> {
        self.value(name)
            .and_then(Value::as_str)
            .ok_or_else(|| missing(name))
    }

    /// An optional string parameter.
    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// A required integer parameter.
    pub fn i64(&self, name: &str) -> Result<i64, SimError> {
        self.value(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| missing(name))
    }

    /// A required number parameter.
    pub fn f64(&self, name: &str) -> Result<f64, SimError> {
        self.value(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| missing(name))
    }

    /// A required boolean parameter.
    pub fn bool(&self, name: &str) -> Result<bool, SimError> {
        self.value(name)
            .and_then(Value::as_bool)
            .ok_or_else(|| missing(name))
    }

    /// A required UUID parameter.
    pub fn uuid(&self, name: &str) -> Result<Uuid, SimError> {
        self.str(name)
            .and_then(|raw| Uuid::parse_str(raw).map_err(|err| SimError::invalid(err.to_string())))
    }

    /// All arguments as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

fn missing(name: &str) -> SimError {
    SimError::invalid(format!("parameter '{name}' is missing or has the wrong type"))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type Handler<W> = Arc<dyn Fn(&mut W, &KeyId, &Args) -> Result<Value, SimError> + Send + Sync>;

/// Public description of a registered method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    /// Kind the method applies to.
    pub kind: ObjectKind,
    /// Method name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Parameter schema.
    pub params: Vec<ParamSpec>,
}

struct MethodEntry<W> {
    descriptor: MethodDescriptor,
    handler: Handler<W>,
}

/// A validated call, ready to run on the simulation thread.
pub struct PreparedCall<W> {
    key: ObjectKey,
    handler: Handler<W>,
    args: Args,
}

impl<W> PreparedCall<W> {
    /// Run the method against the live object.
    pub fn run(self, world: &mut W) -> Result<Value, SimError> {
        (self.handler)(world, &self.key.id, &self.args)
    }

    /// The target object.
    pub const fn key(&self) -> &ObjectKey {
        &self.key
    }
}

/// Table of invocable methods per object kind.
pub struct MethodRegistry<W> {
    known_kinds: BTreeSet<ObjectKind>,
    methods: BTreeMap<(ObjectKind, String), MethodEntry<W>>,
}

impl<W> core::fmt::Debug for MethodRegistry<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.methods.keys().map(|(kind, name)| format!("{kind}.{name}")))
            .finish()
    }
}

impl<W: 'static> MethodRegistry<W> {
    /// A registry accepting methods for the kinds in `identities`.
    pub fn new(identities: &IdentityRegistry<W>) -> Self {
        Self {
            known_kinds: identities.kinds().collect(),
            methods: BTreeMap::new(),
        }
    }

    /// Register a method operating on a single live object.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidArgument`] if the kind is unknown, the name is
    /// empty or taken, or the schema is malformed.
    pub fn register<K, F>(
        &mut self,
        name: &str,
        description: &str,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Result<(), SimError>
    where
        K: LiveKind<W>,
        F: Fn(&mut K::Live, &Args) -> Result<Value, SimError> + Send + Sync + 'static,
    {
        let handler: Handler<W> = Arc::new(move |world: &mut W, id: &KeyId, args: &Args| {
            let live = K::resolve_mut(world, id)
                .ok_or_else(|| SimError::not_found(ObjectKey::new(K::KIND, id.clone())))?;
            handler(live, args)
        });
        self.insert(K::KIND, name, description, params, handler)
    }

    /// Register a method that needs the whole world (messaging, spawning,
    /// cross-object updates). The target object must exist.
    pub fn register_with_world<K, F>(
        &mut self,
        name: &str,
        description: &str,
        params: Vec<ParamSpec>,
        handler: F,
    ) -> Result<(), SimError>
    where
        K: LiveKind<W>,
        F: Fn(&mut W, &KeyId, &Args) -> Result<Value, SimError> + Send + Sync + 'static,
    {
        let handler: Handler<W> = Arc::new(move |world: &mut W, id: &KeyId, args: &Args| {
            if K::resolve(world, id).is_none() {
                return Err(SimError::not_found(ObjectKey::new(K::KIND, id.clone())));
            }
            handler(world, id, args)
        });
        self.insert(K::KIND, name, description, params, handler)
    }

    fn insert(
        &mut self,
        kind: ObjectKind,
        name: &str,
        description: &str,
        params: Vec<ParamSpec>,
        handler: Handler<W>,
    ) -> Result<(), SimError> {
        if !self.known_kinds.contains(&kind) {
            return Err(SimError::invalid(format!(
                "cannot register method '{name}' for unknown kind '{kind}'"
            )));
        }
        if name.is_empty() {
            return Err(SimError::invalid("method name must not be empty"));
        }
        let slot = (kind, name.to_owned());
        if self.methods.contains_key(&slot) {
            return Err(SimError::invalid(format!(
                "method '{kind}.{name}' is already registered"
            )));
        }
        check_schema(&params)?;
        let descriptor = MethodDescriptor {
            kind,
            name: name.to_owned(),
            description: description.to_owned(),
            params,
        };
        self.methods.insert(
            slot,
            MethodEntry {
                descriptor,
                handler,
            },
        );
        Ok(())
    }

    /// Descriptors of every method registered for `kind`.
    pub fn methods_for(&self, kind: ObjectKind) -> Vec<&MethodDescriptor> {
        self.methods
            .iter()
            .filter(|((entry_kind, _), _)| *entry_kind == kind)
            .map(|(_, entry)| &entry.descriptor)
            .collect()
    }

    /// Look a method up and validate `raw` against its schema.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidArgument`] for an unknown method or bad arguments.
    pub fn prepare(
        &self,
        key: &ObjectKey,
        method: &str,
        raw: &Map<String, Value>,
    ) -> Result<PreparedCall<W>, SimError> {
        let entry = self
            .methods
            .get(&(key.kind, method.to_owned()))
            .ok_or_else(|| {
                SimError::invalid(format!("unknown method '{}.{method}'", key.kind))
            })?;
        let args = validate_args(&entry.descriptor.params, raw)?;
        Ok(PreparedCall {
            key: key.clone(),
            handler: Arc::clone(&entry.handler),
            args,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use simgate_types::DetailLevel;

    use super::*;

    #[derive(Default)]
    struct Board {
        counters: BTreeMap<String, i64>,
    }

    struct CounterKind;

    impl LiveKind<Board> for CounterKind {
        const KIND: ObjectKind = ObjectKind::new("counter");
        type Live = i64;

        fn identify(_live: &i64) -> KeyId {
            KeyId::Name(String::new())
        }

        fn parse_id(raw: &str) -> Result<KeyId, SimError> {
            Ok(KeyId::parse_name(raw)?)
        }

        fn resolve<'w>(world: &'w Board, id: &KeyId) -> Option<&'w i64> {
            match id {
                KeyId::Name(name) => world.counters.get(name),
                KeyId::Uuid(_) | KeyId::Coord { .. } => None,
            }
        }

        fn resolve_mut<'w>(world: &'w mut Board, id: &KeyId) -> Option<&'w mut i64> {
            match id {
                KeyId::Name(name) => world.counters.get_mut(name),
                KeyId::Uuid(_) | KeyId::Coord { .. } => None,
            }
        }

        fn enumerate(world: &Board) -> Vec<&i64> {
            world.counters.values().collect()
        }

        fn capture(live: &i64, _detail: DetailLevel) -> Value {
            json!({ "value": live })
        }
    }

    fn registry() -> MethodRegistry<Board> {
        let mut identities = IdentityRegistry::new();
        identities.register::<CounterKind>().unwrap();
        let mut methods = MethodRegistry::new(&identities);
        methods
            .register::<CounterKind, _>(
                "add",
                "Add to the counter",
                vec![
                    ParamSpec::required("amount", ParamType::Integer),
                    ParamSpec::optional("note", ParamType::String),
                ],
                |live, args| {
                    *live = live.saturating_add(args.i64("amount")?);
                    Ok(json!(*live))
                },
            )
            .unwrap();
        methods
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new(CounterKind::KIND, KeyId::Name(name.to_owned()))
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn prepared_call_mutates_live_object() {
        let methods = registry();
        let mut board = Board::default();
        board.counters.insert(String::from("hits"), 1);

        let call = methods
            .prepare(&key("hits"), "add", &object(json!({"amount": 4})))
            .unwrap();
        assert_eq!(call.run(&mut board).unwrap(), json!(5));
        assert_eq!(board.counters.get("hits"), Some(&5));
    }

    #[test]
    fn bad_arguments_are_rejected_before_running() {
        let methods = registry();
        let cases = [
            json!({}),
            json!({"amount": "four"}),
            json!({"amount": 1, "extra": true}),
            json!({"amount": 1.5}),
        ];
        for raw in cases {
            let err = methods
                .prepare(&key("hits"), "add", &object(raw))
                .err()
                .unwrap();
            assert!(matches!(err, SimError::InvalidArgument(_)));
        }
        let unknown = methods.prepare(&key("hits"), "reset", &Map::new()).err().unwrap();
        assert!(matches!(unknown, SimError::InvalidArgument(_)));
    }

    #[test]
    fn missing_object_is_not_found() {
        let methods = registry();
        let call = methods
            .prepare(&key("ghost"), "add", &object(json!({"amount": 1})))
            .unwrap();
        let err = call.run(&mut Board::default()).unwrap_err();
        assert!(matches!(err, SimError::NotFound(_)));
    }

    #[test]
    fn registration_is_validated() {
        let mut methods = registry();
        let noop = |_live: &mut i64, _args: &Args| -> Result<Value, SimError> { Ok(Value::Null) };

        assert!(methods.register::<CounterKind, _>("add", "", vec![], noop).is_err());
        assert!(methods.register::<CounterKind, _>("", "", vec![], noop).is_err());
        let out_of_order = vec![
            ParamSpec::optional("a", ParamType::Any),
            ParamSpec::required("b", ParamType::Any),
        ];
        assert!(methods.register::<CounterKind, _>("reset", "", out_of_order, noop).is_err());
        let duplicated = vec![
            ParamSpec::required("a", ParamType::Any),
            ParamSpec::required("a", ParamType::Any),
        ];
        assert!(methods.register::<CounterKind, _>("reset", "", duplicated, noop).is_err());
        assert!(methods.register::<CounterKind, _>("reset", "", vec![], noop).is_ok());
        assert_eq!(methods.methods_for(CounterKind::KIND).len(), 2);
    }

    #[test]
    fn uuid_type_requires_hyphenated_form() {
        let id = Uuid::new_v4();
        assert!(ParamType::Uuid.accepts(&json!(id.to_string())));
        assert!(!ParamType::Uuid.accepts(&json!(id.simple().to_string())));
        assert!(!ParamType::Uuid.accepts(&json!(42)));
    }
}
