//! Declarative table of exposed operations.
//!
//! One [`OperationSpec`] per exposed request: list and get for every
//! enabled object kind, plus one invoke entry per registered method. The
//! routing layer reads permissions and rate limits from here; the core
//! never enforces them.

use serde::Serialize;
use simgate_types::ObjectKind;

use crate::config::ServletsConfig;
use crate::identity::IdentityRegistry;
use crate::methods::MethodRegistry;

/// Request shape of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    /// Every object of a kind.
    List,
    /// One object.
    Get,
    /// A method call on one object.
    Invoke,
}

/// One exposed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationSpec {
    /// Unique operation name (`player.list`, `player.invoke.kick`).
    pub name: String,
    /// Object kind the operation addresses.
    pub kind: ObjectKind,
    /// Request shape.
    pub verb: Verb,
    /// Method name, for invoke operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// HTTP method.
    pub http_method: &'static str,
    /// Route template.
    pub path: String,
    /// Permission node required to call the operation.
    pub permission: String,
    /// Declared requests per second, if limited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// Every exposed operation, in kind order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OperationTable {
    operations: Vec<OperationSpec>,
}

impl OperationTable {
    /// Build the table from the registries and servlet flags.
    pub fn build<W: 'static>(
        identities: &IdentityRegistry<W>,
        methods: &MethodRegistry<W>,
        servlets: &ServletsConfig,
    ) -> Self {
        let mut operations = Vec::new();
        for kind in identities.kinds() {
            if !servlets.servlet_enabled(kind.as_str()) {
                continue;
            }
            let spec = |verb: Verb, method: Option<&str>, http_method, path: String| {
                let name = method.map_or_else(
                    || format!("{kind}.{}", verb_label(verb)),
                    |method| format!("{kind}.invoke.{method}"),
                );
                OperationSpec {
                    rate_limit: servlets.rate_limit.get(&name).copied(),
                    permission: name.clone(),
                    name,
                    kind,
                    verb,
                    method: method.map(str::to_owned),
                    http_method,
                    path,
                }
            };
            operations.push(spec(Verb::List, None, "GET", format!("/api/{kind}")));
            operations.push(spec(Verb::Get, None, "GET", format!("/api/{kind}/{{id}}")));
            for descriptor in methods.methods_for(kind) {
                operations.push(spec(
                    Verb::Invoke,
                    Some(&descriptor.name),
                    "POST",
                    format!("/api/{kind}/{{id}}/invoke"),
                ));
            }
        }
        Self { operations }
    }

    /// Find an operation.
    pub fn find(&self, kind: ObjectKind, verb: Verb, method: Option<&str>) -> Option<&OperationSpec> {
        self.operations
            .iter()
            .find(|op| op.kind == kind && op.verb == verb && op.method.as_deref() == method)
    }

    /// Whether any operation addresses `kind`.
    pub fn is_exposed(&self, kind: ObjectKind) -> bool {
        self.operations.iter().any(|op| op.kind == kind)
    }

    /// Every operation.
    pub fn iter(&self) -> impl Iterator<Item = &OperationSpec> {
        self.operations.iter()
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

const fn verb_label(verb: Verb) -> &'static str {
    match verb {
        Verb::List => "list",
        Verb::Get => "get",
        Verb::Invoke => "invoke",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::{Value, json};
    use simgate_types::{DetailLevel, KeyId};

    use super::*;
    use crate::error::SimError;
    use crate::identity::LiveKind;
    use crate::methods::Args;

    struct Lobby;

    struct Seat;

    impl LiveKind<Lobby> for Seat {
        const KIND: ObjectKind = ObjectKind::new("seat");
        type Live = ();

        fn identify(_live: &()) -> KeyId {
            KeyId::Name(String::from("only"))
        }

        fn parse_id(raw: &str) -> Result<KeyId, SimError> {
            Ok(KeyId::parse_name(raw)?)
        }

        fn resolve<'w>(_world: &'w Lobby, _id: &KeyId) -> Option<&'w ()> {
            None
        }

        fn resolve_mut<'w>(_world: &'w mut Lobby, _id: &KeyId) -> Option<&'w mut ()> {
            None
        }

        fn enumerate(_world: &Lobby) -> Vec<&()> {
            Vec::new()
        }

        fn capture(_live: &(), _detail: DetailLevel) -> Value {
            json!({})
        }
    }

    struct Door;

    impl LiveKind<Lobby> for Door {
        const KIND: ObjectKind = ObjectKind::new("door");
        type Live = ();

        fn identify(_live: &()) -> KeyId {
            KeyId::Name(String::from("front"))
        }

        fn parse_id(raw: &str) -> Result<KeyId, SimError> {
            Ok(KeyId::parse_name(raw)?)
        }

        fn resolve<'w>(_world: &'w Lobby, _id: &KeyId) -> Option<&'w ()> {
            None
        }

        fn resolve_mut<'w>(_world: &'w mut Lobby, _id: &KeyId) -> Option<&'w mut ()> {
            None
        }

        fn enumerate(_world: &Lobby) -> Vec<&()> {
            Vec::new()
        }

        fn capture(_live: &(), _detail: DetailLevel) -> Value {
            json!({})
        }
    }

    fn registries() -> (IdentityRegistry<Lobby>, MethodRegistry<Lobby>) {
        let mut identities = IdentityRegistry::new();
        identities.register::<Seat>().unwrap();
        identities.register::<Door>().unwrap();
        let mut methods = MethodRegistry::new(&identities);
        methods
            .register::<Seat, _>("reserve", "Reserve the seat", vec![], |_live: &mut (), _args: &Args| -> Result<Value, SimError> {
                Ok(Value::Null)
            })
            .unwrap();
        (identities, methods)
    }

    #[test]
    fn builds_list_get_and_invoke_entries() {
        let (identities, methods) = registries();
        let mut servlets = ServletsConfig::default();
        servlets.rate_limit.insert(String::from("seat.list"), 5);
        let table = OperationTable::build(&identities, &methods, &servlets);

        assert_eq!(table.len(), 5);
        let list = table.find(Seat::KIND, Verb::List, None).unwrap();
        assert_eq!(list.path, "/api/seat");
        assert_eq!(list.rate_limit, Some(5));
        let invoke = table.find(Seat::KIND, Verb::Invoke, Some("reserve")).unwrap();
        assert_eq!(invoke.name, "seat.invoke.reserve");
        assert_eq!(invoke.http_method, "POST");
        assert_eq!(invoke.path, "/api/seat/{id}/invoke");
    }

    #[test]
    fn disabled_servlet_is_not_exposed() {
        let (identities, methods) = registries();
        let mut servlets = ServletsConfig::default();
        servlets.enabled.insert(String::from("door"), false);
        let table = OperationTable::build(&identities, &methods, &servlets);
        assert!(!table.is_exposed(Door::KIND));
        assert!(table.is_exposed(Seat::KIND));
    }
}
