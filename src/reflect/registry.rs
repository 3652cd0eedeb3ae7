//! Memoized type registry
//!
//! Descriptors are computed on first access per type and kept for the life
//! of the process. Each type owns a `OnceCell`, so at most one thread builds a
//! given table while the others wait for it; reads afterwards are lock-free
//! apart from the shard lookup.

use std::{any::TypeId, sync::Arc};

use dashmap::DashMap;
use log::debug;
use once_cell::sync::{Lazy, OnceCell};

use crate::{
    core::{utils::short_type_name, RegistrationError},
    service::Controller,
};

use super::{
    decl::{ClassDecl, ControllerDecl},
    descriptor::{ActionTable, PropertyTable},
    object::RestObject,
};

type Slot<T> = Arc<OnceCell<Arc<T>>>;

static ACTIONS: Lazy<DashMap<TypeId, Slot<ActionTable>>> = Lazy::new(DashMap::new);
static PROPERTIES: Lazy<DashMap<TypeId, Slot<PropertyTable>>> = Lazy::new(DashMap::new);

fn memoized<T, F>(
    cache: &DashMap<TypeId, Slot<T>>,
    key: TypeId,
    init: F,
) -> Result<Arc<T>, RegistrationError>
where
    F: FnOnce() -> Result<T, RegistrationError>,
{
    // Clone the slot out so the shard lock is released before `init` runs;
    // `init` may describe other types.
    let slot = cache.entry(key).or_default().clone();
    slot.get_or_try_init(|| init().map(Arc::new)).cloned()
}

/// Describes the actions exposed by controller type `C`.
pub fn describe_actions<C: Controller>() -> Result<Arc<ActionTable>, RegistrationError> {
    memoized(&ACTIONS, TypeId::of::<C>(), || {
        let owner = short_type_name::<C>();
        debug!("Describing actions of [{owner}]");
        let mut decl = ControllerDecl::new();
        C::declare(&mut decl);
        decl.resolve(owner)
    })
}

/// Describes the settable properties of value type `T`.
pub fn describe_properties<T: RestObject>() -> Result<Arc<PropertyTable>, RegistrationError> {
    memoized(&PROPERTIES, TypeId::of::<T>(), || {
        debug!("Describing properties of [{}]", T::TYPE_NAME);
        let mut decl = ClassDecl::<T>::new();
        T::declare(&mut decl);
        decl.resolve(T::TYPE_NAME)
    })
}

#[cfg(test)]
mod tests {
    use std::thread;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        core::{RestResult, TaggedObject, Value},
        reflect::descriptor::{EnumDescriptor, Kind},
        service::Arguments,
    };

    static SHADE: EnumDescriptor = EnumDescriptor {
        name: "Shade",
        constants: &[("LIGHT", 0), ("DARK", 1)],
    };

    #[derive(Default)]
    struct Node {
        label: Option<String>,
        next: Option<Box<Node>>,
        shade: Option<i64>,
    }

    impl RestObject for Node {
        const TYPE_NAME: &'static str = "Node";

        fn declare(decl: &mut ClassDecl<Self>) {
            decl.class::<Node>()
                .enumeration(&SHADE)
                .property("label", "string", |n, v| n.label = v.to_text())
                .describe("Display label")
                .property("next", "Node", |n, v| {
                    if !v.is_null() {
                        n.next = Node::from_value(&v).ok().map(Box::new);
                    }
                })
                .property("shade", "Shade", |n, v| n.shade = v.as_i64());
        }

        fn to_value(&self) -> Value {
            TaggedObject::typed(Self::TYPE_NAME)
                .with("label", self.label.clone())
                .with("next", self.next.as_ref().map(|n| n.to_value()))
                .with("shade", self.shade)
                .into()
        }
    }

    struct Graph;

    #[async_trait]
    impl Controller for Graph {
        fn declare(decl: &mut ControllerDecl) {
            decl.class::<Node>();
            decl.action("head")
                .description("Returns the first node")
                .param("depth", "int")
                .default_value(1)
                .returns("Node");
        }

        async fn invoke(&self, _action: &str, _args: Arguments) -> RestResult<Value> {
            Ok(Value::Null)
        }
    }

    struct Broken;

    #[async_trait]
    impl Controller for Broken {
        fn declare(decl: &mut ControllerDecl) {
            decl.action("get").param("thing", "Thing");
        }

        async fn invoke(&self, _action: &str, _args: Arguments) -> RestResult<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_describe_actions_is_memoized() {
        let first = describe_actions::<Graph>().unwrap();
        let second = describe_actions::<Graph>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first["head"], &second["head"]));

        let head = &first["head"];
        assert_eq!(head.description, "Returns the first node");
        assert_eq!(head.params[0].default, Some(Value::Int(1)));
        assert_eq!(head.returns.as_ref().map(|r| r.kind.type_name()), Some("Node"));
    }

    #[test]
    fn test_describe_properties() {
        let properties = describe_properties::<Node>().unwrap();
        let names: Vec<_> = properties.keys().cloned().collect();
        assert_eq!(names, ["label", "next", "shade"]);
        assert_eq!(properties["label"].setter, "setLabel");
        assert_eq!(properties["label"].description.as_deref(), Some("Display label"));
        assert!(matches!(properties["next"].kind, Kind::Class(c) if c.name() == "Node"));
        assert_eq!(properties["shade"].kind.type_name(), "int");
        assert_eq!(
            properties["shade"].kind.enum_type().map(|e| e.name),
            Some("Shade")
        );
    }

    #[test]
    fn test_unresolved_kind_fails_registration() {
        let err = describe_actions::<Broken>().unwrap_err();
        assert_eq!(err.owner, "Broken");
        assert_eq!(err.member, "get.thing");
        assert_eq!(err.kind, "Thing");
    }

    #[test]
    fn test_concurrent_first_access_yields_one_table() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| describe_properties::<Node>().unwrap()))
            .collect();
        let tables: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(tables.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
