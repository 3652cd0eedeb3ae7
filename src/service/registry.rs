//! Registered services, keyed by the name they are reachable under.

use std::{collections::HashSet, sync::Arc};

use indexmap::IndexMap;
use log::{debug, info};

use crate::{
    core::RegistrationError,
    reflect::{describe_actions, ActionDescriptor, ActionTable, ClassRef, Kind},
};

use super::Controller;

/// A registered controller together with its resolved action table.
#[derive(Clone)]
pub struct ServiceHandle {
    name: Arc<str>,
    actions: Arc<ActionTable>,
    controller: Arc<dyn Controller>,
}

impl ServiceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &ActionTable {
        &self.actions
    }

    pub fn action(&self, name: &str) -> Option<Arc<ActionDescriptor>> {
        self.actions.get(name).cloned()
    }

    pub fn controller(&self) -> &dyn Controller {
        self.controller.as_ref()
    }
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("name", &self.name)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Services in registration order.
#[derive(Default)]
pub struct ServiceRegistry {
    services: IndexMap<String, ServiceHandle>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `controller` under `name`.
    ///
    /// The controller's actions and every class reachable from them are
    /// resolved here, so an undeclared kind fails startup instead of a request.
    pub fn register<C: Controller>(
        &mut self,
        name: &str,
        controller: C,
    ) -> Result<&ServiceHandle, RegistrationError> {
        let actions = describe_actions::<C>()?;
        validate_reachable(&actions)?;

        info!(
            "Registering service [{name}] with {} action(s)",
            actions.len()
        );
        let handle = ServiceHandle {
            name: Arc::from(name),
            actions,
            controller: Arc::new(controller),
        };
        let index = self.services.insert_full(name.to_string(), handle).0;
        Ok(&self.services[index])
    }

    pub fn get(&self, name: &str) -> Option<&ServiceHandle> {
        self.services.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceHandle> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn validate_reachable(actions: &ActionTable) -> Result<(), RegistrationError> {
    let mut seen = HashSet::new();
    let kinds = actions.values().flat_map(|action| {
        action
            .params
            .iter()
            .map(|p| p.kind)
            .chain(action.returns.iter().map(|r| r.kind))
    });
    for kind in kinds {
        if let Kind::Class(class) = kind {
            walk_class(class, &mut seen)?;
        }
    }
    Ok(())
}

fn walk_class(class: ClassRef, seen: &mut HashSet<&'static str>) -> Result<(), RegistrationError> {
    if !seen.insert(class.name()) {
        return Ok(());
    }
    debug!("Resolving class [{}]", class.name());
    let properties = class.properties()?;
    for property in properties.values() {
        if let Kind::Class(nested) = property.kind {
            walk_class(nested, seen)?;
        }
    }
    Ok(())
}
