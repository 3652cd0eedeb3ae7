//! Explicit declaration builders
//!
//! Controllers and value types describe their members here once; the
//! registry resolves every declared kind name against the owner's symbol
//! table and memoizes the result.

use std::{any::Any, marker::PhantomData, sync::Arc};

use crate::core::{utils::to_first_upper, RegistrationError, Value};

use super::{
    descriptor::{
        ActionDescriptor, ActionTable, ClassRef, EnumDescriptor, Kind, ParamDescriptor,
        PropertyDescriptor, PropertyTable, ReturnDescriptor, Setter, Symbol, SymbolTable,
    },
    object::RestObject,
};

/// Action declarations of a controller.
#[derive(Default)]
pub struct ControllerDecl {
    symbols: SymbolTable,
    actions: Vec<ActionDecl>,
}

impl ControllerDecl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry to the controller's symbol table.
    pub fn symbol(&mut self, name: &str, symbol: Symbol) -> &mut Self {
        self.symbols.insert(name.to_string(), symbol);
        self
    }

    /// Registers `T` under its type name.
    pub fn class<T: RestObject>(&mut self) -> &mut Self {
        self.symbol(T::TYPE_NAME, Symbol::Class(ClassRef::of::<T>()))
    }

    /// Registers an enum under its name.
    pub fn enumeration(&mut self, descriptor: &'static EnumDescriptor) -> &mut Self {
        self.symbol(descriptor.name, Symbol::Enum(descriptor))
    }

    /// Starts declaring a new action.
    pub fn action(&mut self, name: &str) -> &mut ActionDecl {
        self.actions.push(ActionDecl::new(name));
        let last = self.actions.len() - 1;
        &mut self.actions[last]
    }

    pub(crate) fn resolve(self, owner: &str) -> Result<ActionTable, RegistrationError> {
        let mut table = ActionTable::new();
        for action in self.actions {
            let descriptor = action.resolve(owner, &self.symbols)?;
            table.insert(descriptor.name.clone(), Arc::new(descriptor));
        }
        Ok(table)
    }
}

struct ParamDecl {
    name: String,
    kind: String,
    default: Option<Value>,
    description: Option<String>,
}

pub struct ActionDecl {
    name: String,
    description: String,
    params: Vec<ParamDecl>,
    returns: Option<String>,
    multi_request: bool,
}

impl ActionDecl {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            params: Vec::new(),
            returns: None,
            multi_request: true,
        }
    }

    pub fn description(&mut self, text: &str) -> &mut Self {
        self.description = text.to_string();
        self
    }

    /// Appends an argument; arguments are passed to the action in declaration order.
    pub fn param(&mut self, name: &str, kind: &str) -> &mut Self {
        self.params.push(ParamDecl {
            name: name.to_string(),
            kind: kind.to_string(),
            default: None,
            description: None,
        });
        self
    }

    /// Describes the most recently declared argument.
    pub fn describe(&mut self, text: &str) -> &mut Self {
        if let Some(param) = self.params.last_mut() {
            param.description = Some(text.to_string());
        }
        self
    }

    /// Gives the most recently declared argument a default value.
    pub fn default_value(&mut self, value: impl Into<Value>) -> &mut Self {
        if let Some(param) = self.params.last_mut() {
            param.default = Some(value.into());
        }
        self
    }

    pub fn returns(&mut self, kind: &str) -> &mut Self {
        self.returns = Some(kind.to_string());
        self
    }

    pub fn multi_request(&mut self, enabled: bool) -> &mut Self {
        self.multi_request = enabled;
        self
    }

    fn resolve(
        self,
        owner: &str,
        symbols: &SymbolTable,
    ) -> Result<ActionDescriptor, RegistrationError> {
        let mut params = Vec::with_capacity(self.params.len());
        for param in self.params {
            let member = format!("{}.{}", self.name, param.name);
            params.push(ParamDescriptor {
                kind: Kind::resolve(owner, &member, &param.kind, symbols)?,
                name: param.name,
                default: param.default,
                description: param.description,
            });
        }

        let returns = match &self.returns {
            Some(kind) => {
                let member = format!("{}.return", self.name);
                Some(ReturnDescriptor {
                    kind: Kind::resolve(owner, &member, kind, symbols)?,
                })
            }
            None => None,
        };

        Ok(ActionDescriptor {
            name: self.name,
            params,
            returns,
            description: self.description,
            multi_request: self.multi_request,
        })
    }
}

struct PropertyDecl<T> {
    name: String,
    kind: String,
    description: Option<String>,
    setter: Arc<dyn Fn(&mut T, Value) + Send + Sync>,
}

/// Property declarations of a value type.
pub struct ClassDecl<T> {
    symbols: SymbolTable,
    properties: Vec<PropertyDecl<T>>,
    _marker: PhantomData<fn(&mut T)>,
}

impl<T: RestObject> Default for ClassDecl<T> {
    fn default() -> Self {
        Self {
            symbols: SymbolTable::new(),
            properties: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: RestObject> ClassDecl<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(&mut self, name: &str, symbol: Symbol) -> &mut Self {
        self.symbols.insert(name.to_string(), symbol);
        self
    }

    pub fn class<U: RestObject>(&mut self) -> &mut Self {
        self.symbol(U::TYPE_NAME, Symbol::Class(ClassRef::of::<U>()))
    }

    pub fn enumeration(&mut self, descriptor: &'static EnumDescriptor) -> &mut Self {
        self.symbol(descriptor.name, Symbol::Enum(descriptor))
    }

    /// Declares a settable property. The setter receives the value already
    /// coerced to `kind`, or `Null` when the property is absent.
    pub fn property<F>(&mut self, name: &str, kind: &str, setter: F) -> &mut Self
    where
        F: Fn(&mut T, Value) + Send + Sync + 'static,
    {
        self.properties.push(PropertyDecl {
            name: name.to_string(),
            kind: kind.to_string(),
            description: None,
            setter: Arc::new(setter),
        });
        self
    }

    /// Describes the most recently declared property.
    pub fn describe(&mut self, text: &str) -> &mut Self {
        if let Some(property) = self.properties.last_mut() {
            property.description = Some(text.to_string());
        }
        self
    }

    pub(crate) fn resolve(self, owner: &str) -> Result<PropertyTable, RegistrationError> {
        let mut table = PropertyTable::new();
        for property in self.properties {
            let kind = Kind::resolve(owner, &property.name, &property.kind, &self.symbols)?;
            let typed = property.setter;
            let apply: Setter = Arc::new(move |target: &mut dyn Any, value: Value| {
                if let Some(object) = target.downcast_mut::<T>() {
                    typed(object, value);
                }
            });
            table.insert(
                property.name.clone(),
                PropertyDescriptor {
                    setter: format!("set{}", to_first_upper(&property.name)),
                    name: property.name,
                    kind,
                    description: property.description,
                    apply,
                },
            );
        }
        Ok(table)
    }
}
