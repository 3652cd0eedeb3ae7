//! Type registry: explicit declarations of actions and properties, resolved
//! once per type and cached for the life of the process.

pub mod decl;
pub mod descriptor;
pub mod object;
pub mod registry;

pub use decl::{ActionDecl, ClassDecl, ControllerDecl};
pub use descriptor::{
    ActionDescriptor, ActionTable, ClassRef, EnumDescriptor, Kind, ParamDescriptor, Primitive,
    PropertyDescriptor, PropertyTable, ReturnDescriptor, Symbol,
};
pub use object::{construct, RestObject};
pub use registry::{describe_actions, describe_properties};
