use crate::core::{TaggedObject, Value};

/// One page of objects plus the total number of matches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectsList<T> {
    pub objects: Vec<T>,
    pub total_count: i64,
}

impl<T> ObjectsList<T> {
    pub fn new(objects: Vec<T>) -> Self {
        let total_count = objects.len() as i64;
        Self {
            objects,
            total_count,
        }
    }

    /// Typed wire form tagged `type_name`; each object is rendered with `render`.
    pub fn to_tagged(&self, type_name: &str, render: impl Fn(&T) -> Value) -> Value {
        TaggedObject::typed(type_name)
            .with("objects", self.objects.iter().map(render).collect::<Vec<_>>())
            .with("totalCount", self.total_count)
            .into()
    }
}
