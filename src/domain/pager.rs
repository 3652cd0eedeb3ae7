use crate::{
    core::{TaggedObject, Value},
    reflect::{ClassDecl, RestObject},
};

/// Paging request of a search. Unset fields fall back to page 1 and the
/// configured page size.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pager {
    pub page_index: Option<i64>,
    pub page_size: Option<i64>,
}

impl Pager {
    pub fn page_index(&self) -> u32 {
        self.page_index
            .and_then(|index| u32::try_from(index).ok())
            .filter(|index| *index >= 1)
            .unwrap_or(1)
    }

    pub fn page_size(&self, default: u32) -> u32 {
        self.page_size
            .and_then(|size| u32::try_from(size).ok())
            .filter(|size| *size >= 1)
            .unwrap_or(default)
    }
}

impl RestObject for Pager {
    const TYPE_NAME: &'static str = "Pager";

    fn declare(decl: &mut ClassDecl<Self>) {
        decl.property("pageIndex", "int", |p, v| p.page_index = v.as_i64())
            .describe("1-based page number")
            .property("pageSize", "int", |p, v| p.page_size = v.as_i64());
    }

    fn to_value(&self) -> Value {
        TaggedObject::typed(Self::TYPE_NAME)
            .with("pageIndex", self.page_index)
            .with("pageSize", self.page_size)
            .into()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults() {
        let pager = Pager::default();
        assert_eq!(pager.page_index(), 1);
        assert_eq!(pager.page_size(500), 500);

        let pager = Pager::from_value(&Value::from_json(json!({"pageIndex": "3", "pageSize": 0})))
            .unwrap();
        assert_eq!(pager.page_index(), 3);
        assert_eq!(pager.page_size(25), 25);
    }
}
