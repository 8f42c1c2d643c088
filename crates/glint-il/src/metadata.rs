//! IL metadata tables.
//!
//! `Type`, `Func`, and `Field` operands reference entries in these tables by
//! id; the tables are serialized beside the IL payload so a reader can map
//! ids back to fully-qualified names.

use crate::value::{IlFieldId, IlFuncId, IlTypeId};
use indexmap::IndexSet;
use rustc_hash::FxHashMap;

#[derive(Clone, Debug, Default)]
pub struct IlMetadata {
    types: IndexSet<String>,
    funcs: IndexSet<String>,
    /// (type id, field name) → field id, dense per type.
    fields: FxHashMap<(IlTypeId, String), IlFieldId>,
    field_counts: FxHashMap<IlTypeId, u32>,
}

impl IlMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a type by fully-qualified name.
    pub fn type_id(&mut self, fqn: &str) -> IlTypeId {
        match self.types.get_index_of(fqn) {
            Some(index) => index as IlTypeId,
            None => self.types.insert_full(fqn.to_string()).0 as IlTypeId,
        }
    }

    pub fn type_name(&self, id: IlTypeId) -> Option<&str> {
        self.types.get_index(id as usize).map(String::as_str)
    }

    pub fn func_id(&mut self, fqn: &str) -> IlFuncId {
        match self.funcs.get_index_of(fqn) {
            Some(index) => index as IlFuncId,
            None => self.funcs.insert_full(fqn.to_string()).0 as IlFuncId,
        }
    }

    pub fn func_name(&self, id: IlFuncId) -> Option<&str> {
        self.funcs.get_index(id as usize).map(String::as_str)
    }

    pub fn field_id(&mut self, type_id: IlTypeId, field: &str) -> IlFieldId {
        if let Some(&id) = self.fields.get(&(type_id, field.to_string())) {
            return id;
        }
        let counter = self.field_counts.entry(type_id).or_insert(0);
        let id = *counter;
        *counter += 1;
        self.fields.insert((type_id, field.to_string()), id);
        id
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn func_count(&self) -> usize {
        self.funcs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_dense() {
        let mut meta = IlMetadata::new();
        let a = meta.type_id("gfx.Material");
        let b = meta.type_id("float4");
        assert_eq!(meta.type_id("gfx.Material"), a);
        assert_eq!(b, a + 1);
        assert_eq!(meta.type_name(a), Some("gfx.Material"));
    }

    #[test]
    fn field_ids_are_per_type() {
        let mut meta = IlMetadata::new();
        let m = meta.type_id("M");
        let n = meta.type_id("N");
        assert_eq!(meta.field_id(m, "x"), 0);
        assert_eq!(meta.field_id(m, "y"), 1);
        assert_eq!(meta.field_id(n, "x"), 0);
        assert_eq!(meta.field_id(m, "x"), 0);
    }
}
