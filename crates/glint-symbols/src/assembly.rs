//! Assemblies - named symbol tables plus their declaration arenas.
//!
//! An assembly is the unit of compilation output: one symbol table, the
//! arena holding its declarations, and the serialized IL of its functions.
//! On disk it is the `GLAS` container described in the codec module.

use crate::codec;
use crate::metadata::SymbolMetadata;
use crate::table::{ROOT_INDEX, SymbolTable};
use glint_ast::{NodeArena, NodeId};
use glint_common::{AssemblyId, SymbolHandle};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// The compilation's own assembly.
pub const TARGET_ASSEMBLY: AssemblyId = AssemblyId(1);
/// The per-compilation table of synthesized swizzle members.
pub const SWIZZLE_ASSEMBLY: AssemblyId = AssemblyId(2);
/// The per-compilation table of synthesized array types.
pub const ARRAY_ASSEMBLY: AssemblyId = AssemblyId(3);
/// The per-compilation table of synthesized pointer types.
pub const POINTER_ASSEMBLY: AssemblyId = AssemblyId(4);
/// Referenced assemblies are registered from this id upward.
pub const FIRST_REFERENCE_ASSEMBLY: u32 = 5;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("assembly file not found: {path}")]
    FileNotFound { path: String },
    #[error("malformed assembly: {0}")]
    Parse(String),
    #[error("unsupported assembly version {0}")]
    UnsupportedVersion(u32),
    #[error("truncated assembly stream")]
    Truncated,
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Default)]
pub struct Assembly {
    name: String,
    pub table: SymbolTable,
    pub arena: NodeArena,
    /// Serialized IL keyed by the function's table-node index at write time.
    il_payloads: BTreeMap<u32, Vec<u8>>,
}

impl Assembly {
    pub fn create(name: impl Into<String>) -> Self {
        Assembly {
            name: name.into(),
            table: SymbolTable::new(),
            arena: NodeArena::new(),
            il_payloads: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split borrows for passes that mutate the arena while reading or
    /// renaming table nodes.
    pub fn parts_mut(&mut self) -> (&mut SymbolTable, &mut NodeArena) {
        (&mut self.table, &mut self.arena)
    }

    /// Insert a declared symbol under `parent`. Returns the new table index,
    /// or `0` on redefinition.
    pub fn add_symbol(&mut self, def: NodeId, metadata: SymbolMetadata, parent: usize) -> usize {
        let Some(name) = self.arena.get(def).name() else {
            return 0;
        };
        self.table.insert(name.as_str(), metadata, parent)
    }

    /// Insert a scope (or signature-named) node under `parent`.
    pub fn add_named(&mut self, name: &str, metadata: SymbolMetadata, parent: usize) -> usize {
        self.table.insert(name, metadata, parent)
    }

    pub fn make_handle(&self, id: AssemblyId, index: usize) -> SymbolHandle {
        self.table.make_handle(id, index)
    }

    pub fn set_il(&mut self, table_index: u32, payload: Vec<u8>) {
        self.il_payloads.insert(table_index, payload);
    }

    pub fn il_payloads(&self) -> &BTreeMap<u32, Vec<u8>> {
        &self.il_payloads
    }

    pub fn write_to(&self, writer: &mut impl Write) -> Result<(), AssemblyError> {
        debug!(
            name = %self.name,
            symbols = self.table.len(),
            functions = self.il_payloads.len(),
            "writing assembly"
        );
        codec::write_assembly(self, writer)
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), AssemblyError> {
        let mut file = File::create(path)?;
        self.write_to(&mut file)
    }

    pub fn load_from(name: impl Into<String>, reader: &mut impl Read) -> Result<Assembly, AssemblyError> {
        codec::read_assembly(name.into(), reader)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Assembly, AssemblyError> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                AssemblyError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                AssemblyError::from(err)
            }
        })?;
        Assembly::load_from(path.display().to_string(), &mut file)
    }

    /// Fully-qualified name of a table node.
    pub fn fqn(&self, index: usize) -> String {
        self.table.fully_qualified_name(index)
    }

    /// Look up a dotted path from the table root.
    pub fn find(&self, path: &str) -> Option<usize> {
        self.table.find_full_path(path, ROOT_INDEX)
    }
}

/// The set of assemblies a compilation references.
#[derive(Debug, Default, Clone)]
pub struct AssemblyCollection {
    assemblies: Vec<Arc<Assembly>>,
}

impl AssemblyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, assembly: Arc<Assembly>) -> AssemblyId {
        let id = AssemblyId(FIRST_REFERENCE_ASSEMBLY + self.assemblies.len() as u32);
        self.assemblies.push(assembly);
        id
    }

    pub fn get(&self, id: AssemblyId) -> Option<&Arc<Assembly>> {
        let index = id.0.checked_sub(FIRST_REFERENCE_ASSEMBLY)? as usize;
        self.assemblies.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssemblyId, &Arc<Assembly>)> {
        self.assemblies
            .iter()
            .enumerate()
            .map(|(i, assembly)| (AssemblyId(FIRST_REFERENCE_ASSEMBLY + i as u32), assembly))
    }

    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }
}
