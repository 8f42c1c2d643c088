//! The compilation driver.
//!
//! Units are parsed in parallel, each into its own arena; results merge into
//! the target assembly under a writer lock. Analysis runs in three passes
//! over the merged tree, then every function body lowers to IL, runs the
//! optimizer pipeline, and serializes into the assembly container.

use glint_analysis::{check, collect, resolve, resolve_external};
use glint_ast::{NodeArena, NodeData, NodeId};
use glint_common::{
    AssemblyId, Diagnostic, DiagnosticBag, SourceId, SymbolHandle, diagnostic_codes,
};
use glint_il::{IlMetadata, SymbolNames, codec, lower_function, optimize};
use glint_symbols::{
    ARRAY_ASSEMBLY, ArrayManager, Assembly, AssemblyCollection, SWIZZLE_ASSEMBLY, SwizzleManager,
    SymbolKind, TARGET_ASSEMBLY, primitives,
};
use rayon::prelude::*;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// One input file handed to the front-end.
#[derive(Clone, Debug)]
pub struct SourceUnit {
    pub id: SourceId,
    pub name: String,
    pub text: String,
}

/// What the front-end produces per unit: an AST in the unit's own arena.
pub struct ParsedUnit {
    pub arena: NodeArena,
    pub root: NodeId,
    pub diagnostics: DiagnosticBag,
}

/// The parser collaborator. Implementations build the AST for one unit;
/// `parse` runs on worker threads.
pub trait Frontend: Sync {
    fn parse(&self, unit: &SourceUnit) -> ParsedUnit;
}

#[derive(Clone, Copy, Debug)]
pub struct CompileOptions {
    /// Keep analyzing past resolution errors to surface more diagnostics in
    /// one run; nothing is emitted either way once an error exists.
    pub allow_partial: bool,
    /// Run the optimizer pipeline over lowered functions.
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            allow_partial: true,
            optimize: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileStatus {
    Success,
    AnalysisFailed,
}

pub struct CompileResult {
    pub status: CompileStatus,
    pub diagnostics: Vec<Diagnostic>,
    pub assembly: Option<Assembly>,
}

/// Name plumbing for lowering and serialization: resolves handles to names
/// across the primitive catalog, the target, the synthesized tables, and
/// the referenced assemblies.
struct NamesAdapter<'a> {
    target: &'a Assembly,
    references: &'a AssemblyCollection,
    swizzles: &'a SwizzleManager,
    arrays: &'a ArrayManager,
}

impl NamesAdapter<'_> {
    fn assembly_of(&self, id: AssemblyId) -> Option<&Assembly> {
        match id {
            AssemblyId::PRIMITIVES => Some(primitives()),
            TARGET_ASSEMBLY => Some(self.target),
            SWIZZLE_ASSEMBLY => Some(self.swizzles.assembly()),
            ARRAY_ASSEMBLY => Some(self.arrays.assembly()),
            other => self.references.get(other).map(Arc::as_ref),
        }
    }
}

impl SymbolNames for NamesAdapter<'_> {
    fn fqn(&self, handle: &SymbolHandle) -> Option<String> {
        let assembly = self.assembly_of(handle.assembly()?)?;
        Some(assembly.table.fully_qualified_name(handle.index()?))
    }

    fn parent_fqn(&self, handle: &SymbolHandle) -> Option<String> {
        let assembly = self.assembly_of(handle.assembly()?)?;
        let parent = assembly.table.get(handle.index()?).parent;
        Some(assembly.table.fully_qualified_name(parent))
    }

    fn short_name(&self, handle: &SymbolHandle) -> Option<String> {
        let assembly = self.assembly_of(handle.assembly()?)?;
        Some(assembly.table.get(handle.index()?).name.clone())
    }
}

pub fn compile(
    name: &str,
    sources: &[SourceUnit],
    frontend: &dyn Frontend,
    references: Vec<Assembly>,
    output: Option<&Path>,
) -> CompileResult {
    compile_with_options(name, sources, frontend, references, output, CompileOptions::default())
}

pub fn compile_with_options(
    name: &str,
    sources: &[SourceUnit],
    frontend: &dyn Frontend,
    references: Vec<Assembly>,
    output: Option<&Path>,
    options: CompileOptions,
) -> CompileResult {
    info!(name, units = sources.len(), "compiling");

    // Parse every unit in parallel; each unit owns its arena until the
    // merge, which happens under the target lock.
    let target = Mutex::new((Assembly::create(name), Vec::<NodeId>::new(), DiagnosticBag::new()));
    sources.par_iter().for_each(|source| {
        let parsed = frontend.parse(source);
        let mut guard = target.lock().unwrap_or_else(|e| e.into_inner());
        let (assembly, roots, diagnostics) = &mut *guard;
        let (node_offset, _) = assembly.arena.absorb(parsed.arena);
        roots.push(NodeId(parsed.root.0 + node_offset));
        diagnostics.absorb(parsed.diagnostics);
    });
    let (mut assembly, mut roots, mut diagnostics) =
        target.into_inner().unwrap_or_else(|e| e.into_inner());
    // Unit order must not depend on thread scheduling.
    roots.sort_unstable();

    // References resolve against the primitive catalog and their own
    // tables once their collection id is known.
    let mut collection = AssemblyCollection::new();
    for mut reference in references {
        let id = AssemblyId(
            glint_symbols::assembly::FIRST_REFERENCE_ASSEMBLY + collection.len() as u32,
        );
        resolve_external(&mut reference, id);
        collection.push(Arc::new(reference));
    }

    let mut swizzles = SwizzleManager::new();
    let mut arrays = ArrayManager::new();

    for &root in &roots {
        collect(&mut assembly, root, &mut diagnostics);
    }
    for &root in &roots {
        resolve(
            &mut assembly,
            root,
            &collection,
            &mut swizzles,
            &mut arrays,
            &mut diagnostics,
        );
    }
    // Partial analysis keeps checking past resolution errors to surface as
    // many diagnostics as possible in one run.
    if options.allow_partial || !diagnostics.has_errors() {
        for &root in &roots {
            check(&mut assembly, root, &collection, &swizzles, &arrays, &mut diagnostics);
        }
    }

    if diagnostics.has_errors() {
        debug!(errors = diagnostics.error_count(), "analysis failed");
        return CompileResult {
            status: CompileStatus::AnalysisFailed,
            diagnostics: diagnostics.into_vec(),
            assembly: None,
        };
    }

    // Block scopes served resolution only; drop them before emission so the
    // serialized table carries declarations alone.
    assembly.table.strip();

    // Lower every function with a body, optimize, and serialize.
    let mut il_metadata = IlMetadata::new();
    let functions: Vec<(usize, NodeId)> = assembly
        .table
        .iter()
        .filter_map(|(index, node)| {
            let metadata = node.metadata.as_ref()?;
            if metadata.kind != SymbolKind::Function && metadata.kind != SymbolKind::Operator {
                return None;
            }
            let decl = metadata.declaration?;
            let has_body = matches!(
                &assembly.arena.get(decl).data,
                NodeData::Function { body: Some(_), .. }
                    | NodeData::OperatorDecl { body: Some(_), .. }
            );
            has_body.then_some((index, decl))
        })
        .collect();

    let mut payloads = Vec::with_capacity(functions.len());
    {
        let names = NamesAdapter {
            target: &assembly,
            references: &collection,
            swizzles: &swizzles,
            arrays: &arrays,
        };
        for (index, decl) in functions {
            match lower_function(&assembly.arena, decl, &names, &mut il_metadata) {
                Ok(mut func) => {
                    if options.optimize {
                        optimize(&mut func);
                    }
                    let order = func.cfg.reverse_postorder();
                    let mut linear = Vec::new();
                    for block in order {
                        linear.extend(func.cfg.block(block).instructions.iter().cloned());
                    }
                    payloads.push((index as u32, codec::encode_instructions(&linear)));
                }
                Err(err) => {
                    debug!(?err, "function not lowered");
                }
            }
        }
    }
    for (index, payload) in payloads {
        assembly.set_il(index, payload);
    }

    // Serialized references must be resolvable from the table root.
    {
        let names = NamesAdapter {
            target: &assembly,
            references: &collection,
            swizzles: &swizzles,
            arrays: &arrays,
        };
        let fqns: Vec<Option<String>> = assembly
            .arena
            .refs()
            .map(|symbol_ref| symbol_ref.handle().and_then(|handle| names.fqn(handle)))
            .collect();
        for (symbol_ref, fqn) in assembly.arena.refs_mut().zip(fqns) {
            if let Some(fqn) = fqn {
                symbol_ref.name = glint_common::intern(&fqn);
                symbol_ref.fully_qualified = true;
            }
        }
    }

    if let Some(path) = output {
        if let Err(err) = assembly.write_to_file(path) {
            diagnostics.error(
                diagnostic_codes::ASSEMBLY_PARSE_ERROR,
                glint_common::Span::synthetic(),
                format!("failed to write assembly: {err}"),
            );
            return CompileResult {
                status: CompileStatus::AnalysisFailed,
                diagnostics: diagnostics.into_vec(),
                assembly: Some(assembly),
            };
        }
    }

    CompileResult {
        status: CompileStatus::Success,
        diagnostics: diagnostics.into_vec(),
        assembly: Some(assembly),
    }
}

/// Load an assembly from disk so it can be handed to `compile` as a
/// reference; its symbol references resolve once it joins the compilation.
pub fn load_reference(path: impl AsRef<Path>) -> Result<Assembly, glint_symbols::AssemblyError> {
    Assembly::load_from_file(path)
}
