//! The scope stack shared by the analysis passes.
//!
//! Collector, resolver, and checker all walk the AST with the same scope
//! discipline, so block-scope names (`#block0`, `#block1`, …) come out
//! identical across passes and later passes can re-enter the scopes the
//! collector created.

use glint_ast::NodeId;
use glint_symbols::ScopeKind;

#[derive(Clone, Debug)]
pub struct ScopeFrame {
    /// The innermost enclosing namespace declaration.
    pub namespace: Option<NodeId>,
    /// The AST node that pushed this frame.
    pub owner: Option<NodeId>,
    /// Index of the matching symbol-table node.
    pub table_index: usize,
    /// What kind of scope this frame is.
    pub kind: ScopeKind,
    /// Running id for block scopes opened in this context.
    pub scope_counter: u32,
}

impl Default for ScopeFrame {
    fn default() -> Self {
        ScopeFrame {
            namespace: None,
            owner: None,
            table_index: glint_symbols::ROOT_INDEX,
            kind: ScopeKind::Global,
            scope_counter: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    current: ScopeFrame,
    stack: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &ScopeFrame {
        &self.current
    }

    /// Reserve the next `#blockN` name in the current context.
    pub fn next_block_name(&mut self) -> String {
        let id = self.current.scope_counter;
        self.current.scope_counter += 1;
        format!("#block{id}")
    }

    /// Enter a scope rooted at `table_index`, owned by `owner`.
    pub fn push(&mut self, owner: NodeId, table_index: usize, kind: ScopeKind) {
        self.stack.push(self.current.clone());
        self.current.owner = Some(owner);
        self.current.table_index = table_index;
        self.current.kind = kind;
    }

    pub fn set_namespace(&mut self, namespace: NodeId) {
        self.current.namespace = Some(namespace);
    }

    /// Pop when leaving the node that owns the current frame.
    pub fn pop_if_owner(&mut self, node: NodeId) -> bool {
        if self.current.owner != Some(node) {
            return false;
        }
        if let Some(previous) = self.stack.pop() {
            self.current = previous;
        }
        true
    }

    /// Frames from innermost outward, current first.
    pub fn frames_outward(&self) -> impl Iterator<Item = &ScopeFrame> {
        std::iter::once(&self.current).chain(self.stack.iter().rev())
    }

    /// Snapshot for deferral contexts.
    pub fn snapshot(&self) -> (ScopeFrame, Vec<ScopeFrame>) {
        (self.current.clone(), self.stack.clone())
    }

    pub fn restore(&mut self, snapshot: &(ScopeFrame, Vec<ScopeFrame>)) {
        self.current = snapshot.0.clone();
        self.stack = snapshot.1.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_names_continue_from_parent() {
        let mut scopes = ScopeStack::new();
        assert_eq!(scopes.next_block_name(), "#block0");
        scopes.push(NodeId(1), 5, ScopeKind::Function);
        // The child context continues the parent's counter.
        assert_eq!(scopes.next_block_name(), "#block1");
        scopes.pop_if_owner(NodeId(1));
        assert_eq!(scopes.next_block_name(), "#block1");
    }

    #[test]
    fn pop_only_for_owner() {
        let mut scopes = ScopeStack::new();
        scopes.push(NodeId(1), 5, ScopeKind::Function);
        assert!(!scopes.pop_if_owner(NodeId(2)));
        assert_eq!(scopes.current().table_index, 5);
        assert!(scopes.pop_if_owner(NodeId(1)));
        assert_eq!(scopes.current().table_index, glint_symbols::ROOT_INDEX);
    }

    #[test]
    fn frames_iterate_innermost_first() {
        let mut scopes = ScopeStack::new();
        scopes.push(NodeId(1), 3, ScopeKind::Namespace);
        scopes.push(NodeId(2), 7, ScopeKind::Function);
        let indices: Vec<usize> = scopes.frames_outward().map(|f| f.table_index).collect();
        assert_eq!(indices, vec![7, 3, glint_symbols::ROOT_INDEX]);
    }
}
