//! Source loader: file bytes in, structural view out.
//!
//! Parses one Java compilation unit with tree-sitter and flattens the parts
//! the rules care about into a pre-order arena of [`Node`]s. The arena is the
//! only view rules ever see; raw tree-sitter nodes do not escape this module.
//!
//! # Structural view
//! - Closed set of node kinds ([`NodeKind`]) instead of runtime type
//!   inspection; rules declare the kind they match.
//! - Pre-order arena: the subtree of node `i` is the contiguous index range
//!   `i+1..subtree_end`, which makes descendant queries a slice.
//! - A [`SourceUnit`] is immutable once loaded and discarded after findings
//!   are emitted.

use std::path::Path;

use crate::error::ScanError;

/// Index of a node in its unit's pre-order arena.
pub type NodeId = usize;

/// Resource limits applied while loading.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum file size to parse (in bytes). Default: 10MB
    pub max_file_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// The closed set of structural element kinds rules can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Class declaration.
    Class,
    /// Method declaration.
    Method,
    /// A formal parameter of a method.
    Param,
    /// Annotation on a declaration (`@EventHandler`).
    Annotation,
    /// Method invocation.
    Call,
    /// Object creation (`new Transaction()`).
    New,
    /// Local variable declaration.
    VarDecl,
    /// Braced scope: block statement or (anonymous) class body.
    Block,
    /// Lambda expression.
    Lambda,
    /// `synchronized` statement.
    Synchronized,
}

/// One structural element, owned by its [`SourceUnit`].
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Primary identifier: class/method/annotation name, callee name,
    /// constructed type, variable or parameter name. Empty for blocks,
    /// lambdas and synchronized statements.
    pub name: String,
    /// Secondary identifier, where one exists:
    /// - `Call`: the receiver, when it is a simple identifier or field access
    ///   (`inv` in `inv.setItem(..)`).
    /// - `VarDecl`: the constructed type, when the initializer is an object
    ///   creation (`Transaction` in `Transaction t = new Transaction()`).
    /// - `Param`: the declared type.
    pub detail: Option<String>,
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Exclusive end of this node's pre-order subtree range.
    pub subtree_end: NodeId,
}

/// The parsed structural representation of one input file.
#[derive(Debug)]
pub struct SourceUnit {
    /// Display path of the file.
    pub file: String,
    /// Raw source text.
    pub text: String,
    nodes: Vec<Node>,
}

impl SourceUnit {
    /// All nodes in pre-order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Descendants of `id` in pre-order (excluding `id` itself).
    pub fn descendants(&self, id: NodeId) -> &[Node] {
        &self.nodes[id + 1..self.nodes[id].subtree_end]
    }

    /// Walk parent links from `id` upward (excluding `id` itself).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            unit: self,
            next: self.nodes[id].parent,
        }
    }

    /// Nearest ancestor of the given kind, if any.
    pub fn enclosing(&self, id: NodeId, kind: NodeKind) -> Option<&Node> {
        self.ancestors(id).find(|n| n.kind == kind)
    }
}

/// Iterator over a node's ancestors, nearest first.
pub struct Ancestors<'a> {
    unit: &'a SourceUnit,
    next: Option<NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.unit.nodes[self.next?];
        self.next = node.parent;
        Some(node)
    }
}

/// Load and parse a file from disk.
pub fn load(path: &Path, limits: &Limits) -> Result<SourceUnit, ScanError> {
    let file = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
        file: file.clone(),
        source,
    })?;
    load_source(&file, &text, limits)
}

/// Parse in-memory source text into a [`SourceUnit`].
pub fn load_source(file: &str, text: &str, limits: &Limits) -> Result<SourceUnit, ScanError> {
    if text.len() > limits.max_file_size {
        return Err(ScanError::TooLarge {
            file: file.to_string(),
            size: text.len(),
            limit: limits.max_file_size,
        });
    }

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| ScanError::Config(format!("failed to load Java grammar: {e}")))?;

    let tree = parser
        .parse(text, None)
        .ok_or_else(|| ScanError::Parse {
            file: file.to_string(),
            line: 1,
            column: 1,
            detail: "parser returned no tree".to_string(),
        })?;

    let root = tree.root_node();
    if root.has_error() {
        let bad = first_error(root).unwrap_or(root);
        let pos = bad.start_position();
        return Err(ScanError::Parse {
            file: file.to_string(),
            line: pos.row + 1,
            column: pos.column + 1,
            detail: if bad.is_missing() {
                format!("missing {}", bad.kind())
            } else {
                "invalid syntax".to_string()
            },
        });
    }

    let mut nodes = Vec::new();
    extract(&mut nodes, text, root, None);

    Ok(SourceUnit {
        file: file.to_string(),
        text: text.to_string(),
        nodes,
    })
}

/// Find the first ERROR or MISSING node in the tree, pre-order.
fn first_error(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Map a raw grammar node to a structural kind, or `None` to pass through.
fn map_kind(ts_kind: &str) -> Option<NodeKind> {
    match ts_kind {
        "class_declaration" => Some(NodeKind::Class),
        "method_declaration" | "constructor_declaration" => Some(NodeKind::Method),
        "formal_parameter" => Some(NodeKind::Param),
        "marker_annotation" | "annotation" => Some(NodeKind::Annotation),
        "method_invocation" => Some(NodeKind::Call),
        "object_creation_expression" => Some(NodeKind::New),
        "local_variable_declaration" => Some(NodeKind::VarDecl),
        "block" | "class_body" | "constructor_body" => Some(NodeKind::Block),
        "lambda_expression" => Some(NodeKind::Lambda),
        "synchronized_statement" => Some(NodeKind::Synchronized),
        _ => None,
    }
}

/// Recursively flatten the tree-sitter tree into the arena.
///
/// Grammar nodes without a structural mapping are transparent: their children
/// attach to the nearest mapped ancestor.
fn extract(
    nodes: &mut Vec<Node>,
    text: &str,
    ts: tree_sitter::Node<'_>,
    parent: Option<NodeId>,
) {
    let mapped = map_kind(ts.kind());

    let self_id = mapped.map(|kind| {
        let id = nodes.len();
        let pos = ts.start_position();
        let (name, detail) = identify(text, ts, kind);
        nodes.push(Node {
            id,
            kind,
            name,
            detail,
            line: pos.row + 1,
            column: pos.column + 1,
            parent,
            children: Vec::new(),
            subtree_end: 0,
        });
        if let Some(p) = parent {
            nodes[p].children.push(id);
        }
        id
    });

    let child_parent = self_id.or(parent);
    let mut cursor = ts.walk();
    let children: Vec<_> = ts.children(&mut cursor).collect();
    for child in children {
        extract(nodes, text, child, child_parent);
    }

    if let Some(id) = self_id {
        nodes[id].subtree_end = nodes.len();
    }
}

/// Pull the primary and secondary identifiers out of a grammar node.
fn identify(
    text: &str,
    ts: tree_sitter::Node<'_>,
    kind: NodeKind,
) -> (String, Option<String>) {
    let field = |name: &str| -> Option<String> {
        ts.child_by_field_name(name)
            .and_then(|n| n.utf8_text(text.as_bytes()).ok())
            .map(|s| s.to_string())
    };

    match kind {
        NodeKind::Class | NodeKind::Method | NodeKind::Annotation => {
            (field("name").unwrap_or_default(), None)
        }
        NodeKind::Param => (field("name").unwrap_or_default(), field("type")),
        NodeKind::Call => {
            let receiver = ts.child_by_field_name("object").and_then(|obj| {
                // Only simple receivers are useful to rules; a chained or
                // constructed receiver has no stable identity to track.
                match obj.kind() {
                    "identifier" | "field_access" | "this" => {
                        obj.utf8_text(text.as_bytes()).ok().map(|s| s.to_string())
                    }
                    _ => None,
                }
            });
            (field("name").unwrap_or_default(), receiver)
        }
        NodeKind::New => (field("type").unwrap_or_default(), None),
        NodeKind::VarDecl => {
            let declarator = ts.child_by_field_name("declarator");
            let name = declarator
                .and_then(|d| d.child_by_field_name("name"))
                .and_then(|n| n.utf8_text(text.as_bytes()).ok())
                .map(|s| s.to_string())
                .unwrap_or_default();
            let constructed = declarator
                .and_then(|d| d.child_by_field_name("value"))
                .filter(|v| v.kind() == "object_creation_expression")
                .and_then(|v| v.child_by_field_name("type"))
                .and_then(|t| t.utf8_text(text.as_bytes()).ok())
                .map(|s| s.to_string());
            (name, constructed)
        }
        NodeKind::Block | NodeKind::Lambda | NodeKind::Synchronized => (String::new(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unit(source: &str) -> SourceUnit {
        load_source("Test.java", source, &Limits::default()).expect("source should parse")
    }

    #[test]
    fn extracts_class_and_method() {
        let u = unit("class A { void run() { } }");
        let kinds: Vec<_> = u.nodes().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Class,
                NodeKind::Block, // class body
                NodeKind::Method,
                NodeKind::Block, // method body
            ]
        );
        assert_eq!(u.node(0).name, "A");
        assert_eq!(u.node(2).name, "run");
    }

    #[test]
    fn call_receiver_is_captured_for_identifiers() {
        let u = unit("class A { void run() { inv.setItem(0, null); } }");
        let call = u
            .nodes()
            .iter()
            .find(|n| n.kind == NodeKind::Call)
            .unwrap();
        assert_eq!(call.name, "setItem");
        assert_eq!(call.detail.as_deref(), Some("inv"));
    }

    #[test]
    fn var_decl_records_constructed_type() {
        let u = unit("class A { void run() { Transaction t = new Transaction(); } }");
        let decl = u
            .nodes()
            .iter()
            .find(|n| n.kind == NodeKind::VarDecl)
            .unwrap();
        assert_eq!(decl.name, "t");
        assert_eq!(decl.detail.as_deref(), Some("Transaction"));
    }

    #[test]
    fn annotations_attach_under_their_method() {
        let u = unit("class A { @EventHandler void onThing(Event e) { } }");
        let ann = u
            .nodes()
            .iter()
            .find(|n| n.kind == NodeKind::Annotation)
            .unwrap();
        assert_eq!(ann.name, "EventHandler");
        let parent = u.node(ann.parent.unwrap());
        assert_eq!(parent.kind, NodeKind::Method);
        assert_eq!(parent.name, "onThing");
    }

    #[test]
    fn descendants_are_a_contiguous_range() {
        let u = unit("class A { void a() { x.f(); } void b() { y.g(); } }");
        let methods: Vec<_> = u
            .nodes()
            .iter()
            .filter(|n| n.kind == NodeKind::Method)
            .collect();
        assert_eq!(methods.len(), 2);
        let a_calls: Vec<_> = u
            .descendants(methods[0].id)
            .iter()
            .filter(|n| n.kind == NodeKind::Call)
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(a_calls, vec!["f"]);
    }

    #[test]
    fn ancestors_walk_to_the_root() {
        let u = unit("class A { void run() { synchronized (this) { inv.clear(); } } }");
        let call = u
            .nodes()
            .iter()
            .find(|n| n.kind == NodeKind::Call)
            .unwrap();
        assert!(u
            .ancestors(call.id)
            .any(|n| n.kind == NodeKind::Synchronized));
        assert_eq!(
            u.enclosing(call.id, NodeKind::Method).map(|n| n.name.as_str()),
            Some("run")
        );
    }

    #[test]
    fn malformed_source_is_a_parse_error() {
        let err = load_source("Bad.java", "class A { void run( { }", &Limits::default())
            .unwrap_err();
        match err {
            ScanError::Parse { file, line, .. } => {
                assert_eq!(file, "Bad.java");
                assert!(line >= 1);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn oversized_input_is_rejected() {
        let limits = Limits { max_file_size: 8 };
        let err = load_source("Big.java", "class Abcdefg { }", &limits).unwrap_err();
        assert!(matches!(err, ScanError::TooLarge { .. }));
    }

    #[test]
    fn loading_is_deterministic() {
        let src = "class A { @EventHandler void onThing(Event e) { inv.addItem(x); } }";
        let a = unit(src);
        let b = unit(src);
        let shape = |u: &SourceUnit| {
            u.nodes()
                .iter()
                .map(|n| (n.kind, n.name.clone(), n.line, n.column))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&a), shape(&b));
    }
}
