//! Bounded callsite traversal over the cross-file reference graph.
//!
//! Nodes are `(name, defining file)`. Matching is purely by name, so two
//! unrelated functions sharing a name in different files are both treated
//! as candidates; the graph never tries to resolve namespaces or overloads.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::{debug, instrument};

use crate::core::cache::RunCache;
use crate::core::model::{BlockKind, CallsiteAnchor, Direction, Relevance, Symbol};
use crate::core::scan::{ReferenceFinder, StructureScanner, include_preamble};
use crate::core::snippet::line_window;
use crate::core::source_index::SourceIndex;

const HEADER_EXTENSIONS: [&str; 4] = ["h", "hpp", "hh", "hxx"];

/// Traversal limits and call-site filters.
#[derive(Debug, Clone)]
pub struct AnchorPolicy
{
    pub max_depth: usize,
    pub max_anchors: usize,
    pub context_radius: usize,
    pub skip_header_callsites: bool,
    pub excluded_dirs: Vec<String>,
}

impl AnchorPolicy
{
    fn skips_call_site(
        &self,
        path: &Path,
    ) -> bool
    {
        if self.skip_header_callsites && is_header(path)
        {
            return true;
        }
        path.parent()
            .is_some_and(|dir| {
                dir.components()
                    .any(|c| {
                        let c = c
                            .as_os_str()
                            .to_string_lossy();
                        self.excluded_dirs
                            .iter()
                            .any(|x| x.eq_ignore_ascii_case(&c))
                    })
            })
    }
}

fn is_header(path: &Path) -> bool
{
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| HEADER_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// A graph node: a named unit and where it is defined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolNode
{
    pub name: String,
    pub file: PathBuf,
    pub line: usize,
}

/// Nodes and caller → callee edges discovered during a traversal.
#[derive(Debug, Default)]
pub struct ReferenceGraph
{
    pub graph: DiGraph<SymbolNode, usize>,
    index: HashMap<(String, PathBuf), NodeIndex>,
}

impl ReferenceGraph
{
    fn node(
        &mut self,
        sym: &SymbolNode,
    ) -> NodeIndex
    {
        let key = (
            sym.name
                .clone(),
            sym.file
                .clone(),
        );
        *self
            .index
            .entry(key)
            .or_insert_with(|| {
                self.graph
                    .add_node(sym.clone())
            })
    }

    /// Record `caller` → `callee` observed at `hop`.
    fn add_call(
        &mut self,
        caller: &SymbolNode,
        callee: &SymbolNode,
        hop: usize,
    )
    {
        let (a, b) = (self.node(caller), self.node(callee));
        if self
            .graph
            .find_edge(a, b)
            .is_none()
        {
            self.graph
                .add_edge(a, b, hop);
        }
    }

    pub fn node_count(&self) -> usize
    {
        self.graph
            .node_count()
    }

    /// Graphviz rendering, nodes and edges in a stable order.
    pub fn to_dot(&self) -> String
    {
        let mut nodes: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .collect();
        nodes.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));

        let mut out = String::from("digraph references {\n    node [shape=box];\n");
        for idx in &nodes
        {
            let n = &self.graph[*idx];
            let _ = writeln!(
                out,
                "    n{} [label=\"{}\\n{}:{}\"];",
                idx.index(),
                escape(&n.name),
                escape(
                    &n.file
                        .display()
                        .to_string()
                ),
                n.line
            );
        }

        let mut edges: Vec<(NodeIndex, NodeIndex, usize)> = self
            .graph
            .edge_references()
            .map(|e| (e.source(), e.target(), *e.weight()))
            .collect();
        edges.sort_by(|x, y| (&self.graph[x.0], &self.graph[x.1]).cmp(&(&self.graph[y.0], &self.graph[y.1])));
        for (a, b, hop) in edges
        {
            let _ = writeln!(out, "    n{} -> n{} [label=\"hop {}\"];", a.index(), b.index(), hop);
        }
        out.push_str("}\n");
        out
    }
}

fn escape(s: &str) -> String
{
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
}

/// Result of one traversal.
#[derive(Debug, Default)]
pub struct Traversal
{
    pub anchors: Vec<CallsiteAnchor>,
    pub graph: ReferenceGraph,
}

/// Breadth-first neighborhood builder. Borrowed per call; all memoization
/// lives in the shared [`RunCache`].
pub struct GraphBuilder<'a>
{
    pub index: &'a SourceIndex,
    pub cache: &'a RunCache,
    pub scanner: &'a dyn StructureScanner,
    pub finder: &'a dyn ReferenceFinder,
    pub policy: &'a AnchorPolicy,
}

impl GraphBuilder<'_>
{
    /// Callers and callees of `seed` within `max_depth` hops, nearest first,
    /// then by file and line, capped at `max_anchors`. Each (neighbor,
    /// direction) pair appears once with its smallest hop distance.
    #[instrument(skip(self), fields(symbol = %seed.name, file = %seed.definition_file.display()))]
    pub fn build_anchors(
        &self,
        seed: &Symbol,
        max_depth: usize,
    ) -> Traversal
    {
        let seed_node = SymbolNode {
            name: seed
                .name
                .clone(),
            file: seed
                .definition_file
                .clone(),
            line: seed.definition_line,
        };

        let mut graph = ReferenceGraph::default();
        graph.node(&seed_node);

        let mut visited: HashSet<(String, PathBuf)> = HashSet::new();
        visited.insert((
            seed_node
                .name
                .clone(),
            seed_node
                .file
                .clone(),
        ));

        let mut best: IndexMap<(String, Direction), CallsiteAnchor> = IndexMap::new();
        let mut queue: VecDeque<(SymbolNode, usize)> = VecDeque::from([(seed_node.clone(), 0)]);

        while let Some((node, hop)) = queue.pop_front()
        {
            if hop >= max_depth
            {
                continue;
            }
            let next_hop = hop + 1;

            for (caller, site_file, site_line) in self.callers_of(&node)
            {
                graph.add_call(&caller, &node, next_hop);
                if caller.name != seed_node.name
                {
                    self.record(&mut best, &caller.name, &site_file, site_line, Direction::CalledBy, next_hop);
                }
                if visited.insert((
                    caller
                        .name
                        .clone(),
                    caller
                        .file
                        .clone(),
                ))
                {
                    queue.push_back((caller, next_hop));
                }
            }

            for callee in self.callees_of(&node)
            {
                graph.add_call(&node, &callee, next_hop);
                if callee.name != seed_node.name
                {
                    self.record(&mut best, &callee.name, &callee.file, callee.line, Direction::Calls, next_hop);
                }
                if visited.insert((
                    callee
                        .name
                        .clone(),
                    callee
                        .file
                        .clone(),
                ))
                {
                    queue.push_back((callee, next_hop));
                }
            }
        }

        let mut anchors: Vec<CallsiteAnchor> = best
            .into_values()
            .collect();
        anchors.sort_by(|a, b| {
            (a.hop_distance, &a.file, a.line, &a.symbol_name, a.direction).cmp(&(
                b.hop_distance,
                &b.file,
                b.line,
                &b.symbol_name,
                b.direction,
            ))
        });
        anchors.truncate(
            self.policy
                .max_anchors,
        );
        for anchor in &mut anchors
        {
            anchor.relevance = self.relevance(&seed.definition_file, &anchor.file);
        }

        debug!(anchors = anchors.len(), nodes = graph.node_count(), "callsite traversal done");
        Traversal { anchors, graph }
    }

    /// Keep the nearest observation of each (name, direction).
    fn record(
        &self,
        best: &mut IndexMap<(String, Direction), CallsiteAnchor>,
        name: &str,
        file: &Path,
        line: usize,
        direction: Direction,
        hop: usize,
    )
    {
        let key = (name.to_string(), direction);
        let better = best
            .get(&key)
            .is_none_or(|cur| (hop, file, line) < (cur.hop_distance, cur.file.as_path(), cur.line));
        if !better
        {
            return;
        }

        let context = (self.policy.context_radius > 0)
            .then(|| {
                self.index
                    .load(file)
                    .ok()
            })
            .flatten()
            .map(|src| line_window(&src, line, self.policy.context_radius));
        best.insert(
            key,
            CallsiteAnchor {
                symbol_name: name.to_string(),
                file: file.to_path_buf(),
                line,
                direction,
                hop_distance: hop,
                context,
                relevance: Relevance::default(),
            },
        );
    }

    /// Directory, module and include signals of `file` against `seed_file`.
    fn relevance(
        &self,
        seed_file: &Path,
        file: &Path,
    ) -> Relevance
    {
        let root = Path::new("");
        let seed_dir = seed_file
            .parent()
            .unwrap_or(root);
        let seed_top = seed_dir
            .components()
            .next();

        let includes_bug_header = seed_file
            .file_stem()
            .and_then(|s| s.to_str())
            .zip(
                self.index
                    .load(file)
                    .ok(),
            )
            .is_some_and(|(stem, src)| {
                let headers: Vec<String> = HEADER_EXTENSIONS
                    .iter()
                    .map(|ext| format!("{stem}.{ext}"))
                    .collect();
                self.cache
                    .includes(&src, || include_preamble(&src))
                    .iter()
                    .filter(|l| l.contains("#include"))
                    .any(|l| {
                        headers
                            .iter()
                            .any(|h| l.contains(h.as_str()))
                    })
            });

        Relevance {
            same_dir: file
                .parent()
                .unwrap_or(root)
                == seed_dir,
            same_top_module: seed_top.is_some()
                && file
                    .components()
                    .next()
                    == seed_top,
            includes_bug_header,
        }
    }

    /// Functions containing a call to `node.name`, with the call site.
    fn callers_of(
        &self,
        node: &SymbolNode,
    ) -> Vec<(SymbolNode, PathBuf, usize)>
    {
        let mut out = Vec::new();

        for path in self
            .index
            .project_files()
        {
            if self
                .policy
                .skips_call_site(path)
            {
                continue;
            }
            let Ok(src) = self
                .index
                .load(path)
            else
            {
                continue;
            };

            let refs = self
                .cache
                .references(self.finder, &src, &node.name);
            for r in refs
                .iter()
                .filter(|r| r.is_call && !r.is_definition)
            {
                // Prototypes, class-body declarations and global
                // initializers have no enclosing function
                let Some(unit) = self
                    .cache
                    .enclosing_unit(self.scanner, &src, r.line)
                    .filter(|u| u.kind == BlockKind::Function)
                else
                {
                    continue;
                };
                let Some(name) = unit.name
                else
                {
                    continue;
                };
                if name == node.name && src.path() == node.file
                {
                    continue;
                }
                let caller = SymbolNode { name, file: path.clone(), line: unit.header_line };
                out.push((caller, path.clone(), r.line));
            }
        }

        out
    }

    /// Definitions of the names called from `node`'s body.
    fn callees_of(
        &self,
        node: &SymbolNode,
    ) -> Vec<SymbolNode>
    {
        let Ok(src) = self
            .index
            .load(&node.file)
        else
        {
            return Vec::new();
        };
        let Some(unit) = self
            .cache
            .enclosing_unit(self.scanner, &src, node.line)
            .filter(|u| u.name.as_deref() == Some(node.name.as_str()))
        else
        {
            return Vec::new();
        };

        let mut out = Vec::new();
        for call in self
            .finder
            .calls_within(&src, unit.header_line, unit.end_line)
        {
            if call.name == node.name
            {
                continue;
            }
            let defs = self
                .cache
                .definitions(&call.name, || self.find_definitions(&call.name));
            out.extend(
                defs.iter()
                    .map(|(file, line)| SymbolNode { name: call.name.clone(), file: file.clone(), line: *line }),
            );
        }
        out
    }

    /// Every function/type definition of `name` across indexed files.
    fn find_definitions(
        &self,
        name: &str,
    ) -> Vec<(PathBuf, usize)>
    {
        let mut out = Vec::new();
        for path in self
            .index
            .project_files()
        {
            let Ok(src) = self
                .index
                .load(path)
            else
            {
                continue;
            };
            out.extend(
                self.cache
                    .references(self.finder, &src, name)
                    .iter()
                    .filter(|r| r.is_definition)
                    .map(|r| (path.clone(), r.line)),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::core::scan::HeuristicScanner;

    fn policy(max_anchors: usize) -> AnchorPolicy
    {
        AnchorPolicy {
            max_depth: 5,
            max_anchors,
            context_radius: 1,
            skip_header_callsites: true,
            excluded_dirs: vec!["tests".into()],
        }
    }

    fn tree(files: &[(&str, &str)]) -> TempDir
    {
        let tmp = TempDir::new().unwrap();
        for (rel, body) in files
        {
            let p = tmp
                .path()
                .join(rel);
            fs::create_dir_all(
                p.parent()
                    .unwrap(),
            )
            .unwrap();
            fs::write(p, body).unwrap();
        }
        tmp
    }

    fn traverse(
        tmp: &TempDir,
        seed: Symbol,
        depth: usize,
        max_anchors: usize,
    ) -> Traversal
    {
        let index = SourceIndex::builder(tmp.path())
            .extensions(&["cpp".to_string(), "h".to_string()])
            .build()
            .unwrap();
        let cache = RunCache::new();
        let scanner = HeuristicScanner::default();
        let policy = policy(max_anchors);
        GraphBuilder { index: &index, cache: &cache, scanner: &scanner, finder: &scanner, policy: &policy }
            .build_anchors(&seed, depth)
    }

    fn sym(
        name: &str,
        file: &str,
        line: usize,
    ) -> Symbol
    {
        Symbol { name: name.into(), definition_file: file.into(), definition_line: line }
    }

    #[test]
    fn cyclic_graph_terminates_without_duplicates()
    {
        let tmp = tree(&[
            ("a.cpp", "void b();\nvoid a() {\n    b();\n}\n"),
            ("b.cpp", "void a();\nvoid b() {\n    a();\n}\n"),
        ]);
        let t = traverse(&tmp, sym("a", "a.cpp", 2), 5, 100);

        let keys: Vec<(String, Direction)> = t
            .anchors
            .iter()
            .map(|a| (a.symbol_name.clone(), a.direction))
            .collect();
        // Definition of b (line 2) sorts before its call to a (line 3)
        assert_eq!(keys, vec![("b".to_string(), Direction::Calls), ("b".to_string(), Direction::CalledBy)]);
        assert!(
            t.anchors
                .iter()
                .all(|a| a.hop_distance == 1)
        );
        assert_eq!(t.graph.node_count(), 2);
    }

    #[test]
    fn callers_point_at_call_sites_and_callees_at_definitions()
    {
        let tmp = tree(&[
            ("core.cpp", "int leaf(int x)\n{\n    return x;\n}\n\nint mid(int x)\n{\n    return leaf(x) + 1;\n}\n"),
            ("app/main.cpp", "int main()\n{\n    return mid(2);\n}\n"),
            ("tests/t.cpp", "void t() {\n    mid(3);\n}\n"),
            ("core.h", "inline int wrap() { return mid(4); }\n"),
        ]);
        let t = traverse(&tmp, sym("mid", "core.cpp", 6), 1, 100);

        assert_eq!(t.anchors.len(), 2);
        let main = &t.anchors[0];
        assert_eq!(main.symbol_name, "main");
        assert_eq!(main.direction, Direction::CalledBy);
        assert_eq!(main.file, PathBuf::from("app/main.cpp"));
        assert_eq!(main.line, 3);
        assert!(main.context.is_some());

        let leaf = &t.anchors[1];
        assert_eq!(leaf.symbol_name, "leaf");
        assert_eq!(leaf.direction, Direction::Calls);
        assert_eq!((leaf.file.as_path(), leaf.line), (Path::new("core.cpp"), 1));
    }

    #[test]
    fn depth_zero_is_seed_only_and_cap_truncates()
    {
        let tmp = tree(&[(
            "x.cpp",
            "void s() {}\nvoid c1() { s(); }\nvoid c2() { s(); }\nvoid c3() { s(); }\n",
        )]);
        assert!(
            traverse(&tmp, sym("s", "x.cpp", 1), 0, 100)
                .anchors
                .is_empty()
        );

        let capped = traverse(&tmp, sym("s", "x.cpp", 1), 2, 2);
        let names: Vec<&str> = capped
            .anchors
            .iter()
            .map(|a| a.symbol_name.as_str())
            .collect();
        assert_eq!(names, vec!["c1", "c2"]);
    }

    #[test]
    fn dot_output_lists_edges()
    {
        let tmp = tree(&[("a.cpp", "void b() {}\nvoid a() {\n    b();\n}\n")]);
        let dot = traverse(&tmp, sym("a", "a.cpp", 2), 1, 10)
            .graph
            .to_dot();
        assert!(dot.starts_with("digraph references {"));
        assert!(dot.contains("->"));
        assert!(dot.contains("label=\"a\\na.cpp:2\""));
    }

    #[test]
    fn anchors_carry_relevance_to_the_seed_file()
    {
        let tmp = tree(&[
            ("engine/core.cpp", "int mid(int x)\n{\n    return x;\n}\n"),
            ("engine/user.cpp", "#include \"core.h\"\n\nint use()\n{\n    return mid(1);\n}\n"),
            ("engine/sub/deep.cpp", "int deep()\n{\n    return mid(2);\n}\n"),
            ("app/main.cpp", "int main()\n{\n    return mid(3);\n}\n"),
        ]);
        let t = traverse(&tmp, sym("mid", "engine/core.cpp", 1), 1, 100);

        let signals = |name: &str| {
            let a = t
                .anchors
                .iter()
                .find(|a| a.symbol_name == name)
                .unwrap();
            (a.relevance.same_dir, a.relevance.same_top_module, a.relevance.includes_bug_header)
        };
        assert_eq!(signals("use"), (true, true, true));
        assert_eq!(signals("deep"), (false, true, false));
        assert_eq!(signals("main"), (false, false, false));

        // Ordering still follows hop, file, line
        let files: Vec<&Path> = t
            .anchors
            .iter()
            .map(|a| a.file.as_path())
            .collect();
        assert_eq!(files, vec![Path::new("app/main.cpp"), Path::new("engine/sub/deep.cpp"), Path::new("engine/user.cpp")]);
    }
}
