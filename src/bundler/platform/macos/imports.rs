//! Static import graph of the Python entry point.
//!
//! Freezers discover most imports from bytecode, but modules imported inside
//! functions after the environment is prepared (the backend app, the webview)
//! are easy to miss. Walking the graph from the entry point and feeding every
//! local module into the hidden-import list makes the frozen tree complete.

use crate::bundler::error::{ErrorExt, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*import[ \t]+([\w.]+(?:[ \t]+as[ \t]+\w+)?(?:[ \t]*,[ \t]*[\w.]+(?:[ \t]+as[ \t]+\w+)?)*)")
        .expect("static regex")
});

static FROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*from[ \t]+(\.*)([\w.]*)[ \t]+import[ \t]+\(?([\w., \t]+)")
        .expect("static regex")
});

/// Where a module was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Source file under the project root.
    Local(PathBuf),
    /// Not found locally: stdlib or an installed package.
    External,
}

/// Directed graph of `module -> imported module`.
#[derive(Debug)]
pub struct ImportGraph {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    origins: HashMap<String, ModuleOrigin>,
    entry: NodeIndex,
}

impl ImportGraph {
    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Every module reachable from the entry point, excluding the entry itself.
    pub fn reachable(&self) -> BTreeSet<String> {
        let mut dfs = Dfs::new(&self.graph, self.entry);
        let mut seen = BTreeSet::new();
        while let Some(idx) = dfs.next(&self.graph) {
            if idx != self.entry {
                seen.insert(self.graph[idx].clone());
            }
        }
        seen
    }

    /// Reachable modules that live in the project tree.
    pub fn local_modules(&self) -> BTreeSet<String> {
        self.reachable()
            .into_iter()
            .filter(|m| matches!(self.origins.get(m), Some(ModuleOrigin::Local(_))))
            .collect()
    }

    /// Top-level names of reachable modules that are not in the project tree.
    pub fn external_roots(&self) -> BTreeSet<String> {
        self.reachable()
            .into_iter()
            .filter(|m| !matches!(self.origins.get(m), Some(ModuleOrigin::Local(_))))
            .map(|m| m.split('.').next().unwrap_or(&m).to_string())
            .collect()
    }

    pub fn module_count(&self) -> usize {
        self.graph.node_count()
    }
}

/// Resolves `a.b.c` to `root/a/b/c.py` or `root/a/b/c/__init__.py`.
fn resolve_local(root: &Path, module: &str) -> Option<PathBuf> {
    if module.is_empty() {
        return None;
    }
    let rel: PathBuf = module.split('.').collect();
    let file = root.join(&rel).with_extension("py");
    if file.is_file() {
        return Some(file);
    }
    let package = root.join(&rel).join("__init__.py");
    package.is_file().then_some(package)
}

/// Importable module name of a source file under `root`.
pub fn local_module_name(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?.with_extension("");
    let mut parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.last().map(String::as_str) == Some("__init__") {
        parts.pop();
    }
    Some(parts.join("."))
}

/// Package that relative imports in `module` resolve against.
fn package_of(module: &str, is_package: bool) -> &str {
    if is_package {
        module
    } else {
        module.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("")
    }
}

fn absolute_name(package: &str, dots: usize, name: &str) -> String {
    let mut parts: Vec<&str> = if package.is_empty() {
        Vec::new()
    } else {
        package.split('.').collect()
    };
    for _ in 1..dots {
        parts.pop();
    }
    if !name.is_empty() {
        parts.push(name);
    }
    parts.join(".")
}

/// Imported module names found in one source file, in source order.
fn imports_in(source: &str, package: &str) -> Vec<(String, Vec<String>)> {
    let mut found = Vec::new();

    for caps in IMPORT_RE.captures_iter(source) {
        for item in caps[1].split(',') {
            if let Some(name) = item.split_whitespace().next() {
                found.push((name.to_string(), Vec::new()));
            }
        }
    }

    for caps in FROM_RE.captures_iter(source) {
        let dots = caps[1].len();
        let base = if dots == 0 {
            caps[2].to_string()
        } else {
            absolute_name(package, dots, &caps[2])
        };
        let names = caps[3]
            .split(',')
            .filter_map(|n| n.split_whitespace().next())
            .filter(|n| *n != "*")
            .map(str::to_string)
            .collect();
        if !base.is_empty() {
            found.push((base, names));
        }
    }

    found
}

/// Builds the import graph starting at `entry_point`, resolving local
/// modules against `root`.
pub fn scan(entry_point: &Path, root: &Path) -> Result<ImportGraph> {
    let mut graph = ImportGraph {
        graph: DiGraph::new(),
        index: HashMap::new(),
        origins: HashMap::new(),
        entry: NodeIndex::new(0),
    };
    graph.entry = graph.node("__main__");

    let mut queue: VecDeque<(NodeIndex, String, PathBuf)> = VecDeque::new();
    queue.push_back((graph.entry, String::new(), entry_point.to_path_buf()));

    while let Some((from, module, file)) = queue.pop_front() {
        let source = std::fs::read_to_string(&file).fs_context("reading Python source", &file)?;
        let is_package = file.file_name().is_some_and(|n| n == "__init__.py");
        let package = package_of(&module, is_package).to_string();

        for (base, names) in imports_in(&source, &package) {
            let mut targets = vec![base.clone()];
            // `from pkg import sub` may name a submodule rather than an attribute.
            for name in names {
                let candidate = format!("{base}.{name}");
                if resolve_local(root, &candidate).is_some() {
                    targets.push(candidate);
                }
            }

            for target in targets {
                let known = graph.index.contains_key(&target);
                let to = graph.node(&target);
                graph.graph.update_edge(from, to, ());
                if known {
                    continue;
                }

                match resolve_local(root, &target) {
                    Some(path) => {
                        log::debug!("import {} -> {}", target, path.display());
                        graph.origins.insert(target.clone(), ModuleOrigin::Local(path.clone()));
                        queue.push_back((to, target, path));
                    }
                    None => {
                        graph.origins.insert(target, ModuleOrigin::External);
                    }
                }
            }
        }
    }

    Ok(graph)
}
