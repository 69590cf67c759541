//! Dependency cycle detection.
//!
//! The graph is flattened into dense integer indices (components in a
//! slice, edges as index vectors) and run through an iterative Tarjan
//! SCC pass. Edges to names not present in the registry are skipped:
//! unknown references are diagnostics, never graph nodes.

use rustc_hash::FxHashMap;

use super::ComponentInfo;

/// Find dependency cycles in the current component set.
///
/// Returns one entry per strongly connected component of size ≥ 2,
/// plus single nodes that reference themselves. Names within a cycle
/// and the cycle list itself are sorted for deterministic output.
pub fn detect(components: &FxHashMap<String, ComponentInfo>) -> Vec<Vec<String>> {
    // Dense index space: components in a slice, edges as index vectors.
    let mut names: Vec<&str> = components.keys().map(String::as_str).collect();
    names.sort_unstable();

    let index_of: FxHashMap<&str, usize> =
        names.iter().enumerate().map(|(i, n)| (*n, i)).collect();

    let edges: Vec<Vec<usize>> = names
        .iter()
        .map(|name| {
            let mut out: Vec<usize> = components[*name]
                .dependencies
                .iter()
                .filter_map(|dep| index_of.get(dep.as_str()).copied())
                .collect();
            out.sort_unstable();
            out
        })
        .collect();

    let sccs = tarjan(&edges);

    let mut cycles: Vec<Vec<String>> = sccs
        .into_iter()
        .filter(|scc| scc.len() > 1 || edges[scc[0]].contains(&scc[0]))
        .map(|scc| {
            let mut cycle: Vec<String> = scc.iter().map(|&i| names[i].to_string()).collect();
            cycle.sort_unstable();
            cycle
        })
        .collect();
    cycles.sort();
    cycles
}

/// Iterative Tarjan SCC (explicit stack; no recursion limit concerns).
fn tarjan(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = edges.len();
    const UNVISITED: usize = usize::MAX;

    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut sccs: Vec<Vec<usize>> = Vec::new();

    // Work stack frames: (node, next child position)
    let mut work: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if index[start] != UNVISITED {
            continue;
        }
        work.push((start, 0));

        while let Some(&mut (v, ref mut child)) = work.last_mut() {
            if *child == 0 {
                index[v] = next_index;
                lowlink[v] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v] = true;
            }

            if let Some(&w) = edges[v].get(*child) {
                *child += 1;
                if index[w] == UNVISITED {
                    work.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            // All children visited: close the frame.
            work.pop();
            if let Some(&(parent, _)) = work.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }

            if lowlink[v] == index[v] {
                let mut scc = Vec::new();
                loop {
                    let w = stack.pop().expect("tarjan stack underflow");
                    on_stack[w] = false;
                    scc.push(w);
                    if w == v {
                        break;
                    }
                }
                sccs.push(scc);
            }
        }
    }

    sccs
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> FxHashMap<String, ComponentInfo> {
        let mut map = FxHashMap::default();
        for (name, deps) in edges {
            let mut info = ComponentInfo::new(*name, format!("/p/{name}.templ"));
            for dep in *deps {
                info.dependencies.insert((*dep).to_string());
            }
            map.insert((*name).to_string(), info);
        }
        map
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let g = graph(&[("Page", &["Nav", "Footer"]), ("Nav", &[]), ("Footer", &[])]);
        assert!(detect(&g).is_empty());
    }

    #[test]
    fn test_two_node_cycle() {
        let g = graph(&[("A", &["B"]), ("B", &["A"])]);
        assert_eq!(detect(&g), vec![vec!["A".to_string(), "B".to_string()]]);
    }

    #[test]
    fn test_self_loop_detected() {
        let g = graph(&[("Recursive", &["Recursive"]), ("Other", &[])]);
        assert_eq!(detect(&g), vec![vec!["Recursive".to_string()]]);
    }

    #[test]
    fn test_unknown_dependency_is_not_an_edge() {
        // "A -> Ghost -> A" cannot form a cycle: Ghost is not registered.
        let g = graph(&[("A", &["Ghost"])]);
        assert!(detect(&g).is_empty());
    }

    #[test]
    fn test_separate_cycles_reported_separately() {
        let g = graph(&[
            ("A", &["B"]),
            ("B", &["A"]),
            ("X", &["Y"]),
            ("Y", &["Z"]),
            ("Z", &["X"]),
            ("Lone", &["A"]),
        ]);
        let cycles = detect(&g);
        assert_eq!(cycles.len(), 2);
        assert!(cycles.contains(&vec!["A".to_string(), "B".to_string()]));
        assert!(cycles.contains(&vec![
            "X".to_string(),
            "Y".to_string(),
            "Z".to_string()
        ]));
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        // Iterative traversal must handle deep chains.
        let mut links: Vec<(String, String)> = Vec::new();
        for i in 0..5000 {
            links.push((format!("C{i}"), format!("C{}", i + 1)));
        }
        let mut map = FxHashMap::default();
        for (name, dep) in &links {
            let mut info = ComponentInfo::new(name.clone(), "/p/chain.templ");
            info.dependencies.insert(dep.clone());
            map.insert(name.clone(), info);
        }
        assert!(detect(&map).is_empty());
    }
}
