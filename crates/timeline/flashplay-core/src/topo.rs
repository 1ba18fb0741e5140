//! Dependency ordering of the symbol instance graph.

use std::collections::VecDeque;

use crate::document::Symbol;
use crate::ids::SymbolId;

/// Order symbols so every symbol precedes the symbols it instances.
///
/// On a cycle, returns the id of one symbol that participates in it.
pub fn topo_order(symbols: &[Symbol]) -> Result<Vec<SymbolId>, SymbolId> {
    let n = symbols.len();
    let mut indeg = vec![0usize; n];
    let mut adj: Vec<Vec<SymbolId>> = vec![Vec::new(); n];

    for s in symbols {
        for child in s.children() {
            if child.index() >= n {
                continue;
            }
            adj[s.id.index()].push(child);
            indeg[child.index()] += 1;
        }
    }

    let mut q: VecDeque<SymbolId> = (0..n)
        .filter(|&i| indeg[i] == 0)
        .map(|i| SymbolId(i as u32))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(u) = q.pop_front() {
        order.push(u);
        for v in &adj[u.index()] {
            let d = &mut indeg[v.index()];
            *d -= 1;
            if *d == 0 {
                q.push_back(*v);
            }
        }
    }

    if order.len() != n {
        let stuck = (0..n).find(|&i| indeg[i] > 0).unwrap_or(0);
        return Err(SymbolId(stuck as u32));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Element, Frame, Layer, LayerRole, SymbolInstance};
    use crate::transform::ColorTransform;
    use glam::Affine2;

    fn sym(id: u32, children: &[u32]) -> Symbol {
        let elements = children
            .iter()
            .map(|c| {
                Element::Symbol(SymbolInstance {
                    symbol: SymbolId(*c),
                    transform: Affine2::IDENTITY,
                    color: ColorTransform::IDENTITY,
                    first_frame: 0,
                    loop_mode: Default::default(),
                })
            })
            .collect();
        Symbol {
            id: SymbolId(id),
            token: format!("s{id}"),
            local_path: format!("s{id}"),
            duration: 1,
            layers: vec![Layer {
                name: "L".into(),
                role: LayerRole::Normal,
                frames: vec![Frame {
                    start: 0,
                    duration: 1,
                    elements,
                    tween: None,
                    event: None,
                }],
            }],
            clips_header: None,
            clips: Default::default(),
            variation_index: None,
        }
    }

    #[test]
    fn parents_precede_children() {
        let syms = vec![sym(0, &[1, 2]), sym(1, &[2]), sym(2, &[])];
        let order = topo_order(&syms).unwrap();
        assert_eq!(order, vec![SymbolId(0), SymbolId(1), SymbolId(2)]);
    }

    #[test]
    fn cycle_is_reported() {
        let syms = vec![sym(0, &[1]), sym(1, &[2]), sym(2, &[1])];
        let stuck = topo_order(&syms).unwrap_err();
        assert!(stuck == SymbolId(1) || stuck == SymbolId(2));
    }
}
