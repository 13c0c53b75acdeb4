//! `.tri` / `.cdt` readers and writers: full triangulations, with
//! or without constraint edges, for decimation.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::errors::{TerraError, TerraResult};
use crate::io::pts::Tokens;
use crate::mesh::marks::Marks;
use crate::mesh::{EdgeId, MeshStore, VertexId};

fn build_mesh(points: &[(f64, f64, f64)], triangles: &[(usize, usize, usize)]) -> TerraResult<(MeshStore, Vec<VertexId>)> {
    let mut store = MeshStore::new();
    let vids: Vec<VertexId> = points.iter().map(|&(x, y, z)| store.new_vertex(x, y, z)).collect();
    let mut edge_of: HashMap<(usize, usize), EdgeId> = HashMap::new();
    let mut edge_between = |store: &mut MeshStore, a: usize, b: usize| -> EdgeId {
        let key = (a.min(b), a.max(b));
        *edge_of.entry(key).or_insert_with(|| store.new_edge(vids[a], vids[b]))
    };

    for &(i, j, k) in triangles {
        for &idx in &[i, j, k] {
            if idx >= vids.len() {
                return Err(TerraError::Io(format!("triangle references out-of-range point index {idx}")));
            }
        }
        let eij = edge_between(&mut store, i, j);
        let ejk = edge_between(&mut store, j, k);
        let eki = edge_between(&mut store, k, i);
        store.new_triangle(eij, ejk, eki)?;
    }
    Ok((store, vids))
}

/// Reads a `.tri` file: a `.pts` body plus a full Delaunay triangulation,
/// for decimation of an already-refined mesh.
///
/// # Errors
///
/// Returns [`TerraError::Io`] if the file cannot be read or is malformed.
pub fn read_tri(path: impl AsRef<Path>) -> TerraResult<MeshStore> {
    let text = fs::read_to_string(path)?;
    let mut tokens = Tokens::new(&text);
    let (points, triangles) = read_points_and_triangles(&mut tokens)?;
    let (store, _vids) = build_mesh(&points, &triangles)?;
    Ok(store)
}

/// Reads a `.cdt` file: a `.tri` body plus constraint edges.
///
/// # Errors
///
/// Returns [`TerraError::Io`] if the file cannot be read, is malformed, or
/// a constraint references two points with no edge between them.
pub fn read_cdt(path: impl AsRef<Path>) -> TerraResult<MeshStore> {
    let text = fs::read_to_string(path)?;
    let mut tokens = Tokens::new(&text);
    let (points, triangles) = read_points_and_triangles(&mut tokens)?;
    let (mut store, vids) = build_mesh(&points, &triangles)?;

    let m = tokens.next_usize()?;
    for _ in 0..m {
        let i = tokens.next_usize()?;
        let j = tokens.next_usize()?;
        let (vi, vj) = (
            *vids.get(i).ok_or_else(|| TerraError::Io(format!("constraint references out-of-range point index {i}")))?,
            *vids.get(j).ok_or_else(|| TerraError::Io(format!("constraint references out-of-range point index {j}")))?,
        );
        let e = store
            .get_ve(vi)?
            .into_iter()
            .find(|&e| store.edge(e).unwrap().other_endpoint(vi) == Some(vj))
            .ok_or_else(|| TerraError::Io(format!("no edge between constrained points {i} and {j}")))?;
        store.edge_mut(e).unwrap().marks.set(Marks::CONSTRAINED);
        store.vertex_mut(vi).unwrap().n_inc_constr += 1;
        store.vertex_mut(vj).unwrap().n_inc_constr += 1;
    }
    Ok(store)
}

fn read_points_and_triangles(tokens: &mut Tokens) -> TerraResult<(Vec<(f64, f64, f64)>, Vec<(usize, usize, usize)>)> {
    let n = tokens.next_usize()?;
    let points = (0..n)
        .map(|_| Ok((tokens.next_f64()?, tokens.next_f64()?, tokens.next_f64()?)))
        .collect::<TerraResult<Vec<_>>>()?;
    let t = tokens.next_usize()?;
    let triangles = (0..t)
        .map(|_| Ok((tokens.next_usize()?, tokens.next_usize()?, tokens.next_usize()?)))
        .collect::<TerraResult<Vec<_>>>()?;
    Ok((points, triangles))
}

/// BFS renumbering from the seed triangle: since decimation may
/// leave gaps in the vertex arena, output vertex IDs are re-densified to
/// `[0..nVrt)` in the order they are first reached, walking triangle
/// adjacency breadth-first from `store.first_triangle`.
fn bfs_renumber(store: &MeshStore) -> TerraResult<(Vec<VertexId>, HashMap<VertexId, usize>)> {
    let mut order = Vec::with_capacity(store.vertex_count());
    let mut index_of = HashMap::with_capacity(store.vertex_count());
    let assign = |v: VertexId, order: &mut Vec<VertexId>, index_of: &mut HashMap<VertexId, usize>| {
        index_of.entry(v).or_insert_with(|| {
            order.push(v);
            order.len() - 1
        });
    };

    let mut visited_tri = std::collections::HashSet::new();
    let mut queue = VecDeque::new();
    if let Some(seed) = store.first_triangle {
        queue.push_back(seed);
        visited_tri.insert(seed);
    }
    while let Some(t) = queue.pop_front() {
        let (v0, v1, v2) = store.get_tv(t)?;
        for v in [v0, v1, v2] {
            assign(v, &mut order, &mut index_of);
        }
        for next in store.get_tt(t)?.into_iter().flatten() {
            if visited_tri.insert(next) {
                queue.push_back(next);
            }
        }
    }
    // A vertex store.first_triangle's component never reaches (shouldn't
    // happen in a single connected triangulation, but costs nothing to
    // cover) still gets an index, in arena order.
    for v in store.vertex_ids() {
        assign(v, &mut order, &mut index_of);
    }
    Ok((order, index_of))
}

fn write_points_and_triangles(
    store: &MeshStore,
    out: &mut impl Write,
    order: &[VertexId],
    index_of: &HashMap<VertexId, usize>,
) -> TerraResult<()> {
    writeln!(out, "{}", order.len())?;
    for &v in order {
        let vertex = store.vertex(v).unwrap();
        writeln!(out, "{} {} {}", vertex.x, vertex.y, vertex.z)?;
    }

    let mut visited_tri = std::collections::HashSet::new();
    let mut bfs_triangles = Vec::new();
    let mut queue = VecDeque::new();
    if let Some(seed) = store.first_triangle {
        queue.push_back(seed);
        visited_tri.insert(seed);
    }
    while let Some(t) = queue.pop_front() {
        bfs_triangles.push(t);
        for next in store.get_tt(t)?.into_iter().flatten() {
            if visited_tri.insert(next) {
                queue.push_back(next);
            }
        }
    }

    writeln!(out, "{}", bfs_triangles.len())?;
    for t in bfs_triangles {
        let (v0, v1, v2) = store.get_tv(t)?;
        writeln!(out, "{} {} {}", index_of[&v0], index_of[&v1], index_of[&v2])?;
    }
    Ok(())
}

/// Writes `store` as a `.tri` file, BFS-renumbered from
/// `store.first_triangle`.
///
/// # Errors
///
/// Returns [`TerraError::Io`] on any write failure or mesh-traversal
/// failure.
pub fn write_tri(path: impl AsRef<Path>, store: &MeshStore) -> TerraResult<()> {
    let (order, index_of) = bfs_renumber(store)?;
    let mut out = fs::File::create(path)?;
    write_points_and_triangles(store, &mut out, &order, &index_of)
}

/// Writes `store` as a `.cdt` file: the same body as [`write_tri`] plus
/// the BFS-renumbered constraint edge list.
///
/// # Errors
///
/// Returns [`TerraError::Io`] on any write failure or mesh-traversal
/// failure.
pub fn write_cdt(path: impl AsRef<Path>, store: &MeshStore) -> TerraResult<()> {
    let (order, index_of) = bfs_renumber(store)?;
    let mut out = fs::File::create(path)?;
    write_points_and_triangles(store, &mut out, &order, &index_of)?;

    let constrained: Vec<(usize, usize)> = store
        .edge_ids()
        .filter(|&e| store.edge(e).unwrap().marks.has(Marks::CONSTRAINED))
        .map(|e| {
            let ev = store.edge(e).unwrap().ev;
            (index_of[&ev[0]], index_of[&ev[1]])
        })
        .collect();
    writeln!(out, "{}", constrained.len())?;
    for (i, j) in constrained {
        writeln!(out, "{i} {j}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tri_text() -> &'static str {
        "4\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n2\n0 1 2\n0 2 3\n"
    }

    fn write_tmp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_a_tri_file_into_a_consistent_mesh() {
        let path = write_tmp("terra-mt-test-read.tri", sample_tri_text());
        let store = read_tri(&path).unwrap();
        assert_eq!(store.vertex_count(), 4);
        assert_eq!(store.triangle_count(), 2);
        store.debug_check_invariants().unwrap();
        let _ = fs::remove_file(path);
    }

    #[test]
    fn round_trips_through_write_tri() {
        let path = write_tmp("terra-mt-test-roundtrip-in.tri", sample_tri_text());
        let store = read_tri(&path).unwrap();
        let out_path = write_tmp("terra-mt-test-roundtrip-out.tri", "");
        write_tri(&out_path, &store).unwrap();
        let reread = read_tri(&out_path).unwrap();
        assert_eq!(reread.vertex_count(), store.vertex_count());
        assert_eq!(reread.triangle_count(), store.triangle_count());
        reread.debug_check_invariants().unwrap();
        let _ = fs::remove_file(path);
        let _ = fs::remove_file(out_path);
    }

    #[test]
    fn reads_and_writes_cdt_constraints() {
        let text = "4\n0 0 0\n1 0 0\n1 1 0\n0 1 0\n2\n0 1 2\n0 2 3\n1\n0 2\n";
        let path = write_tmp("terra-mt-test.cdt", text);
        let store = read_cdt(&path).unwrap();
        let constrained_count = store
            .edge_ids()
            .filter(|&e| store.edge(e).unwrap().marks.has(Marks::CONSTRAINED))
            .count();
        assert_eq!(constrained_count, 1);
        let out_path = write_tmp("terra-mt-test-out.cdt", "");
        write_cdt(&out_path, &store).unwrap();
        let reread = read_cdt(&out_path).unwrap();
        let reread_constrained = reread
            .edge_ids()
            .filter(|&e| reread.edge(e).unwrap().marks.has(Marks::CONSTRAINED))
            .count();
        assert_eq!(reread_constrained, 1);
        let _ = fs::remove_file(path);
        let _ = fs::remove_file(out_path);
    }
}
