//! Triangulated grid meshes derived from heightmaps

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::core::{Error, Result};
use crate::terrain::heightmap::Heightmap;

/// Accumulated normals shorter than this are clamped before normalizing
pub const NORMAL_EPSILON: f32 = 1e-6;

/// Interleaved vertex layout for GPU upload
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Geometry for one tile at one resolution.
///
/// `vertices[i]`, `normals[i]` and `uvs[i]` describe the same vertex.
/// Triangles index into these arrays, three indices per triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub triangles: Vec<u32>,
}

impl MeshData {
    /// Build an `M × M` vertex grid spanning `tile_length` from a heightmap.
    ///
    /// The heightmap is sampled at stride `(R - 1) / (M - 1)`, bilinearly when
    /// the stride is fractional, so edge vertices always land on edge cells
    /// and neighbouring tiles share border heights.
    ///
    /// # Arguments
    /// * `heightmap` - Source heights, resolution `R >= resolution`
    /// * `resolution` - Vertices per side `M`, at least 2
    /// * `tile_length` - World-space edge length of the tile
    ///
    /// # Returns
    /// `Error::InvalidResolution` if `M < 2` or the heightmap is coarser than `M`
    pub fn from_heightmap(heightmap: &Heightmap, resolution: u32, tile_length: f32) -> Result<Self> {
        let available = heightmap.resolution();
        if resolution < 2 || available < resolution {
            return Err(Error::InvalidResolution {
                requested: resolution,
                available,
            });
        }

        let m = resolution as usize;
        let last = (resolution - 1) as f32;
        let stride = (available - 1) as f32 / last;

        let mut vertices = Vec::with_capacity(m * m);
        let mut uvs = Vec::with_capacity(m * m);
        for z in 0..resolution {
            for x in 0..resolution {
                let u = x as f32 / last;
                let v = z as f32 / last;
                let height = heightmap.sample_bilinear(x as f32 * stride, z as f32 * stride);

                vertices.push(Vec3::new(u * tile_length, height, v * tile_length));
                uvs.push(Vec2::new(u, v));
            }
        }

        let triangles = grid_triangles(resolution);
        let normals = smooth_normals(&vertices, &triangles);

        Ok(Self {
            vertices,
            normals,
            uvs,
            triangles,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    /// Recompute normals from the current vertices and triangles
    pub fn recalculate_normals(&mut self) {
        self.normals = smooth_normals(&self.vertices, &self.triangles);
    }

    /// Pack into the interleaved [`Vertex`] layout
    pub fn interleaved(&self) -> Vec<Vertex> {
        self.vertices
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((p, n), uv)| Vertex {
                position: p.to_array(),
                normal: n.to_array(),
                uv: uv.to_array(),
            })
            .collect()
    }
}

/// Index buffer for an `M × M` vertex grid: two triangles per cell.
///
/// Winding is chosen so that a flat grid faces +Y.
pub fn grid_triangles(resolution: u32) -> Vec<u32> {
    if resolution < 2 {
        return Vec::new();
    }

    let m = resolution;
    let cells = (m - 1) as usize;
    let mut triangles = Vec::with_capacity(cells * cells * 6);

    for z in 0..m - 1 {
        for x in 0..m - 1 {
            let i = z * m + x;
            triangles.extend_from_slice(&[i, i + m, i + 1]);
            triangles.extend_from_slice(&[i + 1, i + m, i + m + 1]);
        }
    }

    triangles
}

/// Area-weighted smooth normals.
///
/// Each triangle's unnormalized edge cross product is added to all three of
/// its vertices, and every sum is normalized once at the end. Vertices that
/// no triangle touches get a zero normal.
pub fn smooth_normals(vertices: &[Vec3], triangles: &[u32]) -> Vec<Vec3> {
    let mut accumulated = vec![Vec3::ZERO; vertices.len()];

    for tri in triangles.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let face = (vertices[b] - vertices[a]).cross(vertices[c] - vertices[a]);
        accumulated[a] += face;
        accumulated[b] += face;
        accumulated[c] += face;
    }

    accumulated
        .into_iter()
        .map(|n| n / n.length().max(NORMAL_EPSILON))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_flat_normals_point_up() {
        let hm = Heightmap::from_fn(9, |_, _| 4.0);
        let mesh = MeshData::from_heightmap(&hm, 9, 10.0).unwrap();

        assert!(mesh.normals.iter().all(|&n| approx(n, Vec3::Y)));
        assert!(mesh.vertices.iter().all(|v| v.y == 4.0));
    }

    #[test]
    fn test_grid_counts() {
        let hm = Heightmap::new(17);
        let mesh = MeshData::from_heightmap(&hm, 17, 1.0).unwrap();

        assert_eq!(mesh.vertex_count(), 17 * 17);
        assert_eq!(mesh.normals.len(), mesh.vertex_count());
        assert_eq!(mesh.uvs.len(), mesh.vertex_count());
        assert_eq!(mesh.triangle_count(), 2 * 16 * 16);
        assert!(mesh.triangles.iter().all(|&i| (i as usize) < mesh.vertex_count()));
    }

    #[test]
    fn test_vertex_extents_and_uvs() {
        let hm = Heightmap::new(5);
        let mesh = MeshData::from_heightmap(&hm, 5, 20.0).unwrap();

        assert_eq!(mesh.vertices[0], Vec3::ZERO);
        assert_eq!(mesh.vertices[24], Vec3::new(20.0, 0.0, 20.0));
        assert_eq!(mesh.vertices[4], Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(mesh.uvs[0], Vec2::ZERO);
        assert_eq!(mesh.uvs[24], Vec2::ONE);
        assert_eq!(mesh.uvs[5], Vec2::new(0.0, 0.25));
    }

    #[test]
    fn test_integral_stride_samples_exact_cells() {
        let hm = Heightmap::from_fn(9, |x, z| (x * 100 + z) as f32);
        let mesh = MeshData::from_heightmap(&hm, 5, 8.0).unwrap();

        // Stride 2: vertex (1, 2) samples cell (2, 4)
        let v = mesh.vertices[2 * 5 + 1];
        assert_eq!(v.y, hm.get(2, 4));
        // Far corner samples the far corner cell
        assert_eq!(mesh.vertices[24].y, hm.get(8, 8));
    }

    #[test]
    fn test_fractional_stride_interpolates() {
        let hm = Heightmap::from_fn(4, |x, _| x as f32);
        let mesh = MeshData::from_heightmap(&hm, 3, 1.0).unwrap();

        // Stride 1.5: middle vertex lands between cells 1 and 2
        assert!((mesh.vertices[1].y - 1.5).abs() < 1e-6);
        assert_eq!(mesh.vertices[2].y, 3.0);
    }

    #[test]
    fn test_slope_normals() {
        // h = x: normal is (-1, 1, 0) normalized everywhere
        let hm = Heightmap::from_fn(5, |x, _| x as f32);
        let mesh = MeshData::from_heightmap(&hm, 5, 4.0).unwrap();
        let expected = Vec3::new(-1.0, 1.0, 0.0).normalize();

        assert!(mesh.normals.iter().all(|&n| approx(n, expected)));
    }

    #[test]
    fn test_rejects_resolution_below_two() {
        let hm = Heightmap::new(4);
        let err = MeshData::from_heightmap(&hm, 1, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidResolution { requested: 1, available: 4 }));
    }

    #[test]
    fn test_rejects_resolution_above_heightmap() {
        let hm = Heightmap::new(4);
        let err = MeshData::from_heightmap(&hm, 8, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidResolution { requested: 8, available: 4 }));
    }

    #[test]
    fn test_isolated_vertex_has_no_nan() {
        let vertices = vec![Vec3::ZERO, Vec3::X, Vec3::Z, Vec3::new(5.0, 5.0, 5.0)];
        let normals = smooth_normals(&vertices, &[0, 2, 1]);

        assert!(approx(normals[0], Vec3::Y));
        assert_eq!(normals[3], Vec3::ZERO);
        assert!(normals.iter().all(|n| !n.is_nan()));
    }

    #[test]
    fn test_degenerate_triangle_has_no_nan() {
        let vertices = vec![Vec3::ONE, Vec3::ONE, Vec3::ONE];
        let normals = smooth_normals(&vertices, &[0, 1, 2]);
        assert!(normals.iter().all(|n| !n.is_nan() && *n == Vec3::ZERO));
    }

    #[test]
    fn test_area_weighting() {
        // Large flat triangle and small steep triangle sharing vertex 0
        let vertices = vec![
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 0.1, 0.1),
            Vec3::new(0.1, 0.0, 0.0),
        ];
        let normals = smooth_normals(&vertices, &[0, 1, 2, 0, 3, 4]);

        // The flat triangle dominates the shared vertex
        assert!(normals[0].y > 0.99);
    }

    #[test]
    fn test_interleaved_matches_arrays() {
        let hm = Heightmap::from_fn(3, |x, z| (x + z) as f32);
        let mesh = MeshData::from_heightmap(&hm, 3, 2.0).unwrap();
        let packed = mesh.interleaved();

        assert_eq!(packed.len(), mesh.vertex_count());
        assert_eq!(packed[4].position, mesh.vertices[4].to_array());
        assert_eq!(packed[4].normal, mesh.normals[4].to_array());
        assert_eq!(packed[4].uv, [0.5, 0.5]);
        assert_eq!(bytemuck::cast_slice::<Vertex, u8>(&packed).len(), packed.len() * 32);
    }

    #[test]
    fn test_recalculate_normals() {
        let hm = Heightmap::new(3);
        let mut mesh = MeshData::from_heightmap(&hm, 3, 1.0).unwrap();
        mesh.vertices[4].y = 1.0;
        mesh.recalculate_normals();
        assert!(approx(mesh.normals[4], Vec3::Y)); // peak of a symmetric bump
        assert!(!approx(mesh.normals[1], Vec3::Y));
        assert!(mesh.normals[1].z < 0.0);
    }
}
