//! Mesh data structures and generation

use std::f32::consts::PI;
use std::sync::Arc;

use glam::{Vec2, Vec3};

use super::buffer::{IndexBuffer, VertexBuffer};
use crate::backend::traits::*;

/// Per-vertex attribute streams of a primitive, bound at the polygon tier.
#[derive(Debug)]
pub struct Polygon {
    pub points: VertexBuffer,
    pub normals: Option<VertexBuffer>,
    pub coords: Option<VertexBuffer>,
    pub tangents: Option<VertexBuffer>,
}

impl Polygon {
    pub fn new(points: VertexBuffer) -> Self {
        Self {
            points,
            normals: None,
            coords: None,
            tangents: None,
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.points.vertex_count()
    }

    pub fn dispose(self, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        let Polygon {
            points,
            normals,
            coords,
            tangents,
        } = self;
        points.dispose(backend)?;
        for stream in [normals, coords, tangents].into_iter().flatten() {
            stream.dispose(backend)?;
        }
        Ok(())
    }

    /// Drop one shared reference, disposing the streams if it was the last one.
    pub fn release(this: Arc<Self>, backend: &mut dyn GraphicsBackend) -> BackendResult<()> {
        match Arc::try_unwrap(this) {
            Ok(polygon) => polygon.dispose(backend),
            Err(_) => Ok(()),
        }
    }
}

/// CPU-side geometry
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub name: String,
    pub points: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub coords: Vec<Vec2>,
    pub tangents: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push(&mut self, point: Vec3, normal: Vec3, coord: Vec2, tangent: Vec3) {
        self.points.push(point);
        self.normals.push(normal);
        self.coords.push(coord);
        self.tangents.push(tangent);
    }

    fn push_grid_indices(&mut self, columns: u32, rows: u32) {
        for row in 0..rows {
            for column in 0..columns {
                let current = row * (columns + 1) + column;
                let next = current + columns + 1;

                self.indices.extend_from_slice(&[
                    current,
                    next,
                    current + 1,
                    current + 1,
                    next,
                    next + 1,
                ]);
            }
        }
    }

    /// Upload every non-empty stream. Streams created before a failure are released again.
    pub fn upload(&self, backend: &mut dyn GraphicsBackend) -> BackendResult<(Polygon, IndexBuffer)> {
        let mut polygon = Polygon::new(VertexBuffer::new(backend, &self.points, 3)?);

        let streams = (|| -> BackendResult<()> {
            if !self.normals.is_empty() {
                polygon.normals = Some(VertexBuffer::new(backend, &self.normals, 3)?);
            }
            if !self.coords.is_empty() {
                polygon.coords = Some(VertexBuffer::new(backend, &self.coords, 2)?);
            }
            if !self.tangents.is_empty() {
                polygon.tangents = Some(VertexBuffer::new(backend, &self.tangents, 3)?);
            }
            Ok(())
        })();

        let indices = match streams.and_then(|()| IndexBuffer::new(backend, &self.indices)) {
            Ok(indices) => indices,
            Err(e) => {
                if let Err(cleanup) = polygon.dispose(backend) {
                    log::warn!("Failed to release streams of '{}': {}", self.name, cleanup);
                }
                return Err(e);
            }
        };

        log::debug!(
            "Uploaded mesh '{}' ({} vertices, {} triangles)",
            self.name,
            self.vertex_count(),
            self.triangle_count()
        );
        Ok((polygon, indices))
    }

    /// Two triangles covering clip space, for full-screen passes.
    pub fn fullscreen_quad() -> Self {
        let mut mesh = MeshData::new("fullscreen_quad");
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        for (x, y) in corners {
            mesh.push(
                Vec3::new(x, y, 0.0),
                Vec3::Z,
                Vec2::new((x + 1.0) * 0.5, (y + 1.0) * 0.5),
                Vec3::X,
            );
        }
        mesh.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);
        mesh
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        let mut mesh = MeshData::new("cube");

        // (normal, tangent) per face; the bitangent is normal x tangent
        let faces = [
            (Vec3::Z, Vec3::X),
            (-Vec3::Z, -Vec3::X),
            (Vec3::X, -Vec3::Z),
            (-Vec3::X, Vec3::Z),
            (Vec3::Y, Vec3::X),
            (-Vec3::Y, Vec3::X),
        ];

        for (face, (normal, tangent)) in faces.into_iter().enumerate() {
            let bitangent = normal.cross(tangent);
            let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
            for (u, v) in corners {
                let point = (normal + tangent * u + bitangent * v) * 0.5;
                mesh.push(
                    point,
                    normal,
                    Vec2::new((u + 1.0) * 0.5, (1.0 - v) * 0.5),
                    tangent,
                );
            }

            let base = face as u32 * 4;
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        mesh
    }

    /// Create a UV sphere
    pub fn sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let mut mesh = MeshData::new("sphere");
        let segments = segments.max(3);
        let rings = rings.max(2);

        let segment_angle = 2.0 * PI / segments as f32;
        let ring_angle = PI / rings as f32;

        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());

                mesh.push(
                    normal * radius,
                    normal,
                    Vec2::new(
                        segment as f32 / segments as f32,
                        ring as f32 / rings as f32,
                    ),
                    Vec3::new(-theta.sin(), 0.0, theta.cos()),
                );
            }
        }

        // Counter-clockwise seen from outside
        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;

                mesh.indices.extend_from_slice(&[
                    current,
                    current + 1,
                    next,
                    current + 1,
                    next + 1,
                    next,
                ]);
            }
        }

        mesh
    }

    /// Sphere whose faces all lie outside the unit sphere, for point-light volumes.
    ///
    /// A UV sphere's vertices sit on the sphere but its flat faces cut inside it;
    /// scaling by the inverse cosine of the half-steps pushes every face out to radius 1.
    pub fn light_sphere(segments: u32) -> Self {
        let segments = segments.max(3);
        let rings = (segments / 2).max(2);
        let half_segment = PI / segments as f32;
        let half_ring = PI / (2 * rings) as f32;
        let radius = 1.0 / (half_segment.cos() * half_ring.cos());

        let mut mesh = Self::sphere(radius, segments, rings);
        mesh.name = "light_sphere".to_string();
        mesh
    }

    /// Create a plane on the XZ axis facing +Y
    pub fn plane(width: f32, depth: f32, subdivisions: u32) -> Self {
        let mut mesh = MeshData::new("plane");
        let subdivisions = subdivisions.max(1);

        let half_width = width / 2.0;
        let half_depth = depth / 2.0;
        let step_x = width / subdivisions as f32;
        let step_z = depth / subdivisions as f32;

        for z in 0..=subdivisions {
            for x in 0..=subdivisions {
                mesh.push(
                    Vec3::new(
                        -half_width + x as f32 * step_x,
                        0.0,
                        -half_depth + z as f32 * step_z,
                    ),
                    Vec3::Y,
                    Vec2::new(
                        x as f32 / subdivisions as f32,
                        z as f32 / subdivisions as f32,
                    ),
                    Vec3::X,
                );
            }
        }

        mesh.push_grid_indices(subdivisions, subdivisions);
        mesh
    }
}
