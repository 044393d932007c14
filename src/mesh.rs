// mesh.rs: UV sphere the video is projected onto

pub const SPHERE_RADIUS: f32 = 256.0;
pub const SPHERE_SEGMENTS: usize = 32;

#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

/// Sphere mirrored on X so its faces point inward and the texture reads
/// correctly from the centre.
pub fn build_inverted_sphere(radius: f32, width_segments: usize, height_segments: usize) -> SphereMesh {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let count = (width_segments + 1) * (height_segments + 1);

    let mut positions = Vec::with_capacity(count);
    let mut uvs = Vec::with_capacity(count);
    let mut indices = Vec::with_capacity(width_segments * height_segments * 6);

    for i in 0..=height_segments {
        let v = i as f32 / height_segments as f32;
        let theta = std::f32::consts::PI * v;
        let y = radius * theta.cos();
        let sin_t = theta.sin();

        for j in 0..=width_segments {
            let u = j as f32 / width_segments as f32;
            let phi = 2.0 * std::f32::consts::PI * u;

            // already mirrored: the outward sphere would use -cos(phi)
            let x = radius * phi.cos() * sin_t;
            let z = radius * phi.sin() * sin_t;

            positions.push([x, y, z]);
            uvs.push([u, 1.0 - v]);
        }
    }

    let row = (width_segments + 1) as u32;
    for i in 0..height_segments as u32 {
        for j in 0..width_segments as u32 {
            let a = i * row + j;
            let b = a + row;

            // mirroring flips the winding; emit inward-facing CCW triangles
            if i != 0 {
                indices.extend_from_slice(&[a, b, a + 1]);
            }
            if i != height_segments as u32 - 1 {
                indices.extend_from_slice(&[a + 1, b, b + 1]);
            }
        }
    }

    SphereMesh {
        positions,
        uvs,
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn vertices_on_radius() {
        let mesh = build_inverted_sphere(SPHERE_RADIUS, SPHERE_SEGMENTS, SPHERE_SEGMENTS);
        assert_eq!(mesh.positions.len(), 33 * 33);
        for p in &mesh.positions {
            let r = Vec3::from_array(*p).length();
            assert!((r - SPHERE_RADIUS).abs() < 1e-2);
        }
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.positions.len()));
    }

    #[test]
    fn triangles_face_the_centre() {
        let mesh = build_inverted_sphere(10.0, 16, 8);
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Vec3::from_array(mesh.positions[i as usize]));
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            // CCW normal points back towards the origin
            assert!(normal.dot(centroid) < 0.0, "{tri:?}");
        }
    }

    #[test]
    fn pole_caps_skip_degenerate_triangles() {
        let mesh = build_inverted_sphere(1.0, 4, 2);
        // two rows, one triangle per quad each
        assert_eq!(mesh.indices.len(), 4 * 2 * 3);
    }
}
