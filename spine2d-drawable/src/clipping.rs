//! Clip state machine.
//!
//! A clipping attachment opens a clip region (`clip_start`); while a region is open every batch
//! routed through [`SkeletonClipper::clip_triangles`] is intersected with it. The region closes
//! when the slot it designates as its end is reached (`clip_end_slot`) or unconditionally via
//! `clip_end`.

use crate::geometry::{Triangulator, make_clockwise};
use crate::{ClippingAttachmentData, Skeleton};

/// Vertices one command can address with `u16` indices.
pub const MAX_BATCH_VERTICES: usize = u16::MAX as usize + 1;

#[derive(Debug, Default)]
pub struct SkeletonClipper {
    triangulator: Triangulator,
    /// Convex pieces of the clip polygon, clockwise and closed (first point repeated).
    clipping_polygons: Vec<Vec<f32>>,
    end_slot: Option<usize>,

    world_vertices: Vec<f32>,
    polygon_output: Vec<f32>,
    polygon_input: Vec<f32>,
    polygon_work: Vec<f32>,

    clipped_vertices: Vec<f32>,
    clipped_uvs: Vec<f32>,
    clipped_triangles: Vec<u16>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TriangleClip {
    /// Entirely inside the clip edge set; the original triangle is kept.
    Inside,
    /// Partially inside; the clipped polygon is in the output buffer.
    Clipped,
    /// Entirely outside.
    Outside,
}

impl SkeletonClipper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a clip region from `clip`'s world vertices on `slot_index`.
    ///
    /// Returns `false` when a region is already open (the request is ignored) or when the clip
    /// polygon has fewer than 3 vertices.
    pub fn clip_start(
        &mut self,
        skeleton: &Skeleton,
        slot_index: usize,
        clip: &ClippingAttachmentData,
    ) -> bool {
        if self.is_clipping() {
            return false;
        }
        let mut world = std::mem::take(&mut self.world_vertices);
        clip.compute_world_vertices(skeleton, slot_index, &mut world);
        let started = self.clip_start_polygon(&world, clip.end_slot);
        self.world_vertices = world;
        started
    }

    /// Opens a clip region from a world-space polygon (flat `x, y` pairs).
    pub fn clip_start_polygon(&mut self, polygon: &[f32], end_slot: Option<usize>) -> bool {
        if self.is_clipping() || polygon.len() < 6 || polygon.len() % 2 != 0 {
            return false;
        }

        let mut outline = polygon.to_vec();
        make_clockwise(&mut outline);
        let triangles = self.triangulator.triangulate(&outline);
        let mut polygons = self.triangulator.decompose(&outline, &triangles);
        for piece in &mut polygons {
            make_clockwise(piece);
            let (first_x, first_y) = (piece[0], piece[1]);
            piece.extend_from_slice(&[first_x, first_y]);
        }

        self.clipping_polygons = polygons;
        self.end_slot = end_slot;
        self.is_clipping()
    }

    /// Closes the open region if `slot_index` is the slot it ends at.
    pub fn clip_end_slot(&mut self, slot_index: usize) {
        if self.is_clipping() && self.end_slot == Some(slot_index) {
            self.clip_end();
        }
    }

    /// Unconditionally returns to idle.
    pub fn clip_end(&mut self) {
        self.clipping_polygons.clear();
        self.end_slot = None;
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_triangles.clear();
    }

    pub fn is_clipping(&self) -> bool {
        !self.clipping_polygons.is_empty()
    }

    pub fn end_slot(&self) -> Option<usize> {
        self.end_slot
    }

    /// Clips an indexed triangle batch against the open region.
    ///
    /// `vertices` and `uvs` hold `x, y` / `u, v` pairs at `stride` floats per vertex. Results
    /// overwrite the scratch buffers exposed by [`Self::clipped_vertices`],
    /// [`Self::clipped_uvs`] and [`Self::clipped_triangles`]. Without an open region the
    /// buffers are left empty.
    pub fn clip_triangles(&mut self, vertices: &[f32], triangles: &[u16], uvs: &[f32], stride: usize) {
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_triangles.clear();
        if !self.is_clipping() {
            return;
        }

        'triangles: for tri in triangles.chunks_exact(3) {
            let Some([x1, y1, u1, v1]) = read_vertex(vertices, uvs, tri[0], stride) else {
                continue;
            };
            let Some([x2, y2, u2, v2]) = read_vertex(vertices, uvs, tri[1], stride) else {
                continue;
            };
            let Some([x3, y3, u3, v3]) = read_vertex(vertices, uvs, tri[2], stride) else {
                continue;
            };

            for clip in &self.clipping_polygons {
                let result = clip_triangle(
                    [x1, y1, x2, y2, x3, y3],
                    clip,
                    &mut self.polygon_input,
                    &mut self.polygon_work,
                    &mut self.polygon_output,
                );

                match result {
                    TriangleClip::Outside => {}
                    TriangleClip::Clipped if self.polygon_output.is_empty() => {}
                    TriangleClip::Clipped => {
                        // Barycentric weights of each new point w.r.t. the source triangle.
                        let d0 = y2 - y3;
                        let d1 = x3 - x2;
                        let d2 = x1 - x3;
                        let d4 = y3 - y1;
                        let d = 1.0 / (d0 * d2 + d1 * (y1 - y3));

                        let point_count = self.polygon_output.len() / 2;
                        let Some(base) = index_base(self.clipped_vertices.len() / 2, point_count)
                        else {
                            break 'triangles;
                        };
                        for xy in self.polygon_output.chunks_exact(2) {
                            let (x, y) = (xy[0], xy[1]);
                            let c0 = x - x3;
                            let c1 = y - y3;
                            let a = (d0 * c0 + d1 * c1) * d;
                            let b = (d4 * c0 + d2 * c1) * d;
                            let c = 1.0 - a - b;
                            self.clipped_vertices.extend_from_slice(&[x, y]);
                            self.clipped_uvs
                                .extend_from_slice(&[u1 * a + u2 * b + u3 * c, v1 * a + v2 * b + v3 * c]);
                        }

                        for fan in 1..point_count.saturating_sub(1) {
                            let fan = fan as u16;
                            self.clipped_triangles.extend_from_slice(&[
                                base,
                                base + fan,
                                base + fan + 1,
                            ]);
                        }
                    }
                    TriangleClip::Inside => {
                        let Some(base) = index_base(self.clipped_vertices.len() / 2, 3) else {
                            break 'triangles;
                        };
                        self.clipped_vertices
                            .extend_from_slice(&[x1, y1, x2, y2, x3, y3]);
                        self.clipped_uvs.extend_from_slice(&[u1, v1, u2, v2, u3, v3]);
                        self.clipped_triangles.extend_from_slice(&[
                            base,
                            base + 1,
                            base + 2,
                        ]);
                        continue 'triangles;
                    }
                }
            }
        }
    }

    pub fn clipped_vertices(&self) -> &[f32] {
        &self.clipped_vertices
    }

    pub fn clipped_uvs(&self) -> &[f32] {
        &self.clipped_uvs
    }

    pub fn clipped_triangles(&self) -> &[u16] {
        &self.clipped_triangles
    }
}

/// First index for `count` more vertices after `emitted`, or `None` once the batch would no
/// longer be addressable with `u16` indices.
fn index_base(emitted: usize, count: usize) -> Option<u16> {
    if emitted + count > MAX_BATCH_VERTICES {
        log::warn!("clipped batch exceeds {MAX_BATCH_VERTICES} vertices; dropping the remaining triangles");
        return None;
    }
    u16::try_from(emitted).ok()
}

fn read_vertex(vertices: &[f32], uvs: &[f32], vertex: u16, stride: usize) -> Option<[f32; 4]> {
    let offset = vertex as usize * stride;
    Some([
        *vertices.get(offset)?,
        *vertices.get(offset + 1)?,
        *uvs.get(offset)?,
        *uvs.get(offset + 1)?,
    ])
}

/// Sutherland-Hodgman clip of one triangle against a closed convex polygon.
fn clip_triangle(
    triangle: [f32; 6],
    clip: &[f32],
    input: &mut Vec<f32>,
    work: &mut Vec<f32>,
    out: &mut Vec<f32>,
) -> TriangleClip {
    let mut result = TriangleClip::Inside;

    input.clear();
    input.extend_from_slice(&triangle);
    input.extend_from_slice(&triangle[..2]);
    work.clear();

    let mut input: &mut Vec<f32> = input;
    let mut output: &mut Vec<f32> = work;
    let last_edge = clip.len() - 4;
    let mut edge = 0usize;
    loop {
        let edge_x = clip[edge];
        let edge_y = clip[edge + 1];
        let ex = edge_x - clip[edge + 2];
        let ey = edge_y - clip[edge + 3];

        let output_start = output.len();
        for segment in input.windows(4).step_by(2) {
            let (input_x, input_y) = (segment[0], segment[1]);
            let (input_x2, input_y2) = (segment[2], segment[3]);

            let side2 = ey * (edge_x - input_x2) > ex * (edge_y - input_y2);
            let side1 = ey * (edge_x - input_x) - ex * (edge_y - input_y);

            if side1 > 0.0 {
                if side2 {
                    output.extend_from_slice(&[input_x2, input_y2]);
                    continue;
                }
                let ix = input_x2 - input_x;
                let iy = input_y2 - input_y;
                let t = side1 / (ix * ey - iy * ex);
                if (0.0..=1.0).contains(&t) {
                    output.extend_from_slice(&[input_x + ix * t, input_y + iy * t]);
                } else {
                    output.extend_from_slice(&[input_x2, input_y2]);
                }
            } else if side2 {
                let ix = input_x2 - input_x;
                let iy = input_y2 - input_y;
                let t = side1 / (ix * ey - iy * ex);
                if (0.0..=1.0).contains(&t) {
                    output.extend_from_slice(&[input_x + ix * t, input_y + iy * t, input_x2, input_y2]);
                } else {
                    output.extend_from_slice(&[input_x2, input_y2]);
                    continue;
                }
            }
            result = TriangleClip::Clipped;
        }

        if output_start == output.len() {
            out.clear();
            return TriangleClip::Outside;
        }
        let (first_x, first_y) = (output[0], output[1]);
        output.extend_from_slice(&[first_x, first_y]);

        if edge == last_edge {
            break;
        }
        std::mem::swap(&mut input, &mut output);
        output.clear();
        edge += 2;
    }

    out.clear();
    out.extend_from_slice(&output[..output.len() - 2]);
    result
}
