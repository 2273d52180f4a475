//! World-vertex computation and texture binding for attachments.

use crate::{
    AttachmentData, Bone, ClippingAttachmentData, MeshAttachmentData, MeshVertices,
    RegionAttachmentData, Skeleton, TextureRegion,
};

const DEFAULT_REGION_UVS: [f32; 8] = [1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0];

impl RegionAttachmentData {
    /// Binds the attachment to `region` and recomputes its local corners and page UVs.
    pub fn update_region(&mut self, region: Option<TextureRegion>) {
        self.region = region;
        self.offset = self.local_corners();
        self.uvs = match &self.region {
            Some(r) if r.degrees == 90 => [r.u2, r.v, r.u2, r.v2, r.u, r.v2, r.u, r.v],
            Some(r) => [r.u2, r.v2, r.u, r.v2, r.u, r.v, r.u2, r.v],
            None => DEFAULT_REGION_UVS,
        };
    }

    fn local_corners(&self) -> [f32; 8] {
        let (local_x, local_y, local_x2, local_y2) = match &self.region {
            Some(r) => {
                let region_scale_x = self.width / r.original_width * self.scale_x;
                let region_scale_y = self.height / r.original_height * self.scale_y;
                let local_x = -self.width * 0.5 * self.scale_x + r.offset_x * region_scale_x;
                let local_y = -self.height * 0.5 * self.scale_y + r.offset_y * region_scale_y;
                (
                    local_x,
                    local_y,
                    local_x + r.width * region_scale_x,
                    local_y + r.height * region_scale_y,
                )
            }
            None => (
                -self.width * 0.5 * self.scale_x,
                -self.height * 0.5 * self.scale_y,
                self.width * 0.5 * self.scale_x,
                self.height * 0.5 * self.scale_y,
            ),
        };

        let radians = self.rotation.to_radians();
        let (sin, cos) = radians.sin_cos();

        let local_x_cos = local_x * cos + self.x;
        let local_x_sin = local_x * sin;
        let local_y_cos = local_y * cos + self.y;
        let local_y_sin = local_y * sin;
        let local_x2_cos = local_x2 * cos + self.x;
        let local_x2_sin = local_x2 * sin;
        let local_y2_cos = local_y2 * cos + self.y;
        let local_y2_sin = local_y2 * sin;

        [
            // BR
            local_x2_cos - local_y_sin,
            local_y_cos + local_x2_sin,
            // BL
            local_x_cos - local_y_sin,
            local_y_cos + local_x_sin,
            // UL
            local_x_cos - local_y2_sin,
            local_y2_cos + local_x_sin,
            // UR
            local_x2_cos - local_y2_sin,
            local_y2_cos + local_x2_sin,
        ]
    }

    /// Writes the 4 world-space corners (BR, BL, UL, UR) into `out[..8]`.
    pub fn compute_world_vertices(&self, bone: &Bone, out: &mut [f32]) {
        for (corner, dst) in self.offset.chunks_exact(2).zip(out.chunks_exact_mut(2)) {
            let [x, y] = bone.local_to_world(corner[0], corner[1]);
            dst[0] = x;
            dst[1] = y;
        }
    }
}

impl MeshAttachmentData {
    /// Binds the mesh to `region` and maps its region-relative UVs onto the page.
    pub fn update_region(&mut self, region: Option<TextureRegion>) {
        self.region = region;
        self.uvs.clear();
        let Some(r) = &self.region else {
            self.uvs.extend_from_slice(&self.region_uvs);
            return;
        };

        let tex_w = r.page_width.max(1.0);
        let tex_h = r.page_height.max(1.0);
        let ow = r.original_width;
        let oh = r.original_height;
        let mut u = r.u;
        let mut v = r.v;

        let (width, height) = match r.degrees {
            90 => {
                u -= (oh - r.offset_y - r.height) / tex_w;
                v -= (ow - r.offset_x - r.width) / tex_h;
                (oh / tex_w, ow / tex_h)
            }
            180 => {
                u -= (ow - r.offset_x - r.width) / tex_w;
                v -= r.offset_y / tex_h;
                (ow / tex_w, oh / tex_h)
            }
            270 => {
                u -= r.offset_y / tex_w;
                v -= r.offset_x / tex_h;
                (oh / tex_w, ow / tex_h)
            }
            _ => {
                u -= r.offset_x / tex_w;
                v -= (oh - r.offset_y - r.height) / tex_h;
                (ow / tex_w, oh / tex_h)
            }
        };

        for uv in self.region_uvs.chunks_exact(2) {
            let (ru, rv) = (uv[0], uv[1]);
            let mapped = match r.degrees {
                90 => [u + rv * width, v + (1.0 - ru) * height],
                180 => [u + (1.0 - ru) * width, v + (1.0 - rv) * height],
                270 => [u + (1.0 - rv) * width, v + ru * height],
                _ => [u + ru * width, v + rv * height],
            };
            self.uvs.extend_from_slice(&mapped);
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.vertex_count()
    }

    /// Computes the mesh's world vertices for `slot_index`, honoring bone weights and the slot's
    /// deform offsets. `out` is resized to `2 * vertex_count`.
    pub fn compute_world_vertices(&self, skeleton: &Skeleton, slot_index: usize, out: &mut Vec<f32>) {
        compute_vertices(skeleton, slot_index, &self.vertices, out);
    }
}

impl ClippingAttachmentData {
    pub fn compute_world_vertices(&self, skeleton: &Skeleton, slot_index: usize, out: &mut Vec<f32>) {
        compute_vertices(skeleton, slot_index, &self.vertices, out);
    }
}

impl AttachmentData {
    /// World vertices of any vertex-bearing attachment. Region and point attachments are not
    /// vertex attachments and yield `false`.
    pub fn compute_vertex_world_positions(
        &self,
        skeleton: &Skeleton,
        slot_index: usize,
        out: &mut Vec<f32>,
    ) -> bool {
        let vertices = match self {
            AttachmentData::Mesh(a) => &a.vertices,
            AttachmentData::Clipping(a) => &a.vertices,
            AttachmentData::BoundingBox(a) => &a.vertices,
            AttachmentData::Path(a) => &a.vertices,
            AttachmentData::Region(_) | AttachmentData::Point(_) => return false,
        };
        compute_vertices(skeleton, slot_index, vertices, out);
        true
    }
}

fn compute_vertices(
    skeleton: &Skeleton,
    slot_index: usize,
    vertices: &MeshVertices,
    out: &mut Vec<f32>,
) {
    out.clear();
    out.resize(vertices.world_vertices_length(), 0.0);

    let Some(slot) = skeleton.slots.get(slot_index) else {
        return;
    };
    let deform = slot.deform.as_slice();

    match vertices {
        MeshVertices::Unweighted(points) => {
            let Some(bone) = skeleton.bones.get(slot.bone) else {
                return;
            };
            // Unweighted deform stores absolute local positions.
            let use_deform = deform.len() >= points.len() * 2 && !deform.is_empty();
            for (i, (p, dst)) in points.iter().zip(out.chunks_exact_mut(2)).enumerate() {
                let (x, y) = if use_deform {
                    (deform[i * 2], deform[i * 2 + 1])
                } else {
                    (p[0], p[1])
                };
                let [wx, wy] = bone.local_to_world(x, y);
                dst[0] = wx;
                dst[1] = wy;
            }
        }
        MeshVertices::Weighted(points) => {
            // Weighted deform stores offsets, one pair per (vertex, bone) weight.
            let mut f = 0usize;
            for (weights, dst) in points.iter().zip(out.chunks_exact_mut(2)) {
                let mut wx = 0.0;
                let mut wy = 0.0;
                for w in weights {
                    let dx = deform.get(f).copied().unwrap_or(0.0);
                    let dy = deform.get(f + 1).copied().unwrap_or(0.0);
                    f += 2;
                    let Some(bone) = skeleton.bones.get(w.bone) else {
                        continue;
                    };
                    let [x, y] = bone.local_to_world(w.x + dx, w.y + dy);
                    wx += x * w.weight;
                    wy += y * w.weight;
                }
                dst[0] = wx;
                dst[1] = wy;
            }
        }
    }
}
