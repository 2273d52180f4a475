use crate::{
    AttachmentData, BlendMode, CommandAllocator, RenderCommand, Skeleton,
    clipping::SkeletonClipper,
};

/// Index pattern of a region attachment's two triangles over its BR, BL, UL, UR corners.
pub const QUAD_TRIANGLES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Packs a straight-alpha RGBA color as `0xAARRGGBB`, each channel clamped to `[0, 1]` and
/// rounded to 8 bits.
pub fn pack_color(color: [f32; 4]) -> u32 {
    let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
    (channel(color[3]) << 24) | (channel(color[0]) << 16) | (channel(color[1]) << 8) | channel(color[2])
}

fn multiply_rgba(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    [a[0] * b[0], a[1] * b[1], a[2] * b[2], a[3] * b[3]]
}

/// Turns a posed skeleton into a linked list of render commands.
///
/// The renderer owns the clip state and the world-vertex scratch buffer it reuses across frames.
/// It never holds on to the commands it returns; the caller disposes them through
/// [`SkeletonRenderer::allocator`] before the next frame.
#[derive(Debug, Default)]
pub struct SkeletonRenderer {
    clipper: SkeletonClipper,
    allocator: CommandAllocator,
    world_vertices: Vec<f32>,
}

impl SkeletonRenderer {
    pub fn new(allocator: CommandAllocator) -> Self {
        Self {
            clipper: SkeletonClipper::default(),
            allocator,
            world_vertices: Vec::new(),
        }
    }

    pub fn allocator(&self) -> &CommandAllocator {
        &self.allocator
    }

    pub fn clipper(&self) -> &SkeletonClipper {
        &self.clipper
    }

    /// Walks the draw order and emits one command per visible region or mesh attachment.
    ///
    /// Returns `None` when nothing was emitted. The clipper is idle when this returns.
    pub fn render(&mut self, skeleton: &Skeleton) -> Option<Box<RenderCommand>> {
        let mut head: Option<Box<RenderCommand>> = None;
        let mut tail = &mut head;

        'slots: for &slot_index in &skeleton.draw_order {
            'process_slot: {
                let Some(slot) = skeleton.slots.get(slot_index) else {
                    break 'process_slot;
                };
                let Some(attachment) = skeleton.slot_attachment_data(slot_index) else {
                    break 'process_slot;
                };
                let Some(bone) = skeleton.bones.get(slot.bone) else {
                    break 'process_slot;
                };
                if slot.color[3] <= 0.0 || !bone.active {
                    log::trace!("slot {slot_index} hidden (alpha or inactive bone)");
                    break 'process_slot;
                }

                let (uvs, triangles, attachment_color, page): (&[f32], &[u16], [f32; 4], usize) =
                    match attachment {
                        AttachmentData::Region(region) => {
                            let Some(texture) = &region.region else {
                                log::debug!("region attachment {} has no texture region", region.name);
                                break 'process_slot;
                            };
                            self.world_vertices.clear();
                            self.world_vertices.resize(8, 0.0);
                            region.compute_world_vertices(bone, &mut self.world_vertices);
                            (region.uvs.as_slice(), &QUAD_TRIANGLES[..], region.color, texture.page)
                        }
                        AttachmentData::Mesh(mesh) => {
                            let Some(texture) = &mesh.region else {
                                log::debug!("mesh attachment {} has no texture region", mesh.name);
                                break 'process_slot;
                            };
                            mesh.compute_world_vertices(skeleton, slot_index, &mut self.world_vertices);
                            (mesh.uvs.as_slice(), mesh.triangles.as_slice(), mesh.color, texture.page)
                        }
                        AttachmentData::Clipping(clip) => {
                            self.clipper.clip_start(skeleton, slot_index, clip);
                            continue 'slots;
                        }
                        other => {
                            log::trace!("slot {slot_index}: {} is not renderable", other.name());
                            break 'process_slot;
                        }
                    };

                if attachment_color[3] <= 0.0 {
                    break 'process_slot;
                }

                let color = pack_color(multiply_rgba(
                    multiply_rgba(skeleton.color, slot.color),
                    attachment_color,
                ));

                let command = if self.clipper.is_clipping() {
                    self.clipper
                        .clip_triangles(&self.world_vertices, triangles, uvs, 2);
                    build_command(
                        &self.allocator,
                        self.clipper.clipped_vertices(),
                        self.clipper.clipped_uvs(),
                        self.clipper.clipped_triangles(),
                        color,
                        slot.blend,
                        page,
                    )
                } else {
                    build_command(
                        &self.allocator,
                        &self.world_vertices,
                        uvs,
                        triangles,
                        color,
                        slot.blend,
                        page,
                    )
                };
                tail = &mut tail.insert(command).next;
            }

            self.clipper.clip_end_slot(slot_index);
        }

        self.clipper.clip_end();
        head
    }
}

fn build_command(
    allocator: &CommandAllocator,
    positions: &[f32],
    uvs: &[f32],
    indices: &[u16],
    color: u32,
    blend_mode: BlendMode,
    atlas_page: usize,
) -> Box<RenderCommand> {
    let vertex_count = positions.len() / 2;
    let mut command = allocator.create(vertex_count, indices.len(), blend_mode, atlas_page);
    command.positions_mut().copy_from_slice(&positions[..vertex_count * 2]);
    for (dst, src) in command.uvs_mut().iter_mut().zip(uvs) {
        *dst = *src;
    }
    command.colors_mut().fill(color);
    command.indices_mut().copy_from_slice(indices);
    command
}
