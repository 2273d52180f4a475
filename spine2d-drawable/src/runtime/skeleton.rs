use crate::{AttachmentData, BlendMode, Error, SkeletonData};
use std::sync::Arc;

/// A bone of a posed skeleton.
///
/// World transforms are written by the animation/constraint solver that poses the skeleton; the
/// renderer only reads `a, b, c, d, world_x, world_y`.
#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,

    pub active: bool,

    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

impl Bone {
    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn set_world_transform(&mut self, a: f32, b: f32, c: f32, d: f32, x: f32, y: f32) {
        self.a = a;
        self.b = b;
        self.c = c;
        self.d = d;
        self.world_x = x;
        self.world_y = y;
    }

    /// Transforms a bone-local point into world space.
    pub fn local_to_world(&self, x: f32, y: f32) -> [f32; 2] {
        [
            self.a * x + self.b * y + self.world_x,
            self.c * x + self.d * y + self.world_y,
        ]
    }
}

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    pub bone: usize,
    pub attachment: Option<String>,
    /// Per-vertex offsets for the current vertex attachment. Empty when not deformed.
    pub deform: Vec<f32>,
    pub color: [f32; 4],
    pub blend: BlendMode,
}

impl Slot {
    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    pub slots: Vec<Slot>,
    /// Slot indices in back-to-front drawing order.
    pub draw_order: Vec<usize>,
    pub skin: Option<String>,
    pub color: [f32; 4],
}

impl Skeleton {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        let bones = data
            .bones
            .iter()
            .enumerate()
            .map(|(data_index, bone)| Bone {
                data_index,
                parent: bone.parent,
                active: !bone.skin_required,
                a: 1.0,
                b: 0.0,
                c: 0.0,
                d: 1.0,
                world_x: 0.0,
                world_y: 0.0,
            })
            .collect::<Vec<_>>();

        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(data_index, slot)| Slot {
                data_index,
                bone: slot.bone,
                attachment: slot.attachment.clone(),
                deform: Vec::new(),
                color: slot.color,
                blend: slot.blend,
            })
            .collect::<Vec<_>>();

        let draw_order = (0..slots.len()).collect::<Vec<_>>();

        let mut skeleton = Self {
            data,
            bones,
            slots,
            draw_order,
            skin: None,
            color: [1.0, 1.0, 1.0, 1.0],
        };
        skeleton.update_bone_activity();
        skeleton
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.data.slot(name).map(|(index, _)| index)
    }

    /// Resolves an attachment through the active skin, falling back to the default skin.
    pub fn attachment(&self, slot_index: usize, attachment_name: &str) -> Option<&AttachmentData> {
        if let Some(skin) = self.skin.as_deref().and_then(|name| self.data.skin(name)) {
            if let Some(attachment) = skin.attachment(slot_index, attachment_name) {
                return Some(attachment);
            }
        }
        self.data
            .default_skin()
            .and_then(|skin| skin.attachment(slot_index, attachment_name))
    }

    pub fn slot_attachment_data(&self, slot_index: usize) -> Option<&AttachmentData> {
        let slot = self.slots.get(slot_index)?;
        let name = slot.attachment.as_deref()?;
        self.attachment(slot_index, name)
    }

    pub fn set_attachment(
        &mut self,
        slot_name: &str,
        attachment_name: Option<&str>,
    ) -> Result<(), Error> {
        let slot_index = self.find_slot(slot_name).ok_or_else(|| Error::UnknownSlot {
            name: slot_name.to_string(),
        })?;
        if let Some(name) = attachment_name {
            if self.attachment(slot_index, name).is_none() {
                return Err(Error::UnknownAttachment {
                    slot: slot_name.to_string(),
                    name: name.to_string(),
                });
            }
        }
        let slot = &mut self.slots[slot_index];
        let changed = slot.attachment.as_deref() != attachment_name;
        slot.attachment = attachment_name.map(str::to_string);
        if changed {
            slot.deform.clear();
        }
        Ok(())
    }

    /// Switches skins and recomputes which skin-required bones are active.
    ///
    /// Slots keep their current attachment names; they resolve through the new skin on the next
    /// lookup.
    pub fn set_skin(&mut self, skin_name: Option<&str>) -> Result<(), Error> {
        if let Some(name) = skin_name {
            if self.data.skin(name).is_none() {
                return Err(Error::UnknownSkin {
                    name: name.to_string(),
                });
            }
        }
        self.skin = skin_name.map(str::to_string);
        self.update_bone_activity();
        Ok(())
    }

    fn update_bone_activity(&mut self) {
        let skin_bones = self
            .skin
            .as_deref()
            .and_then(|name| self.data.skin(name))
            .map(|skin| skin.bones.as_slice())
            .unwrap_or(&[]);
        for (index, bone) in self.bones.iter_mut().enumerate() {
            let required = self
                .data
                .bones
                .get(index)
                .is_some_and(|data| data.skin_required);
            bone.active = !required || skin_bones.contains(&index);
        }
        // A bone is only active if its whole parent chain is.
        for index in 0..self.bones.len() {
            if let Some(parent) = self.bones[index].parent {
                if parent < index && !self.bones[parent].active {
                    self.bones[index].active = false;
                }
            }
        }
    }

    /// Restores slot colors, blend modes, setup attachments and the setup draw order.
    pub fn set_slots_to_setup_pose(&mut self) {
        self.draw_order = (0..self.slots.len()).collect();
        for (slot, data) in self.slots.iter_mut().zip(&self.data.slots) {
            slot.color = data.color;
            slot.blend = data.blend;
            slot.attachment = data.attachment.clone();
            slot.deform.clear();
        }
    }
}
