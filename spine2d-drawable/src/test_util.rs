//! Fixtures shared by the unit tests.

use crate::{
    Animation, AttachmentData, BoneData, ClippingAttachmentData, MeshVertices,
    RegionAttachmentData, SkeletonData, SkinData, SlotData, TextureRegion,
};
use std::sync::Arc;

/// Builds skeleton data with a `root` bone and a `default` skin.
pub(crate) struct DataBuilder {
    data: SkeletonData,
    skin: SkinData,
}

impl DataBuilder {
    pub(crate) fn new() -> Self {
        Self {
            data: SkeletonData {
                bones: vec![BoneData::new("root", None)],
                ..SkeletonData::default()
            },
            skin: SkinData::new("default"),
        }
    }

    pub(crate) fn bone(mut self, bone: BoneData) -> Self {
        self.data.bones.push(bone);
        self
    }

    /// Adds a slot on the root bone whose setup attachment is `attachment`.
    pub(crate) fn slot(self, name: &str, attachment: Option<AttachmentData>) -> Self {
        self.slot_with(SlotData::new(name, 0), attachment)
    }

    pub(crate) fn slot_with(mut self, mut slot: SlotData, attachment: Option<AttachmentData>) -> Self {
        let slot_index = self.data.slots.len();
        if let Some(attachment) = attachment {
            slot.attachment = Some(attachment.name().to_string());
            self.skin.set_attachment(slot_index, attachment);
        }
        self.data.slots.push(slot);
        self
    }

    pub(crate) fn skin(mut self, skin: SkinData) -> Self {
        self.data.skins.push(skin);
        self
    }

    pub(crate) fn animation(mut self, animation: Animation) -> Self {
        self.data.animations.push(Arc::new(animation));
        self
    }

    pub(crate) fn build(mut self) -> Arc<SkeletonData> {
        self.data.skins.insert(0, self.skin);
        Arc::new(self.data)
    }
}

/// A `width` x `height` region centered on its bone, bound to a whole atlas page.
pub(crate) fn region(name: &str, width: f32, height: f32, page: usize) -> RegionAttachmentData {
    let mut region = RegionAttachmentData::new(name, width, height);
    region.update_region(Some(TextureRegion::whole_page(page, width, height)));
    region
}

pub(crate) fn clipping(name: &str, points: &[[f32; 2]], end_slot: Option<usize>) -> AttachmentData {
    AttachmentData::Clipping(ClippingAttachmentData {
        name: name.to_string(),
        vertices: MeshVertices::Unweighted(points.to_vec()),
        end_slot,
    })
}

pub(crate) fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

pub(crate) fn assert_slice_approx(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().copied().zip(expected.iter().copied()) {
        assert_approx(a, e);
    }
}
