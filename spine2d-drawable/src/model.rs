use crate::TextureRegion;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
    pub skin_required: bool,
}

impl BoneData {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            skin_required: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    /// Setup-pose attachment name, resolved through the skeleton's skins.
    pub attachment: Option<String>,
    pub color: [f32; 4],
    pub blend: BlendMode,
}

impl SlotData {
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            bone,
            attachment: None,
            color: [1.0, 1.0, 1.0, 1.0],
            blend: BlendMode::Normal,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

impl BlendMode {
    /// Stable numeric code used when commands cross a host boundary.
    pub fn code(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::Additive => 1,
            Self::Multiply => 2,
            Self::Screen => 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VertexWeight {
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

#[derive(Clone, Debug)]
pub enum MeshVertices {
    Unweighted(Vec<[f32; 2]>),
    Weighted(Vec<Vec<VertexWeight>>),
}

impl MeshVertices {
    pub fn vertex_count(&self) -> usize {
        match self {
            MeshVertices::Unweighted(v) => v.len(),
            MeshVertices::Weighted(v) => v.len(),
        }
    }

    /// Length of the flat `x, y` world vertex buffer these vertices produce.
    pub fn world_vertices_length(&self) -> usize {
        self.vertex_count() * 2
    }
}

#[derive(Clone, Debug)]
pub struct RegionAttachmentData {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
    pub region: Option<TextureRegion>,
    /// Bone-local corner positions in BR, BL, UL, UR order. Filled by `update_region`.
    pub offset: [f32; 8],
    /// Page UVs in the same corner order as `offset`. Filled by `update_region`.
    pub uvs: [f32; 8],
}

impl RegionAttachmentData {
    pub fn new(name: impl Into<String>, width: f32, height: f32) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
            color: [1.0, 1.0, 1.0, 1.0],
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width,
            height,
            region: None,
            offset: [0.0; 8],
            uvs: [0.0; 8],
        }
    }
}

#[derive(Clone, Debug)]
pub struct MeshAttachmentData {
    pub name: String,
    pub path: String,
    pub color: [f32; 4],
    pub vertices: MeshVertices,
    /// Flat `u, v` pairs relative to the region, one pair per vertex.
    pub region_uvs: Vec<f32>,
    /// Flat page UVs. Filled by `update_region`.
    pub uvs: Vec<f32>,
    pub triangles: Vec<u16>,
    pub region: Option<TextureRegion>,
}

#[derive(Clone, Debug)]
pub struct PointAttachmentData {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

#[derive(Clone, Debug)]
pub struct PathAttachmentData {
    pub name: String,
    pub color: [f32; 4],
    pub vertices: MeshVertices,
    pub lengths: Vec<f32>,
    pub closed: bool,
    pub constant_speed: bool,
}

#[derive(Clone, Debug)]
pub struct BoundingBoxAttachmentData {
    pub name: String,
    pub color: [f32; 4],
    pub vertices: MeshVertices,
}

#[derive(Clone, Debug)]
pub struct ClippingAttachmentData {
    pub name: String,
    pub vertices: MeshVertices,
    /// Slot at which the clip region closes. `None` keeps it open until the end of the frame.
    pub end_slot: Option<usize>,
}

/// Closed set of attachment kinds. Only region and mesh attachments produce geometry; clipping
/// attachments open clip regions and everything else is skipped by the renderer.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum AttachmentData {
    Region(RegionAttachmentData),
    Mesh(MeshAttachmentData),
    Clipping(ClippingAttachmentData),
    BoundingBox(BoundingBoxAttachmentData),
    Path(PathAttachmentData),
    Point(PointAttachmentData),
}

impl AttachmentData {
    pub fn name(&self) -> &str {
        match self {
            AttachmentData::Region(a) => a.name.as_str(),
            AttachmentData::Mesh(a) => a.name.as_str(),
            AttachmentData::Clipping(a) => a.name.as_str(),
            AttachmentData::BoundingBox(a) => a.name.as_str(),
            AttachmentData::Path(a) => a.name.as_str(),
            AttachmentData::Point(a) => a.name.as_str(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SkinData {
    pub name: String,
    /// Per slot index: attachment name -> attachment.
    pub attachments: Vec<HashMap<String, AttachmentData>>,
    /// Skin-required bones this skin activates.
    pub bones: Vec<usize>,
}

impl SkinData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attachments: Vec::new(),
            bones: Vec::new(),
        }
    }

    pub fn attachment(&self, slot_index: usize, attachment_name: &str) -> Option<&AttachmentData> {
        self.attachments
            .get(slot_index)
            .and_then(|slot_map| slot_map.get(attachment_name))
    }

    pub fn set_attachment(&mut self, slot_index: usize, attachment: AttachmentData) {
        if self.attachments.len() <= slot_index {
            self.attachments.resize_with(slot_index + 1, HashMap::new);
        }
        self.attachments[slot_index].insert(attachment.name().to_string(), attachment);
    }
}

#[derive(Clone, Debug)]
pub struct EventData {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
    pub audio_path: String,
    pub volume: f32,
    pub balance: f32,
}

/// One keyed firing of a user event on an animation's event timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub time: f32,
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string: String,
    pub audio_path: String,
    pub volume: f32,
    pub balance: f32,
}

impl Event {
    pub fn new(time: f32, data: &EventData) -> Self {
        Self {
            time,
            name: data.name.clone(),
            int_value: data.int_value,
            float_value: data.float_value,
            string: data.string.clone(),
            audio_path: data.audio_path.clone(),
            volume: data.volume,
            balance: data.balance,
        }
    }
}

/// Immutable animation definition. Timeline curves are applied by an external
/// [`crate::AnimationApplier`]; only the event timeline is evaluated here.
#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub duration: f32,
    /// Event timeline, sorted by time.
    pub events: Vec<Event>,
}

impl Animation {
    pub fn new(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            events: Vec::new(),
        }
    }

    pub(crate) fn empty() -> Self {
        Self::new("<empty>", 0.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SkeletonData {
    pub name: Option<String>,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub skins: Vec<SkinData>,
    pub events: Vec<EventData>,
    pub animations: Vec<Arc<Animation>>,
}

impl SkeletonData {
    pub fn bone(&self, name: &str) -> Option<(usize, &BoneData)> {
        self.bones.iter().enumerate().find(|(_, b)| b.name == name)
    }

    pub fn slot(&self, name: &str) -> Option<(usize, &SlotData)> {
        self.slots.iter().enumerate().find(|(_, s)| s.name == name)
    }

    pub fn skin(&self, name: &str) -> Option<&SkinData> {
        self.skins.iter().find(|s| s.name == name)
    }

    pub fn default_skin(&self) -> Option<&SkinData> {
        self.skin("default")
    }

    pub fn animation(&self, name: &str) -> Option<(usize, &Arc<Animation>)> {
        self.animations
            .iter()
            .enumerate()
            .find(|(_, a)| a.name == name)
    }
}
