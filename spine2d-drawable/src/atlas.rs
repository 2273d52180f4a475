//! Atlas page and region records.
//!
//! Atlas text parsing belongs to the loader that produced the skeleton; this module only keeps
//! the resolved records and converts a region into the normalized [`TextureRegion`] that region
//! and mesh attachments bind to.

use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct Atlas {
    pub pages: Vec<AtlasPage>,
    pub regions: HashMap<String, AtlasRegion>,
}

impl Atlas {
    pub fn region(&self, name: &str) -> Option<&AtlasRegion> {
        self.regions.get(name)
    }

    pub fn page(&self, index: usize) -> Option<&AtlasPage> {
        self.pages.get(index)
    }

    /// Resolves `name` to a texture region normalized against its page.
    pub fn texture_region(&self, name: &str) -> Option<TextureRegion> {
        let region = self.region(name)?;
        let page = self.page(region.page)?;
        Some(TextureRegion::from_atlas(region, page))
    }
}

#[derive(Clone, Debug)]
pub struct AtlasPage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pma: bool,
}

#[derive(Clone, Debug)]
pub struct AtlasRegion {
    pub name: String,
    pub page: usize,
    pub degrees: u16,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub original_width: u32,
    pub original_height: u32,
}

/// Region of an atlas page in normalized texture coordinates, plus the packing metadata needed to
/// place whitespace-stripped regions.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureRegion {
    /// Index of the atlas page backing this region. Copied into every render command.
    pub page: usize,
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    pub degrees: u16,
    pub offset_x: f32,
    pub offset_y: f32,
    pub width: f32,
    pub height: f32,
    pub original_width: f32,
    pub original_height: f32,
    pub page_width: f32,
    pub page_height: f32,
}

impl TextureRegion {
    pub fn from_atlas(region: &AtlasRegion, page: &AtlasPage) -> Self {
        let w = page.width.max(1) as f32;
        let h = page.height.max(1) as f32;
        let (u2, v2) = if region.degrees == 90 {
            (
                (region.x + region.height) as f32 / w,
                (region.y + region.width) as f32 / h,
            )
        } else {
            (
                (region.x + region.width) as f32 / w,
                (region.y + region.height) as f32 / h,
            )
        };
        Self {
            page: region.page,
            u: region.x as f32 / w,
            v: region.y as f32 / h,
            u2,
            v2,
            degrees: region.degrees,
            offset_x: region.offset_x as f32,
            offset_y: region.offset_y as f32,
            width: region.width as f32,
            height: region.height as f32,
            original_width: region.original_width.max(1) as f32,
            original_height: region.original_height.max(1) as f32,
            page_width: w,
            page_height: h,
        }
    }

    /// A region covering a whole page with no whitespace stripping.
    pub fn whole_page(page: usize, width: f32, height: f32) -> Self {
        Self {
            page,
            u: 0.0,
            v: 0.0,
            u2: 1.0,
            v2: 1.0,
            degrees: 0,
            offset_x: 0.0,
            offset_y: 0.0,
            width,
            height,
            original_width: width,
            original_height: height,
            page_width: width,
            page_height: height,
        }
    }
}
