use crate::test_util::{DataBuilder, assert_slice_approx, region};
use crate::{
    AtlasPage, AtlasRegion, AttachmentData, MeshAttachmentData, MeshVertices, Skeleton,
    TextureRegion, VertexWeight,
};

fn mesh(vertices: MeshVertices, region_uvs: Vec<f32>) -> MeshAttachmentData {
    MeshAttachmentData {
        name: "mesh".to_string(),
        path: "mesh".to_string(),
        color: [1.0; 4],
        vertices,
        region_uvs,
        uvs: Vec::new(),
        triangles: vec![0, 1, 2],
        region: None,
    }
}

#[test]
fn region_corners_are_br_bl_ul_ur() {
    let mut attachment = region("head", 2.0, 2.0, 0);
    attachment.x = 1.0;
    attachment.y = 2.0;
    attachment.update_region(attachment.region.clone());

    assert_slice_approx(&attachment.offset, &[2.0, 1.0, 0.0, 1.0, 0.0, 3.0, 2.0, 3.0]);
    assert_slice_approx(&attachment.uvs, &[1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
}

#[test]
fn region_world_vertices_follow_bone_transform() {
    let data = DataBuilder::new()
        .slot("slot", Some(AttachmentData::Region(region("head", 2.0, 2.0, 0))))
        .build();
    let mut skeleton = Skeleton::new(data);
    // Rotate 90 degrees and translate.
    skeleton.bones[0].set_world_transform(0.0, -1.0, 1.0, 0.0, 10.0, 20.0);

    let Some(AttachmentData::Region(attachment)) = skeleton.slot_attachment_data(0) else {
        panic!("region attachment");
    };
    let mut out = [0.0; 8];
    attachment.compute_world_vertices(&skeleton.bones[0], &mut out);
    // BR (1, -1) -> (11, 21), BL (-1, -1) -> (11, 19), UL (-1, 1) -> (9, 19), UR (1, 1) -> (9, 21).
    assert_slice_approx(&out, &[11.0, 21.0, 11.0, 19.0, 9.0, 19.0, 9.0, 21.0]);
}

#[test]
fn rotated_atlas_region_swaps_uv_corners() {
    let page = AtlasPage {
        name: "page.png".to_string(),
        width: 100,
        height: 100,
        pma: false,
    };
    let atlas_region = AtlasRegion {
        name: "head".to_string(),
        page: 0,
        degrees: 90,
        x: 10,
        y: 20,
        width: 30,
        height: 40,
        offset_x: 0,
        offset_y: 0,
        original_width: 30,
        original_height: 40,
    };
    let texture = TextureRegion::from_atlas(&atlas_region, &page);
    assert_slice_approx(&[texture.u, texture.v, texture.u2, texture.v2], &[0.1, 0.2, 0.5, 0.5]);

    let mut attachment = region("head", 30.0, 40.0, 0);
    attachment.update_region(Some(texture));
    assert_slice_approx(&attachment.uvs, &[0.5, 0.2, 0.5, 0.5, 0.1, 0.5, 0.1, 0.2]);
}

#[test]
fn mesh_uvs_map_onto_page_region() {
    let mut attachment = mesh(
        MeshVertices::Unweighted(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
        vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
    );
    let mut texture = TextureRegion::whole_page(3, 50.0, 50.0);
    texture.page_width = 100.0;
    texture.page_height = 200.0;
    texture.u = 0.5;
    texture.v = 0.25;
    texture.u2 = 1.0;
    texture.v2 = 0.5;
    attachment.update_region(Some(texture));

    assert_slice_approx(&attachment.uvs, &[0.5, 0.25, 1.0, 0.25, 0.5, 0.5]);
}

#[test]
fn unweighted_mesh_uses_deform_as_absolute_positions() {
    let attachment = mesh(
        MeshVertices::Unweighted(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
        vec![0.0; 6],
    );
    let data = DataBuilder::new()
        .slot("slot", Some(AttachmentData::Mesh(attachment.clone())))
        .build();
    let mut skeleton = Skeleton::new(data);
    skeleton.bones[0].set_world_transform(2.0, 0.0, 0.0, 2.0, 1.0, 1.0);

    let mut out = Vec::new();
    attachment.compute_world_vertices(&skeleton, 0, &mut out);
    assert_slice_approx(&out, &[1.0, 1.0, 3.0, 1.0, 1.0, 3.0]);

    skeleton.slots[0].deform = vec![1.0, 1.0, 2.0, 1.0, 1.0, 2.0];
    attachment.compute_world_vertices(&skeleton, 0, &mut out);
    assert_slice_approx(&out, &[3.0, 3.0, 5.0, 3.0, 3.0, 5.0]);
}

#[test]
fn weighted_mesh_blends_bones_and_deform_offsets() {
    let weights = vec![
        vec![
            VertexWeight { bone: 0, x: 0.0, y: 0.0, weight: 0.5 },
            VertexWeight { bone: 1, x: 0.0, y: 0.0, weight: 0.5 },
        ],
        vec![VertexWeight { bone: 1, x: 1.0, y: 0.0, weight: 1.0 }],
    ];
    let attachment = mesh(MeshVertices::Weighted(weights), vec![0.0; 4]);
    let data = DataBuilder::new()
        .bone(crate::BoneData::new("child", Some(0)))
        .slot("slot", Some(AttachmentData::Mesh(attachment.clone())))
        .build();
    let mut skeleton = Skeleton::new(data);
    skeleton.bones[1].set_world_transform(1.0, 0.0, 0.0, 1.0, 10.0, 0.0);

    let mut out = Vec::new();
    attachment.compute_world_vertices(&skeleton, 0, &mut out);
    assert_slice_approx(&out, &[5.0, 0.0, 11.0, 0.0]);

    // One offset pair per weight.
    skeleton.slots[0].deform = vec![0.0, 2.0, 0.0, 2.0, 0.0, 1.0];
    attachment.compute_world_vertices(&skeleton, 0, &mut out);
    assert_slice_approx(&out, &[5.0, 2.0, 11.0, 1.0]);
}

#[test]
fn vertex_world_positions_only_for_vertex_attachments() {
    let data = DataBuilder::new()
        .slot("slot", Some(AttachmentData::Region(region("head", 2.0, 2.0, 0))))
        .build();
    let skeleton = Skeleton::new(data);
    let mut out = Vec::new();

    let quad = AttachmentData::Region(region("head", 2.0, 2.0, 0));
    assert!(!quad.compute_vertex_world_positions(&skeleton, 0, &mut out));

    let clip = crate::test_util::clipping("clip", &[[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]], None);
    assert!(clip.compute_vertex_world_positions(&skeleton, 0, &mut out));
    assert_slice_approx(&out, &[0.0, 0.0, 4.0, 0.0, 0.0, 4.0]);
}
