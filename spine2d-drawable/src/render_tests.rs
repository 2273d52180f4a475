use crate::test_util::{DataBuilder, assert_approx, assert_slice_approx, clipping, region};
use crate::{
    AllocationCounter, AttachmentData, BlendMode, BoneData, CommandAllocator, MAX_BATCH_VERTICES,
    MeshAttachmentData, MeshVertices, PointAttachmentData, QUAD_TRIANGLES, RenderCommand, Skeleton,
    SkeletonRenderer, SlotData, TextureRegion, pack_color,
};
use std::sync::Arc;

fn quad(name: &str, page: usize) -> Option<AttachmentData> {
    Some(AttachmentData::Region(region(name, 2.0, 2.0, page)))
}

fn commands(head: &Option<Box<RenderCommand>>) -> Vec<&RenderCommand> {
    head.as_deref().map(|h| h.iter().collect()).unwrap_or_default()
}

#[test]
fn single_region_emits_one_quad_command() {
    let data = DataBuilder::new().slot("slot", quad("head", 3)).build();
    let skeleton = Skeleton::new(data);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let list = commands(&head);
    assert_eq!(list.len(), 1);
    let command = list[0];
    assert_eq!(command.vertex_count(), 4);
    assert_eq!(command.index_count(), 6);
    assert_eq!(command.indices(), &QUAD_TRIANGLES);
    assert_eq!(command.atlas_page(), 3);
    assert_eq!(command.blend_mode(), BlendMode::Normal);
    assert_slice_approx(command.positions(), &[1.0, -1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);
    assert_slice_approx(command.uvs(), &[1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    assert_eq!(command.colors(), &[0xFFFF_FFFF; 4]);

    renderer.allocator().dispose_list(head);
}

#[test]
fn tints_multiply_and_round_into_packed_color() {
    let mut attachment = region("head", 2.0, 2.0, 0);
    attachment.color = [0.5, 0.4, 0.3, 1.0];
    let data = DataBuilder::new()
        .slot("slot", Some(AttachmentData::Region(attachment)))
        .build();
    let skeleton = Skeleton::new(data);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let command = head.as_deref().expect("command");
    let expected = pack_color([0.5, 0.4, 0.3, 1.0]);
    assert_eq!(expected, 0xFF80_664D);
    assert_eq!(expected >> 16 & 0xFF, 128);
    assert_eq!(expected >> 8 & 0xFF, 102);
    assert_eq!(expected & 0xFF, 77);
    assert!(command.colors().iter().all(|&c| c == expected));

    renderer.allocator().dispose_list(head);
}

#[test]
fn pack_color_clamps_channels() {
    assert_eq!(pack_color([2.0, -1.0, 0.0, 1.0]), 0xFFFF_0000);
    assert_eq!(pack_color([0.0, 0.0, 0.0, 0.0]), 0);
}

#[test]
fn skeleton_and_slot_tints_are_applied() {
    let mut slot = SlotData::new("slot", 0);
    slot.color = [1.0, 0.5, 1.0, 1.0];
    slot.blend = BlendMode::Additive;
    let data = DataBuilder::new().slot_with(slot, quad("head", 0)).build();
    let mut skeleton = Skeleton::new(data);
    skeleton.color = [0.5, 1.0, 1.0, 1.0];
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let command = head.as_deref().expect("command");
    assert_eq!(command.colors()[0], pack_color([0.5, 0.5, 1.0, 1.0]));
    assert_eq!(command.blend_mode(), BlendMode::Additive);
    renderer.allocator().dispose_list(head);
}

#[test]
fn hidden_slots_emit_nothing_but_still_close_clips() {
    let mut hidden_slot = SlotData::new("hidden", 0);
    hidden_slot.color[3] = 0.0;
    let mut hidden_attachment = region("transparent", 2.0, 2.0, 0);
    hidden_attachment.color[3] = 0.0;

    let clip = clipping("clip", &[[0.0, -5.0], [5.0, -5.0], [5.0, 5.0], [0.0, 5.0]], Some(2));
    let data = DataBuilder::new()
        .slot("clip", Some(clip))
        .slot_with(hidden_slot, quad("head", 0))
        .slot("transparent", Some(AttachmentData::Region(hidden_attachment)))
        .slot("visible", quad("body", 1))
        .build();
    let skeleton = Skeleton::new(data);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let list = commands(&head);
    assert_eq!(list.len(), 1);
    // The clip closed at slot 2, so the last slot is drawn unclipped.
    assert_eq!(list[0].atlas_page(), 1);
    assert_eq!(list[0].vertex_count(), 4);
    assert_eq!(list[0].index_count(), 6);
    assert!(!renderer.clipper().is_clipping());

    renderer.allocator().dispose_list(head);
}

#[test]
fn zero_area_clip_yields_empty_command() {
    let clip = clipping("clip", &[[0.0, 0.0], [0.0, 0.0], [0.0, 0.0]], None);
    let data = DataBuilder::new()
        .slot("clip", Some(clip))
        .slot("head", quad("head", 2))
        .build();
    let skeleton = Skeleton::new(data);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let list = commands(&head);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].index_count(), 0);
    assert_eq!(list[0].vertex_count(), 0);
    assert_eq!(list[0].atlas_page(), 2);
    assert!(!renderer.clipper().is_clipping());

    renderer.allocator().dispose_list(head);
}

#[test]
fn clipped_region_keeps_uvs_consistent_with_positions() {
    let clip = clipping("clip", &[[0.0, -5.0], [5.0, -5.0], [5.0, 5.0], [0.0, 5.0]], None);
    let data = DataBuilder::new()
        .slot("clip", Some(clip))
        .slot("head", quad("head", 0))
        .build();
    let skeleton = Skeleton::new(data);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let command = head.as_deref().expect("command");
    assert!(command.index_count() > 0);
    assert_eq!(command.index_count() % 3, 0);
    assert!(command.indices().iter().all(|&i| (i as usize) < command.vertex_count()));
    for (xy, uv) in command.positions().chunks_exact(2).zip(command.uvs().chunks_exact(2)) {
        assert!(xy[0] >= -1.0e-4, "clipped x {} left of the clip", xy[0]);
        // Region spans x in [-1, 1] with u = (x + 1) / 2 and y in [-1, 1] with v = (1 - y) / 2.
        assert_approx(uv[0], (xy[0] + 1.0) * 0.5);
        assert_approx(uv[1], (1.0 - xy[1]) * 0.5);
    }
    assert!(!renderer.clipper().is_clipping());

    renderer.allocator().dispose_list(head);
}

#[test]
fn commands_follow_draw_order() {
    let data = DataBuilder::new()
        .slot("a", quad("a", 0))
        .slot("b", quad("b", 1))
        .slot("c", quad("c", 2))
        .build();
    let mut skeleton = Skeleton::new(data);
    skeleton.draw_order = vec![2, 0, 1];
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let pages = commands(&head)
        .iter()
        .map(|c| c.atlas_page())
        .collect::<Vec<_>>();
    assert_eq!(pages, vec![2, 0, 1]);
    renderer.allocator().dispose_list(head);
}

#[test]
fn unrenderable_and_unbound_attachments_are_skipped() {
    let point = AttachmentData::Point(PointAttachmentData {
        name: "point".to_string(),
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
    });
    let mut unbound = region("unbound", 2.0, 2.0, 0);
    unbound.region = None;
    let mut skin_bone = BoneData::new("skin-only", Some(0));
    skin_bone.skin_required = true;
    let data = DataBuilder::new()
        .bone(skin_bone)
        .slot("point", Some(point))
        .slot("unbound", Some(AttachmentData::Region(unbound)))
        .slot("empty", None)
        .slot_with(SlotData::new("inactive", 1), quad("head", 0))
        .build();
    let skeleton = Skeleton::new(data);
    assert!(!skeleton.bones[1].active);
    let mut renderer = SkeletonRenderer::default();

    assert!(renderer.render(&skeleton).is_none());
    assert!(!renderer.clipper().is_clipping());
}

#[test]
fn mesh_attachment_emits_its_triangles() {
    let mut mesh = MeshAttachmentData {
        name: "mesh".to_string(),
        path: "mesh".to_string(),
        color: [1.0; 4],
        vertices: MeshVertices::Unweighted(vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]),
        region_uvs: vec![0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0],
        uvs: Vec::new(),
        triangles: vec![0, 1, 2, 2, 3, 0],
        region: None,
    };
    mesh.update_region(Some(TextureRegion::whole_page(4, 4.0, 4.0)));
    let data = DataBuilder::new()
        .slot("mesh", Some(AttachmentData::Mesh(mesh)))
        .build();
    let mut skeleton = Skeleton::new(data);
    skeleton.bones[0].set_world_transform(1.0, 0.0, 0.0, 1.0, 10.0, 0.0);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let command = head.as_deref().expect("command");
    assert_eq!(command.vertex_count(), 4);
    assert_eq!(command.indices(), &[0, 1, 2, 2, 3, 0]);
    assert_eq!(command.atlas_page(), 4);
    assert_slice_approx(command.positions(), &[10.0, 0.0, 14.0, 0.0, 14.0, 4.0, 10.0, 4.0]);
    assert_slice_approx(command.uvs(), &[0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    renderer.allocator().dispose_list(head);
}

#[test]
fn clipper_is_idle_after_render_with_unterminated_clip() {
    let clip = clipping("clip", &[[-5.0, -5.0], [5.0, -5.0], [5.0, 5.0], [-5.0, 5.0]], Some(7));
    let data = DataBuilder::new()
        .slot("clip", Some(clip))
        .slot("head", quad("head", 0))
        .build();
    let skeleton = Skeleton::new(data);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    assert!(head.is_some());
    assert!(!renderer.clipper().is_clipping());
    renderer.allocator().dispose_list(head);
}

#[test]
fn rendering_frames_balances_allocations() {
    let counter = Arc::new(AllocationCounter::new());
    let mut renderer = SkeletonRenderer::new(CommandAllocator::with_observer(counter.clone()));
    let data = DataBuilder::new()
        .slot("a", quad("a", 0))
        .slot("b", quad("b", 1))
        .build();
    let skeleton = Skeleton::new(data);

    for _ in 0..3 {
        let head = renderer.render(&skeleton);
        assert_eq!(counter.live_commands(), 2);
        renderer.allocator().dispose_list(head);
        assert_eq!(counter.live_commands(), 0);
    }
    assert_eq!(counter.total_commands(), 6);
    assert!(counter.report_leaks().is_none());
}

fn half_plane_clip(end_slot: Option<usize>) -> AttachmentData {
    clipping("clip", &[[0.0, -5.0], [5.0, -5.0], [5.0, 5.0], [0.0, 5.0]], end_slot)
}

fn assert_unclipped_quad(command: &RenderCommand) {
    assert_eq!(command.vertex_count(), 4);
    assert_eq!(command.indices(), &QUAD_TRIANGLES);
    assert_slice_approx(command.positions(), &[1.0, -1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn clip_closes_at_empty_end_slot() {
    let data = DataBuilder::new()
        .slot("clip", Some(half_plane_clip(Some(1))))
        .slot("empty", None)
        .slot("head", quad("head", 0))
        .build();
    let skeleton = Skeleton::new(data);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let list = commands(&head);
    assert_eq!(list.len(), 1);
    assert_unclipped_quad(list[0]);
    renderer.allocator().dispose_list(head);
}

#[test]
fn clip_closes_at_end_slot_holding_a_point() {
    let point = AttachmentData::Point(PointAttachmentData {
        name: "point".to_string(),
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
    });
    let data = DataBuilder::new()
        .slot("clip", Some(half_plane_clip(Some(1))))
        .slot("point", Some(point))
        .slot("head", quad("head", 0))
        .build();
    let skeleton = Skeleton::new(data);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let list = commands(&head);
    assert_eq!(list.len(), 1);
    assert_unclipped_quad(list[0]);
    renderer.allocator().dispose_list(head);
}

#[test]
fn clip_ending_at_its_own_slot_stays_open() {
    let data = DataBuilder::new()
        .slot("clip", Some(half_plane_clip(Some(0))))
        .slot("head", quad("head", 0))
        .build();
    let skeleton = Skeleton::new(data);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let command = head.as_deref().expect("command");
    assert!(command.index_count() > 0);
    assert_ne!(command.vertex_count(), 4);
    assert!(command.positions().chunks_exact(2).all(|xy| xy[0] >= -1.0e-4));
    assert!(!renderer.clipper().is_clipping());
    renderer.allocator().dispose_list(head);
}

#[test]
fn clipped_mesh_past_index_limit_renders_without_overflow() {
    let side = 120u16;
    let mut points = Vec::new();
    let mut region_uvs = Vec::new();
    for y in 0..side {
        for x in 0..side {
            points.push([f32::from(x), f32::from(y)]);
            region_uvs.extend_from_slice(&[f32::from(x) / 119.0, f32::from(y) / 119.0]);
        }
    }
    let mut triangles = Vec::new();
    for y in 0..side - 1 {
        for x in 0..side - 1 {
            let i = y * side + x;
            triangles.extend_from_slice(&[i, i + 1, i + side + 1, i + side + 1, i + side, i]);
        }
    }
    let mut mesh = MeshAttachmentData {
        name: "grid".to_string(),
        path: "grid".to_string(),
        color: [1.0; 4],
        vertices: MeshVertices::Unweighted(points),
        region_uvs,
        uvs: Vec::new(),
        triangles,
        region: None,
    };
    mesh.update_region(Some(TextureRegion::whole_page(0, 256.0, 256.0)));

    let clip = clipping(
        "clip",
        &[[-1000.0, -1000.0], [1000.0, -1000.0], [1000.0, 1000.0], [-1000.0, 1000.0]],
        None,
    );
    let data = DataBuilder::new()
        .slot("clip", Some(clip))
        .slot("grid", Some(AttachmentData::Mesh(mesh)))
        .build();
    let skeleton = Skeleton::new(data);
    let mut renderer = SkeletonRenderer::default();

    let head = renderer.render(&skeleton);
    let command = head.as_deref().expect("command");
    assert!(command.vertex_count() <= MAX_BATCH_VERTICES);
    assert_eq!(command.index_count() % 3, 0);
    assert!(
        command
            .indices()
            .iter()
            .all(|&i| usize::from(i) < command.vertex_count())
    );
    renderer.allocator().dispose_list(head);
}
