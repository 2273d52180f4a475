//! Builds a small clipped skeleton in code, advances it and prints each frame's render commands
//! as JSON.

use spine2d_drawable::{
    Animation, AttachmentData, BoneData, ClippingAttachmentData, DrawableConfig, MeshVertices,
    RegionAttachmentData, SkeletonData, SkeletonDrawable, SkinData, SlotData, TextureRegion,
    render_commands_to_json,
};
use std::{env, sync::Arc};

fn usage() -> ! {
    eprintln!("Usage:\n  render_dump [--frames <count>] [--delta <seconds>]\n");
    std::process::exit(2);
}

fn skeleton_data() -> Arc<SkeletonData> {
    let mut skin = SkinData::new("default");

    skin.set_attachment(
        0,
        AttachmentData::Clipping(ClippingAttachmentData {
            name: "window".to_string(),
            vertices: MeshVertices::Unweighted(vec![[0.0, -50.0], [50.0, -50.0], [50.0, 50.0], [0.0, 50.0]]),
            end_slot: Some(1),
        }),
    );

    let mut body = RegionAttachmentData::new("body", 64.0, 64.0);
    body.update_region(Some(TextureRegion::whole_page(0, 64.0, 64.0)));
    skin.set_attachment(1, AttachmentData::Region(body));

    let mut head = RegionAttachmentData::new("head", 32.0, 32.0);
    head.y = 48.0;
    head.color = [1.0, 0.8, 0.6, 1.0];
    head.update_region(Some(TextureRegion::whole_page(1, 32.0, 32.0)));
    skin.set_attachment(2, AttachmentData::Region(head));

    let slot = |name: &str, attachment: &str| {
        let mut slot = SlotData::new(name, 0);
        slot.attachment = Some(attachment.to_string());
        slot
    };

    Arc::new(SkeletonData {
        name: Some("render_dump".to_string()),
        bones: vec![BoneData::new("root", None)],
        slots: vec![slot("clip", "window"), slot("body", "body"), slot("head", "head")],
        skins: vec![skin],
        events: Vec::new(),
        animations: vec![Arc::new(Animation::new("idle", 1.0))],
    })
}

fn main() {
    let mut frames = 1usize;
    let mut delta = 1.0f32 / 60.0;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--frames" => {
                frames = args.next().and_then(|v| v.parse().ok()).unwrap_or_else(|| usage());
            }
            "--delta" => {
                delta = args.next().and_then(|v| v.parse().ok()).unwrap_or_else(|| usage());
            }
            _ => usage(),
        }
    }

    let mut drawable = SkeletonDrawable::new(skeleton_data(), DrawableConfig::default());
    if let Err(e) = drawable.animation_state_mut().set_animation(0, "idle", true) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    let mut dumps = Vec::with_capacity(frames);
    for _ in 0..frames {
        drawable.update(delta);
        let events = drawable.events().count();
        drawable.flush_events();
        let mut dump = render_commands_to_json(drawable.render());
        dump["events"] = events.into();
        dumps.push(dump);
    }

    match serde_json::to_string_pretty(&dumps) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("failed to encode render dump: {e}");
            std::process::exit(1);
        }
    }
}
