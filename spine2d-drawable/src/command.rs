//! Render command buffers and their allocator.
//!
//! A frame's output is a singly linked list of [`RenderCommand`]s. Commands are created and
//! disposed through a [`CommandAllocator`], which reports every array it hands out to an optional
//! [`AllocationObserver`]. [`AllocationCounter`] is the stock observer used to detect leaks.

use crate::BlendMode;
use byteorder::{LittleEndian, WriteBytesExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One draw batch: flat-tinted, indexed triangles sharing a blend mode and an atlas page.
#[derive(Debug, PartialEq)]
pub struct RenderCommand {
    positions: Vec<f32>,
    uvs: Vec<f32>,
    colors: Vec<u32>,
    indices: Vec<u16>,
    blend_mode: BlendMode,
    atlas_page: usize,
    pub(crate) next: Option<Box<RenderCommand>>,
}

impl RenderCommand {
    pub fn vertex_count(&self) -> usize {
        self.colors.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// `x, y` pairs, `2 * vertex_count` floats.
    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    /// `u, v` pairs, `2 * vertex_count` floats.
    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    /// Packed `0xAARRGGBB` per vertex.
    pub fn colors(&self) -> &[u32] {
        &self.colors
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn positions_mut(&mut self) -> &mut [f32] {
        &mut self.positions
    }

    pub fn uvs_mut(&mut self) -> &mut [f32] {
        &mut self.uvs
    }

    pub fn colors_mut(&mut self) -> &mut [u32] {
        &mut self.colors
    }

    pub fn indices_mut(&mut self) -> &mut [u16] {
        &mut self.indices
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn atlas_page(&self) -> usize {
        self.atlas_page
    }

    pub fn next(&self) -> Option<&RenderCommand> {
        self.next.as_deref()
    }

    pub fn set_next(&mut self, next: Option<Box<RenderCommand>>) {
        self.next = next;
    }

    pub fn take_next(&mut self) -> Option<Box<RenderCommand>> {
        self.next.take()
    }

    /// Iterates this command and every command linked after it.
    pub fn iter(&self) -> RenderCommandIter<'_> {
        RenderCommandIter {
            current: Some(self),
        }
    }

    /// Encodes this command (not its successors) as little-endian bytes:
    /// `vertex_count, index_count, blend_mode, atlas_page` as `u32`, then positions and uvs as
    /// `f32`, colors as `u32` and indices as `u16`.
    pub fn write_le<W: std::io::Write>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_u32::<LittleEndian>(self.vertex_count() as u32)?;
        out.write_u32::<LittleEndian>(self.index_count() as u32)?;
        out.write_u32::<LittleEndian>(self.blend_mode.code())?;
        out.write_u32::<LittleEndian>(self.atlas_page as u32)?;
        for &v in &self.positions {
            out.write_f32::<LittleEndian>(v)?;
        }
        for &v in &self.uvs {
            out.write_f32::<LittleEndian>(v)?;
        }
        for &c in &self.colors {
            out.write_u32::<LittleEndian>(c)?;
        }
        for &i in &self.indices {
            out.write_u16::<LittleEndian>(i)?;
        }
        Ok(())
    }
}

impl Drop for RenderCommand {
    fn drop(&mut self) {
        // Unlink iteratively so long lists don't recurse.
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}

#[derive(Clone, Debug)]
pub struct RenderCommandIter<'a> {
    current: Option<&'a RenderCommand>,
}

impl<'a> Iterator for RenderCommandIter<'a> {
    type Item = &'a RenderCommand;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.next();
        Some(current)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BufferKind {
    Positions,
    Uvs,
    Colors,
    Indices,
}

/// Instrumentation hook notified for every command and array a [`CommandAllocator`] creates or
/// disposes.
pub trait AllocationObserver: Send + Sync {
    fn command_allocated(&self) {}
    fn command_freed(&self) {}
    fn buffer_allocated(&self, kind: BufferKind, len: usize, bytes: usize);
    fn buffer_freed(&self, kind: BufferKind, len: usize, bytes: usize);
}

/// Creates and disposes render commands.
#[derive(Clone, Default)]
pub struct CommandAllocator {
    observer: Option<Arc<dyn AllocationObserver>>,
}

impl std::fmt::Debug for CommandAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandAllocator")
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl CommandAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: Arc<dyn AllocationObserver>) -> Self {
        Self {
            observer: Some(observer),
        }
    }

    /// Allocates a zero-initialized command sized for `vertex_count` vertices and `index_count`
    /// indices.
    pub fn create(
        &self,
        vertex_count: usize,
        index_count: usize,
        blend_mode: BlendMode,
        atlas_page: usize,
    ) -> Box<RenderCommand> {
        let command = Box::new(RenderCommand {
            positions: vec![0.0; vertex_count * 2],
            uvs: vec![0.0; vertex_count * 2],
            colors: vec![0; vertex_count],
            indices: vec![0; index_count],
            blend_mode,
            atlas_page,
            next: None,
        });
        if let Some(observer) = &self.observer {
            observer.command_allocated();
            for (kind, len, bytes) in buffer_sizes(&command) {
                observer.buffer_allocated(kind, len, bytes);
            }
        }
        command
    }

    /// Frees one command and every array it owns. Returns the commands that were linked after it.
    /// `None` is a no-op.
    pub fn dispose(&self, command: Option<Box<RenderCommand>>) -> Option<Box<RenderCommand>> {
        let mut command = command?;
        let rest = command.next.take();
        if let Some(observer) = &self.observer {
            for (kind, len, bytes) in buffer_sizes(&command) {
                observer.buffer_freed(kind, len, bytes);
            }
            observer.command_freed();
        }
        rest
    }

    /// Frees a whole list by walking its `next` chain. `None` is a no-op.
    pub fn dispose_list(&self, head: Option<Box<RenderCommand>>) {
        let mut next = head;
        while next.is_some() {
            next = self.dispose(next);
        }
    }
}

fn buffer_sizes(command: &RenderCommand) -> [(BufferKind, usize, usize); 4] {
    [
        (
            BufferKind::Positions,
            command.positions.len(),
            std::mem::size_of_val(command.positions.as_slice()),
        ),
        (
            BufferKind::Uvs,
            command.uvs.len(),
            std::mem::size_of_val(command.uvs.as_slice()),
        ),
        (
            BufferKind::Colors,
            command.colors.len(),
            std::mem::size_of_val(command.colors.as_slice()),
        ),
        (
            BufferKind::Indices,
            command.indices.len(),
            std::mem::size_of_val(command.indices.as_slice()),
        ),
    ]
}

/// Counts live and total allocations reported by a [`CommandAllocator`].
#[derive(Debug, Default)]
pub struct AllocationCounter {
    live_commands: AtomicUsize,
    total_commands: AtomicUsize,
    live_buffers: AtomicUsize,
    total_buffers: AtomicUsize,
    live_bytes: AtomicUsize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LeakReport {
    pub commands: usize,
    pub buffers: usize,
    pub bytes: usize,
}

impl AllocationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_commands(&self) -> usize {
        self.live_commands.load(Ordering::Relaxed)
    }

    pub fn total_commands(&self) -> usize {
        self.total_commands.load(Ordering::Relaxed)
    }

    pub fn live_buffers(&self) -> usize {
        self.live_buffers.load(Ordering::Relaxed)
    }

    pub fn total_buffers(&self) -> usize {
        self.total_buffers.load(Ordering::Relaxed)
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// Returns what is still live, or `None` when every allocation was disposed.
    pub fn report_leaks(&self) -> Option<LeakReport> {
        let report = LeakReport {
            commands: self.live_commands(),
            buffers: self.live_buffers(),
            bytes: self.live_bytes(),
        };
        if report.commands == 0 && report.buffers == 0 {
            return None;
        }
        log::warn!(
            "render command leak: {} commands, {} buffers, {} bytes still live",
            report.commands,
            report.buffers,
            report.bytes
        );
        Some(report)
    }
}

impl AllocationObserver for AllocationCounter {
    fn command_allocated(&self) {
        self.live_commands.fetch_add(1, Ordering::Relaxed);
        self.total_commands.fetch_add(1, Ordering::Relaxed);
    }

    fn command_freed(&self) {
        self.live_commands.fetch_sub(1, Ordering::Relaxed);
    }

    fn buffer_allocated(&self, _kind: BufferKind, _len: usize, bytes: usize) {
        self.live_buffers.fetch_add(1, Ordering::Relaxed);
        self.total_buffers.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn buffer_freed(&self, _kind: BufferKind, _len: usize, bytes: usize) {
        self.live_buffers.fetch_sub(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }
}

/// Dumps a frame's command list, head first.
#[cfg(feature = "json")]
pub fn render_commands_to_json(head: Option<&RenderCommand>) -> serde_json::Value {
    use serde_json::json;

    let commands = head
        .into_iter()
        .flat_map(|command| command.iter())
        .map(|command| {
            json!({
                "vertexCount": command.vertex_count(),
                "indexCount": command.index_count(),
                "blendMode": command.blend_mode(),
                "atlasPage": command.atlas_page(),
                "positions": command.positions(),
                "uvs": command.uvs(),
                "colors": command.colors(),
                "indices": command.indices(),
            })
        })
        .collect::<Vec<_>>();
    json!({ "commands": commands })
}
