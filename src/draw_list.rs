//! Double-buffered triangle lists rebuilt every frame.
//!
//! Each list owns two physical vertex buffers. `begin` flips which one is
//! written, so the buffer submitted last frame is never overwritten while
//! the GPU may still read it.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::error::DrawListError;
use crate::vertex::{quad_vertices, scroll_quad_vertices, TileVertex, VERTICES_PER_QUAD};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DrawListId {
    Main,
    Fx,
}

impl DrawListId {
    pub const ALL: [DrawListId; 2] = [DrawListId::Main, DrawListId::Fx];

    pub fn index(self) -> usize {
        match self {
            DrawListId::Main => 0,
            DrawListId::Fx => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DrawListId::Main => "main",
            DrawListId::Fx => "fx",
        }
    }
}

#[derive(Debug)]
pub struct DrawList {
    id: DrawListId,
    front: usize,
    vertex_count: u32,
    capacity: usize,
    /// Reused vertex storage, shared with the writer between `begin` and
    /// `end`. The list is open while a writer holds a second reference.
    staging: Rc<RefCell<Vec<TileVertex>>>,
}

impl DrawList {
    pub fn new(id: DrawListId, capacity_quads: usize) -> Self {
        let capacity = capacity_quads * VERTICES_PER_QUAD;
        Self {
            id,
            front: 0,
            vertex_count: 0,
            capacity,
            staging: Rc::new(RefCell::new(Vec::with_capacity(capacity))),
        }
    }

    pub fn id(&self) -> DrawListId {
        self.id
    }

    /// Index (0 or 1) of the physical buffer written by the latest `begin`.
    pub fn front(&self) -> usize {
        self.front
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Capacity in vertices.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_open(&self) -> bool {
        Rc::strong_count(&self.staging) > 1
    }

    fn begin(&mut self) -> Result<TriangleWriter, DrawListError> {
        if self.is_open() {
            return Err(DrawListError::AlreadyOpen(self.id.name()));
        }
        self.staging.borrow_mut().clear();
        self.front ^= 1;
        // The new front buffer holds nothing until `end` uploads it.
        self.vertex_count = 0;
        Ok(TriangleWriter {
            list: self.id,
            vertices: Rc::clone(&self.staging),
            capacity: self.capacity,
        })
    }

    fn close(&mut self, writer: TriangleWriter) -> Ref<'_, [TileVertex]> {
        drop(writer);
        let vertices = self.staging.borrow();
        self.vertex_count = vertices.len() as u32;
        Ref::map(vertices, Vec::as_slice)
    }
}

/// Write cursor returned by `DrawLists::begin`.
///
/// Dropping a writer without `end` discards what it wrote and closes the
/// list; the next `begin` starts a fresh frame.
#[derive(Debug)]
pub struct TriangleWriter {
    list: DrawListId,
    vertices: Rc<RefCell<Vec<TileVertex>>>,
    capacity: usize,
}

impl TriangleWriter {
    pub fn list(&self) -> DrawListId {
        self.list
    }

    pub fn len(&self) -> usize {
        self.vertices.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.len()
    }

    pub fn emit_quad(&mut self, draw_rect: [f32; 4], uv_rect: [f32; 4]) -> Result<(), DrawListError> {
        self.emit_vertices(&quad_vertices(draw_rect, uv_rect))
    }

    pub fn emit_quad_scroll(
        &mut self,
        draw_rect: [f32; 4],
        uv_rect: [f32; 4],
        scroll_source_v: f32,
    ) -> Result<(), DrawListError> {
        self.emit_vertices(&scroll_quad_vertices(draw_rect, uv_rect, scroll_source_v))
    }

    /// Appends whole triangles; nothing is written if they do not all fit.
    pub fn emit_vertices(&mut self, vertices: &[TileVertex]) -> Result<(), DrawListError> {
        if vertices.len() > self.remaining() {
            return Err(DrawListError::Full {
                list: self.list.name(),
                capacity: self.capacity,
            });
        }
        self.vertices.borrow_mut().extend_from_slice(vertices);
        Ok(())
    }
}

#[derive(Debug)]
pub struct DrawLists {
    lists: [DrawList; 2],
}

impl DrawLists {
    pub fn new(main_quads: usize, fx_quads: usize) -> Self {
        Self {
            lists: [
                DrawList::new(DrawListId::Main, main_quads),
                DrawList::new(DrawListId::Fx, fx_quads),
            ],
        }
    }

    pub fn get(&self, list: DrawListId) -> &DrawList {
        &self.lists[list.index()]
    }

    /// Flips the list's front buffer and starts writing into it.
    pub fn begin(&mut self, list: DrawListId) -> Result<TriangleWriter, DrawListError> {
        let writer = self.lists[list.index()].begin()?;
        log::trace!(
            "draw list {} writing buffer {}",
            list.name(),
            self.lists[list.index()].front
        );
        Ok(writer)
    }

    /// Finishes `list`, returning the front buffer index and its vertices.
    ///
    /// A writer from another list is rejected; its own list is closed with
    /// the written vertices discarded.
    pub fn end(
        &mut self,
        list: DrawListId,
        writer: TriangleWriter,
    ) -> Result<(usize, Ref<'_, [TileVertex]>), DrawListError> {
        if writer.list != list {
            let found = writer.list;
            writer.vertices.borrow_mut().clear();
            return Err(DrawListError::WriterMismatch {
                expected: list.name(),
                found: found.name(),
            });
        }
        let draw_list = &mut self.lists[list.index()];
        if !Rc::ptr_eq(&draw_list.staging, &writer.vertices) {
            return Err(DrawListError::NotOpen(list.name()));
        }
        let front = draw_list.front;
        Ok((front, draw_list.close(writer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECT: [f32; 4] = [0.0, 0.0, 0.1, 0.1];

    #[test]
    fn test_begin_flips_front_buffer() {
        let mut lists = DrawLists::new(4, 2);
        assert_eq!(lists.get(DrawListId::Main).front(), 0);

        let writer = lists.begin(DrawListId::Main).unwrap();
        assert_eq!(lists.get(DrawListId::Main).front(), 1);
        lists.end(DrawListId::Main, writer).unwrap();
        assert_eq!(lists.get(DrawListId::Main).front(), 1);

        let writer = lists.begin(DrawListId::Main).unwrap();
        assert_eq!(lists.get(DrawListId::Main).front(), 0);
        lists.end(DrawListId::Main, writer).unwrap();
    }

    #[test]
    fn test_end_records_vertex_count() {
        let mut lists = DrawLists::new(4, 2);
        let mut writer = lists.begin(DrawListId::Main).unwrap();
        writer.emit_quad(RECT, RECT).unwrap();
        writer.emit_quad_scroll(RECT, RECT, 0.5).unwrap();
        let (front, vertices) = lists.end(DrawListId::Main, writer).unwrap();
        assert_eq!(front, 1);
        assert_eq!(vertices.len(), 12);
        drop(vertices);
        assert_eq!(lists.get(DrawListId::Main).vertex_count(), 12);

        // The next frame starts empty.
        let writer = lists.begin(DrawListId::Main).unwrap();
        assert!(writer.is_empty());
        lists.end(DrawListId::Main, writer).unwrap();
        assert_eq!(lists.get(DrawListId::Main).vertex_count(), 0);
    }

    #[test]
    fn test_same_list_cannot_reenter() {
        let mut lists = DrawLists::new(4, 2);
        let writer = lists.begin(DrawListId::Fx).unwrap();
        assert_eq!(
            lists.begin(DrawListId::Fx).unwrap_err(),
            DrawListError::AlreadyOpen("fx")
        );
        assert_eq!(lists.get(DrawListId::Fx).front(), 1);
        lists.end(DrawListId::Fx, writer).unwrap();
        assert!(!lists.get(DrawListId::Fx).is_open());
    }

    #[test]
    fn test_lists_are_independent() {
        let mut lists = DrawLists::new(4, 2);
        let mut main = lists.begin(DrawListId::Main).unwrap();
        let mut fx = lists.begin(DrawListId::Fx).unwrap();
        main.emit_quad(RECT, RECT).unwrap();
        fx.emit_quad(RECT, RECT).unwrap();
        fx.emit_quad(RECT, RECT).unwrap();
        lists.end(DrawListId::Fx, fx).unwrap();
        lists.end(DrawListId::Main, main).unwrap();
        assert_eq!(lists.get(DrawListId::Main).vertex_count(), 6);
        assert_eq!(lists.get(DrawListId::Fx).vertex_count(), 12);
    }

    #[test]
    fn test_full_list_rejects_whole_quad() {
        let mut lists = DrawLists::new(4, 1);
        let mut writer = lists.begin(DrawListId::Fx).unwrap();
        writer.emit_quad(RECT, RECT).unwrap();
        assert_eq!(
            writer.emit_quad(RECT, RECT).unwrap_err(),
            DrawListError::Full { list: "fx", capacity: 6 }
        );
        assert_eq!(writer.len(), 6);
    }

    #[test]
    fn test_mismatched_writer_closes_its_own_list() {
        let mut lists = DrawLists::new(4, 2);
        let mut fx = lists.begin(DrawListId::Fx).unwrap();
        fx.emit_quad(RECT, RECT).unwrap();
        let err = lists.end(DrawListId::Main, fx).unwrap_err();
        assert_eq!(err, DrawListError::WriterMismatch { expected: "main", found: "fx" });
        assert!(!lists.get(DrawListId::Fx).is_open());
        assert_eq!(lists.get(DrawListId::Fx).vertex_count(), 0);
    }

    fn fill_past_capacity(lists: &mut DrawLists) -> Result<(), DrawListError> {
        let mut writer = lists.begin(DrawListId::Fx)?;
        writer.emit_quad(RECT, RECT)?;
        writer.emit_quad(RECT, RECT)?;
        lists.end(DrawListId::Fx, writer)?;
        Ok(())
    }

    #[test]
    fn test_dropped_writer_leaves_list_reusable() {
        let mut lists = DrawLists::new(4, 1);
        let mut writer = lists.begin(DrawListId::Fx).unwrap();
        writer.emit_quad(RECT, RECT).unwrap();
        lists.end(DrawListId::Fx, writer).unwrap();
        assert_eq!(lists.get(DrawListId::Fx).vertex_count(), 6);

        assert!(fill_past_capacity(&mut lists).is_err());
        assert!(!lists.get(DrawListId::Fx).is_open());
        // Nothing from the abandoned frame is drawn.
        assert_eq!(lists.get(DrawListId::Fx).vertex_count(), 0);

        let mut writer = lists.begin(DrawListId::Fx).unwrap();
        assert!(writer.is_empty());
        writer.emit_quad(RECT, RECT).unwrap();
        let (_, vertices) = lists.end(DrawListId::Fx, writer).unwrap();
        assert_eq!(vertices.len(), 6);
    }

    #[test]
    fn test_writer_from_other_lists_is_rejected() {
        let mut lists = DrawLists::new(4, 2);
        let mut other = DrawLists::new(4, 2);
        let _open = lists.begin(DrawListId::Main).unwrap();
        let stray = other.begin(DrawListId::Main).unwrap();
        assert_eq!(
            lists.end(DrawListId::Main, stray).unwrap_err(),
            DrawListError::NotOpen("main")
        );
        assert!(!other.get(DrawListId::Main).is_open());
    }
}
