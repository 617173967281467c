/// Metadata attached to a component entity: just enough to size and lay out
/// a column for it. Components are plain data (§1 "user-defined component
/// data semantics" is out of scope) so there is deliberately no drop glue or
/// type-erased vtable here — columns are raw byte buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// The size, in bytes, of one instance of this component.
    size: u32,
}

impl Descriptor {
    /// Describe a component with the given fixed byte size.
    ///
    /// A `size` of `0` is valid and denotes a tag component — one that marks
    /// membership without carrying data (e.g. [`crate::ecs::world::PREFAB`]).
    #[inline]
    pub const fn new(size: u32) -> Self {
        Self { size }
    }

    /// The byte size of one instance of this component.
    #[inline]
    pub const fn size(&self) -> usize {
        self.size as usize
    }

    /// Whether this is a zero-sized tag component.
    #[inline]
    pub const fn is_tag(&self) -> bool {
        self.size == 0
    }
}
