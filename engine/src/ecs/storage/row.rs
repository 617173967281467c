/// An index into a table's columns and entity list. Rows are only stable
/// until the next swap-remove in the same table — see
/// [`super::table::Table::delete`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Row(u32);

impl Row {
    /// Construct a row from a raw index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw index this row points to.
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for Row {
    #[inline]
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<usize> for Row {
    #[inline]
    fn from(value: usize) -> Self {
        Self::new(value as u32)
    }
}
