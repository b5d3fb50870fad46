//! Dense draw list with self-indexing elements.

/// An element that remembers where it sits inside a [`RenderBucket`].
pub trait RenderIndexed {
    fn render_index(&self) -> usize;
    fn set_render_index(&mut self, index: usize);
}

/// A dense list of elements that each store their own position.
///
/// Adding appends and stamps the element with its index. Removing moves the
/// last element into the vacated slot and restamps it, so every element's
/// stored index always matches its actual position.
#[derive(Debug, Clone)]
pub struct RenderBucket<T> {
    items: Vec<T>,
}

impl<T: RenderIndexed> RenderBucket<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append `item`, returning the index it was stamped with.
    pub fn add(&mut self, mut item: T) -> usize {
        let index = self.items.len();
        item.set_render_index(index);
        self.items.push(item);
        index
    }

    /// Remove the element at `index` in O(1).
    ///
    /// An out-of-range index trips a debug assertion and otherwise returns
    /// `None` without touching the bucket.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            debug_assert!(false, "RenderBucket::remove index {index} out of range");
            return None;
        }

        let removed = self.items.swap_remove(index);
        if let Some(moved) = self.items.get_mut(index) {
            moved.set_render_index(index);
        }
        Some(removed)
    }

    /// Remove `item`'s counterpart using the index it carries.
    pub fn remove_item(&mut self, item: &T) -> Option<T> {
        self.remove(item.render_index())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: RenderIndexed> Default for RenderBucket<T> {
    fn default() -> Self {
        Self::new()
    }
}
