#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ChunkStatus {
    /// More items can be added.
    Continuable,
    /// Capacity reached, the chunk must be written.
    Full,
    /// The reader is exhausted; the chunk holds the last items, if any.
    Finished,
}

/// Bounded, ordered buffer of processed items committed as one transaction.
pub struct Chunk<O> {
    items: Vec<O>,
    status: ChunkStatus,
    chunk_size: usize,
}

impl<O> Chunk<O> {
    pub fn new(chunk_size: usize) -> Chunk<O> {
        Chunk {
            items: Vec::with_capacity(chunk_size),
            status: ChunkStatus::Continuable,
            chunk_size,
        }
    }

    pub fn add_item(&mut self, item: O) {
        self.items.push(item);
        if self.items.len() >= self.chunk_size {
            self.status = ChunkStatus::Full;
        }
    }

    /// Marks the source as exhausted.
    pub fn finish(&mut self) {
        self.status = ChunkStatus::Finished;
    }

    pub fn get_items(&self) -> &[O] {
        &self.items
    }

    pub fn get_status(&self) -> ChunkStatus {
        self.status
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.status == ChunkStatus::Full
    }

    pub fn is_finished(&self) -> bool {
        self.status == ChunkStatus::Finished
    }

    pub fn clear(&mut self) {
        self.status = ChunkStatus::Continuable;
        self.items.clear();
    }
}
