use super::WriteOperation;
use std::iter::Peekable;

/// Consecutive operations against one collection, sent in a single bulk write.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub collection: String,
    pub operations: Vec<WriteOperation>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Lazily groups adjacent operations that share a collection.
///
/// Operations are never reordered, so `[a, a, b, a]` yields three batches.
pub struct Batches<I: Iterator<Item = WriteOperation>> {
    operations: Peekable<I>,
}

impl<I: Iterator<Item = WriteOperation>> Iterator for Batches<I> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let first = self.operations.next()?;
        let collection = first.collection.clone();
        let mut operations = vec![first];

        while let Some(next) = self.operations.next_if(|op| op.collection == collection) {
            operations.push(next);
        }

        Some(Batch { collection, operations })
    }
}

pub fn batch_operations<I>(operations: I) -> Batches<I::IntoIter>
where
    I: IntoIterator<Item = WriteOperation>,
{
    Batches {
        operations: operations.into_iter().peekable(),
    }
}
