//! Contains [`ChunkedArray`], the chunked column type behind the geometry column.
//!
//! In contrast to a single Arrow array, this data structure only has contiguous memory within
//! each individual _chunk_. It is essentially a wrapper around a [Vec] of arrays.
//!
//! Additionally, if the `rayon` feature is active, operations on chunked arrays will automatically
//! be parallelized across each chunk.

use arrow::array::ArrayData;
use arrow_array::{Array, ArrayRef};
use arrow_schema::DataType;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::{GeoFrameError, Result};

/// A collection of Arrow arrays of the same type.
///
/// This can be thought of as a column in a table, as Table objects normally have internal batches.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedArray<A: Array> {
    pub(crate) chunks: Vec<A>,
    length: usize,
}

impl<A: Array> ChunkedArray<A> {
    /// Creates a new chunked array from multiple arrays.
    ///
    /// # Panics
    ///
    /// If the chunks do not all share the same data type. Use [`ChunkedArray::try_new`] to get
    /// an error instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoframe::chunked_array::ChunkedArray;
    /// use arrow_array::Int32Array;
    ///
    /// let array_0 = Int32Array::from(vec![1, 2]);
    /// let array_1 = Int32Array::from(vec![3, 4]);
    /// let chunked_array = ChunkedArray::new(vec![array_0, array_1]);
    /// assert_eq!(chunked_array.len(), 4);
    /// ```
    pub fn new(chunks: Vec<A>) -> Self {
        match Self::try_new(chunks) {
            Ok(chunked) => chunked,
            Err(err) => panic!("{err}"),
        }
    }

    /// Creates a new chunked array, checking that every chunk has the same data type.
    pub fn try_new(chunks: Vec<A>) -> Result<Self> {
        if !chunks
            .windows(2)
            .all(|w| w[0].data_type() == w[1].data_type())
        {
            return Err(GeoFrameError::IncorrectType(
                "All chunks must have the same data type".into(),
            ));
        }

        let length = chunks.iter().map(|chunk| chunk.len()).sum();
        Ok(Self { chunks, length })
    }

    /// Converts this chunked array into its inner chunks.
    pub fn into_inner(self) -> Vec<A> {
        self.chunks
    }

    /// Returns this chunked array's length.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if chunked array is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoframe::chunked_array::ChunkedArray;
    /// use arrow_array::Int32Array;
    ///
    /// assert!(ChunkedArray::<Int32Array>::new(Vec::new()).is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns this chunked array's data type, or `None` when there are no chunks.
    pub fn data_type(&self) -> Option<&DataType> {
        self.chunks.first().map(|chunk| chunk.data_type())
    }

    /// Returns the number of nulls in this chunked array.
    pub fn null_count(&self) -> usize {
        self.chunks
            .iter()
            .fold(0, |acc, chunk| acc + chunk.null_count())
    }

    /// Returns an immutable reference to this chunked array's chunks.
    pub fn chunks(&self) -> &[A] {
        self.chunks.as_slice()
    }

    /// Returns the number of chunks.
    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Locate the chunk holding row `index`, returning the chunk number and the offset within it.
    pub(crate) fn locate(&self, index: usize) -> Option<(usize, usize)> {
        let mut offset = 0;
        for (chunk_idx, chunk) in self.chunks.iter().enumerate() {
            if index < offset + chunk.len() {
                return Some((chunk_idx, index - offset));
            }
            offset += chunk.len();
        }
        None
    }

    /// Applies an operation over each chunk of this chunked array.
    ///
    /// If the `rayon` feature is enabled, this will be done in parallel.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoframe::chunked_array::ChunkedArray;
    /// use arrow_array::Int32Array;
    ///
    /// let array_0 = Int32Array::from(vec![1]);
    /// let array_1 = Int32Array::from(vec![3, 4]);
    /// let chunked_array = ChunkedArray::new(vec![array_0, array_1]);
    /// let lengths = chunked_array.map(|chunk| chunk.len());
    /// assert_eq!(lengths, vec![1, 2]);
    /// ```
    pub fn map<F: Fn(&A) -> R + Sync + Send, R: Send>(&self, map_op: F) -> Vec<R> {
        #[cfg(feature = "rayon")]
        {
            let mut output_vec = Vec::with_capacity(self.chunks.len());
            self.chunks
                .par_iter()
                .map(map_op)
                .collect_into_vec(&mut output_vec);
            output_vec
        }

        #[cfg(not(feature = "rayon"))]
        {
            self.chunks.iter().map(map_op).collect()
        }
    }

    /// Applies an operation over each chunk of this chunked array, returning a `Result`.
    ///
    /// If the `rayon` feature is enabled, this will be done in parallel.
    pub fn try_map<F: Fn(&A) -> Result<R> + Sync + Send, R: Send>(
        &self,
        map_op: F,
    ) -> Result<Vec<R>> {
        #[cfg(feature = "rayon")]
        {
            self.chunks.par_iter().map(map_op).collect()
        }

        #[cfg(not(feature = "rayon"))]
        {
            self.chunks.iter().map(map_op).collect()
        }
    }

    /// Concatenate all chunks into a single Arrow array.
    pub fn concat(&self) -> Result<ArrayRef> {
        let arrays: Vec<&dyn Array> = self.chunks.iter().map(|c| c as &dyn Array).collect();
        match arrays.len() {
            0 => Err(GeoFrameError::General(
                "Cannot concatenate a chunked array without chunks".to_string(),
            )),
            _ => Ok(arrow::compute::concat(&arrays)?),
        }
    }
}

impl<A: Array + Clone + 'static> ChunkedArray<A> {
    /// Concatenate all chunks into one array of the same type, returning `empty` when there are
    /// no chunks.
    pub fn concat_or(&self, empty: A) -> Result<A> {
        match self.chunks.len() {
            0 => Ok(empty),
            1 => Ok(self.chunks[0].clone()),
            _ => self
                .concat()?
                .as_any()
                .downcast_ref::<A>()
                .cloned()
                .ok_or(GeoFrameError::IncorrectType(
                    "Concatenated array changed type".into(),
                )),
        }
    }
}

impl<A: Array + From<ArrayData>> ChunkedArray<A> {
    /// Zero-copy view of `length` rows starting at `offset`, spanning chunk boundaries.
    ///
    /// Chunks that end up empty are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use geoframe::chunked_array::ChunkedArray;
    /// use arrow_array::Int32Array;
    ///
    /// let array_0 = Int32Array::from(vec![1, 2]);
    /// let array_1 = Int32Array::from(vec![3, 4]);
    /// let chunked_array = ChunkedArray::new(vec![array_0, array_1]);
    /// let sliced = chunked_array.slice(1, 2);
    /// assert_eq!(sliced.len(), 2);
    /// assert_eq!(sliced.num_chunks(), 2);
    /// ```
    pub fn slice(&self, offset: usize, length: usize) -> Self {
        let end = (offset + length).min(self.length);
        let mut chunks = Vec::new();
        let mut chunk_start = 0;
        for chunk in self.chunks.iter() {
            let chunk_end = chunk_start + chunk.len();
            let lower = offset.max(chunk_start);
            let upper = end.min(chunk_end);
            if lower < upper {
                let data = chunk.to_data().slice(lower - chunk_start, upper - lower);
                chunks.push(A::from(data));
            }
            chunk_start = chunk_end;
        }

        let length = chunks.iter().map(|chunk| chunk.len()).sum();
        Self { chunks, length }
    }
}

impl<A: Array> TryFrom<Vec<A>> for ChunkedArray<A> {
    type Error = GeoFrameError;

    fn try_from(value: Vec<A>) -> Result<Self> {
        Self::try_new(value)
    }
}

impl<A: Array> AsRef<[A]> for ChunkedArray<A> {
    fn as_ref(&self) -> &[A] {
        &self.chunks
    }
}
