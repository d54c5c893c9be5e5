//! Chunk layout - how an array is divided into chunks, and chunk key resolution

use crate::error::{PublishError, Result};
use std::ops::Range;
use std::str::FromStr;

/// Chunk key separator used by Zarr v2 stores
pub const CHUNK_KEY_SEPARATOR: char = '.';

/// Position of a chunk in the chunk grid, one index per dimension
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkCoord(Vec<usize>);

impl ChunkCoord {
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }
}

impl FromStr for ChunkCoord {
    type Err = PublishError;

    /// Parse a dot-delimited key such as `0.1.2`
    fn from_str(key: &str) -> Result<Self> {
        key.split(CHUNK_KEY_SEPARATOR)
            .map(|token| {
                if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(PublishError::MalformedCoordinate(format!(
                        "{:?}: {:?} is not a non-negative integer",
                        key, token
                    )));
                }
                token.parse::<usize>().map_err(|e| {
                    PublishError::MalformedCoordinate(format!("{:?}: {}", key, e))
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(ChunkCoord)
    }
}

/// Resolve a chunk key into one half-open index range per dimension.
///
/// Range `d` is `[i_d * chunk_sizes[d], (i_d + 1) * chunk_sizes[d])`. The
/// ranges are not checked against the array's shape. A zero-dimensional array
/// has the single key `0`.
pub fn resolve(key: &str, chunk_sizes: &[usize]) -> Result<Vec<Range<usize>>> {
    if chunk_sizes.is_empty() {
        return if key == "0" {
            Ok(Vec::new())
        } else {
            Err(PublishError::MalformedCoordinate(format!(
                "{:?}: a zero-dimensional array only has chunk \"0\"",
                key
            )))
        };
    }

    let coord: ChunkCoord = key.parse()?;
    if coord.ndim() != chunk_sizes.len() {
        return Err(PublishError::MalformedCoordinate(format!(
            "{:?}: expected {} indices, got {}",
            key,
            chunk_sizes.len(),
            coord.ndim()
        )));
    }
    index_ranges(&coord, chunk_sizes)
}

/// Index ranges covered by a chunk coordinate
pub fn index_ranges(coord: &ChunkCoord, chunk_sizes: &[usize]) -> Result<Vec<Range<usize>>> {
    coord
        .indices()
        .iter()
        .zip(chunk_sizes)
        .map(|(&i, &size)| {
            let overflow = || {
                PublishError::MalformedCoordinate(format!(
                    "chunk index {} overflows with chunk size {}",
                    i, size
                ))
            };
            let start = i.checked_mul(size).ok_or_else(overflow)?;
            let end = start.checked_add(size).ok_or_else(overflow)?;
            Ok(start..end)
        })
        .collect()
}

/// Shape and chunking of one array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLayout {
    shape: Vec<usize>,
    chunks: Vec<usize>,
}

impl ChunkLayout {
    /// Create a layout; every chunk size must be positive and match the shape's rank
    pub fn new(shape: Vec<usize>, chunks: Vec<usize>) -> Result<Self> {
        if shape.len() != chunks.len() {
            return Err(PublishError::InvalidDimensions(format!(
                "chunks {:?} do not match shape {:?}",
                chunks, shape
            )));
        }
        if let Some(d) = chunks.iter().position(|&c| c == 0) {
            return Err(PublishError::InvalidDimensions(format!(
                "chunk size along dimension {} must be positive",
                d
            )));
        }
        Ok(Self { shape, chunks })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn chunks(&self) -> &[usize] {
        &self.chunks
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of chunks along each dimension
    pub fn chunk_grid_shape(&self) -> Vec<usize> {
        self.shape
            .iter()
            .zip(&self.chunks)
            .map(|(&len, &chunk)| len.div_ceil(chunk))
            .collect()
    }

    /// Total number of chunks
    pub fn total_chunks(&self) -> usize {
        self.chunk_grid_shape().iter().product()
    }

    /// Get a summary string of the layout
    pub fn summary(&self) -> String {
        let join = |v: &[usize]| {
            v.iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" x ")
        };
        format!(
            "{}D array: {} in chunks of {}, {} chunks",
            self.ndim(),
            join(&self.shape),
            join(&self.chunks),
            self.total_chunks()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_layout() -> ChunkLayout {
        ChunkLayout::new(vec![1000, 800, 500], vec![64, 64, 64]).unwrap()
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("0.0", &[2, 2]).unwrap(), vec![0..2, 0..2]);
        assert_eq!(resolve("1.3", &[2, 5]).unwrap(), vec![2..4, 15..20]);
        assert_eq!(resolve("7", &[10]).unwrap(), vec![70..80]);
    }

    #[test]
    fn test_resolve_does_not_bounds_check() {
        assert_eq!(resolve("5.5", &[2, 2]).unwrap(), vec![10..12, 10..12]);
    }

    #[test]
    fn test_resolve_malformed() {
        for key in ["a.b", "0", "0.0.0", "", "0.", "-1.0", "+1.0", "1.5e2", " 1.0"] {
            assert!(
                matches!(
                    resolve(key, &[2, 2]),
                    Err(PublishError::MalformedCoordinate(_))
                ),
                "{:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_resolve_overflow() {
        let key = format!("{}", usize::MAX);
        assert!(matches!(
            resolve(&key, &[2]),
            Err(PublishError::MalformedCoordinate(_))
        ));
    }

    #[test]
    fn test_resolve_zero_dimensional() {
        assert_eq!(resolve("0", &[]).unwrap(), Vec::<Range<usize>>::new());
        assert!(resolve("1", &[]).is_err());
    }

    #[test]
    fn test_chunk_coord_parse() {
        let coord: ChunkCoord = "3.0.12".parse().unwrap();
        assert_eq!(coord.indices(), &[3, 0, 12]);
        assert_eq!(coord.ndim(), 3);
    }

    #[test]
    fn test_chunk_grid_shape() {
        let layout = create_test_layout();
        // ceil(1000/64), ceil(800/64), ceil(500/64)
        assert_eq!(layout.chunk_grid_shape(), vec![16, 13, 8]);
        assert_eq!(layout.total_chunks(), 16 * 13 * 8);
    }

    #[test]
    fn test_last_chunk_not_trimmed() {
        let layout = create_test_layout();
        assert_eq!(
            resolve("15.12.7", layout.chunks()).unwrap(),
            vec![960..1024, 768..832, 448..512]
        );
    }

    #[test]
    fn test_layout_validation() {
        assert!(ChunkLayout::new(vec![4, 4], vec![2]).is_err());
        assert!(ChunkLayout::new(vec![4, 4], vec![2, 0]).is_err());
    }

    #[test]
    fn test_summary() {
        let layout = ChunkLayout::new(vec![4, 4], vec![2, 2]).unwrap();
        assert_eq!(layout.summary(), "2D array: 4 x 4 in chunks of 2 x 2, 4 chunks");
    }
}
