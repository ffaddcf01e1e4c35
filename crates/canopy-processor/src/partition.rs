//! Size-balanced work ordering.
//!
//! Work is handed to the worker pool largest-first (longest processing
//! time first), so small files fill the tail of a run.

use canopy_fs::FileSystem;
use std::path::PathBuf;

/// Indices of `sizes` ordered by size descending, then index ascending.
pub fn largest_first(sizes: &[u64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]).then(a.cmp(&b)));
    order
}

/// Looks up file sizes and returns the indices of `paths` largest-first.
/// Paths whose metadata cannot be read sort as empty files.
pub async fn order_by_size<F>(fs: &F, paths: &[PathBuf]) -> Vec<usize>
where
    F: FileSystem + ?Sized,
{
    let mut sizes = Vec::with_capacity(paths.len());
    for path in paths {
        sizes.push(fs.metadata(path).await.map(|m| m.size).unwrap_or(0));
    }
    largest_first(&sizes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_fs::MemoryFileSystem;

    #[test]
    fn test_largest_first_with_ties() {
        assert_eq!(largest_first(&[10, 500, 10, 0]), vec![1, 0, 2, 3]);
        assert!(largest_first(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_order_by_size_reads_metadata() {
        let fs = MemoryFileSystem::new("/p")
            .with_file("/p/Small.cs", "x")
            .with_file("/p/Large.cs", "x".repeat(100));
        let paths = vec![
            PathBuf::from("/p/Small.cs"),
            PathBuf::from("/p/Missing.cs"),
            PathBuf::from("/p/Large.cs"),
        ];
        assert_eq!(order_by_size(&fs, &paths).await, vec![2, 0, 1]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn largest_first_is_a_sorted_permutation(
                sizes in proptest::collection::vec(0u64..1000, 0..40)
            ) {
                let order = largest_first(&sizes);

                let mut seen = order.clone();
                seen.sort_unstable();
                prop_assert_eq!(seen, (0..sizes.len()).collect::<Vec<_>>());
                for pair in order.windows(2) {
                    prop_assert!(sizes[pair[0]] >= sizes[pair[1]]);
                }
            }
        }
    }
}
