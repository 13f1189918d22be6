use crate::errors::FrameResult;
use crate::frame::Frame;

/// Splits a frame into the chunks a transform processes.
///
/// Chunk `i` is stamped with row numbers from `i * chunksize`, so a chunker
/// must return chunks in row order and none larger than `chunksize`.
pub trait Chunker: Send + Sync {
    fn chunks(&self, frame: &Frame, chunksize: usize, maxobs: usize) -> FrameResult<Vec<Frame>>;
}

impl<F> Chunker for F
where
    F: Fn(&Frame, usize, usize) -> FrameResult<Vec<Frame>> + Send + Sync,
{
    fn chunks(&self, frame: &Frame, chunksize: usize, maxobs: usize) -> FrameResult<Vec<Frame>> {
        self(frame, chunksize, maxobs)
    }
}

/// `ceil(maxobs / chunksize)` chunks of consecutive rows.
///
/// An unfiltered, unsliced frame whose stamps run `0..count` without gaps is
/// cut by position on the stamp. Any other frame is cut with skip and limit,
/// which follows stamp order when rows are stamped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultChunker;

impl Chunker for DefaultChunker {
    fn chunks(&self, frame: &Frame, chunksize: usize, maxobs: usize) -> FrameResult<Vec<Frame>> {
        let chunksize = chunksize.max(1);
        let state = frame.state();
        let positional = !frame.view().is_filtered()
            && state.sort.is_none()
            && state.skip.is_none()
            && state.limit.is_none()
            && frame.has_dense_row_stamp()?;

        let count = maxobs.div_ceil(chunksize);
        let mut chunks = Vec::with_capacity(count);
        for i in 0..count {
            let start = i * chunksize;
            let size = chunksize.min(maxobs - start);
            let chunk = if positional {
                frame.iloc().get(start..start + size)?
            } else {
                frame.skip(start).head(size)
            };
            chunks.push(chunk);
        }
        log::debug!(
            "Split {} into {} chunk(s) of up to {} row(s), {}",
            frame.name(),
            count,
            chunksize,
            if positional { "by position" } else { "by skip/limit" }
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{write_table, Table};
    use crate::store::InMemoryDatabase;
    use crate::{doc, q, val};

    fn stamped(n: usize) -> Frame {
        let db = InMemoryDatabase::new("chunks");
        let coll = db.collection("data");
        let rows = (0..n).map(|i| vec![val!(i)]).collect();
        write_table(&coll, &Table::from_rows(&["x"], rows).unwrap(), false).unwrap();
        Frame::new(coll).unwrap()
    }

    fn sizes(chunks: &[Frame]) -> Vec<usize> {
        chunks.iter().map(|c| c.table().unwrap().len()).collect()
    }

    #[test]
    fn last_chunk_is_partial() {
        let frame = stamped(25);
        let chunks = DefaultChunker.chunks(&frame, 10, 25).unwrap();
        assert_eq!(sizes(&chunks), vec![10, 10, 5]);
        assert_eq!(chunks[2].table().unwrap().get(0, "x"), Some(&val!(20)));
    }

    #[test]
    fn maxobs_limits_rows() {
        let frame = stamped(25);
        assert_eq!(sizes(&DefaultChunker.chunks(&frame, 10, 12).unwrap()), vec![10, 2]);
        assert!(DefaultChunker.chunks(&frame, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn filtered_frames_use_skip_and_limit() {
        let frame = stamped(25).query(&q!(x__gte = 5)).unwrap();
        let chunks = DefaultChunker.chunks(&frame, 8, 20).unwrap();
        assert_eq!(sizes(&chunks), vec![8, 8, 4]);
        assert_eq!(chunks[1].table().unwrap().get(0, "x"), Some(&val!(13)));
    }

    #[test]
    fn unstamped_frames_use_skip_and_limit() {
        let db = InMemoryDatabase::new("chunks");
        let coll = db.collection("plain");
        coll.insert_many((0..5).map(|i| doc! { x: i }).collect()).unwrap();
        let frame = Frame::new(coll).unwrap();
        assert_eq!(sizes(&DefaultChunker.chunks(&frame, 2, 5).unwrap()), vec![2, 2, 1]);
    }

    #[test]
    fn gapped_stamps_use_skip_and_limit() {
        let db = InMemoryDatabase::new("chunks");
        let coll = db.collection("gapped");
        let stamps = [0, 1, 2, 5, 6, 7];
        coll.insert_many(stamps.iter().map(|s| doc! { x: (*s), "_om#rowid": (*s) }).collect())
            .unwrap();
        let frame = Frame::new(coll).unwrap();
        assert!(!frame.has_dense_row_stamp().unwrap());

        let chunks = DefaultChunker.chunks(&frame, 4, 6).unwrap();
        assert_eq!(sizes(&chunks), vec![4, 2]);
        let last = chunks[1].table().unwrap();
        assert_eq!(last.get(0, "x"), Some(&val!(6)));
        assert_eq!(last.get(1, "x"), Some(&val!(7)));
    }

    #[test]
    fn closures_are_chunkers() {
        let halves = |frame: &Frame, _: usize, maxobs: usize| -> FrameResult<Vec<Frame>> {
            Ok(vec![frame.head(maxobs / 2), frame.skip(maxobs / 2)])
        };
        let chunks = halves.chunks(&stamped(6), 3, 6).unwrap();
        assert_eq!(sizes(&chunks), vec![3, 3]);
    }
}
