//! Spill files for the disk-backed collector
//!
//! A spill file is a flat sequence of fixed-size records: a [`RecordHeader`]
//! followed by the bin's `state_len` accumulator values, all native-endian.
//! Files only live for the duration of a run, inside a temporary directory.

use crate::bins::SpatialBin;
use crate::errors::{BinningError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::mem::size_of;
use std::path::{Path, PathBuf};

#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct RecordHeader {
    index: u64,
    num_obs: u32,
    num_passes: u32,
}

const HEADER_LEN: usize = size_of::<RecordHeader>();

/// Append-only record file of one collector shard
#[derive(Debug)]
pub(crate) struct SpillFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    records: u64,
}

impl SpillFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            writer: None,
            records: 0,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn records(&self) -> u64 {
        self.records
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .map_err(|e| BinningError::spill(format!("opening {}", self.path.display()), e))?;
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }

    /// Append `bins` as records
    pub(crate) fn append<'a>(&mut self, bins: impl IntoIterator<Item = &'a SpatialBin>) -> Result<()> {
        let path = self.path.clone();
        let writer = self.writer()?;
        let mut written = 0;
        for bin in bins {
            let header = RecordHeader {
                index: bin.index,
                num_obs: bin.num_obs,
                num_passes: bin.num_passes,
            };
            writer
                .write_all(bytemuck::bytes_of(&header))
                .and_then(|()| writer.write_all(bytemuck::cast_slice(&bin.state)))
                .map_err(|e| BinningError::spill(format!("writing {}", path.display()), e))?;
            written += 1;
        }
        self.records += written;
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| BinningError::spill(format!("flushing {}", self.path.display()), e))?;
        }
        Ok(())
    }

    /// Read every record back; `state_len` must match the writer's
    pub(crate) fn read_all(&mut self, state_len: usize) -> Result<Vec<SpatialBin>> {
        if self.records == 0 {
            return Ok(Vec::new());
        }
        self.flush()?;
        let context = || format!("reading {}", self.path.display());
        let mut bytes = Vec::new();
        File::open(&self.path)
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .map_err(|e| BinningError::spill(context(), e))?;

        let record_len = HEADER_LEN + state_len * size_of::<f64>();
        if bytes.len() % record_len != 0 {
            return Err(BinningError::spill(
                context(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, "truncated spill record"),
            ));
        }
        let bins = bytes
            .chunks_exact(record_len)
            .map(|record| {
                let header: RecordHeader = bytemuck::pod_read_unaligned(&record[..HEADER_LEN]);
                let state = record[HEADER_LEN..]
                    .chunks_exact(size_of::<f64>())
                    .map(bytemuck::pod_read_unaligned::<f64>)
                    .collect();
                SpatialBin {
                    index: header.index,
                    num_obs: header.num_obs,
                    num_passes: header.num_passes,
                    state,
                }
            })
            .collect();
        Ok(bins)
    }
}
