use crate::{
    enums::Processor,
    metadata::{VolumeMetadata, voxel_count},
    volume::{Volume3D, Volume4D},
};

use dicom::{core::Tag, object::OpenFileOptions};
use dicom_dictionary_std::tags;
use ndarray::{Array3, Array4, ArrayViewMut3, Axis};
use rayon::prelude::*;
use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};
use thiserror::Error;
use tracing::{debug, info};
use web_time::Instant;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Missing or malformed {name} {tag}: {reason}")]
    MetadataMissing {
        name: &'static str,
        tag: Tag,
        reason: String,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Truncated file: frame {frame} ends at byte {expected_end} but only {available} bytes are available")]
    TruncatedFile {
        frame: u32,
        expected_end: u64,
        available: u64,
    },

    #[error("Conversion cancelled before frame {frame}")]
    Cancelled { frame: u32 },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

/// Compute where the pixel payload starts.
///
/// The container does not record the payload position, so it is inferred:
/// the file is an arbitrary header followed directly by every frame, one byte
/// per voxel, with no padding and no per-frame headers.
///
/// # Errors
///
/// Returns [`VolumeLoaderError::InvalidGeometry`] if a dimension is zero or
/// the declared payload does not fit in the file.
pub fn resolve_header_offset(
    total_file_size: u64,
    frames: u32,
    slices: u32,
    rows: u32,
    columns: u32,
) -> Result<u64, VolumeLoaderError> {
    if frames == 0 || slices == 0 || rows == 0 || columns == 0 {
        return Err(VolumeLoaderError::InvalidGeometry(format!(
            "dimensions must be positive, got frames={frames} slices={slices} rows={rows} columns={columns}"
        )));
    }

    let pixel_data_size = voxel_count(&[frames, slices, rows, columns])
        .filter(|&size| size <= total_file_size)
        .ok_or_else(|| {
            VolumeLoaderError::InvalidGeometry(format!(
                "pixel data of {frames}x{slices}x{rows}x{columns} bytes does not fit in a file of {total_file_size} bytes"
            ))
        })?;

    Ok(total_file_size - pixel_data_size)
}

/// Read one frame from the raw file bytes as a `(slices, rows, columns)`
/// volume.
///
/// Columns vary fastest on disk, then rows, then slices.
///
/// # Errors
///
/// Returns [`VolumeLoaderError::TruncatedFile`] if the frame's byte range
/// runs past the end of `raw`.
pub fn extract_frame(
    raw: &[u8],
    header_offset: u64,
    frame_index: u32,
    slices: u32,
    rows: u32,
    columns: u32,
) -> Result<Volume3D, VolumeLoaderError> {
    let bytes = frame_bytes(raw, header_offset, frame_index, slices, rows, columns)?;
    let shape = (slices as usize, rows as usize, columns as usize);
    let data = Array3::from_shape_vec(shape, bytes.to_vec())
        .map_err(|e| VolumeLoaderError::InvalidGeometry(e.to_string()))?;
    Ok(Volume3D::new(data))
}

fn frame_bytes(
    raw: &[u8],
    header_offset: u64,
    frame_index: u32,
    slices: u32,
    rows: u32,
    columns: u32,
) -> Result<&[u8], VolumeLoaderError> {
    let frame_size = voxel_count(&[slices, rows, columns]);
    let available = raw.len() as u64;
    let start = frame_size
        .and_then(|size| u64::from(frame_index).checked_mul(size))
        .and_then(|offset| offset.checked_add(header_offset));
    let end = start
        .zip(frame_size)
        .and_then(|(start, size)| start.checked_add(size));

    match (start, end) {
        (Some(start), Some(end)) if end <= available => Ok(&raw[start as usize..end as usize]),
        _ => Err(VolumeLoaderError::TruncatedFile {
            frame: frame_index,
            expected_end: end.unwrap_or(u64::MAX),
            available,
        }),
    }
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load every frame of a multi-frame 3D DICOM file
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the DICOM file
    /// * `processor` - How the per-frame loop is executed
    ///
    /// # Errors
    ///
    /// Returns error if the header cannot be parsed, a required attribute is
    /// missing or the pixel payload does not match the declared geometry
    pub fn load_from_file(
        path: impl AsRef<Path>,
        processor: Processor,
    ) -> Result<Volume4D, VolumeLoaderError> {
        Self::load_from_file_cancellable(path, processor, &AtomicBool::new(false))
    }

    /// Same as [`VolumeLoader::load_from_file`], aborting once `cancel` is set
    pub fn load_from_file_cancellable(
        path: impl AsRef<Path>,
        processor: Processor,
        cancel: &AtomicBool,
    ) -> Result<Volume4D, VolumeLoaderError> {
        let path = path.as_ref();
        let dicom_object = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)?;
        let metadata = VolumeMetadata::from_dicom_object(&dicom_object)?;
        debug!(?metadata, "read volume metadata");

        let raw = fs::read(path)?;
        Self::assemble(&raw, &metadata, processor, cancel)
    }

    /// Load from bytes already in memory, with metadata from any source
    pub fn load_from_bytes(
        raw: &[u8],
        metadata: &VolumeMetadata,
        processor: Processor,
    ) -> Result<Volume4D, VolumeLoaderError> {
        Self::assemble(raw, metadata, processor, &AtomicBool::new(false))
    }

    /// Extract and reorient every frame, in frame order.
    ///
    /// The result is indexed `[frame][column][row][slice]`. Nothing is
    /// returned unless every frame succeeds.
    pub fn assemble(
        raw: &[u8],
        metadata: &VolumeMetadata,
        processor: Processor,
        cancel: &AtomicBool,
    ) -> Result<Volume4D, VolumeLoaderError> {
        let started = Instant::now();
        metadata.validate()?;

        let total_file_size = raw.len() as u64;
        let VolumeMetadata {
            columns,
            rows,
            slices,
            ..
        } = *metadata;
        let frames = metadata.frame_count();
        let header_offset = resolve_header_offset(total_file_size, frames, slices, rows, columns)?;
        info!(
            total_file_size,
            header_size = header_offset,
            pixel_data_size = total_file_size - header_offset,
            "resolved pixel data layout"
        );

        let shape = (
            frames as usize,
            columns as usize,
            rows as usize,
            slices as usize,
        );
        let mut data = Array4::<u8>::zeros(shape);

        let fill = |(frame_index, mut slot): (usize, ArrayViewMut3<'_, u8>)| -> Result<(), VolumeLoaderError> {
            let frame_index = frame_index as u32;
            if cancel.load(Ordering::Relaxed) {
                return Err(VolumeLoaderError::Cancelled { frame: frame_index });
            }
            let volume = extract_frame(raw, header_offset, frame_index, slices, rows, columns)?;
            slot.assign(&volume.reorient().into_data());
            debug!(frame = frame_index, "reoriented frame");
            Ok(())
        };

        match processor {
            Processor::CPU => data
                .axis_iter_mut(Axis(0))
                .enumerate()
                .try_for_each(fill)?,
            Processor::Parallel { threads: 0 } => data
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .try_for_each(fill)?,
            Processor::Parallel { threads } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()?;
                pool.install(|| {
                    data.axis_iter_mut(Axis(0))
                        .into_par_iter()
                        .enumerate()
                        .try_for_each(fill)
                })?
            }
        }

        info!(
            shape = ?data.dim(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "assembled 4D volume"
        );

        Ok(Volume4D::new(
            data,
            metadata.spacing_mm,
            metadata.frame_times(),
        ))
    }
}
