//! # DICOM-volume4d library
//!
//! This crate extracts 3D+time volumes from multi-frame ultrasound DICOM
//! files whose pixel payload is stored as raw, uncompressed, single-byte
//! grayscale voxels, and reorients every frame into a canonical viewing order.
//!
//! The header is parsed with the dicom-rs ecosystem to obtain the geometry:
//!  - Columns and Rows
//!  - the private slice count `(3001,1001)`
//!  - PhysicalDeltaX/Y and the private PhysicalDeltaZ `(3001,1003)`
//!  - NumberOfFrames and FrameTime
//!
//! The start of the pixel payload is not read from the file. It is inferred
//! as `file size - frames * slices * rows * columns`, which assumes the
//! payload is the last thing in the file. Each frame is read in on-disk
//! `(slices, rows, columns)` order, rotated by 90° in the slice/column plane
//! and flipped along the row axis, producing `(columns, rows, slices)`.
//! Frames can be processed in parallel using rayon.
//!
//! # Examples
//!
//! ## Reading a 4D ultrasound file
//!
//! ```no_run
//! # use dicom_volume4d::{VolumeLoader, Processor};
//! let volume = VolumeLoader::load_from_file("echo.dcm", Processor::Parallel { threads: 0 })
//!     .expect("should have loaded the volume");
//! let (frames, columns, rows, slices) = volume.dim();
//! println!("{frames} frames of {columns}x{rows}x{slices}, spacing {:?} mm", volume.spacing());
//! ```

pub mod enums;
pub mod metadata;
pub mod volume;
pub mod volume_loader;

pub use enums::Processor;
pub use metadata::VolumeMetadata;
pub use volume::{Volume3D, Volume4D};
pub use volume_loader::{VolumeLoader, VolumeLoaderError, extract_frame, resolve_header_offset};
