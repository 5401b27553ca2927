use dicom::core::Tag;
use dicom::object::InMemDicomObject;
use dicom_dictionary_std::tags;

use crate::volume_loader::VolumeLoaderError;

/// Private tag holding the number of slices per frame (UL).
pub const SLICE_COUNT: Tag = Tag(0x3001, 0x1001);
/// Private tag holding the physical slice distance in centimeters (FD).
pub const PHYSICAL_DELTA_Z: Tag = Tag(0x3001, 0x1003);

/// Physical deltas are stored in centimeters.
const CM_TO_MM: f64 = 10.0;

/// Geometry and timing of a multi-frame 3D acquisition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeMetadata {
    pub columns: u32,
    pub rows: u32,
    pub slices: u32,
    pub frames: i32,
    pub frame_time_msec: f64,
    pub spacing_mm: [f64; 3],
}

impl VolumeMetadata {
    /// Read the metadata from a DICOM dataset
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::MetadataMissing`] for the first attribute
    /// that is absent or cannot be converted.
    pub fn from_dicom_object(dicom_object: &InMemDicomObject) -> Result<Self, VolumeLoaderError> {
        let columns = Self::get_u32(dicom_object, tags::COLUMNS, "Columns")?;
        let rows = Self::get_u32(dicom_object, tags::ROWS, "Rows")?;
        let slices = Self::get_u32(dicom_object, SLICE_COUNT, "SliceCount")?;
        let frames = dicom_object
            .element(tags::NUMBER_OF_FRAMES)
            .map_err(|e| missing("NumberOfFrames", tags::NUMBER_OF_FRAMES, e))?
            .to_int::<i32>()
            .map_err(|e| missing("NumberOfFrames", tags::NUMBER_OF_FRAMES, e))?;
        let frame_time_msec = Self::get_f64(dicom_object, tags::FRAME_TIME, "FrameTime")?;

        let delta_x = Self::get_region_f64(dicom_object, tags::PHYSICAL_DELTA_X, "PhysicalDeltaX")?;
        let delta_y = Self::get_region_f64(dicom_object, tags::PHYSICAL_DELTA_Y, "PhysicalDeltaY")?;
        let delta_z = Self::get_f64(dicom_object, PHYSICAL_DELTA_Z, "PhysicalDeltaZ")?;

        Ok(Self {
            columns,
            rows,
            slices,
            frames,
            frame_time_msec,
            spacing_mm: [delta_x * CM_TO_MM, delta_y * CM_TO_MM, delta_z * CM_TO_MM],
        })
    }

    /// Check that every dimension is strictly positive.
    pub fn validate(&self) -> Result<(), VolumeLoaderError> {
        if self.columns == 0 || self.rows == 0 || self.slices == 0 || self.frames <= 0 {
            return Err(VolumeLoaderError::InvalidGeometry(format!(
                "dimensions must be positive, got frames={} slices={} rows={} columns={}",
                self.frames, self.slices, self.rows, self.columns
            )));
        }
        Ok(())
    }

    /// Number of frames, clamped at zero for invalid metadata.
    pub fn frame_count(&self) -> u32 {
        self.frames.max(0) as u32
    }

    /// Bytes occupied by a single frame (one byte per voxel), `None` on
    /// overflow.
    pub fn voxels_per_frame(&self) -> Option<u64> {
        voxel_count(&[self.slices, self.rows, self.columns])
    }

    /// Bytes occupied by all frames, `None` on overflow.
    pub fn pixel_data_size(&self) -> Option<u64> {
        voxel_count(&[self.frame_count(), self.slices, self.rows, self.columns])
    }

    /// Timestamp of each frame in seconds.
    pub fn frame_times(&self) -> Vec<f64> {
        (0..self.frame_count())
            .map(|index| f64::from(index) * self.frame_time_msec * 0.001)
            .collect()
    }

    fn get_u32(
        dicom_object: &InMemDicomObject,
        tag: Tag,
        name: &'static str,
    ) -> Result<u32, VolumeLoaderError> {
        dicom_object
            .element(tag)
            .map_err(|e| missing(name, tag, e))?
            .to_int::<u32>()
            .map_err(|e| missing(name, tag, e))
    }

    fn get_f64(
        dicom_object: &InMemDicomObject,
        tag: Tag,
        name: &'static str,
    ) -> Result<f64, VolumeLoaderError> {
        dicom_object
            .element(tag)
            .map_err(|e| missing(name, tag, e))?
            .to_float64()
            .map_err(|e| missing(name, tag, e))
    }

    // PhysicalDeltaX/Y live in the Sequence of Ultrasound Regions in standard
    // files, some vendors put them at the root.
    fn get_region_f64(
        dicom_object: &InMemDicomObject,
        tag: Tag,
        name: &'static str,
    ) -> Result<f64, VolumeLoaderError> {
        if dicom_object.element(tag).is_ok() {
            return Self::get_f64(dicom_object, tag, name);
        }

        let region = dicom_object
            .element(tags::SEQUENCE_OF_ULTRASOUND_REGIONS)
            .ok()
            .and_then(|element| element.items())
            .and_then(|items| items.first());

        match region {
            Some(region) => Self::get_f64(region, tag, name),
            None => Err(missing(name, tag, "not present at root or in ultrasound regions")),
        }
    }
}

/// Product of the given dimensions, `None` on overflow.
pub(crate) fn voxel_count(dims: &[u32]) -> Option<u64> {
    dims.iter()
        .try_fold(1u64, |acc, &dim| acc.checked_mul(u64::from(dim)))
}

fn missing(name: &'static str, tag: Tag, reason: impl ToString) -> VolumeLoaderError {
    VolumeLoaderError::MetadataMissing {
        name,
        tag,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, PrimitiveValue, VR};
    use dicom::object::mem::InMemElement;

    fn dataset() -> InMemDicomObject {
        InMemDicomObject::from_element_iter([
            DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(3_u16)),
            DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(4_u16)),
            DataElement::new(tags::NUMBER_OF_FRAMES, VR::IS, PrimitiveValue::from("2")),
            DataElement::new(tags::FRAME_TIME, VR::DS, PrimitiveValue::from("40")),
            DataElement::new(tags::PHYSICAL_DELTA_X, VR::FD, PrimitiveValue::from(0.05_f64)),
            DataElement::new(tags::PHYSICAL_DELTA_Y, VR::FD, PrimitiveValue::from(0.025_f64)),
            DataElement::new(SLICE_COUNT, VR::UL, PrimitiveValue::from(5_u32)),
            DataElement::new(PHYSICAL_DELTA_Z, VR::FD, PrimitiveValue::from(0.1_f64)),
        ])
    }

    #[test]
    fn reads_all_attributes() {
        let metadata = VolumeMetadata::from_dicom_object(&dataset()).unwrap();
        assert_eq!(metadata.columns, 4);
        assert_eq!(metadata.rows, 3);
        assert_eq!(metadata.slices, 5);
        assert_eq!(metadata.frames, 2);
        assert_eq!(metadata.frame_time_msec, 40.0);
        for (actual, expected) in metadata.spacing_mm.iter().zip([0.5, 0.25, 1.0]) {
            assert!((actual - expected).abs() < 1e-12);
        }
        assert!(metadata.validate().is_ok());
    }

    #[test]
    fn reads_deltas_from_ultrasound_region() {
        let mut dicom_object = dataset();
        dicom_object.remove_element(tags::PHYSICAL_DELTA_X);
        dicom_object.remove_element(tags::PHYSICAL_DELTA_Y);
        let region = InMemDicomObject::from_element_iter([
            DataElement::new(tags::PHYSICAL_DELTA_X, VR::FD, PrimitiveValue::from(0.03_f64)),
            DataElement::new(tags::PHYSICAL_DELTA_Y, VR::FD, PrimitiveValue::from(0.04_f64)),
        ]);
        dicom_object.put(InMemElement::new(
            tags::SEQUENCE_OF_ULTRASOUND_REGIONS,
            VR::SQ,
            dicom::core::value::DataSetSequence::from(vec![region]),
        ));

        let metadata = VolumeMetadata::from_dicom_object(&dicom_object).unwrap();
        assert!((metadata.spacing_mm[0] - 0.3).abs() < 1e-12);
        assert!((metadata.spacing_mm[1] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn missing_private_slice_count_is_reported() {
        let mut dicom_object = dataset();
        dicom_object.remove_element(SLICE_COUNT);
        match VolumeMetadata::from_dicom_object(&dicom_object) {
            Err(VolumeLoaderError::MetadataMissing { name, tag, .. }) => {
                assert_eq!(name, "SliceCount");
                assert_eq!(tag, SLICE_COUNT);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn wrong_value_type_is_reported() {
        let mut dicom_object = dataset();
        dicom_object.put(DataElement::new(
            tags::FRAME_TIME,
            VR::DS,
            PrimitiveValue::from("fast"),
        ));
        assert!(matches!(
            VolumeMetadata::from_dicom_object(&dicom_object),
            Err(VolumeLoaderError::MetadataMissing { name: "FrameTime", .. })
        ));
    }

    #[test]
    fn rejects_non_positive_frames() {
        let mut metadata = VolumeMetadata::from_dicom_object(&dataset()).unwrap();
        metadata.frames = -1;
        assert!(matches!(
            metadata.validate(),
            Err(VolumeLoaderError::InvalidGeometry(_))
        ));
        assert_eq!(metadata.pixel_data_size(), Some(0));
    }

    #[test]
    fn sizes_report_overflow_as_none() {
        let mut metadata = VolumeMetadata::from_dicom_object(&dataset()).unwrap();
        assert_eq!(metadata.voxels_per_frame(), Some(60));
        assert_eq!(metadata.pixel_data_size(), Some(120));

        metadata.columns = u32::MAX;
        metadata.rows = u32::MAX;
        metadata.slices = 2;
        assert_eq!(metadata.voxels_per_frame(), None);
        assert_eq!(metadata.pixel_data_size(), None);

        metadata.slices = 1;
        assert!(metadata.voxels_per_frame().is_some());
        assert_eq!(metadata.pixel_data_size(), None);
    }

    #[test]
    fn frame_times_are_in_seconds() {
        let metadata = VolumeMetadata::from_dicom_object(&dataset()).unwrap();
        let times = metadata.frame_times();
        assert_eq!(times.len(), 2);
        assert_eq!(times[0], 0.0);
        assert!((times[1] - 0.04).abs() < 1e-12);
    }
}
