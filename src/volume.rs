use ndarray::Array3;
use ndarray::Array4;
use ndarray::ArrayView3;
use ndarray::Axis;

/// A single frame of single-byte grayscale voxels.
///
/// The axis meaning depends on where the volume sits in the pipeline: freshly
/// extracted volumes are `(slices, rows, columns)`, reoriented ones are
/// `(columns, rows, slices)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Volume3D {
    pub data: Array3<u8>,
}

impl Volume3D {
    pub fn new(data: Array3<u8>) -> Self {
        Self { data }
    }

    /// Get the dimensions of the volume
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    pub fn into_data(self) -> Array3<u8> {
        self.data
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<u8> {
        self.data.get((i, j, k)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Rotate by 90° in the plane spanned by axis 0 and axis 2.
    ///
    /// A volume of dimensions `(d0, d1, d2)` becomes `(d2, d1, d0)` with
    /// `out[k][j][d0 - 1 - i] == in[i][j][k]`. Axis 1 keeps its position.
    pub fn rotate(&self) -> Self {
        let mut view = self.data.view().permuted_axes([2, 1, 0]);
        view.invert_axis(Axis(2));
        Self::new(view.as_standard_layout().into_owned())
    }

    /// Reverse the order of a single axis.
    pub fn flip(&self, axis: Axis) -> Self {
        let mut view = self.data.view();
        view.invert_axis(axis);
        Self::new(view.as_standard_layout().into_owned())
    }

    /// Turn an on-disk `(slices, rows, columns)` volume into the canonical
    /// `(columns, rows, slices)` viewing order.
    ///
    /// Rotation runs first, then axis 1 of the rotated volume is reversed.
    pub fn reorient(&self) -> Self {
        debug_assert!(!self.is_empty(), "reorient requires a non-empty volume");
        self.rotate().flip(Axis(1))
    }
}

/// All frames of an acquisition, indexed `[frame][column][row][slice]`.
#[derive(Clone, Debug, Default)]
pub struct Volume4D {
    pub data: Array4<u8>,
    pub spacing_mm: [f64; 3],
    pub frame_times: Vec<f64>,
}

impl Volume4D {
    pub fn new(data: Array4<u8>, spacing_mm: [f64; 3], frame_times: Vec<f64>) -> Self {
        Self {
            data,
            spacing_mm,
            frame_times,
        }
    }

    /// Get the dimensions of the volume (frames, columns, rows, slices)
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    pub fn data(&self) -> &Array4<u8> {
        &self.data
    }

    pub fn frame_count(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Borrow one frame as a `(columns, rows, slices)` view.
    pub fn frame(&self, index: usize) -> Option<ArrayView3<'_, u8>> {
        (index < self.frame_count()).then(|| self.data.index_axis(Axis(0), index))
    }

    /// Voxel spacing in millimeters, in the same order as the spatial axes.
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing_mm
    }

    /// Acquisition time of each frame in seconds.
    pub fn frame_times(&self) -> &[f64] {
        &self.frame_times
    }

    /// Map a `[column, row, slice]` index to millimeters, origin at voxel 0.
    pub fn voxel_to_physical(&self, index: [usize; 3]) -> [f64; 3] {
        [
            index[0] as f64 * self.spacing_mm[0],
            index[1] as f64 * self.spacing_mm[1],
            index[2] as f64 * self.spacing_mm[2],
        ]
    }
}
