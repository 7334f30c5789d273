use super::voxel::Voxel;
use nalgebra::Vector3;
use ndarray::Array3;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum VolumeError {
    #[error("Volume '{name}' has extent {found:?}, expected {expected:?}")]
    ShapeMismatch {
        name: &'static str,
        expected: [usize; 3],
        found: [usize; 3],
    },
    #[error("Volume '{name}' has origin {found:?}, expected {expected:?}")]
    OriginMismatch {
        name: &'static str,
        expected: [f64; 3],
        found: [f64; 3],
    },
    #[error("Volume '{0}' is empty")]
    Empty(&'static str),
    #[error("Expected {expected} values for extent {dims:?}, got {found}")]
    DataLength {
        dims: [usize; 3],
        expected: usize,
        found: usize,
    },
}

/// A dense scalar field over a voxel grid, indexed as `[x, y, z]`.
///
/// Reads outside the grid never panic: [`Volume::get`] returns `None` and
/// [`Volume::value`] returns zero, which is what every neighborhood scan in the
/// engine wants at the box boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    data: Array3<f32>,
}

impl Volume {
    /// Creates a volume of the given extent filled with zeros.
    pub fn zeros(dims: [usize; 3]) -> Self {
        Self {
            data: Array3::zeros((dims[0], dims[1], dims[2])),
        }
    }

    pub fn from_array(data: Array3<f32>) -> Self {
        Self { data }
    }

    /// Builds a volume from values laid out with `z` varying fastest.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::DataLength`] if `values` does not fill the extent exactly.
    pub fn from_shape_vec(dims: [usize; 3], values: Vec<f32>) -> Result<Self, VolumeError> {
        let expected = dims[0] * dims[1] * dims[2];
        let found = values.len();
        let data = Array3::from_shape_vec((dims[0], dims[1], dims[2]), values).map_err(|_| {
            VolumeError::DataLength {
                dims,
                expected,
                found,
            }
        })?;
        Ok(Self { data })
    }

    pub fn dims(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.data.dim();
        [nx, ny, nz]
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    fn index_of(&self, voxel: &Voxel) -> Option<[usize; 3]> {
        let [nx, ny, nz] = self.dims();
        if voxel.x < 0 || voxel.y < 0 || voxel.z < 0 {
            return None;
        }
        let (x, y, z) = (voxel.x as usize, voxel.y as usize, voxel.z as usize);
        (x < nx && y < ny && z < nz).then_some([x, y, z])
    }

    pub fn contains(&self, voxel: &Voxel) -> bool {
        self.index_of(voxel).is_some()
    }

    pub fn get(&self, voxel: &Voxel) -> Option<f32> {
        self.index_of(voxel).map(|idx| self.data[idx])
    }

    /// The value at `voxel`, or zero outside the grid.
    #[inline]
    pub fn value(&self, voxel: &Voxel) -> f32 {
        self.get(voxel).unwrap_or(0.0)
    }

    #[inline]
    pub fn is_positive(&self, voxel: &Voxel) -> bool {
        self.value(voxel) > 0.0
    }

    /// Writes `value` at `voxel`. Returns `false` if the voxel lies outside the grid.
    pub fn set(&mut self, voxel: &Voxel, value: f32) -> bool {
        match self.index_of(voxel) {
            Some(idx) => {
                self.data[idx] = value;
                true
            }
            None => false,
        }
    }

    /// Location and value of the global maximum.
    ///
    /// Scans in x-major order and keeps the first maximum on ties; NaN values
    /// are never selected. Returns `None` for an empty volume.
    pub fn argmax(&self) -> Option<(Voxel, f32)> {
        let mut best: Option<(Voxel, f32)> = None;
        for ((x, y, z), &value) in self.data.indexed_iter() {
            if value.is_nan() {
                continue;
            }
            if best.is_none_or(|(_, current)| value > current) {
                best = Some((Voxel::new(x as i32, y as i32, z as i32), value));
            }
        }
        best
    }

    pub fn count_positive(&self) -> usize {
        self.data.iter().filter(|&&v| v > 0.0).count()
    }

    /// Zeroes every voxel where `mask` is not positive.
    pub fn restrict_to(&mut self, mask: &Volume) -> Result<(), VolumeError> {
        if mask.dims() != self.dims() {
            return Err(VolumeError::ShapeMismatch {
                name: "mask",
                expected: self.dims(),
                found: mask.dims(),
            });
        }
        self.data.zip_mut_with(&mask.data, |v, &m| {
            if m <= 0.0 {
                *v = 0.0;
            }
        });
        Ok(())
    }
}

/// The co-registered confidence fields for one structure.
///
/// All volumes share one extent and one physical origin; the constructor
/// rejects anything else so that downstream stages can index every field with
/// the same voxel.
#[derive(Debug, Clone)]
pub struct VolumeSet {
    ca: Volume,
    backbone: Volume,
    helix: Volume,
    sheet: Volume,
    mask: Option<Volume>,
    origin: Vector3<f64>,
}

impl VolumeSet {
    /// Creates a volume set after validating that all fields share the Ca extent.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::Empty`] if the Ca field has no voxels, or
    /// [`VolumeError::ShapeMismatch`] naming the first field whose extent differs.
    pub fn new(
        ca: Volume,
        backbone: Volume,
        helix: Volume,
        sheet: Volume,
        origin: Vector3<f64>,
    ) -> Result<Self, VolumeError> {
        if ca.is_empty() {
            return Err(VolumeError::Empty("ca"));
        }
        let expected = ca.dims();
        for (name, volume) in [("backbone", &backbone), ("helix", &helix), ("sheet", &sheet)] {
            if volume.dims() != expected {
                return Err(VolumeError::ShapeMismatch {
                    name,
                    expected,
                    found: volume.dims(),
                });
            }
        }
        Ok(Self {
            ca,
            backbone,
            helix,
            sheet,
            mask: None,
            origin,
        })
    }

    /// Attaches the binary input mask.
    pub fn with_mask(mut self, mask: Volume) -> Result<Self, VolumeError> {
        if mask.dims() != self.ca.dims() {
            return Err(VolumeError::ShapeMismatch {
                name: "mask",
                expected: self.ca.dims(),
                found: mask.dims(),
            });
        }
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn ca(&self) -> &Volume {
        &self.ca
    }

    pub fn backbone(&self) -> &Volume {
        &self.backbone
    }

    pub fn helix(&self) -> &Volume {
        &self.helix
    }

    pub fn sheet(&self) -> &Volume {
        &self.sheet
    }

    pub fn mask(&self) -> Option<&Volume> {
        self.mask.as_ref()
    }

    pub fn origin(&self) -> &Vector3<f64> {
        &self.origin
    }

    pub fn dims(&self) -> [usize; 3] {
        self.ca.dims()
    }

    /// The Ca field, zeroed outside the input mask when one is attached.
    pub fn masked_ca(&self) -> Volume {
        let mut ca = self.ca.clone();
        if let Some(mask) = &self.mask {
            // Extents were validated in `with_mask`.
            let _ = ca.restrict_to(mask);
        }
        ca
    }
}
