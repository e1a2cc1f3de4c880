use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, XraySimError};

/// A 2D or 3D single-channel float image with physical voxel spacing.
///
/// Voxels are stored slice by slice, row by row: `(x, y, z)` lives at
/// `(z * height + y) * width + x`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Image {
    width: usize,
    height: usize,
    depth: usize,
    spacing: [f64; 3],
    label: String,
    data: Vec<f32>,
}

impl Image {
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Image {
            width,
            height,
            depth,
            spacing: [1.0; 3],
            label: String::new(),
            data: vec![0.0; width * height * depth],
        }
    }

    pub fn from_data(width: usize, height: usize, depth: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height * depth {
            return Err(XraySimError::DataError(format!(
                "{} values for a {width}x{height}x{depth} image",
                data.len()
            )));
        }
        Ok(Image {
            width,
            height,
            depth,
            spacing: [1.0; 3],
            label: String::new(),
            data,
        })
    }

    pub fn with_spacing(mut self, spacing: [f64; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.height + y) * self.width + x
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.data[self.index(x, y, z)]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f32) {
        let i = self.index(x, y, z);
        self.data[i] = value;
    }

    pub fn slice(&self, z: usize) -> &[f32] {
        let n = self.width * self.height;
        &self.data[z * n..(z + 1) * n]
    }

    pub fn slice_mut(&mut self, z: usize) -> &mut [f32] {
        let n = self.width * self.height;
        &mut self.data[z * n..(z + 1) * n]
    }

    pub fn row(&self, y: usize, z: usize) -> &[f32] {
        let start = self.index(0, y, z);
        &self.data[start..start + self.width]
    }

    /// Rows in reverse order within every slice.
    pub fn flipped_vertically(&self) -> Image {
        let mut flipped = self.clone();
        for z in 0..self.depth {
            for y in 0..self.height {
                let src = self.index(0, y, z);
                let dst = self.index(0, self.height - 1 - y, z);
                flipped.data[dst..dst + self.width]
                    .copy_from_slice(&self.data[src..src + self.width]);
            }
        }
        flipped
    }

    /// Sum of all voxels.
    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&v| f64::from(v)).sum()
    }

    /// Finite minimum and maximum, ignoring NaN and infinities.
    pub fn finite_min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Write a MetaImage pair: `<path>.mhd` header and `<path>.raw` payload.
    pub fn save_mhd(&self, path: impl AsRef<Path>) -> Result<()> {
        let header_path = path.as_ref().with_extension("mhd");
        let raw_path = header_path.with_extension("raw");
        let raw_name = raw_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| XraySimError::DataError(format!("invalid path {}", raw_path.display())))?;

        let mut header = BufWriter::new(File::create(&header_path)?);
        writeln!(header, "ObjectType = Image")?;
        writeln!(header, "NDims = 3")?;
        if !self.label.is_empty() {
            writeln!(header, "Comment = {}", self.label)?;
        }
        writeln!(header, "BinaryData = True")?;
        writeln!(header, "BinaryDataByteOrderMSB = False")?;
        writeln!(header, "CompressedData = False")?;
        writeln!(header, "DimSize = {} {} {}", self.width, self.height, self.depth)?;
        writeln!(
            header,
            "ElementSpacing = {} {} {}",
            self.spacing[0], self.spacing[1], self.spacing[2]
        )?;
        writeln!(header, "ElementType = MET_FLOAT")?;
        writeln!(header, "ElementDataFile = {raw_name}")?;
        header.flush()?;

        let mut raw = BufWriter::new(File::create(&raw_path)?);
        for value in &self.data {
            raw.write_all(&value.to_le_bytes())?;
        }
        raw.flush()?;

        log::debug!("saved {} ({})", header_path.display(), self.label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_reverses_rows_per_slice() {
        let image = Image::from_data(2, 3, 2, (0..12).map(|v| v as f32).collect()).unwrap();
        let flipped = image.flipped_vertically();
        assert_eq!(flipped.row(0, 0), &[4.0, 5.0]);
        assert_eq!(flipped.row(2, 0), &[0.0, 1.0]);
        assert_eq!(flipped.row(0, 1), &[10.0, 11.0]);
        assert_eq!(flipped.flipped_vertically(), image);
    }

    #[test]
    fn test_finite_min_max_skips_nan() {
        let image = Image::from_data(4, 1, 1, vec![f32::NAN, 2.0, f32::INFINITY, -1.0]).unwrap();
        assert_eq!(image.finite_min_max(), Some((-1.0, 2.0)));
    }

    #[test]
    fn test_save_mhd_writes_header_and_payload() {
        let dir = tempfile::tempdir().unwrap();
        let image = Image::from_data(2, 2, 1, vec![1.0, 2.0, 3.0, 4.0])
            .unwrap()
            .with_spacing([0.5, 0.5, 1.0])
            .with_label("energy fluence");
        image.save_mhd(dir.path().join("fluence")).unwrap();

        let header = std::fs::read_to_string(dir.path().join("fluence.mhd")).unwrap();
        assert!(header.contains("DimSize = 2 2 1"));
        assert!(header.contains("ElementSpacing = 0.5 0.5 1"));
        assert!(header.contains("Comment = energy fluence"));
        assert!(header.contains("ElementDataFile = fluence.raw"));

        let raw = std::fs::read(dir.path().join("fluence.raw")).unwrap();
        assert_eq!(raw.len(), 16);
        assert_eq!(&raw[4..8], &2.0_f32.to_le_bytes());
    }
}
