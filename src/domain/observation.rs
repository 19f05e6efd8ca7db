//! Binarized line images.
//!
//! A [`LineImage`] is a sequence of columns, each `LINE_HEIGHT` pixels tall.
//! Alongside the pixel grid it keeps flat white and black indicator buffers in
//! column-major order, which is the layout the score kernel and the template
//! dot products read.

use serde::{Deserialize, Serialize};

use crate::core::constants::LINE_HEIGHT;
use crate::core::{OCRError, OcrResult};

/// State of a single binarized pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    Black,
    White,
    /// Unknown pixel; contributes to neither indicator.
    Obscured,
}

/// A normalized line image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineImage {
    columns: Vec<[PixelType; LINE_HEIGHT]>,
    white: Vec<f32>,
    black: Vec<f32>,
}

impl LineImage {
    /// Builds a line image from its columns.
    pub fn new(columns: Vec<[PixelType; LINE_HEIGHT]>) -> Self {
        let mut white = Vec::with_capacity(columns.len() * LINE_HEIGHT);
        let mut black = Vec::with_capacity(columns.len() * LINE_HEIGHT);
        for column in &columns {
            for pixel in column {
                white.push(if *pixel == PixelType::White { 1.0 } else { 0.0 });
                black.push(if *pixel == PixelType::Black { 1.0 } else { 0.0 });
            }
        }
        Self {
            columns,
            white,
            black,
        }
    }

    /// Builds a line image from ragged columns, checking every column height.
    ///
    /// # Errors
    ///
    /// Returns `OCRError::InvalidInput` if any column is not `LINE_HEIGHT` tall.
    pub fn from_rows(columns: &[Vec<PixelType>]) -> OcrResult<Self> {
        let mut fixed = Vec::with_capacity(columns.len());
        for (t, column) in columns.iter().enumerate() {
            let col: [PixelType; LINE_HEIGHT] = column.as_slice().try_into().map_err(|_| {
                OCRError::invalid_input(format!(
                    "column {} has height {}, expected {}",
                    t,
                    column.len(),
                    LINE_HEIGHT
                ))
            })?;
            fixed.push(col);
        }
        Ok(Self::new(fixed))
    }

    /// A line of `width` columns that are all `pixel`.
    pub fn filled(width: usize, pixel: PixelType) -> Self {
        Self::new(vec![[pixel; LINE_HEIGHT]; width])
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, t: usize) -> &[PixelType; LINE_HEIGHT] {
        &self.columns[t]
    }

    pub fn columns(&self) -> &[[PixelType; LINE_HEIGHT]] {
        &self.columns
    }

    /// Column-major white indicators, `len() * LINE_HEIGHT` long.
    pub fn white(&self) -> &[f32] {
        &self.white
    }

    /// Column-major black indicators, `len() * LINE_HEIGHT` long.
    pub fn black(&self) -> &[f32] {
        &self.black
    }

    /// White indicators of column `t`.
    pub fn white_column(&self, t: usize) -> &[f32] {
        &self.white[t * LINE_HEIGHT..(t + 1) * LINE_HEIGHT]
    }

    /// Black indicators of column `t`.
    pub fn black_column(&self, t: usize) -> &[f32] {
        &self.black[t * LINE_HEIGHT..(t + 1) * LINE_HEIGHT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_buffers() {
        let mut column = [PixelType::White; LINE_HEIGHT];
        column[3] = PixelType::Black;
        column[4] = PixelType::Obscured;
        let image = LineImage::new(vec![column, [PixelType::Black; LINE_HEIGHT]]);

        assert_eq!(image.len(), 2);
        assert_eq!(image.white().len(), 2 * LINE_HEIGHT);
        assert_eq!(image.white_column(0)[3], 0.0);
        assert_eq!(image.black_column(0)[3], 1.0);
        assert_eq!(image.white_column(0)[4], 0.0);
        assert_eq!(image.black_column(0)[4], 0.0);
        assert_eq!(image.white_column(0)[0], 1.0);
        assert!(image.black_column(1).iter().all(|&b| b == 1.0));
    }

    #[test]
    fn test_from_rows_rejects_short_column() {
        let columns = vec![vec![PixelType::White; LINE_HEIGHT], vec![PixelType::White; 3]];
        assert!(LineImage::from_rows(&columns).is_err());
    }
}
