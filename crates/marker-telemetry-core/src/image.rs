/// Borrowed packed `bgr8` image, row-major, `data.len() == width * height * 3`.
#[derive(Clone, Copy, Debug)]
pub struct ColorImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8],
}

#[derive(Clone, Debug, Default)]
pub struct ColorImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl ColorImage {
    pub fn view(&self) -> ColorImageView<'_> {
        ColorImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

impl ColorImageView<'_> {
    /// `true` when the buffer holds one `bgr` triple per pixel.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(3))
            .is_some_and(|n| n == self.data.len())
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y * self.width + x) * 3;
        let px = self.data.get(idx..idx + 3)?;
        Some([px[0], px[1], px[2]])
    }
}
