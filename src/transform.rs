use image::{imageops, imageops::FilterType, RgbImage};

pub const CHANNELS: usize = 3;
pub const CROP: usize = 224;
pub const RESIZE: u32 = 256;
/// Length of one preprocessed image.
pub const IMAGE_LEN: usize = CHANNELS * CROP * CROP;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Resize the short side, center-crop, then normalize into a channel-major
/// (`C x H x W`) buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preprocess {
    pub resize: u32,
    pub crop: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Preprocess {
    fn default() -> Self {
        Self {
            resize: RESIZE,
            crop: CROP as u32,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl Preprocess {
    pub fn apply(&self, img: &RgbImage) -> Vec<f32> {
        let resized = self.resize_short_side(img);
        let cropped = self.center_crop(&resized);
        self.normalize(&cropped)
    }

    fn resize_short_side(&self, img: &RgbImage) -> RgbImage {
        let (w, h) = img.dimensions();
        let (new_w, new_h) = short_side_dims(w, h, self.resize);
        if (new_w, new_h) == (w, h) {
            return img.clone();
        }
        imageops::resize(img, new_w, new_h, FilterType::Triangle)
    }

    fn center_crop(&self, img: &RgbImage) -> RgbImage {
        let (w, h) = img.dimensions();
        let size = self.crop;
        if w < size || h < size {
            // short side is already >= resize >= crop, but a custom
            // config may ask for a crop larger than the resize
            let (pw, ph) = (w.max(size), h.max(size));
            let mut padded = RgbImage::new(pw, ph);
            imageops::overlay(
                &mut padded,
                img,
                ((pw - w) / 2) as i64,
                ((ph - h) / 2) as i64,
            );
            return self.center_crop(&padded);
        }
        let left = ((w - size) as f32 / 2.0).round() as u32;
        let top = ((h - size) as f32 / 2.0).round() as u32;
        imageops::crop_imm(img, left, top, size, size).to_image()
    }

    fn normalize(&self, img: &RgbImage) -> Vec<f32> {
        let (w, h) = img.dimensions();
        let plane = (w * h) as usize;
        let mut out = vec![0.0; CHANNELS * plane];
        for (x, y, px) in img.enumerate_pixels() {
            let i = (y * w + x) as usize;
            for c in 0..CHANNELS {
                let v = px.0[c] as f32 / 255.0;
                out[c * plane + i] = (v - self.mean[c]) / self.std[c];
            }
        }
        out
    }
}

/// Dimensions after scaling so the shorter side equals `target`. The longer
/// side is truncated, matching the usual `Resize(int)` convention.
fn short_side_dims(w: u32, h: u32, target: u32) -> (u32, u32) {
    if w <= h {
        (target, (target as u64 * h as u64 / w.max(1) as u64) as u32)
    } else {
        ((target as u64 * w as u64 / h.max(1) as u64) as u32, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn short_side_becomes_target() {
        assert_eq!(short_side_dims(32, 32, 256), (256, 256));
        assert_eq!(short_side_dims(640, 480, 256), (341, 256));
        assert_eq!(short_side_dims(100, 300, 256), (256, 768));
    }

    #[test]
    fn output_is_channel_major_and_cropped() {
        let img = RgbImage::from_pixel(40, 30, Rgb([255, 0, 128]));
        let out = Preprocess::default().apply(&img);
        assert_eq!(out.len(), IMAGE_LEN);

        let plane = CROP * CROP;
        let red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let green = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        assert!((out[0] - red).abs() < 1e-4);
        assert!((out[plane - 1] - red).abs() < 1e-4);
        assert!((out[plane] - green).abs() < 1e-4);
    }

    #[test]
    fn crop_larger_than_resize_pads() {
        let pre = Preprocess {
            resize: 8,
            crop: 10,
            ..Default::default()
        };
        let img = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        assert_eq!(pre.apply(&img).len(), CHANNELS * 10 * 10);
    }
}
