use rqrr::PreparedImage;

/// Payload extracted from a symbol found in a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub data: String,
}

/// Pure decode over RGBA pixel data, `width * height * 4` bytes.
pub trait CodeDecoder: Send + Sync + 'static {
    fn decode(&self, pixels: &[u8], width: u32, height: u32) -> Option<Decoded>;
}

impl<F> CodeDecoder for F
where
    F: Fn(&[u8], u32, u32) -> Option<Decoded> + Send + Sync + 'static,
{
    fn decode(&self, pixels: &[u8], width: u32, height: u32) -> Option<Decoded> {
        self(pixels, width, height)
    }
}

/// QR decoder backed by `rqrr`. The first grid that decodes wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct QrDecoder;

fn luma(pixels: &[u8], offset: usize) -> u8 {
    let r = u32::from(pixels[offset]);
    let g = u32::from(pixels[offset + 1]);
    let b = u32::from(pixels[offset + 2]);
    ((299 * r + 587 * g + 114 * b) / 1000) as u8
}

impl CodeDecoder for QrDecoder {
    fn decode(&self, pixels: &[u8], width: u32, height: u32) -> Option<Decoded> {
        let (w, h) = (width as usize, height as usize);
        if w == 0 || h == 0 || pixels.len() < w * h * 4 {
            return None;
        }

        let mut prepared =
            PreparedImage::prepare_from_greyscale(w, h, |x, y| luma(pixels, (y * w + x) * 4));

        prepared
            .detect_grids()
            .into_iter()
            .find_map(|grid| grid.decode().ok())
            .map(|(_meta, data)| Decoded { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Luma};
    use qrcode::QrCode;

    fn qr_rgba(payload: &str) -> image::RgbaImage {
        let code = QrCode::new(payload.as_bytes()).unwrap();
        let gray = code
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .min_dimensions(200, 200)
            .build();
        DynamicImage::ImageLuma8(gray).to_rgba8()
    }

    #[test]
    fn decodes_a_rendered_code() {
        let frame = qr_rgba("member-42");
        let decoded = QrDecoder.decode(frame.as_raw(), frame.width(), frame.height());
        assert_eq!(
            decoded,
            Some(Decoded {
                data: "member-42".into()
            })
        );
    }

    #[test]
    fn blank_or_truncated_frames_are_misses() {
        let blank = vec![255u8; 64 * 64 * 4];
        assert!(QrDecoder.decode(&blank, 64, 64).is_none());
        assert!(QrDecoder.decode(&blank[..10], 64, 64).is_none());
        assert!(QrDecoder.decode(&[], 0, 0).is_none());
    }

    #[test]
    fn closures_act_as_decoders() {
        let fixed = |_: &[u8], _: u32, _: u32| {
            Some(Decoded {
                data: "x".to_string(),
            })
        };
        assert_eq!(fixed.decode(&[], 1, 1).map(|d| d.data), Some("x".into()));
    }
}
