use image::RgbImage;

/// Order in which the three 8-bit channels of a pixel are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// Swaps the first and last channel of every pixel in place.
///
/// The operation is its own inverse, so it serves both RGB→BGR and BGR→RGB.
pub fn swap_red_blue(image: &mut RgbImage) {
    for pixel in image.pixels_mut() {
        pixel.0.swap(0, 2);
    }
}

/// Returns a channel-reversed copy of `image`.
pub fn reversed(image: &RgbImage) -> RgbImage {
    let mut out = image.clone();
    swap_red_blue(&mut out);
    out
}

/// Brings a grid stored in `order` into RGB order.
pub fn into_rgb(mut image: RgbImage, order: ChannelOrder) -> RgbImage {
    if order == ChannelOrder::Bgr {
        swap_red_blue(&mut image);
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn swap_moves_red_to_last_channel() {
        let mut img = RgbImage::from_pixel(2, 1, Rgb([10, 20, 30]));
        swap_red_blue(&mut img);
        assert_eq!(img.get_pixel(1, 0), &Rgb([30, 20, 10]));
    }

    #[test]
    fn rgb_input_is_left_alone() {
        let img = RgbImage::from_pixel(1, 1, Rgb([1, 2, 3]));
        assert_eq!(into_rgb(img.clone(), ChannelOrder::Rgb), img);
    }

    #[test]
    fn bgr_input_is_swapped_once() {
        let img = RgbImage::from_pixel(1, 1, Rgb([1, 2, 3]));
        let out = into_rgb(img, ChannelOrder::Bgr);
        assert_eq!(out.get_pixel(0, 0), &Rgb([3, 2, 1]));
    }
}
