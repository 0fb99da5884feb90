use super::{Arc, ImageBuffer, ImageFrame, OverlayImage, RenderImage, Rgba};

pub(super) fn overlay_to_image(overlay: &OverlayImage) -> Option<Arc<RenderImage>> {
    let mut bgra = overlay.rgba.clone();
    swap_red_blue(&mut bgra);

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(overlay.width, overlay.height, bgra)?;
    let frame = ImageFrame::new(buffer);

    Some(Arc::new(RenderImage::new(vec![frame])))
}

// GPUI expects BGRA; converting here avoids the async asset pipeline and flicker.
fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}
