#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME is only touched by tests holding HOME_MUTEX.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// Solid white RGB canvas with the given areas painted in flat colors.
#[cfg(test)]
pub(crate) fn painted_canvas(
    width: u32,
    height: u32,
    areas: &[(crate::catalog::BBoxPx, [u8; 3])],
) -> image::DynamicImage {
    let mut canvas = image::RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
    for (bbox, color) in areas {
        for y in bbox.y..bbox.y + bbox.h {
            for x in bbox.x..bbox.x + bbox.w {
                canvas.put_pixel(x, y, image::Rgb(*color));
            }
        }
    }
    image::DynamicImage::ImageRgb8(canvas)
}
