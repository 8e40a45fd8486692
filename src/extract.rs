use anyhow::{Result, anyhow};
use image::{DynamicImage, GenericImageView, RgbImage};
use tracing::{debug, info};

use crate::catalog::{Region, RegionCatalog};
use crate::ocr::OcrEngine;

/// Crops `[y, y+h) x [x, x+w)` and converts it to the RGB layout the OCR engine reads.
pub fn crop_region(image: &DynamicImage, region: &Region) -> Result<RgbImage> {
    let (width, height) = image.dimensions();
    let bbox = region.bbox;
    if bbox.w == 0 || bbox.h == 0 {
        return Err(anyhow!("region '{}' has a zero-sized box", region.id));
    }
    if bbox.right() > width as u64 || bbox.bottom() > height as u64 {
        return Err(anyhow!(
            "region '{}' ({},{} {}x{}) lies outside the {}x{} image",
            region.id,
            bbox.x,
            bbox.y,
            bbox.w,
            bbox.h,
            width,
            height
        ));
    }
    Ok(image.crop_imm(bbox.x, bbox.y, bbox.w, bbox.h).to_rgb8())
}

/// Resolves the worker count: `0` means one per CPU, never more than the region count.
pub fn effective_jobs(requested: usize, regions: usize) -> usize {
    let jobs = if requested == 0 {
        num_cpus::get()
    } else {
        requested
    };
    jobs.clamp(1, regions.max(1))
}

/// OCRs every region and returns the raw text paired with its region, in catalog order.
///
/// With more than one job the crops are split across scoped threads; results
/// are buffered per region so the order never depends on completion order.
pub fn recognize_regions<'a>(
    image: &DynamicImage,
    catalog: &'a RegionCatalog,
    engine: &dyn OcrEngine,
    jobs: usize,
) -> Result<Vec<(&'a Region, String)>> {
    let regions = catalog.regions();
    let crops = regions
        .iter()
        .map(|region| crop_region(image, region))
        .collect::<Result<Vec<_>>>()?;

    let jobs = effective_jobs(jobs, crops.len());
    info!("ocr: {} region(s), {} job(s)", crops.len(), jobs);

    let texts = if jobs <= 1 {
        let mut texts = Vec::with_capacity(crops.len());
        for (region, crop) in regions.iter().zip(&crops) {
            texts.push(recognize_one(engine, region, crop)?);
        }
        texts
    } else {
        recognize_parallel(engine, regions, &crops, jobs)?
    };

    Ok(regions.iter().zip(texts).collect())
}

fn recognize_one(engine: &dyn OcrEngine, region: &Region, crop: &RgbImage) -> Result<String> {
    let text = engine
        .recognize(crop)
        .map_err(|err| err.context(format!("ocr failed for region '{}'", region.id)))?;
    debug!("ocr: {} -> {:?}", region.id, text);
    Ok(text)
}

fn recognize_parallel(
    engine: &dyn OcrEngine,
    regions: &[Region],
    crops: &[RgbImage],
    jobs: usize,
) -> Result<Vec<String>> {
    let chunk_size = crops.len().div_ceil(jobs);
    let chunks: Vec<Vec<Result<String>>> = std::thread::scope(|scope| {
        let handles: Vec<_> = regions
            .chunks(chunk_size)
            .zip(crops.chunks(chunk_size))
            .map(|(regions, crops)| {
                scope.spawn(move || {
                    regions
                        .iter()
                        .zip(crops)
                        .map(|(region, crop)| recognize_one(engine, region, crop))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| vec![Err(anyhow!("ocr worker panicked"))])
            })
            .collect()
    });
    chunks.into_iter().flatten().collect()
}
