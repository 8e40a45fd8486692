use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBoxPx {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl BBoxPx {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u64 {
        self.x as u64 + self.w as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.h as u64
    }
}

/// A named field area of the document template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: String,
    pub bbox: BBoxPx,
}

impl Region {
    pub fn new(id: impl Into<String>, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            id: id.into(),
            bbox: BBoxPx::new(x, y, w, h),
        }
    }
}

/// Ordered list of regions to OCR. Ids may repeat; repeated ids are merged by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCatalog {
    regions: Vec<Region>,
}

#[derive(Debug, Deserialize)]
struct RegionSpec {
    id: String,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    regions: Vec<RegionSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonCatalog {
    List(Vec<RegionSpec>),
    Table(CatalogFile),
}

impl RegionCatalog {
    pub fn new(regions: Vec<Region>) -> Result<Self> {
        if regions.is_empty() {
            return Err(anyhow!("region catalog is empty"));
        }
        for (idx, region) in regions.iter().enumerate() {
            if region.id.trim().is_empty() {
                return Err(anyhow!("region #{} has an empty id", idx + 1));
            }
            if region.bbox.w == 0 || region.bbox.h == 0 {
                return Err(anyhow!(
                    "region '{}' has a zero-sized box ({}x{})",
                    region.id,
                    region.bbox.w,
                    region.bbox.h
                ));
            }
        }
        Ok(Self { regions })
    }

    /// Field layout of the invoice template the tool was tuned for.
    pub fn default_template() -> Self {
        Self {
            regions: vec![
                Region::new("name", 2400, 740, 200, 40),
                Region::new("Date", 2400, 690, 200, 50),
                Region::new("email", 255, 790, 550, 40),
                Region::new("address", 130, 663, 1170, 50),
                Region::new("Plan", 350, 1130, 890, 80),
                Region::new("Amount", 1550, 1240, 150, 50),
            ],
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog: {}", path.display()))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let specs = if is_json {
            parse_json(&content)
        } else {
            parse_toml(&content)
        }
        .with_context(|| format!("failed to parse catalog: {}", path.display()))?;
        Self::new(specs.into_iter().map(RegionSpec::into_region).collect())
            .with_context(|| format!("invalid catalog: {}", path.display()))
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl RegionSpec {
    fn into_region(self) -> Region {
        Region::new(self.id, self.x, self.y, self.width, self.height)
    }
}

fn parse_toml(content: &str) -> Result<Vec<RegionSpec>> {
    let parsed: CatalogFile = toml::from_str(content)?;
    Ok(parsed.regions)
}

fn parse_json(content: &str) -> Result<Vec<RegionSpec>> {
    let parsed: JsonCatalog = serde_json::from_str(content)?;
    Ok(match parsed {
        JsonCatalog::List(list) => list,
        JsonCatalog::Table(table) => table.regions,
    })
}
