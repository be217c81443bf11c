//! Uploaded banners waiting to be placed.

use bannerswap_core::BannerSource;

/// Banners in upload order.
#[derive(Debug, Default)]
pub struct BannerGallery {
    banners: Vec<BannerSource>,
}

impl BannerGallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, banner: BannerSource) {
        log::info!("Banner {} added to gallery as {}", banner.filename, banner.id);
        self.banners.push(banner);
    }

    pub fn get(&self, id: &str) -> Option<&BannerSource> {
        self.banners.iter().find(|banner| banner.id == id)
    }

    /// Most recently uploaded banner.
    pub fn latest(&self) -> Option<&BannerSource> {
        self.banners.last()
    }

    pub fn len(&self) -> usize {
        self.banners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bannerswap_core::{ImageFormat, RasterSurface};

    #[test]
    fn test_gallery_lookup() {
        let mut gallery = BannerGallery::new();
        let banner = BannerSource::new("logo.png", ImageFormat::Png, RasterSurface::filled(4, 4, [0; 4]));
        let id = banner.id.clone();
        gallery.add(banner);
        assert_eq!(gallery.len(), 1);
        assert_eq!(gallery.get(&id).unwrap().filename, "logo.png");
        assert!(gallery.get("banner-0").is_none());
        assert_eq!(gallery.latest().unwrap().id, id);
        assert!(!gallery.is_empty());
    }
}
